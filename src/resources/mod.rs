pub mod common;
pub mod secret;

pub use common::{FIELD_MANAGER, ROLE_SECRET_LABELS, standard_labels};
pub use secret::{RoleSecretMaterializer, generate_role_secret};
