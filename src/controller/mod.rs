pub mod context;
pub mod error;
pub mod reconciler;
pub mod roles;
pub mod status;
pub mod validation;

pub use context::{Context, FailureTracker};
pub use error::{BackoffConfig, Error, Result};
pub use reconciler::{RESYNC_INTERVAL, error_policy, reconcile};
pub use roles::{BridgeRoleFetcher, desired_roles};
pub use status::{ConditionBuilder, build_status, failed_status};
pub use validation::validate_spec;
