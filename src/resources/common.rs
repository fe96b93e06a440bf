//! Common constants and labels for generated Kubernetes objects

use std::collections::BTreeMap;

use crate::reconcile::ManagedLabels;

/// Label holding the name of the owning BridgeCluster
pub const LABEL_CLUSTER: &str = "postgres-operator.smoketurner.com/cluster";

/// Label distinguishing the kinds of objects generated for a cluster
pub const LABEL_ROLE: &str = "postgres-operator.smoketurner.com/role";

/// Value of [`LABEL_ROLE`] on PostgreSQL role credential Secrets
pub const ROLE_BRIDGE_POSTGRES_ROLE: &str = "bridge-pgrole";

/// Label holding the PostgreSQL role name of a credential Secret
pub const LABEL_BRIDGE_POSTGRES_ROLE: &str = "postgres-operator.smoketurner.com/bridge-pgrole";

/// Label keys that scope role credential Secrets to their cluster
pub const ROLE_SECRET_LABELS: ManagedLabels = ManagedLabels {
    parent: LABEL_CLUSTER,
    kind: LABEL_ROLE,
    kind_value: ROLE_BRIDGE_POSTGRES_ROLE,
    identity: LABEL_BRIDGE_POSTGRES_ROLE,
};

/// Operator field manager name for server-side apply
pub const FIELD_MANAGER: &str = crate::reconcile::store::FIELD_MANAGER;

/// Labels every generated object starts from
///
/// Declared labels may override these; the scoping labels in
/// [`ROLE_SECRET_LABELS`] are applied on top and cannot be overridden.
pub fn standard_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/component".to_string(),
            "postgresql".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
    ])
}
