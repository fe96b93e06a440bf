//! BridgeCluster CRD definition
//!
//! A BridgeCluster ties a PostgreSQL cluster hosted by the managed database
//! API to a namespace. For every declared role the operator maintains a
//! Secret holding that role's credentials.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// BridgeCluster is the Schema for the bridgeclusters API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "postgres-operator.smoketurner.com",
    version = "v1alpha1",
    kind = "BridgeCluster",
    plural = "bridgeclusters",
    shortname = "pgbc",
    namespaced,
    status = "BridgeClusterStatus",
    printcolumn = r#"{"name":"Cluster ID", "type":"string", "jsonPath":".spec.clusterId"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Roles", "type":"integer", "jsonPath":".status.readyRoles"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BridgeClusterSpec {
    /// ID of the cluster in the managed database API
    pub cluster_id: String,

    /// Name of a Secret in the same namespace whose `key` entry holds the API key
    pub secret: String,

    /// PostgreSQL roles whose credentials are published as Secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<BridgeRoleSpec>,

    /// Labels and annotations copied onto every generated object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A role whose credentials are written to a Secret
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRoleSpec {
    /// Name of the PostgreSQL role. Lowercase letters, numbers and hyphens
    /// only, since it is also used as a label value.
    pub name: String,

    /// Name of the Secret that holds the role's credentials. Changing it
    /// deletes the old Secret and creates a new one.
    pub secret_name: String,
}

/// Metadata propagated to generated objects
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Status of the BridgeCluster resource
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BridgeClusterStatus {
    #[serde(default)]
    pub phase: BridgeClusterPhase,

    /// Generation of the spec the status describes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Per-role state, in role name order; always written so a merge patch
    /// clears roles that were removed
    #[serde(default)]
    pub roles: Vec<RoleStatus>,

    /// Number of roles whose Secret is up to date
    #[serde(default)]
    pub ready_roles: i32,

    /// Time of the last completed reconcile pass (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
}

/// Phase of a BridgeCluster
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum BridgeClusterPhase {
    /// Not reconciled yet
    #[default]
    Pending,
    /// Every role Secret is up to date
    Ready,
    /// Some roles could not be reconciled; others are up to date
    Degraded,
    /// The spec is invalid or the cluster's Secrets could not be listed
    Failed,
}

impl std::fmt::Display for BridgeClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeClusterPhase::Pending => write!(f, "Pending"),
            BridgeClusterPhase::Ready => write!(f, "Ready"),
            BridgeClusterPhase::Degraded => write!(f, "Degraded"),
            BridgeClusterPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// State of one role's Secret
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleStatus {
    pub name: String,
    pub secret_name: String,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Kubernetes-style condition
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,

    /// Generation observed when condition was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
