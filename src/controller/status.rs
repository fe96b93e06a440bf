//! Status and conditions management for BridgeCluster resources

use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::controller::error::Result;
use crate::crd::{BridgeCluster, BridgeClusterPhase, BridgeClusterStatus, Condition, RoleStatus};
use crate::reconcile::{DesiredSet, ReconcileOutcome};
use crate::resources::FIELD_MANAGER;

/// Standard condition types following Kubernetes conventions
pub mod condition_types {
    /// Every role Secret is up to date
    pub const READY: &str = "Ready";
    /// The last pass reconciled every role without failures
    pub const ROLES_RECONCILED: &str = "RolesReconciled";
    /// The spec passed validation
    pub const CONFIG_VALID: &str = "ConfigurationValid";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
}

/// Builder for creating and updating status conditions
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
    generation: Option<i64>,
}

impl ConditionBuilder {
    /// Create from existing conditions
    pub fn from_existing(existing: Vec<Condition>, generation: Option<i64>) -> Self {
        Self {
            conditions: existing,
            generation,
        }
    }

    /// Set a condition, keeping its transition time if the status is unchanged
    pub fn set_condition(
        mut self,
        type_: &str,
        is_true: bool,
        reason: &str,
        message: &str,
    ) -> Self {
        let status = if is_true {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };

        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Utc::now().to_rfc3339();
            }
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.observed_generation = self.generation;
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Utc::now().to_rfc3339(),
                observed_generation: self.generation,
            });
        }
        self
    }

    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

fn existing_conditions(cluster: &BridgeCluster) -> Vec<Condition> {
    cluster
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default()
}

/// Status after a completed pass
pub fn build_status(
    cluster: &BridgeCluster,
    desired: &DesiredSet,
    outcome: &ReconcileOutcome,
) -> BridgeClusterStatus {
    let generation = cluster.metadata.generation;

    let roles: Vec<RoleStatus> = desired
        .iter()
        .map(|entity| {
            let ready = outcome.created.contains(&entity.identity)
                || outcome.updated.contains(&entity.identity);
            RoleStatus {
                name: entity.identity.clone(),
                secret_name: entity.target_name.clone(),
                ready,
                message: outcome.skipped.get(&entity.identity).cloned(),
            }
        })
        .collect();
    let ready_roles = roles.iter().filter(|r| r.ready).count() as i32;

    let (phase, reason, message) = match &outcome.error {
        None if outcome.skipped.is_empty() => (
            BridgeClusterPhase::Ready,
            "RolesReconciled",
            format!("{} role secret(s) up to date", ready_roles),
        ),
        Some(err) if err.is_list_failure() => (
            BridgeClusterPhase::Failed,
            "ListFailed",
            err.to_string(),
        ),
        Some(err) => (BridgeClusterPhase::Degraded, "ReconcileFailed", err.to_string()),
        None => (
            BridgeClusterPhase::Degraded,
            "RolesSkipped",
            format!("{} role(s) skipped", outcome.skipped.len()),
        ),
    };
    let converged = phase == BridgeClusterPhase::Ready;

    let conditions = ConditionBuilder::from_existing(existing_conditions(cluster), generation)
        .set_condition(condition_types::CONFIG_VALID, true, "ValidSpec", "")
        .set_condition(condition_types::ROLES_RECONCILED, converged, reason, &message)
        .set_condition(condition_types::READY, converged, reason, &message)
        .build();

    BridgeClusterStatus {
        phase,
        observed_generation: generation,
        conditions,
        roles,
        ready_roles,
        last_reconcile_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Status for a spec that failed before any pass could run
pub fn failed_status(cluster: &BridgeCluster, reason: &str, message: &str) -> BridgeClusterStatus {
    let generation = cluster.metadata.generation;
    let previous = cluster.status.clone().unwrap_or_default();
    let config_valid = reason != "ValidationFailed";

    let conditions = ConditionBuilder::from_existing(existing_conditions(cluster), generation)
        .set_condition(
            condition_types::CONFIG_VALID,
            config_valid,
            if config_valid { "ValidSpec" } else { reason },
            if config_valid { "" } else { message },
        )
        .set_condition(condition_types::READY, false, reason, message)
        .build();

    BridgeClusterStatus {
        phase: BridgeClusterPhase::Failed,
        observed_generation: generation,
        conditions,
        ..previous
    }
}

/// Body of the merge patch that replaces the status
pub fn status_patch(status: &BridgeClusterStatus) -> serde_json::Value {
    serde_json::json!({ "status": status })
}

/// Whether writing `next` would change anything but the pass timestamp
pub fn status_changed(previous: Option<&BridgeClusterStatus>, next: &BridgeClusterStatus) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    let mut unstamped = next.clone();
    unstamped.last_reconcile_time = previous.last_reconcile_time.clone();
    &unstamped != previous
}

/// Write the status subresource
///
/// Skipped when only the timestamp would change: every status write is a
/// watch event for the cluster and would start another pass.
pub async fn patch_status(
    client: &Client,
    cluster: &BridgeCluster,
    status: &BridgeClusterStatus,
) -> Result<()> {
    if !status_changed(cluster.status.as_ref(), status) {
        debug!(name = %cluster.name_any(), "Status unchanged, not patching");
        return Ok(());
    }

    let ns = cluster.namespace().unwrap_or_default();
    let api: Api<BridgeCluster> = Api::namespaced(client.clone(), &ns);

    api.patch_status(
        &cluster.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&status_patch(status)),
    )
    .await?;

    Ok(())
}
