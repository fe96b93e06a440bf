//! Reconciliation logic for BridgeCluster resources
//!
//! Each pass keeps one credential Secret per declared role converged with the
//! managed database API. Secrets are owned by the cluster, so Kubernetes
//! removes them when the cluster is deleted and no finalizer is needed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{error, info, instrument, warn};

use crate::controller::context::{Context, FailureTracker};
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::roles::{BridgeRoleFetcher, desired_roles, load_api_key};
use crate::controller::status::{build_status, failed_status, patch_status};
use crate::controller::validation::validate_spec;
use crate::crd::BridgeCluster;
use crate::reconcile::{Engine, ParentRef, ReconcileOutcome};
use crate::resources::{ROLE_SECRET_LABELS, RoleSecretMaterializer};

/// Interval between passes of a converged cluster; picks up rotated passwords
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Main reconciliation function
#[instrument(skip(cluster, ctx), fields(name = %cluster.name_any(), namespace = cluster.namespace().unwrap_or_default()))]
pub async fn reconcile(cluster: Arc<BridgeCluster>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let ns = cluster
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = cluster.name_any();
    let key = FailureTracker::key(&ns, &name);

    info!("Reconciling BridgeCluster");

    let result = reconcile_roles(&cluster, &ctx, &ns).await.and_then(|outcome| {
        if let Some(state) = &ctx.health_state {
            state.metrics.record_outcome(&ns, &name, &outcome);
        }
        match outcome.error {
            Some(err) => Err(Error::PartialConvergence(err)),
            None => Ok(outcome),
        }
    });

    if let Some(state) = &ctx.health_state {
        state
            .metrics
            .record_reconcile(&ns, &name, start.elapsed().as_secs_f64());
        if result.is_err() {
            state.metrics.record_error(&ns, &name);
        }
    }

    match result {
        Ok(outcome) => {
            ctx.failures.reset(&key);
            if let Some(state) = &ctx.health_state {
                state.mark_reconciled();
            }
            info!(
                created = outcome.created.len(),
                updated = outcome.updated.len(),
                deleted = outcome.deleted.len(),
                "Reconciliation completed successfully"
            );
            Ok(Action::requeue(RESYNC_INTERVAL))
        }
        Err(e) => {
            error!("Reconciliation failed: {}", e);
            Err(e)
        }
    }
}

/// Validate, run one pass over the role Secrets and publish the status
///
/// Errors here stop the pass before the engine runs. A pass that ran returns
/// its outcome, including any aggregated failures.
async fn reconcile_roles(
    cluster: &BridgeCluster,
    ctx: &Context,
    ns: &str,
) -> Result<ReconcileOutcome> {
    let desired = match validate_spec(&cluster.spec, ctx.config.duplicate_policy)
        .and_then(|()| desired_roles(&cluster.spec.roles, ctx.config.duplicate_policy))
    {
        Ok(desired) => desired,
        Err(e) => {
            let status = failed_status(cluster, "ValidationFailed", &e.to_string());
            patch_status(&ctx.client, cluster, &status).await?;
            return Err(e);
        }
    };

    let parent = ParentRef::from_resource(cluster)?;

    let api_key = match load_api_key(&ctx.client, ns, &cluster.spec.secret).await {
        Ok(key) => key,
        Err(e) => {
            warn!(secret = %cluster.spec.secret, error = %e, "Cannot load API key");
            let status = failed_status(cluster, "ApiKeyUnavailable", &e.to_string());
            patch_status(&ctx.client, cluster, &status).await?;
            return Err(e);
        }
    };

    let fetcher = BridgeRoleFetcher::new(ctx.bridge.as_ref(), &api_key, &cluster.spec.cluster_id);
    let materializer = RoleSecretMaterializer::new(cluster.spec.metadata.as_ref());
    let engine = Engine::new(ctx.secrets.clone(), ROLE_SECRET_LABELS, ctx.config.pass_config());

    let outcome = engine
        .run(&parent, &desired, &fetcher, &materializer, &ctx.shutdown)
        .await;

    let status = build_status(cluster, &desired, &outcome);
    patch_status(&ctx.client, cluster, &status).await?;

    Ok(outcome)
}

/// Error policy for the controller with exponential backoff
///
/// The delay grows with the number of consecutive failed passes of the
/// cluster and is capped by [`BackoffConfig::max_delay`].
pub fn error_policy(cluster: Arc<BridgeCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = cluster.name_any();
    let key = FailureTracker::key(&cluster.namespace().unwrap_or_default(), &name);
    let backoff = BackoffConfig::default();

    let attempt = ctx.failures.record(&key);
    let delay = backoff.delay_for_error(error, attempt);

    if error.is_retryable() {
        warn!(
            "Retryable error for {} (attempt {}): {}, requeuing in {:?}",
            name,
            attempt + 1,
            error,
            delay
        );
    } else {
        error!(
            "Non-retryable error for {}: {}, requeuing in {:?} for manual intervention",
            name, error, delay
        );
    }

    Action::requeue(delay)
}
