pub mod backup;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod reconcile;
pub mod resources;

pub use bridge::{BridgeApi, BridgeClient, BridgeError, ClusterRole};
pub use config::{ConfigError, OperatorConfig};
pub use controller::{BackoffConfig, Context, Error, Result, error_policy, reconcile};
pub use crd::BridgeCluster;
pub use health::{HealthState, Metrics};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::Controller;
use kube::runtime::controller::Error as ControllerError;
use kube::runtime::watcher::{self, Config as WatcherConfig};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Failure-tracker key of a cluster the controller found deleted
fn deleted_cluster_key(err: &ControllerError<Error, watcher::Error>) -> Option<String> {
    let obj = match err {
        ControllerError::ObjectNotFound(obj) => obj,
        ControllerError::ReconcilerFailed(e, obj) if e.is_not_found() => obj,
        _ => return None,
    };
    Some(controller::FailureTracker::key(
        obj.namespace.as_deref().unwrap_or_default(),
        &obj.name,
    ))
}

/// Run the BridgeCluster controller until its stream ends or shutdown is requested.
///
/// Watches BridgeCluster resources and the role Secrets they own, scoped to
/// `WATCH_NAMESPACE` when configured. Cancelling `ctx.shutdown` stops the
/// controller gracefully and makes in-flight passes stop issuing calls.
pub async fn run_controller(ctx: Arc<Context>) {
    let namespace = ctx.config.watch_namespace.clone();
    let scope_msg = namespace.as_deref().unwrap_or("cluster-wide");
    tracing::info!(
        "Starting controller for BridgeCluster resources (scope: {})",
        scope_msg
    );

    if let Some(ref state) = ctx.health_state {
        state.set_ready(true).await;
    }

    let client = ctx.client.clone();
    let clusters: Api<BridgeCluster> = scoped_api(client.clone(), namespace.as_deref());
    let secrets: Api<Secret> = scoped_api(client, namespace.as_deref());

    let watcher_config = WatcherConfig::default().any_semantic();
    let shutdown = ctx.shutdown.clone();

    let tracked = ctx.clone();

    Controller::new(clusters, watcher_config.clone())
        .owns(secrets, watcher_config)
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile, error_policy, ctx)
        .for_each(|result| {
            let tracked = tracked.clone();
            async move {
                match result {
                    Ok((obj, _action)) => {
                        tracing::debug!("Reconciled: {}", obj.name);
                    }
                    Err(e) => {
                        // Requeues and owned Secret events can still arrive
                        // after the cluster itself is gone.
                        if let Some(key) = deleted_cluster_key(&e) {
                            tracked.failures.reset(&key);
                            tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                        } else {
                            tracing::error!("Reconciliation error: {:?}", e);
                        }
                    }
                }
            }
        })
        .await;

    tracing::info!("Controller stream ended");
}
