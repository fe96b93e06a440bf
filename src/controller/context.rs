use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::bridge::BridgeApi;
use crate::config::OperatorConfig;
use crate::health::HealthState;
use crate::reconcile::{KubeStore, ObjectStore};

/// Shared context for the controller
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Managed database API
    pub bridge: Arc<dyn BridgeApi>,
    /// Object store for role credential Secrets
    pub secrets: Arc<dyn ObjectStore<Secret>>,
    pub config: OperatorConfig,
    /// Health state for recording metrics
    pub health_state: Option<Arc<HealthState>>,
    /// Cancelled on shutdown; in-flight passes stop issuing calls
    pub shutdown: CancellationToken,
    /// Consecutive failed passes per cluster, for backoff
    pub failures: FailureTracker,
}

/// Consecutive failed passes per cluster, keyed by `namespace/name`
#[derive(Debug, Default)]
pub struct FailureTracker {
    counts: Mutex<HashMap<String, u32>>,
}

impl FailureTracker {
    /// Key of the cluster `name` in `namespace`
    pub fn key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }

    /// Record a failed pass and return how many failed in a row before it
    pub fn record(&self, key: &str) -> u32 {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(key.to_string()).or_insert(0);
        let previous = *count;
        *count = count.saturating_add(1);
        previous
    }

    /// Forget a cluster after a clean pass or once it is deleted
    pub fn reset(&self, key: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.remove(key);
    }

    /// Number of clusters with failures on record
    pub fn len(&self) -> usize {
        self.counts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Context {
    pub fn new(
        client: Client,
        bridge: Arc<dyn BridgeApi>,
        config: OperatorConfig,
        health_state: Option<Arc<HealthState>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            secrets: Arc::new(KubeStore::<Secret>::new(client.clone())),
            client,
            bridge,
            config,
            health_state,
            shutdown,
            failures: FailureTracker::default(),
        }
    }
}
