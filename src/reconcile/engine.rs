//! The reconcile pass: list, collect garbage, then fetch, build and apply
//! every desired entity

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kube::Resource;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::desired::DesiredSet;
use super::diff::plan;
use super::fetch::ExternalFetcher;
use super::lister::{ManagedLabels, list_actual};
use super::materialize::Materializer;
use super::outcome::{Aggregator, Failure, FailureKind, FailurePolicy, ReconcileOutcome};
use super::parent::ParentRef;
use super::store::ObjectStore;

/// Default deadline for one pass
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings that apply to every pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassConfig {
    /// Deadline for the whole pass; every outbound call is bound by it
    pub timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PASS_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Why a bounded call did not produce a value
#[derive(Debug)]
enum StepError {
    Failed(String),
    TimedOut,
    Cancelled,
}

impl Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::Failed(msg) => f.write_str(msg),
            StepError::TimedOut => f.write_str("deadline exceeded"),
            StepError::Cancelled => f.write_str("pass cancelled"),
        }
    }
}

impl StepError {
    /// Kind of the failure when this error stops a step of kind `step`
    fn kind(&self, step: FailureKind) -> FailureKind {
        match self {
            StepError::Cancelled => FailureKind::Cancelled,
            _ => step,
        }
    }

    /// Why the entity was skipped, with `step` naming what went wrong
    fn skip_reason(&self, step: &str) -> String {
        match self {
            StepError::Cancelled => self.to_string(),
            _ => format!("{step} failed: {self}"),
        }
    }
}

/// Far enough ahead that a pass never reaches it
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn pass_deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Await `call` unless the deadline passes or the pass is cancelled first
async fn bounded<T, E, Fut>(
    deadline: Instant,
    cancel: &CancellationToken,
    call: Fut,
) -> Result<T, StepError>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    if cancel.is_cancelled() {
        return Err(StepError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepError::Cancelled),
        result = timeout_at(deadline, call) => match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StepError::Failed(e.to_string())),
            Err(_) => Err(StepError::TimedOut),
        },
    }
}

/// Drives reconcile passes for one kind of managed object
///
/// The engine holds no state between passes. Callers must not run two passes
/// for the same parent at once; kube-runtime's controller guarantees that.
pub struct Engine<K> {
    store: Arc<dyn ObjectStore<K>>,
    labels: ManagedLabels,
    config: PassConfig,
}

impl<K> Engine<K>
where
    K: Resource + Send + Sync,
{
    pub fn new(store: Arc<dyn ObjectStore<K>>, labels: ManagedLabels, config: PassConfig) -> Self {
        Self {
            store,
            labels,
            config,
        }
    }

    /// Run one pass for `parent`
    ///
    /// Steps run one at a time, entities in identity order. Failures are
    /// returned in [`ReconcileOutcome::error`]; only a listing failure stops
    /// the pass early, and it does so before anything is changed.
    pub async fn run<F, M>(
        &self,
        parent: &ParentRef,
        desired: &DesiredSet,
        fetcher: &F,
        materializer: &M,
        cancel: &CancellationToken,
    ) -> ReconcileOutcome
    where
        F: ExternalFetcher,
        M: Materializer<Record = F::Record, Object = K>,
    {
        let deadline = pass_deadline(self.config.timeout);
        let mut outcome = ReconcileOutcome::default();
        let mut failures = Aggregator::new(self.config.failure_policy);

        let actual = match bounded(
            deadline,
            cancel,
            list_actual(self.store.as_ref(), parent, &self.labels),
        )
        .await
        {
            Ok(actual) => actual,
            Err(e) => {
                failures.record(Failure::new(e.kind(FailureKind::List), &parent.name, e));
                for entity in desired.iter() {
                    outcome
                        .skipped
                        .insert(entity.identity.clone(), "actual state unavailable".to_string());
                }
                outcome.error = failures.finish();
                return outcome;
            }
        };

        debug!(
            parent = %parent.name,
            desired = desired.len(),
            actual = actual.len(),
            "Listed managed objects"
        );

        let gc = plan(desired, actual);

        // Deletions never short-circuit; each failure is recorded on its own.
        for orphan in &gc.delete {
            let subject = orphan.subject();
            match bounded(deadline, cancel, self.store.delete(&orphan.object.object)).await {
                Ok(()) => {
                    info!(
                        parent = %parent.name,
                        identity = %subject,
                        name = %orphan.object.name(),
                        reason = %orphan.reason,
                        "Deleted managed object"
                    );
                    outcome.deleted.insert(subject);
                }
                Err(e) => failures.record(Failure::new(e.kind(FailureKind::GcDelete), subject, e)),
            }
        }

        for entity in desired.iter() {
            let identity = entity.identity.clone();

            if cancel.is_cancelled() {
                outcome
                    .skipped
                    .insert(identity.clone(), StepError::Cancelled.to_string());
                failures.record(Failure::new(
                    FailureKind::Cancelled,
                    identity,
                    StepError::Cancelled,
                ));
                continue;
            }

            let record = match bounded(deadline, cancel, fetcher.fetch(parent, entity)).await {
                Ok(record) => record,
                Err(e) => {
                    outcome
                        .skipped
                        .insert(identity.clone(), e.skip_reason("external fetch"));
                    failures.record(Failure::new(e.kind(FailureKind::ExternalFetch), identity, e));
                    continue;
                }
            };

            let object = match materializer.materialize(parent, entity, &record) {
                Ok(object) => object,
                Err(e) => {
                    outcome
                        .skipped
                        .insert(identity.clone(), format!("materialization failed: {e}"));
                    failures.record(Failure::new(FailureKind::Materialization, identity, e));
                    continue;
                }
            };

            match bounded(deadline, cancel, self.store.apply(&object)).await {
                Ok(_) if gc.keeps(&identity) => {
                    debug!(parent = %parent.name, identity = %identity, target = %entity.target_name, "Updated managed object");
                    outcome.updated.insert(identity);
                }
                Ok(_) => {
                    info!(parent = %parent.name, identity = %identity, target = %entity.target_name, "Created managed object");
                    outcome.created.insert(identity);
                }
                Err(e) => {
                    outcome
                        .skipped
                        .insert(identity.clone(), e.skip_reason("apply"));
                    failures.record(Failure::new(e.kind(FailureKind::Apply), identity, e));
                }
            }
        }

        outcome.error = failures.finish();
        outcome
    }
}
