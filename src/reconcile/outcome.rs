//! Outcome of a reconcile pass and the aggregate of its failures

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{error, warn};

/// Where in the pass a failure happened
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Actual state could not be listed; the pass made no changes
    List,
    /// An orphaned or renamed object could not be deleted
    GcDelete,
    /// The external record of an entity could not be fetched
    ExternalFetch,
    /// The object for an entity could not be built
    Materialization,
    /// The object for an entity could not be persisted
    Apply,
    /// The pass was cancelled before the entity was processed
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::List => "list",
            FailureKind::GcDelete => "gc-delete",
            FailureKind::ExternalFetch => "external-fetch",
            FailureKind::Materialization => "materialization",
            FailureKind::Apply => "apply",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Failures tied to one desired entity
    pub fn is_entity_level(&self) -> bool {
        matches!(
            self,
            FailureKind::ExternalFetch | FailureKind::Materialization | FailureKind::Apply
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    /// Entity identity, or the object name when there is no identity
    pub subject: String,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, subject: impl Into<String>, message: impl ToString) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.subject, self.message)
    }
}

/// Every failure of one pass, in the order they happened
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} failure(s) during reconcile: {}", .failures.len(), join(.failures))]
pub struct AggregateError {
    failures: Vec<Failure>,
}

fn join(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(Failure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AggregateError {
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether any failure concerns `subject`
    pub fn names(&self, subject: &str) -> bool {
        self.failures.iter().any(|f| f.subject == subject)
    }

    /// Whether the pass stopped before making any change
    pub fn is_list_failure(&self) -> bool {
        self.failures.iter().any(|f| f.kind == FailureKind::List)
    }
}

/// Whether entity-level failures count against the pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fold every failure into the aggregate error so the pass is retried
    #[default]
    Aggregate,
    /// Only log fetch, materialize and apply failures. List and GC failures
    /// are still aggregated.
    LogOnly,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aggregate" => Ok(Self::Aggregate),
            "log-only" => Ok(Self::LogOnly),
            other => Err(format!(
                "unknown failure policy {other:?} (expected aggregate or log-only)"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate => write!(f, "aggregate"),
            Self::LogOnly => write!(f, "log-only"),
        }
    }
}

/// What a pass did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    /// Entities left as they were, with the reason
    pub skipped: BTreeMap<String, String>,
    pub error: Option<AggregateError>,
}

impl ReconcileOutcome {
    /// Every desired entity was applied and nothing failed
    pub fn is_converged(&self) -> bool {
        self.error.is_none() && self.skipped.is_empty()
    }
}

/// Collects failures of one pass under a [`FailurePolicy`]
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    policy: FailurePolicy,
    failures: Vec<Failure>,
}

impl Aggregator {
    pub(crate) fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, failure: Failure) {
        match failure.kind {
            FailureKind::List => {
                error!(subject = %failure.subject, error = %failure.message, "Failed to list managed objects");
            }
            kind => {
                warn!(kind = %kind, subject = %failure.subject, error = %failure.message, "Reconcile step failed");
            }
        }

        if failure.kind.is_entity_level() && self.policy == FailurePolicy::LogOnly {
            return;
        }
        self.failures.push(failure);
    }

    pub(crate) fn finish(self) -> Option<AggregateError> {
        if self.failures.is_empty() {
            None
        } else {
            Some(AggregateError {
                failures: self.failures,
            })
        }
    }
}
