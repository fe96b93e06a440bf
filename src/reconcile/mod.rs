//! Generic reconciliation engine for operator-managed child objects
//!
//! A reconcile pass converges the set of child objects owned by one parent
//! resource toward a declared set of entities:
//!
//! 1. [`lister`] lists the children the parent actually owns
//! 2. [`diff`] plans which of them are orphaned or renamed and deletes those
//! 3. for every desired entity, in identity order, [`fetch`] pulls its
//!    external record, [`materialize`] builds the object and [`store`]
//!    applies it
//! 4. [`outcome`] folds every failure into one aggregate error
//!
//! Only a listing failure ends a pass early. Every other failure is isolated
//! to the entity or object it concerns.

pub mod desired;
pub mod diff;
pub mod engine;
pub mod fetch;
pub mod lister;
pub mod materialize;
pub mod outcome;
pub mod parent;
pub mod store;

pub use desired::{DesiredEntity, DesiredSet, DuplicatePolicy};
pub use diff::{GcPlan, Orphan, OrphanReason, plan};
pub use engine::{Engine, PassConfig};
pub use fetch::{ExternalFetcher, FetchError};
pub use lister::{ActualState, ManagedLabels, ManagedObject, list_actual};
pub use materialize::{MaterializeError, Materializer, merge_labels};
pub use outcome::{AggregateError, Failure, FailureKind, FailurePolicy, ReconcileOutcome};
pub use parent::ParentRef;
pub use store::{KubeStore, ObjectStore, StoreError};

use thiserror::Error;

/// Errors raised before a pass can start
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("duplicate entity identity: {0}")]
    DuplicateIdentity(String),

    #[error("parent resource is missing {0}")]
    MissingParentField(&'static str),
}
