//! Object Materializer: turns an entity and its record into a child object

use std::collections::BTreeMap;

use thiserror::Error;

use super::desired::DesiredEntity;
use super::lister::ManagedLabels;
use super::parent::ParentRef;

/// Errors that make one entity impossible to materialize
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("invalid owner: {0}")]
    InvalidOwner(String),

    #[error("invalid external record: {0}")]
    InvalidRecord(String),
}

/// Builds the desired child object for one entity
///
/// Implementations must be pure: the same inputs always produce the same
/// object, and nothing is read from or written to the cluster.
pub trait Materializer: Send + Sync {
    type Record;
    type Object;

    fn materialize(
        &self,
        parent: &ParentRef,
        entity: &DesiredEntity,
        record: &Self::Record,
    ) -> Result<Self::Object, MaterializeError>;
}

/// Merge parent-declared labels under the reserved labels of an entity
///
/// Declared labels may add keys but never replace the parent, kind or
/// identity labels that the lister selects on.
pub fn merge_labels(
    labels: &ManagedLabels,
    parent: &ParentRef,
    identity: &str,
    declared: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = declared
        .iter()
        .filter(|(key, _)| !labels.is_reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    merged.extend(labels.for_entity(parent, identity));
    merged
}
