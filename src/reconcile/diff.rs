//! Diff between desired and actual state, and the garbage it produces

use std::collections::BTreeMap;

use kube::Resource;

use super::desired::DesiredSet;
use super::lister::{ActualState, ManagedObject};

/// Why a listed object has to go
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrphanReason {
    /// Its identity is no longer declared
    Undeclared,
    /// Its identity is declared under a different object name
    Renamed { target_name: String },
}

impl std::fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrphanReason::Undeclared => write!(f, "identity no longer declared"),
            OrphanReason::Renamed { target_name } => write!(f, "renamed to {target_name}"),
        }
    }
}

/// An object scheduled for deletion
#[derive(Clone, Debug, PartialEq)]
pub struct Orphan<K> {
    pub object: ManagedObject<K>,
    pub reason: OrphanReason,
}

impl<K: Resource> Orphan<K> {
    /// Name to report the deletion under
    pub fn subject(&self) -> String {
        if self.object.identity.is_empty() {
            self.object.name()
        } else {
            self.object.identity.clone()
        }
    }
}

/// Result of comparing desired and actual state
#[derive(Clone, Debug, PartialEq)]
pub struct GcPlan<K> {
    /// Existing objects that stay, keyed by identity
    pub keep: BTreeMap<String, K>,
    /// Objects to delete, in identity then name order
    pub delete: Vec<Orphan<K>>,
}

impl<K> GcPlan<K> {
    pub fn keeps(&self, identity: &str) -> bool {
        self.keep.contains_key(identity)
    }
}

/// Split actual state into objects to keep and objects to delete
///
/// Decisions are made on the identity label alone. An object whose name no
/// longer matches its entity's target name is deleted and recreated under the
/// new name rather than renamed in place.
pub fn plan<K: Resource>(desired: &DesiredSet, actual: ActualState<K>) -> GcPlan<K> {
    let mut keep = BTreeMap::new();
    let mut delete = Vec::new();

    for managed in actual.objects {
        let reason = match desired.get(&managed.identity) {
            None => Some(OrphanReason::Undeclared),
            Some(entity)
                if managed.object.meta().name.as_deref() != Some(entity.target_name.as_str()) =>
            {
                Some(OrphanReason::Renamed {
                    target_name: entity.target_name.clone(),
                })
            }
            Some(_) => None,
        };

        match reason {
            Some(reason) => delete.push(Orphan {
                object: managed,
                reason,
            }),
            None => {
                keep.insert(managed.identity, managed.object);
            }
        }
    }

    GcPlan { keep, delete }
}
