//! Desired state of one reconcile pass

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::ReconcileError;

/// One declared entity and the name of the object that should hold it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredEntity {
    /// Stable business key, e.g. the PostgreSQL role name
    pub identity: String,
    /// Name of the managed object; changing it renames the object
    pub target_name: String,
    /// Free-form attributes passed through to the materializer
    pub attributes: BTreeMap<String, String>,
}

impl DesiredEntity {
    pub fn new(identity: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            target_name: target_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// How to treat two declarations sharing an identity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Refuse the declared set
    #[default]
    Reject,
    /// Keep the later declaration
    LastWins,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "last-wins" => Ok(Self::LastWins),
            other => Err(format!(
                "unknown duplicate policy {other:?} (expected reject or last-wins)"
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::LastWins => write!(f, "last-wins"),
        }
    }
}

/// Desired entities keyed and ordered by identity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesiredSet {
    entities: BTreeMap<String, DesiredEntity>,
}

impl DesiredSet {
    pub fn from_entities<I>(entities: I, policy: DuplicatePolicy) -> Result<Self, ReconcileError>
    where
        I: IntoIterator<Item = DesiredEntity>,
    {
        let mut indexed = BTreeMap::new();
        for entity in entities {
            match indexed.entry(entity.identity.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(entity);
                }
                Entry::Occupied(mut slot) => match policy {
                    DuplicatePolicy::Reject => {
                        return Err(ReconcileError::DuplicateIdentity(entity.identity));
                    }
                    DuplicatePolicy::LastWins => {
                        debug!(identity = %entity.identity, "later declaration replaces earlier one");
                        slot.insert(entity);
                    }
                },
            }
        }
        Ok(Self { entities: indexed })
    }

    pub fn get(&self, identity: &str) -> Option<&DesiredEntity> {
        self.entities.get(identity)
    }

    /// Entities in identity order
    pub fn iter(&self) -> impl Iterator<Item = &DesiredEntity> {
        self.entities.values()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
