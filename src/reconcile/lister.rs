//! Actual state: the children a parent currently owns

use std::collections::BTreeMap;

use kube::{Resource, ResourceExt};
use tracing::debug;

use super::parent::ParentRef;
use super::store::{ObjectStore, StoreError};

/// Label keys that scope one kind of managed object to its parent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagedLabels {
    /// Label holding the parent's name
    pub parent: &'static str,
    /// Label distinguishing this kind of child from others of the same parent
    pub kind: &'static str,
    /// Value of the `kind` label for this kind of child
    pub kind_value: &'static str,
    /// Label holding the entity identity
    pub identity: &'static str,
}

impl ManagedLabels {
    /// Selector matching every child of this kind owned by `parent`
    pub fn selector(&self, parent: &ParentRef) -> String {
        let terms = BTreeMap::from([
            (self.parent, parent.name.as_str()),
            (self.kind, self.kind_value),
        ]);
        terms
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Reserved labels for the child holding `identity`
    pub fn for_entity(&self, parent: &ParentRef, identity: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (self.parent.to_string(), parent.name.clone()),
            (self.kind.to_string(), self.kind_value.to_string()),
            (self.identity.to_string(), identity.to_string()),
        ])
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        key == self.parent || key == self.kind || key == self.identity
    }
}

/// A listed child together with the identity read from its labels
#[derive(Clone, Debug, PartialEq)]
pub struct ManagedObject<K> {
    pub identity: String,
    pub object: K,
}

impl<K: Resource> ManagedObject<K> {
    pub fn name(&self) -> String {
        self.object.meta().name.clone().unwrap_or_default()
    }
}

/// Children owned by a parent, ordered by identity then name
#[derive(Clone, Debug, PartialEq)]
pub struct ActualState<K> {
    pub objects: Vec<ManagedObject<K>>,
}

impl<K> Default for ActualState<K> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
        }
    }
}

impl<K: Resource> ActualState<K> {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// List the children of `parent` selected by `labels`
///
/// Objects that match the selector but are not controlled by `parent` are
/// dropped here, so nothing downstream can modify them. A child without an
/// identity label gets an empty identity and is later collected as an orphan.
pub async fn list_actual<K, S>(
    store: &S,
    parent: &ParentRef,
    labels: &ManagedLabels,
) -> Result<ActualState<K>, StoreError>
where
    K: Resource,
    S: ObjectStore<K> + ?Sized,
{
    let selector = labels.selector(parent);
    let items = store.list(&parent.namespace, &selector).await?;

    let mut objects: Vec<ManagedObject<K>> = items
        .into_iter()
        .filter(|object| {
            let owned = parent.controls(object.meta());
            if !owned {
                debug!(
                    name = %object.meta().name.as_deref().unwrap_or_default(),
                    parent = %parent.name,
                    "Ignoring object not controlled by parent"
                );
            }
            owned
        })
        .map(|object| ManagedObject {
            identity: object
                .labels()
                .get(labels.identity)
                .cloned()
                .unwrap_or_default(),
            object,
        })
        .collect();

    objects.sort_by(|a, b| {
        (a.identity.as_str(), a.object.meta().name.as_deref())
            .cmp(&(b.identity.as_str(), b.object.meta().name.as_deref()))
    });

    Ok(ActualState { objects })
}
