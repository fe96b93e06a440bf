//! Weak back-reference from a managed object to the resource that owns it

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use kube::core::ObjectMeta;

use super::ReconcileError;

/// Identity of the parent resource a reconcile pass runs for
///
/// Children carry this as a controller owner reference. Kubernetes' garbage
/// collector deletes them when the parent goes away; the engine itself only
/// ever deletes children it can prove it controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

impl ParentRef {
    /// Build a parent reference from a namespaced custom resource
    pub fn from_resource<R>(resource: &R) -> Result<Self, ReconcileError>
    where
        R: Resource<DynamicType = ()>,
    {
        let meta = resource.meta();
        let name = meta
            .name
            .clone()
            .ok_or(ReconcileError::MissingParentField("metadata.name"))?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or(ReconcileError::MissingParentField("metadata.namespace"))?;
        let uid = meta
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or(ReconcileError::MissingParentField("metadata.uid"))?;

        Ok(Self {
            api_version: R::api_version(&()).into_owned(),
            kind: R::kind(&()).into_owned(),
            name,
            namespace,
            uid,
        })
    }

    /// Controller owner reference pointing at this parent
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    /// Whether `meta` names this parent as its controller
    ///
    /// Matching is by uid only. A recreated parent with the same name does not
    /// inherit children of its predecessor.
    pub fn controls(&self, meta: &ObjectMeta) -> bool {
        meta.owner_references
            .iter()
            .flatten()
            .any(|owner| owner.controller == Some(true) && owner.uid == self.uid)
    }
}
