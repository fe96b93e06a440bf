use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::core::ObjectMeta;

use crate::bridge::ClusterRole;
use crate::crd::Metadata;
use crate::reconcile::{DesiredEntity, MaterializeError, Materializer, ParentRef, merge_labels};
use crate::resources::common::{ROLE_SECRET_LABELS, standard_labels};

/// Builds the credential Secret of a PostgreSQL role
#[derive(Clone, Debug, Default)]
pub struct RoleSecretMaterializer {
    metadata: Metadata,
}

impl RoleSecretMaterializer {
    pub fn new(metadata: Option<&Metadata>) -> Self {
        Self {
            metadata: metadata.cloned().unwrap_or_default(),
        }
    }
}

impl Materializer for RoleSecretMaterializer {
    type Record = ClusterRole;
    type Object = Secret;

    fn materialize(
        &self,
        parent: &ParentRef,
        entity: &DesiredEntity,
        role: &ClusterRole,
    ) -> Result<Secret, MaterializeError> {
        generate_role_secret(parent, entity, role, &self.metadata)
    }
}

/// Generate the credential Secret for one role
pub fn generate_role_secret(
    parent: &ParentRef,
    entity: &DesiredEntity,
    role: &ClusterRole,
    metadata: &Metadata,
) -> Result<Secret, MaterializeError> {
    if parent.uid.is_empty() {
        return Err(MaterializeError::InvalidOwner(format!(
            "{} {} has no uid",
            parent.kind, parent.name
        )));
    }
    if role.password.is_empty() {
        return Err(MaterializeError::InvalidRecord(format!(
            "role {} has no password",
            entity.identity
        )));
    }

    let mut declared = standard_labels();
    declared.extend(metadata.labels.clone());
    let labels = merge_labels(&ROLE_SECRET_LABELS, parent, &entity.identity, &declared);

    let annotations = Some(metadata.annotations.clone()).filter(|a| !a.is_empty());

    let string_data = BTreeMap::from([
        ("name".to_string(), role.name.clone()),
        ("password".to_string(), role.password.clone()),
        ("uri".to_string(), role.uri.clone()),
    ]);

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(entity.target_name.clone()),
            namespace: Some(parent.namespace.clone()),
            labels: Some(labels),
            annotations,
            owner_references: Some(vec![parent.owner_reference()]),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(string_data),
        ..Default::default()
    })
}
