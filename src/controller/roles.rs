//! PostgreSQL role credentials: desired roles and their external records

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};

use crate::bridge::{BridgeApi, BridgeError, ClusterRole};
use crate::controller::error::{Error, Result};
use crate::crd::BridgeRoleSpec;
use crate::reconcile::{
    DesiredEntity, DesiredSet, DuplicatePolicy, ExternalFetcher, FetchError, ParentRef,
};

/// Key of the API key inside the referenced Secret
pub const API_KEY_SECRET_KEY: &str = "key";

/// Index declared roles by role name
pub fn desired_roles(roles: &[BridgeRoleSpec], policy: DuplicatePolicy) -> Result<DesiredSet> {
    let entities = roles
        .iter()
        .map(|role| DesiredEntity::new(&role.name, &role.secret_name));
    Ok(DesiredSet::from_entities(entities, policy)?)
}

/// Fetches role credentials from the managed database API
pub struct BridgeRoleFetcher<'a> {
    api: &'a dyn BridgeApi,
    api_key: &'a str,
    cluster_id: &'a str,
}

impl<'a> BridgeRoleFetcher<'a> {
    pub fn new(api: &'a dyn BridgeApi, api_key: &'a str, cluster_id: &'a str) -> Self {
        Self {
            api,
            api_key,
            cluster_id,
        }
    }
}

impl From<BridgeError> for FetchError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::RoleNotFound { .. } => FetchError::NotFound(e.to_string()),
            BridgeError::Unauthorized => FetchError::Rejected(e.to_string()),
            e if e.is_transient() => FetchError::Unavailable(e.to_string()),
            e => FetchError::Rejected(e.to_string()),
        }
    }
}

#[async_trait]
impl ExternalFetcher for BridgeRoleFetcher<'_> {
    type Record = ClusterRole;

    async fn fetch(
        &self,
        _parent: &ParentRef,
        entity: &DesiredEntity,
    ) -> std::result::Result<ClusterRole, FetchError> {
        let role = self
            .api
            .get_cluster_role(self.api_key, self.cluster_id, &entity.identity)
            .await?;
        Ok(role)
    }
}

/// Read the managed database API key from `secret_name`
pub async fn load_api_key(client: &Client, namespace: &str, secret_name: &str) -> Result<String> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets
        .get_opt(secret_name)
        .await?
        .ok_or_else(|| Error::ApiKeyError(format!("secret {namespace}/{secret_name} not found")))?;
    api_key_from_secret(&secret).ok_or_else(|| {
        Error::ApiKeyError(format!(
            "secret {namespace}/{secret_name} has no {API_KEY_SECRET_KEY:?} entry"
        ))
    })
}

/// Extract the API key from a Secret's data
pub fn api_key_from_secret(secret: &Secret) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(API_KEY_SECRET_KEY))
        .map(|v| String::from_utf8_lossy(&v.0).trim().to_string())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|d| d.get(API_KEY_SECRET_KEY))
                .map(|v| v.trim().to_string())
        })
        .filter(|key| !key.is_empty())
}
