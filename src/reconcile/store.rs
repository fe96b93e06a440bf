//! Object Store access: list, idempotent apply, owner-checked delete

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, Preconditions};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "postgres-bridge-operator";

/// Errors returned by an [`ObjectStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("object is missing {0}")]
    MissingMetadata(&'static str),

    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// The slice of the platform's object API the engine depends on
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    /// List objects in `namespace` matching a label selector
    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<K>, StoreError>;

    /// Create the object or replace the fields this operator owns
    async fn apply(&self, object: &K) -> Result<K, StoreError>;

    /// Delete the object, only if it is still the instance that was listed
    async fn delete(&self, object: &K) -> Result<(), StoreError>;
}

/// [`ObjectStore`] backed by the Kubernetes API
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items)
    }

    async fn apply(&self, object: &K) -> Result<K, StoreError> {
        let namespace = object
            .namespace()
            .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
        let name = object
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("metadata.name"))?;

        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        // Forced server-side apply: take back fields another manager changed,
        // owner references included.
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let applied = api.patch(&name, &params, &Patch::Apply(object)).await?;
        debug!(kind = %K::kind(&()), name = %name, "Applied object");

        Ok(applied)
    }

    async fn delete(&self, object: &K) -> Result<(), StoreError> {
        let namespace = object
            .namespace()
            .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
        let name = object
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("metadata.name"))?;

        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let params = DeleteParams {
            preconditions: Some(Preconditions {
                uid: object.meta().uid.clone(),
                resource_version: None,
            }),
            ..Default::default()
        };

        match api.delete(&name, &params).await {
            Ok(_) => {
                debug!(kind = %K::kind(&()), name = %name, "Deleted object");
                Ok(())
            }
            // Already gone is the state we wanted
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
