//! External State Fetcher: per-entity data owned by an outside authority

use async_trait::async_trait;
use thiserror::Error;

use super::desired::DesiredEntity;
use super::parent::ParentRef;

/// Errors returned while fetching an external record
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no external record for {0}")]
    NotFound(String),

    #[error("external authority unavailable: {0}")]
    Unavailable(String),

    #[error("external authority rejected the request: {0}")]
    Rejected(String),
}

/// Narrow capability to read the external record of one entity
///
/// Records are fetched fresh on every pass and never cached.
#[async_trait]
pub trait ExternalFetcher: Send + Sync {
    type Record: Send + Sync;

    async fn fetch(
        &self,
        parent: &ParentRef,
        entity: &DesiredEntity,
    ) -> Result<Self::Record, FetchError>;
}
