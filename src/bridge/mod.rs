//! Client for the managed PostgreSQL (Bridge) API
//!
//! The operator only reads from the API: it looks up the generated
//! credentials of each role so they can be written into a Secret.

mod client;

pub use client::{BridgeClient, DEFAULT_BRIDGE_API_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// A PostgreSQL role as reported by the managed database API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRole {
    /// Role name
    pub name: String,
    /// Generated password
    pub password: String,
    /// Connection URI with the credentials embedded
    pub uri: String,
}

/// Errors returned by the Bridge API client
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("role {role} not found in cluster {cluster_id}")]
    RoleNotFound { cluster_id: String, role: String },

    #[error("unauthorized: API key rejected")]
    Unauthorized,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

impl BridgeError {
    /// Whether a later attempt can succeed without a spec change
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Http(_) => true,
            BridgeError::Status { status, .. } => *status == 429 || *status >= 500,
            BridgeError::RoleNotFound { .. } | BridgeError::Unauthorized => false,
        }
    }
}

/// Operations the operator needs from the managed database API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Fetch a role and its current credentials
    async fn get_cluster_role(
        &self,
        api_key: &str,
        cluster_id: &str,
        role_name: &str,
    ) -> Result<ClusterRole, BridgeError>;
}
