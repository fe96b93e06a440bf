use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{BridgeApi, BridgeError, ClusterRole};

/// Public endpoint of the managed database API
pub const DEFAULT_BRIDGE_API_URL: &str = "https://api.crunchybridge.com";

const USER_AGENT: &str = concat!("postgres-bridge-operator/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout; the reconcile deadline still applies on top
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTPS implementation of [`BridgeApi`]
#[derive(Clone, Debug)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BridgeApi for BridgeClient {
    async fn get_cluster_role(
        &self,
        api_key: &str,
        cluster_id: &str,
        role_name: &str,
    ) -> Result<ClusterRole, BridgeError> {
        let url = format!("{}/clusters/{}/roles/{}", self.base_url, cluster_id, role_name);
        debug!(cluster_id = %cluster_id, role = %role_name, "Fetching cluster role");

        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<ClusterRole>().await?),
            StatusCode::NOT_FOUND => Err(BridgeError::RoleNotFound {
                cluster_id: cluster_id.to_string(),
                role: role_name.to_string(),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BridgeError::Unauthorized),
            status => Err(BridgeError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
