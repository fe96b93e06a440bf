//! Operator configuration read from the environment

use std::time::Duration;

use thiserror::Error;

use crate::bridge::DEFAULT_BRIDGE_API_URL;
use crate::reconcile::engine::DEFAULT_PASS_TIMEOUT;
use crate::reconcile::{DuplicatePolicy, FailurePolicy, PassConfig};

/// Longest accepted pass deadline
pub const MAX_RECONCILE_TIMEOUT_SECS: u64 = 3600;

/// Environment variable names
pub mod env {
    pub const BRIDGE_API_URL: &str = "BRIDGE_API_URL";
    pub const RECONCILE_TIMEOUT_SECS: &str = "RECONCILE_TIMEOUT_SECS";
    pub const ROLE_FAILURE_POLICY: &str = "ROLE_FAILURE_POLICY";
    pub const DUPLICATE_ROLE_POLICY: &str = "DUPLICATE_ROLE_POLICY";
    pub const WATCH_NAMESPACE: &str = "WATCH_NAMESPACE";
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid value for {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

/// Runtime settings of the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Base URL of the managed database API
    pub bridge_api_url: String,
    /// Deadline of one reconcile pass
    pub reconcile_timeout: Duration,
    pub failure_policy: FailurePolicy,
    pub duplicate_policy: DuplicatePolicy,
    /// Only watch this namespace when set
    pub watch_namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            bridge_api_url: DEFAULT_BRIDGE_API_URL.to_string(),
            reconcile_timeout: DEFAULT_PASS_TIMEOUT,
            failure_policy: FailurePolicy::default(),
            duplicate_policy: DuplicatePolicy::default(),
            watch_namespace: None,
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source; unset and empty
    /// variables take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(env::BRIDGE_API_URL) {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ConfigError {
                    name: env::BRIDGE_API_URL,
                    reason: format!("{url:?} is not an http(s) URL"),
                });
            }
            config.bridge_api_url = url;
        }

        if let Some(secs) = get(env::RECONCILE_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError {
                name: env::RECONCILE_TIMEOUT_SECS,
                reason: format!("{secs:?} is not a number of seconds"),
            })?;
            if secs == 0 || secs > MAX_RECONCILE_TIMEOUT_SECS {
                return Err(ConfigError {
                    name: env::RECONCILE_TIMEOUT_SECS,
                    reason: format!("must be between 1 and {MAX_RECONCILE_TIMEOUT_SECS}"),
                });
            }
            config.reconcile_timeout = Duration::from_secs(secs);
        }

        if let Some(policy) = get(env::ROLE_FAILURE_POLICY) {
            config.failure_policy = policy.trim().parse().map_err(|reason| ConfigError {
                name: env::ROLE_FAILURE_POLICY,
                reason,
            })?;
        }

        if let Some(policy) = get(env::DUPLICATE_ROLE_POLICY) {
            config.duplicate_policy = policy.trim().parse().map_err(|reason| ConfigError {
                name: env::DUPLICATE_ROLE_POLICY,
                reason,
            })?;
        }

        config.watch_namespace = get(env::WATCH_NAMESPACE);

        Ok(config)
    }

    pub fn pass_config(&self) -> PassConfig {
        PassConfig {
            timeout: self.reconcile_timeout,
            failure_policy: self.failure_policy,
        }
    }
}
