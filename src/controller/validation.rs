//! Validation of BridgeCluster specs
//!
//! Role names end up in label values and Secret names end up as object names,
//! so both are checked before anything is reconciled.

use std::collections::{BTreeMap, BTreeSet};

use crate::controller::error::{Error, Result};
use crate::crd::BridgeClusterSpec;
use crate::reconcile::DuplicatePolicy;

/// Maximum length of a label value
pub const MAX_ROLE_NAME_LENGTH: usize = 63;

/// Maximum length of a DNS-1123 subdomain
pub const MAX_SECRET_NAME_LENGTH: usize = 253;

/// Validate the cluster spec
pub fn validate_spec(spec: &BridgeClusterSpec, duplicates: DuplicatePolicy) -> Result<()> {
    if spec.cluster_id.trim().is_empty() {
        return Err(Error::ValidationError("clusterId must not be empty".to_string()));
    }
    if spec.secret.trim().is_empty() {
        return Err(Error::ValidationError("secret must not be empty".to_string()));
    }

    let mut seen = BTreeSet::new();
    for role in &spec.roles {
        validate_role_name(&role.name)?;
        validate_secret_name(&role.secret_name)?;
        if !seen.insert(role.name.as_str()) && duplicates == DuplicatePolicy::Reject {
            return Err(Error::ValidationError(format!(
                "role {} is declared more than once",
                role.name
            )));
        }
    }

    // Two roles writing one Secret would overwrite each other every pass.
    // Under last-wins only the surviving declaration of each role counts.
    let mut targets: BTreeMap<&str, &str> = BTreeMap::new();
    for role in &spec.roles {
        targets.insert(role.name.as_str(), role.secret_name.as_str());
    }
    let mut secrets = BTreeSet::new();
    for (role, secret) in targets {
        if !secrets.insert(secret) {
            return Err(Error::ValidationError(format!(
                "secret {secret} is used by more than one role (including {role})"
            )));
        }
    }

    Ok(())
}

/// Role names match `^[a-z0-9]([-a-z0-9]*[a-z0-9])?$`: a DNS-1123 label
pub fn validate_role_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_ROLE_NAME_LENGTH {
        return Err(Error::ValidationError(format!(
            "role name {name:?} must be 1 to {MAX_ROLE_NAME_LENGTH} characters"
        )));
    }
    if !is_dns_label(name) {
        return Err(Error::ValidationError(format!(
            "role name {name:?} may contain only lowercase letters, numbers and hyphens, \
             and must start and end with a letter or number"
        )));
    }
    Ok(())
}

/// Secret names must be DNS-1123 subdomains
pub fn validate_secret_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_SECRET_NAME_LENGTH {
        return Err(Error::ValidationError(format!(
            "secret name {name:?} must be 1 to {MAX_SECRET_NAME_LENGTH} characters"
        )));
    }
    if !name.split('.').all(is_dns_label) {
        return Err(Error::ValidationError(format!(
            "secret name {name:?} is not a valid DNS-1123 subdomain"
        )));
    }
    Ok(())
}

fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            alnum(first) && alnum(last) && bytes.iter().all(|b| alnum(b) || *b == b'-')
        }
        _ => false,
    }
}
