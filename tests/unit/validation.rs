//! Unit tests for validation logic

use postgres_bridge_operator::controller::validation::{
    MAX_ROLE_NAME_LENGTH, validate_role_name, validate_secret_name, validate_spec,
};
use postgres_bridge_operator::reconcile::DuplicatePolicy;

use crate::common::*;

#[test]
fn test_valid_spec() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_role("application", "hippo-application")
        .with_role("readonly", "hippo.readonly")
        .build();
    assert!(validate_spec(&cluster.spec, DuplicatePolicy::Reject).is_ok());
}

#[test]
fn test_spec_without_roles_is_valid() {
    assert!(validate_spec(&test_cluster().spec, DuplicatePolicy::Reject).is_ok());
}

#[test]
fn test_empty_cluster_id_rejected() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_cluster_id("  ")
        .build();
    let err = validate_spec(&cluster.spec, DuplicatePolicy::Reject).unwrap_err();
    assert!(err.to_string().contains("clusterId"));
    assert!(!err.is_retryable());
}

#[test]
fn test_empty_secret_rejected() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_secret("")
        .build();
    assert!(validate_spec(&cluster.spec, DuplicatePolicy::Reject).is_err());
}

#[test]
fn test_duplicate_roles() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_role("application", "a")
        .with_role("application", "b")
        .build();
    let err = validate_spec(&cluster.spec, DuplicatePolicy::Reject).unwrap_err();
    assert!(err.to_string().contains("more than once"));
    assert!(validate_spec(&cluster.spec, DuplicatePolicy::LastWins).is_ok());
}

#[test]
fn test_name_length_limits() {
    assert!(validate_role_name(&"a".repeat(MAX_ROLE_NAME_LENGTH)).is_ok());
    assert!(validate_role_name(&"a".repeat(MAX_ROLE_NAME_LENGTH + 1)).is_err());
    let long_secret = format!("{}.{}", "a".repeat(63), "b".repeat(63));
    assert!(validate_secret_name(&long_secret).is_ok());
    assert!(validate_secret_name(&"a".repeat(254)).is_err());
}

#[test]
fn test_invalid_role_in_spec_rejected() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_role("Application", "hippo-application")
        .build();
    assert!(validate_spec(&cluster.spec, DuplicatePolicy::Reject).is_err());
}

#[test]
fn test_shared_secret_name_rejected() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_role("application", "hippo-creds")
        .with_role("readonly", "hippo-creds")
        .build();
    let err = validate_spec(&cluster.spec, DuplicatePolicy::LastWins).unwrap_err();
    assert!(err.to_string().contains("hippo-creds"));
}

#[test]
fn test_redeclared_role_may_reuse_its_secret_under_last_wins() {
    let cluster = BridgeClusterBuilder::new("hippo", "default")
        .with_role("application", "hippo-creds")
        .with_role("application", "hippo-creds")
        .build();
    assert!(validate_spec(&cluster.spec, DuplicatePolicy::LastWins).is_ok());
}
