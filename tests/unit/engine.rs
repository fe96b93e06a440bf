//! Reconcile pass scenarios driven by the in-memory store and fetcher

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Secret;
use postgres_bridge_operator::reconcile::{
    Engine, FailureKind, FailurePolicy, PassConfig, ReconcileOutcome,
};
use postgres_bridge_operator::resources::{ROLE_SECRET_LABELS, RoleSecretMaterializer};
use tokio_util::sync::CancellationToken;

use crate::common::*;

fn engine(store: &Arc<MemoryStore>) -> Engine<Secret> {
    engine_with(store, PassConfig::default())
}

fn engine_with(store: &Arc<MemoryStore>, config: PassConfig) -> Engine<Secret> {
    Engine::<Secret>::new(store.clone(), ROLE_SECRET_LABELS, config)
}

async fn run_pass(
    store: &Arc<MemoryStore>,
    desired_set: &postgres_bridge_operator::reconcile::DesiredSet,
    fetcher: &FakeFetcher,
) -> ReconcileOutcome {
    engine(store)
        .run(
            &test_parent(),
            desired_set,
            fetcher,
            &RoleSecretMaterializer::default(),
            &CancellationToken::new(),
        )
        .await
}

fn set(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_creates_secret_for_new_role() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "app-creds")]), &fetcher).await;

    assert!(outcome.is_converged());
    assert_eq!(outcome.created, set(&["app"]));
    assert!(outcome.updated.is_empty());
    assert!(outcome.deleted.is_empty());

    let secret = store.get(TEST_NAMESPACE, "app-creds").unwrap();
    assert_eq!(secret_value(&secret, "password").as_deref(), Some("p1"));
    assert_eq!(secret_value(&secret, "name").as_deref(), Some("app"));
    assert!(
        secret_value(&secret, "uri")
            .unwrap()
            .starts_with("postgres://")
    );
    assert!(test_parent().controls(&secret.metadata));
}

#[tokio::test]
async fn test_undeclared_role_is_deleted() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "old", "old-secret"));
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "app")]), &fetcher).await;

    assert!(outcome.is_converged());
    assert_eq!(outcome.deleted, set(&["old"]));
    assert_eq!(outcome.created, set(&["app"]));
    assert_eq!(store.names(), vec!["app".to_string()]);
}

#[tokio::test]
async fn test_renamed_secret_is_recreated() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "app", "old-name"));
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "new-name")]), &fetcher).await;

    assert!(outcome.is_converged());
    assert_eq!(outcome.deleted, set(&["app"]));
    assert_eq!(outcome.created, set(&["app"]));
    assert!(outcome.updated.is_empty());
    assert_eq!(store.names(), vec!["new-name".to_string()]);

    // Old object is gone before the new one is written
    let mutations = store.mutations();
    assert_eq!(
        mutations,
        vec![
            StoreCall::Delete("old-name".to_string()),
            StoreCall::Apply("new-name".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_fetch_failure_is_isolated() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FakeFetcher::new()
        .with_role("app", "p1")
        .with_failure("app2", "connection reset");

    let outcome = run_pass(&store, &desired(&[("app", "app"), ("app2", "app2")]), &fetcher).await;

    assert_eq!(outcome.created, set(&["app"]));
    assert!(outcome.skipped.contains_key("app2"));
    assert!(store.get(TEST_NAMESPACE, "app").is_some());
    assert!(store.get(TEST_NAMESPACE, "app2").is_none());

    let error = outcome.error.expect("aggregate error");
    assert!(error.names("app2"));
    assert!(!error.names("app"));
    assert_eq!(error.failures()[0].kind, FailureKind::ExternalFetch);
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_converges_identities_and_names() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "keep", "keep-secret"));
    store.seed(owned_secret(&parent, "gone", "gone-secret"));
    let fetcher = FakeFetcher::new()
        .with_role("alpha", "a")
        .with_role("keep", "k")
        .with_role("zeta", "z");

    let outcome = run_pass(
        &store,
        &desired(&[("zeta", "zeta-s"), ("alpha", "alpha-s"), ("keep", "keep-secret")]),
        &fetcher,
    )
    .await;

    assert!(outcome.is_converged());
    assert_eq!(outcome.created, set(&["alpha", "zeta"]));
    assert_eq!(outcome.updated, set(&["keep"]));
    assert_eq!(outcome.deleted, set(&["gone"]));
    assert_eq!(
        store.names(),
        vec!["alpha-s".to_string(), "keep-secret".to_string(), "zeta-s".to_string()]
    );
    // Entities are processed in identity order
    assert_eq!(fetcher.fetched(), vec!["alpha", "keep", "zeta"]);
}

#[tokio::test]
async fn test_second_pass_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FakeFetcher::new().with_role("app", "p1").with_role("ro", "p2");
    let wanted = desired(&[("app", "app"), ("ro", "ro")]);

    let first = run_pass(&store, &wanted, &fetcher).await;
    assert!(first.is_converged());
    let versions = store.versions();

    let second = run_pass(&store, &wanted, &fetcher).await;
    assert!(second.is_converged());
    assert!(second.created.is_empty());
    assert!(second.deleted.is_empty());
    assert_eq!(second.updated, set(&["app", "ro"]));
    assert_eq!(store.versions(), versions);
}

#[tokio::test]
async fn test_rotated_password_is_updated() {
    let store = Arc::new(MemoryStore::new());
    let wanted = desired(&[("app", "app")]);

    run_pass(&store, &wanted, &FakeFetcher::new().with_role("app", "p1")).await;
    let outcome = run_pass(&store, &wanted, &FakeFetcher::new().with_role("app", "p2")).await;

    assert_eq!(outcome.updated, set(&["app"]));
    let secret = store.get(TEST_NAMESPACE, "app").unwrap();
    assert_eq!(secret_value(&secret, "password").as_deref(), Some("p2"));
}

#[tokio::test]
async fn test_deleted_orphan_does_not_reappear() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "old", "old"));
    let fetcher = FakeFetcher::new().with_role("old", "p1");

    let wanted = desired(&[]);
    let first = run_pass(&store, &wanted, &fetcher).await;
    let second = run_pass(&store, &wanted, &fetcher).await;

    assert_eq!(first.deleted, set(&["old"]));
    assert!(second.deleted.is_empty());
    assert!(store.names().is_empty());
    assert!(fetcher.fetched().is_empty());
}

#[tokio::test]
async fn test_failed_fetch_leaves_existing_secret_untouched() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    let seeded = store.seed(owned_secret(&parent, "app", "app"));
    let fetcher = FakeFetcher::new().with_failure("app", "503 Service Unavailable");

    let outcome = run_pass(&store, &desired(&[("app", "app")]), &fetcher).await;

    assert!(outcome.error.is_some());
    assert_eq!(store.get(TEST_NAMESPACE, "app"), Some(seeded));
    assert!(store.mutations().is_empty());
}

// =============================================================================
// Ownership and failures
// =============================================================================

#[tokio::test]
async fn test_objects_not_controlled_by_parent_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    let foreign = store.seed(foreign_secret(&parent, "stray", "stray"));

    let other = parent_ref(
        &BridgeClusterBuilder::new(TEST_CLUSTER, TEST_NAMESPACE)
            .with_uid(Some("previous-incarnation"))
            .build(),
    );
    let stale = store.seed(owned_secret(&other, "old", "old"));

    let outcome = run_pass(&store, &desired(&[]), &FakeFetcher::new()).await;

    assert!(outcome.is_converged());
    assert!(outcome.deleted.is_empty());
    assert_eq!(store.get(TEST_NAMESPACE, "stray"), Some(foreign));
    assert_eq!(store.get(TEST_NAMESPACE, "old"), Some(stale));
}

#[tokio::test]
async fn test_apply_restores_stripped_owner_reference() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    let seeded = store.seed(foreign_secret(&parent, "app", "app-creds"));
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "app-creds")]), &fetcher).await;

    // Not listed as ours, so the apply counts as a create and nothing is deleted
    assert!(outcome.is_converged());
    assert_eq!(outcome.created, set(&["app"]));
    assert!(outcome.updated.is_empty());
    assert!(outcome.deleted.is_empty());

    let secret = store.get(TEST_NAMESPACE, "app-creds").unwrap();
    assert_eq!(secret.metadata.uid, seeded.metadata.uid);
    assert!(parent.controls(&secret.metadata));
    assert_eq!(secret_value(&secret, "password").as_deref(), Some("p1"));

    let outcome = run_pass(&store, &desired(&[("app", "app-creds")]), &fetcher).await;
    assert_eq!(outcome.updated, set(&["app"]));
    assert!(outcome.created.is_empty());
}

#[tokio::test]
async fn test_apply_restores_controller_flag() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    let mut secret = owned_secret(&parent, "app", "app-creds");
    let mut reference = parent.owner_reference();
    reference.controller = Some(false);
    secret.metadata.owner_references = Some(vec![reference]);
    store.seed(secret);
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "app-creds")]), &fetcher).await;

    assert_eq!(outcome.created, set(&["app"]));
    assert!(store.mutations().iter().all(|call| !matches!(call, StoreCall::Delete(_))));

    let secret = store.get(TEST_NAMESPACE, "app-creds").unwrap();
    let owners = secret.metadata.owner_references.clone().unwrap_or_default();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].controller, Some(true));
    assert_eq!(owners[0].uid, parent.uid);
    assert!(parent.controls(&secret.metadata));
}

#[tokio::test]
async fn test_secret_without_identity_label_is_collected() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    let mut unlabeled = owned_secret(&parent, "x", "unlabeled");
    if let Some(labels) = unlabeled.metadata.labels.as_mut() {
        labels.remove(postgres_bridge_operator::resources::common::LABEL_BRIDGE_POSTGRES_ROLE);
    }
    store.seed(unlabeled);

    let outcome = run_pass(&store, &desired(&[]), &FakeFetcher::new()).await;

    assert_eq!(outcome.deleted, set(&["unlabeled"]));
    assert!(store.names().is_empty());
}

#[tokio::test]
async fn test_list_failure_makes_no_changes() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "old", "old"));
    store.fail_list("etcdserver: request timed out");
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "app")]), &fetcher).await;

    let error = outcome.error.clone().expect("aggregate error");
    assert!(error.is_list_failure());
    assert!(outcome.skipped.contains_key("app"));
    assert!(outcome.created.is_empty());
    assert!(store.mutations().is_empty());
    assert!(fetcher.fetched().is_empty());
    assert_eq!(store.names(), vec!["old".to_string()]);
}

#[tokio::test]
async fn test_delete_failure_does_not_stop_the_pass() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "a-old", "a-old"));
    store.seed(owned_secret(&parent, "b-old", "b-old"));
    store.fail_delete("a-old");
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = run_pass(&store, &desired(&[("app", "app")]), &fetcher).await;

    assert_eq!(outcome.deleted, set(&["b-old"]));
    assert_eq!(outcome.created, set(&["app"]));
    let error = outcome.error.expect("aggregate error");
    assert_eq!(error.len(), 1);
    assert_eq!(error.failures()[0].kind, FailureKind::GcDelete);
    assert!(error.names("a-old"));
    assert_eq!(store.names(), vec!["a-old".to_string(), "app".to_string()]);
}

#[tokio::test]
async fn test_apply_failure_is_isolated() {
    let store = Arc::new(MemoryStore::new());
    store.fail_apply("app");
    let fetcher = FakeFetcher::new().with_role("app", "p1").with_role("ro", "p2");

    let outcome = run_pass(&store, &desired(&[("app", "app"), ("ro", "ro")]), &fetcher).await;

    assert_eq!(outcome.created, set(&["ro"]));
    assert!(outcome.skipped.contains_key("app"));
    let error = outcome.error.expect("aggregate error");
    assert_eq!(error.failures()[0].kind, FailureKind::Apply);
}

#[tokio::test]
async fn test_empty_password_is_a_materialization_failure() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FakeFetcher::new().with_role("app", "");

    let outcome = run_pass(&store, &desired(&[("app", "app")]), &fetcher).await;

    let error = outcome.error.expect("aggregate error");
    assert_eq!(error.failures()[0].kind, FailureKind::Materialization);
    assert!(store.names().is_empty());
}

#[tokio::test]
async fn test_log_only_policy_drops_entity_failures() {
    let store = Arc::new(MemoryStore::new());
    let parent = test_parent();
    store.seed(owned_secret(&parent, "old", "old"));
    store.fail_delete("old");
    let fetcher = FakeFetcher::new()
        .with_role("app", "p1")
        .with_failure("app2", "boom");
    let config = PassConfig {
        failure_policy: FailurePolicy::LogOnly,
        ..PassConfig::default()
    };

    let outcome = engine_with(&store, config)
        .run(
            &parent,
            &desired(&[("app", "app"), ("app2", "app2")]),
            &fetcher,
            &RoleSecretMaterializer::default(),
            &CancellationToken::new(),
        )
        .await;

    // The fetch failure is only logged; the GC failure is still reported
    assert!(outcome.skipped.contains_key("app2"));
    let error = outcome.error.expect("aggregate error");
    assert_eq!(error.len(), 1);
    assert_eq!(error.failures()[0].kind, FailureKind::GcDelete);
}

#[tokio::test]
async fn test_cancelled_pass_stops_issuing_calls() {
    let store = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let fetcher = FakeFetcher::new()
        .with_role("a", "p1")
        .with_role("b", "p2")
        .with_role("c", "p3")
        .cancel_after("a", cancel.clone());

    let outcome = engine(&store)
        .run(
            &test_parent(),
            &desired(&[("a", "a"), ("b", "b"), ("c", "c")]),
            &fetcher,
            &RoleSecretMaterializer::default(),
            &cancel,
        )
        .await;

    assert_eq!(fetcher.fetched(), vec!["a"]);
    assert!(outcome.created.is_empty());
    assert_eq!(
        outcome.skipped.keys().cloned().collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
    assert!(store.mutations().is_empty());
    assert!(outcome.skipped.values().all(|reason| reason == "pass cancelled"));
    let error = outcome.error.expect("aggregate error");
    let subjects: Vec<_> = error.failures().iter().map(|f| f.subject.as_str()).collect();
    assert_eq!(subjects, vec!["a", "b", "c"]);
    assert!(
        error
            .failures()
            .iter()
            .all(|f| f.kind == FailureKind::Cancelled)
    );
}

#[tokio::test]
async fn test_unbounded_timeout_does_not_overflow() {
    let store = Arc::new(MemoryStore::new());
    let config = PassConfig {
        timeout: Duration::MAX,
        ..PassConfig::default()
    };
    let fetcher = FakeFetcher::new().with_role("app", "p1");

    let outcome = engine_with(&store, config)
        .run(
            &test_parent(),
            &desired(&[("app", "app")]),
            &fetcher,
            &RoleSecretMaterializer::default(),
            &CancellationToken::new(),
        )
        .await;

    assert!(outcome.is_converged());
    assert_eq!(outcome.created, set(&["app"]));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_the_pass() {
    struct SlowFetcher;

    #[async_trait::async_trait]
    impl postgres_bridge_operator::reconcile::ExternalFetcher for SlowFetcher {
        type Record = postgres_bridge_operator::bridge::ClusterRole;

        async fn fetch(
            &self,
            _parent: &postgres_bridge_operator::reconcile::ParentRef,
            entity: &postgres_bridge_operator::reconcile::DesiredEntity,
        ) -> Result<Self::Record, postgres_bridge_operator::reconcile::FetchError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(cluster_role(&entity.identity, "late"))
        }
    }

    let store = Arc::new(MemoryStore::new());
    let config = PassConfig {
        timeout: Duration::from_secs(5),
        ..PassConfig::default()
    };

    let outcome = engine_with(&store, config)
        .run(
            &test_parent(),
            &desired(&[("app", "app")]),
            &SlowFetcher,
            &RoleSecretMaterializer::default(),
            &CancellationToken::new(),
        )
        .await;

    let error = outcome.error.expect("aggregate error");
    assert_eq!(error.failures()[0].kind, FailureKind::ExternalFetch);
    assert!(error.to_string().contains("deadline exceeded"));
    assert!(store.names().is_empty());
}
