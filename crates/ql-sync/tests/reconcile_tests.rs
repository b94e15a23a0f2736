use pretty_assertions::assert_eq;
use ql_catalog::{Counter, EntityKind, LocalSnapshot, UserRecord};
use ql_store::{CacheKey, LocalCache, MokaLocalCache, StorePath};
use ql_sync::{
    delete_user, Decision, ManualClock, MigrationRunner, Reconciler, ReconcilerConfig, SyncError,
    SyncMode, SyncOperation,
};
use ql_test_utils::{
    catalog_v1, catalog_v2, store_with_users, user_id, user_with_progress, BrokenCache, FlakyStore,
};
use serde_json::{json, Value};
use std::sync::Arc;

type TestReconciler<C = MokaLocalCache> = Reconciler<Arc<FlakyStore>, C, Arc<ManualClock>>;

struct Harness<C = MokaLocalCache> {
    store: Arc<FlakyStore>,
    clock: Arc<ManualClock>,
    reconciler: TestReconciler<C>,
}

fn store_and_clock(users: Vec<(&str, Value)>, now: i64) -> (Arc<FlakyStore>, Arc<ManualClock>) {
    (
        Arc::new(FlakyStore::new(store_with_users(users))),
        Arc::new(ManualClock::new(now)),
    )
}

fn harness_with<C: LocalCache>(users: Vec<(&str, Value)>, cache: C, now: i64) -> Harness<C> {
    let (store, clock) = store_and_clock(users, now);
    let reconciler = Reconciler::new(
        Arc::clone(&store),
        cache,
        Arc::clone(&clock),
        Arc::new(catalog_v1()),
    );
    Harness {
        store,
        clock,
        reconciler,
    }
}

fn harness(users: Vec<(&str, Value)>, now: i64) -> Harness {
    let (store, clock) = store_and_clock(users, now);
    let reconciler = Reconciler::from_config(
        Arc::clone(&store),
        &ReconcilerConfig::new().with_cache_capacity(100),
        Arc::clone(&clock),
        Arc::new(catalog_v1()),
    );
    Harness {
        store,
        clock,
        reconciler,
    }
}

fn points(current: i64, at: i64) -> UserRecord {
    UserRecord {
        points: Some(Counter::new(current, 800)),
        ..UserRecord::default()
    }
    .stamped(at)
}

fn key(id: &str) -> CacheKey {
    CacheKey::for_user(&user_id(id))
}

#[tokio::test]
async fn test_newer_remote_overwrites_cache() {
    let h = harness(
        vec![("ada", json!({"lastUpdated": 200, "points": {"current": 7, "total": 800}}))],
        150,
    );
    let ada = user_id("ada");
    h.reconciler
        .cache()
        .put(&key("ada"), &LocalSnapshot::new(points(5, 100)))
        .await
        .unwrap();

    let result = h.reconciler.sync(&ada, points(5, 100), false).await.unwrap();

    assert_eq!(result.decision, Decision::RemoteWins);
    assert_eq!(result.authoritative, points(7, 200));
    assert!(!result.remote_written);
    assert!(h.store.writes().is_empty());

    let cached = h.reconciler.cache().get(&key("ada")).await.unwrap().unwrap();
    assert_eq!(cached.record, points(7, 200));
}

#[tokio::test]
async fn test_newer_local_is_pushed_and_mirrored() {
    let h = harness(
        vec![("ada", json!({"lastUpdated": 200, "points": {"current": 7, "total": 800}}))],
        250,
    );
    let ada = user_id("ada");

    let result = h.reconciler.sync(&ada, points(9, 300), false).await.unwrap();

    assert_eq!(result.decision, Decision::LocalWins);
    assert!(result.remote_written);

    let stored = h.store.inner().get(&StorePath::user(&ada)).unwrap();
    assert_eq!(stored["points"], json!({"current": 9, "total": 800}));
    let stamp = stored["lastUpdated"].as_i64().unwrap();
    assert!(stamp > 300);

    let cached = h.reconciler.cache().get(&key("ada")).await.unwrap().unwrap();
    assert_eq!(cached.last_updated(), stamp);
    assert_eq!(result.authoritative.last_updated(), stamp);
}

#[tokio::test]
async fn test_push_only_never_reads_remote() {
    let h = harness(
        vec![("ada", json!({"lastUpdated": 900, "points": {"current": 1, "total": 800}}))],
        1_000,
    );
    let ada = user_id("ada");
    h.store.fail_reads_for("ada");

    let result = h.reconciler.push(&ada, points(42, 950)).await.unwrap();

    assert_eq!(result.decision, Decision::Pushed);
    assert!(h.store.reads().is_empty());

    let stored = h.store.inner().get(&StorePath::user(&ada)).unwrap();
    assert_eq!(stored["points"], json!({"current": 42, "total": 800}));
    assert!(stored["lastUpdated"].as_i64().unwrap() >= 950);
}

#[tokio::test]
async fn test_push_only_leaves_other_fields() {
    let h = harness(
        vec![("ada", json!({"lastUpdated": 5, "xp": {"current": 10, "level": 2}}))],
        10,
    );
    let ada = user_id("ada");

    h.reconciler.push(&ada, points(3, 5)).await.unwrap();

    let stored = h.store.inner().get(&StorePath::user(&ada)).unwrap();
    assert_eq!(stored["xp"], json!({"current": 10, "level": 2}));
    assert_eq!(stored["lastUpdated"], json!(10));
}

#[tokio::test]
async fn test_failed_write_keeps_previous_cache() {
    let h = harness(vec![("ada", json!({"lastUpdated": 100}))], 500);
    let ada = user_id("ada");
    let previous = LocalSnapshot::new(points(1, 100));
    h.reconciler.cache().put(&key("ada"), &previous).await.unwrap();
    h.store.fail_writes_for("ada");

    let err = h.reconciler.sync(&ada, points(2, 400), false).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Store {
            operation: SyncOperation::WriteRemote,
            ..
        }
    ));
    assert!(err.notification().starts_with("write user record: "));
    assert!(err.is_retryable());
    assert_eq!(
        h.reconciler.cache().get(&key("ada")).await.unwrap(),
        Some(previous)
    );
}

#[tokio::test]
async fn test_failed_read_keeps_previous_cache() {
    let h = harness(vec![("ada", json!({"lastUpdated": 100}))], 500);
    let ada = user_id("ada");
    let previous = LocalSnapshot::new(points(1, 100));
    h.reconciler.cache().put(&key("ada"), &previous).await.unwrap();
    h.store.fail_reads_for("ada");

    let err = h
        .reconciler
        .reconcile(&ada, Some(points(2, 50)), SyncMode::Bidirectional, true)
        .await
        .unwrap_err();

    assert_eq!(err.operation(), SyncOperation::ReadRemote);
    assert_eq!(
        h.reconciler.cache().get(&key("ada")).await.unwrap(),
        Some(previous)
    );
}

#[tokio::test]
async fn test_first_load_defaults_missing_collections() {
    let h = harness(
        vec![(
            "ada",
            json!({
                "lastUpdated": 70,
                "points": {"current": 3, "total": 800},
                "quests": {"questA": {"title": "First steps", "xp": 50, "completed": true}},
                "xp": "broken"
            }),
        )],
        100,
    );
    let ada = user_id("ada");

    let result = h.reconciler.load(&ada).await.unwrap();

    assert_eq!(result.decision, Decision::FirstLoad);
    assert!(!result.remote_written);
    assert!(h.store.writes().is_empty());

    let record = &result.authoritative;
    assert_eq!(record.last_updated(), 70);
    assert_eq!(record.points, Some(Counter::new(3, 800)));
    assert_eq!(record.mpoints, Some(Counter::default()));
    assert_eq!(record.xp.map(|xp| xp.level), Some(1));
    assert_eq!(
        record.quests,
        Some(json!({"questA": {"title": "First steps", "xp": 50, "completed": true}}))
    );
    assert_eq!(
        record.collection(EntityKind::RankedTask).and_then(Value::as_array).map(Vec::len),
        Some(2)
    );

    let cached = h.reconciler.cache().get(&key("ada")).await.unwrap().unwrap();
    assert_eq!(&cached.record, record);
}

#[tokio::test]
async fn test_second_load_is_in_sync() {
    let h = harness(vec![("ada", json!({"lastUpdated": 70}))], 100);
    let ada = user_id("ada");

    let first = h.reconciler.load(&ada).await.unwrap();
    assert_eq!(first.decision, Decision::FirstLoad);

    // The first load cached a defaulted record the store does not hold yet
    let second = h.reconciler.load(&ada).await.unwrap();
    assert_eq!(second.decision, Decision::LocalWins);
    assert!(second.remote_written);

    let third = h.reconciler.load(&ada).await.unwrap();
    assert_eq!(third.decision, Decision::InSync);
    assert!(!third.remote_written);
    assert_eq!(third.authoritative, second.authoritative);
}

#[tokio::test]
async fn test_load_unknown_user() {
    let h = harness(vec![], 1);
    let err = h.reconciler.load(&user_id("ghost")).await.unwrap_err();
    assert!(matches!(err, SyncError::UserNotFound(_)));
}

#[tokio::test]
async fn test_unreadable_cache_falls_back_to_remote() {
    let h = harness_with(vec![("ada", json!({"lastUpdated": 70}))], BrokenCache::all(), 100);

    let result = h.reconciler.load(&user_id("ada")).await.unwrap();

    assert_eq!(result.decision, Decision::FirstLoad);
    assert!(result.cache_degraded);
    assert_eq!(result.authoritative.last_updated(), 70);
}

#[tokio::test]
async fn test_cache_write_failure_does_not_fail_push() {
    let h = harness_with(vec![], BrokenCache::writes_only(), 100);
    let ada = user_id("ada");

    let result = h.reconciler.push(&ada, points(4, 0)).await.unwrap();

    assert!(result.remote_written);
    assert!(result.cache_degraded);
    assert_eq!(
        h.store.inner().get(&StorePath::user_field(&ada, "points")),
        Some(json!({"current": 4, "total": 800}))
    );
}

#[tokio::test]
async fn test_record_login_stamps_store_and_cache() {
    let h = harness(vec![("ada", json!({"lastUpdated": 70}))], 1_700_000_000_000);
    let ada = user_id("ada");
    h.reconciler.load(&ada).await.unwrap();
    h.clock.advance(1_500);

    let stamp = h.reconciler.record_login(&ada).await.unwrap();

    assert_eq!(stamp, "2023-11-14T22:13:21.500Z");
    assert_eq!(
        h.store.inner().get(&StorePath::user_field(&ada, "lastLogin")),
        Some(json!(stamp))
    );
    let cached = h.reconciler.cache().get(&key("ada")).await.unwrap().unwrap();
    assert_eq!(cached.record.last_login.as_deref(), Some(stamp.as_str()));
    assert_eq!(cached.last_updated(), 70);
}

#[tokio::test]
async fn test_concurrent_pushes_leave_consistent_cache() {
    let h = Arc::new(harness(vec![], 1_000));
    let ada = user_id("ada");

    let tasks: Vec<_> = (1..=8)
        .map(|n| {
            let h = Arc::clone(&h);
            let ada = ada.clone();
            tokio::spawn(async move { h.reconciler.push(&ada, points(n, 0)).await.unwrap() })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let cached = h.reconciler.cache().get(&key("ada")).await.unwrap().unwrap();
    let stored = h.store.inner().get(&StorePath::user(&ada)).unwrap();
    assert_eq!(serde_json::to_value(&cached.record).unwrap(), stored);
}

fn quest_ids(record: &Value) -> Vec<String> {
    record["quests"]
        .as_object()
        .map(|quests| quests.keys().cloned().collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_reload_after_migration_adopts_migrated_record() {
    let h = harness(vec![("ada", user_with_progress(100))], 1_000);
    let ada = user_id("ada");
    h.reconciler.load(&ada).await.unwrap();

    h.clock.advance(500);
    let report = MigrationRunner::new(Arc::clone(&h.store), Arc::new(catalog_v2()))
        .with_clock(Arc::clone(&h.clock))
        .run()
        .await
        .unwrap();
    assert_eq!(report.stamped, 1);

    let reload = h.reconciler.load(&ada).await.unwrap();

    assert_eq!(reload.decision, Decision::RemoteWins);
    assert!(!reload.remote_written);
    let stored = h.store.inner().get(&StorePath::user(&ada)).unwrap();
    assert_eq!(quest_ids(&stored), vec!["questA", "questC"]);
    assert_eq!(stored["lastUpdated"], json!(1_500));

    let cached = h.reconciler.cache().get(&key("ada")).await.unwrap().unwrap();
    assert_eq!(cached.last_updated(), 1_500);
    let cached = serde_json::to_value(&cached.record).unwrap();
    assert_eq!(quest_ids(&cached), vec!["questA", "questC"]);
}

#[tokio::test]
async fn test_load_after_delete_evicts_stale_snapshot() {
    let h = harness(vec![("ada", user_with_progress(100))], 1_000);
    let ada = user_id("ada");
    h.reconciler.load(&ada).await.unwrap();

    // Deleted from another session with its own cache
    delete_user(&*h.store, &MokaLocalCache::new(10), &ada).await.unwrap();
    let writes_before = h.store.writes().len();

    let err = h.reconciler.load(&ada).await.unwrap_err();

    assert!(matches!(err, SyncError::UserNotFound(_)));
    assert!(h.store.inner().get(&StorePath::user(&ada)).is_none());
    assert_eq!(h.store.writes().len(), writes_before);
    assert!(h.reconciler.cache().get(&key("ada")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_sync_does_not_recreate_deleted_record() {
    let h = harness(vec![], 1_000);
    let ada = user_id("ada");

    for force in [false, true] {
        let err = h.reconciler.sync(&ada, points(5, 900), force).await.unwrap_err();
        assert!(matches!(err, SyncError::UserNotFound(_)));
    }

    assert!(h.store.writes().is_empty());
    assert!(h.store.inner().get(&StorePath::user(&ada)).is_none());
}

#[tokio::test]
async fn test_delete_through_reconciler() {
    let h = harness(vec![("ada", user_with_progress(100))], 1_000);
    let ada = user_id("ada");
    h.reconciler.load(&ada).await.unwrap();

    h.reconciler.delete(&ada).await.unwrap();

    assert!(h.store.inner().get(&StorePath::user(&ada)).is_none());
    assert!(h.reconciler.cache().get(&key("ada")).await.unwrap().is_none());
    assert!(matches!(
        h.reconciler.load(&ada).await,
        Err(SyncError::UserNotFound(_))
    ));
}
