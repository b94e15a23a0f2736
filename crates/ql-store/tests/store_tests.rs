use ql_catalog::{Counter, EntityKind, LocalSnapshot, UserId, UserRecord};
use ql_store::{
    CacheKey, CacheLocks, JsonFileStore, LocalCache, MemoryStore, MokaLocalCache, RemoteStore,
    StorePath,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn fields(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_collection_update_leaves_siblings() {
    let store = MemoryStore::from_value(json!({
        "users": {
            "alice": {
                "quests": {"questA": {"completed": true}},
                "tasks": [{"id": "t1", "completed": false}],
                "lastUpdated": 10
            }
        }
    }));
    let alice = user("alice");

    let quests = StorePath::user_collection(&alice, EntityKind::Quest);
    let parent = quests.parent().unwrap();
    store
        .update(&parent, fields(json!({"quests": {"questC": {"completed": false}}})))
        .await
        .unwrap();

    assert_eq!(
        store.read(&quests).await.unwrap(),
        Some(json!({"questC": {"completed": false}}))
    );
    assert_eq!(
        store
            .read(&StorePath::user_collection(&alice, EntityKind::Task))
            .await
            .unwrap(),
        Some(json!([{"id": "t1", "completed": false}]))
    );
    assert_eq!(
        store
            .read(&StorePath::user_field(&alice, "lastUpdated"))
            .await
            .unwrap(),
        Some(json!(10))
    );
}

#[tokio::test]
async fn test_file_store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("users.json");

    {
        let store = JsonFileStore::open(&file).await.unwrap();
        store
            .update(&StorePath::user(&user("a")), fields(json!({"lastUpdated": 1})))
            .await
            .unwrap();
        store
            .update(&StorePath::user(&user("b")), fields(json!({"lastUpdated": 2})))
            .await
            .unwrap();
        store.delete(&StorePath::user(&user("a"))).await.unwrap();
        store.flush().await.unwrap();
    }

    let store = JsonFileStore::open(&file).await.unwrap();
    assert_eq!(store.list(&StorePath::users()).await.unwrap(), vec!["b"]);
}

#[tokio::test]
async fn test_leases_on_shared_cache() {
    let cache: Arc<dyn LocalCache> = Arc::new(MokaLocalCache::new(100));
    let locks = Arc::new(CacheLocks::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let key = CacheKey::for_user(&user("shared"));
                let lease = locks.acquire(&*cache, key).await;
                let current = lease
                    .previous()
                    .and_then(|s| s.record.points)
                    .map_or(0, |p| p.current);
                let next = LocalSnapshot::new(UserRecord {
                    points: Some(Counter::new(current + 1, i)),
                    ..UserRecord::default()
                });
                lease.commit(&next).await.unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    let final_snapshot = cache
        .get(&CacheKey::for_user(&user("shared")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(final_snapshot.record.points.unwrap().current, 8);
    assert!(locks.is_empty());
}
