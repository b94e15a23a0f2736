//! Testing utilities for the Questline workspace
//!
//! Shared fixtures (two catalog releases, seeded stores) and
//! failure-injecting store and cache wrappers.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use ql_catalog::{Catalog, LocalSnapshot, UserId};
use ql_store::{CacheError, CacheKey, LocalCache, MemoryStore, RemoteStore, StoreError, StorePath, USERS};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// First catalog release
pub fn catalog_v1() -> Catalog {
    Catalog::from_json(
        &json!({
            "version": "v1",
            "tasks": [
                {"id": "walk", "name": "Walk 10k steps", "reward": 10, "frequency": "daily"},
                {"id": "read", "name": "Read a chapter", "reward": 5, "frequency": "daily"}
            ],
            "quests": {
                "questA": {"title": "First steps", "xp": 50},
                "questB": {"title": "Night owl", "xp": 20}
            },
            "rankedTasks": [
                {"taskId": "r1", "name": "Sprint", "reward": 100, "level": 1},
                {"taskId": "r2", "name": "Marathon", "reward": 200}
            ]
        })
        .to_string(),
    )
    .unwrap()
}

/// Second release: retires `questB` and `read`, adds `questC` and
/// `meditate`, and rewrites descriptive fields
pub fn catalog_v2() -> Catalog {
    Catalog::from_json(
        &json!({
            "version": "v2",
            "tasks": [
                {"id": "walk", "name": "Walk 10k steps", "reward": 15, "frequency": "daily", "category": "health"},
                {"id": "meditate", "name": "Meditate", "reward": 8, "frequency": "daily", "category": "mind"}
            ],
            "quests": {
                "questA": {"title": "First steps", "xp": 60, "badge": "boots"},
                "questC": {"title": "Early bird", "xp": 30}
            },
            "rankedTasks": [
                {"taskId": "r1", "name": "Sprint", "reward": 120, "level": 1},
                {"taskId": "r2", "name": "Marathon", "reward": 250, "level": 2}
            ]
        })
        .to_string(),
    )
    .unwrap()
}

/// Shorthand for a valid user id
pub fn user_id(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// A user record with progress against [`catalog_v1`]
pub fn user_with_progress(last_updated: i64) -> Value {
    json!({
        "profile": {"name": "Ada", "photo": "", "rankName": "Bronze", "rankImage": ""},
        "points": {"current": 7, "total": 800},
        "Mpoints": {"current": 1, "total": 10},
        "xp": {"current": 120, "level": 3},
        "tasks": [
            {"id": "walk", "name": "Walk 10k steps", "reward": 10, "frequency": "daily", "completionCount": 4},
            {"id": "read", "name": "Read a chapter", "reward": 5, "frequency": "daily", "completionCount": 2}
        ],
        "quests": {
            "questA": {"title": "First steps", "xp": 50, "completed": true},
            "questB": {"title": "Night owl", "xp": 20, "completed": false}
        },
        "rankedTasks": [
            {"taskId": "r1", "name": "Sprint", "reward": 100, "completionCount": 3, "boost": "2x", "level": 4},
            {"taskId": "r2", "name": "Marathon", "reward": 200, "completionCount": 0, "boost": null, "level": 1}
        ],
        "lastUpdated": last_updated
    })
}

/// Store holding `users` with the given raw records
pub fn store_with_users<'a>(users: impl IntoIterator<Item = (&'a str, Value)>) -> MemoryStore {
    let users: Map<String, Value> = users
        .into_iter()
        .map(|(id, record)| (id.to_string(), record))
        .collect();
    let mut root = Map::new();
    root.insert(USERS.to_string(), Value::Object(users));
    MemoryStore::from_value(Value::Object(root))
}

/// Store with `count` users named `user-00`, `user-01`, ... each carrying
/// [`user_with_progress`]
pub fn seeded_store(count: usize) -> MemoryStore {
    let names: Vec<String> = (0..count).map(|i| format!("user-{i:02}")).collect();
    store_with_users(
        names
            .iter()
            .map(|name| (name.as_str(), user_with_progress(1_000))),
    )
}

/// Store wrapper that fails chosen operations and records traffic
#[derive(Debug, Default)]
pub struct FlakyStore<S = MemoryStore> {
    inner: S,
    fail_reads: Mutex<HashSet<String>>,
    fail_writes: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    reads: Mutex<Vec<StorePath>>,
    writes: Mutex<Vec<StorePath>>,
}

impl<S: RemoteStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: Mutex::default(),
            fail_writes: Mutex::default(),
            fail_listing: AtomicBool::new(false),
            reads: Mutex::default(),
            writes: Mutex::default(),
        }
    }

    /// Fail every read below `users/{id}`
    pub fn fail_reads_for(&self, id: &str) {
        self.fail_reads.lock().insert(id.to_string());
    }

    /// Fail every update or delete below `users/{id}`
    pub fn fail_writes_for(&self, id: &str) {
        self.fail_writes.lock().insert(id.to_string());
    }

    /// Fail every `list`
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.fail_reads.lock().clear();
        self.fail_writes.lock().clear();
        self.fail_listing.store(false, Ordering::SeqCst);
    }

    /// Paths read so far
    pub fn reads(&self) -> Vec<StorePath> {
        self.reads.lock().clone()
    }

    /// Paths updated or deleted so far
    pub fn writes(&self) -> Vec<StorePath> {
        self.writes.lock().clone()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn targets(set: &Mutex<HashSet<String>>, path: &StorePath) -> bool {
        match path.segments() {
            [root, id, ..] if root == USERS => set.lock().contains(id),
            _ => false,
        }
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for FlakyStore<S> {
    async fn list(&self, path: &StorePath) -> Result<Vec<String>, StoreError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::unreachable("injected listing failure"));
        }
        self.inner.list(path).await
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.reads.lock().push(path.clone());
        if Self::targets(&self.fail_reads, path) {
            return Err(StoreError::unreachable(format!("injected read failure at {path}")));
        }
        self.inner.read(path).await
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.writes.lock().push(path.clone());
        if Self::targets(&self.fail_writes, path) {
            return Err(StoreError::unreachable(format!("injected write failure at {path}")));
        }
        self.inner.update(path, fields).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.writes.lock().push(path.clone());
        if Self::targets(&self.fail_writes, path) {
            return Err(StoreError::unreachable(format!("injected write failure at {path}")));
        }
        self.inner.delete(path).await
    }
}

/// Cache whose reads and/or writes always fail
#[derive(Debug, Clone, Copy)]
pub struct BrokenCache {
    reads: bool,
    writes: bool,
}

impl BrokenCache {
    /// Every operation fails
    pub fn all() -> Self {
        Self {
            reads: true,
            writes: true,
        }
    }

    /// Reads miss, writes fail
    pub fn writes_only() -> Self {
        Self {
            reads: false,
            writes: true,
        }
    }
}

#[async_trait]
impl LocalCache for BrokenCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<LocalSnapshot>, CacheError> {
        if self.reads {
            Err(CacheError::unavailable("injected cache read failure"))
        } else {
            Ok(None)
        }
    }

    async fn put(&self, _key: &CacheKey, _snapshot: &LocalSnapshot) -> Result<(), CacheError> {
        if self.writes {
            Err(CacheError::unavailable("injected cache write failure"))
        } else {
            Ok(())
        }
    }

    async fn remove(&self, _key: &CacheKey) -> Result<(), CacheError> {
        if self.writes {
            Err(CacheError::unavailable("injected cache write failure"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_catalog::EntityKind;

    #[test]
    fn fixtures_are_valid() {
        let v1 = catalog_v1();
        let v2 = catalog_v2();
        assert_eq!(v1.collection(EntityKind::Quest).len(), 2);
        assert_ne!(v1.fingerprint().unwrap(), v2.fingerprint().unwrap());
        assert!(v2
            .collection(EntityKind::Quest)
            .get(EntityKind::Quest, "questB")
            .is_none());
    }

    #[tokio::test]
    async fn flaky_store_targets_one_user() {
        let store = FlakyStore::new(seeded_store(2));
        store.fail_reads_for("user-01");

        assert!(store.read(&StorePath::user(&user_id("user-00"))).await.is_ok());
        assert!(store.read(&StorePath::user(&user_id("user-01"))).await.is_err());
        assert_eq!(store.reads().len(), 2);

        store.fail_listing();
        assert!(store.list(&StorePath::users()).await.is_err());
        store.heal();
        assert_eq!(store.list(&StorePath::users()).await.unwrap().len(), 2);
    }
}
