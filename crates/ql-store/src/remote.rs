//! Remote document store
//!
//! The authoritative store is an external collaborator; the engine only
//! needs path-addressed read, partial-field update, delete, and child
//! listing. [`MemoryStore`] is the in-process implementation used by tests
//! and by the file-backed store.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StoreError;
use crate::path::StorePath;

/// Path-addressable JSON document store
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// Keys of the object at `path` (empty if absent or not an object)
    async fn list(&self, path: &StorePath) -> Result<Vec<String>, StoreError>;

    /// Value at `path`, `None` if absent
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Merge `fields` into the object at `path`, creating it if needed
    ///
    /// Only the named top-level fields are replaced; siblings are left
    /// untouched. A `null` field value removes that field.
    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Remove the value at `path` and everything below it
    async fn delete(&self, path: &StorePath) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn list(&self, path: &StorePath) -> Result<Vec<String>, StoreError> {
        (**self).list(path).await
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        (**self).read(path).await
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        (**self).update(path, fields).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        (**self).delete(path).await
    }
}

/// In-memory document tree
#[derive(Debug)]
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Create a store holding `document`
    ///
    /// A non-object document is replaced by an empty object.
    #[must_use]
    pub fn from_value(document: Value) -> Self {
        let root = if document.is_object() {
            document
        } else {
            Value::Object(Map::new())
        };
        Self {
            root: RwLock::new(root),
        }
    }

    /// Copy of the whole document
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    /// Synchronous read
    #[must_use]
    pub fn get(&self, path: &StorePath) -> Option<Value> {
        let root = self.root.read();
        lookup(&root, path).filter(|v| !v.is_null()).cloned()
    }

    /// Synchronous child listing
    #[must_use]
    pub fn keys(&self, path: &StorePath) -> Vec<String> {
        let root = self.root.read();
        let mut keys: Vec<String> = lookup(&root, path)
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Synchronous partial-field update
    pub fn merge_fields(&self, path: &StorePath, fields: Map<String, Value>) {
        let mut root = self.root.write();
        let target = descend_creating(&mut root, path);
        for (key, value) in fields {
            if value.is_null() {
                target.remove(&key);
            } else {
                target.insert(key, value);
            }
        }
    }

    /// Synchronous delete
    pub fn remove(&self, path: &StorePath) {
        let mut root = self.root.write();
        let Some((last, parent)) = path.segments().split_last() else {
            *root = Value::Object(Map::new());
            return;
        };
        let mut node = &mut *root;
        for seg in parent {
            match node.get_mut(seg.as_str()) {
                Some(child) => node = child,
                None => return,
            }
        }
        if let Some(map) = node.as_object_mut() {
            map.remove(last.as_str());
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'v>(root: &'v Value, path: &StorePath) -> Option<&'v Value> {
    path.iter()
        .try_fold(root, |node, seg| node.as_object()?.get(seg))
}

/// Walk to `path`, replacing missing or scalar nodes with empty objects
fn descend_creating<'v>(root: &'v mut Value, path: &StorePath) -> &'v mut Map<String, Value> {
    let mut node = root;
    for seg in path.iter() {
        node = object_or_reset(node)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_or_reset(node)
}

fn object_or_reset(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list(&self, path: &StorePath) -> Result<Vec<String>, StoreError> {
        Ok(self.keys(path))
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        Ok(self.get(path))
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.merge_fields(path, fields);
        Ok(())
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.remove(path);
        Ok(())
    }
}
