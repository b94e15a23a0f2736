//! Per-user local cache using moka
//!
//! Each user has one opaque blob: the JSON encoding of their
//! [`LocalSnapshot`]. The reconciler only inspects presence or absence
//! structurally; the snapshot's `lastUpdated` drives every decision.

use async_trait::async_trait;
use moka::future::Cache;
use ql_catalog::{LocalSnapshot, UserId};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;

/// Stable per-user cache key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key prefix shared by every user entry
    pub const PREFIX: &'static str = "questline:user:";

    /// Key for a user
    #[inline]
    #[must_use]
    pub fn for_user(id: &UserId) -> Self {
        Self(format!("{}{id}", Self::PREFIX))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side snapshot cache
#[async_trait]
pub trait LocalCache: Send + Sync + std::fmt::Debug {
    /// Cached snapshot, `None` on miss
    async fn get(&self, key: &CacheKey) -> Result<Option<LocalSnapshot>, CacheError>;

    /// Replace the cached snapshot in one step
    async fn put(&self, key: &CacheKey, snapshot: &LocalSnapshot) -> Result<(), CacheError>;

    /// Drop the cached snapshot
    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;
}

#[async_trait]
impl<T: LocalCache + ?Sized> LocalCache for Arc<T> {
    async fn get(&self, key: &CacheKey) -> Result<Option<LocalSnapshot>, CacheError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &CacheKey, snapshot: &LocalSnapshot) -> Result<(), CacheError> {
        (**self).put(key, snapshot).await
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        (**self).remove(key).await
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// In-process snapshot cache
///
/// Blobs are stored as shared strings so a `get` never observes a
/// half-written entry.
#[derive(Debug, Clone)]
pub struct MokaLocalCache {
    inner: Cache<CacheKey, Arc<str>>,
}

impl MokaLocalCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Raw blob for a key
    pub async fn blob(&self, key: &CacheKey) -> Option<Arc<str>> {
        self.inner.get(key).await
    }

    /// Store a raw blob, bypassing encoding
    pub async fn put_blob(&self, key: CacheKey, blob: impl Into<Arc<str>>) {
        self.inner.insert(key, blob.into()).await;
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for MokaLocalCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl LocalCache for MokaLocalCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<LocalSnapshot>, CacheError> {
        let Some(blob) = self.inner.get(key).await else {
            return Ok(None);
        };
        LocalSnapshot::from_blob(&blob)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    async fn put(&self, key: &CacheKey, snapshot: &LocalSnapshot) -> Result<(), CacheError> {
        let blob = snapshot.to_blob().map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        self.inner.insert(key.clone(), Arc::from(blob)).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}
