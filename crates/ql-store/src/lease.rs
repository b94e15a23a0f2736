//! Scoped cache access
//!
//! A [`CacheLease`] holds a per-key lock for the duration of one
//! reconciliation. The cached value is replaced only by an explicit
//! [`CacheLease::commit`]; a lease dropped on an error path leaves the
//! previous value in place.
//!
//! A key's lock lives in the table only while some lease holds or awaits
//! it; the last lease to release removes it.

use dashmap::DashMap;
use ql_catalog::LocalSnapshot;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::{CacheKey, LocalCache};
use crate::error::CacheError;

/// Per-key lock table
#[derive(Debug, Default)]
pub struct CacheLocks {
    locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl CacheLocks {
    /// Create an empty lock table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `key` and read its current value
    ///
    /// A failed read does not fail the lease: it is recorded as
    /// [`CacheLease::read_error`] and the lease behaves as a miss.
    pub async fn acquire<'c, C>(&'c self, cache: &'c C, key: CacheKey) -> CacheLease<'c, C>
    where
        C: LocalCache + ?Sized,
    {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock_owned().await;

        let (previous, read_error) = match cache.get(&key).await {
            Ok(previous) => (previous, None),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed, treating as miss");
                (None, Some(err))
            }
        };

        CacheLease {
            cache,
            locks: self,
            key,
            previous,
            read_error,
            guard: Some(guard),
        }
    }

    fn release(&self, key: &CacheKey) {
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of keys currently held or awaited
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if no key is held or awaited
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one cache entry
#[derive(Debug)]
pub struct CacheLease<'c, C: ?Sized> {
    cache: &'c C,
    locks: &'c CacheLocks,
    key: CacheKey,
    previous: Option<LocalSnapshot>,
    read_error: Option<CacheError>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<C: ?Sized> Drop for CacheLease<'_, C> {
    fn drop(&mut self) {
        // Unlock first so the guard's own reference is gone before counting
        drop(self.guard.take());
        self.locks.release(&self.key);
    }
}

impl<'c, C> CacheLease<'c, C>
where
    C: LocalCache + ?Sized,
{
    /// Key this lease holds
    #[inline]
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Value cached when the lease was taken
    #[inline]
    #[must_use]
    pub fn previous(&self) -> Option<&LocalSnapshot> {
        self.previous.as_ref()
    }

    /// Take the cached value out of the lease
    #[inline]
    pub fn take_previous(&mut self) -> Option<LocalSnapshot> {
        self.previous.take()
    }

    /// Error hit while reading the previous value, if any
    #[inline]
    #[must_use]
    pub fn read_error(&self) -> Option<&CacheError> {
        self.read_error.as_ref()
    }

    /// Replace the cached value and release the lock
    ///
    /// # Errors
    /// Returns error if the cache rejects the write; the previous value is
    /// then still in place.
    pub async fn commit(self, snapshot: &LocalSnapshot) -> Result<(), CacheError> {
        self.cache.put(&self.key, snapshot).await
    }

    /// Remove the cached value and release the lock
    ///
    /// # Errors
    /// Returns error if the cache rejects the removal
    pub async fn evict(self) -> Result<(), CacheError> {
        self.cache.remove(&self.key).await
    }
}
