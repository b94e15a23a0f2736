//! Runner and reconciler configuration

use ql_catalog::EntityKind;
use ql_store::MokaLocalCache;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Migration batch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Collections to migrate
    pub targets: Vec<EntityKind>,
    /// Users migrated in parallel
    pub concurrency: usize,
    /// Compute results without writing
    pub dry_run: bool,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With target collections
    #[inline]
    #[must_use]
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = EntityKind>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// With parallelism
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With dry-run flag
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Parallelism actually used (at least one)
    #[inline]
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Targets without duplicates, in store order
    #[must_use]
    pub fn effective_targets(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| self.targets.contains(kind))
            .collect()
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            targets: EntityKind::ALL.to_vec(),
            concurrency: 1,
            dry_run: false,
        }
    }
}

/// Local cache configuration for a reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Maximum cached users
    pub cache_capacity: u64,
    /// Seconds a cached snapshot lives, `None` for no expiry
    pub cache_ttl_secs: Option<u64>,
}

impl ReconcilerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With cache TTL
    #[inline]
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Build the cache this configuration describes
    #[must_use]
    pub fn build_cache(&self) -> MokaLocalCache {
        match self.cache_ttl_secs {
            Some(secs) => MokaLocalCache::with_ttl(self.cache_capacity, Duration::from_secs(secs)),
            None => MokaLocalCache::new(self.cache_capacity),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            cache_ttl_secs: None,
        }
    }
}
