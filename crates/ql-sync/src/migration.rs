//! Catalog migration batch
//!
//! Applies a catalog release to every user in the store. Each user's
//! target collections are read, merged and written back with a single
//! partial update of `users/{id}`; other fields of the record are not
//! touched. A failing user is recorded and skipped, never fatal. Only a
//! failed listing aborts the run.
//!
//! A user whose collections changed gets a fresh `lastUpdated` in the same
//! update, so devices holding an older cached copy adopt the migrated
//! record on their next load instead of pushing the old one back.
//!
//! Re-running after success changes nothing and stamps nothing. Re-running
//! after a partial failure redoes exactly the failed users.

use futures::stream::{self, StreamExt};
use ql_catalog::{Catalog, CatalogHash, EntityKind, Millis, UserId, UserRecord};
use ql_merge::{merge_with_report, FieldShape};
use ql_store::{RemoteStore, StorePath};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::clock::{Clock, SystemClock};
use crate::config::MigrationConfig;
use crate::error::{ErrorKind, MigrationError, SyncError, SyncOperation};

/// One user the batch could not migrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    /// Raw id as listed by the store
    pub user_id: String,
    /// Classification of the failure
    pub kind: ErrorKind,
    /// Underlying message
    pub reason: String,
}

/// Aggregate result of a migration run
///
/// `processed`, `succeeded` and `failed` count users. `initialized`,
/// `merged` and `unchanged` count collections across succeeded users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Catalog release applied
    pub catalog_version: String,
    /// Fingerprint of that release
    pub catalog_hash: CatalogHash,
    /// Whether writes were skipped
    pub dry_run: bool,
    /// Users attempted
    pub processed: usize,
    /// Users fully migrated
    pub succeeded: usize,
    /// Users that failed, sorted by id
    pub failed: Vec<MigrationFailure>,
    /// Collections that were absent or malformed
    pub initialized: usize,
    /// Collections merged against stored progress
    pub merged: usize,
    /// Entities removed because the catalog retired their id
    pub dropped_entities: usize,
    /// Collections whose value did not change
    pub unchanged: usize,
    /// Users whose record was rewritten with a new `lastUpdated`
    pub stamped: usize,
}

impl MigrationReport {
    /// Check if every user was migrated
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn new(catalog: &Catalog, catalog_hash: CatalogHash, dry_run: bool) -> Self {
        Self {
            catalog_version: catalog.version.clone(),
            catalog_hash,
            dry_run,
            processed: 0,
            succeeded: 0,
            failed: Vec::new(),
            initialized: 0,
            merged: 0,
            dropped_entities: 0,
            unchanged: 0,
            stamped: 0,
        }
    }

    fn record(&mut self, outcome: UserOutcome) {
        self.processed += 1;
        match outcome.result {
            Ok(stats) => {
                self.succeeded += 1;
                self.initialized += stats.initialized;
                self.merged += stats.merged;
                self.dropped_entities += stats.dropped;
                self.unchanged += stats.unchanged;
                self.stamped += usize::from(stats.stamped);
            }
            Err((kind, reason)) => self.failed.push(MigrationFailure {
                user_id: outcome.user_id,
                kind,
                reason,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct UserStats {
    initialized: usize,
    merged: usize,
    dropped: usize,
    unchanged: usize,
    stamped: bool,
}

#[derive(Debug)]
struct UserOutcome {
    user_id: String,
    result: Result<UserStats, (ErrorKind, String)>,
}

/// Runs a catalog release over every user in a store
#[derive(Debug)]
pub struct MigrationRunner<S, K = SystemClock> {
    store: S,
    catalog: Arc<Catalog>,
    config: MigrationConfig,
    clock: K,
}

impl<S: RemoteStore> MigrationRunner<S> {
    /// Create a runner with default configuration and the system clock
    pub fn new(store: S, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            catalog,
            config: MigrationConfig::default(),
            clock: SystemClock,
        }
    }
}

impl<S: RemoteStore, K: Clock> MigrationRunner<S, K> {
    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// With the clock used for `lastUpdated` stamps
    #[must_use]
    pub fn with_clock<K2: Clock>(self, clock: K2) -> MigrationRunner<S, K2> {
        MigrationRunner {
            store: self.store,
            catalog: self.catalog,
            config: self.config,
            clock,
        }
    }

    /// Store being migrated
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration
    #[inline]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Migrate every listed user
    ///
    /// # Errors
    /// Returns [`MigrationError::StoreUnreachable`] if users cannot be
    /// listed; no user is processed in that case. Per-user failures are
    /// reported in [`MigrationReport::failed`].
    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        let span = tracing::info_span!(
            "migration",
            catalog_version = %self.catalog.version,
            dry_run = self.config.dry_run
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<MigrationReport, MigrationError> {
        let catalog_hash = self.catalog.fingerprint()?;
        let targets = self.config.effective_targets();

        let ids = self.store.list(&StorePath::users()).await.map_err(|err| {
            tracing::error!(error = %err, "cannot list users, aborting");
            MigrationError::StoreUnreachable(err)
        })?;

        tracing::info!(
            users = ids.len(),
            catalog_hash = %catalog_hash.short(),
            concurrency = self.config.effective_concurrency(),
            "migration started"
        );

        let outcomes: Vec<UserOutcome> = stream::iter(ids)
            .map(|raw| self.migrate_user(raw, &targets))
            .buffer_unordered(self.config.effective_concurrency())
            .collect()
            .await;

        let mut report = MigrationReport::new(&self.catalog, catalog_hash, self.config.dry_run);
        for outcome in outcomes {
            report.record(outcome);
        }
        report.failed.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            dropped_entities = report.dropped_entities,
            stamped = report.stamped,
            "migration finished"
        );
        Ok(report)
    }

    async fn migrate_user(&self, raw: String, targets: &[EntityKind]) -> UserOutcome {
        let result = match UserId::new(raw.as_str()) {
            Ok(user_id) => self.migrate_fields(&user_id, targets).await.map_err(|err| {
                let kind = err.kind().unwrap_or(ErrorKind::PartialWriteFailure);
                (kind, err.to_string())
            }),
            Err(err) => Err((ErrorKind::MalformedField, err.to_string())),
        };

        if let Err((kind, reason)) = &result {
            tracing::warn!(user_id = %raw, %kind, reason = %reason, "user migration failed");
        }
        UserOutcome {
            user_id: raw,
            result,
        }
    }

    async fn migrate_fields(
        &self,
        user_id: &UserId,
        targets: &[EntityKind],
    ) -> Result<UserStats, SyncError> {
        let mut stats = UserStats::default();
        let mut fields = Map::new();
        let mut changed = false;

        for &kind in targets {
            let existing = self
                .store
                .read(&StorePath::user_collection(user_id, kind))
                .await
                .map_err(|source| SyncError::store(SyncOperation::ReadRemote, user_id, source))?;

            let outcome = merge_with_report(kind, existing.as_ref(), self.catalog.collection(kind));
            let report = &outcome.report;

            tracing::debug!(
                user_id = %user_id,
                field = kind.field_name(),
                shape = %report.shape,
                retained = report.retained,
                added = report.added,
                dropped = report.dropped.len(),
                "collection classified"
            );
            if report.shape == FieldShape::Malformed {
                tracing::warn!(
                    user_id = %user_id,
                    field = kind.field_name(),
                    kind = %ErrorKind::MalformedField,
                    "replacing malformed collection"
                );
            }
            if !report.dropped.is_empty() {
                tracing::info!(
                    user_id = %user_id,
                    field = kind.field_name(),
                    dropped = ?report.dropped,
                    "progress dropped for retired entities"
                );
            }

            if report.shape.needs_initialization() {
                stats.initialized += 1;
            } else {
                stats.merged += 1;
            }
            stats.dropped += report.dropped.len();
            if report.changed {
                changed = true;
            } else {
                stats.unchanged += 1;
            }

            fields.insert(kind.field_name().to_string(), outcome.collection.to_value());
        }

        if self.config.dry_run || fields.is_empty() {
            return Ok(stats);
        }

        if changed {
            let stamp = self.next_stamp(user_id).await?;
            fields.insert(UserRecord::LAST_UPDATED.to_string(), Value::from(stamp));
            stats.stamped = true;
        }
        self.store
            .update(&StorePath::user(user_id), fields)
            .await
            .map_err(|source| SyncError::store(SyncOperation::WriteRemote, user_id, source))?;
        Ok(stats)
    }

    /// `max(now, stored + 1)`; a missing or non-integer stamp counts as `0`
    async fn next_stamp(&self, user_id: &UserId) -> Result<Millis, SyncError> {
        let stored = self
            .store
            .read(&StorePath::user_field(user_id, UserRecord::LAST_UPDATED))
            .await
            .map_err(|source| SyncError::store(SyncOperation::ReadRemote, user_id, source))?
            .as_ref()
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(self.clock.now_millis().max(stored.saturating_add(1)))
    }
}
