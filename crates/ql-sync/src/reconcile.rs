//! Cache/store reconciliation
//!
//! Decides, per user, whether the client's local state or the remote
//! record is authoritative, and performs the matching read-through or
//! write-through.
//!
//! Two policies are supported as an explicit [`SyncMode`]:
//!
//! - **Bidirectional**: the newer `lastUpdated` wins; ties go to local.
//!   A forced call always takes the remote record. Local state is never
//!   written to a store that holds no record for the user: the account was
//!   deleted, so the cached snapshot is evicted instead.
//! - **Push-only**: the client is the sole writer of the sub-tree. Its
//!   state is stamped and written without reading the remote timestamp.
//!   Concurrent push-only writers for the same user are last-write-wins.
//!
//! The decision itself is [`plan_reconcile`], a pure function. The
//! [`Reconciler`] does the I/O around it and holds a [`CacheLease`] for the
//! whole call, so the cached snapshot either moves to the new value or
//! stays at its previous one.
//!
//! [`CacheLease`]: ql_store::CacheLease

use ql_catalog::{Catalog, LocalSnapshot, Millis, UserId, UserRecord};
use ql_store::{CacheKey, CacheLease, CacheLocks, LocalCache, MokaLocalCache, RemoteStore, StorePath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ReconcilerConfig;
use crate::error::{ErrorKind, SyncError, SyncOperation};
use crate::lifecycle::delete_record;
use crate::scaffold::fill_defaults;

/// Timestamp policy selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Compare timestamps, newer side wins
    #[default]
    Bidirectional,
    /// Always write the client's state
    PushOnly,
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bidirectional => "bidirectional",
            Self::PushOnly => "push-only",
        })
    }
}

/// Which side a reconciliation settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// No local state: remote record read through into the cache
    FirstLoad,
    /// Remote is newer (or the call was forced): cache overwritten
    RemoteWins,
    /// Local is newer or tied: pushed with a fresh stamp
    LocalWins,
    /// Push-only write
    Pushed,
    /// Cached and remote records already identical
    InSync,
}

/// Writes a reconciliation needs, computed without I/O
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    /// Branch taken
    pub decision: Decision,
    /// Record both sides converge to
    pub authoritative: UserRecord,
    /// New cache value, if the cache must change
    pub local_write: Option<LocalSnapshot>,
    /// Record to push, if the store must change
    pub remote_write: Option<UserRecord>,
}

impl ReconcilePlan {
    fn read_through(decision: Decision, remote: &UserRecord) -> Self {
        Self {
            decision,
            authoritative: remote.clone(),
            local_write: Some(LocalSnapshot::new(remote.clone())),
            remote_write: None,
        }
    }

    fn write_through(decision: Decision, local: &UserRecord, at: Millis) -> Self {
        let stamped = local.clone().stamped(at);
        Self {
            decision,
            authoritative: stamped.clone(),
            local_write: Some(LocalSnapshot::new(stamped.clone())),
            remote_write: Some(stamped),
        }
    }
}

/// Plan a reconciliation
///
/// `remote` is ignored in [`SyncMode::PushOnly`] when local state exists.
/// Returns `None` when neither side holds a record, and in
/// [`SyncMode::Bidirectional`] when local state exists but the store holds
/// no record.
///
/// Fresh stamps never go backwards: a pushed record is stamped
/// `max(now, local + 1)`, and in bidirectional mode also above the remote
/// stamp.
#[must_use]
pub fn plan_reconcile(
    local: Option<&UserRecord>,
    remote: Option<&UserRecord>,
    mode: SyncMode,
    force: bool,
    now: Millis,
) -> Option<ReconcilePlan> {
    let Some(local) = local else {
        return remote.map(|remote| ReconcilePlan::read_through(Decision::FirstLoad, remote));
    };

    let after_local = now.max(local.last_updated().saturating_add(1));

    match (mode, remote) {
        (SyncMode::PushOnly, _) => Some(ReconcilePlan::write_through(
            Decision::Pushed,
            local,
            after_local,
        )),
        (SyncMode::Bidirectional, None) => None,
        (SyncMode::Bidirectional, Some(remote))
            if force || remote.last_updated() > local.last_updated() =>
        {
            Some(ReconcilePlan::read_through(Decision::RemoteWins, remote))
        }
        (SyncMode::Bidirectional, Some(remote)) => Some(ReconcilePlan::write_through(
            Decision::LocalWins,
            local,
            after_local.max(remote.last_updated().saturating_add(1)),
        )),
    }
}

/// Outcome of a reconciliation call
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Branch taken
    pub decision: Decision,
    /// Record the caller should now treat as current
    pub authoritative: UserRecord,
    /// Whether a partial update was sent to the store
    pub remote_written: bool,
    /// Whether the cache could not be read or written during the call
    pub cache_degraded: bool,
}

/// Reconciles one user's cached snapshot with the remote store
#[derive(Debug)]
pub struct Reconciler<S, C, K> {
    store: S,
    cache: C,
    clock: K,
    catalog: Arc<Catalog>,
    locks: CacheLocks,
}

impl<S, K> Reconciler<S, MokaLocalCache, K>
where
    S: RemoteStore,
    K: Clock,
{
    /// Create a reconciler with the in-memory cache `config` describes
    pub fn from_config(store: S, config: &ReconcilerConfig, clock: K, catalog: Arc<Catalog>) -> Self {
        Self::new(store, config.build_cache(), clock, catalog)
    }
}

impl<S, C, K> Reconciler<S, C, K>
where
    S: RemoteStore,
    C: LocalCache,
    K: Clock,
{
    /// Create a reconciler over `store` and `cache`
    ///
    /// `catalog` supplies the defaults for collections missing on first load.
    pub fn new(store: S, cache: C, clock: K, catalog: Arc<Catalog>) -> Self {
        Self {
            store,
            cache,
            clock,
            catalog,
            locks: CacheLocks::new(),
        }
    }

    /// Remove a user's record from the store and the cache
    ///
    /// Runs under the same per-user lock as every reconcile through this
    /// reconciler, so no call can push the record back between the two
    /// removals.
    ///
    /// # Errors
    /// Returns a [`SyncError`] if the store delete fails; the cache is then
    /// left unchanged. A failed eviction is only logged.
    pub async fn delete(&self, user_id: &UserId) -> Result<(), SyncError> {
        let lease = self.lease(user_id).await;
        delete_record(&self.store, user_id).await?;
        self.evict(user_id, lease).await;
        tracing::info!(user_id = %user_id, "user deleted");
        Ok(())
    }

    /// Remote store
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Local cache
    #[inline]
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Clock used for stamps
    #[inline]
    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Catalog used for first-load defaults
    #[inline]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Load a user's record
    ///
    /// On a cache miss (or an unreadable cache) the remote record is read,
    /// missing sub-trees are defaulted and the result is cached without a
    /// remote write. On a hit the cached snapshot is reconciled
    /// bidirectionally against the remote record.
    ///
    /// # Errors
    /// Returns [`SyncError::UserNotFound`] if the store holds no record; a
    /// cached snapshot for the user is evicted. Other store errors leave
    /// the cache unchanged.
    pub async fn load(&self, user_id: &UserId) -> Result<Reconciliation, SyncError> {
        let mut lease = self.lease(user_id).await;
        let local = lease.take_previous().map(LocalSnapshot::into_record);
        let remote = self.read_remote(user_id).await?;

        if let (Some(local), Some(remote)) = (&local, &remote) {
            if local == remote {
                tracing::debug!(user_id = %user_id, "cache and store in sync");
                return Ok(Reconciliation {
                    decision: Decision::InSync,
                    authoritative: remote.clone(),
                    remote_written: false,
                    cache_degraded: lease.read_error().is_some(),
                });
            }
        }

        self.settle(user_id, lease, local, remote, SyncMode::Bidirectional, false)
            .await
    }

    /// Reconcile `local` state against the store under `mode`
    ///
    /// With no local state this is a first load. In push-only mode with
    /// local state the remote record is never read.
    ///
    /// # Errors
    /// Returns a [`SyncError`] on store failure; the cache keeps its
    /// previous value.
    pub async fn reconcile(
        &self,
        user_id: &UserId,
        local: Option<UserRecord>,
        mode: SyncMode,
        force: bool,
    ) -> Result<Reconciliation, SyncError> {
        let lease = self.lease(user_id).await;
        let remote = match (mode, &local) {
            (SyncMode::PushOnly, Some(_)) => None,
            _ => self.read_remote(user_id).await?,
        };
        self.settle(user_id, lease, local, remote, mode, force).await
    }

    /// Bidirectional reconcile of the client's current state
    ///
    /// # Errors
    /// See [`Reconciler::reconcile`]
    pub async fn sync(
        &self,
        user_id: &UserId,
        local: UserRecord,
        force: bool,
    ) -> Result<Reconciliation, SyncError> {
        self.reconcile(user_id, Some(local), SyncMode::Bidirectional, force)
            .await
    }

    /// Push-only write of the client's current state
    ///
    /// # Errors
    /// See [`Reconciler::reconcile`]
    pub async fn push(&self, user_id: &UserId, state: UserRecord) -> Result<Reconciliation, SyncError> {
        self.reconcile(user_id, Some(state), SyncMode::PushOnly, false)
            .await
    }

    /// Stamp `lastLogin` on the remote record
    ///
    /// The cached snapshot, if any, is updated to the same value; its
    /// `lastUpdated` is left alone.
    ///
    /// # Errors
    /// Returns a [`SyncError`] if the store rejects the update
    pub async fn record_login(&self, user_id: &UserId) -> Result<String, SyncError> {
        let mut lease = self.lease(user_id).await;
        let stamp = self.clock.now_rfc3339();

        let mut fields = Map::new();
        fields.insert(UserRecord::LAST_LOGIN.to_string(), Value::String(stamp.clone()));
        self.store
            .update(&StorePath::user(user_id), fields)
            .await
            .map_err(|source| SyncError::store(SyncOperation::RecordLogin, user_id, source))?;

        if let Some(mut snapshot) = lease.take_previous() {
            snapshot.record.last_login = Some(stamp.clone());
            if let Err(err) = lease.commit(&snapshot).await {
                tracing::warn!(user_id = %user_id, error = %err, kind = %ErrorKind::from(&err), "cache write failed");
            }
        }

        tracing::debug!(user_id = %user_id, last_login = %stamp, "login recorded");
        Ok(stamp)
    }

    async fn lease(&self, user_id: &UserId) -> CacheLease<'_, C> {
        self.locks
            .acquire(&self.cache, CacheKey::for_user(user_id))
            .await
    }

    async fn read_remote(&self, user_id: &UserId) -> Result<Option<UserRecord>, SyncError> {
        let value = self
            .store
            .read(&StorePath::user(user_id))
            .await
            .map_err(|source| SyncError::store(SyncOperation::ReadRemote, user_id, source))?;

        Ok(value.map(|value| {
            let (record, malformed) = UserRecord::from_store_value(&value);
            for field in malformed {
                tracing::warn!(
                    user_id = %user_id,
                    field,
                    kind = %ErrorKind::MalformedField,
                    "ignoring malformed field"
                );
            }
            record
        }))
    }

    async fn settle(
        &self,
        user_id: &UserId,
        lease: CacheLease<'_, C>,
        local: Option<UserRecord>,
        mut remote: Option<UserRecord>,
        mode: SyncMode,
        force: bool,
    ) -> Result<Reconciliation, SyncError> {
        if local.is_none() {
            if let Some(remote) = remote.as_mut() {
                let initialized = fill_defaults(remote, &self.catalog);
                if !initialized.is_empty() {
                    tracing::debug!(user_id = %user_id, ?initialized, "defaulted missing collections");
                }
            }
        }

        let now = self.clock.now_millis();
        let Some(plan) = plan_reconcile(local.as_ref(), remote.as_ref(), mode, force, now) else {
            if local.is_some() {
                tracing::info!(user_id = %user_id, "store has no record, dropping local state");
                self.evict(user_id, lease).await;
            }
            return Err(SyncError::UserNotFound(user_id.clone()));
        };

        tracing::debug!(
            user_id = %user_id,
            mode = %mode,
            force,
            decision = ?plan.decision,
            "reconcile planned"
        );

        self.apply(user_id, lease, plan).await
    }

    async fn evict(&self, user_id: &UserId, lease: CacheLease<'_, C>) {
        if let Err(err) = lease.evict().await {
            tracing::warn!(user_id = %user_id, error = %err, kind = %ErrorKind::from(&err), "cache eviction failed");
        }
    }

    async fn apply(
        &self,
        user_id: &UserId,
        lease: CacheLease<'_, C>,
        plan: ReconcilePlan,
    ) -> Result<Reconciliation, SyncError> {
        let remote_written = match &plan.remote_write {
            Some(record) => {
                let fields = record.to_fields().map_err(|source| SyncError::Serialization {
                    operation: SyncOperation::WriteRemote,
                    user_id: user_id.clone(),
                    source,
                })?;
                self.store
                    .update(&StorePath::user(user_id), fields)
                    .await
                    .map_err(|source| SyncError::store(SyncOperation::WriteRemote, user_id, source))?;
                true
            }
            None => false,
        };

        let mut cache_degraded = lease.read_error().is_some();
        if let Some(snapshot) = &plan.local_write {
            if let Err(err) = lease.commit(snapshot).await {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    kind = %ErrorKind::from(&err),
                    "cache write failed, continuing remote-only"
                );
                cache_degraded = true;
            }
        }

        Ok(Reconciliation {
            decision: plan.decision,
            authoritative: plan.authoritative,
            remote_written,
            cache_degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_catalog::Counter;

    fn record(points: i64, at: Millis) -> UserRecord {
        UserRecord {
            points: Some(Counter::new(points, 800)),
            ..UserRecord::default()
        }
        .stamped(at)
    }

    #[test]
    fn newer_remote_wins_without_remote_write() {
        let plan = plan_reconcile(
            Some(&record(5, 100)),
            Some(&record(7, 200)),
            SyncMode::Bidirectional,
            false,
            150,
        )
        .unwrap();

        assert_eq!(plan.decision, Decision::RemoteWins);
        assert_eq!(plan.authoritative, record(7, 200));
        assert_eq!(plan.local_write, Some(LocalSnapshot::new(record(7, 200))));
        assert!(plan.remote_write.is_none());
    }

    #[test]
    fn newer_local_is_pushed_with_fresh_stamp() {
        let plan = plan_reconcile(
            Some(&record(9, 300)),
            Some(&record(7, 200)),
            SyncMode::Bidirectional,
            false,
            250,
        )
        .unwrap();

        assert_eq!(plan.decision, Decision::LocalWins);
        let pushed = plan.remote_write.unwrap();
        assert_eq!(pushed.points, Some(Counter::new(9, 800)));
        assert!(pushed.last_updated() > 300);
        assert_eq!(plan.local_write.unwrap().last_updated(), pushed.last_updated());
    }

    #[test]
    fn tie_goes_to_local() {
        let plan = plan_reconcile(
            Some(&record(1, 200)),
            Some(&record(2, 200)),
            SyncMode::Bidirectional,
            false,
            1_000,
        )
        .unwrap();
        assert_eq!(plan.decision, Decision::LocalWins);
        assert_eq!(plan.authoritative.last_updated(), 1_000);
    }

    #[test]
    fn force_takes_remote_even_when_older() {
        let plan = plan_reconcile(
            Some(&record(9, 300)),
            Some(&record(7, 200)),
            SyncMode::Bidirectional,
            true,
            400,
        )
        .unwrap();
        assert_eq!(plan.decision, Decision::RemoteWins);
        assert!(plan.remote_write.is_none());
    }

    #[test]
    fn stamp_beats_remote_with_lagging_clock() {
        let plan = plan_reconcile(
            Some(&record(9, 300)),
            Some(&record(7, 300)),
            SyncMode::Bidirectional,
            false,
            10,
        )
        .unwrap();
        assert_eq!(plan.authoritative.last_updated(), 301);
    }

    #[test]
    fn push_only_ignores_remote() {
        let plan = plan_reconcile(
            Some(&record(3, 50)),
            Some(&record(7, 900)),
            SyncMode::PushOnly,
            false,
            60,
        )
        .unwrap();
        assert_eq!(plan.decision, Decision::Pushed);
        assert_eq!(plan.remote_write.unwrap(), record(3, 60));
    }

    #[test]
    fn first_load_reads_through() {
        let plan =
            plan_reconcile(None, Some(&record(7, 200)), SyncMode::PushOnly, false, 1).unwrap();
        assert_eq!(plan.decision, Decision::FirstLoad);
        assert!(plan.remote_write.is_none());
        assert!(plan_reconcile(None, None, SyncMode::Bidirectional, false, 1).is_none());
    }

    #[test]
    fn local_without_remote_is_not_recreated() {
        for force in [false, true] {
            assert!(plan_reconcile(Some(&record(1, 0)), None, SyncMode::Bidirectional, force, 5)
                .is_none());
        }
        let plan = plan_reconcile(Some(&record(1, 0)), None, SyncMode::PushOnly, false, 5).unwrap();
        assert_eq!(plan.decision, Decision::Pushed);
    }
}
