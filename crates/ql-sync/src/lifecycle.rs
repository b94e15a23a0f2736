//! Account lifecycle: creating a record at signup and removing it

use ql_catalog::{Catalog, Profile, UserId, UserRecord};
use ql_store::{CacheKey, LocalCache, RemoteStore, StorePath};

use crate::clock::Clock;
use crate::error::{ErrorKind, SyncError, SyncOperation};
use crate::scaffold::initial_record;

/// Create a user's record with `catalog` baked in
///
/// Counters start at zero, `xp` at level 1 and every collection on the
/// catalog's initialization path.
///
/// # Errors
/// Returns [`SyncError::AlreadyExists`] if the store already holds a
/// record for `user_id`, or a store error.
pub async fn provision_user<S, K>(
    store: &S,
    user_id: &UserId,
    profile: Profile,
    catalog: &Catalog,
    clock: &K,
) -> Result<UserRecord, SyncError>
where
    S: RemoteStore + ?Sized,
    K: Clock + ?Sized,
{
    let path = StorePath::user(user_id);
    let existing = store
        .read(&path)
        .await
        .map_err(|source| SyncError::store(SyncOperation::Provision, user_id, source))?;
    if existing.is_some() {
        return Err(SyncError::AlreadyExists(user_id.clone()));
    }

    let record = initial_record(profile, catalog, clock.now_millis());
    let fields = record.to_fields().map_err(|source| SyncError::Serialization {
        operation: SyncOperation::Provision,
        user_id: user_id.clone(),
        source,
    })?;
    store
        .update(&path, fields)
        .await
        .map_err(|source| SyncError::store(SyncOperation::Provision, user_id, source))?;

    tracing::info!(user_id = %user_id, catalog_version = %catalog.version, "user provisioned");
    Ok(record)
}

/// Remove a user's whole record and evict their cache entry
///
/// A cache eviction failure is logged and does not fail the call; it is
/// reported through the returned flag instead.
///
/// # Errors
/// Returns a store error if the delete fails; the cache is then untouched.
pub async fn delete_user<S, C>(store: &S, cache: &C, user_id: &UserId) -> Result<bool, SyncError>
where
    S: RemoteStore + ?Sized,
    C: LocalCache + ?Sized,
{
    delete_record(store, user_id).await?;

    let evicted = match cache.remove(&CacheKey::for_user(user_id)).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(user_id = %user_id, error = %err, kind = %ErrorKind::from(&err), "cache eviction failed");
            false
        }
    };

    tracing::info!(user_id = %user_id, "user deleted");
    Ok(evicted)
}

pub(crate) async fn delete_record<S>(store: &S, user_id: &UserId) -> Result<(), SyncError>
where
    S: RemoteStore + ?Sized,
{
    store
        .delete(&StorePath::user(user_id))
        .await
        .map_err(|source| SyncError::store(SyncOperation::Delete, user_id, source))
}
