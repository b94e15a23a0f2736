//! Questline Sync - cache/store reconciliation and catalog migration
//!
//! Keeps per-user records consistent between a client-side cache and the
//! authoritative remote store, and applies catalog releases to every
//! stored user:
//! - Bidirectional and push-only timestamp reconciliation
//! - First-load read-through with catalog defaults
//! - Bounded-parallel migration batches with aggregate reporting
//! - Account provisioning and deletion
//!
//! # Example
//!
//! ```rust,ignore
//! use ql_sync::prelude::*;
//!
//! # async fn example(store: MemoryStore, catalog: Arc<Catalog>, id: UserId) -> Result<(), SyncError> {
//! let reconciler = Reconciler::new(store, MokaLocalCache::default(), SystemClock, catalog);
//!
//! let loaded = reconciler.load(&id).await?;
//! let mut state = loaded.authoritative;
//! state.points.get_or_insert_with(Default::default).current += 10;
//!
//! let pushed = reconciler.push(&id, state).await?;
//! assert!(pushed.remote_written);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod migration;
pub mod reconcile;
pub mod scaffold;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MigrationConfig, ReconcilerConfig};
pub use error::{ErrorKind, MigrationError, SyncError, SyncOperation};
pub use lifecycle::{delete_user, provision_user};
pub use migration::{MigrationFailure, MigrationReport, MigrationRunner};
pub use reconcile::{plan_reconcile, Decision, ReconcilePlan, Reconciler, Reconciliation, SyncMode};
pub use scaffold::{fill_defaults, initial_record};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Questline sync
    pub use crate::{
        Clock, MigrationConfig, MigrationReport, MigrationRunner, Reconciler, Reconciliation,
        SyncError, SyncMode, SystemClock,
    };
    pub use ql_catalog::{Catalog, EntityKind, UserId, UserRecord};
    pub use ql_store::{LocalCache, MemoryStore, MokaLocalCache, RemoteStore};
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
