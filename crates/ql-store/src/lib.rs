//! Questline Store Layer
//!
//! Collaborators the reconciler talks to: the authoritative remote
//! document store and the client-side per-user cache.
//!
//! # Core Concepts
//!
//! - [`StorePath`]: Slash-separated address such as `users/alice/quests`
//! - [`RemoteStore`]: Path-addressed read, partial update, delete and listing
//! - [`MemoryStore`] / [`JsonFileStore`]: In-process and file-backed stores
//! - [`LocalCache`]: Whole-snapshot get/put per user
//! - [`CacheLocks`] / [`CacheLease`]: Per-key exclusive access with explicit commit
//!
//! # Example
//!
//! ```rust,ignore
//! use ql_store::{CacheKey, CacheLocks, MokaLocalCache, StorePath};
//!
//! let cache = MokaLocalCache::default();
//! let locks = CacheLocks::new();
//!
//! let lease = locks.acquire(&cache, CacheKey::for_user(&id)).await;
//! let record = store.read(&StorePath::user(&id)).await?;
//! lease.commit(&snapshot).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod error;
mod file;
mod lease;
mod path;
mod remote;

pub use cache::{CacheKey, CacheStats, LocalCache, MokaLocalCache};
pub use error::{CacheError, StoreError};
pub use file::JsonFileStore;
pub use lease::{CacheLease, CacheLocks};
pub use path::{PathError, StorePath, USERS};
pub use remote::{MemoryStore, RemoteStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
