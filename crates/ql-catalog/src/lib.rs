//! Questline Catalog Model
//!
//! Canonical activity definitions and the per-user records that carry
//! progress against them.
//!
//! # Core Concepts
//!
//! - [`Catalog`]: Versioned, immutable set of task/quest/ranked-task definitions
//! - [`EntityKind`]: Entity type with its container shape and progress-field set
//! - [`Entity`]: Open JSON object describing one activity
//! - [`EntityCollection`]: Keyed mapping or ordered sequence of entities
//! - [`CatalogHash`]: 32-byte Blake3 fingerprint of a catalog release
//! - [`UserRecord`]: Aggregate root stored per user in the remote store
//! - [`LocalSnapshot`]: Client-held copy of (a subset of) a user record
//!
//! # Example
//!
//! ```rust,ignore
//! use ql_catalog::{Catalog, EntityKind};
//!
//! let catalog = Catalog::from_yaml(source)?;
//! catalog.validate()?;
//!
//! for kind in EntityKind::ALL {
//!     println!("{}: {} entities", kind, catalog.collection(kind).len());
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod catalog;
mod collection;
mod entity;
mod hash;
mod record;

// Re-exports
pub use catalog::{Catalog, CatalogError, CatalogFormat};
pub use collection::{ContainerShape, EntityCollection, IdIndex};
pub use entity::{Entity, EntityKind, ProgressField, UnknownEntityKind};
pub use hash::{CatalogHash, HashError};
pub use record::{Counter, IdError, LocalSnapshot, Millis, Profile, UserId, UserRecord, Xp};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
