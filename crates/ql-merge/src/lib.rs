//! Questline Merge Engine
//!
//! Brings a user's stored entity collections up to date with a canonical
//! catalog release without losing progress.
//!
//! # Core Concepts
//!
//! - [`merge`]: Pure merge of a stored collection against its canonical definition
//! - [`merge_with_report`]: Same merge, with [`MergeReport`] statistics for telemetry
//! - [`initialize`]: Canonical collection with progress defaults (signup / first load)
//! - [`FieldShape`]: Absent / malformed / present classification of stored data
//!
//! # Policy
//!
//! Existing progress wins for progress fields; canonical wins for every other
//! field and for entity existence. Stored ids the catalog no longer defines
//! are dropped and listed in [`MergeReport::dropped`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ql_catalog::EntityKind;
//! use ql_merge::merge_with_report;
//!
//! let outcome = merge_with_report(EntityKind::Quest, record.quests.as_ref(), &catalog.quests);
//! if !outcome.report.dropped.is_empty() {
//!     tracing::warn!(dropped = ?outcome.report.dropped, "catalog retired quests");
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod engine;
mod shape;

// Re-exports
pub use engine::{initialize, merge, merge_with_report, MergeOutcome, MergeReport};
pub use shape::FieldShape;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
