//! Catalog merge
//!
//! `merge(existing, canonical)` rebuilds a user's collection from the
//! canonical one:
//!
//! - canonical decides which ids exist and every descriptive field;
//! - the user's copy contributes only its progress fields;
//! - ids the catalog no longer defines are dropped.
//!
//! Sequence items are matched by [`Entity::id_for`]. A stored task keyed
//! only by `name` never matches a catalog task that has an `id`, so its
//! progress is dropped and listed in [`MergeReport::dropped`].
//!
//! The function is pure. Feeding its output back with the same canonical
//! collection yields the same output.

use ql_catalog::{Entity, EntityCollection, EntityKind, IdIndex};
use serde::Serialize;
use serde_json::Value;

use crate::shape::{lower, FieldShape};

/// Result of merging one collection
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Merged collection, in the kind's container shape
    pub collection: EntityCollection,
    /// What the merge did
    pub report: MergeReport,
}

/// Per-collection merge statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Entity kind merged
    pub kind: EntityKind,
    /// Shape of the stored value before the merge
    pub shape: FieldShape,
    /// Canonical ids that carried prior progress
    pub retained: usize,
    /// Canonical ids with no prior entry
    pub added: usize,
    /// Ids removed because the catalog no longer defines them
    pub dropped: Vec<String>,
    /// Whether the output differs from the stored value
    pub changed: bool,
}

/// Merge a stored collection with its canonical definition
///
/// `existing` that is absent or in the wrong container yields the canonical
/// collection with every progress field at its default.
#[must_use]
pub fn merge(
    kind: EntityKind,
    existing: Option<&Value>,
    canonical: &EntityCollection,
) -> EntityCollection {
    merge_with_report(kind, existing, canonical).collection
}

/// Canonical collection with progress defaults, as stored at signup
#[must_use]
pub fn initialize(kind: EntityKind, canonical: &EntityCollection) -> EntityCollection {
    merge(kind, None, canonical)
}

/// Merge and report what changed
#[must_use]
pub fn merge_with_report(
    kind: EntityKind,
    existing: Option<&Value>,
    canonical: &EntityCollection,
) -> MergeOutcome {
    let shape = FieldShape::classify(kind, existing);
    let mut prior = match existing {
        Some(value) if shape == FieldShape::Present => lower(kind, value),
        _ => IdIndex::new(),
    };

    let canonical_index = canonical.index(kind);
    let mut merged = IdIndex::with_capacity(canonical_index.len());
    let mut retained = 0;

    for (id, definition) in canonical_index {
        let base = definition.with_progress_defaults(kind);
        let entity = match prior.shift_remove(&id) {
            Some(previous) => {
                retained += 1;
                overlay_progress(kind, base, &previous)
            }
            None => base,
        };
        merged.insert(id, entity);
    }

    let added = merged.len() - retained;
    let dropped: Vec<String> = prior.into_keys().collect();
    let collection = EntityCollection::from_index(kind, merged);
    let changed = existing != Some(&collection.to_value());

    MergeOutcome {
        collection,
        report: MergeReport {
            kind,
            shape,
            retained,
            added,
            dropped,
            changed,
        },
    }
}

/// Copy `previous`'s progress fields onto `base`
///
/// Only fields present on `previous` are copied; a stored `null` counts as
/// present.
fn overlay_progress(kind: EntityKind, mut base: Entity, previous: &Entity) -> Entity {
    for field in kind.progress_fields() {
        if let Some(value) = previous.get(field.key()) {
            base.insert(field.key(), value.clone());
        }
    }
    base
}
