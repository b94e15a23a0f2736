//! Default scaffolding for records read on first load or created at signup

use ql_catalog::{Catalog, Counter, EntityKind, Millis, Profile, UserRecord, Xp};
use ql_merge::{initialize, FieldShape};

/// Fill every missing sub-tree of `record`
///
/// Collections that are absent or in the wrong container take the
/// catalog's initialization path; counters default to zero and `xp` to
/// level 1. Present collections are left as stored. Returns the kinds that
/// were initialized.
pub fn fill_defaults(record: &mut UserRecord, catalog: &Catalog) -> Vec<EntityKind> {
    let mut initialized = Vec::new();
    for kind in EntityKind::ALL {
        if FieldShape::classify(kind, record.collection(kind)).needs_initialization() {
            record.set_collection(kind, initialize(kind, catalog.collection(kind)).to_value());
            initialized.push(kind);
        }
    }

    record.points.get_or_insert_with(Counter::default);
    record.mpoints.get_or_insert_with(Counter::default);
    record.xp.get_or_insert_with(Xp::default);
    initialized
}

/// Record created at signup with `catalog` baked in
#[must_use]
pub fn initial_record(profile: Profile, catalog: &Catalog, at: Millis) -> UserRecord {
    let mut record = UserRecord {
        profile: Some(profile),
        ..UserRecord::default()
    };
    fill_defaults(&mut record, catalog);
    record.stamped(at)
}
