//! Shape classification of stored collections
//!
//! Stored user data is untrusted: a collection may be missing, `null`, or
//! held in the wrong container. Classification only feeds telemetry; the
//! merge treats both `Absent` and `Malformed` as "no prior progress".

use ql_catalog::{ContainerShape, Entity, EntityKind, IdIndex};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Classification of a stored collection against its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// Field missing or `null`
    Absent,
    /// Field present in the wrong container
    Malformed,
    /// Field present in the kind's container
    Present,
}

impl FieldShape {
    /// Classify a stored value for `kind`
    #[must_use]
    pub fn classify(kind: EntityKind, existing: Option<&Value>) -> Self {
        match existing {
            None | Some(Value::Null) => Self::Absent,
            Some(value) if kind.shape().matches(value) => Self::Present,
            Some(_) => Self::Malformed,
        }
    }

    /// Whether the merge takes the initialization path
    #[inline]
    #[must_use]
    pub fn needs_initialization(self) -> bool {
        !matches!(self, Self::Present)
    }

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Malformed => "malformed",
            Self::Present => "present",
        }
    }
}

impl Display for FieldShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower a correctly shaped stored collection into an id index
///
/// Items that are not objects, and sequence items without an id, are
/// skipped. On duplicate sequence ids the first occurrence wins.
pub(crate) fn lower(kind: EntityKind, value: &Value) -> IdIndex {
    let mut index = IdIndex::new();
    match (kind.shape(), value) {
        (ContainerShape::Keyed, Value::Object(map)) => {
            for (id, item) in map {
                if let Some(entity) = Entity::from_value(item) {
                    index.insert(id.clone(), entity);
                }
            }
        }
        (ContainerShape::Sequence, Value::Array(items)) => {
            for entity in items.iter().filter_map(Entity::from_value) {
                if let Some(id) = entity.id_for(kind) {
                    index.entry(id).or_insert(entity);
                }
            }
        }
        _ => {}
    }
    index
}
