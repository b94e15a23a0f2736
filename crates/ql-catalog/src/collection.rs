//! Entity collections
//!
//! Quests are stored as a mapping keyed by id; tasks and ranked tasks as
//! ordered sequences whose items carry their own id. Both are logically a
//! set of entities keyed by id, so every algorithm works against
//! [`IdIndex`] and converts at the boundary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::entity::{Entity, EntityKind};

/// Ordered id → entity index
///
/// Iteration order follows the source container: key order for keyed
/// collections, item order for sequences.
pub type IdIndex = IndexMap<String, Entity>;

/// Container shape of a stored collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    /// JSON object keyed by entity id
    Keyed,
    /// JSON array of entities that carry their own id
    Sequence,
}

impl ContainerShape {
    /// Check whether a raw JSON value has this shape
    #[inline]
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::Keyed => value.is_object(),
            Self::Sequence => value.is_array(),
        }
    }
}

/// A collection of entities of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityCollection {
    /// Mapping keyed by id (quests)
    Keyed(BTreeMap<String, Entity>),
    /// Ordered sequence (tasks, ranked tasks)
    Sequence(Vec<Entity>),
}

impl EntityCollection {
    /// Create an empty collection of the given shape
    #[inline]
    #[must_use]
    pub fn empty(shape: ContainerShape) -> Self {
        match shape {
            ContainerShape::Keyed => Self::Keyed(BTreeMap::new()),
            ContainerShape::Sequence => Self::Sequence(Vec::new()),
        }
    }

    /// Container shape
    #[inline]
    #[must_use]
    pub fn shape(&self) -> ContainerShape {
        match self {
            Self::Keyed(_) => ContainerShape::Keyed,
            Self::Sequence(_) => ContainerShape::Sequence,
        }
    }

    /// Number of entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Keyed(map) => map.len(),
            Self::Sequence(items) => items.len(),
        }
    }

    /// Check if collection is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lower into an id index
    ///
    /// Sequence items without a resolvable id are skipped; on duplicate ids
    /// the first occurrence wins.
    #[must_use]
    pub fn index(&self, kind: EntityKind) -> IdIndex {
        match self {
            Self::Keyed(map) => map
                .iter()
                .map(|(id, entity)| (id.clone(), entity.clone()))
                .collect(),
            Self::Sequence(items) => {
                let mut index = IdIndex::with_capacity(items.len());
                for entity in items {
                    if let Some(id) = entity.id_for(kind) {
                        index.entry(id).or_insert_with(|| entity.clone());
                    }
                }
                index
            }
        }
    }

    /// Build a collection of `kind`'s shape from an id index
    #[must_use]
    pub fn from_index(kind: EntityKind, index: IdIndex) -> Self {
        match kind.shape() {
            ContainerShape::Keyed => Self::Keyed(index.into_iter().collect()),
            ContainerShape::Sequence => Self::Sequence(index.into_values().collect()),
        }
    }

    /// Ids in container order
    #[must_use]
    pub fn ids(&self, kind: EntityKind) -> Vec<String> {
        self.index(kind).into_keys().collect()
    }

    /// Look up an entity by id
    #[must_use]
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        match self {
            Self::Keyed(map) => map.get(id),
            Self::Sequence(items) => items
                .iter()
                .find(|entity| entity.id_for(kind).as_deref() == Some(id)),
        }
    }

    /// Convert to the JSON value stored under `users/{id}/{field}`
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Keyed(map) => Value::Object(
                map.iter()
                    .map(|(id, entity)| (id.clone(), entity.clone().into_value()))
                    .collect(),
            ),
            Self::Sequence(items) => {
                Value::Array(items.iter().cloned().map(Entity::into_value).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sequence(value: Value) -> EntityCollection {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn untagged_shapes() {
        let keyed: EntityCollection = serde_json::from_value(json!({"q1": {"xp": 5}})).unwrap();
        assert_eq!(keyed.shape(), ContainerShape::Keyed);

        let seq = sequence(json!([{"id": "t1"}]));
        assert_eq!(seq.shape(), ContainerShape::Sequence);
    }

    #[test]
    fn sequence_index_skips_missing_and_duplicate_ids() {
        let seq = sequence(json!([
            {"id": "t1", "reward": 1},
            {"reward": 2},
            {"id": "t1", "reward": 3},
            {"id": "t2"}
        ]));
        let index = seq.index(EntityKind::Task);
        assert_eq!(index.len(), 2);
        assert_eq!(index["t1"].get("reward"), Some(&json!(1)));
        assert_eq!(seq.ids(EntityKind::Task), vec!["t1", "t2"]);
    }

    #[test]
    fn index_round_trip_preserves_order() {
        let seq = sequence(json!([{"taskId": "b"}, {"taskId": "a"}]));
        let rebuilt = EntityCollection::from_index(EntityKind::RankedTask, seq.index(EntityKind::RankedTask));
        assert_eq!(rebuilt, seq);
    }

    #[test]
    fn get_by_id() {
        let seq = sequence(json!([{"taskId": "r1", "level": 2}]));
        assert!(seq.get(EntityKind::RankedTask, "r1").is_some());
        assert!(seq.get(EntityKind::RankedTask, "r9").is_none());
    }

    #[test]
    fn to_value_matches_store_layout() {
        let keyed: EntityCollection =
            serde_json::from_value(json!({"q1": {"completed": true}})).unwrap();
        assert_eq!(keyed.to_value(), json!({"q1": {"completed": true}}));
        assert!(ContainerShape::Keyed.matches(&keyed.to_value()));
        assert!(!ContainerShape::Sequence.matches(&keyed.to_value()));
    }
}
