//! Entity kinds and entity bodies
//!
//! An [`Entity`] is an open JSON object so that descriptive fields can be
//! added, rewritten, or removed between catalog releases without code
//! changes. What the engine needs to know about each entity type lives on
//! [`EntityKind`]: where the collection is stored, which container shape it
//! uses, how items are identified, and which fields carry user progress.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::collection::ContainerShape;

/// A mutable attribute on a user's copy of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressField {
    /// Quest completion flag
    Completed,
    /// Number of times a task was completed
    CompletionCount,
    /// Active boost on a ranked task (nullable)
    Boost,
    /// Ranked task level
    Level,
}

impl ProgressField {
    /// Field name inside the entity object
    #[inline]
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletionCount => "completionCount",
            Self::Boost => "boost",
            Self::Level => "level",
        }
    }

    /// Documented default used when no progress exists yet
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Completed => Value::Bool(false),
            Self::CompletionCount => Value::from(0),
            Self::Boost => Value::Null,
            Self::Level => Value::from(1),
        }
    }
}

/// Entity types tracked per user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// Repeatable tasks (`users/{id}/tasks`)
    Task,
    /// One-shot quests keyed by quest id (`users/{id}/quests`)
    Quest,
    /// Levelled tasks with boosts (`users/{id}/rankedTasks`)
    RankedTask,
}

impl EntityKind {
    /// All kinds in store order
    pub const ALL: [Self; 3] = [Self::Task, Self::Quest, Self::RankedTask];

    /// Field name of the collection under `users/{id}`
    #[inline]
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Quest => "quests",
            Self::RankedTask => "rankedTasks",
        }
    }

    /// Container shape the collection is stored in
    #[inline]
    #[must_use]
    pub const fn shape(self) -> ContainerShape {
        match self {
            Self::Quest => ContainerShape::Keyed,
            Self::Task | Self::RankedTask => ContainerShape::Sequence,
        }
    }

    /// Fields that identify an item inside a sequence, in lookup order
    ///
    /// Keyed collections are identified by their map key and return an
    /// empty slice. Each item resolves its id on its own: a task with an
    /// `id` is known by that `id`, one without is known by its `name`. A
    /// stored task carrying only `name: "Walk"` therefore does not match a
    /// catalog task `{id: "walk", name: "Walk"}`.
    #[inline]
    #[must_use]
    pub const fn id_keys(self) -> &'static [&'static str] {
        match self {
            Self::Task => &["id", "name"],
            Self::Quest => &[],
            Self::RankedTask => &["taskId"],
        }
    }

    /// Progress fields recognised by this kind
    #[inline]
    #[must_use]
    pub const fn progress_fields(self) -> &'static [ProgressField] {
        match self {
            Self::Task => &[ProgressField::CompletionCount],
            Self::Quest => &[ProgressField::Completed],
            Self::RankedTask => &[
                ProgressField::CompletionCount,
                ProgressField::Boost,
                ProgressField::Level,
            ],
        }
    }

    /// Check whether `key` names a progress field of this kind
    #[inline]
    #[must_use]
    pub fn is_progress_field(self, key: &str) -> bool {
        self.progress_fields().iter().any(|f| f.key() == key)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tasks" | "task" => Ok(Self::Task),
            "quests" | "quest" => Ok(Self::Quest),
            "rankedTasks" | "ranked-tasks" | "ranked_tasks" | "rankedTask" => Ok(Self::RankedTask),
            other => Err(UnknownEntityKind(other.to_string())),
        }
    }
}

/// Unrecognised entity kind name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind: {0} (expected tasks, quests or rankedTasks)")]
pub struct UnknownEntityKind(pub String);

/// One activity: descriptive fields plus, on user copies, progress fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    /// Create an empty entity
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an existing JSON object
    #[inline]
    #[must_use]
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Borrow a JSON value as an entity if it is an object
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().cloned().map(Self)
    }

    /// Get a field
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a field is present (a present `null` counts)
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a field, returning the previous value
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Builder-style field setter
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// All fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON object value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Resolve this entity's id for a sequence-shaped kind
    ///
    /// The first of [`EntityKind::id_keys`] holding a non-empty string or a
    /// number wins; numeric ids are rendered in decimal. The fallback is per
    /// item, so two copies of one task keyed differently resolve to
    /// different ids.
    #[must_use]
    pub fn id_for(&self, kind: EntityKind) -> Option<String> {
        kind.id_keys()
            .iter()
            .find_map(|key| match self.0.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Fill every absent progress field of `kind` with its default
    ///
    /// Fields already present keep their value, so a canonical `level`
    /// becomes the starting level.
    #[must_use]
    pub fn with_progress_defaults(mut self, kind: EntityKind) -> Self {
        for field in kind.progress_fields() {
            if !self.contains(field.key()) {
                self.insert(field.key(), field.default_value());
            }
        }
        self
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
