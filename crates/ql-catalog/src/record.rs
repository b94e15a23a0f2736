//! User records and local snapshots
//!
//! [`UserRecord`] mirrors the remote layout under `users/{id}`. Every
//! sub-tree is optional so the same type describes a full record, a partial
//! read, or the subset a client keeps in its [`LocalSnapshot`]. Entity
//! collections are kept as raw JSON because the store may hold data in a
//! shape the current catalog no longer matches.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::entity::EntityKind;

/// Wall-clock milliseconds since the Unix epoch
pub type Millis = i64;

/// Store-safe user identifier
///
/// Must be usable as a single path segment: non-empty, and free of `/`,
/// `.`, `#`, `$`, `[`, `]` and control characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap an id
    ///
    /// # Errors
    /// Returns error if the id is empty or contains reserved characters
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(c) = id
            .chars()
            .find(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
        {
            return Err(IdError::ReservedCharacter { id, character: c });
        }
        Ok(Self(id))
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Invalid user id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Empty id
    #[error("user id is empty")]
    Empty,

    /// Id contains a character reserved by the store's path syntax
    #[error("user id {id:?} contains reserved character {character:?}")]
    ReservedCharacter { id: String, character: char },
}

/// Public profile (`users/{id}/profile`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Avatar URL
    #[serde(default)]
    pub photo: String,
    /// Rank title
    #[serde(default)]
    pub rank_name: String,
    /// Rank badge URL
    #[serde(default)]
    pub rank_image: String,
}

impl Profile {
    /// Profile with just a display name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Point balance (`points`, `Mpoints`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Spendable balance
    #[serde(default)]
    pub current: i64,
    /// Lifetime total
    #[serde(default)]
    pub total: i64,
}

impl Counter {
    /// Create counter
    #[inline]
    #[must_use]
    pub const fn new(current: i64, total: i64) -> Self {
        Self { current, total }
    }
}

/// Experience (`xp`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xp {
    /// Experience within the current level
    #[serde(default)]
    pub current: i64,
    /// Current level
    #[serde(default = "first_level")]
    pub level: u32,
}

fn first_level() -> u32 {
    1
}

impl Default for Xp {
    fn default() -> Self {
        Self {
            current: 0,
            level: first_level(),
        }
    }
}

/// Aggregate root stored at `users/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Counter>,

    #[serde(rename = "Mpoints", default, skip_serializing_if = "Option::is_none")]
    pub mpoints: Option<Counter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<Xp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quests: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranked_tasks: Option<Value>,

    /// Epoch milliseconds of the last controlled write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Millis>,

    /// RFC 3339 timestamp of the last login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,
}

impl UserRecord {
    /// Store field name of `lastUpdated`
    pub const LAST_UPDATED: &'static str = "lastUpdated";

    /// Store field name of `lastLogin`
    pub const LAST_LOGIN: &'static str = "lastLogin";

    /// Decode a raw store value, treating malformed sub-trees as absent
    ///
    /// Returns the record together with the names of the fields that were
    /// present but could not be decoded. A non-object root decodes to an
    /// empty record.
    #[must_use]
    pub fn from_store_value(value: &Value) -> (Self, Vec<&'static str>) {
        let mut malformed = Vec::new();
        let Some(obj) = value.as_object() else {
            if !value.is_null() {
                malformed.push("record");
            }
            return (Self::default(), malformed);
        };

        let record = Self {
            profile: typed_field(obj, "profile", &mut malformed),
            points: typed_field(obj, "points", &mut malformed),
            mpoints: typed_field(obj, "Mpoints", &mut malformed),
            xp: typed_field(obj, "xp", &mut malformed),
            tasks: raw_field(obj, EntityKind::Task.field_name()),
            quests: raw_field(obj, EntityKind::Quest.field_name()),
            ranked_tasks: raw_field(obj, EntityKind::RankedTask.field_name()),
            last_updated: typed_field(obj, Self::LAST_UPDATED, &mut malformed),
            last_login: typed_field(obj, Self::LAST_LOGIN, &mut malformed),
        };
        (record, malformed)
    }

    /// `lastUpdated`, or `0` when never written
    #[inline]
    #[must_use]
    pub fn last_updated(&self) -> Millis {
        self.last_updated.unwrap_or(0)
    }

    /// Copy of this record carrying a new `lastUpdated`
    #[inline]
    #[must_use]
    pub fn stamped(mut self, at: Millis) -> Self {
        self.last_updated = Some(at);
        self
    }

    /// Raw entity collection for `kind`
    #[inline]
    #[must_use]
    pub fn collection(&self, kind: EntityKind) -> Option<&Value> {
        match kind {
            EntityKind::Task => self.tasks.as_ref(),
            EntityKind::Quest => self.quests.as_ref(),
            EntityKind::RankedTask => self.ranked_tasks.as_ref(),
        }
    }

    /// Replace the entity collection for `kind`
    pub fn set_collection(&mut self, kind: EntityKind, value: Value) {
        let slot = match kind {
            EntityKind::Task => &mut self.tasks,
            EntityKind::Quest => &mut self.quests,
            EntityKind::RankedTask => &mut self.ranked_tasks,
        };
        *slot = Some(value);
    }

    /// Check if no sub-tree is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Present sub-trees as store fields, for a partial update
    ///
    /// # Errors
    /// Returns error if the record cannot be encoded as JSON
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

fn typed_field<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    key: &'static str,
    malformed: &mut Vec<&'static str>,
) -> Option<T> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => T::deserialize(value).map_or_else(
            |_| {
                malformed.push(key);
                None
            },
            Some,
        ),
    }
}

fn raw_field(obj: &Map<String, Value>, key: &str) -> Option<Value> {
    obj.get(key).filter(|value| !value.is_null()).cloned()
}

/// Client-held copy of a user record
///
/// Serialized as one opaque JSON blob per user; its `lastUpdated` is the
/// record's own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalSnapshot {
    pub record: UserRecord,
}

impl LocalSnapshot {
    /// Wrap a record
    #[inline]
    #[must_use]
    pub fn new(record: UserRecord) -> Self {
        Self { record }
    }

    /// `lastUpdated` of the snapshot (`0` when absent)
    #[inline]
    #[must_use]
    pub fn last_updated(&self) -> Millis {
        self.record.last_updated()
    }

    /// Encode as a cache blob
    ///
    /// # Errors
    /// Returns error if encoding fails
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a cache blob
    ///
    /// # Errors
    /// Returns error if the blob is not a valid snapshot
    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }

    /// Unwrap the record
    #[inline]
    #[must_use]
    pub fn into_record(self) -> UserRecord {
        self.record
    }
}

impl From<UserRecord> for LocalSnapshot {
    fn from(record: UserRecord) -> Self {
        Self::new(record)
    }
}
