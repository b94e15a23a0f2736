//! Store paths
//!
//! Provides [`StorePath`] for addressing documents in the remote store,
//! e.g. `users/alice/quests`.

use ql_catalog::{EntityKind, UserId};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Root collection holding every user record
pub const USERS: &str = "users";

/// Slash-separated path into the remote document tree
///
/// # Examples
/// - `["users"]` → `users`
/// - `["users", "alice", "points"]` → `users/alice/points`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StorePath(Vec<String>);

impl StorePath {
    /// `users`
    #[inline]
    #[must_use]
    pub fn users() -> Self {
        Self(vec![USERS.to_string()])
    }

    /// `users/{id}`
    #[inline]
    #[must_use]
    pub fn user(id: &UserId) -> Self {
        Self::users().child_unchecked(id.as_str())
    }

    /// `users/{id}/{field}`
    #[inline]
    #[must_use]
    pub fn user_field(id: &UserId, field: &str) -> Self {
        Self::user(id).child_unchecked(field)
    }

    /// `users/{id}/{collection}` for an entity kind
    #[inline]
    #[must_use]
    pub fn user_collection(id: &UserId, kind: EntityKind) -> Self {
        Self::user_field(id, kind.field_name())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_last()
            .map(|(_, parent)| Self(parent.to_vec()))
    }

    fn child_unchecked(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if segment
        .chars()
        .any(|c| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control())
    {
        return Err(PathError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

impl Display for StorePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl FromStr for StorePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let segments = trimmed
            .split('/')
            .map(|seg| validate_segment(seg).map(|()| seg.to_string()))
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

/// Errors related to store paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment characters
    #[error("invalid segment: {0} (must not contain / . # $ [ ] or control characters)")]
    InvalidSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[test]
    fn user_paths() {
        assert_eq!(StorePath::user(&alice()).to_string(), "users/alice");
        assert_eq!(
            StorePath::user_collection(&alice(), EntityKind::RankedTask).to_string(),
            "users/alice/rankedTasks"
        );
    }

    #[test]
    fn parent() {
        let path = StorePath::user_field(&alice(), "xp");
        assert_eq!(path.parent(), Some(StorePath::user(&alice())));
        assert!(StorePath::default().parent().is_none());
    }

    #[test]
    fn parse_paths() {
        let path: StorePath = "/users/bob/points/".parse().unwrap();
        assert_eq!(path.segments(), &["users", "bob", "points"]);
        assert!("".parse::<StorePath>().unwrap().is_empty());
        assert_eq!("users//bob".parse::<StorePath>(), Err(PathError::EmptySegment));
        assert!(matches!(
            "users/a.b".parse::<StorePath>(),
            Err(PathError::InvalidSegment(_))
        ));
    }
}
