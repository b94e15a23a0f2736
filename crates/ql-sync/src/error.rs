//! Error types for reconciliation and migration
//!
//! Shape mismatches in stored data never surface here: the merge absorbs
//! them. What escapes is I/O against the store, reported to the immediate
//! caller without internal retries.

use ql_catalog::{CatalogError, UserId};
use ql_store::{CacheError, StoreError};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Failure classification shared by reconciliation and migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network, auth or I/O failure talking to the remote store
    StoreUnreachable,
    /// Stored data does not match its expected shape (recovered as absent)
    MalformedField,
    /// A single user's or field's write failed
    PartialWriteFailure,
    /// Local cache read or write failed
    CacheUnavailable,
}

impl ErrorKind {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StoreUnreachable => "store_unreachable",
            Self::MalformedField => "malformed_field",
            Self::PartialWriteFailure => "partial_write_failure",
            Self::CacheUnavailable => "cache_unavailable",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&CacheError> for ErrorKind {
    fn from(_: &CacheError) -> Self {
        Self::CacheUnavailable
    }
}

/// Operation a sync failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Reading `users/{id}` or one of its fields
    ReadRemote,
    /// Partial update of `users/{id}`
    WriteRemote,
    /// Creating a record at signup
    Provision,
    /// Removing a record
    Delete,
    /// Stamping `lastLogin`
    RecordLogin,
}

impl SyncOperation {
    /// Whether the operation writes to the store
    #[inline]
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Self::WriteRemote | Self::Provision | Self::Delete | Self::RecordLogin
        )
    }

    /// Human-readable operation name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReadRemote => "read user record",
            Self::WriteRemote => "write user record",
            Self::Provision => "create user record",
            Self::Delete => "delete user record",
            Self::RecordLogin => "record login",
        }
    }
}

impl Display for SyncOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reconciliation failure
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Store call failed
    #[error("{operation} failed for {user_id}: {source}")]
    Store {
        operation: SyncOperation,
        user_id: UserId,
        #[source]
        source: StoreError,
    },

    /// Neither the cache nor the store holds a record
    #[error("no record for user {0}")]
    UserNotFound(UserId),

    /// Provisioning found an existing record
    #[error("user {0} already has a record")]
    AlreadyExists(UserId),

    /// Record could not be encoded for the store
    #[error("{operation} failed for {user_id}: cannot encode record: {source}")]
    Serialization {
        operation: SyncOperation,
        user_id: UserId,
        #[source]
        source: serde_json::Error,
    },
}

impl SyncError {
    /// Create store error
    #[inline]
    #[must_use]
    pub fn store(operation: SyncOperation, user_id: &UserId, source: StoreError) -> Self {
        Self::Store {
            operation,
            user_id: user_id.clone(),
            source,
        }
    }

    /// Operation that failed
    #[must_use]
    pub fn operation(&self) -> SyncOperation {
        match self {
            Self::Store { operation, .. } | Self::Serialization { operation, .. } => *operation,
            Self::UserNotFound(_) => SyncOperation::ReadRemote,
            Self::AlreadyExists(_) => SyncOperation::Provision,
        }
    }

    /// Classification, if the error belongs to one of the [`ErrorKind`]s
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Store { source, .. } if source.is_unreachable() => {
                Some(ErrorKind::StoreUnreachable)
            }
            Self::Store { operation, .. } | Self::Serialization { operation, .. }
                if operation.is_write() =>
            {
                Some(ErrorKind::PartialWriteFailure)
            }
            Self::Store { .. } => Some(ErrorKind::StoreUnreachable),
            _ => None,
        }
    }

    /// User-visible notification text: operation name and underlying message
    #[must_use]
    pub fn notification(&self) -> String {
        let message = match self {
            Self::Store { source, .. } => source.to_string(),
            Self::Serialization { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        format!("{}: {message}", self.operation())
    }

    /// Check if retrying the same call could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Fatal migration failure; per-user failures go to the report instead
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// User listing failed, nothing was processed
    #[error("cannot list users: {0}")]
    StoreUnreachable(#[source] StoreError),

    /// Catalog could not be fingerprinted
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl MigrationError {
    /// Classification
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::StoreUnreachable(_) => Some(ErrorKind::StoreUnreachable),
            Self::Catalog(_) => None,
        }
    }
}
