//! Store and cache error types

use crate::path::StorePath;

/// Remote store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network, auth or I/O failure talking to the store
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// Store refused the operation
    #[error("store rejected operation on {path}: {reason}")]
    Rejected { path: StorePath, reason: String },

    /// Document could not be encoded or decoded
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create unreachable error
    #[inline]
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    /// Check if error is a connectivity failure
    #[inline]
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Check if retrying the same call could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_unreachable()
    }
}

/// Local cache failure
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache backend cannot be read or written
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    /// Stored blob is not a valid snapshot
    #[error("corrupt cache entry {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Create unavailable error
    #[inline]
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
