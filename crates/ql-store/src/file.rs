//! JSON-file backed store
//!
//! Holds the document tree in a [`MemoryStore`] and writes it back on
//! [`JsonFileStore::flush`]. Used by the migration binary to run a batch
//! against an exported store dump.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::path::StorePath;
use crate::remote::{MemoryStore, RemoteStore};

/// Store persisted as a single JSON document on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Load the document at `path`
    ///
    /// A missing file opens as an empty store.
    ///
    /// # Errors
    /// Returns [`StoreError::Unreachable`] if the file cannot be read and
    /// [`StoreError::Serialization`] if it is not valid JSON.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Value::Object(Map::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "store file missing, starting empty");
                Value::Object(Map::new())
            }
            Err(err) => {
                return Err(StoreError::unreachable(format!(
                    "{}: {err}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            inner: MemoryStore::from_value(document),
        })
    }

    /// Write the current document back to disk
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target so a crash never leaves a truncated store.
    ///
    /// # Errors
    /// Returns [`StoreError::Unreachable`] on I/O failure
    pub async fn flush(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&self.inner.snapshot())?;
        let tmp = temp_path(&self.path);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(parent, &err))?;
        }
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| io_error(&tmp, &err))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| io_error(&self.path, &err))?;

        tracing::debug!(path = %self.path.display(), "store flushed");
        Ok(())
    }

    /// File backing this store
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory view of the document
    #[inline]
    #[must_use]
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::unreachable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl RemoteStore for JsonFileStore {
    async fn list(&self, path: &StorePath) -> Result<Vec<String>, StoreError> {
        self.inner.list(path).await
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.inner.read(path).await
    }

    async fn update(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.update(path, fields).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.inner.delete(path).await
    }
}
