//! Canonical catalog
//!
//! A [`Catalog`] is one release of the task/quest/ranked-task definitions.
//! It is an explicit immutable value handed to every merge and migration
//! call, never a process-wide constant, so tests can run against several
//! releases side by side.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::collection::{ContainerShape, EntityCollection};
use crate::entity::EntityKind;
use crate::hash::{CatalogHash, HashError};

/// Canonical catalog release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Release identifier
    pub version: String,

    /// Task definitions
    #[serde(default = "empty_sequence")]
    pub tasks: EntityCollection,

    /// Quest definitions keyed by quest id
    #[serde(default = "empty_keyed")]
    pub quests: EntityCollection,

    /// Ranked task definitions
    #[serde(default = "empty_sequence")]
    pub ranked_tasks: EntityCollection,
}

fn empty_sequence() -> EntityCollection {
    EntityCollection::empty(ContainerShape::Sequence)
}

fn empty_keyed() -> EntityCollection {
    EntityCollection::empty(ContainerShape::Keyed)
}

/// Source format of a catalog document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// JSON document
    Json,
    /// YAML document
    Yaml,
}

impl CatalogFormat {
    /// Pick format from file extension
    ///
    /// # Errors
    /// Returns error for extensions other than `json`, `yaml` and `yml`
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl Catalog {
    /// Create an empty catalog release
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            tasks: empty_sequence(),
            quests: empty_keyed(),
            ranked_tasks: empty_sequence(),
        }
    }

    /// Replace the collection for `kind`
    #[must_use]
    pub fn with_collection(mut self, kind: EntityKind, collection: EntityCollection) -> Self {
        *self.collection_mut(kind) = collection;
        self
    }

    /// Parse and validate a JSON catalog
    ///
    /// # Errors
    /// Returns error if JSON is invalid or the catalog fails validation
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse and validate a YAML catalog
    ///
    /// # Errors
    /// Returns error if YAML is invalid or the catalog fails validation
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog in the given format
    ///
    /// # Errors
    /// Returns error if parsing or validation fails
    pub fn parse(source: &str, format: CatalogFormat) -> Result<Self, CatalogError> {
        match format {
            CatalogFormat::Json => Self::from_json(source),
            CatalogFormat::Yaml => Self::from_yaml(source),
        }
    }

    /// Read a catalog file, picking the format from its extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or validated
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let format = CatalogFormat::from_path(path)?;
        let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source, format)
    }

    /// Collection for an entity kind
    #[inline]
    #[must_use]
    pub fn collection(&self, kind: EntityKind) -> &EntityCollection {
        match kind {
            EntityKind::Task => &self.tasks,
            EntityKind::Quest => &self.quests,
            EntityKind::RankedTask => &self.ranked_tasks,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut EntityCollection {
        match kind {
            EntityKind::Task => &mut self.tasks,
            EntityKind::Quest => &mut self.quests,
            EntityKind::RankedTask => &mut self.ranked_tasks,
        }
    }

    /// Check catalog invariants
    ///
    /// Every collection must have its kind's shape, every sequence item
    /// must carry an id, and ids must be unique within a collection.
    ///
    /// # Errors
    /// Returns the first violation found
    pub fn validate(&self) -> Result<(), CatalogError> {
        for kind in EntityKind::ALL {
            let collection = self.collection(kind);
            if collection.shape() != kind.shape() {
                return Err(CatalogError::WrongShape {
                    kind,
                    expected: kind.shape(),
                });
            }

            if let EntityCollection::Sequence(items) = collection {
                let mut seen = HashSet::with_capacity(items.len());
                for (position, entity) in items.iter().enumerate() {
                    let id = entity
                        .id_for(kind)
                        .ok_or(CatalogError::MissingId { kind, position })?;
                    if !seen.insert(id.clone()) {
                        return Err(CatalogError::DuplicateId { kind, id });
                    }
                }
            }
        }
        Ok(())
    }

    /// Fingerprint of this release
    ///
    /// # Errors
    /// Returns error if the catalog cannot be encoded as JSON
    pub fn fingerprint(&self) -> Result<CatalogHash, CatalogError> {
        Ok(CatalogHash::compute_canonical(self)?)
    }
}

/// Catalog loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// File could not be read
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unknown file extension
    #[error("unsupported catalog format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    /// Invalid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Invalid YAML
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Collection stored in the wrong container
    #[error("{kind} must be a {expected:?} collection")]
    WrongShape {
        kind: EntityKind,
        expected: ContainerShape,
    },

    /// Sequence item without an id
    #[error("{kind}[{position}] has no id")]
    MissingId { kind: EntityKind, position: usize },

    /// Two entities share an id
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: EntityKind, id: String },

    /// Fingerprinting failed
    #[error("fingerprint failed: {0}")]
    Fingerprint(#[from] HashError),
}
