//! Settings file and flag resolution
//!
//! `migrate.toml` supplies defaults; every flag given on the command line
//! overrides the matching file value.
//!
//! ```toml
//! store = "users.json"
//! catalog = "catalog/v2.yaml"
//! concurrency = 8
//! targets = ["quests", "rankedTasks"]
//! dry_run = false
//! log_format = "json"
//! ```

use ql_catalog::{EntityKind, UnknownEntityKind};
use ql_sync::MigrationConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, LogFormat};

/// Contents of a settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub store: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub targets: Option<Vec<String>>,
    pub dry_run: Option<bool>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    /// Read and parse a settings file
    ///
    /// Relative `store` and `catalog` paths are resolved against the
    /// file's directory.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid TOML
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.store = config.store.map(|p| base.join(p));
            config.catalog = config.catalog.map(|p| base.join(p));
        }
        Ok(config)
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store: PathBuf,
    pub catalog: PathBuf,
    pub migration: MigrationConfig,
    pub log_format: LogFormat,
}

impl Settings {
    /// Merge the settings file named by `cli` (if any) with its flags
    ///
    /// # Errors
    /// Returns error if the file is unreadable or a required path is
    /// missing from both sources.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Flags over file values over defaults
    ///
    /// # Errors
    /// Returns error if a required path is missing or a file target is
    /// not a known collection.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let store = cli
            .store
            .clone()
            .or(file.store)
            .ok_or(ConfigError::Missing("store"))?;
        let catalog = cli
            .catalog
            .clone()
            .or(file.catalog)
            .ok_or(ConfigError::Missing("catalog"))?;

        let mut migration = MigrationConfig::new();
        if !cli.targets.is_empty() {
            migration = migration.with_targets(cli.targets.iter().copied());
        } else if let Some(names) = file.targets {
            let targets = names
                .iter()
                .map(|name| name.parse::<EntityKind>())
                .collect::<Result<Vec<_>, _>>()?;
            migration = migration.with_targets(targets);
        }
        if let Some(concurrency) = cli.concurrency.or(file.concurrency) {
            migration = migration.with_concurrency(concurrency);
        }
        migration = migration.with_dry_run(cli.dry_run || file.dry_run.unwrap_or(false));

        Ok(Self {
            store,
            catalog,
            migration,
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
        })
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Required setting given neither as flag nor in the file
    #[error("missing setting: {0} (pass --{0} or set it in the config file)")]
    Missing(&'static str),

    /// Unknown collection in `targets`
    #[error(transparent)]
    Target(#[from] UnknownEntityKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ReportFormat;
    use pretty_assertions::assert_eq;

    fn cli() -> Cli {
        Cli {
            config: None,
            store: None,
            catalog: None,
            concurrency: None,
            targets: Vec::new(),
            dry_run: false,
            log_format: None,
            report: ReportFormat::Text,
        }
    }

    #[test]
    fn flags_override_file() {
        let file = FileConfig {
            store: Some("file.json".into()),
            catalog: Some("v1.yaml".into()),
            concurrency: Some(2),
            targets: Some(vec!["quests".into()]),
            dry_run: Some(false),
            log_format: Some(LogFormat::Json),
        };
        let cli = Cli {
            catalog: Some("v2.yaml".into()),
            concurrency: Some(8),
            dry_run: true,
            ..cli()
        };

        let settings = Settings::merge(&cli, file).unwrap();

        assert_eq!(settings.store, PathBuf::from("file.json"));
        assert_eq!(settings.catalog, PathBuf::from("v2.yaml"));
        assert_eq!(settings.migration.concurrency, 8);
        assert_eq!(settings.migration.targets, vec![EntityKind::Quest]);
        assert!(settings.migration.dry_run);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn missing_store_is_reported() {
        let cli = Cli {
            catalog: Some("v2.yaml".into()),
            ..cli()
        };
        let err = Settings::merge(&cli, FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("store")));
    }

    #[test]
    fn unknown_file_target() {
        let cli = Cli {
            store: Some("s.json".into()),
            catalog: Some("c.json".into()),
            ..cli()
        };
        let file = FileConfig {
            targets: Some(vec!["badges".into()]),
            ..FileConfig::default()
        };
        assert!(matches!(
            Settings::merge(&cli, file),
            Err(ConfigError::Target(_))
        ));
    }

    #[test]
    fn load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.toml");
        std::fs::write(
            &path,
            "store = \"users.json\"\ncatalog = \"catalog.yaml\"\ntargets = [\"rankedTasks\"]\nlog_format = \"text\"\n",
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();

        assert_eq!(file.store, Some(dir.path().join("users.json")));
        assert_eq!(file.catalog, Some(dir.path().join("catalog.yaml")));
        assert_eq!(file.log_format, Some(LogFormat::Text));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.toml");
        std::fs::write(&path, "stor = \"typo.json\"\n").unwrap();

        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
