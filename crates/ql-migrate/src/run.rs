//! One migration run against a JSON store file

use ql_catalog::{Catalog, CatalogError};
use ql_store::{JsonFileStore, StoreError};
use ql_sync::{MigrationError, MigrationReport, MigrationRunner};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::Settings;

/// Fatal run errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Catalog could not be loaded
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Store file could not be opened or written back
    #[error("store {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Batch aborted before processing any user
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Load the catalog, migrate the store and write it back
///
/// The store file is rewritten only when the run is not a dry run. Users
/// that failed are in the report; the file still receives every user that
/// succeeded.
///
/// # Errors
/// Returns [`RunError`] if the catalog or store cannot be loaded, the user
/// listing fails, or the store cannot be written back.
pub async fn run(settings: &Settings) -> Result<MigrationReport, RunError> {
    let catalog = Catalog::load(&settings.catalog)?;
    tracing::info!(
        path = %settings.catalog.display(),
        version = %catalog.version,
        "catalog loaded"
    );

    let store_error = |source| RunError::Store {
        path: settings.store.display().to_string(),
        source,
    };
    let store = JsonFileStore::open(&settings.store)
        .await
        .map_err(store_error)?;

    let runner = MigrationRunner::new(store, Arc::new(catalog)).with_config(settings.migration.clone());
    let report = runner.run().await?;

    if !report.dry_run {
        runner.store().flush().await.map_err(store_error)?;
    }
    Ok(report)
}

/// Human-readable summary
#[must_use]
pub fn render_text(report: &MigrationReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(
        out,
        "catalog {} [{}]{mode}",
        report.catalog_version,
        report.catalog_hash.short()
    );
    let _ = writeln!(
        out,
        "users: {} processed, {} succeeded, {} failed",
        report.processed,
        report.succeeded,
        report.failed.len()
    );
    let _ = writeln!(
        out,
        "collections: {} initialized, {} merged, {} unchanged",
        report.initialized, report.merged, report.unchanged
    );
    let _ = writeln!(out, "retired entities dropped: {}", report.dropped_entities);
    let _ = writeln!(out, "records restamped: {}", report.stamped);
    for failure in &report.failed {
        let _ = writeln!(out, "  FAILED {} [{}]: {}", failure.user_id, failure.kind, failure.reason);
    }
    out
}

/// Full report as pretty JSON
///
/// # Errors
/// Returns error if the report cannot be encoded
pub fn render_json(report: &MigrationReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
