//! Command-line arguments

use clap::{Parser, ValueEnum};
use ql_catalog::EntityKind;
use serde::Deserialize;
use std::path::PathBuf;

/// Apply a catalog release to every user record in a store
#[derive(Debug, Clone, Parser)]
#[command(name = "ql-migrate", version, about)]
pub struct Cli {
    /// TOML settings file; flags override its values
    #[arg(short, long, env = "QL_MIGRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON store document to migrate
    #[arg(short, long, env = "QL_STORE")]
    pub store: Option<PathBuf>,

    /// Catalog release (.json, .yaml or .yml)
    #[arg(long, env = "QL_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Users migrated in parallel
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Collection to migrate; repeat for several (default: all)
    #[arg(short, long = "target")]
    pub targets: Vec<EntityKind>,

    /// Compute the report without writing the store
    #[arg(long)]
    pub dry_run: bool,

    /// Log line format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Report format on stdout
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Summary table
    Text,
    /// Full report as JSON
    Json,
}
