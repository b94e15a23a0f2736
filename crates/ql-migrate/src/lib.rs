//! Questline Migrate - operational batch migration
//!
//! Loads a catalog release and applies it to every user in a JSON store
//! document, then writes the document back. Intended for operators, not
//! for request-serving paths.
//!
//! # Example
//!
//! ```text
//! ql-migrate --store users.json --catalog catalog/v2.yaml -j 8 --report json
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod run;

pub use cli::{Cli, LogFormat, ReportFormat};
pub use config::{ConfigError, FileConfig, Settings};
pub use run::{render_json, render_text, run, RunError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
