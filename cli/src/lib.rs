//! Driftless CLI - command-line interface for driftless schema reconciliation
//!
//! The desired schema is described by interim snapshot JSON files; the CLI
//! plans the changes from the last known state and either writes them as a
//! migration or applies them directly.
//!
//! # Configuration
//!
//! Create a `driftless.toml` file in your project root:
//!
//! ```toml
//! dialect = "sqlite"
//! schema = "schema/*.json"
//! out = "./migrations"
//! renames = ["users.name->users.full_name"]
//!
//! [dbCredentials]
//! url = "./dev.db"
//! ```
//!
//! # Commands
//!
//! - `driftless generate` - Write a migration for the schema changes
//! - `driftless push` - Apply the schema directly (SQLite, `rusqlite` feature)
//! - `driftless check` - Validate the config, schema files and stored snapshots
//! - `driftless export` - Print the whole schema as create statements
//! - `driftless diff <from> <to>` - Print the plan between two snapshot files

pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod resolver;
pub mod snapshot;

pub use config::{Config, Credentials, Error as ConfigError};
pub use error::CliError;
pub use resolver::InteractiveResolver;
