//! Error types for the CLI

use std::process::ExitCode;

use driftless_migrations::{MigrationError, PlanningError, SchemaErrors, SnapshotError};
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Engine error
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// The operator declined to continue
    #[error("Aborted")]
    Aborted,

    /// Some schema files failed validation
    #[error("{0} schema file(s) failed validation")]
    CheckFailed(usize),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<SchemaErrors> for CliError {
    fn from(e: SchemaErrors) -> Self {
        Self::Migration(e.into())
    }
}

impl From<PlanningError> for CliError {
    fn from(e: PlanningError) -> Self {
        Self::Migration(e.into())
    }
}

impl From<SnapshotError> for CliError {
    fn from(e: SnapshotError) -> Self {
        Self::Migration(e.into())
    }
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Aborted => ExitCode::from(130),
            Self::Migration(e) if e.is_cancelled() => ExitCode::from(130),
            Self::Migration(MigrationError::Schema(_)) | Self::CheckFailed(_) => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }
}
