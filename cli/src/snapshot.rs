//! Loading interim snapshots from disk

use std::path::{Path, PathBuf};

use driftless_migrations::InterimSnapshot;
use driftless_types::Dialect;

use crate::config::Config;
use crate::error::CliError;

/// Read one interim snapshot file
pub fn load_file(path: &Path) -> Result<InterimSnapshot, CliError> {
    let snapshot = InterimSnapshot::load(path)?;
    tracing::debug!(path = %path.display(), tables = snapshot.tables.len(), "snapshot loaded");
    Ok(snapshot)
}

/// Merge `files` in order into one snapshot targeting `dialect`
pub fn load_all(files: &[PathBuf], dialect: Dialect) -> Result<InterimSnapshot, CliError> {
    let mut merged = InterimSnapshot::empty(dialect);
    for path in files {
        merged.merge(load_file(path)?)?;
    }
    Ok(merged)
}

/// The desired schema described by the configured schema files
pub fn load_schema(config: &Config) -> Result<(Vec<PathBuf>, InterimSnapshot), CliError> {
    let files = config.schema_files()?;
    let snapshot = load_all(&files, config.dialect)?;
    Ok((files, snapshot))
}
