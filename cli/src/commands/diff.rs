//! Diff command - plan between two snapshot files without writing anything

use std::path::Path;

use driftless_migrations::diff_snapshots;
use driftless_types::Dialect;

use crate::commands::RenameOptions;
use crate::error::CliError;
use crate::output;
use crate::snapshot;

pub fn run(
    from: &Path,
    to: &Path,
    dialect: Option<Dialect>,
    renames: &RenameOptions,
) -> Result<(), CliError> {
    let prev = snapshot::load_file(from)?;
    let current = snapshot::load_file(to)?;

    let dialect = dialect
        .or(current.dialect)
        .or(prev.dialect)
        .ok_or_else(|| {
            CliError::Other(
                "No dialect: pass --dialect or set \"dialect\" in a snapshot".to_string(),
            )
        })?;

    let mut resolver = renames.resolver(dialect)?;
    let plan = diff_snapshots(&prev, &current, dialect, resolver.as_mut())?;

    if plan.is_empty() {
        println!("{}", output::warning("No schema changes detected"));
        return Ok(());
    }
    output::print_plan(&plan);
    Ok(())
}
