//! Generate migration command
//!
//! This command generates a new migration by:
//! 1. Merging the configured schema files into the desired snapshot
//! 2. Loading the snapshot stored with the latest migration
//! 3. Planning the changes between the two
//! 4. Writing the migration SQL and the new snapshot

use colored::Colorize;
use driftless_migrations::{MigrationWriter, diff_snapshots};

use crate::commands::RenameOptions;
use crate::config::Config;
use crate::error::CliError;
use crate::output;
use crate::snapshot;

pub fn run(config: &Config, name: Option<&str>, renames: &RenameOptions) -> Result<(), CliError> {
    println!("{}", output::heading("Generating migration..."));

    let (files, current) = snapshot::load_schema(config)?;
    println!(
        "  {} {} schema file(s)",
        output::label("Loaded"),
        files.len()
    );

    let writer =
        MigrationWriter::new(config.migrations_dir()).with_breakpoints(config.breakpoints);
    let previous = writer.previous_snapshot(config.dialect)?;

    let mut resolver = renames.resolver(config.dialect)?;
    let plan = diff_snapshots(&previous, &current, config.dialect, resolver.as_mut())?;

    if plan.is_empty() {
        println!("{}", output::warning("No schema changes detected"));
        return Ok(());
    }

    let entry = writer.write(name, &plan, &current)?;
    println!(
        "{} Created migration: {}",
        "✓".green().bold(),
        entry.tag.cyan()
    );
    println!(
        "  {} statement(s) in {}",
        plan.sql().len(),
        output::muted(&entry.sql_path().display().to_string())
    );
    for rename in &plan.renames {
        println!("  {} {}", output::label("rename"), rename);
    }
    output::print_hints(&plan.hints);

    Ok(())
}
