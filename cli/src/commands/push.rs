//! Push command implementation
//!
//! Applies the schema straight to a database, without migration files.
//! Only SQLite (with the `rusqlite` feature) can be pushed to: the database
//! keeps the last pushed snapshot in a bookkeeping table and that snapshot
//! is the starting point of the next push. Every other dialect gets the
//! plan printed against the latest generated migration instead.

use driftless_migrations::{MigrationWriter, diff_snapshots};
use driftless_types::Dialect;

use crate::commands::RenameOptions;
use crate::config::Config;
use crate::error::CliError;
use crate::output;
use crate::snapshot;

/// Flags for `push`
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Apply even when the plan loses data
    pub force: bool,
    /// Print the plan without applying it
    pub explain: bool,
    pub renames: RenameOptions,
}

pub fn run(config: &Config, opts: &PushOptions) -> Result<(), CliError> {
    println!("{}", output::heading("Pushing schema to database..."));
    println!();

    if config.dialect == Dialect::SQLite {
        #[cfg(feature = "rusqlite")]
        return sqlite::run(config, opts);
    }

    explain_only(config, opts)
}

/// Print the plan from the latest migration snapshot
fn explain_only(config: &Config, opts: &PushOptions) -> Result<(), CliError> {
    let (_, current) = snapshot::load_schema(config)?;
    let writer = MigrationWriter::new(config.migrations_dir());
    let previous = writer.previous_snapshot(config.dialect)?;

    let mut resolver = opts.renames.resolver(config.dialect)?;
    let plan = diff_snapshots(&previous, &current, config.dialect, resolver.as_mut())?;

    println!(
        "{}",
        output::warning(&format!(
            "Pushing to {} is not supported by this build; showing the plan only.",
            config.dialect
        ))
    );
    println!();
    if plan.is_empty() {
        println!("{}", output::success("No changes to push."));
    } else {
        output::print_plan(&plan);
    }
    Ok(())
}

#[cfg(feature = "rusqlite")]
mod sqlite {
    use std::io::IsTerminal;

    use driftless_migrations::{
        ApplyOptions, Ddl, DataProbe, InterimSnapshot, MigrationError, SqliteExecutor, apply,
        generate,
    };
    use inquire::{Confirm, InquireError};
    use rusqlite::Connection;

    use super::PushOptions;
    use crate::config::Config;
    use crate::error::CliError;
    use crate::output;
    use crate::snapshot;

    pub(super) fn run(config: &Config, opts: &PushOptions) -> Result<(), CliError> {
        let url = config.database_url().ok_or_else(|| {
            CliError::Other("push needs [dbCredentials] url in the config".to_string())
        })?;
        let conn = Connection::open(url)
            .map_err(|e| CliError::Other(format!("Failed to open {url}: {e}")))?;
        let mut executor = SqliteExecutor::new(&conn);

        let (_, current) = snapshot::load_schema(config)?;
        let previous = executor
            .pushed_snapshot()?
            .unwrap_or_else(|| InterimSnapshot::empty(config.dialect));

        let left = Ddl::try_from_interim(&previous, config.dialect)?;
        let right = Ddl::try_from_interim(&current, config.dialect)?;
        let mut resolver = opts.renames.resolver(config.dialect)?;
        let probe: &dyn DataProbe = &executor;
        let plan = generate(&left, &right, resolver.as_mut(), Some(probe))?;

        if plan.is_empty() {
            println!("{}", output::success("No changes to push."));
            return Ok(());
        }

        output::print_plan(&plan);
        if opts.explain {
            return Ok(());
        }

        if plan.has_destructive_hints() && !opts.force && !confirm_data_loss()? {
            return Err(CliError::Aborted);
        }

        let report = apply(&plan, &mut executor, ApplyOptions::default())
            .map_err(MigrationError::from)?;
        executor.record_snapshot(&current)?;

        println!();
        println!(
            "{}",
            output::success(&format!("Applied {} statement(s).", report.applied.len()))
        );
        Ok(())
    }

    fn confirm_data_loss() -> Result<bool, CliError> {
        if !std::io::stdin().is_terminal() {
            eprintln!(
                "{}",
                output::err_line("The plan loses data; rerun with --force to apply it.")
            );
            return Ok(false);
        }
        Confirm::new("Some statements lose data. Apply anyway?")
            .with_default(false)
            .prompt()
            .map_err(|e| match e {
                InquireError::OperationCanceled | InquireError::OperationInterrupted => {
                    CliError::Aborted
                }
                other => CliError::Other(format!("Prompt failed: {other}")),
            })
    }
}
