//! Check command - validates configuration, schema files and stored snapshots

use driftless_migrations::{Ddl, DeterministicResolver, InterimSnapshot, MigrationWriter, StoredSnapshot};
use driftless_types::Dialect;

use crate::config::Config;
use crate::error::CliError;
use crate::output;
use crate::snapshot;

pub fn run(config: &Config) -> Result<(), CliError> {
    println!("{}", output::heading("Checking configuration..."));
    println!();
    println!("  {}: {}", output::label("Dialect"), config.dialect);
    println!("  {}: {}", output::label("Schema"), config.schema_display());
    println!(
        "  {}: {}",
        output::label("Output"),
        config.migrations_dir().display()
    );

    let mut failed = 0;

    if !config.renames.is_empty() {
        println!();
        print!("  {} Rename hints... ", output::label("Checking"));
        match DeterministicResolver::new(config.dialect, &config.renames) {
            Ok(_) => println!("{}", output::status_ok()),
            Err(e) => {
                println!("{}", output::status_error());
                println!("    {e}");
                failed += 1;
            }
        }
    }

    println!();
    println!("  {} Schema files...", output::label("Checking"));
    let files = config.schema_files()?;
    let mut merged = InterimSnapshot::empty(config.dialect);
    for path in &files {
        let ok = match snapshot::load_file(path) {
            Ok(file) => match merged.merge(file) {
                Ok(()) => true,
                Err(e) => report(&path.display().to_string(), &e.to_string()),
            },
            Err(e) => report(&path.display().to_string(), &e.to_string()),
        };
        if ok {
            println!("    {} {}", path.display(), output::status_ok());
        } else {
            failed += 1;
        }
    }
    if failed == 0 && !validate("(merged schema)", &merged, config.dialect) {
        failed += 1;
    }

    println!();
    println!("  {} Migrations...", output::label("Checking"));
    let writer = MigrationWriter::new(config.migrations_dir());
    let entries = writer
        .migrations()
        .map_err(|e| CliError::IoError(e.to_string()))?;
    if entries.is_empty() {
        println!("    {}", output::muted("none yet"));
    }
    for entry in &entries {
        let path = entry.snapshot_path();
        let stored = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                serde_json::from_str::<StoredSnapshot>(&text).map_err(|e| e.to_string())
            });
        let ok = match stored {
            Ok(stored) => validate(&entry.tag, &stored.snapshot, config.dialect),
            Err(e) => report(&entry.tag, &e),
        };
        if !ok {
            failed += 1;
        }
    }

    println!();
    if failed > 0 {
        println!("{}", output::error("Check failed."));
        return Err(CliError::CheckFailed(failed));
    }
    println!("{}", output::success("Everything OK."));
    Ok(())
}

/// Normalize `snapshot` and print the outcome
fn validate(label: &str, snapshot: &InterimSnapshot, dialect: Dialect) -> bool {
    match Ddl::try_from_interim(snapshot, dialect) {
        Ok(_) => {
            println!("    {} {}", label, output::status_ok());
            true
        }
        Err(errors) => {
            println!("    {} {}", label, output::status_error());
            for e in &errors.0 {
                println!("      - {e}");
            }
            false
        }
    }
}

fn report(label: &str, message: &str) -> bool {
    println!("    {} {}", label, output::status_error());
    println!("      {message}");
    false
}
