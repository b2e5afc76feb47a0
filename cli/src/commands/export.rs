//! Export command - the whole schema as create statements

use std::path::Path;

use driftless_migrations::{Ddl, export};

use crate::config::Config;
use crate::error::CliError;
use crate::output;
use crate::snapshot;

pub fn run(config: &Config, sql_out: Option<&Path>) -> Result<(), CliError> {
    let (_, current) = snapshot::load_schema(config)?;
    let ddl = Ddl::try_from_interim(&current, config.dialect)?;
    let plan = export(&ddl);
    let sql = plan.to_sql(config.breakpoints);

    match sql_out {
        Some(path) => {
            std::fs::write(path, format!("{sql}\n")).map_err(|e| {
                CliError::IoError(format!("Failed to write {}: {}", path.display(), e))
            })?;
            eprintln!(
                "{} {} statement(s) to {}",
                output::success("Exported"),
                plan.sql().len(),
                path.display()
            );
        }
        None => println!("{sql}"),
    }
    Ok(())
}
