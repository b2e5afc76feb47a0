//! CLI command implementations
//!
//! Each command module implements a specific driftless CLI command.

use std::io::IsTerminal;

use driftless_migrations::{DeterministicResolver, RenameResolver};
use driftless_types::Dialect;

use crate::error::CliError;
use crate::resolver::InteractiveResolver;

pub mod check;
pub mod diff;
pub mod export;
pub mod generate;
pub mod push;

/// Rename handling shared by the commands that plan
#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Hints from the config file followed by `--rename` flags
    pub hints: Vec<String>,
    pub strict: bool,
}

impl RenameOptions {
    pub fn new(config_hints: &[String], flag_hints: Vec<String>, strict: bool) -> Self {
        let mut hints = config_hints.to_vec();
        hints.extend(flag_hints);
        Self { hints, strict }
    }

    /// Strict runs and non-terminal runs never ask; everything else prompts
    /// for the pairs the hints leave open
    pub fn resolver(&self, dialect: Dialect) -> Result<Box<dyn RenameResolver>, CliError> {
        let hints = DeterministicResolver::new(dialect, &self.hints)?;
        if self.strict {
            Ok(Box::new(hints.strict()))
        } else if std::io::stdin().is_terminal() {
            Ok(Box::new(InteractiveResolver::new(hints)))
        } else {
            Ok(Box::new(hints))
        }
    }
}
