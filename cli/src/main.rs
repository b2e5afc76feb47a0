//! Driftless CLI - Main entry point

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use driftless_cli::commands::{self, RenameOptions, push::PushOptions};
use driftless_cli::config::Config;
use driftless_cli::error::CliError;
use driftless_cli::output;
use driftless_types::Dialect;
use tracing_subscriber::EnvFilter;

/// Driftless - schema reconciliation for relational databases
#[derive(Parser, Debug)]
#[command(name = "driftless")]
#[command(author, version, about = "Diff relational schemas into ordered, data-preserving DDL", long_about = None)]
struct Cli {
    /// Path to config file (default: driftless.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log planning decisions (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new migration from schema changes
    Generate {
        /// Migration name (optional, auto-generated if not provided)
        #[arg(short, long)]
        name: Option<String>,

        /// Treat a removed entity and an added one as a rename (old->new)
        #[arg(long = "rename", value_name = "OLD->NEW")]
        renames: Vec<String>,

        /// Fail instead of asking about possible renames
        #[arg(long)]
        strict: bool,
    },

    /// Push schema changes directly to the database (without migration files)
    Push {
        /// Apply even when some statements lose data
        #[arg(long)]
        force: bool,

        /// Fail instead of asking about possible renames
        #[arg(long)]
        strict: bool,

        /// Print planned SQL changes without executing them (dry run)
        #[arg(long)]
        explain: bool,

        /// Treat a removed entity and an added one as a rename (old->new)
        #[arg(long = "rename", value_name = "OLD->NEW")]
        renames: Vec<String>,
    },

    /// Validate the config, schema files and stored snapshots
    Check,

    /// Export schema as SQL statements
    Export {
        /// Output SQL to a file (default: stdout)
        #[arg(long)]
        sql: Option<PathBuf>,
    },

    /// Print the plan between two snapshot files
    Diff {
        from: PathBuf,
        to: PathBuf,

        /// Dialect to plan for (default: config, then the snapshots)
        #[arg(long)]
        dialect: Option<Dialect>,

        /// Treat a removed entity and an added one as a rename (old->new)
        #[arg(long = "rename", value_name = "OLD->NEW")]
        renames: Vec<String>,

        /// Fail instead of asking about possible renames
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", output::err_line(&e.to_string()));
            e.exit_code()
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("driftless=debug,driftless_migrations=debug,driftless_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Generate {
            name,
            renames,
            strict,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let renames = RenameOptions::new(&config.renames, renames, strict || config.strict);
            commands::generate::run(&config, name.as_deref(), &renames)
        }
        Command::Push {
            force,
            strict,
            explain,
            renames,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let opts = PushOptions {
                force,
                explain,
                renames: RenameOptions::new(&config.renames, renames, strict || config.strict),
            };
            commands::push::run(&config, &opts)
        }
        Command::Check => {
            let config = load_config(cli.config.as_deref())?;
            commands::check::run(&config)
        }
        Command::Export { sql } => {
            let config = load_config(cli.config.as_deref())?;
            commands::export::run(&config, sql.as_deref())
        }
        Command::Diff {
            from,
            to,
            dialect,
            renames,
            strict,
        } => {
            // the config is optional here
            let config = match cli.config.as_deref() {
                Some(path) => Some(Config::load_from(path)?),
                None if Path::new(driftless_cli::config::CONFIG_FILE).exists() => {
                    Some(Config::load()?)
                }
                None => None,
            };
            let dialect = dialect.or(config.as_ref().map(|c| c.dialect));
            let config_hints = config.as_ref().map(|c| c.renames.clone()).unwrap_or_default();
            let strict = strict || config.as_ref().is_some_and(|c| c.strict);
            let renames = RenameOptions::new(&config_hints, renames, strict);
            commands::diff::run(&from, &to, dialect, &renames)
        }
    }
}

/// Load configuration with fallback to default path
fn load_config(custom_path: Option<&Path>) -> Result<Config, CliError> {
    match custom_path {
        Some(path) => Config::load_from(path).map_err(Into::into),
        None => Config::load().map_err(Into::into),
    }
}
