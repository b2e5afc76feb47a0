//! Configuration for the driftless CLI
//!
//! Handles loading `driftless.toml`.

use driftless_types::Dialect;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "driftless.toml";

// ============================================================================
// Configuration
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub dialect: Dialect,

    /// Interim snapshot files describing the desired schema, merged in order
    #[serde(default = "default_schema")]
    pub schema: Schema,

    #[serde(default = "default_out")]
    pub out: PathBuf,

    #[serde(default = "yes")]
    pub breakpoints: bool,

    /// Refuse to guess when a drop and a create could be a rename
    #[serde(default)]
    pub strict: bool,

    /// Rename hints applied on every run, as `old->new`
    #[serde(default)]
    pub renames: Vec<String>,

    #[serde(default)]
    pub db_credentials: Option<Credentials>,
}

fn default_schema() -> Schema {
    Schema::One("schema/*.json".into())
}
fn default_out() -> PathBuf {
    PathBuf::from("./migrations")
}
fn yes() -> bool {
    true
}

/// Schema path(s), each of which may be a glob
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    One(String),
    Many(Vec<String>),
}

impl Schema {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::One(s) => std::slice::from_ref(s).iter().map(String::as_str),
            Self::Many(v) => v.iter().map(String::as_str),
        }
    }
}

/// Connection settings for commands that talk to a database
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// SQLite database path
    pub url: String,
}

// ============================================================================
// Config implementation
// ============================================================================

impl Config {
    /// Load from default config file
    pub fn load() -> Result<Self, Error> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load from specific path
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.into())
            } else {
                Error::Io(path.into(), e)
            }
        })?;

        let mut config: Self =
            toml::from_str(&content).map_err(|e| Error::Parse(path.into(), e))?;
        config.expand_env();

        tracing::debug!(path = %path.display(), dialect = %config.dialect, "config loaded");
        Ok(config)
    }

    /// `env:NAME` credentials read the URL from the environment
    fn expand_env(&mut self) {
        if let Some(creds) = &mut self.db_credentials
            && let Some(var) = creds.url.strip_prefix("env:")
            && let Ok(value) = std::env::var(var)
        {
            creds.url = value;
        }
    }

    /// Migrations output directory
    #[inline]
    pub fn migrations_dir(&self) -> &Path {
        &self.out
    }

    /// Schema paths display string
    pub fn schema_display(&self) -> String {
        match &self.schema {
            Schema::One(s) => s.clone(),
            Schema::Many(v) => v.join(", "),
        }
    }

    /// Resolve schema files (with glob support), sorted within each pattern
    pub fn schema_files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();

        for pattern in self.schema.iter() {
            match glob::glob(pattern) {
                Ok(paths) => {
                    let mut matched: Vec<_> = paths.filter_map(Result::ok).collect();
                    matched.sort();
                    if matched.is_empty() {
                        let p = PathBuf::from(pattern);
                        if p.exists() {
                            files.push(p);
                        }
                    } else {
                        files.extend(matched);
                    }
                }
                Err(e) => return Err(Error::Glob(pattern.into(), e)),
            }
        }

        if files.is_empty() {
            return Err(Error::NoSchemaFiles(self.schema_display()));
        }

        Ok(files)
    }

    /// Database path for `push`
    pub fn database_url(&self) -> Option<&str> {
        self.db_credentials.as_ref().map(|c| c.url.as_str())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid glob '{0}': {1}")]
    Glob(String, #[source] glob::PatternError),

    #[error("no schema files found: {0}")]
    NoSchemaFiles(String),
}

pub type ConfigError = Error;

// ============================================================================
// Tests
// ============================================================================
