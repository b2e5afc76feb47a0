//! Error types for the reconciliation engine
//!
//! Structural problems in a snapshot are collected as [`SchemaError`]s;
//! everything that aborts a run is one of the enums below, and
//! [`MigrationError`] wraps them all for callers that just want `?`.

use crate::traits::EntityKind;
use driftless_types::Dialect;
use thiserror::Error;

/// A structural problem found while normalizing a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("snapshot targets {found} but {expected} was requested")]
    DialectMismatch { expected: Dialect, found: Dialect },

    #[error("schema '{0}' is declared more than once")]
    DuplicateSchema(String),

    #[error("table '{0}' is declared more than once")]
    DuplicateTable(String),

    #[error("column '{column}' is declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("constraint name '{name}' is used by more than one constraint or index on '{table}'")]
    DuplicateConstraint { table: String, name: String },

    #[error("view '{0}' is declared more than once or clashes with a table")]
    DuplicateView(String),

    #[error("schema '{0}' is referenced but not declared")]
    MissingSchema(String),

    #[error("{kind} '{name}' references unknown table '{table}'")]
    MissingTable {
        kind: EntityKind,
        name: String,
        table: String,
    },

    #[error("{kind} '{name}' references unknown column '{column}' in '{table}'")]
    MissingColumn {
        kind: EntityKind,
        name: String,
        table: String,
        column: String,
    },

    #[error("foreign key '{name}' references unknown table '{table}'")]
    MissingReferencedTable { name: String, table: String },

    #[error("foreign key '{name}' references unknown column '{column}' in '{table}'")]
    MissingReferencedColumn {
        name: String,
        table: String,
        column: String,
    },

    #[error("foreign key '{name}' has {from} source columns but {to} target columns")]
    ForeignKeyArity {
        name: String,
        from: usize,
        to: usize,
    },

    #[error("table '{0}' declares more than one primary key")]
    MultiplePrimaryKeys(String),

    #[error("{kind} '{name}' has no columns")]
    EmptyColumnList { kind: EntityKind, name: String },

    #[error("column '{column}' has an invalid type: {reason}")]
    InvalidType { column: String, reason: String },

    #[error("{feature} is not supported by {dialect} ('{entity}')")]
    UnsupportedFeature {
        dialect: Dialect,
        feature: &'static str,
        entity: String,
    },

    #[error("view '{0}' has no definition")]
    MissingViewDefinition(String),

    #[error("check '{name}' on '{table}' mentions none of the table's columns")]
    UnboundCheck { table: String, name: String },
}

/// A non-empty list of [`SchemaError`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl std::error::Error for SchemaErrors {}

impl std::fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} schema error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

/// Fatal errors in the shape of an interim snapshot document
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshots target different dialects ({0} and {1})")]
    MixedDialects(Dialect, Dialect),

    #[error("snapshot store: {0}")]
    Store(String),
}

/// Errors raised by a rename resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("rename resolution cancelled")]
    Cancelled,

    #[error(
        "ambiguous {kind} change in '{scope}': {deleted} removed, {created} added; supply a rename hint"
    )]
    Ambiguous {
        kind: EntityKind,
        scope: String,
        deleted: String,
        created: String,
    },

    #[error("prompt failed: {0}")]
    Prompt(String),
}

/// Errors that abort planning before any statement is produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("invalid rename hint '{hint}': {reason}")]
    InvalidRenameHint { hint: String, reason: String },

    #[error("'{0}' is renamed more than once")]
    DuplicateRenameSource(String),

    #[error("more than one entity is renamed to '{0}'")]
    DuplicateRenameTarget(String),

    #[error("rename cycle: {}", .0.join(" -> "))]
    RenameCycle(Vec<String>),

    #[error("resolver chose unknown {kind} candidate '{name}'")]
    UnknownCandidate { kind: EntityKind, name: String },

    #[error("cannot diff a {left} model against a {right} model")]
    DialectMismatch { left: Dialect, right: Dialect },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// A statement failed against the live target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("statement failed after {} applied: {message}\n  {statement}", .applied.len())]
pub struct ExecutionError {
    /// Statements that completed before the failure, in order
    pub applied: Vec<String>,
    pub statement: String,
    pub message: String,
}

/// Top-level error for callers running a whole reconciliation
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Schema(#[from] SchemaErrors),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no schema changes")]
    NoChanges,
}

impl MigrationError {
    /// Whether the operator aborted an interactive decision
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            MigrationError::Planning(PlanningError::Resolve(ResolveError::Cancelled))
        )
    }
}
