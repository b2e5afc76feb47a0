//! Driftless Migrations - schema reconciliation engine
//!
//! Given the schema a database has and the schema it should have, this crate
//! produces the ordered list of DDL statements that turns one into the other
//! without losing data.
//!
//! The pipeline is pure up to the executor:
//!
//! ```text
//! InterimSnapshot --normalize--> Ddl --diff--> SchemaDiff --plan--> Vec<Operation>
//!                                      ^                                  |
//!                               RenameResolver                       Grammar::render
//!                                                                          v
//!                                                     MigrationPlan { statements, hints }
//! ```
//!
//! # Generating a plan
//!
//! ```rust
//! use driftless_migrations::{InterimSnapshot, NoRenames, diff_snapshots};
//! use driftless_types::Dialect;
//!
//! let prev = InterimSnapshot::from_json(r#"{
//!     "tables": [{ "name": "users" }],
//!     "columns": [{ "table": "users", "name": "id", "type": "integer", "notNull": true }]
//! }"#).unwrap();
//! let mut current = prev.clone();
//! current.merge(InterimSnapshot::from_json(r#"{
//!     "columns": [{ "table": "users", "name": "bio", "type": "text" }]
//! }"#).unwrap()).unwrap();
//!
//! let plan = diff_snapshots(&prev, &current, Dialect::PostgreSQL, &mut NoRenames).unwrap();
//! assert_eq!(plan.sql(), vec![r#"ALTER TABLE "users" ADD COLUMN "bio" text;"#]);
//! ```
//!
//! # Renames
//!
//! Whether a removed entity and an added one are the same thing renamed is
//! decided by a [`RenameResolver`]:
//!
//! - [`NoRenames`] - never rename
//! - [`DeterministicResolver`] - follows `from->to` hint strings
//! - [`HeuristicResolver`] - renames pairs that differ only by name
//!
//! # Applying
//!
//! [`apply`] runs a plan through any [`StatementExecutor`]. With the
//! `rusqlite` feature, `SqliteExecutor` runs against a SQLite connection.

pub mod collection;
pub mod ddl;
pub mod diff;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod hints;
pub mod interim;
pub mod migration;
pub mod normalize;
pub mod plan;
pub mod resolver;
pub mod traits;
pub mod utils;
pub mod writer;

pub use collection::Collection;
pub use ddl::Ddl;
pub use diff::{EntityDiff, FieldChange, Projection, SchemaDiff, diff};
pub use error::{
    ExecutionError, MigrationError, PlanningError, ResolveError, SchemaError, SchemaErrors,
    SnapshotError,
};
pub use executor::{ApplyOptions, ApplyReport, StatementExecutor, apply, apply_statements};
pub use grammar::{Capabilities, Grammar, for_dialect};
pub use hints::{DataProbe, Hint, HintKind, classify};
pub use interim::InterimSnapshot;
pub use migration::{
    BREAKPOINT, GroupedStatement, MigrationPlan, diff_snapshots, export, generate,
    split_statements,
};
pub use normalize::normalize;
pub use plan::{Operation, Planner};
pub use resolver::{
    Candidate, Decision, DeterministicResolver, HeuristicResolver, NoRenames, RenameHint,
    RenameResolver,
};
pub use traits::{DiffType, Entity, EntityKey, EntityKind};
pub use writer::{MigrationWriter, StoredSnapshot};

#[cfg(feature = "rusqlite")]
pub use executor::SqliteExecutor;

pub use driftless_types::{ColumnType, Dialect};
