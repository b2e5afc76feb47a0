//! # Driftless
//!
//! Schema reconciliation for relational databases: given the schema a
//! database has and the schema it should have, produce the ordered,
//! dialect-correct DDL that gets from one to the other without losing data.
//!
//! ## Quick Start
//!
//! ```rust
//! use driftless::prelude::*;
//!
//! # fn main() -> Result<(), driftless::error::MigrationError> {
//! let prev = InterimSnapshot::from_json(r#"{
//!     "tables": [{ "name": "users" }],
//!     "columns": [
//!         { "table": "users", "name": "id", "type": "integer", "notNull": true },
//!         { "table": "users", "name": "name", "type": "text" }
//!     ]
//! }"#)?;
//! let current = InterimSnapshot::from_json(r#"{
//!     "tables": [{ "name": "users" }],
//!     "columns": [
//!         { "table": "users", "name": "id", "type": "integer", "notNull": true },
//!         { "table": "users", "name": "full_name", "type": "text" }
//!     ]
//! }"#)?;
//!
//! let mut renames = DeterministicResolver::new(Dialect::PostgreSQL, ["users.name->users.full_name"])?;
//! let plan = diff_snapshots(&prev, &current, Dialect::PostgreSQL, &mut renames)?;
//!
//! assert_eq!(
//!     plan.sql(),
//!     vec![r#"ALTER TABLE "users" RENAME COLUMN "name" TO "full_name";"#]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Dialect Support
//!
//! | Database    | Dialect       | Executor               |
//! |-------------|---------------|------------------------|
//! | PostgreSQL  | `postgresql`  | -                      |
//! | MySQL       | `mysql`       | -                      |
//! | SQLite      | `sqlite`      | `rusqlite` feature     |
//! | CockroachDB | `cockroachdb` | -                      |
//! | SingleStore | `singlestore` | -                      |
//! | SQL Server  | `mssql`       | -                      |

// =============================================================================
// Root-level exports
// =============================================================================

/// Database dialect enum
pub use driftless_types::Dialect;

/// Declared column types
pub use driftless_types::ColumnType;

/// Error types
pub mod error {
    pub use driftless_migrations::error::{
        ExecutionError, MigrationError, PlanningError, ResolveError, SchemaError, SchemaErrors,
        SnapshotError,
    };
    pub use driftless_types::{DialectParseError, TypeParseError};
}

/// Shared vocabulary: dialects and column types.
pub use driftless_types as types;

/// The reconciliation engine.
///
/// - `InterimSnapshot` - loosely-typed input
/// - `Ddl` - normalized, validated schema
/// - `generate` / `diff_snapshots` - plan between two schemas
/// - `MigrationWriter` - on-disk migrations with their snapshots
pub use driftless_migrations as migrations;

/// Everything needed to plan and apply a migration.
///
/// ```rust
/// use driftless::prelude::*;
/// ```
pub mod prelude {
    pub use driftless_migrations::{
        ApplyOptions, Ddl, DeterministicResolver, HeuristicResolver, Hint, HintKind,
        InterimSnapshot, MigrationPlan, MigrationWriter, NoRenames, RenameResolver,
        StatementExecutor, apply, diff_snapshots, export, generate,
    };
    pub use driftless_types::{ColumnType, Dialect};

    #[cfg(feature = "rusqlite")]
    pub use driftless_migrations::SqliteExecutor;
}
