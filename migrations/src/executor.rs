//! Executor boundary
//!
//! Plans are applied statement by statement, in planner order. The engine
//! never retries and never rolls back; transaction scoping belongs to the
//! executor implementation.

use crate::error::ExecutionError;
use crate::migration::MigrationPlan;

/// Something that can run one rendered statement against a live database
pub trait StatementExecutor {
    fn execute(&mut self, sql: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Keep going after a failed statement and report every failure
    pub continue_on_error: bool,
}

/// Outcome of [`apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    /// `(statement, message)` for each failure; only filled when
    /// continuing on error
    pub failed: Vec<(String, String)>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every statement of `plan` in order.
///
/// Stops at the first failure unless `options.continue_on_error` is set.
pub fn apply(
    plan: &MigrationPlan,
    executor: &mut dyn StatementExecutor,
    options: ApplyOptions,
) -> Result<ApplyReport, ExecutionError> {
    apply_statements(&plan.sql(), executor, options)
}

pub fn apply_statements(
    statements: &[String],
    executor: &mut dyn StatementExecutor,
    options: ApplyOptions,
) -> Result<ApplyReport, ExecutionError> {
    let mut report = ApplyReport::default();
    let total = statements.len();

    for (i, sql) in statements.iter().enumerate() {
        match executor.execute(sql) {
            Ok(()) => {
                tracing::info!(statement = i + 1, total, "applied: {}", sql);
                report.applied.push(sql.clone());
            }
            Err(message) if options.continue_on_error => {
                tracing::warn!(statement = i + 1, total, error = %message, "failed: {}", sql);
                report.failed.push((sql.clone(), message));
            }
            Err(message) => {
                tracing::warn!(statement = i + 1, total, error = %message, "stopping at failed statement");
                return Err(ExecutionError {
                    applied: report.applied,
                    statement: sql.clone(),
                    message,
                });
            }
        }
    }

    Ok(report)
}

#[cfg(feature = "rusqlite")]
pub use self::sqlite::SqliteExecutor;

#[cfg(feature = "rusqlite")]
mod sqlite {
    use super::StatementExecutor;
    use crate::error::SnapshotError;
    use crate::hints::DataProbe;
    use crate::interim::InterimSnapshot;
    use rusqlite::{Connection, OptionalExtension};

    const SNAPSHOT_TABLE: &str = "__driftless_snapshot";

    /// Runs statements on a SQLite connection and answers row-count probes
    pub struct SqliteExecutor<'a> {
        conn: &'a Connection,
    }

    impl<'a> SqliteExecutor<'a> {
        pub fn new(conn: &'a Connection) -> Self {
            Self { conn }
        }

        /// The snapshot recorded by the last successful push, if any
        pub fn pushed_snapshot(&self) -> Result<Option<InterimSnapshot>, SnapshotError> {
            let exists: bool = self
                .conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [SNAPSHOT_TABLE],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n > 0)
                .map_err(|e| SnapshotError::Store(e.to_string()))?;
            if !exists {
                return Ok(None);
            }

            let json: Option<String> = self
                .conn
                .query_row(
                    &format!("SELECT snapshot FROM `{SNAPSHOT_TABLE}` ORDER BY id DESC LIMIT 1"),
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| SnapshotError::Store(e.to_string()))?;
            json.map(|j| InterimSnapshot::from_json(&j)).transpose()
        }

        /// Record `snapshot` as the state the database now matches
        pub fn record_snapshot(&self, snapshot: &InterimSnapshot) -> Result<(), SnapshotError> {
            let json = serde_json::to_string(snapshot)?;
            self.conn
                .execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS `{SNAPSHOT_TABLE}` (\
                     id INTEGER PRIMARY KEY AUTOINCREMENT, \
                     created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                     snapshot TEXT NOT NULL)"
                ))
                .and_then(|_| {
                    self.conn.execute(
                        &format!("INSERT INTO `{SNAPSHOT_TABLE}` (snapshot) VALUES (?1)"),
                        [json],
                    )
                })
                .map(|_| ())
                .map_err(|e| SnapshotError::Store(e.to_string()))
        }
    }

    impl StatementExecutor for SqliteExecutor<'_> {
        fn execute(&mut self, sql: &str) -> Result<(), String> {
            self.conn.execute_batch(sql).map_err(|e| e.to_string())
        }
    }

    impl DataProbe for SqliteExecutor<'_> {
        fn row_count(&self, _schema: &str, table: &str) -> Option<u64> {
            let sql = format!("SELECT count(*) FROM `{}`", table.replace('`', "``"));
            self.conn
                .query_row(&sql, [], |row| row.get::<_, i64>(0))
                .ok()
                .and_then(|n| u64::try_from(n).ok())
        }
    }
}
