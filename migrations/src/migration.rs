//! Programmatic reconciliation API.
//!
//! Normalize, diff, plan, render and classify in one call. No file I/O.
//!
//! # Example
//!
//! ```rust
//! use driftless_migrations::{InterimSnapshot, NoRenames, diff_snapshots};
//! use driftless_types::Dialect;
//!
//! let prev = InterimSnapshot::empty(Dialect::SQLite);
//! let current = InterimSnapshot::empty(Dialect::SQLite);
//! let plan = diff_snapshots(&prev, &current, Dialect::SQLite, &mut NoRenames).unwrap();
//! assert!(plan.is_empty());
//! ```

use crate::ddl::Ddl;
use crate::diff::diff;
use crate::error::{MigrationError, PlanningError, SchemaErrors};
use crate::grammar::for_dialect;
use crate::hints::{DataProbe, Hint, classify};
use crate::interim::InterimSnapshot;
use crate::plan::{Operation, Planner};
use crate::resolver::{NoRenames, RenameHint, RenameResolver};
use driftless_types::Dialect;

/// Marker placed between statements of a migration file
pub const BREAKPOINT: &str = "--> statement-breakpoint";

/// One planned operation and the statements it renders to
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedStatement {
    pub operation: Operation,
    pub sql: Vec<String>,
}

/// Everything needed to review or apply a reconciliation
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub dialect: Dialect,
    pub operations: Vec<Operation>,
    pub statements: Vec<GroupedStatement>,
    pub hints: Vec<Hint>,
    /// Renames the resolver accepted
    pub renames: Vec<RenameHint>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Every statement in execution order
    pub fn sql(&self) -> Vec<String> {
        self.statements
            .iter()
            .flat_map(|g| g.sql.iter().cloned())
            .collect()
    }

    /// Statements joined into one script, optionally separated by
    /// [`BREAKPOINT`] markers
    pub fn to_sql(&self, breakpoints: bool) -> String {
        let separator = if breakpoints {
            format!("\n{}\n", BREAKPOINT)
        } else {
            "\n".to_string()
        };
        self.sql().join(&separator)
    }

    pub fn has_destructive_hints(&self) -> bool {
        crate::hints::has_destructive(&self.hints)
    }
}

/// Split a migration script on [`BREAKPOINT`] markers
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(BREAKPOINT)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Plan the changes that turn `left` into `right`
pub fn generate(
    left: &Ddl,
    right: &Ddl,
    resolver: &mut dyn RenameResolver,
    probe: Option<&dyn DataProbe>,
) -> Result<MigrationPlan, PlanningError> {
    let schema_diff = diff(left, right, resolver)?;
    let grammar = for_dialect(right.dialect());
    let operations = Planner::new(left, right, grammar).plan(&schema_diff);

    let statements = operations
        .iter()
        .map(|op| GroupedStatement {
            operation: op.clone(),
            sql: grammar.render(op),
        })
        .collect();
    let hints = classify(&operations, right, probe);

    tracing::debug!(
        dialect = %right.dialect(),
        operations = operations.len(),
        hints = hints.len(),
        "migration planned"
    );

    Ok(MigrationPlan {
        dialect: right.dialect(),
        operations,
        statements,
        hints,
        renames: schema_diff.renames,
    })
}

/// Normalize two interim snapshots and plan the changes between them
pub fn diff_snapshots(
    prev: &InterimSnapshot,
    current: &InterimSnapshot,
    dialect: Dialect,
    resolver: &mut dyn RenameResolver,
) -> Result<MigrationPlan, MigrationError> {
    let (left, mut errors) = crate::normalize::normalize(prev, dialect);
    let (right, current_errors) = crate::normalize::normalize(current, dialect);
    errors.extend(current_errors);
    if !errors.is_empty() {
        return Err(SchemaErrors(errors).into());
    }
    Ok(generate(&left, &right, resolver, None)?)
}

/// The whole model as create statements
pub fn export(ddl: &Ddl) -> MigrationPlan {
    let empty = Ddl::new(ddl.dialect());
    match generate(&empty, ddl, &mut NoRenames, None) {
        Ok(plan) => plan,
        // nothing to resolve against an empty model
        Err(_) => MigrationPlan {
            dialect: ddl.dialect(),
            operations: Vec::new(),
            statements: Vec::new(),
            hints: Vec::new(),
            renames: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> InterimSnapshot {
        InterimSnapshot::from_json(
            r#"{
                "tables": [{ "name": "users" }],
                "columns": [{ "table": "users", "name": "id", "type": "integer", "notNull": true }],
                "pks": [{ "table": "users", "columns": ["id"] }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_add_column_scenario() {
        let mut current = users();
        current.merge(
            InterimSnapshot::from_json(
                r#"{ "columns": [{ "table": "users", "name": "name", "type": "text", "notNull": true,
                     "default": { "kind": "literal", "value": "hey" } }] }"#,
            )
            .unwrap(),
        )
        .unwrap();

        let plan = diff_snapshots(&users(), &current, Dialect::PostgreSQL, &mut NoRenames).unwrap();
        assert_eq!(plan.operations.len(), 1);
        assert_eq!(
            plan.sql(),
            vec!["ALTER TABLE \"users\" ADD COLUMN \"name\" text NOT NULL DEFAULT 'hey';"]
        );
        assert!(plan.hints.is_empty());
    }

    #[test]
    fn test_identical_snapshots_plan_nothing() {
        let plan = diff_snapshots(&users(), &users(), Dialect::MySQL, &mut NoRenames).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.to_sql(true), "");
    }

    #[test]
    fn test_schema_errors_abort_before_planning() {
        let broken = InterimSnapshot::from_json(
            r#"{ "columns": [{ "table": "ghosts", "name": "id", "type": "integer" }] }"#,
        )
        .unwrap();
        let err =
            diff_snapshots(&users(), &broken, Dialect::PostgreSQL, &mut NoRenames).unwrap_err();
        assert!(matches!(err, MigrationError::Schema(_)));
    }

    #[test]
    fn test_export_and_breakpoints() {
        let (ddl, errors) = crate::normalize::normalize(&users(), Dialect::SQLite);
        assert!(errors.is_empty());
        let plan = export(&ddl);
        assert_eq!(plan.operations.len(), 1);
        assert!(plan.sql()[0].starts_with("CREATE TABLE `users`"));

        let script = format!("a;\n{}\nb;", BREAKPOINT);
        assert_eq!(split_statements(&script), vec!["a;", "b;"]);
    }
}
