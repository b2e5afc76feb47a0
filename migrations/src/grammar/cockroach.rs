//! CockroachDB grammar
//!
//! Postgres syntax with a few distributed-SQL deviations: indexes live on
//! their table (`t@idx`), unique constraints are dropped as indexes and
//! primary keys are swapped rather than dropped.

use super::postgres::{self, NAMING};
use super::{AlterColumnSupport, Capabilities, Grammar, Naming, quoted_list};
use crate::plan::{Constraint, ConstraintKind, Operation};
use driftless_types::Dialect;

static CAPABILITIES: Capabilities = Capabilities {
    namespaces: true,
    rename_namespace: true,
    alter_column: AlterColumnSupport::InPlace { type_change: false },
    add_constraint_in_place: true,
    renamable_constraints: &[
        ConstraintKind::PrimaryKey,
        ConstraintKind::Unique,
        ConstraintKind::Check,
        ConstraintKind::ForeignKey,
    ],
    implicit_constraint_names: false,
    rename_index: true,
    rename_view: true,
    named_defaults: false,
    inline_foreign_keys: false,
    foreign_keys: true,
    restricted_add_column: false,
    swap_primary_key: true,
    partial_indexes: true,
};

/// CockroachDB grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct CockroachGrammar;

impl Grammar for CockroachGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::CockroachDB
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn naming(&self) -> &'static Naming {
        &NAMING
    }

    fn quote(&self, ident: &str) -> String {
        postgres::quote_ident(ident)
    }

    fn render(&self, op: &Operation) -> Vec<String> {
        match op {
            Operation::DropIndex { index } => vec![format!(
                "DROP INDEX {}@{};",
                self.qualify(&index.schema, &index.table),
                self.quote(&index.name)
            )],
            Operation::DropConstraint {
                constraint: Constraint::Unique(u),
            } => vec![format!(
                "DROP INDEX {}@{} CASCADE;",
                self.qualify(&u.schema, &u.table),
                self.quote(&u.name)
            )],
            Operation::AddConstraint {
                constraint: Constraint::PrimaryKey(pk),
            } => vec![format!(
                "ALTER TABLE {} ALTER PRIMARY KEY USING COLUMNS ({});",
                self.qualify(&pk.schema, &pk.table),
                quoted_list(self, &pk.columns, ", ")
            )],
            _ => postgres::render(self, op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Index, IndexColumn, PrimaryKey};

    #[test]
    fn test_drop_index_is_table_scoped() {
        let index = Index {
            schema: "public".into(),
            table: "users".into(),
            name: "users_email_idx".into(),
            name_explicit: false,
            columns: vec![IndexColumn::column("email")],
            is_unique: false,
            where_clause: None,
            method: None,
            with: Default::default(),
        };
        assert_eq!(
            CockroachGrammar.render(&Operation::DropIndex { index }),
            vec!["DROP INDEX \"users\"@\"users_email_idx\";"]
        );
    }

    #[test]
    fn test_primary_key_swap() {
        let pk = PrimaryKey {
            schema: "public".into(),
            table: "users".into(),
            name: "users_pkey".into(),
            name_explicit: false,
            columns: vec!["id".into(), "org".into()],
        };
        assert_eq!(
            CockroachGrammar.render(&Operation::AddConstraint {
                constraint: Constraint::PrimaryKey(pk)
            }),
            vec!["ALTER TABLE \"users\" ALTER PRIMARY KEY USING COLUMNS (\"id\", \"org\");"]
        );
    }
}
