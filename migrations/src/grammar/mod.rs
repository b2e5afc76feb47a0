//! Dialect grammars
//!
//! A [`Grammar`] renders abstract [`Operation`]s into literal SQL and tells
//! the planner what the dialect can do in place ([`Capabilities`]) and how
//! it names constraints it was not given names for ([`Naming`]). Every
//! dialect shares the same operation vocabulary; this is the seam where a
//! dialect port plugs in.

mod cockroach;
mod mssql;
mod mysql;
mod postgres;
mod singlestore;
mod sqlite;

pub use cockroach::CockroachGrammar;
pub use mssql::MssqlGrammar;
pub use mysql::MysqlGrammar;
pub use postgres::PostgresGrammar;
pub use singlestore::SingleStoreGrammar;
pub use sqlite::SqliteGrammar;

use crate::ddl::{ColumnDefault, DefaultKind, ForeignKey, IndexColumn, ReferentialAction};
use crate::plan::{ConstraintKind, Operation};
use crate::utils::{escape_literal, fit_name, hash, slugify};
use driftless_types::{ColumnType, Dialect};

// =============================================================================
// Capabilities
// =============================================================================

/// How a dialect changes an existing column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterColumnSupport {
    /// `ALTER COLUMN` style statements; `type_change` says whether the type
    /// itself can change in place
    InPlace { type_change: bool },
    /// Column changes rebuild the whole table. With `shadow_type_change`, a
    /// type change whose target is nullable or defaulted may use the
    /// shadow-column sequence instead.
    RecreateTable { shadow_type_change: bool },
}

/// What a dialect supports without falling back to a workaround
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub namespaces: bool,
    pub rename_namespace: bool,
    pub alter_column: AlterColumnSupport,
    /// Constraints can be added to and dropped from an existing table
    pub add_constraint_in_place: bool,
    /// Constraint kinds that can be renamed natively
    pub renamable_constraints: &'static [ConstraintKind],
    /// Constraint names are not tracked by the database
    pub implicit_constraint_names: bool,
    pub rename_index: bool,
    pub rename_view: bool,
    /// Defaults are named constraints
    pub named_defaults: bool,
    /// Foreign keys are declared inside `CREATE TABLE`
    pub inline_foreign_keys: bool,
    pub foreign_keys: bool,
    /// `ADD COLUMN` rejects NOT NULL without default, stored generated
    /// columns and identity columns
    pub restricted_add_column: bool,
    /// Primary keys are replaced with a single swap statement
    pub swap_primary_key: bool,
    pub partial_indexes: bool,
}

impl Capabilities {
    pub fn can_rename_constraint(&self, kind: ConstraintKind) -> bool {
        self.renamable_constraints.contains(&kind)
    }

    pub fn recreates_tables(&self) -> bool {
        matches!(self.alter_column, AlterColumnSupport::RecreateTable { .. })
    }
}

// =============================================================================
// Naming
// =============================================================================

/// Primary key naming rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKeyNaming {
    /// `{table}_{suffix}`
    Suffix(&'static str),
    /// Every primary key has the same name
    Fixed(&'static str),
}

/// Naming conventions for synthesized constraint and index names
#[derive(Debug, Clone, Copy)]
pub struct Naming {
    pub primary_key: PrimaryKeyNaming,
    pub unique_suffix: &'static str,
    pub index_suffix: &'static str,
    pub foreign_key_suffix: &'static str,
    /// Longest identifier the dialect accepts; longer names are hashed
    pub max_length: usize,
}

impl Naming {
    pub fn primary_key(&self, table: &str) -> String {
        match self.primary_key {
            PrimaryKeyNaming::Suffix(suffix) => self.fit(format!("{}_{}", table, suffix)),
            PrimaryKeyNaming::Fixed(name) => name.to_string(),
        }
    }

    pub fn unique(&self, table: &str, columns: &[String]) -> String {
        self.fit(format!(
            "{}_{}_{}",
            table,
            columns.join("_"),
            self.unique_suffix
        ))
    }

    pub fn index(&self, table: &str, columns: &[IndexColumn]) -> String {
        let parts: Vec<String> = columns
            .iter()
            .map(|c| {
                if c.is_expression {
                    slugify(&c.value)
                } else {
                    c.value.clone()
                }
            })
            .collect();
        self.fit(format!("{}_{}_{}", table, parts.join("_"), self.index_suffix))
    }

    pub fn foreign_key(
        &self,
        table: &str,
        columns: &[String],
        table_to: &str,
        columns_to: &[String],
    ) -> String {
        self.fit(format!(
            "{}_{}_{}_{}_{}",
            table,
            columns.join("_"),
            table_to,
            columns_to.join("_"),
            self.foreign_key_suffix
        ))
    }

    /// Unnamed checks are keyed by their expression, so declaration order
    /// does not matter
    pub fn check(&self, table: &str, expression: &str) -> String {
        let expression = crate::diff::normalize_sql(expression);
        self.fit(format!("{}_check_{}", table, hash(&expression, 8)))
    }

    pub fn default_constraint(&self, table: &str, column: &str) -> String {
        self.fit(format!("{}_{}_default", table, column))
    }

    fn fit(&self, name: String) -> String {
        fit_name(&name, self.max_length)
    }
}

// =============================================================================
// Grammar trait
// =============================================================================

/// Dialect-specific rendering of abstract operations
pub trait Grammar: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn capabilities(&self) -> &'static Capabilities;

    fn naming(&self) -> &'static Naming;

    /// Quote a single identifier
    fn quote(&self, ident: &str) -> String;

    /// Render one operation into zero or more statements
    fn render(&self, op: &Operation) -> Vec<String>;

    /// Schema-qualified, quoted name; the default namespace is omitted
    fn qualify(&self, schema: &str, name: &str) -> String {
        if schema.is_empty() || schema == self.dialect().default_namespace() {
            self.quote(name)
        } else {
            format!("{}.{}", self.quote(schema), self.quote(name))
        }
    }

    fn column_type(&self, ty: &ColumnType) -> String {
        ty.to_sql(self.dialect())
    }

    /// Render a column default
    fn default_value(&self, ty: &ColumnType, default: &ColumnDefault) -> String {
        match default.kind {
            DefaultKind::Literal => literal(ty, &default.value, false),
            DefaultKind::Expression | DefaultKind::Unknown => default.value.clone(),
        }
    }

    /// Render every operation in order
    fn render_all(&self, ops: &[Operation]) -> Vec<String> {
        ops.iter().flat_map(|op| self.render(op)).collect()
    }
}

/// Look up the grammar for a dialect
pub fn for_dialect(dialect: Dialect) -> &'static dyn Grammar {
    match dialect {
        Dialect::PostgreSQL => &PostgresGrammar,
        Dialect::CockroachDB => &CockroachGrammar,
        Dialect::MySQL => &MysqlGrammar,
        Dialect::SingleStore => &SingleStoreGrammar,
        Dialect::SQLite => &SqliteGrammar,
        Dialect::MSSQL => &MssqlGrammar,
    }
}

// =============================================================================
// Shared rendering helpers
// =============================================================================

/// Render a literal default: numbers and booleans bare, everything else quoted
pub(crate) fn literal(ty: &ColumnType, value: &str, backslashes: bool) -> String {
    let is_number = value.parse::<f64>().is_ok();
    let is_bool = value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false");
    if (ty.is_numeric() && is_number) || (ty.is_boolean() && (is_bool || is_number)) {
        value.to_string()
    } else {
        format!("'{}'", escape_literal(value, backslashes))
    }
}

/// `true`/`false` literal for dialects that store booleans as integers
pub(crate) fn bool_as_int(value: &str) -> Option<&'static str> {
    if value.eq_ignore_ascii_case("true") {
        Some("1")
    } else if value.eq_ignore_ascii_case("false") {
        Some("0")
    } else {
        None
    }
}

/// Quote and join a column list
pub(crate) fn quoted_list(grammar: &dyn Grammar, columns: &[String], sep: &str) -> String {
    columns
        .iter()
        .map(|c| grammar.quote(c))
        .collect::<Vec<_>>()
        .join(sep)
}

/// ` ON DELETE ...` / ` ON UPDATE ...` clauses, omitting `NO ACTION`
pub(crate) fn referential_actions(fk: &ForeignKey) -> String {
    let mut out = String::new();
    if fk.on_delete != ReferentialAction::NoAction {
        out.push_str(&format!(" ON DELETE {}", fk.on_delete.as_sql()));
    }
    if fk.on_update != ReferentialAction::NoAction {
        out.push_str(&format!(" ON UPDATE {}", fk.on_update.as_sql()));
    }
    out
}

/// One entry of an index column list: quoted column or expression, with
/// operator class and ordering
pub(crate) fn index_column(grammar: &dyn Grammar, col: &IndexColumn, nulls: bool) -> String {
    let mut out = if col.is_expression {
        if col.value.starts_with('(') {
            col.value.clone()
        } else {
            format!("({})", col.value)
        }
    } else {
        grammar.quote(&col.value)
    };
    if let Some(opclass) = &col.opclass {
        out.push(' ');
        out.push_str(opclass);
    }
    if !col.asc {
        out.push_str(" DESC");
    }
    if nulls {
        // asc defaults to NULLS LAST and desc to NULLS FIRST
        if col.asc && col.nulls_first {
            out.push_str(" NULLS FIRST");
        } else if !col.asc && !col.nulls_first {
            out.push_str(" NULLS LAST");
        }
    }
    out
}

/// Log and skip an operation the planner should never hand to this grammar
pub(crate) fn unsupported(dialect: Dialect, op: &Operation) -> Vec<String> {
    tracing::warn!(
        dialect = %dialect,
        operation = op.type_name(),
        "operation has no rendering for this dialect; skipped"
    );
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_naming() {
        let naming = for_dialect(Dialect::PostgreSQL).naming();
        assert_eq!(naming.primary_key("users"), "users_pkey");
        assert_eq!(
            naming.unique("users", &["email".into()]),
            "users_email_key"
        );
        assert_eq!(
            naming.foreign_key("posts", &["author_id".into()], "users", &["id".into()]),
            "posts_author_id_users_id_fkey"
        );
        let check = naming.check("users", "age > 0");
        assert!(check.starts_with("users_check_"), "got {check}");
        assert_eq!(check.len(), "users_check_".len() + 8);
        assert_eq!(naming.check("users", "age   >  0"), check);
        assert_ne!(naming.check("users", "age < 200"), check);
        assert_eq!(
            naming.index("users", &[IndexColumn::column("email")]),
            "users_email_idx"
        );
    }

    #[test]
    fn test_mysql_and_mssql_naming() {
        let mysql = for_dialect(Dialect::MySQL).naming();
        assert_eq!(mysql.primary_key("users"), "PRIMARY");
        assert_eq!(
            mysql.foreign_key("posts", &["author_id".into()], "users", &["id".into()]),
            "posts_author_id_users_id_fk"
        );

        let mssql = for_dialect(Dialect::MSSQL).naming();
        assert_eq!(mssql.default_constraint("users", "name"), "users_name_default");
    }

    #[test]
    fn test_long_names_are_hashed() {
        let naming = for_dialect(Dialect::PostgreSQL).naming();
        let long_table = "t".repeat(70);
        let name = naming.primary_key(&long_table);
        assert_eq!(name.len(), 63);
    }

    #[test]
    fn test_literal_defaults() {
        let int = ColumnType::parse("integer", Dialect::PostgreSQL).unwrap();
        assert_eq!(literal(&int, "42", false), "42");
        assert_eq!(literal(&ColumnType::Text, "42", false), "'42'");
        assert_eq!(literal(&ColumnType::Text, "it's", false), "'it''s'");
        assert_eq!(literal(&ColumnType::Boolean, "true", false), "true");
    }

    #[test]
    fn test_qualify_omits_default_namespace() {
        let pg = for_dialect(Dialect::PostgreSQL);
        assert_eq!(pg.qualify("public", "users"), "\"users\"");
        assert_eq!(pg.qualify("audit", "log"), "\"audit\".\"log\"");

        let mssql = for_dialect(Dialect::MSSQL);
        assert_eq!(mssql.qualify("dbo", "users"), "[users]");
        assert_eq!(mssql.qualify("sales", "orders"), "[sales].[orders]");
    }
}
