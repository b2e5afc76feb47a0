//! Content comparison per entity kind
//!
//! Comparators look at everything except identity: two entities with the
//! same key are unchanged when every compared field matches. Shapes are the
//! same comparison flattened to a string, used to spot renames.

use crate::ddl::{
    CheckConstraint, Column, ColumnDefault, ForeignKey, Generated, GeneratedKind, Identity,
    IdentityKind, Index, IndexColumn, PrimaryKey, UniqueConstraint, View,
};
use driftless_types::Dialect;
use std::fmt;

/// One changed field of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.from, self.to)
    }
}

struct Changes(Vec<FieldChange>);

impl Changes {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn field<T: PartialEq>(
        &mut self,
        field: &'static str,
        from: &T,
        to: &T,
        describe: impl Fn(&T) -> String,
    ) -> &mut Self {
        if from != to {
            self.0.push(FieldChange {
                field,
                from: describe(from),
                to: describe(to),
            });
        }
        self
    }

    fn finish(&mut self) -> Vec<FieldChange> {
        std::mem::take(&mut self.0)
    }
}

fn describe_default(default: &Option<ColumnDefault>) -> String {
    default
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn describe_identity(identity: &Option<Identity>) -> String {
    let Some(identity) = identity else {
        return "none".to_string();
    };
    let mut out = match identity.kind {
        IdentityKind::Always => "always".to_string(),
        IdentityKind::ByDefault => "byDefault".to_string(),
    };
    let options = [
        ("start", identity.start_with),
        ("increment", identity.increment),
        ("min", identity.min_value),
        ("max", identity.max_value),
        ("cache", identity.cache),
    ];
    for (label, value) in options {
        if let Some(v) = value {
            out.push_str(&format!(" {}={}", label, v));
        }
    }
    if identity.cycle {
        out.push_str(" cycle");
    }
    out
}

fn describe_generated(generated: &Option<Generated>) -> String {
    match generated {
        Some(g) => {
            let kind = match g.kind {
                GeneratedKind::Stored => "stored",
                GeneratedKind::Virtual => "virtual",
            };
            format!("{} ({})", kind, g.expression)
        }
        None => "none".to_string(),
    }
}

fn describe_option(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "none".to_string())
}

fn describe_list(columns: &Vec<String>) -> String {
    format!("({})", columns.join(", "))
}

fn describe_index_columns(columns: &Vec<IndexColumn>) -> String {
    let parts: Vec<String> = columns
        .iter()
        .map(|c| {
            let mut s = c.value.clone();
            if let Some(op) = &c.opclass {
                s.push(' ');
                s.push_str(op);
            }
            if !c.asc {
                s.push_str(" desc");
            }
            if c.nulls_first {
                s.push_str(" nulls first");
            }
            s
        })
        .collect();
    format!("({})", parts.join(", "))
}

/// Collapse whitespace so reformatted SQL compares equal
pub(crate) fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn columns(from: &Column, to: &Column, dialect: Dialect) -> Vec<FieldChange> {
    Changes::new()
        .field("type", &from.sql_type, &to.sql_type, |t| t.to_sql(dialect))
        .field("notNull", &from.not_null, &to.not_null, |b| b.to_string())
        .field("default", &from.default, &to.default, describe_default)
        .field("identity", &from.identity, &to.identity, describe_identity)
        .field("generated", &from.generated, &to.generated, describe_generated)
        .finish()
}

pub fn primary_keys(from: &PrimaryKey, to: &PrimaryKey) -> Vec<FieldChange> {
    Changes::new()
        .field("columns", &from.columns, &to.columns, describe_list)
        .finish()
}

pub fn uniques(from: &UniqueConstraint, to: &UniqueConstraint) -> Vec<FieldChange> {
    Changes::new()
        .field("columns", &from.columns, &to.columns, describe_list)
        .finish()
}

pub fn checks(from: &CheckConstraint, to: &CheckConstraint) -> Vec<FieldChange> {
    Changes::new()
        .field(
            "value",
            &normalize_sql(&from.value),
            &normalize_sql(&to.value),
            |v| v.clone(),
        )
        .finish()
}

pub fn indexes(from: &Index, to: &Index) -> Vec<FieldChange> {
    Changes::new()
        .field("columns", &from.columns, &to.columns, describe_index_columns)
        .field("unique", &from.is_unique, &to.is_unique, |b| b.to_string())
        .field(
            "where",
            &from.where_clause.as_deref().map(normalize_sql),
            &to.where_clause.as_deref().map(normalize_sql),
            describe_option,
        )
        .field("method", &from.method, &to.method, describe_option)
        .field("with", &from.with, &to.with, |w| format!("{:?}", w))
        .finish()
}

pub fn foreign_keys(from: &ForeignKey, to: &ForeignKey) -> Vec<FieldChange> {
    let target = |fk: &ForeignKey| crate::traits::EntityKey::table(&fk.schema_to, &fk.table_to);
    Changes::new()
        .field("columns", &from.columns, &to.columns, describe_list)
        .field("tableTo", &target(from), &target(to), |k| k.qualified())
        .field("columnsTo", &from.columns_to, &to.columns_to, describe_list)
        .field("onUpdate", &from.on_update, &to.on_update, |a| a.to_string())
        .field("onDelete", &from.on_delete, &to.on_delete, |a| a.to_string())
        .finish()
}

pub fn views(from: &View, to: &View) -> Vec<FieldChange> {
    Changes::new()
        .field(
            "definition",
            &from.definition.as_deref().map(normalize_sql),
            &to.definition.as_deref().map(normalize_sql),
            describe_option,
        )
        .field("columns", &from.columns, &to.columns, |c| match c {
            Some(c) => describe_list(c),
            None => "none".to_string(),
        })
        .field("options", &from.options, &to.options, |o| format!("{:?}", o))
        .finish()
}

// =============================================================================
// Shapes
// =============================================================================

pub fn column_shape(column: &Column, dialect: Dialect) -> String {
    format!(
        "{} notNull={} default={} identity={} generated={}",
        column.sql_type.to_sql(dialect),
        column.not_null,
        describe_default(&column.default),
        describe_identity(&column.identity),
        describe_generated(&column.generated)
    )
}

/// Tables are shaped by their column list
pub fn table_shape(columns: &[&Column], dialect: Dialect) -> String {
    columns
        .iter()
        .map(|c| format!("{}:{}", c.name, c.sql_type.to_sql(dialect)))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn view_shape(view: &View) -> String {
    view.definition
        .as_deref()
        .map(normalize_sql)
        .unwrap_or_default()
}

pub fn key_columns_shape(columns: &[String]) -> String {
    columns.join(",")
}

pub fn index_shape(index: &Index) -> String {
    format!(
        "{} unique={} where={}",
        describe_index_columns(&index.columns),
        index.is_unique,
        describe_option(&index.where_clause)
    )
}

pub fn foreign_key_shape(fk: &ForeignKey) -> String {
    format!(
        "{} -> {}.{}{}",
        describe_list(&fk.columns),
        fk.schema_to,
        fk.table_to,
        describe_list(&fk.columns_to)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftless_types::ColumnType;

    #[test]
    fn test_column_changes_are_human_readable() {
        let from = Column::new("public", "users", "name", ColumnType::Text);
        let mut to = from.clone();
        to.not_null = true;
        to.default = Some(ColumnDefault::literal("x"));

        let changes = columns(&from, &to, Dialect::PostgreSQL);
        let rendered: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["notNull: false -> true", "default: none -> 'x'"]
        );
    }

    #[test]
    fn test_type_change_rendered_in_dialect() {
        let from = Column::new("public", "users", "age", ColumnType::Text);
        let mut to = from.clone();
        to.sql_type = ColumnType::parse("integer", Dialect::PostgreSQL).unwrap();
        let changes = columns(&from, &to, Dialect::PostgreSQL);
        assert_eq!(changes[0].to_string(), "type: text -> integer");
    }

    #[test]
    fn test_whitespace_in_checks_is_ignored() {
        let a = CheckConstraint {
            schema: "public".into(),
            table: "users".into(),
            name: "users_check_1".into(),
            name_explicit: false,
            value: "age  >\n 0".into(),
        };
        let b = CheckConstraint {
            value: "age > 0".into(),
            ..a.clone()
        };
        assert!(checks(&a, &b).is_empty());
    }
}
