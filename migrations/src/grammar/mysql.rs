//! MySQL grammar

use super::{
    AlterColumnSupport, Capabilities, Grammar, Naming, PrimaryKeyNaming, index_column, literal,
    quoted_list, referential_actions, unsupported,
};
use crate::ddl::{Column, ColumnDefault, DefaultKind, ForeignKey, GeneratedKind, Index, TableDef, View};
use crate::plan::{Constraint, Operation};
use driftless_types::{ColumnType, Dialect};

static CAPABILITIES: Capabilities = Capabilities {
    namespaces: false,
    rename_namespace: false,
    alter_column: AlterColumnSupport::InPlace { type_change: true },
    add_constraint_in_place: true,
    renamable_constraints: &[],
    implicit_constraint_names: false,
    rename_index: true,
    rename_view: true,
    named_defaults: false,
    inline_foreign_keys: false,
    foreign_keys: true,
    restricted_add_column: false,
    swap_primary_key: false,
    partial_indexes: false,
};

pub(super) static NAMING: Naming = Naming {
    primary_key: PrimaryKeyNaming::Fixed("PRIMARY"),
    unique_suffix: "unique",
    index_suffix: "index",
    foreign_key_suffix: "fk",
    max_length: 64,
};

/// MySQL grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlGrammar;

impl Grammar for MysqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn naming(&self) -> &'static Naming {
        &NAMING
    }

    fn quote(&self, ident: &str) -> String {
        quote_ident(ident)
    }

    fn default_value(&self, ty: &ColumnType, default: &ColumnDefault) -> String {
        default_value(ty, default)
    }

    fn render(&self, op: &Operation) -> Vec<String> {
        render(self, op)
    }
}

pub(super) fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Text-like columns only accept literal defaults as expressions
pub(super) fn default_value(ty: &ColumnType, default: &ColumnDefault) -> String {
    match default.kind {
        DefaultKind::Literal => {
            let value = literal(ty, &default.value, true);
            if matches!(
                ty,
                ColumnType::Text | ColumnType::Blob | ColumnType::Json | ColumnType::Jsonb
            ) {
                format!("({})", value)
            } else {
                value
            }
        }
        DefaultKind::Expression => {
            if default.value.starts_with('(') {
                default.value.clone()
            } else {
                format!("({})", default.value)
            }
        }
        DefaultKind::Unknown => default.value.clone(),
    }
}

/// Render an operation with MySQL syntax
pub(super) fn render(g: &dyn Grammar, op: &Operation) -> Vec<String> {
    match op {
        Operation::CreateTable { table } => vec![create_table(g, table)],
        Operation::DropTable { schema, name } => {
            vec![format!("DROP TABLE {};", g.qualify(schema, name))]
        }
        Operation::RenameTable { schema, from, to } => vec![format!(
            "RENAME TABLE {} TO {};",
            g.qualify(schema, from),
            g.qualify(schema, to)
        )],
        Operation::AddColumn { column } => vec![format!(
            "ALTER TABLE {} ADD {};",
            g.qualify(&column.schema, &column.table),
            column_def(g, column)
        )],
        Operation::DropColumn { column } => vec![format!(
            "ALTER TABLE {} DROP COLUMN {};",
            g.qualify(&column.schema, &column.table),
            g.quote(&column.name)
        )],
        Operation::RenameColumn {
            schema,
            table,
            from,
            to,
        } => vec![format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {};",
            g.qualify(schema, table),
            g.quote(from),
            g.quote(to)
        )],
        // MODIFY restates the whole definition, so every change collapses
        // into one statement
        Operation::AlterColumn { column, .. } => vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {};",
            g.qualify(&column.schema, &column.table),
            column_def(g, column)
        )],
        Operation::CopyColumnData {
            schema,
            table,
            from,
            to,
            ..
        } => vec![format!(
            "UPDATE {} SET {} = {};",
            g.qualify(schema, table),
            g.quote(&to.name),
            g.quote(from)
        )],
        Operation::AddConstraint { constraint } => {
            let table = g.qualify(constraint.schema(), constraint.table());
            let body = match constraint {
                Constraint::PrimaryKey(pk) => {
                    format!("PRIMARY KEY({})", quoted_list(g, &pk.columns, ", "))
                }
                Constraint::Unique(u) => format!(
                    "CONSTRAINT {} UNIQUE({})",
                    g.quote(&u.name),
                    quoted_list(g, &u.columns, ", ")
                ),
                Constraint::Check(c) => {
                    format!("CONSTRAINT {} CHECK ({})", g.quote(&c.name), c.value)
                }
                Constraint::ForeignKey(fk) => fk_def(g, fk),
            };
            vec![format!("ALTER TABLE {} ADD {};", table, body)]
        }
        Operation::DropConstraint { constraint } => {
            let table = g.qualify(constraint.schema(), constraint.table());
            let stmt = match constraint {
                Constraint::PrimaryKey(_) => format!("ALTER TABLE {} DROP PRIMARY KEY;", table),
                Constraint::Unique(u) => {
                    format!("ALTER TABLE {} DROP INDEX {};", table, g.quote(&u.name))
                }
                Constraint::Check(c) => {
                    format!("ALTER TABLE {} DROP CHECK {};", table, g.quote(&c.name))
                }
                Constraint::ForeignKey(fk) => format!(
                    "ALTER TABLE {} DROP FOREIGN KEY {};",
                    table,
                    g.quote(&fk.name)
                ),
            };
            vec![stmt]
        }
        Operation::CreateIndex { index } => vec![create_index(g, index)],
        Operation::DropIndex { index } => vec![format!(
            "DROP INDEX {} ON {};",
            g.quote(&index.name),
            g.qualify(&index.schema, &index.table)
        )],
        Operation::RenameIndex {
            schema,
            table,
            from,
            to,
        } => vec![format!(
            "ALTER TABLE {} RENAME INDEX {} TO {};",
            g.qualify(schema, table),
            g.quote(from),
            g.quote(to)
        )],
        Operation::CreateView { view } => vec![create_view(g, view)],
        Operation::DropView { view } => {
            vec![format!("DROP VIEW {};", g.qualify(&view.schema, &view.name))]
        }
        Operation::RenameView { schema, from, to } => vec![format!(
            "RENAME TABLE {} TO {};",
            g.qualify(schema, from),
            g.qualify(schema, to)
        )],
        Operation::CreateSchema { .. }
        | Operation::DropSchema { .. }
        | Operation::RenameSchema { .. }
        | Operation::MoveTable { .. }
        | Operation::MoveView { .. }
        | Operation::RecreateTable { .. }
        | Operation::RenameConstraint { .. } => unsupported(g.dialect(), op),
    }
}

pub(super) fn create_table(g: &dyn Grammar, table: &TableDef) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", g.qualify(&table.schema, &table.name));
    let mut lines = Vec::new();

    for col in &table.columns {
        lines.push(format!("\t{}", column_def(g, col)));
    }

    if let Some(pk) = &table.primary_key {
        lines.push(format!("\tPRIMARY KEY({})", quoted_list(g, &pk.columns, ", ")));
    }

    for fk in &table.foreign_keys {
        lines.push(format!("\t{}", fk_def(g, fk)));
    }

    for u in &table.uniques {
        lines.push(format!(
            "\tCONSTRAINT {} UNIQUE({})",
            g.quote(&u.name),
            quoted_list(g, &u.columns, ", ")
        ));
    }

    for c in &table.checks {
        lines.push(format!("\tCONSTRAINT {} CHECK({})", g.quote(&c.name), c.value));
    }

    sql.push_str(&lines.join(",\n"));
    sql.push_str("\n);");
    sql
}

pub(super) fn column_def(g: &dyn Grammar, col: &Column) -> String {
    let mut def = format!("{} {}", g.quote(&col.name), g.column_type(&col.sql_type));

    if let Some(generated) = &col.generated {
        let storage = match generated.kind {
            GeneratedKind::Stored => "STORED",
            GeneratedKind::Virtual => "VIRTUAL",
        };
        def.push_str(&format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression, storage
        ));
        if col.not_null {
            def.push_str(" NOT NULL");
        }
        return def;
    }

    if col.identity.is_some() {
        def.push_str(" AUTO_INCREMENT");
    }
    if col.not_null {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        def.push_str(&format!(" DEFAULT {}", g.default_value(&col.sql_type, default)));
    }
    def
}

fn fk_def(g: &dyn Grammar, fk: &ForeignKey) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}){}",
        g.quote(&fk.name),
        quoted_list(g, &fk.columns, ", "),
        g.qualify(&fk.schema_to, &fk.table_to),
        quoted_list(g, &fk.columns_to, ", "),
        referential_actions(fk)
    )
}

fn create_index(g: &dyn Grammar, index: &Index) -> String {
    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let cols = index
        .columns
        .iter()
        .map(|c| index_column(g, c, false))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        g.quote(&index.name),
        g.qualify(&index.schema, &index.table),
        cols
    );
    if let Some(method) = &index.method {
        sql.push_str(&format!(" USING {}", method));
    }
    sql.push(';');
    sql
}

fn create_view(g: &dyn Grammar, view: &View) -> String {
    let mut sql = String::from("CREATE ");
    if let Some(algorithm) = view.options.get("algorithm") {
        sql.push_str(&format!("ALGORITHM = {} ", algorithm));
    }
    if let Some(security) = view.options.get("sqlSecurity") {
        sql.push_str(&format!("SQL SECURITY {} ", security));
    }
    sql.push_str(&format!("VIEW {}", g.qualify(&view.schema, &view.name)));
    if let Some(columns) = &view.columns {
        sql.push_str(&format!(" ({})", quoted_list(g, columns, ", ")));
    }
    sql.push_str(&format!(" AS {}", view.definition.as_deref().unwrap_or("")));
    if let Some(check) = view.options.get("checkOption") {
        sql.push_str(&format!(" WITH {} CHECK OPTION", check.to_uppercase()));
    }
    sql.push(';');
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Identity, IdentityKind, PrimaryKey};

    fn column(name: &str, ty: &str) -> Column {
        Column::new("", "users", name, ColumnType::parse(ty, Dialect::MySQL).unwrap())
    }

    #[test]
    fn test_create_table_with_auto_increment() {
        let mut id = column("id", "int");
        id.not_null = true;
        id.identity = Some(Identity::new(IdentityKind::ByDefault));
        let mut bio = column("bio", "text");
        bio.default = Some(ColumnDefault::literal("none"));

        let table = TableDef {
            schema: "".into(),
            name: "users".into(),
            columns: vec![id, bio],
            primary_key: Some(PrimaryKey {
                schema: "".into(),
                table: "users".into(),
                name: "PRIMARY".into(),
                name_explicit: false,
                columns: vec!["id".into()],
            }),
            uniques: vec![],
            checks: vec![],
            foreign_keys: vec![],
        };
        assert_eq!(
            create_table(&MysqlGrammar, &table),
            "CREATE TABLE `users` (\n\t`id` int AUTO_INCREMENT NOT NULL,\n\t`bio` text DEFAULT ('none'),\n\tPRIMARY KEY(`id`)\n);"
        );
    }

    #[test]
    fn test_alter_column_uses_modify() {
        let from = column("name", "varchar(50)");
        let mut to = column("name", "varchar(100)");
        to.not_null = true;
        let sql = MysqlGrammar.render(&Operation::AlterColumn {
            column: to,
            from,
            changes: vec![],
        });
        assert_eq!(
            sql,
            vec!["ALTER TABLE `users` MODIFY COLUMN `name` varchar(100) NOT NULL;"]
        );
    }

    #[test]
    fn test_rename_table() {
        let sql = MysqlGrammar.render(&Operation::RenameTable {
            schema: "".into(),
            from: "t1".into(),
            to: "t2".into(),
        });
        assert_eq!(sql, vec!["RENAME TABLE `t1` TO `t2`;"]);
    }

    #[test]
    fn test_expression_default_is_parenthesized() {
        let default = ColumnDefault::expression("now()");
        assert_eq!(
            default_value(&ColumnType::Timestamp { precision: None, with_tz: false }, &default),
            "(now())"
        );
    }
}
