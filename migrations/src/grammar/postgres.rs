//! PostgreSQL grammar
//!
//! The reference rendering. CockroachDB reuses most of these functions
//! through [`render`], overriding the statements it spells differently.

use super::{
    AlterColumnSupport, Capabilities, Grammar, Naming, PrimaryKeyNaming, index_column,
    quoted_list, referential_actions, unsupported,
};
use crate::ddl::{Column, ForeignKey, GeneratedKind, Identity, IdentityKind, Index, TableDef, View};
use crate::plan::{ColumnAlteration, Constraint, ConstraintKind, Operation};
use crate::utils::escape_literal;
use driftless_types::Dialect;

static CAPABILITIES: Capabilities = Capabilities {
    namespaces: true,
    rename_namespace: true,
    alter_column: AlterColumnSupport::InPlace { type_change: true },
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
    swap_primary_key: false,
    partial_indexes: true,
};

pub(super) static NAMING: Naming = Naming {
    primary_key: PrimaryKeyNaming::Suffix("pkey"),
    unique_suffix: "key",
    index_suffix: "idx",
    foreign_key_suffix: "fkey",
    max_length: 63,
};

/// PostgreSQL grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl Grammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
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

    fn render(&self, op: &Operation) -> Vec<String> {
        render(self, op)
    }
}

pub(super) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render an operation with Postgres syntax
pub(super) fn render(g: &dyn Grammar, op: &Operation) -> Vec<String> {
    match op {
        Operation::CreateSchema { name } => vec![format!("CREATE SCHEMA {};", g.quote(name))],
        Operation::DropSchema { name } => vec![format!("DROP SCHEMA {};", g.quote(name))],
        Operation::RenameSchema { from, to } => vec![format!(
            "ALTER SCHEMA {} RENAME TO {};",
            g.quote(from),
            g.quote(to)
        )],
        Operation::CreateTable { table } => vec![create_table(g, table)],
        Operation::DropTable { schema, name } => {
            vec![format!("DROP TABLE {};", g.qualify(schema, name))]
        }
        Operation::RenameTable { schema, from, to } => vec![format!(
            "ALTER TABLE {} RENAME TO {};",
            g.qualify(schema, from),
            g.quote(to)
        )],
        Operation::MoveTable {
            name,
            from_schema,
            to_schema,
        } => vec![format!(
            "ALTER TABLE {} SET SCHEMA {};",
            g.qualify(from_schema, name),
            g.quote(to_schema)
        )],
        Operation::AddColumn { column } => vec![format!(
            "ALTER TABLE {} ADD COLUMN {};",
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
        Operation::AlterColumn {
            column, changes, ..
        } => alter_column(g, column, changes),
        Operation::CopyColumnData {
            schema,
            table,
            from,
            from_type,
            to,
        } => {
            let target = g.qualify(schema, table);
            let source = if from_type != &to.sql_type {
                format!("{}::{}", g.quote(from), g.column_type(&to.sql_type))
            } else {
                g.quote(from)
            };
            let update = format!(
                "UPDATE {} SET {} = {};",
                target,
                g.quote(&to.name),
                source
            );

            match &to.identity {
                Some(identity) => {
                    let mut out = Vec::new();
                    let always = identity.kind == IdentityKind::Always;
                    if always {
                        out.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET GENERATED BY DEFAULT;",
                            target,
                            g.quote(&to.name)
                        ));
                    }
                    out.push(update);
                    if always {
                        out.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET GENERATED ALWAYS;",
                            target,
                            g.quote(&to.name)
                        ));
                    }
                    out.push(format!(
                        "SELECT setval(pg_get_serial_sequence('{}', '{}'), coalesce(max({}), 1)) FROM {};",
                        escape_literal(&target, false),
                        escape_literal(&to.name, false),
                        g.quote(&to.name),
                        target
                    ));
                    out
                }
                None => vec![update],
            }
        }
        Operation::AddConstraint { constraint } => vec![add_constraint(g, constraint)],
        Operation::DropConstraint { constraint } => vec![format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            g.qualify(constraint.schema(), constraint.table()),
            g.quote(constraint.name())
        )],
        Operation::RenameConstraint {
            schema,
            table,
            from,
            to,
            ..
        } => vec![format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {};",
            g.qualify(schema, table),
            g.quote(from),
            g.quote(to)
        )],
        Operation::CreateIndex { index } => vec![create_index(g, index)],
        Operation::DropIndex { index } => {
            vec![format!("DROP INDEX {};", g.qualify(&index.schema, &index.name))]
        }
        Operation::RenameIndex {
            schema, from, to, ..
        } => vec![format!(
            "ALTER INDEX {} RENAME TO {};",
            g.qualify(schema, from),
            g.quote(to)
        )],
        Operation::CreateView { view } => vec![create_view(g, view)],
        Operation::DropView { view } => {
            vec![format!("DROP VIEW {};", g.qualify(&view.schema, &view.name))]
        }
        Operation::RenameView { schema, from, to } => vec![format!(
            "ALTER VIEW {} RENAME TO {};",
            g.qualify(schema, from),
            g.quote(to)
        )],
        Operation::MoveView {
            name,
            from_schema,
            to_schema,
        } => vec![format!(
            "ALTER VIEW {} SET SCHEMA {};",
            g.qualify(from_schema, name),
            g.quote(to_schema)
        )],
        Operation::RecreateTable { .. } => unsupported(g.dialect(), op),
    }
}

pub(super) fn create_table(g: &dyn Grammar, table: &TableDef) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", g.qualify(&table.schema, &table.name));
    let mut lines = Vec::new();

    for col in &table.columns {
        lines.push(format!("\t{}", column_def(g, col)));
    }

    if let Some(pk) = &table.primary_key {
        let cols = quoted_list(g, &pk.columns, ", ");
        // the server names an unnamed key `{table}_pkey`; a hashed long
        // name has to be spelled out
        if pk.name_explicit || pk.name != format!("{}_pkey", table.name) {
            lines.push(format!(
                "\tCONSTRAINT {} PRIMARY KEY({})",
                g.quote(&pk.name),
                cols
            ));
        } else {
            lines.push(format!("\tPRIMARY KEY({})", cols));
        }
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
        lines.push(format!("\tCONSTRAINT {} CHECK ({})", g.quote(&c.name), c.value));
    }

    sql.push_str(&lines.join(",\n"));
    sql.push_str("\n);");
    sql
}

pub(super) fn column_def(g: &dyn Grammar, col: &Column) -> String {
    let mut def = format!("{} {}", g.quote(&col.name), g.column_type(&col.sql_type));
    if col.not_null {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        def.push_str(&format!(" DEFAULT {}", g.default_value(&col.sql_type, default)));
    }

    if let Some(generated) = &col.generated {
        // Postgres only has stored generated columns
        let storage = match generated.kind {
            GeneratedKind::Stored | GeneratedKind::Virtual => "STORED",
        };
        def.push_str(&format!(
            " GENERATED ALWAYS AS ({}) {}",
            generated.expression, storage
        ));
    }

    if let Some(identity) = &col.identity {
        def.push_str(&identity_clause(identity));
    }

    def
}

fn identity_clause(identity: &Identity) -> String {
    let kind = match identity.kind {
        IdentityKind::Always => "ALWAYS",
        IdentityKind::ByDefault => "BY DEFAULT",
    };

    let mut options = Vec::new();
    if let Some(v) = identity.start_with {
        options.push(format!("START WITH {}", v));
    }
    if let Some(v) = identity.increment {
        options.push(format!("INCREMENT BY {}", v));
    }
    if let Some(v) = identity.min_value {
        options.push(format!("MINVALUE {}", v));
    }
    if let Some(v) = identity.max_value {
        options.push(format!("MAXVALUE {}", v));
    }
    if let Some(v) = identity.cache {
        options.push(format!("CACHE {}", v));
    }
    if identity.cycle {
        options.push("CYCLE".to_string());
    }

    if options.is_empty() {
        format!(" GENERATED {} AS IDENTITY", kind)
    } else {
        format!(" GENERATED {} AS IDENTITY ({})", kind, options.join(" "))
    }
}

fn alter_column(g: &dyn Grammar, column: &Column, changes: &[ColumnAlteration]) -> Vec<String> {
    let prefix = format!(
        "ALTER TABLE {} ALTER COLUMN {}",
        g.qualify(&column.schema, &column.table),
        g.quote(&column.name)
    );

    changes
        .iter()
        .map(|change| match change {
            ColumnAlteration::SetType { to, .. } => {
                let ty = g.column_type(to);
                format!(
                    "{} SET DATA TYPE {} USING {}::{};",
                    prefix,
                    ty,
                    g.quote(&column.name),
                    ty
                )
            }
            ColumnAlteration::SetNotNull => format!("{} SET NOT NULL;", prefix),
            ColumnAlteration::DropNotNull => format!("{} DROP NOT NULL;", prefix),
            ColumnAlteration::SetDefault { default } => format!(
                "{} SET DEFAULT {};",
                prefix,
                g.default_value(&column.sql_type, default)
            ),
            ColumnAlteration::DropDefault => format!("{} DROP DEFAULT;", prefix),
        })
        .collect()
}

pub(super) fn fk_def(g: &dyn Grammar, fk: &ForeignKey) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}){}",
        g.quote(&fk.name),
        quoted_list(g, &fk.columns, ", "),
        g.qualify(&fk.schema_to, &fk.table_to),
        quoted_list(g, &fk.columns_to, ", "),
        referential_actions(fk)
    )
}

pub(super) fn add_constraint(g: &dyn Grammar, constraint: &Constraint) -> String {
    let table = g.qualify(constraint.schema(), constraint.table());
    let body = match constraint {
        Constraint::PrimaryKey(pk) => format!(
            "CONSTRAINT {} PRIMARY KEY({})",
            g.quote(&pk.name),
            quoted_list(g, &pk.columns, ", ")
        ),
        Constraint::Unique(u) => format!(
            "CONSTRAINT {} UNIQUE({})",
            g.quote(&u.name),
            quoted_list(g, &u.columns, ", ")
        ),
        Constraint::Check(c) => format!("CONSTRAINT {} CHECK ({})", g.quote(&c.name), c.value),
        Constraint::ForeignKey(fk) => fk_def(g, fk),
    };
    format!("ALTER TABLE {} ADD {};", table, body)
}

fn create_index(g: &dyn Grammar, index: &Index) -> String {
    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let cols = index
        .columns
        .iter()
        .map(|c| index_column(g, c, true))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "CREATE {}INDEX {} ON {} USING {} ({})",
        unique,
        g.quote(&index.name),
        g.qualify(&index.schema, &index.table),
        index.method.as_deref().unwrap_or("btree"),
        cols
    );

    if !index.with.is_empty() {
        let params = index
            .with
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" WITH ({})", params));
    }
    if let Some(predicate) = &index.where_clause {
        sql.push_str(&format!(" WHERE {}", predicate));
    }
    sql.push(';');
    sql
}

fn create_view(g: &dyn Grammar, view: &View) -> String {
    let mut sql = format!("CREATE VIEW {}", g.qualify(&view.schema, &view.name));
    if let Some(columns) = &view.columns {
        sql.push_str(&format!(" ({})", quoted_list(g, columns, ", ")));
    }

    let params: Vec<String> = view
        .options
        .iter()
        .filter(|(k, _)| k.as_str() != "checkOption")
        .map(|(k, v)| format!("{} = {}", k, v))
        .collect();
    if !params.is_empty() {
        sql.push_str(&format!(" WITH ({})", params.join(", ")));
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
    use crate::ddl::{ColumnDefault, PrimaryKey};
    use driftless_types::ColumnType;

    fn text_column(name: &str) -> Column {
        Column::new("public", "users", name, ColumnType::Text)
    }

    #[test]
    fn test_add_column_renders_unqualified_in_public() {
        let mut column = text_column("name");
        column.not_null = true;
        column.default = Some(ColumnDefault::literal("hey"));
        let sql = PostgresGrammar.render(&Operation::AddColumn { column });
        assert_eq!(
            sql,
            vec!["ALTER TABLE \"users\" ADD COLUMN \"name\" text NOT NULL DEFAULT 'hey';"]
        );
    }

    #[test]
    fn test_create_table_layout() {
        let mut id = Column::new(
            "public",
            "users",
            "id",
            ColumnType::parse("integer", Dialect::PostgreSQL).unwrap(),
        );
        id.not_null = true;
        id.identity = Some(Identity::new(IdentityKind::Always));
        let table = TableDef {
            schema: "public".into(),
            name: "users".into(),
            columns: vec![id, text_column("email")],
            primary_key: Some(PrimaryKey {
                schema: "public".into(),
                table: "users".into(),
                name: "users_pkey".into(),
                name_explicit: false,
                columns: vec!["id".into()],
            }),
            uniques: vec![],
            checks: vec![],
            foreign_keys: vec![],
        };

        let sql = create_table(&PostgresGrammar, &table);
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\n\t\"id\" integer NOT NULL GENERATED ALWAYS AS IDENTITY,\n\t\"email\" text,\n\tPRIMARY KEY(\"id\")\n);"
        );
    }

    #[test]
    fn test_create_table_names_a_hashed_primary_key() {
        let name = "a".repeat(60);
        let key = NAMING.primary_key(&name);
        assert_eq!(key.len(), 63);
        let mut id = Column::new(
            "public",
            &name,
            "id",
            ColumnType::parse("integer", Dialect::PostgreSQL).unwrap(),
        );
        id.not_null = true;
        let table = TableDef {
            schema: "public".into(),
            name: name.clone(),
            columns: vec![id],
            primary_key: Some(PrimaryKey {
                schema: "public".into(),
                table: name.clone(),
                name: key.clone(),
                name_explicit: false,
                columns: vec!["id".into()],
            }),
            uniques: vec![],
            checks: vec![],
            foreign_keys: vec![],
        };

        let sql = create_table(&PostgresGrammar, &table);
        assert!(
            sql.contains(&format!("\tCONSTRAINT \"{}\" PRIMARY KEY(\"id\")", key)),
            "got: {sql}"
        );
    }

    #[test]
    fn test_alter_column_type_uses_using_clause() {
        let from = text_column("age");
        let mut column = from.clone();
        column.sql_type = ColumnType::parse("integer", Dialect::PostgreSQL).unwrap();
        let sql = PostgresGrammar.render(&Operation::AlterColumn {
            changes: vec![ColumnAlteration::SetType {
                from: from.sql_type.clone(),
                to: column.sql_type.clone(),
            }],
            column,
            from,
        });
        assert_eq!(
            sql,
            vec!["ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DATA TYPE integer USING \"age\"::integer;"]
        );
    }

    #[test]
    fn test_copy_into_always_identity_toggles_generation() {
        let mut to = Column::new(
            "public",
            "users",
            "id",
            ColumnType::parse("integer", Dialect::PostgreSQL).unwrap(),
        );
        to.identity = Some(Identity::new(IdentityKind::Always));
        let sql = PostgresGrammar.render(&Operation::CopyColumnData {
            schema: "public".into(),
            table: "users".into(),
            from: "__id_old".into(),
            from_type: to.sql_type.clone(),
            to,
        });
        assert_eq!(sql.len(), 4);
        assert!(sql[0].contains("SET GENERATED BY DEFAULT"));
        assert_eq!(sql[1], "UPDATE \"users\" SET \"id\" = \"__id_old\";");
        assert!(sql[2].contains("SET GENERATED ALWAYS"));
        assert!(sql[3].starts_with("SELECT setval("));
    }

    #[test]
    fn test_schema_qualified_rename() {
        let sql = PostgresGrammar.render(&Operation::RenameTable {
            schema: "audit".into(),
            from: "t1".into(),
            to: "t2".into(),
        });
        assert_eq!(sql, vec!["ALTER TABLE \"audit\".\"t1\" RENAME TO \"t2\";"]);
    }
}
