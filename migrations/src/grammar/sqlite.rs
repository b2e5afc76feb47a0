//! SQLite grammar
//!
//! SQLite cannot alter columns or constraints in place. The planner hands
//! such changes over as [`Operation::RecreateTable`], which rebuilds the
//! table under a temporary name with foreign key enforcement switched off.

use super::{
    AlterColumnSupport, Capabilities, Grammar, Naming, PrimaryKeyNaming, bool_as_int,
    index_column, literal, quoted_list, referential_actions, unsupported,
};
use crate::ddl::{Column, ColumnDefault, DefaultKind, GeneratedKind, Index, TableDef};
use crate::plan::Operation;
use driftless_types::{ColumnType, Dialect};

static CAPABILITIES: Capabilities = Capabilities {
    namespaces: false,
    rename_namespace: false,
    alter_column: AlterColumnSupport::RecreateTable {
        shadow_type_change: true,
    },
    add_constraint_in_place: false,
    renamable_constraints: &[],
    implicit_constraint_names: true,
    rename_index: false,
    rename_view: false,
    named_defaults: false,
    inline_foreign_keys: true,
    foreign_keys: true,
    restricted_add_column: true,
    swap_primary_key: false,
    partial_indexes: true,
};

static NAMING: Naming = Naming {
    primary_key: PrimaryKeyNaming::Suffix("pk"),
    unique_suffix: "unique",
    index_suffix: "idx",
    foreign_key_suffix: "fk",
    max_length: usize::MAX,
};

/// SQLite grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl Grammar for SqliteGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn naming(&self) -> &'static Naming {
        &NAMING
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn column_type(&self, ty: &ColumnType) -> String {
        ty.to_sql(Dialect::SQLite).to_uppercase()
    }

    fn default_value(&self, ty: &ColumnType, default: &ColumnDefault) -> String {
        match default.kind {
            DefaultKind::Literal => {
                if ty.is_boolean()
                    && let Some(v) = bool_as_int(&default.value)
                {
                    return v.to_string();
                }
                literal(ty, &default.value, false)
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

    fn render(&self, op: &Operation) -> Vec<String> {
        match op {
            Operation::CreateTable { table } => vec![self.create_table(table)],
            Operation::DropTable { schema, name } => {
                vec![format!("DROP TABLE {};", self.qualify(schema, name))]
            }
            Operation::RenameTable { schema, from, to } => vec![format!(
                "ALTER TABLE {} RENAME TO {};",
                self.qualify(schema, from),
                self.quote(to)
            )],
            Operation::RecreateTable { from, to } => self.recreate_table(from, to),
            Operation::AddColumn { column } => vec![format!(
                "ALTER TABLE {} ADD {};",
                self.qualify(&column.schema, &column.table),
                self.column_def(column, false, false)
            )],
            Operation::DropColumn { column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                self.qualify(&column.schema, &column.table),
                self.quote(&column.name)
            )],
            Operation::RenameColumn {
                schema,
                table,
                from,
                to,
            } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                self.qualify(schema, table),
                self.quote(from),
                self.quote(to)
            )],
            Operation::CopyColumnData {
                schema,
                table,
                from,
                from_type,
                to,
            } => {
                let source = if from_type != &to.sql_type {
                    format!(
                        "CAST({} AS {})",
                        self.quote(from),
                        self.column_type(&to.sql_type)
                    )
                } else {
                    self.quote(from)
                };
                vec![format!(
                    "UPDATE {} SET {} = {};",
                    self.qualify(schema, table),
                    self.quote(&to.name),
                    source
                )]
            }
            Operation::CreateIndex { index } => vec![self.create_index(index)],
            Operation::DropIndex { index } => {
                vec![format!("DROP INDEX IF EXISTS {};", self.quote(&index.name))]
            }
            Operation::CreateView { view } => vec![format!(
                "CREATE VIEW {} AS {};",
                self.qualify(&view.schema, &view.name),
                view.definition.as_deref().unwrap_or("")
            )],
            Operation::DropView { view } => vec![format!(
                "DROP VIEW {};",
                self.qualify(&view.schema, &view.name)
            )],
            Operation::CreateSchema { .. }
            | Operation::DropSchema { .. }
            | Operation::RenameSchema { .. }
            | Operation::MoveTable { .. }
            | Operation::MoveView { .. }
            | Operation::AlterColumn { .. }
            | Operation::AddConstraint { .. }
            | Operation::DropConstraint { .. }
            | Operation::RenameConstraint { .. }
            | Operation::RenameIndex { .. }
            | Operation::RenameView { .. } => unsupported(self.dialect(), op),
        }
    }
}

impl SqliteGrammar {
    fn create_table(&self, table: &TableDef) -> String {
        let mut sql = format!(
            "CREATE TABLE {} (\n",
            self.qualify(&table.schema, &table.name)
        );
        let mut lines = Vec::new();

        for column in &table.columns {
            // A sole, unnamed primary key is declared on the column itself
            let is_column_pk = table.primary_key.as_ref().is_some_and(|pk| {
                pk.columns.len() == 1 && pk.columns[0] == column.name && !pk.name_explicit
            });
            let is_column_unique = table.uniques.iter().any(|u| {
                u.columns.len() == 1 && u.columns[0] == column.name && !u.name_explicit
            });
            let mut def = self.column_def(column, is_column_pk, is_column_unique);
            def.insert(0, '\t');
            lines.push(def);
        }

        if let Some(pk) = &table.primary_key
            && (pk.columns.len() > 1 || pk.name_explicit)
        {
            lines.push(format!(
                "\tCONSTRAINT {} PRIMARY KEY({})",
                self.quote(&pk.name),
                quoted_list(self, &pk.columns, ", ")
            ));
        }

        for fk in &table.foreign_keys {
            lines.push(format!(
                "\tCONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}){}",
                self.quote(&fk.name),
                quoted_list(self, &fk.columns, ", "),
                self.qualify(&fk.schema_to, &fk.table_to),
                quoted_list(self, &fk.columns_to, ", "),
                referential_actions(fk)
            ));
        }

        for unique in table
            .uniques
            .iter()
            .filter(|u| u.columns.len() > 1 || u.name_explicit)
        {
            lines.push(format!(
                "\tCONSTRAINT {} UNIQUE({})",
                self.quote(&unique.name),
                quoted_list(self, &unique.columns, ", ")
            ));
        }

        for check in &table.checks {
            lines.push(format!(
                "\tCONSTRAINT {} CHECK({})",
                self.quote(&check.name),
                check.value
            ));
        }

        sql.push_str(&lines.join(",\n"));
        sql.push_str("\n);");
        sql
    }

    fn column_def(&self, column: &Column, inline_pk: bool, inline_unique: bool) -> String {
        // For INTEGER PRIMARY KEY, SQLite allows NULL unless NOT NULL is explicit
        let omit_not_null = inline_pk && column.sql_type.is_integer();

        let mut def = format!(
            "{} {}",
            self.quote(&column.name),
            self.column_type(&column.sql_type)
        );
        if inline_pk {
            def.push_str(" PRIMARY KEY");
            if column.identity.is_some() {
                def.push_str(" AUTOINCREMENT");
            }
        }
        if let Some(default) = &column.default {
            def.push_str(&format!(
                " DEFAULT {}",
                self.default_value(&column.sql_type, default)
            ));
        }
        if let Some(generated) = &column.generated {
            let storage = match generated.kind {
                GeneratedKind::Stored => "STORED",
                GeneratedKind::Virtual => "VIRTUAL",
            };
            def.push_str(&format!(
                " GENERATED ALWAYS AS ({}) {}",
                generated.expression, storage
            ));
        }
        if column.not_null && !omit_not_null {
            def.push_str(" NOT NULL");
        }
        if inline_unique {
            def.push_str(" UNIQUE");
        }
        def
    }

    fn recreate_table(&self, from: &TableDef, to: &TableDef) -> Vec<String> {
        let new_table_name = format!("__new_{}", to.name);

        // Non-generated columns present on both sides
        let column_names: Vec<String> = from
            .columns
            .iter()
            .filter(|col| {
                col.generated.is_none()
                    && to
                        .column(&col.name)
                        .is_some_and(|c| c.generated.is_none())
            })
            .map(|col| col.name.clone())
            .collect();

        let mut tmp_table = to.clone();
        tmp_table.name = new_table_name.clone();

        let mut statements = vec![
            "PRAGMA foreign_keys=OFF;".to_string(),
            self.create_table(&tmp_table),
        ];

        if !column_names.is_empty() {
            let cols = quoted_list(self, &column_names, ", ");
            statements.push(format!(
                "INSERT INTO {}({}) SELECT {} FROM {};",
                self.quote(&new_table_name),
                cols,
                cols,
                self.qualify(&from.schema, &from.name)
            ));
        }

        statements.push(format!(
            "DROP TABLE {};",
            self.qualify(&from.schema, &from.name)
        ));
        statements.push(format!(
            "ALTER TABLE {} RENAME TO {};",
            self.quote(&new_table_name),
            self.quote(&to.name)
        ));
        statements.push("PRAGMA foreign_keys=ON;".to_string());
        statements
    }

    fn create_index(&self, index: &Index) -> String {
        let unique = if index.is_unique { "UNIQUE " } else { "" };
        let cols = index
            .columns
            .iter()
            .map(|c| index_column(self, c, false))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = index
            .where_clause
            .as_ref()
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default();

        format!(
            "CREATE {}INDEX {} ON {} ({}){};",
            unique,
            self.quote(&index.name),
            self.qualify(&index.schema, &index.table),
            cols,
            where_clause
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{ForeignKey, Identity, IdentityKind, PrimaryKey, ReferentialAction};

    fn column(table: &str, name: &str, ty: &str) -> Column {
        Column::new(
            "main",
            table,
            name,
            ColumnType::parse(ty, Dialect::SQLite).unwrap(),
        )
    }

    fn users() -> TableDef {
        let mut id = column("users", "id", "integer");
        id.not_null = true;
        id.identity = Some(Identity::new(IdentityKind::ByDefault));
        let mut name = column("users", "name", "text");
        name.not_null = true;
        TableDef {
            schema: "main".into(),
            name: "users".into(),
            columns: vec![id, name],
            primary_key: Some(PrimaryKey {
                schema: "main".into(),
                table: "users".into(),
                name: "users_pk".into(),
                name_explicit: false,
                columns: vec!["id".into()],
            }),
            uniques: vec![],
            checks: vec![],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_create_table_inlines_integer_primary_key() {
        let sql = SqliteGrammar.create_table(&users());
        assert_eq!(
            sql,
            "CREATE TABLE `users` (\n\t`id` INTEGER PRIMARY KEY AUTOINCREMENT,\n\t`name` TEXT NOT NULL\n);"
        );
    }

    #[test]
    fn test_create_table_inlines_foreign_keys() {
        let mut posts = users();
        posts.name = "posts".into();
        posts.columns[1] = column("posts", "author_id", "integer");
        posts.primary_key = None;
        posts.foreign_keys.push(ForeignKey {
            schema: "main".into(),
            table: "posts".into(),
            name: "posts_author_id_users_id_fk".into(),
            name_explicit: false,
            columns: vec!["author_id".into()],
            schema_to: "main".into(),
            table_to: "users".into(),
            columns_to: vec!["id".into()],
            on_update: ReferentialAction::NoAction,
            on_delete: ReferentialAction::Cascade,
        });

        let sql = SqliteGrammar.create_table(&posts);
        assert!(sql.contains(
            "CONSTRAINT `posts_author_id_users_id_fk` FOREIGN KEY (`author_id`) REFERENCES `users`(`id`) ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_recreate_table_sequence() {
        let from = users();
        let mut to = users();
        to.columns.push(column("users", "age", "integer"));

        let sql = SqliteGrammar.render(&Operation::RecreateTable { from, to });
        assert_eq!(sql[0], "PRAGMA foreign_keys=OFF;");
        assert!(sql[1].starts_with("CREATE TABLE `__new_users` ("));
        assert_eq!(
            sql[2],
            "INSERT INTO `__new_users`(`id`, `name`) SELECT `id`, `name` FROM `users`;"
        );
        assert_eq!(sql[3], "DROP TABLE `users`;");
        assert_eq!(sql[4], "ALTER TABLE `__new_users` RENAME TO `users`;");
        assert_eq!(sql[5], "PRAGMA foreign_keys=ON;");
    }

    #[test]
    fn test_copy_column_casts_on_type_change() {
        let to = column("users", "age", "integer");
        let sql = SqliteGrammar.render(&Operation::CopyColumnData {
            schema: "main".into(),
            table: "users".into(),
            from: "__age_old".into(),
            from_type: ColumnType::Text,
            to,
        });
        assert_eq!(
            sql,
            vec!["UPDATE `users` SET `age` = CAST(`__age_old` AS INTEGER);"]
        );
    }

    #[test]
    fn test_boolean_defaults_are_integers() {
        let default = ColumnDefault::literal("true");
        assert_eq!(
            SqliteGrammar.default_value(&ColumnType::Boolean, &default),
            "1"
        );
    }
}
