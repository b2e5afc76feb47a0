//! Microsoft SQL Server grammar
//!
//! Defaults are named constraints here, so any statement that drops or
//! retypes a defaulted column has to drop the default constraint first.

use super::{
    AlterColumnSupport, Capabilities, Grammar, Naming, PrimaryKeyNaming, bool_as_int,
    index_column, literal, quoted_list, referential_actions, unsupported,
};
use crate::ddl::{
    Column, ColumnDefault, DefaultKind, ForeignKey, GeneratedKind, Index, TableDef, View,
};
use crate::plan::{ColumnAlteration, Constraint, ConstraintKind, Operation};
use crate::utils::escape_literal;
use driftless_types::{ColumnType, Dialect};

static CAPABILITIES: Capabilities = Capabilities {
    namespaces: true,
    rename_namespace: false,
    alter_column: AlterColumnSupport::InPlace { type_change: true },
    add_constraint_in_place: true,
    renamable_constraints: &[
        ConstraintKind::PrimaryKey,
        ConstraintKind::Unique,
        ConstraintKind::Check,
        ConstraintKind::ForeignKey,
        ConstraintKind::Default,
    ],
    implicit_constraint_names: false,
    rename_index: true,
    rename_view: true,
    named_defaults: true,
    inline_foreign_keys: false,
    foreign_keys: true,
    restricted_add_column: false,
    swap_primary_key: false,
    partial_indexes: true,
};

static NAMING: Naming = Naming {
    primary_key: PrimaryKeyNaming::Suffix("pkey"),
    unique_suffix: "key",
    index_suffix: "idx",
    foreign_key_suffix: "fk",
    max_length: 128,
};

/// MSSQL grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlGrammar;

impl Grammar for MssqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MSSQL
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn naming(&self) -> &'static Naming {
        &NAMING
    }

    fn quote(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
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
            Operation::CreateSchema { name } => {
                vec![format!("CREATE SCHEMA {};", self.quote(name))]
            }
            Operation::DropSchema { name } => vec![format!("DROP SCHEMA {};", self.quote(name))],
            Operation::CreateTable { table } => vec![self.create_table(table)],
            Operation::DropTable { schema, name } => {
                vec![format!("DROP TABLE {};", self.qualify(schema, name))]
            }
            Operation::RenameTable { schema, from, to } => {
                vec![self.sp_rename(&self.qualify(schema, from), to, None)]
            }
            Operation::MoveTable {
                name,
                from_schema,
                to_schema,
            }
            | Operation::MoveView {
                name,
                from_schema,
                to_schema,
            } => vec![format!(
                "ALTER SCHEMA {} TRANSFER {}.{};",
                self.quote(to_schema),
                self.quote(from_schema),
                self.quote(name)
            )],
            Operation::AddColumn { column } => vec![format!(
                "ALTER TABLE {} ADD {};",
                self.qualify(&column.schema, &column.table),
                self.column_def(column)
            )],
            Operation::DropColumn { column } => {
                let table = self.qualify(&column.schema, &column.table);
                let mut out = Vec::new();
                if column.default.is_some() {
                    out.push(self.drop_default(column));
                }
                out.push(format!(
                    "ALTER TABLE {} DROP COLUMN {};",
                    table,
                    self.quote(&column.name)
                ));
                out
            }
            Operation::RenameColumn {
                schema,
                table,
                from,
                to,
            } => vec![self.sp_rename(
                &format!("{}.{}", self.qualify(schema, table), self.quote(from)),
                to,
                Some("COLUMN"),
            )],
            Operation::AlterColumn {
                column,
                from,
                changes,
            } => self.alter_column(column, from, changes),
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
            Operation::AddConstraint { constraint } => vec![format!(
                "ALTER TABLE {} ADD {};",
                self.qualify(constraint.schema(), constraint.table()),
                self.constraint_def(constraint)
            )],
            Operation::DropConstraint { constraint } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                self.qualify(constraint.schema(), constraint.table()),
                self.quote(constraint.name())
            )],
            Operation::RenameConstraint {
                schema, from, to, ..
            } => vec![self.sp_rename(&self.qualify(schema, from), to, Some("OBJECT"))],
            Operation::CreateIndex { index } => vec![self.create_index(index)],
            Operation::DropIndex { index } => vec![format!(
                "DROP INDEX {} ON {};",
                self.quote(&index.name),
                self.qualify(&index.schema, &index.table)
            )],
            Operation::RenameIndex {
                schema,
                table,
                from,
                to,
            } => vec![self.sp_rename(
                &format!("{}.{}", self.qualify(schema, table), self.quote(from)),
                to,
                Some("INDEX"),
            )],
            Operation::CreateView { view } => vec![self.create_view(view)],
            Operation::DropView { view } => vec![format!(
                "DROP VIEW {};",
                self.qualify(&view.schema, &view.name)
            )],
            Operation::RenameView { schema, from, to } => {
                vec![self.sp_rename(&self.qualify(schema, from), to, None)]
            }
            Operation::RenameSchema { .. } | Operation::RecreateTable { .. } => {
                unsupported(self.dialect(), op)
            }
        }
    }
}

impl MssqlGrammar {
    fn sp_rename(&self, object: &str, to: &str, kind: Option<&str>) -> String {
        match kind {
            Some(kind) => format!(
                "EXEC sp_rename '{}', {}, '{}';",
                escape_literal(object, false),
                self.quote(to),
                kind
            ),
            None => format!(
                "EXEC sp_rename '{}', {};",
                escape_literal(object, false),
                self.quote(to)
            ),
        }
    }

    fn default_name(&self, column: &Column) -> String {
        self.naming().default_constraint(&column.table, &column.name)
    }

    fn drop_default(&self, column: &Column) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            self.qualify(&column.schema, &column.table),
            self.quote(&self.default_name(column))
        )
    }

    fn add_default(&self, column: &Column, default: &ColumnDefault) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {};",
            self.qualify(&column.schema, &column.table),
            self.quote(&self.default_name(column)),
            self.default_value(&column.sql_type, default),
            self.quote(&column.name)
        )
    }

    fn column_def(&self, column: &Column) -> String {
        let name = self.quote(&column.name);

        if let Some(generated) = &column.generated {
            let persisted = match generated.kind {
                GeneratedKind::Stored => " PERSISTED",
                GeneratedKind::Virtual => "",
            };
            return format!("{} AS ({}){}", name, generated.expression, persisted);
        }

        let mut def = format!("{} {}", name, self.column_type(&column.sql_type));
        if let Some(identity) = &column.identity {
            def.push_str(&format!(
                " IDENTITY({}, {})",
                identity.start_with.unwrap_or(1),
                identity.increment.unwrap_or(1)
            ));
        }
        def.push_str(if column.not_null { " NOT NULL" } else { " NULL" });
        if let Some(default) = &column.default {
            def.push_str(&format!(
                " CONSTRAINT {} DEFAULT {}",
                self.quote(&self.default_name(column)),
                self.default_value(&column.sql_type, default)
            ));
        }
        def
    }

    fn create_table(&self, table: &TableDef) -> String {
        let mut sql = format!(
            "CREATE TABLE {} (\n",
            self.qualify(&table.schema, &table.name)
        );
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("\t{}", self.column_def(c)))
            .collect();

        if let Some(pk) = &table.primary_key {
            lines.push(format!(
                "\t{}",
                self.constraint_def(&Constraint::PrimaryKey(pk.clone()))
            ));
        }
        for fk in &table.foreign_keys {
            lines.push(format!("\t{}", self.fk_def(fk)));
        }
        for u in &table.uniques {
            lines.push(format!(
                "\t{}",
                self.constraint_def(&Constraint::Unique(u.clone()))
            ));
        }
        for c in &table.checks {
            lines.push(format!(
                "\t{}",
                self.constraint_def(&Constraint::Check(c.clone()))
            ));
        }

        sql.push_str(&lines.join(",\n"));
        sql.push_str("\n);");
        sql
    }

    fn constraint_def(&self, constraint: &Constraint) -> String {
        match constraint {
            Constraint::PrimaryKey(pk) => format!(
                "CONSTRAINT {} PRIMARY KEY({})",
                self.quote(&pk.name),
                quoted_list(self, &pk.columns, ", ")
            ),
            Constraint::Unique(u) => format!(
                "CONSTRAINT {} UNIQUE({})",
                self.quote(&u.name),
                quoted_list(self, &u.columns, ", ")
            ),
            Constraint::Check(c) => {
                format!("CONSTRAINT {} CHECK ({})", self.quote(&c.name), c.value)
            }
            Constraint::ForeignKey(fk) => self.fk_def(fk),
        }
    }

    fn fk_def(&self, fk: &ForeignKey) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}){}",
            self.quote(&fk.name),
            quoted_list(self, &fk.columns, ", "),
            self.qualify(&fk.schema_to, &fk.table_to),
            quoted_list(self, &fk.columns_to, ", "),
            referential_actions(fk)
        )
    }

    fn alter_column(
        &self,
        column: &Column,
        from: &Column,
        changes: &[ColumnAlteration],
    ) -> Vec<String> {
        let type_change = changes
            .iter()
            .any(|c| matches!(c, ColumnAlteration::SetType { .. }));
        let null_change = changes.iter().any(|c| {
            matches!(
                c,
                ColumnAlteration::SetNotNull | ColumnAlteration::DropNotNull
            )
        });
        let default_change = changes.iter().any(|c| {
            matches!(
                c,
                ColumnAlteration::SetDefault { .. } | ColumnAlteration::DropDefault
            )
        });

        let mut out = Vec::new();

        // A default constraint pins the column type
        let rebuild_default = default_change || (type_change && from.default.is_some());
        if rebuild_default && from.default.is_some() {
            out.push(self.drop_default(from));
        }

        if type_change || null_change {
            out.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} {}{};",
                self.qualify(&column.schema, &column.table),
                self.quote(&column.name),
                self.column_type(&column.sql_type),
                if column.not_null { " NOT NULL" } else { " NULL" }
            ));
        }

        if rebuild_default && let Some(default) = &column.default {
            out.push(self.add_default(column, default));
        }
        out
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

    fn create_view(&self, view: &View) -> String {
        let mut sql = format!("CREATE VIEW {}", self.qualify(&view.schema, &view.name));
        if let Some(columns) = &view.columns {
            sql.push_str(&format!(" ({})", quoted_list(self, columns, ", ")));
        }

        let mut attributes = Vec::new();
        if is_enabled(view, "encryption") {
            attributes.push("ENCRYPTION");
        }
        if is_enabled(view, "schemaBinding") {
            attributes.push("SCHEMABINDING");
        }
        if is_enabled(view, "viewMetadata") {
            attributes.push("VIEW_METADATA");
        }
        if !attributes.is_empty() {
            sql.push_str(&format!(" WITH {}", attributes.join(", ")));
        }

        sql.push_str(&format!(" AS {}", view.definition.as_deref().unwrap_or("")));
        if is_enabled(view, "checkOption") {
            sql.push_str(" WITH CHECK OPTION");
        }
        sql.push(';');
        sql
    }
}

fn is_enabled(view: &View, option: &str) -> bool {
    view.options
        .get(option)
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}
