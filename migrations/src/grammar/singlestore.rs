//! SingleStore grammar
//!
//! MySQL syntax, but without foreign keys and with very limited `ALTER`:
//! column and constraint changes rebuild the table.

use super::mysql::{self, NAMING};
use super::{AlterColumnSupport, Capabilities, Grammar, Naming, quoted_list, unsupported};
use crate::ddl::{ColumnDefault, TableDef};
use crate::plan::{Constraint, Operation};
use driftless_types::{ColumnType, Dialect};

static CAPABILITIES: Capabilities = Capabilities {
    namespaces: false,
    rename_namespace: false,
    alter_column: AlterColumnSupport::RecreateTable {
        shadow_type_change: false,
    },
    add_constraint_in_place: false,
    renamable_constraints: &[],
    implicit_constraint_names: false,
    rename_index: false,
    rename_view: false,
    named_defaults: false,
    inline_foreign_keys: false,
    foreign_keys: false,
    restricted_add_column: false,
    swap_primary_key: false,
    partial_indexes: false,
};

/// SingleStore grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleStoreGrammar;

impl Grammar for SingleStoreGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::SingleStore
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CAPABILITIES
    }

    fn naming(&self) -> &'static Naming {
        &NAMING
    }

    fn quote(&self, ident: &str) -> String {
        mysql::quote_ident(ident)
    }

    fn default_value(&self, ty: &ColumnType, default: &ColumnDefault) -> String {
        mysql::default_value(ty, default)
    }

    fn render(&self, op: &Operation) -> Vec<String> {
        match op {
            Operation::RecreateTable { from, to } => recreate_table(self, from, to),
            Operation::RenameColumn {
                schema,
                table,
                from,
                to,
            } => vec![format!(
                "ALTER TABLE {} CHANGE {} {};",
                self.qualify(schema, table),
                self.quote(from),
                self.quote(to)
            )],
            Operation::AddConstraint {
                constraint: Constraint::ForeignKey(_),
            }
            | Operation::DropConstraint {
                constraint: Constraint::ForeignKey(_),
            } => unsupported(self.dialect(), op),
            _ => mysql::render(self, op),
        }
    }
}

fn recreate_table(g: &dyn Grammar, from: &TableDef, to: &TableDef) -> Vec<String> {
    let temp_name = format!("__new_{}", to.name);
    let temp = TableDef {
        name: temp_name.clone(),
        ..to.clone()
    };

    let mut out = vec![mysql::create_table(g, &temp)];

    let columns: Vec<String> = to
        .columns
        .iter()
        .filter(|c| c.generated.is_none() && from.column(&c.name).is_some())
        .map(|c| c.name.clone())
        .collect();
    if !columns.is_empty() {
        let cols = quoted_list(g, &columns, ", ");
        out.push(format!(
            "INSERT INTO {}({}) SELECT {} FROM {};",
            g.qualify(&to.schema, &temp_name),
            cols,
            cols,
            g.qualify(&from.schema, &from.name)
        ));
    }

    out.push(format!("DROP TABLE {};", g.qualify(&from.schema, &from.name)));
    out.push(format!(
        "ALTER TABLE {} RENAME TO {};",
        g.qualify(&to.schema, &temp_name),
        g.quote(&to.name)
    ));
    out
}
