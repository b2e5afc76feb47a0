//! Projection of source-model entities through resolved renames
//!
//! Once a schema, table or column rename is settled, everything that lives
//! under it (or refers to it) is compared under its new identity. Names the
//! tool synthesized from the old identity are re-synthesized from the new
//! one, so a renamed table's default-named constraints follow it while
//! explicitly named ones keep their names.

use crate::ddl::{
    CheckConstraint, Column, ForeignKey, Index, PrimaryKey, Table, UniqueConstraint, View,
};
use crate::grammar::Naming;
use crate::traits::{Entity, EntityKey};
use crate::utils::{replace_identifier, replace_table_reference};
use std::collections::BTreeMap;

/// Resolved renames, as a mapping from source identities to target ones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    schemas: BTreeMap<String, String>,
    /// Original table key to target table key
    tables: BTreeMap<EntityKey, EntityKey>,
    views: BTreeMap<EntityKey, EntityKey>,
    /// (target table key, old column name) to new column name
    columns: BTreeMap<(EntityKey, String), String>,
}

impl Projection {
    pub(crate) fn rename_schema(&mut self, from: &str, to: &str) {
        self.schemas.insert(from.to_string(), to.to_string());
    }

    pub(crate) fn rename_table(&mut self, from: EntityKey, to: EntityKey) {
        self.tables.insert(from, to);
    }

    pub(crate) fn rename_view(&mut self, from: EntityKey, to: EntityKey) {
        self.views.insert(from, to);
    }

    pub(crate) fn rename_column(&mut self, table: EntityKey, from: &str, to: &str) {
        self.columns
            .insert((table, from.to_string()), to.to_string());
    }

    pub fn schema(&self, name: &str) -> String {
        self.schemas
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Renamed schemas as `(from, to)` pairs
    pub fn schema_renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.schemas.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// Target key of a source table
    pub fn table(&self, key: &EntityKey) -> EntityKey {
        if let Some(to) = self.tables.get(key) {
            return to.clone();
        }
        match key {
            EntityKey::Composite2(schema, name) => EntityKey::table(&self.schema(schema), name),
            other => other.clone(),
        }
    }

    pub fn is_table_renamed(&self, key: &EntityKey) -> bool {
        self.tables.contains_key(key)
    }

    /// Target key of a source view
    pub fn view(&self, key: &EntityKey) -> EntityKey {
        if let Some(to) = self.views.get(key) {
            return to.clone();
        }
        match key {
            EntityKey::Composite2(schema, name) => EntityKey::table(&self.schema(schema), name),
            other => other.clone(),
        }
    }

    /// New name of a column of the (already projected) table `table`
    pub fn column_name(&self, table: &EntityKey, name: &str) -> String {
        self.columns
            .get(&(table.clone(), name.to_string()))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Column renames inside the target table `table`, as `(from, to)`
    pub fn column_renames_in<'a>(
        &'a self,
        table: &'a EntityKey,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.columns
            .iter()
            .filter(move |((t, _), _)| t == table)
            .map(|((_, from), to)| (from.as_str(), to.as_str()))
    }

    fn columns_of(&self, table: &EntityKey, columns: &[String]) -> Vec<String> {
        columns.iter().map(|c| self.column_name(table, c)).collect()
    }

    fn expression(&self, table: &EntityKey, expr: &str) -> String {
        self.column_renames_in(table)
            .fold(expr.to_string(), |acc, (from, to)| {
                replace_identifier(&acc, from, to)
            })
    }

    pub fn table_entity(&self, table: &Table) -> Table {
        let (schema, name) = split_table(&self.table(&table.key()));
        Table {
            schema,
            name,
            is_existing: table.is_existing,
        }
    }

    pub fn column(&self, column: &Column) -> Column {
        let table = self.table(&column.table_key());
        let (schema, table_name) = split_table(&table);
        Column {
            schema,
            table: table_name,
            name: self.column_name(&table, &column.name),
            ..column.clone()
        }
    }

    pub fn primary_key(&self, pk: &PrimaryKey, naming: &Naming) -> PrimaryKey {
        let table = self.table(&pk.table_key());
        let (schema, table_name) = split_table(&table);
        let name = if !pk.name_explicit && pk.name == naming.primary_key(&pk.table) {
            naming.primary_key(&table_name)
        } else {
            pk.name.clone()
        };
        PrimaryKey {
            schema,
            table: table_name,
            name,
            name_explicit: pk.name_explicit,
            columns: self.columns_of(&table, &pk.columns),
        }
    }

    pub fn unique(&self, unique: &UniqueConstraint, naming: &Naming) -> UniqueConstraint {
        let table = self.table(&unique.table_key());
        let (schema, table_name) = split_table(&table);
        let columns = self.columns_of(&table, &unique.columns);
        let name =
            if !unique.name_explicit && unique.name == naming.unique(&unique.table, &unique.columns)
            {
                naming.unique(&table_name, &columns)
            } else {
                unique.name.clone()
            };
        UniqueConstraint {
            schema,
            table: table_name,
            name,
            name_explicit: unique.name_explicit,
            columns,
        }
    }

    pub fn check(&self, check: &CheckConstraint, naming: &Naming) -> CheckConstraint {
        let table = self.table(&check.table_key());
        let (schema, table_name) = split_table(&table);
        let value = self.expression(&table, &check.value);
        let name =
            if !check.name_explicit && check.name == naming.check(&check.table, &check.value) {
                naming.check(&table_name, &value)
            } else {
                check.name.clone()
            };
        CheckConstraint {
            schema,
            table: table_name,
            name,
            name_explicit: check.name_explicit,
            value,
        }
    }

    pub fn index(&self, index: &Index, naming: &Naming) -> Index {
        let table = self.table(&index.table_key());
        let (schema, table_name) = split_table(&table);
        let columns: Vec<_> = index
            .columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.value = if c.is_expression {
                    self.expression(&table, &c.value)
                } else {
                    self.column_name(&table, &c.value)
                };
                c
            })
            .collect();
        let name = if !index.name_explicit && index.name == naming.index(&index.table, &index.columns)
        {
            naming.index(&table_name, &columns)
        } else {
            index.name.clone()
        };
        Index {
            schema,
            table: table_name,
            name,
            name_explicit: index.name_explicit,
            columns,
            is_unique: index.is_unique,
            where_clause: index
                .where_clause
                .as_ref()
                .map(|w| self.expression(&table, w)),
            method: index.method.clone(),
            with: index.with.clone(),
        }
    }

    pub fn foreign_key(&self, fk: &ForeignKey, naming: &Naming) -> ForeignKey {
        let table = self.table(&fk.table_key());
        let target = self.table(&fk.target_key());
        let (schema, table_name) = split_table(&table);
        let (schema_to, table_to) = split_table(&target);
        let columns = self.columns_of(&table, &fk.columns);
        let columns_to = self.columns_of(&target, &fk.columns_to);

        let synthesized = naming.foreign_key(&fk.table, &fk.columns, &fk.table_to, &fk.columns_to);
        let name = if !fk.name_explicit && fk.name == synthesized {
            naming.foreign_key(&table_name, &columns, &table_to, &columns_to)
        } else {
            fk.name.clone()
        };

        ForeignKey {
            schema,
            table: table_name,
            name,
            name_explicit: fk.name_explicit,
            columns,
            schema_to,
            table_to,
            columns_to,
            on_update: fk.on_update,
            on_delete: fk.on_delete,
        }
    }

    /// Views follow renamed tables and columns they mention
    pub fn view_entity(&self, view: &View) -> View {
        let key = self.view(&EntityKey::table(&view.schema, &view.name));
        let (schema, name) = split_table(&key);
        let definition = view.definition.as_ref().map(|def| {
            let mut def = def.clone();
            for (from, to) in &self.tables {
                if from != to {
                    let (from_schema, from_name) = split_table(from);
                    let (to_schema, to_name) = split_table(to);
                    def = replace_table_reference(
                        &def,
                        (&from_schema, &from_name),
                        (&to_schema, &to_name),
                    );
                }
            }
            for ((table, from), to) in &self.columns {
                if crate::utils::mentions_identifier(&def, table.name()) {
                    def = replace_identifier(&def, from, to);
                }
            }
            def
        });
        View {
            schema,
            name,
            definition,
            ..view.clone()
        }
    }
}

/// `(schema, name)` of a table or view key
pub(crate) fn split_table(key: &EntityKey) -> (String, String) {
    match key {
        EntityKey::Composite2(schema, name) => (schema.clone(), name.clone()),
        other => (String::new(), other.name().to_string()),
    }
}
