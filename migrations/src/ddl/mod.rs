//! DDL model
//!
//! [`Ddl`] is the canonical, validated representation of one schema. It is
//! built once by [`crate::normalize`] and then only read: the differ,
//! planner and hint classifier all borrow two models and produce new values.

mod entity;

pub use entity::*;

use crate::collection::Collection;
use crate::traits::{Entity, EntityKey};
use driftless_types::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Full table definition, as needed to render `CREATE TABLE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    pub schema: String,
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
    pub primary_key: Option<PrimaryKey>,
    pub uniques: Vec<UniqueConstraint>,
    pub checks: Vec<CheckConstraint>,
    /// Foreign keys rendered inline (only populated for dialects that need it)
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDef {
    pub fn key(&self) -> EntityKey {
        EntityKey::table(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Foreign-key relation pairs `(table, referenced table)` of one model.
///
/// Computed on demand from the model's foreign keys and passed explicitly to
/// whatever needs cycle awareness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSet {
    pairs: BTreeSet<(EntityKey, EntityKey)>,
}

impl RelationSet {
    pub fn insert(&mut self, from: EntityKey, to: EntityKey) {
        self.pairs.insert((from, to));
    }

    pub fn contains(&self, from: &EntityKey, to: &EntityKey) -> bool {
        self.pairs.contains(&(from.clone(), to.clone()))
    }

    /// Tables referenced by `table`, excluding self references
    pub fn targets_of<'a>(&'a self, table: &'a EntityKey) -> impl Iterator<Item = &'a EntityKey> {
        self.pairs
            .iter()
            .filter(move |(from, to)| from == table && to != table)
            .map(|(_, to)| to)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EntityKey, EntityKey)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Canonical in-memory schema
#[derive(Debug, Clone, Default)]
pub struct Ddl {
    pub(crate) dialect: Dialect,
    pub(crate) schemas: Collection<Schema>,
    pub(crate) tables: Collection<Table>,
    pub(crate) columns: Collection<Column>,
    pub(crate) pks: Collection<PrimaryKey>,
    pub(crate) uniques: Collection<UniqueConstraint>,
    pub(crate) checks: Collection<CheckConstraint>,
    pub(crate) indexes: Collection<Index>,
    pub(crate) fks: Collection<ForeignKey>,
    pub(crate) views: Collection<View>,
}

impl Ddl {
    /// An empty model for `dialect`
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn schemas(&self) -> &Collection<Schema> {
        &self.schemas
    }

    pub fn tables(&self) -> &Collection<Table> {
        &self.tables
    }

    pub fn columns(&self) -> &Collection<Column> {
        &self.columns
    }

    pub fn pks(&self) -> &Collection<PrimaryKey> {
        &self.pks
    }

    pub fn uniques(&self) -> &Collection<UniqueConstraint> {
        &self.uniques
    }

    pub fn checks(&self) -> &Collection<CheckConstraint> {
        &self.checks
    }

    pub fn indexes(&self) -> &Collection<Index> {
        &self.indexes
    }

    pub fn fks(&self) -> &Collection<ForeignKey> {
        &self.fks
    }

    pub fn views(&self) -> &Collection<View> {
        &self.views
    }

    pub fn table(&self, key: &EntityKey) -> Option<&Table> {
        self.tables.get(key)
    }

    pub fn column(&self, schema: &str, table: &str, name: &str) -> Option<&Column> {
        self.columns.get(&EntityKey::child(schema, table, name))
    }

    /// Columns of a table in ordinal order
    pub fn columns_of(&self, table: &EntityKey) -> Vec<&Column> {
        let mut cols = self.columns.children_of(table);
        cols.sort_by_key(|c| c.ordinal);
        cols
    }

    pub fn pk_of(&self, table: &EntityKey) -> Option<&PrimaryKey> {
        self.pks.children_of(table).into_iter().next()
    }

    pub fn uniques_of(&self, table: &EntityKey) -> Vec<&UniqueConstraint> {
        sorted_by_key(self.uniques.children_of(table))
    }

    pub fn checks_of(&self, table: &EntityKey) -> Vec<&CheckConstraint> {
        sorted_by_key(self.checks.children_of(table))
    }

    pub fn indexes_of(&self, table: &EntityKey) -> Vec<&Index> {
        sorted_by_key(self.indexes.children_of(table))
    }

    pub fn fks_of(&self, table: &EntityKey) -> Vec<&ForeignKey> {
        sorted_by_key(self.fks.children_of(table))
    }

    /// Foreign keys on other tables that point at `table`
    pub fn fks_referencing(&self, table: &EntityKey) -> Vec<&ForeignKey> {
        sorted_by_key(
            self.fks
                .filter(|fk| &fk.target_key() == table && &fk.table_key() != table),
        )
    }

    /// Whether the table is declared `existing` (reference only)
    pub fn is_existing_table(&self, key: &EntityKey) -> bool {
        self.tables.get(key).is_some_and(|t| t.is_existing)
    }

    /// Collect everything needed to render `CREATE TABLE`
    pub fn table_def(&self, key: &EntityKey, inline_fks: bool) -> Option<TableDef> {
        let table = self.tables.get(key)?;
        Some(TableDef {
            schema: table.schema.clone(),
            name: table.name.clone(),
            columns: self.columns_of(key).into_iter().cloned().collect(),
            primary_key: self.pk_of(key).cloned(),
            uniques: self.uniques_of(key).into_iter().cloned().collect(),
            checks: self.checks_of(key).into_iter().cloned().collect(),
            foreign_keys: if inline_fks {
                self.fks_of(key).into_iter().cloned().collect()
            } else {
                Vec::new()
            },
        })
    }

    /// Foreign-key relation pairs of this model
    pub fn relations(&self) -> RelationSet {
        let mut set = RelationSet::default();
        for fk in self.fks.iter() {
            set.insert(fk.table_key(), fk.target_key());
        }
        set
    }

    /// Total number of entities across every kind
    pub fn entity_count(&self) -> usize {
        self.schemas.len()
            + self.tables.len()
            + self.columns.len()
            + self.pks.len()
            + self.uniques.len()
            + self.checks.len()
            + self.indexes.len()
            + self.fks.len()
            + self.views.len()
    }
}

fn sorted_by_key<E: Entity>(mut items: Vec<&E>) -> Vec<&E> {
    items.sort_by_key(|e| e.key());
    items
}
