//! Normalizer: interim snapshot to canonical [`Ddl`]
//!
//! Validation never stops at the first problem. Every structural error is
//! collected and the offending entity is either kept (when later stages can
//! still reason about it) or left out of the model (when the dialect cannot
//! express it at all).

use crate::ddl::{
    CheckConstraint, Column, Ddl, ForeignKey, Index, PrimaryKey, Schema, Table, UniqueConstraint,
    View,
};
use crate::diff::split_table;
use crate::error::{SchemaError, SchemaErrors};
use crate::grammar::{Capabilities, Naming, for_dialect};
use crate::interim::{InterimKeyConstraint, InterimSnapshot};
use crate::traits::{EntityKey, EntityKind};
use crate::utils::mentions_identifier;
use driftless_types::{ColumnType, Dialect};
use std::collections::{BTreeMap, BTreeSet};

/// Build a model from `snapshot`, collecting every structural problem
pub fn normalize(snapshot: &InterimSnapshot, dialect: Dialect) -> (Ddl, Vec<SchemaError>) {
    let grammar = for_dialect(dialect);
    let mut n = Normalizer {
        dialect,
        caps: grammar.capabilities(),
        naming: grammar.naming(),
        ddl: Ddl::new(dialect),
        errors: Vec::new(),
        missing_schemas: BTreeSet::new(),
        constraint_names: BTreeSet::new(),
    };

    if let Some(found) = snapshot.dialect
        && found != dialect
    {
        n.errors.push(SchemaError::DialectMismatch {
            expected: dialect,
            found,
        });
    }

    n.schemas(snapshot);
    n.tables(snapshot);
    n.columns(snapshot);
    n.primary_keys(snapshot);
    n.uniques(snapshot);
    n.checks(snapshot);
    n.indexes(snapshot);
    n.foreign_keys(snapshot);
    n.views(snapshot);

    tracing::debug!(
        dialect = %dialect,
        entities = n.ddl.entity_count(),
        errors = n.errors.len(),
        "snapshot normalized"
    );
    (n.ddl, n.errors)
}

impl Ddl {
    /// Normalize `snapshot`, failing when it has any structural problem
    pub fn try_from_interim(snapshot: &InterimSnapshot, dialect: Dialect) -> Result<Ddl, SchemaErrors> {
        let (ddl, errors) = normalize(snapshot, dialect);
        if errors.is_empty() {
            Ok(ddl)
        } else {
            Err(SchemaErrors(errors))
        }
    }
}

struct Normalizer {
    dialect: Dialect,
    caps: &'static Capabilities,
    naming: &'static Naming,
    ddl: Ddl,
    errors: Vec<SchemaError>,
    missing_schemas: BTreeSet<String>,
    /// (table, name) of every constraint and index seen so far
    constraint_names: BTreeSet<(EntityKey, String)>,
}

impl Normalizer {
    /// Resolve an entity's namespace; `None` drops the entity
    fn schema(&mut self, schema: Option<&str>, entity: &str) -> Option<String> {
        let default = self.dialect.default_namespace();
        let schema = match schema {
            None | Some("") => return Some(default.to_string()),
            Some(s) => s,
        };
        if schema == default {
            return Some(default.to_string());
        }
        if !self.caps.namespaces {
            self.errors.push(SchemaError::UnsupportedFeature {
                dialect: self.dialect,
                feature: "namespaces",
                entity: format!("{}.{}", schema, entity),
            });
            return None;
        }
        if !self.ddl.schemas.contains(&EntityKey::simple(schema))
            && self.missing_schemas.insert(schema.to_string())
        {
            self.errors.push(SchemaError::MissingSchema(schema.to_string()));
        }
        Some(schema.to_string())
    }

    fn schemas(&mut self, snapshot: &InterimSnapshot) {
        for s in &snapshot.schemas {
            if s.name.is_empty() || s.name == self.dialect.default_namespace() {
                continue;
            }
            if !self.caps.namespaces {
                self.errors.push(SchemaError::UnsupportedFeature {
                    dialect: self.dialect,
                    feature: "namespaces",
                    entity: s.name.clone(),
                });
                continue;
            }
            if !self.ddl.schemas.push(Schema {
                name: s.name.clone(),
            }) {
                self.errors.push(SchemaError::DuplicateSchema(s.name.clone()));
            }
        }
    }

    fn tables(&mut self, snapshot: &InterimSnapshot) {
        for t in &snapshot.tables {
            let Some(schema) = self.schema(t.schema.as_deref(), &t.name) else {
                continue;
            };
            let table = Table {
                schema,
                name: t.name.clone(),
                is_existing: t.is_existing,
            };
            let key = EntityKey::table(&table.schema, &table.name);
            if !self.ddl.tables.push(table) {
                self.errors.push(SchemaError::DuplicateTable(key.qualified()));
            }
        }
    }

    /// Key of the table a child refers to, reporting it when absent
    fn owner(
        &mut self,
        schema: Option<&str>,
        table: &str,
        kind: EntityKind,
        name: &str,
    ) -> Option<EntityKey> {
        let schema = self.schema(schema, table)?;
        let key = EntityKey::table(&schema, table);
        if self.ddl.tables.contains(&key) {
            Some(key)
        } else {
            self.errors.push(SchemaError::MissingTable {
                kind,
                name: name.to_string(),
                table: key.qualified(),
            });
            None
        }
    }

    fn columns(&mut self, snapshot: &InterimSnapshot) {
        let mut positions: BTreeMap<EntityKey, usize> = BTreeMap::new();
        for c in &snapshot.columns {
            let Some(table) = self.owner(c.schema.as_deref(), &c.table, EntityKind::Column, &c.name)
            else {
                continue;
            };
            let position = positions.entry(table.clone()).or_insert(0);
            let ordinal = c.ordinal.unwrap_or(*position);
            *position += 1;

            let sql_type = match ColumnType::parse(&c.sql_type, self.dialect) {
                Ok(ty) => ty,
                Err(err) => {
                    self.errors.push(SchemaError::InvalidType {
                        column: format!("{}.{}", table.qualified(), c.name),
                        reason: err.to_string(),
                    });
                    ColumnType::Custom {
                        name: c.sql_type.clone(),
                    }
                }
            };

            let (schema, table_name) = split_table(&table);
            let column = Column {
                schema,
                table: table_name,
                name: c.name.clone(),
                sql_type,
                not_null: c.not_null,
                default: c.default.clone(),
                identity: c.identity.clone(),
                generated: c.generated.clone(),
                ordinal,
            };
            if !self.ddl.columns.push(column) {
                self.errors.push(SchemaError::DuplicateColumn {
                    table: table.qualified(),
                    column: c.name.clone(),
                });
            }
        }
    }

    /// Report columns of `table` that do not exist; false when any is missing
    fn check_columns(
        &mut self,
        kind: EntityKind,
        name: &str,
        table: &EntityKey,
        columns: &[String],
    ) -> bool {
        if columns.is_empty() {
            self.errors.push(SchemaError::EmptyColumnList {
                kind,
                name: name.to_string(),
            });
            return false;
        }
        let (schema, table_name) = split_table(table);
        let mut ok = true;
        for column in columns {
            let key = EntityKey::child(&schema, &table_name, column);
            if !self.ddl.columns.contains(&key) {
                self.errors.push(SchemaError::MissingColumn {
                    kind,
                    name: name.to_string(),
                    table: table.qualified(),
                    column: column.clone(),
                });
                ok = false;
            }
        }
        ok
    }

    /// Claim a constraint name within its table
    fn claim_name(&mut self, table: &EntityKey, name: &str) {
        if !self
            .constraint_names
            .insert((table.clone(), name.to_string()))
        {
            self.errors.push(SchemaError::DuplicateConstraint {
                table: table.qualified(),
                name: name.to_string(),
            });
        }
    }

    /// Given name or the synthesized one, and whether the name counts as
    /// explicit
    fn name(given: Option<&str>, explicit: Option<bool>, synthesized: String) -> (String, bool) {
        match given {
            Some(name) if !name.is_empty() => {
                let explicit = explicit.unwrap_or(name != synthesized);
                (name.to_string(), explicit)
            }
            _ => (synthesized, false),
        }
    }

    fn key_constraint(
        &mut self,
        c: &InterimKeyConstraint,
        kind: EntityKind,
    ) -> Option<(EntityKey, String, bool)> {
        let label = c.name.clone().unwrap_or_else(|| c.table.clone());
        let table = self.owner(c.schema.as_deref(), &c.table, kind, &label)?;
        if !self.check_columns(kind, &label, &table, &c.columns) {
            return None;
        }
        let synthesized = match kind {
            EntityKind::PrimaryKey => self.naming.primary_key(&c.table),
            _ => self.naming.unique(&c.table, &c.columns),
        };
        let (name, explicit) = Self::name(c.name.as_deref(), c.name_explicit, synthesized);
        Some((table, name, explicit))
    }

    fn primary_keys(&mut self, snapshot: &InterimSnapshot) {
        for c in &snapshot.pks {
            let Some((table, name, name_explicit)) = self.key_constraint(c, EntityKind::PrimaryKey)
            else {
                continue;
            };
            if self.ddl.pk_of(&table).is_some() {
                self.errors
                    .push(SchemaError::MultiplePrimaryKeys(table.qualified()));
                continue;
            }
            self.claim_name(&table, &name);
            let (schema, table_name) = split_table(&table);
            self.ddl.pks.push(PrimaryKey {
                schema,
                table: table_name,
                name,
                name_explicit,
                columns: c.columns.clone(),
            });
        }
    }

    fn uniques(&mut self, snapshot: &InterimSnapshot) {
        for c in &snapshot.uniques {
            let Some((table, name, name_explicit)) =
                self.key_constraint(c, EntityKind::UniqueConstraint)
            else {
                continue;
            };
            self.claim_name(&table, &name);
            let (schema, table_name) = split_table(&table);
            self.ddl.uniques.push(UniqueConstraint {
                schema,
                table: table_name,
                name,
                name_explicit,
                columns: c.columns.clone(),
            });
        }
    }

    fn checks(&mut self, snapshot: &InterimSnapshot) {
        for c in &snapshot.checks {
            let label = c.name.clone().unwrap_or_else(|| c.table.clone());
            let Some(table) =
                self.owner(c.schema.as_deref(), &c.table, EntityKind::CheckConstraint, &label)
            else {
                continue;
            };
            let synthesized = self.naming.check(&c.table, &c.value);
            let (name, name_explicit) = Self::name(c.name.as_deref(), c.name_explicit, synthesized);
            let bound = self
                .ddl
                .columns_of(&table)
                .iter()
                .any(|column| mentions_identifier(&c.value, &column.name));
            if !bound {
                self.errors.push(SchemaError::UnboundCheck {
                    table: table.qualified(),
                    name,
                });
                continue;
            }
            self.claim_name(&table, &name);
            let (schema, table_name) = split_table(&table);
            self.ddl.checks.push(CheckConstraint {
                schema,
                table: table_name,
                name,
                name_explicit,
                value: c.value.clone(),
            });
        }
    }

    fn indexes(&mut self, snapshot: &InterimSnapshot) {
        for i in &snapshot.indexes {
            let label = i.name.clone().unwrap_or_else(|| i.table.clone());
            let Some(table) = self.owner(i.schema.as_deref(), &i.table, EntityKind::Index, &label)
            else {
                continue;
            };
            if i.columns.is_empty() {
                self.errors.push(SchemaError::EmptyColumnList {
                    kind: EntityKind::Index,
                    name: label,
                });
                continue;
            }
            let plain: Vec<String> = i
                .columns
                .iter()
                .filter(|c| !c.is_expression)
                .map(|c| c.value.clone())
                .collect();
            if !plain.is_empty() && !self.check_columns(EntityKind::Index, &label, &table, &plain) {
                continue;
            }
            if i.where_clause.is_some() && !self.caps.partial_indexes {
                self.errors.push(SchemaError::UnsupportedFeature {
                    dialect: self.dialect,
                    feature: "partial indexes",
                    entity: label,
                });
                continue;
            }

            let synthesized = self.naming.index(&i.table, &i.columns);
            let (name, name_explicit) = Self::name(i.name.as_deref(), i.name_explicit, synthesized);
            self.claim_name(&table, &name);
            let (schema, table_name) = split_table(&table);
            self.ddl.indexes.push(Index {
                schema,
                table: table_name,
                name,
                name_explicit,
                columns: i.columns.clone(),
                is_unique: i.is_unique,
                where_clause: i.where_clause.clone(),
                method: i.method.clone(),
                with: i.with.clone(),
            });
        }
    }

    fn foreign_keys(&mut self, snapshot: &InterimSnapshot) {
        for f in &snapshot.fks {
            let label = f.name.clone().unwrap_or_else(|| f.table.clone());
            if !self.caps.foreign_keys {
                self.errors.push(SchemaError::UnsupportedFeature {
                    dialect: self.dialect,
                    feature: "foreign keys",
                    entity: label,
                });
                continue;
            }
            let Some(table) =
                self.owner(f.schema.as_deref(), &f.table, EntityKind::ForeignKey, &label)
            else {
                continue;
            };
            if !self.check_columns(EntityKind::ForeignKey, &label, &table, &f.columns) {
                continue;
            }

            let Some(schema_to) = self.schema(f.schema_to.as_deref(), &f.table_to) else {
                continue;
            };
            let target = EntityKey::table(&schema_to, &f.table_to);
            if !self.ddl.tables.contains(&target) {
                self.errors.push(SchemaError::MissingReferencedTable {
                    name: label,
                    table: target.qualified(),
                });
                continue;
            }
            let missing: Vec<&String> = f
                .columns_to
                .iter()
                .filter(|c| {
                    !self
                        .ddl
                        .columns
                        .contains(&EntityKey::child(&schema_to, &f.table_to, c))
                })
                .collect();
            if let Some(column) = missing.first() {
                self.errors.push(SchemaError::MissingReferencedColumn {
                    name: label,
                    table: target.qualified(),
                    column: (*column).clone(),
                });
                continue;
            }
            if f.columns.len() != f.columns_to.len() {
                self.errors.push(SchemaError::ForeignKeyArity {
                    name: label,
                    from: f.columns.len(),
                    to: f.columns_to.len(),
                });
                continue;
            }

            let synthesized =
                self.naming
                    .foreign_key(&f.table, &f.columns, &f.table_to, &f.columns_to);
            let (name, name_explicit) = Self::name(f.name.as_deref(), f.name_explicit, synthesized);
            self.claim_name(&table, &name);
            let (schema, table_name) = split_table(&table);
            self.ddl.fks.push(ForeignKey {
                schema,
                table: table_name,
                name,
                name_explicit,
                columns: f.columns.clone(),
                schema_to,
                table_to: f.table_to.clone(),
                columns_to: f.columns_to.clone(),
                on_update: f.on_update.unwrap_or_default(),
                on_delete: f.on_delete.unwrap_or_default(),
            });
        }
    }

    fn views(&mut self, snapshot: &InterimSnapshot) {
        for v in &snapshot.views {
            let Some(schema) = self.schema(v.schema.as_deref(), &v.name) else {
                continue;
            };
            let key = EntityKey::table(&schema, &v.name);
            if !v.is_existing && v.definition.as_deref().is_none_or(|d| d.trim().is_empty()) {
                self.errors
                    .push(SchemaError::MissingViewDefinition(key.qualified()));
            }
            let clashes = self.ddl.tables.contains(&key);
            let view = View {
                schema,
                name: v.name.clone(),
                columns: v.columns.clone(),
                definition: v.definition.clone(),
                is_existing: v.is_existing,
                options: v.options.clone(),
            };
            if clashes || !self.ddl.views.push(view) {
                self.errors.push(SchemaError::DuplicateView(key.qualified()));
            }
        }
    }
}
