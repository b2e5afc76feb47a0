//! Interim snapshot: the loosely-structured input contract
//!
//! Introspection readers and declarative extractors both produce this shape.
//! Names may be missing, types are plain strings and nothing is validated
//! yet; [`crate::normalize`] turns it into a [`Ddl`].

use crate::ddl::{
    ColumnDefault, Ddl, Generated, Identity, IndexColumn, ReferentialAction,
};
use crate::error::SnapshotError;
use driftless_types::Dialect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimSchema {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_existing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<usize>,
}

/// Primary key or unique constraint over a column list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimKeyConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_explicit: Option<bool>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_explicit: Option<bool>,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_explicit: Option<bool>,
    pub columns: Vec<IndexColumn>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_unique: bool,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimForeignKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_explicit: Option<bool>,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_to: Option<String>,
    pub table_to: String,
    pub columns_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ReferentialAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferentialAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_existing: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A whole interim snapshot: flat lists per entity kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterimSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,
    #[serde(default)]
    pub schemas: Vec<InterimSchema>,
    #[serde(default)]
    pub tables: Vec<InterimTable>,
    #[serde(default)]
    pub columns: Vec<InterimColumn>,
    #[serde(default)]
    pub pks: Vec<InterimKeyConstraint>,
    #[serde(default)]
    pub uniques: Vec<InterimKeyConstraint>,
    #[serde(default)]
    pub checks: Vec<InterimCheck>,
    #[serde(default)]
    pub indexes: Vec<InterimIndex>,
    #[serde(default)]
    pub fks: Vec<InterimForeignKey>,
    #[serde(default)]
    pub views: Vec<InterimView>,
}

impl InterimSnapshot {
    /// An empty snapshot tagged with `dialect`
    pub fn empty(dialect: Dialect) -> Self {
        Self {
            dialect: Some(dialect),
            ..Default::default()
        }
    }

    /// Parse a snapshot from JSON text
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append every entity of `other` to this snapshot
    pub fn merge(&mut self, other: InterimSnapshot) -> Result<(), SnapshotError> {
        match (self.dialect, other.dialect) {
            (Some(a), Some(b)) if a != b => return Err(SnapshotError::MixedDialects(a, b)),
            (None, Some(b)) => self.dialect = Some(b),
            _ => {}
        }
        self.schemas.extend(other.schemas);
        self.tables.extend(other.tables);
        self.columns.extend(other.columns);
        self.pks.extend(other.pks);
        self.uniques.extend(other.uniques);
        self.checks.extend(other.checks);
        self.indexes.extend(other.indexes);
        self.fks.extend(other.fks);
        self.views.extend(other.views);
        Ok(())
    }

    /// Whether the snapshot declares nothing at all
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.tables.is_empty()
            && self.columns.is_empty()
            && self.views.is_empty()
    }

    /// Rebuild an interim snapshot from a model, with every name explicit
    /// in the output and every type in the dialect's rendering
    pub fn from_ddl(ddl: &Ddl) -> Self {
        let dialect = ddl.dialect();
        let schema = |s: &str| Some(s.to_string());

        Self {
            dialect: Some(dialect),
            schemas: ddl
                .schemas()
                .sorted()
                .into_iter()
                .map(|s| InterimSchema {
                    name: s.name.clone(),
                })
                .collect(),
            tables: ddl
                .tables()
                .sorted()
                .into_iter()
                .map(|t| InterimTable {
                    schema: schema(&t.schema),
                    name: t.name.clone(),
                    is_existing: t.is_existing,
                })
                .collect(),
            columns: ddl
                .columns()
                .sorted()
                .into_iter()
                .map(|c| InterimColumn {
                    schema: schema(&c.schema),
                    table: c.table.clone(),
                    name: c.name.clone(),
                    sql_type: c.sql_type.to_sql(dialect),
                    not_null: c.not_null,
                    default: c.default.clone(),
                    identity: c.identity.clone(),
                    generated: c.generated.clone(),
                    ordinal: Some(c.ordinal),
                })
                .collect(),
            pks: ddl
                .pks()
                .sorted()
                .into_iter()
                .map(|pk| InterimKeyConstraint {
                    schema: schema(&pk.schema),
                    table: pk.table.clone(),
                    name: Some(pk.name.clone()),
                    name_explicit: Some(pk.name_explicit),
                    columns: pk.columns.clone(),
                })
                .collect(),
            uniques: ddl
                .uniques()
                .sorted()
                .into_iter()
                .map(|u| InterimKeyConstraint {
                    schema: schema(&u.schema),
                    table: u.table.clone(),
                    name: Some(u.name.clone()),
                    name_explicit: Some(u.name_explicit),
                    columns: u.columns.clone(),
                })
                .collect(),
            checks: ddl
                .checks()
                .sorted()
                .into_iter()
                .map(|c| InterimCheck {
                    schema: schema(&c.schema),
                    table: c.table.clone(),
                    name: Some(c.name.clone()),
                    name_explicit: Some(c.name_explicit),
                    value: c.value.clone(),
                })
                .collect(),
            indexes: ddl
                .indexes()
                .sorted()
                .into_iter()
                .map(|i| InterimIndex {
                    schema: schema(&i.schema),
                    table: i.table.clone(),
                    name: Some(i.name.clone()),
                    name_explicit: Some(i.name_explicit),
                    columns: i.columns.clone(),
                    is_unique: i.is_unique,
                    where_clause: i.where_clause.clone(),
                    method: i.method.clone(),
                    with: i.with.clone(),
                })
                .collect(),
            fks: ddl
                .fks()
                .sorted()
                .into_iter()
                .map(|fk| InterimForeignKey {
                    schema: schema(&fk.schema),
                    table: fk.table.clone(),
                    name: Some(fk.name.clone()),
                    name_explicit: Some(fk.name_explicit),
                    columns: fk.columns.clone(),
                    schema_to: schema(&fk.schema_to),
                    table_to: fk.table_to.clone(),
                    columns_to: fk.columns_to.clone(),
                    on_update: Some(fk.on_update),
                    on_delete: Some(fk.on_delete),
                })
                .collect(),
            views: ddl
                .views()
                .sorted()
                .into_iter()
                .map(|v| InterimView {
                    schema: schema(&v.schema),
                    name: v.name.clone(),
                    columns: v.columns.clone(),
                    definition: v.definition.clone(),
                    is_existing: v.is_existing,
                    options: v.options.clone(),
                })
                .collect(),
        }
    }
}
