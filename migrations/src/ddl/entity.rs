//! Canonical DDL entity types
//!
//! These are the validated forms produced by the normalizer. Names are
//! always present (synthesized when the snapshot omitted them) and column
//! types are parsed.

use crate::traits::{Entity, EntityKey, EntityKind};
use driftless_types::ColumnType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Schema
// =============================================================================

/// Namespace entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
}

impl Entity for Schema {
    const KIND: EntityKind = EntityKind::Schema;

    fn key(&self) -> EntityKey {
        EntityKey::simple(&self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Table
// =============================================================================

/// Table entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub schema: String,
    pub name: String,
    /// Declared for reference only; never created, altered or dropped
    #[serde(default)]
    pub is_existing: bool,
}

impl Entity for Table {
    const KIND: EntityKind = EntityKind::Table;

    fn key(&self) -> EntityKey {
        EntityKey::table(&self.schema, &self.name)
    }

    fn parent_key(&self) -> Option<EntityKey> {
        Some(EntityKey::simple(&self.schema))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Column
// =============================================================================

/// How a default value should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultKind {
    /// A literal value, quoted unless numeric or boolean
    Literal,
    /// A SQL expression written verbatim
    Expression,
    /// Could not be classified by introspection; written verbatim
    Unknown,
}

/// Column default value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDefault {
    pub kind: DefaultKind,
    pub value: String,
}

impl ColumnDefault {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: DefaultKind::Literal,
            value: value.into(),
        }
    }

    pub fn expression(value: impl Into<String>) -> Self {
        Self {
            kind: DefaultKind::Expression,
            value: value.into(),
        }
    }
}

impl fmt::Display for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DefaultKind::Literal => write!(f, "'{}'", self.value),
            DefaultKind::Expression | DefaultKind::Unknown => write!(f, "({})", self.value),
        }
    }
}

/// Identity generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityKind {
    Always,
    ByDefault,
}

/// Identity / auto-increment specification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "type")]
    pub kind: IdentityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_with: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,
    #[serde(default)]
    pub cycle: bool,
}

impl Identity {
    pub fn new(kind: IdentityKind) -> Self {
        Self {
            kind,
            start_with: None,
            increment: None,
            min_value: None,
            max_value: None,
            cache: None,
            cycle: false,
        }
    }
}

/// Generated column storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneratedKind {
    Stored,
    Virtual,
}

/// Generated column specification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Generated {
    #[serde(rename = "as")]
    pub expression: String,
    #[serde(rename = "type")]
    pub kind: GeneratedKind,
}

/// Column entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub schema: String,
    pub table: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: ColumnType,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<Generated>,
    /// Position within the table; irrelevant for equality
    #[serde(default)]
    pub ordinal: usize,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
            && self.table == other.table
            && self.name == other.name
            && self.sql_type == other.sql_type
            && self.not_null == other.not_null
            && self.default == other.default
            && self.identity == other.identity
            && self.generated == other.generated
    }
}

impl Column {
    /// A nullable column with no default, identity or generation
    pub fn new(schema: &str, table: &str, name: &str, sql_type: ColumnType) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
            sql_type,
            not_null: false,
            default: None,
            identity: None,
            generated: None,
            ordinal: 0,
        }
    }

    pub fn table_key(&self) -> EntityKey {
        EntityKey::table(&self.schema, &self.table)
    }
}

impl Entity for Column {
    const KIND: EntityKind = EntityKind::Column;

    fn key(&self) -> EntityKey {
        EntityKey::child(&self.schema, &self.table, &self.name)
    }

    fn parent_key(&self) -> Option<EntityKey> {
        Some(self.table_key())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Constraints
// =============================================================================

/// Primary key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<String>,
}

/// Unique constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueConstraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<String>,
}

/// Check constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckConstraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub value: String,
}

/// One entry of an index column list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    /// Column name, or expression text when `is_expression`
    pub value: String,
    #[serde(default)]
    pub is_expression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opclass: Option<String>,
    #[serde(default = "default_true")]
    pub asc: bool,
    #[serde(default)]
    pub nulls_first: bool,
}

fn default_true() -> bool {
    true
}

impl IndexColumn {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            value: name.into(),
            is_expression: false,
            opclass: None,
            asc: true,
            nulls_first: false,
        }
    }

    pub fn expression(expr: impl Into<String>) -> Self {
        Self {
            value: expr.into(),
            is_expression: true,
            opclass: None,
            asc: true,
            nulls_first: false,
        }
    }
}

/// Index entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<IndexColumn>,
    #[serde(default)]
    pub is_unique: bool,
    /// Partial index predicate
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Storage parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: BTreeMap<String, String>,
}

impl Index {
    /// Plain column names referenced by this index
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !c.is_expression)
            .map(|c| c.value.as_str())
    }
}

/// Referential action on update/delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "no action" | "noaction" => Some(Self::NoAction),
            "restrict" => Some(Self::Restrict),
            "cascade" => Some(Self::Cascade),
            "set null" | "setnull" => Some(Self::SetNull),
            "set default" | "setdefault" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

impl TryFrom<String> for ReferentialAction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown referential action '{}'", value))
    }
}

impl From<ReferentialAction> for String {
    fn from(value: ReferentialAction) -> Self {
        value.as_sql().to_ascii_lowercase()
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub name_explicit: bool,
    pub columns: Vec<String>,
    pub schema_to: String,
    pub table_to: String,
    pub columns_to: Vec<String>,
    #[serde(default)]
    pub on_update: ReferentialAction,
    #[serde(default)]
    pub on_delete: ReferentialAction,
}

impl ForeignKey {
    pub fn target_key(&self) -> EntityKey {
        EntityKey::table(&self.schema_to, &self.table_to)
    }
}

macro_rules! table_child_entity {
    ($ty:ty, $kind:expr) => {
        impl $ty {
            pub fn table_key(&self) -> EntityKey {
                EntityKey::table(&self.schema, &self.table)
            }
        }

        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> EntityKey {
                EntityKey::child(&self.schema, &self.table, &self.name)
            }

            fn parent_key(&self) -> Option<EntityKey> {
                Some(self.table_key())
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

table_child_entity!(PrimaryKey, EntityKind::PrimaryKey);
table_child_entity!(UniqueConstraint, EntityKind::UniqueConstraint);
table_child_entity!(CheckConstraint, EntityKind::CheckConstraint);
table_child_entity!(Index, EntityKind::Index);
table_child_entity!(ForeignKey, EntityKind::ForeignKey);

// =============================================================================
// View
// =============================================================================

/// View entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub schema: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub is_existing: bool,
    /// Dialect-specific options (`checkOption`, `encryption`, `schemaBinding`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl Entity for View {
    const KIND: EntityKind = EntityKind::View;

    fn key(&self) -> EntityKey {
        EntityKey::table(&self.schema, &self.name)
    }

    fn parent_key(&self) -> Option<EntityKey> {
        Some(EntityKey::simple(&self.schema))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Entity Enum
// =============================================================================

/// Any DDL entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "camelCase")]
pub enum DdlEntity {
    Schema(Schema),
    Table(Table),
    Column(Column),
    PrimaryKey(PrimaryKey),
    UniqueConstraint(UniqueConstraint),
    CheckConstraint(CheckConstraint),
    Index(Index),
    ForeignKey(ForeignKey),
    View(View),
}

impl DdlEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Schema(_) => EntityKind::Schema,
            Self::Table(_) => EntityKind::Table,
            Self::Column(_) => EntityKind::Column,
            Self::PrimaryKey(_) => EntityKind::PrimaryKey,
            Self::UniqueConstraint(_) => EntityKind::UniqueConstraint,
            Self::CheckConstraint(_) => EntityKind::CheckConstraint,
            Self::Index(_) => EntityKind::Index,
            Self::ForeignKey(_) => EntityKind::ForeignKey,
            Self::View(_) => EntityKind::View,
        }
    }

    pub fn key(&self) -> EntityKey {
        match self {
            Self::Schema(e) => e.key(),
            Self::Table(e) => e.key(),
            Self::Column(e) => e.key(),
            Self::PrimaryKey(e) => e.key(),
            Self::UniqueConstraint(e) => e.key(),
            Self::CheckConstraint(e) => e.key(),
            Self::Index(e) => e.key(),
            Self::ForeignKey(e) => e.key(),
            Self::View(e) => e.key(),
        }
    }

    /// Key of the containing entity
    pub fn parent_key(&self) -> Option<EntityKey> {
        match self {
            Self::Schema(e) => e.parent_key(),
            Self::Table(e) => e.parent_key(),
            Self::Column(e) => e.parent_key(),
            Self::PrimaryKey(e) => e.parent_key(),
            Self::UniqueConstraint(e) => e.parent_key(),
            Self::CheckConstraint(e) => e.parent_key(),
            Self::Index(e) => e.parent_key(),
            Self::ForeignKey(e) => e.parent_key(),
            Self::View(e) => e.parent_key(),
        }
    }

    /// The same entity under another name
    pub fn with_name(mut self, name: &str) -> Self {
        let slot = match &mut self {
            Self::Schema(e) => &mut e.name,
            Self::Table(e) => &mut e.name,
            Self::Column(e) => &mut e.name,
            Self::PrimaryKey(e) => &mut e.name,
            Self::UniqueConstraint(e) => &mut e.name,
            Self::CheckConstraint(e) => &mut e.name,
            Self::Index(e) => &mut e.name,
            Self::ForeignKey(e) => &mut e.name,
            Self::View(e) => &mut e.name,
        };
        *slot = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Schema(e) => e.name(),
            Self::Table(e) => e.name(),
            Self::Column(e) => e.name(),
            Self::PrimaryKey(e) => e.name(),
            Self::UniqueConstraint(e) => e.name(),
            Self::CheckConstraint(e) => e.name(),
            Self::Index(e) => e.name(),
            Self::ForeignKey(e) => e.name(),
            Self::View(e) => e.name(),
        }
    }
}

macro_rules! impl_from_entity {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for DdlEntity {
                fn from(e: $variant) -> Self {
                    DdlEntity::$variant(e)
                }
            }
        )*
    };
}

impl_from_entity!(
    Schema,
    Table,
    Column,
    PrimaryKey,
    UniqueConstraint,
    CheckConstraint,
    Index,
    ForeignKey,
    View
);

macro_rules! impl_as_entity {
    ($($method:ident => $variant:ident),*) => {
        impl DdlEntity {
            $(
                pub fn $method(&self) -> Option<&$variant> {
                    match self {
                        DdlEntity::$variant(e) => Some(e),
                        _ => None,
                    }
                }
            )*
        }
    };
}

impl_as_entity!(
    as_schema => Schema,
    as_table => Table,
    as_column => Column,
    as_primary_key => PrimaryKey,
    as_unique => UniqueConstraint,
    as_check => CheckConstraint,
    as_index => Index,
    as_foreign_key => ForeignKey,
    as_view => View
);
