//! Core traits for entity identity
//!
//! - `Entity` - Trait for DDL entities with const KIND
//! - `EntityKind` - Enum replacing string entity_type discrimination
//! - `EntityKey` - Composite name tuple identifying an entity within a model

use std::fmt;

// =============================================================================
// Entity System
// =============================================================================

/// Entity kind discriminator enum.
///
/// Declaration order puts containers before their contents: a namespace
/// rename is settled before table renames, which are settled before anything
/// scoped to a table. Views are resolved after columns so their definitions
/// can follow column renames.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EntityKind {
    Schema = 0,
    Table = 10,
    View = 11,
    Column = 20,
    PrimaryKey = 21,
    UniqueConstraint = 22,
    CheckConstraint = 23,
    Index = 24,
    ForeignKey = 25,
}

impl EntityKind {
    /// Get the string representation used by the interim snapshot format
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schemas",
            Self::Table => "tables",
            Self::View => "views",
            Self::Column => "columns",
            Self::PrimaryKey => "pks",
            Self::UniqueConstraint => "uniques",
            Self::CheckConstraint => "checks",
            Self::Index => "indexes",
            Self::ForeignKey => "fks",
        }
    }

    /// Singular, human readable label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Table => "table",
            Self::View => "view",
            Self::Column => "column",
            Self::PrimaryKey => "primary key",
            Self::UniqueConstraint => "unique constraint",
            Self::CheckConstraint => "check constraint",
            Self::Index => "index",
            Self::ForeignKey => "foreign key",
        }
    }

    /// Parse from string (interim snapshot list names)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "schemas" => Some(Self::Schema),
            "tables" => Some(Self::Table),
            "views" => Some(Self::View),
            "columns" => Some(Self::Column),
            "pks" => Some(Self::PrimaryKey),
            "uniques" => Some(Self::UniqueConstraint),
            "checks" => Some(Self::CheckConstraint),
            "indexes" => Some(Self::Index),
            "fks" => Some(Self::ForeignKey),
            _ => None,
        }
    }

    /// Whether entities of this kind live inside a table
    pub const fn is_table_scoped(self) -> bool {
        !matches!(self, Self::Schema | Self::Table | Self::View)
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Entity key types for unique identification
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    /// Simple name (schema name)
    Simple(String),
    /// Two-part key (schema.table, schema.view)
    Composite2(String, String),
    /// Three-part key (schema.table.child)
    Composite3(String, String, String),
}

impl EntityKey {
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    pub fn composite2(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::Composite2(a.into(), b.into())
    }

    pub fn composite3(a: impl Into<String>, b: impl Into<String>, c: impl Into<String>) -> Self {
        Self::Composite3(a.into(), b.into(), c.into())
    }

    /// Key of a table or view
    pub fn table(schema: &str, name: &str) -> Self {
        Self::composite2(schema, name)
    }

    /// Key of an entity living inside a table
    pub fn child(schema: &str, table: &str, name: &str) -> Self {
        Self::composite3(schema, table, name)
    }

    /// All parts of the key, outermost first
    pub fn parts(&self) -> Vec<&str> {
        match self {
            Self::Simple(a) => vec![a],
            Self::Composite2(a, b) => vec![a, b],
            Self::Composite3(a, b, c) => vec![a, b, c],
        }
    }

    /// The last part of the key
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(a) | Self::Composite2(_, a) | Self::Composite3(_, _, a) => a,
        }
    }

    /// Dot-joined key, skipping empty parts (the MySQL default namespace is `""`)
    pub fn qualified(&self) -> String {
        self.parts()
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// Trait for DDL entities.
///
/// All DDL entity types (Table, Column, Index, etc.) implement this trait.
/// The `KIND` constant enables compile-time entity type discrimination.
pub trait Entity: Clone + PartialEq {
    /// The entity kind (discriminator)
    const KIND: EntityKind;

    /// Get the unique key for this entity
    fn key(&self) -> EntityKey;

    /// Get the parent entity key (if this entity belongs to a parent)
    fn parent_key(&self) -> Option<EntityKey> {
        None
    }

    /// The entity's own name
    fn name(&self) -> &str;
}

// =============================================================================
// Diff Type
// =============================================================================

/// Diff operation type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffType {
    Create,
    Drop,
    Alter,
    Rename,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Drop => "drop",
            Self::Alter => "alter",
            Self::Rename => "rename",
        })
    }
}
