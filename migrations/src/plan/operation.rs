//! Abstract, dialect-agnostic DDL operations
//!
//! The planner emits these in execution order; a grammar renders each one
//! into one or more SQL statements.

use crate::ddl::{
    CheckConstraint, Column, ColumnDefault, ForeignKey, Index, PrimaryKey, TableDef,
    UniqueConstraint, View,
};
use crate::traits::EntityKey;
use driftless_types::ColumnType;
use serde::{Deserialize, Serialize};

/// Kind of a named table constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    Check,
    ForeignKey,
    /// MSSQL named default constraint
    Default,
}

/// A table constraint carried by add/drop operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    PrimaryKey(PrimaryKey),
    Unique(UniqueConstraint),
    Check(CheckConstraint),
    ForeignKey(ForeignKey),
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Self::PrimaryKey(_) => ConstraintKind::PrimaryKey,
            Self::Unique(_) => ConstraintKind::Unique,
            Self::Check(_) => ConstraintKind::Check,
            Self::ForeignKey(_) => ConstraintKind::ForeignKey,
        }
    }

    pub fn schema(&self) -> &str {
        match self {
            Self::PrimaryKey(c) => &c.schema,
            Self::Unique(c) => &c.schema,
            Self::Check(c) => &c.schema,
            Self::ForeignKey(c) => &c.schema,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::PrimaryKey(c) => &c.table,
            Self::Unique(c) => &c.table,
            Self::Check(c) => &c.table,
            Self::ForeignKey(c) => &c.table,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::PrimaryKey(c) => &c.name,
            Self::Unique(c) => &c.name,
            Self::Check(c) => &c.name,
            Self::ForeignKey(c) => &c.name,
        }
    }

    /// Source columns (empty for checks, which reference columns by expression)
    pub fn columns(&self) -> &[String] {
        match self {
            Self::PrimaryKey(c) => &c.columns,
            Self::Unique(c) => &c.columns,
            Self::Check(_) => &[],
            Self::ForeignKey(c) => &c.columns,
        }
    }

    pub fn table_key(&self) -> EntityKey {
        EntityKey::table(self.schema(), self.table())
    }
}

/// One change applied by an in-place `AlterColumn`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ColumnAlteration {
    SetType { from: ColumnType, to: ColumnType },
    SetNotNull,
    DropNotNull,
    SetDefault { default: ColumnDefault },
    DropDefault,
}

/// Abstract DDL operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },
    RenameSchema {
        from: String,
        to: String,
    },
    CreateTable {
        table: TableDef,
    },
    DropTable {
        schema: String,
        name: String,
    },
    RenameTable {
        schema: String,
        from: String,
        to: String,
    },
    /// Transfer a table into another namespace
    MoveTable {
        name: String,
        from_schema: String,
        to_schema: String,
    },
    /// Rebuild a table under a temporary name and copy its rows across
    RecreateTable {
        from: TableDef,
        to: TableDef,
    },
    AddColumn {
        column: Column,
    },
    DropColumn {
        column: Column,
    },
    RenameColumn {
        schema: String,
        table: String,
        from: String,
        to: String,
    },
    AlterColumn {
        /// Target definition
        column: Column,
        /// Definition currently in the database
        from: Column,
        changes: Vec<ColumnAlteration>,
    },
    /// Copy every row's value from a shadow column into its replacement
    CopyColumnData {
        schema: String,
        table: String,
        from: String,
        from_type: ColumnType,
        to: Column,
    },
    AddConstraint {
        constraint: Constraint,
    },
    DropConstraint {
        constraint: Constraint,
    },
    RenameConstraint {
        schema: String,
        table: String,
        kind: ConstraintKind,
        from: String,
        to: String,
    },
    CreateIndex {
        index: Index,
    },
    DropIndex {
        index: Index,
    },
    RenameIndex {
        schema: String,
        table: String,
        from: String,
        to: String,
    },
    CreateView {
        view: View,
    },
    DropView {
        view: View,
    },
    RenameView {
        schema: String,
        from: String,
        to: String,
    },
    MoveView {
        name: String,
        from_schema: String,
        to_schema: String,
    },
}

impl Operation {
    /// Get the type name of this operation
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::CreateSchema { .. } => "create_schema",
            Self::DropSchema { .. } => "drop_schema",
            Self::RenameSchema { .. } => "rename_schema",
            Self::CreateTable { .. } => "create_table",
            Self::DropTable { .. } => "drop_table",
            Self::RenameTable { .. } => "rename_table",
            Self::MoveTable { .. } => "move_table",
            Self::RecreateTable { .. } => "recreate_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::AlterColumn { .. } => "alter_column",
            Self::CopyColumnData { .. } => "copy_column_data",
            Self::AddConstraint { .. } => "add_constraint",
            Self::DropConstraint { .. } => "drop_constraint",
            Self::RenameConstraint { .. } => "rename_constraint",
            Self::CreateIndex { .. } => "create_index",
            Self::DropIndex { .. } => "drop_index",
            Self::RenameIndex { .. } => "rename_index",
            Self::CreateView { .. } => "create_view",
            Self::DropView { .. } => "drop_view",
            Self::RenameView { .. } => "rename_view",
            Self::MoveView { .. } => "move_view",
        }
    }

    /// The table this operation touches, keyed by the name it has when the
    /// operation runs
    pub fn table_key(&self) -> Option<EntityKey> {
        match self {
            Self::CreateTable { table } => Some(table.key()),
            Self::DropTable { schema, name } => Some(EntityKey::table(schema, name)),
            Self::RenameTable { schema, from, .. } => Some(EntityKey::table(schema, from)),
            Self::MoveTable {
                name, from_schema, ..
            } => Some(EntityKey::table(from_schema, name)),
            Self::RecreateTable { to, .. } => Some(to.key()),
            Self::AddColumn { column } | Self::DropColumn { column } => Some(column.table_key()),
            Self::AlterColumn { column, .. } => Some(column.table_key()),
            Self::RenameColumn { schema, table, .. }
            | Self::CopyColumnData { schema, table, .. }
            | Self::RenameConstraint { schema, table, .. }
            | Self::RenameIndex { schema, table, .. } => Some(EntityKey::table(schema, table)),
            Self::AddConstraint { constraint } | Self::DropConstraint { constraint } => {
                Some(constraint.table_key())
            }
            Self::CreateIndex { index } | Self::DropIndex { index } => Some(index.table_key()),
            _ => None,
        }
    }

    /// Whether the operation removes an entity outright
    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            Self::DropSchema { .. }
                | Self::DropTable { .. }
                | Self::DropColumn { .. }
                | Self::DropConstraint { .. }
                | Self::DropIndex { .. }
                | Self::DropView { .. }
        )
    }
}
