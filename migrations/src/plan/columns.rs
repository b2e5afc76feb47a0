//! Column change strategies
//!
//! A changed column is either altered in place, replaced through a shadow
//! column, or folded into a rebuild of its table. The shadow sequence keeps
//! row data when the dialect cannot change a property in place:
//!
//! 1. rename the column to a free shadow name
//! 2. add the new definition under the original name
//! 3. copy every value across
//! 4. tighten NOT NULL once the copy has filled the column
//! 5. drop the shadow column

use super::{ColumnAlteration, Context, Operation};
use crate::ddl::{Column, DdlEntity, GeneratedKind};
use crate::grammar::AlterColumnSupport;
use crate::traits::{DiffType, EntityKind};
use crate::utils::mentions_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ColumnStrategy {
    InPlace,
    Shadow,
    RecreateTable,
}

#[derive(Debug, Clone)]
pub(super) struct ColumnPlan {
    /// The column as it stands once phase 3 renames have run
    pub from: Column,
    pub to: Column,
    pub strategy: ColumnStrategy,
    /// In-place alterations, in execution order
    pub changes: Vec<ColumnAlteration>,
}

/// Columns that a restricted `ADD COLUMN` cannot add to a populated table
pub(super) fn needs_recreate_to_add(column: &Column) -> bool {
    (column.not_null && column.default.is_none())
        || column.identity.is_some()
        || column
            .generated
            .as_ref()
            .is_some_and(|g| g.kind == GeneratedKind::Stored)
}

impl Context<'_> {
    pub(super) fn plan_columns(&mut self) {
        let mut plans = Vec::new();
        for d in self.diff.of_kind(EntityKind::Column) {
            let changed = match d.diff_type {
                DiffType::Alter => true,
                DiffType::Rename => !d.changes.is_empty(),
                DiffType::Create | DiffType::Drop => false,
            };
            if !changed {
                continue;
            }
            let (Some(left), Some(to)) = (
                d.left.as_ref().and_then(DdlEntity::as_column),
                d.right.as_ref().and_then(DdlEntity::as_column),
            ) else {
                continue;
            };
            if !self.common.contains_key(&to.table_key()) {
                continue;
            }

            let from = self.projection.column(left);
            let strategy = self.column_strategy(&from, to);
            let changes = if strategy == ColumnStrategy::InPlace {
                in_place_changes(&from, to)
            } else {
                Vec::new()
            };
            plans.push(ColumnPlan {
                from,
                to: to.clone(),
                strategy,
                changes,
            });
        }
        self.column_plans = plans;
    }

    fn column_strategy(&self, from: &Column, to: &Column) -> ColumnStrategy {
        let type_changed = from.sql_type != to.sql_type;
        let special_changed = from.identity != to.identity || from.generated != to.generated;

        match self.caps.alter_column {
            AlterColumnSupport::InPlace { type_change } => {
                if special_changed || (type_changed && !type_change) {
                    ColumnStrategy::Shadow
                } else {
                    ColumnStrategy::InPlace
                }
            }
            AlterColumnSupport::RecreateTable { shadow_type_change } => {
                let only_type = type_changed
                    && !special_changed
                    && from.not_null == to.not_null
                    && from.default == to.default;
                let fillable = !to.not_null || to.default.is_some();
                if shadow_type_change
                    && only_type
                    && fillable
                    && to.identity.is_none()
                    && to.generated.is_none()
                    && !self.in_table_constraint(to)
                {
                    ColumnStrategy::Shadow
                } else {
                    ColumnStrategy::RecreateTable
                }
            }
        }
    }

    /// Whether a target-side key, foreign key or check covers the column
    fn in_table_constraint(&self, column: &Column) -> bool {
        let table = column.table_key();
        let name = &column.name;
        let r = self.right;
        r.pk_of(&table).is_some_and(|pk| pk.columns.contains(name))
            || r.uniques_of(&table).iter().any(|u| u.columns.contains(name))
            || r.fks_of(&table).iter().any(|fk| fk.columns.contains(name))
            || r
                .fks_referencing(&table)
                .iter()
                .any(|fk| fk.columns_to.contains(name))
            || r
                .checks_of(&table)
                .iter()
                .any(|c| mentions_identifier(&c.value, name))
    }

    /// Replace a column through a renamed shadow; returns the drop of the
    /// shadow, which the caller places
    pub(super) fn shadow_sequence(
        &self,
        plan: &ColumnPlan,
        ops: &mut Vec<Operation>,
    ) -> Operation {
        let (from, to) = (&plan.from, &plan.to);
        let shadow = self.shadow_name(to);

        if self.caps.named_defaults && from.default.is_some() {
            let mut bare = from.clone();
            bare.default = None;
            ops.push(Operation::AlterColumn {
                column: bare,
                from: from.clone(),
                changes: vec![ColumnAlteration::DropDefault],
            });
        }

        ops.push(Operation::RenameColumn {
            schema: to.schema.clone(),
            table: to.table.clone(),
            from: to.name.clone(),
            to: shadow.clone(),
        });

        let defer_not_null = to.not_null
            && to.default.is_none()
            && to.identity.is_none()
            && to.generated.is_none();
        let mut added = to.clone();
        if defer_not_null {
            added.not_null = false;
        }
        ops.push(Operation::AddColumn {
            column: added.clone(),
        });

        if to.generated.is_none() {
            ops.push(Operation::CopyColumnData {
                schema: to.schema.clone(),
                table: to.table.clone(),
                from: shadow.clone(),
                from_type: from.sql_type.clone(),
                to: to.clone(),
            });
        }

        if defer_not_null {
            ops.push(Operation::AlterColumn {
                column: to.clone(),
                from: added,
                changes: vec![ColumnAlteration::SetNotNull],
            });
        }

        let mut old = from.clone();
        old.name = shadow;
        if self.caps.named_defaults {
            old.default = None;
        }
        Operation::DropColumn { column: old }
    }

    /// `__{column}_old`, suffixed until no column on either side has it
    fn shadow_name(&self, column: &Column) -> String {
        let table = column.table_key();
        let taken = |name: &str| {
            self.right.columns_of(&table).iter().any(|c| c.name == name)
                || self.common.get(&table).is_some_and(|origin| {
                    self.left
                        .columns_of(origin)
                        .iter()
                        .any(|c| self.projection.column_name(&table, &c.name) == name)
                })
        };

        let base = format!("__{}_old", column.name);
        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Alterations in the order they can run: a default that no longer fits
/// goes before the type changes, the new default after
fn in_place_changes(from: &Column, to: &Column) -> Vec<ColumnAlteration> {
    let mut changes = Vec::new();
    let type_changed = from.sql_type != to.sql_type;
    let default_changed = from.default != to.default;

    if from.default.is_some() && (default_changed || type_changed) {
        changes.push(ColumnAlteration::DropDefault);
    }
    if type_changed {
        changes.push(ColumnAlteration::SetType {
            from: from.sql_type.clone(),
            to: to.sql_type.clone(),
        });
    }
    if let Some(default) = &to.default
        && (default_changed || type_changed)
    {
        changes.push(ColumnAlteration::SetDefault {
            default: default.clone(),
        });
    }
    if from.not_null != to.not_null {
        changes.push(if to.not_null {
            ColumnAlteration::SetNotNull
        } else {
            ColumnAlteration::DropNotNull
        });
    }
    changes
}
