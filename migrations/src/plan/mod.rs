//! Statement planner
//!
//! Turns a [`SchemaDiff`] into abstract [`Operation`]s in execution order.
//! Planning runs in ten fixed phases:
//!
//! 1. create and rename namespaces
//! 2. drop views that are dropped, changed or sit on a table being rebuilt
//! 3. move and rename tables, columns, constraints and indexes
//! 4. drop constraints and indexes (foreign keys first)
//! 5. drop columns, then tables in reverse dependency order
//! 6. create tables in dependency order
//! 7. add and alter columns, run shadow-column sequences, recreate tables
//! 8. add constraints and indexes (foreign keys last)
//! 9. create, rename and move views in dependency order
//! 10. drop namespaces
//!
//! Within a phase, operations come out in key order so identical inputs
//! always yield identical plans.

mod columns;
mod operation;
pub mod order;

pub use operation::{ColumnAlteration, Constraint, ConstraintKind, Operation};
pub use order::TopologicalOrder;

use crate::ddl::{Ddl, DdlEntity, TableDef, View};
use crate::diff::{EntityDiff, Projection, SchemaDiff, split_table};
use crate::grammar::{Capabilities, Grammar, Naming};
use crate::traits::{DiffType, Entity, EntityKey, EntityKind};
use crate::utils::mentions_identifier;
use columns::{ColumnPlan, ColumnStrategy};
use std::collections::{BTreeMap, BTreeSet};

/// Orders the changes between two models into executable operations
pub struct Planner<'a> {
    left: &'a Ddl,
    right: &'a Ddl,
    grammar: &'a dyn Grammar,
}

impl<'a> Planner<'a> {
    pub fn new(left: &'a Ddl, right: &'a Ddl, grammar: &'a dyn Grammar) -> Self {
        Self {
            left,
            right,
            grammar,
        }
    }

    /// Plan every change in `diff`
    pub fn plan(&self, diff: &SchemaDiff) -> Vec<Operation> {
        let ctx = Context::new(self.left, self.right, self.grammar, diff);
        let mut ops = Vec::new();
        let mut start = 0;

        ctx.create_namespaces(&mut ops);
        trace_phase("create namespaces", &ops, &mut start);
        ctx.drop_views(&mut ops);
        trace_phase("drop views", &ops, &mut start);
        ctx.renames(&mut ops);
        trace_phase("renames", &ops, &mut start);
        ops.extend(ctx.children.drops.iter().cloned());
        trace_phase("drop constraints", &ops, &mut start);
        ctx.drop_columns_and_tables(&mut ops);
        trace_phase("drop columns and tables", &ops, &mut start);
        ctx.create_tables(&mut ops);
        trace_phase("create tables", &ops, &mut start);
        ctx.columns(&mut ops);
        trace_phase("columns", &ops, &mut start);
        ops.extend(ctx.children.adds.iter().cloned());
        trace_phase("add constraints", &ops, &mut start);
        ctx.views(&mut ops);
        trace_phase("views", &ops, &mut start);
        ctx.drop_namespaces(&mut ops);
        trace_phase("drop namespaces", &ops, &mut start);

        tracing::debug!(
            dialect = %self.grammar.dialect(),
            operations = ops.len(),
            recreated = ctx.recreated.len(),
            "plan complete"
        );
        ops
    }
}

fn trace_phase(phase: &str, ops: &[Operation], start: &mut usize) {
    if ops.len() > *start {
        tracing::trace!(phase, operations = ops.len() - *start, "phase planned");
    }
    *start = ops.len();
}

/// Constraint and index operations, bucketed by the phase they run in
#[derive(Debug, Default)]
struct ChildPlans {
    renames: Vec<Operation>,
    drops: Vec<Operation>,
    adds: Vec<Operation>,
}

#[derive(Debug, Default)]
struct KindPlan {
    renames: Vec<Operation>,
    drops: Vec<Operation>,
    adds: Vec<Operation>,
}

struct Context<'a> {
    left: &'a Ddl,
    right: &'a Ddl,
    caps: &'static Capabilities,
    naming: &'static Naming,
    diff: &'a SchemaDiff,
    projection: &'a Projection,
    /// Diffs that have a source side, by (kind, source key)
    by_origin: BTreeMap<(EntityKind, EntityKey), &'a EntityDiff>,
    /// Tables present on both sides: target key to source key
    common: BTreeMap<EntityKey, EntityKey>,
    created_tables: BTreeSet<EntityKey>,
    /// Source keys of dropped tables
    dropped_tables: Vec<EntityKey>,
    /// Dropped tables reference each other in a cycle
    cyclic_drops: bool,
    /// Target keys of tables rebuilt from scratch
    recreated: BTreeSet<EntityKey>,
    column_plans: Vec<ColumnPlan>,
    /// (target table, column) pairs replaced or removed in place
    affected: BTreeSet<(EntityKey, String)>,
    /// Source keys of tables whose dependent views must be rebuilt
    rebuilt_tables: BTreeSet<EntityKey>,
    /// Source keys of views dropped in phase 2
    dropped_views: BTreeSet<EntityKey>,
    /// Schemas renamed by creating the new one and moving objects across
    moved_schemas: Vec<(String, String)>,
    /// Primary key swaps that run inside a shadow sequence, by target table
    swapped_keys: BTreeMap<EntityKey, Operation>,
    children: ChildPlans,
}

impl<'a> Context<'a> {
    fn new(left: &'a Ddl, right: &'a Ddl, grammar: &'a dyn Grammar, diff: &'a SchemaDiff) -> Self {
        let by_origin = diff
            .diffs
            .iter()
            .filter_map(|d| d.from_key().map(|key| ((d.kind, key), d)))
            .collect();

        let mut ctx = Self {
            left,
            right,
            caps: grammar.capabilities(),
            naming: grammar.naming(),
            diff,
            projection: diff.projection(),
            by_origin,
            common: BTreeMap::new(),
            created_tables: BTreeSet::new(),
            dropped_tables: Vec::new(),
            cyclic_drops: false,
            recreated: BTreeSet::new(),
            column_plans: Vec::new(),
            affected: BTreeSet::new(),
            rebuilt_tables: BTreeSet::new(),
            dropped_views: BTreeSet::new(),
            moved_schemas: Vec::new(),
            swapped_keys: BTreeMap::new(),
            children: ChildPlans::default(),
        };

        ctx.collect_tables();
        ctx.plan_columns();
        ctx.collect_recreated();
        ctx.collect_affected();
        ctx.collect_dropped_views();
        ctx.plan_children();
        ctx
    }

    fn collect_tables(&mut self) {
        for d in self.diff.of(EntityKind::Table, DiffType::Create) {
            self.created_tables.insert(d.key.clone());
        }
        for d in self.diff.of(EntityKind::Table, DiffType::Drop) {
            self.dropped_tables.push(d.key.clone());
        }
        self.cyclic_drops =
            order::sort_for_drop(&self.dropped_tables, &self.left.relations()).has_circular_deps;

        for table in self.left.tables().sorted() {
            if table.is_existing {
                continue;
            }
            let target = self.projection.table(&table.key());
            if self.right.table(&target).is_some_and(|t| !t.is_existing) {
                self.common.insert(target, table.key());
            }
        }

        if !self.caps.rename_namespace {
            self.moved_schemas = self
                .diff
                .of(EntityKind::Schema, DiffType::Rename)
                .filter_map(|d| Some((d.from_key()?.name().to_string(), d.key.name().to_string())))
                .collect();
        }
    }

    fn collect_recreated(&mut self) {
        if !self.caps.recreates_tables() {
            return;
        }
        let mut recreated: BTreeSet<EntityKey> = self
            .column_plans
            .iter()
            .filter(|p| p.strategy == ColumnStrategy::RecreateTable)
            .map(|p| p.to.table_key())
            .collect();

        for kind in [
            EntityKind::PrimaryKey,
            EntityKind::UniqueConstraint,
            EntityKind::CheckConstraint,
            EntityKind::ForeignKey,
        ] {
            for d in self.diff.of_kind(kind) {
                if d.diff_type == DiffType::Rename
                    && d.changes.is_empty()
                    && self.caps.implicit_constraint_names
                {
                    continue;
                }
                let table = match d.diff_type {
                    DiffType::Drop => d
                        .left
                        .as_ref()
                        .and_then(DdlEntity::parent_key)
                        .map(|t| self.projection.table(&t)),
                    _ => d.right.as_ref().and_then(DdlEntity::parent_key),
                };
                if let Some(table) = table.filter(|t| self.common.contains_key(t)) {
                    recreated.insert(table);
                }
            }
        }

        if self.caps.restricted_add_column {
            for d in self.diff.of(EntityKind::Column, DiffType::Create) {
                if let Some(column) = d.right.as_ref().and_then(DdlEntity::as_column)
                    && self.common.contains_key(&column.table_key())
                    && columns::needs_recreate_to_add(column)
                {
                    recreated.insert(column.table_key());
                }
            }
        }

        self.recreated = recreated;
    }

    fn collect_affected(&mut self) {
        for d in self.diff.of(EntityKind::Column, DiffType::Drop) {
            if let Some(column) = d.left.as_ref().and_then(DdlEntity::as_column) {
                let live = self.projection.column(column);
                let table = live.table_key();
                if self.in_place(&table) {
                    self.affected.insert((table, live.name));
                }
            }
        }
        for plan in &self.column_plans {
            let table = plan.to.table_key();
            if plan.strategy == ColumnStrategy::Shadow && self.in_place(&table) {
                self.affected.insert((table, plan.to.name.clone()));
            }
        }

        let mut rebuilt: BTreeSet<EntityKey> = self.dropped_tables.iter().cloned().collect();
        for (target, origin) in &self.common {
            let columns_changed = self.affected.iter().any(|(t, _)| t == target)
                || self.column_plans.iter().any(|p| {
                    p.to.table_key() == *target && p.from.sql_type != p.to.sql_type
                });
            if self.recreated.contains(target) || columns_changed {
                rebuilt.insert(origin.clone());
            }
        }
        self.rebuilt_tables = rebuilt;
    }

    fn collect_dropped_views(&mut self) {
        for view in self.left.views().sorted() {
            if view.is_existing {
                continue;
            }
            let changed = match self.by_origin.get(&(EntityKind::View, view.key())) {
                Some(d) => match d.diff_type {
                    DiffType::Drop | DiffType::Alter => true,
                    DiffType::Rename => !d.changes.is_empty() || !self.can_rename_view(view, d),
                    DiffType::Create => false,
                },
                None => false,
            };
            let on_rebuilt_table = view.definition.as_deref().is_some_and(|def| {
                self.rebuilt_tables
                    .iter()
                    .any(|t| mentions_identifier(def, t.name()))
            });
            if changed || on_rebuilt_table {
                self.dropped_views.insert(view.key());
            }
        }
    }

    fn can_rename_view(&self, view: &View, d: &EntityDiff) -> bool {
        let (schema, name) = split_table(&d.key);
        let moves = self.projection.schema(&view.schema) != schema;
        let renames = view.name != name;
        (!renames || self.caps.rename_view) && (!moves || self.caps.namespaces)
    }

    /// A common table that is altered statement by statement
    fn in_place(&self, table: &EntityKey) -> bool {
        self.common.contains_key(table) && !self.recreated.contains(table)
    }

    // =========================================================================
    // Children
    // =========================================================================

    fn plan_children(&mut self) {
        let never = |_: &DdlEntity| false;

        let mut pk = self.plan_kind(
            EntityKind::PrimaryKey,
            self.left.pks().sorted().into_iter().cloned().map(Into::into).collect(),
            &never,
        );
        if self.caps.swap_primary_key {
            let replaced: BTreeSet<EntityKey> =
                pk.adds.iter().filter_map(Operation::table_key).collect();
            pk.drops
                .retain(|op| !op.table_key().is_some_and(|t| replaced.contains(&t)));

            // the old key may sit on a shadow column, which cannot be
            // dropped until the key has moved off it
            let mut swapped = BTreeMap::new();
            pk.adds.retain(|op| match op {
                Operation::AddConstraint {
                    constraint: Constraint::PrimaryKey(key),
                } if self.key_shadow(&key.table_key()).is_some() => {
                    swapped.insert(key.table_key(), op.clone());
                    false
                }
                _ => true,
            });
            self.swapped_keys = swapped;
        }
        let unique = self.plan_kind(
            EntityKind::UniqueConstraint,
            self.left.uniques().sorted().into_iter().cloned().map(Into::into).collect(),
            &never,
        );

        // keys whose constraint goes away; foreign keys on them go first
        let dropped_keys: BTreeSet<(EntityKey, Vec<String>)> = pk
            .drops
            .iter()
            .chain(&unique.drops)
            .filter_map(|op| match op {
                Operation::DropConstraint { constraint } => {
                    let mut columns = constraint.columns().to_vec();
                    columns.sort();
                    Some((constraint.table_key(), columns))
                }
                _ => None,
            })
            .collect();

        let check = self.plan_kind(
            EntityKind::CheckConstraint,
            self.left.checks().sorted().into_iter().cloned().map(Into::into).collect(),
            &never,
        );

        let mut index = self.plan_kind(
            EntityKind::Index,
            self.left.indexes().sorted().into_iter().cloned().map(Into::into).collect(),
            &never,
        );
        for table in self.created_tables.iter().chain(&self.recreated) {
            for i in self.right.indexes_of(table) {
                index.adds.push(Operation::CreateIndex { index: i.clone() });
            }
        }

        let on_dropped_key = |e: &DdlEntity| {
            e.as_foreign_key().is_some_and(|fk| {
                let mut columns = fk.columns_to.clone();
                columns.sort();
                dropped_keys.contains(&(fk.target_key(), columns))
            })
        };
        let fk = self.plan_kind(
            EntityKind::ForeignKey,
            self.left.fks().sorted().into_iter().cloned().map(Into::into).collect(),
            &on_dropped_key,
        );

        let mut plans = ChildPlans::default();
        for plan in [&pk, &unique, &check, &index, &fk] {
            plans.renames.extend(plan.renames.iter().cloned());
        }
        for plan in [&fk, &check, &unique, &pk, &index] {
            plans.drops.extend(plan.drops.iter().cloned());
        }
        for plan in [pk, unique, check, index, fk] {
            plans.adds.extend(plan.adds);
        }
        self.children = plans;
    }

    fn plan_kind(
        &self,
        kind: EntityKind,
        originals: Vec<DdlEntity>,
        also_forced: &dyn Fn(&DdlEntity) -> bool,
    ) -> KindPlan {
        let mut plan = KindPlan::default();

        for original in originals {
            let Some(source_table) = original.parent_key() else {
                continue;
            };
            let projected = self.project(&original);
            let live = projected.clone().with_name(original.name());
            let forced = self.touches_affected(&projected) || also_forced(&projected);

            if !self.in_place(&self.projection.table(&source_table)) {
                // a dropped table takes its constraints with it, unless they
                // must go before the table does
                let before_table = kind == EntityKind::ForeignKey
                    && self.dropped_tables.contains(&source_table)
                    && (forced || (self.cyclic_drops && self.caps.add_constraint_in_place));
                if before_table && let Some(op) = drop_op(live) {
                    plan.drops.push(op);
                }
                continue;
            }

            let diff = self.by_origin.get(&(kind, original.key())).copied();
            let target = match diff {
                Some(d) if d.diff_type == DiffType::Drop => {
                    plan.drops.extend(drop_op(live));
                    continue;
                }
                Some(d) if d.diff_type == DiffType::Rename && d.changes.is_empty() && !forced => {
                    if kind != EntityKind::Index && self.caps.implicit_constraint_names {
                        continue;
                    }
                    if self.can_rename(kind)
                        && let Some(op) = self
                            .right_entity(kind, &d.key)
                            .and_then(|to| rename_op(&live, &to))
                    {
                        plan.renames.push(op);
                        continue;
                    }
                    d.key.clone()
                }
                Some(d) => d.key.clone(),
                None if forced => projected.key(),
                None => continue,
            };

            plan.drops.extend(drop_op(live));
            if let Some(op) = self.right_entity(kind, &target).and_then(add_op) {
                plan.adds.push(op);
            }
        }

        for d in self.diff.of(kind, DiffType::Create) {
            let Some(entity) = d.right.clone() else {
                continue;
            };
            let Some(table) = entity.parent_key() else {
                continue;
            };
            let wanted = self.in_place(&table)
                || (kind == EntityKind::ForeignKey
                    && self.created_tables.contains(&table)
                    && !self.caps.inline_foreign_keys);
            if wanted && let Some(op) = add_op(entity) {
                plan.adds.push(op);
            }
        }

        if kind == EntityKind::ForeignKey && !self.caps.inline_foreign_keys {
            // created tables are not diffed child by child
            for table in &self.created_tables {
                for fk in self.right.fks_of(table) {
                    let op = Operation::AddConstraint {
                        constraint: Constraint::ForeignKey(fk.clone()),
                    };
                    if !plan.adds.contains(&op) {
                        plan.adds.push(op);
                    }
                }
            }
        }

        plan
    }

    fn project(&self, entity: &DdlEntity) -> DdlEntity {
        let p = self.projection;
        match entity {
            DdlEntity::Schema(s) => DdlEntity::Schema(crate::ddl::Schema {
                name: p.schema(&s.name),
            }),
            DdlEntity::Table(t) => p.table_entity(t).into(),
            DdlEntity::Column(c) => p.column(c).into(),
            DdlEntity::PrimaryKey(pk) => p.primary_key(pk, self.naming).into(),
            DdlEntity::UniqueConstraint(u) => p.unique(u, self.naming).into(),
            DdlEntity::CheckConstraint(c) => p.check(c, self.naming).into(),
            DdlEntity::Index(i) => p.index(i, self.naming).into(),
            DdlEntity::ForeignKey(fk) => p.foreign_key(fk, self.naming).into(),
            DdlEntity::View(v) => p.view_entity(v).into(),
        }
    }

    fn right_entity(&self, kind: EntityKind, key: &EntityKey) -> Option<DdlEntity> {
        let r = self.right;
        match kind {
            EntityKind::PrimaryKey => r.pks().get(key).cloned().map(Into::into),
            EntityKind::UniqueConstraint => r.uniques().get(key).cloned().map(Into::into),
            EntityKind::CheckConstraint => r.checks().get(key).cloned().map(Into::into),
            EntityKind::Index => r.indexes().get(key).cloned().map(Into::into),
            EntityKind::ForeignKey => r.fks().get(key).cloned().map(Into::into),
            _ => None,
        }
    }

    fn can_rename(&self, kind: EntityKind) -> bool {
        match constraint_kind(kind) {
            Some(kind) => self.caps.can_rename_constraint(kind),
            None => kind == EntityKind::Index && self.caps.rename_index,
        }
    }

    /// Whether a constraint or index covers a column that is replaced or
    /// removed in place
    fn touches_affected(&self, entity: &DdlEntity) -> bool {
        match entity {
            DdlEntity::PrimaryKey(pk) => self.any_affected(&pk.table_key(), &pk.columns),
            DdlEntity::UniqueConstraint(u) => self.any_affected(&u.table_key(), &u.columns),
            DdlEntity::CheckConstraint(c) => self
                .affected_in(&c.table_key())
                .any(|column| mentions_identifier(&c.value, column)),
            DdlEntity::Index(i) => self.affected_in(&i.table_key()).any(|column| {
                i.columns.iter().any(|ic| {
                    if ic.is_expression {
                        mentions_identifier(&ic.value, column)
                    } else {
                        ic.value == column
                    }
                }) || i
                    .where_clause
                    .as_deref()
                    .is_some_and(|w| mentions_identifier(w, column))
            }),
            DdlEntity::ForeignKey(fk) => {
                self.any_affected(&fk.table_key(), &fk.columns)
                    || self.any_affected(&fk.target_key(), &fk.columns_to)
            }
            _ => false,
        }
    }

    /// Columns under the source or the target primary key of a table
    fn key_columns(&self, table: &EntityKey) -> BTreeSet<String> {
        let mut columns: BTreeSet<String> = self
            .right
            .pk_of(table)
            .map(|pk| pk.columns.iter().cloned().collect())
            .unwrap_or_default();
        if let Some(origin) = self.common.get(table)
            && let Some(pk) = self.left.pk_of(origin)
        {
            columns.extend(pk.columns.iter().map(|c| self.projection.column_name(table, c)));
        }
        columns
    }

    /// Index of the last shadow sequence that replaces a key column of `table`
    fn key_shadow(&self, table: &EntityKey) -> Option<usize> {
        if !self.in_place(table) {
            return None;
        }
        let columns = self.key_columns(table);
        self.column_plans.iter().rposition(|p| {
            p.strategy == ColumnStrategy::Shadow
                && p.to.table_key() == *table
                && columns.contains(&p.to.name)
        })
    }

    fn affected_in<'s>(&'s self, table: &'s EntityKey) -> impl Iterator<Item = &'s str> {
        self.affected
            .iter()
            .filter(move |(t, _)| t == table)
            .map(|(_, column)| column.as_str())
    }

    fn any_affected(&self, table: &EntityKey, columns: &[String]) -> bool {
        columns
            .iter()
            .any(|c| self.affected.contains(&(table.clone(), c.clone())))
    }

    // =========================================================================
    // Phases
    // =========================================================================

    fn create_namespaces(&self, ops: &mut Vec<Operation>) {
        for d in self.diff.of(EntityKind::Schema, DiffType::Create) {
            ops.push(Operation::CreateSchema {
                name: d.key.name().to_string(),
            });
        }
        for d in self.diff.of(EntityKind::Schema, DiffType::Rename) {
            let Some(from) = d.from_key() else {
                continue;
            };
            let to = d.key.name().to_string();
            if self.caps.rename_namespace {
                ops.push(Operation::RenameSchema {
                    from: from.name().to_string(),
                    to,
                });
            } else {
                ops.push(Operation::CreateSchema { name: to });
            }
        }
    }

    /// Schema a source object lives in once phase 1 has run
    fn live_schema(&self, schema: &str) -> String {
        if self.caps.rename_namespace {
            self.projection.schema(schema)
        } else {
            schema.to_string()
        }
    }

    fn drop_views(&self, ops: &mut Vec<Operation>) {
        for view in self.left.views().sorted() {
            if self.dropped_views.contains(&view.key()) {
                ops.push(Operation::DropView {
                    view: View {
                        schema: self.live_schema(&view.schema),
                        ..view.clone()
                    },
                });
            }
        }
    }

    fn renames(&self, ops: &mut Vec<Operation>) {
        for (from, to) in &self.moved_schemas {
            for table in self.left.tables().sorted() {
                if !table.is_existing && table.schema == *from {
                    ops.push(Operation::MoveTable {
                        name: table.name.clone(),
                        from_schema: from.clone(),
                        to_schema: to.clone(),
                    });
                }
            }
            for view in self.left.views().sorted() {
                if !view.is_existing
                    && view.schema == *from
                    && !self.dropped_views.contains(&view.key())
                {
                    ops.push(Operation::MoveView {
                        name: view.name.clone(),
                        from_schema: from.clone(),
                        to_schema: to.clone(),
                    });
                }
            }
        }

        let tables: Vec<(EntityKey, EntityKey)> = self
            .diff
            .of(EntityKind::Table, DiffType::Rename)
            .filter_map(|d| {
                let from = d.from_key()?;
                let (schema, name) = split_table(&from);
                Some((EntityKey::table(&self.projection.schema(&schema), &name), d.key.clone()))
            })
            .collect();
        for (live, target) in order::sort_renames(&tables) {
            let (from_schema, from) = split_table(&live);
            let (to_schema, to) = split_table(&target);
            if from_schema != to_schema {
                ops.push(Operation::MoveTable {
                    name: from.clone(),
                    from_schema,
                    to_schema: to_schema.clone(),
                });
            }
            if from != to {
                ops.push(Operation::RenameTable {
                    schema: to_schema,
                    from,
                    to,
                });
            }
        }

        let columns: Vec<(EntityKey, EntityKey)> = self
            .diff
            .of(EntityKind::Column, DiffType::Rename)
            .filter_map(|d| {
                let column = d.right.as_ref()?.as_column()?;
                let from = d.from_key()?;
                let live = EntityKey::child(&column.schema, &column.table, from.name());
                (live != d.key).then(|| (live, d.key.clone()))
            })
            .collect();
        for (live, target) in order::sort_renames(&columns) {
            if let [schema, table, from] = live.parts()[..] {
                ops.push(Operation::RenameColumn {
                    schema: schema.to_string(),
                    table: table.to_string(),
                    from: from.to_string(),
                    to: target.name().to_string(),
                });
            }
        }

        if self.caps.named_defaults {
            self.rename_default_constraints(ops);
        }

        ops.extend(self.children.renames.iter().cloned());
    }

    /// Named defaults carry the table and column name; keep them in step
    fn rename_default_constraints(&self, ops: &mut Vec<Operation>) {
        for (target, origin) in &self.common {
            let (schema, table) = split_table(target);
            for column in self.left.columns_of(origin) {
                if column.default.is_none() {
                    continue;
                }
                let from = self.naming.default_constraint(origin.name(), &column.name);
                let to = self.naming.default_constraint(
                    &table,
                    &self.projection.column_name(target, &column.name),
                );
                if from != to {
                    ops.push(Operation::RenameConstraint {
                        schema: schema.clone(),
                        table: table.clone(),
                        kind: ConstraintKind::Default,
                        from,
                        to,
                    });
                }
            }
        }
    }

    fn drop_columns_and_tables(&self, ops: &mut Vec<Operation>) {
        for d in self.diff.of(EntityKind::Column, DiffType::Drop) {
            if let Some(column) = d.left.as_ref().and_then(DdlEntity::as_column) {
                let live = self.projection.column(column);
                if self.in_place(&live.table_key()) {
                    ops.push(Operation::DropColumn { column: live });
                }
            }
        }

        let order = order::sort_for_drop(&self.dropped_tables, &self.left.relations());
        for key in order.items {
            let (schema, name) = split_table(&key);
            ops.push(Operation::DropTable {
                schema: self.projection.schema(&schema),
                name,
            });
        }
    }

    fn create_tables(&self, ops: &mut Vec<Operation>) {
        let keys: Vec<EntityKey> = self.created_tables.iter().cloned().collect();
        let order = order::sort_for_create(&keys, &self.right.relations());
        if order.has_circular_deps && self.caps.inline_foreign_keys {
            tracing::debug!("created tables reference each other in a cycle");
        }
        for key in order.items {
            if let Some(table) = self.right.table_def(&key, self.caps.inline_foreign_keys) {
                ops.push(Operation::CreateTable { table });
            }
        }
    }

    fn columns(&self, ops: &mut Vec<Operation>) {
        for d in self.diff.of(EntityKind::Column, DiffType::Create) {
            if let Some(column) = d.right.as_ref().and_then(DdlEntity::as_column)
                && self.in_place(&column.table_key())
            {
                ops.push(Operation::AddColumn {
                    column: column.clone(),
                });
            }
        }

        // shadows under a swapped key, dropped once the key has moved
        let mut held: BTreeMap<EntityKey, Vec<Operation>> = BTreeMap::new();
        for (i, plan) in self.column_plans.iter().enumerate() {
            let table = plan.to.table_key();
            if !self.in_place(&table) {
                continue;
            }
            match plan.strategy {
                ColumnStrategy::InPlace => {
                    if !plan.changes.is_empty() {
                        ops.push(Operation::AlterColumn {
                            column: plan.to.clone(),
                            from: plan.from.clone(),
                            changes: plan.changes.clone(),
                        });
                    }
                }
                ColumnStrategy::Shadow => {
                    let drop = self.shadow_sequence(plan, ops);
                    match self.swapped_keys.get(&table) {
                        Some(swap) if self.key_columns(&table).contains(&plan.to.name) => {
                            let pending = held.entry(table.clone()).or_default();
                            pending.push(drop);
                            if self.key_shadow(&table) == Some(i) {
                                ops.push(swap.clone());
                                ops.append(pending);
                            }
                        }
                        _ => ops.push(drop),
                    }
                }
                ColumnStrategy::RecreateTable => {}
            }
        }

        for target in &self.recreated {
            let Some(origin) = self.common.get(target) else {
                continue;
            };
            if let (Some(from), Some(to)) = (
                self.live_table_def(origin, target),
                self.right.table_def(target, self.caps.inline_foreign_keys),
            ) {
                ops.push(Operation::RecreateTable { from, to });
            }
        }
    }

    /// A source table as it stands after the renames of phase 3
    fn live_table_def(&self, origin: &EntityKey, target: &EntityKey) -> Option<TableDef> {
        let def = self.left.table_def(origin, self.caps.inline_foreign_keys)?;
        let (schema, name) = split_table(target);
        let p = self.projection;
        Some(TableDef {
            schema,
            name,
            columns: def.columns.iter().map(|c| p.column(c)).collect(),
            primary_key: def.primary_key.as_ref().map(|pk| p.primary_key(pk, self.naming)),
            uniques: def.uniques.iter().map(|u| p.unique(u, self.naming)).collect(),
            checks: def.checks.iter().map(|c| p.check(c, self.naming)).collect(),
            foreign_keys: def
                .foreign_keys
                .iter()
                .map(|fk| p.foreign_key(fk, self.naming))
                .collect(),
        })
    }

    fn views(&self, ops: &mut Vec<Operation>) {
        let mut creates: BTreeMap<EntityKey, View> = BTreeMap::new();

        for d in self.diff.of_kind(EntityKind::View) {
            let Some(view) = d.right.as_ref().and_then(DdlEntity::as_view) else {
                continue;
            };
            match d.diff_type {
                DiffType::Create | DiffType::Alter => {
                    creates.insert(d.key.clone(), view.clone());
                }
                DiffType::Rename => {
                    let Some(from) = d.from_key() else {
                        continue;
                    };
                    if self.dropped_views.contains(&from) {
                        creates.insert(d.key.clone(), view.clone());
                        continue;
                    }
                    let (from_schema, from_name) = split_table(&from);
                    let live_schema = self.projection.schema(&from_schema);
                    if live_schema != view.schema {
                        ops.push(Operation::MoveView {
                            name: from_name.clone(),
                            from_schema: live_schema,
                            to_schema: view.schema.clone(),
                        });
                    }
                    if from_name != view.name {
                        ops.push(Operation::RenameView {
                            schema: view.schema.clone(),
                            from: from_name,
                            to: view.name.clone(),
                        });
                    }
                }
                DiffType::Drop => {}
            }
        }

        // unchanged views dropped because a table under them was rebuilt
        for key in &self.dropped_views {
            if self.by_origin.contains_key(&(EntityKind::View, key.clone())) {
                continue;
            }
            let target = self.projection.view(key);
            if let Some(view) = self.right.views().get(&target) {
                creates.insert(target, view.clone());
            }
        }

        let keys: Vec<EntityKey> = creates.keys().cloned().collect();
        let order = order::topological(&keys, |a, b| {
            creates
                .get(a)
                .and_then(|v| v.definition.as_deref())
                .is_some_and(|def| mentions_identifier(def, b.name()))
        });
        for key in order.items {
            if let Some(view) = creates.remove(&key) {
                ops.push(Operation::CreateView { view });
            }
        }
    }

    fn drop_namespaces(&self, ops: &mut Vec<Operation>) {
        for (from, _) in &self.moved_schemas {
            ops.push(Operation::DropSchema { name: from.clone() });
        }
        for d in self.diff.of(EntityKind::Schema, DiffType::Drop) {
            ops.push(Operation::DropSchema {
                name: d.key.name().to_string(),
            });
        }
    }
}

fn constraint_kind(kind: EntityKind) -> Option<ConstraintKind> {
    match kind {
        EntityKind::PrimaryKey => Some(ConstraintKind::PrimaryKey),
        EntityKind::UniqueConstraint => Some(ConstraintKind::Unique),
        EntityKind::CheckConstraint => Some(ConstraintKind::Check),
        EntityKind::ForeignKey => Some(ConstraintKind::ForeignKey),
        _ => None,
    }
}

fn drop_op(entity: DdlEntity) -> Option<Operation> {
    Some(match entity {
        DdlEntity::Index(index) => Operation::DropIndex { index },
        other => Operation::DropConstraint {
            constraint: as_constraint(other)?,
        },
    })
}

fn add_op(entity: DdlEntity) -> Option<Operation> {
    Some(match entity {
        DdlEntity::Index(index) => Operation::CreateIndex { index },
        other => Operation::AddConstraint {
            constraint: as_constraint(other)?,
        },
    })
}

fn rename_op(live: &DdlEntity, target: &DdlEntity) -> Option<Operation> {
    let (schema, table) = split_table(&target.parent_key()?);
    let from = live.name().to_string();
    let to = target.name().to_string();
    if from == to {
        return None;
    }
    Some(match target {
        DdlEntity::Index(_) => Operation::RenameIndex {
            schema,
            table,
            from,
            to,
        },
        other => Operation::RenameConstraint {
            schema,
            table,
            kind: constraint_kind(other.kind())?,
            from,
            to,
        },
    })
}

fn as_constraint(entity: DdlEntity) -> Option<Constraint> {
    match entity {
        DdlEntity::PrimaryKey(c) => Some(Constraint::PrimaryKey(c)),
        DdlEntity::UniqueConstraint(c) => Some(Constraint::Unique(c)),
        DdlEntity::CheckConstraint(c) => Some(Constraint::Check(c)),
        DdlEntity::ForeignKey(c) => Some(Constraint::ForeignKey(c)),
        _ => None,
    }
}
