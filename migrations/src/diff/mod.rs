//! Entity differ
//!
//! Compares two [`Ddl`] models kind by kind. Within each (kind, scope) the
//! entities are split into matched pairs, deleted and created sets; before
//! the sets are final, the [`RenameResolver`] gets a chance to turn
//! deleted/created pairs into renames. Renames settled for one kind are
//! projected onto every later kind, so the children of a renamed table
//! compare under the table's new name.

mod compare;
mod projection;

pub use compare::FieldChange;
pub use projection::Projection;

pub(crate) use compare::normalize_sql;
pub(crate) use projection::split_table;

use crate::ddl::{Column, Ddl, DdlEntity, ForeignKey, Schema, Table, View};
use crate::error::PlanningError;
use crate::grammar::{Naming, for_dialect};
use crate::resolver::{Candidate, Decision, RenameHint, RenameResolver};
use crate::traits::{DiffType, Entity, EntityKey, EntityKind};
use driftless_types::Dialect;
use std::collections::{BTreeMap, BTreeSet};

/// One difference between the two models
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDiff {
    pub diff_type: DiffType,
    pub kind: EntityKind,
    /// Identity in the target model; for drops, the identity in the source
    pub key: EntityKey,
    /// The entity as the source model declares it
    pub left: Option<DdlEntity>,
    /// The entity as the target model declares it
    pub right: Option<DdlEntity>,
    /// Field-level changes of alters and renames
    pub changes: Vec<FieldChange>,
}

impl EntityDiff {
    /// Source-side identity
    pub fn from_key(&self) -> Option<EntityKey> {
        self.left.as_ref().map(DdlEntity::key)
    }
}

/// Resolved differences between two models
#[derive(Debug, Clone)]
pub struct SchemaDiff {
    pub dialect: Dialect,
    pub diffs: Vec<EntityDiff>,
    /// Renames the resolver accepted, in hint form
    pub renames: Vec<RenameHint>,
    projection: Projection,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityDiff> {
        self.diffs.iter().filter(move |d| d.kind == kind)
    }

    pub fn of(&self, kind: EntityKind, diff_type: DiffType) -> impl Iterator<Item = &EntityDiff> {
        self.diffs
            .iter()
            .filter(move |d| d.kind == kind && d.diff_type == diff_type)
    }

    /// Renames settled while diffing
    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

/// Diff two models, asking `resolver` about possible renames
pub fn diff(
    left: &Ddl,
    right: &Ddl,
    resolver: &mut dyn RenameResolver,
) -> Result<SchemaDiff, PlanningError> {
    if left.dialect() != right.dialect() {
        return Err(PlanningError::DialectMismatch {
            left: left.dialect(),
            right: right.dialect(),
        });
    }

    let mut differ = Differ {
        left,
        right,
        resolver,
        naming: for_dialect(left.dialect()).naming(),
        projection: Projection::default(),
        diffs: Vec::new(),
        renames: Vec::new(),
    };

    differ.schemas()?;
    let common = differ.tables()?;
    differ.columns(&common)?;
    differ.views()?;
    differ.constraints(&common)?;
    differ.foreign_keys()?;

    let Differ {
        mut diffs,
        renames,
        projection,
        ..
    } = differ;
    diffs.sort_by(|a, b| (a.kind, &a.key, a.diff_type).cmp(&(b.kind, &b.key, b.diff_type)));

    tracing::debug!(
        dialect = %left.dialect(),
        diffs = diffs.len(),
        renames = renames.len(),
        "models compared"
    );

    Ok(SchemaDiff {
        dialect: left.dialect(),
        diffs,
        renames,
        projection,
    })
}

/// A source entity next to its projection into target terms
struct Pair<E> {
    original: E,
    projected: E,
}

struct Differ<'a> {
    left: &'a Ddl,
    right: &'a Ddl,
    resolver: &'a mut dyn RenameResolver,
    naming: &'static Naming,
    projection: Projection,
    diffs: Vec<EntityDiff>,
    renames: Vec<RenameHint>,
}

impl Differ<'_> {
    fn schemas(&mut self) -> Result<(), PlanningError> {
        let (source, target) = (self.left, self.right);
        let left: Vec<Pair<Schema>> = source
            .schemas()
            .sorted()
            .into_iter()
            .map(|s| Pair {
                original: s.clone(),
                projected: s.clone(),
            })
            .collect();
        let right = target.schemas().sorted();

        let renamed = self.diff_kind(
            left,
            right,
            |_, _| Vec::new(),
            |model, schema, _| {
                let mut tables: Vec<&str> = model
                    .tables()
                    .filter(|t| t.schema == schema.name)
                    .into_iter()
                    .map(|t| t.name.as_str())
                    .collect();
                tables.sort();
                tables.join(",")
            },
        )?;
        for (from, to) in renamed {
            self.projection.rename_schema(&from.name, &to.name);
        }
        Ok(())
    }

    /// Diff tables; returns the target keys of tables present on both sides
    fn tables(&mut self) -> Result<BTreeSet<EntityKey>, PlanningError> {
        let (source, target) = (self.left, self.right);
        let left: Vec<Pair<Table>> = source
            .tables()
            .sorted()
            .into_iter()
            .filter(|t| !t.is_existing)
            .map(|t| Pair {
                original: t.clone(),
                projected: self.projection.table_entity(t),
            })
            .collect();
        let right: Vec<&Table> = target
            .tables()
            .sorted()
            .into_iter()
            .filter(|t| !t.is_existing)
            .collect();

        let dialect = source.dialect();
        let renamed = self.diff_kind(
            left,
            right,
            |_, _| Vec::new(),
            |model, lookup, _| compare::table_shape(&model.columns_of(&lookup.key()), dialect),
        )?;
        for (from, to) in renamed {
            self.projection.rename_table(from.key(), to.key());
        }

        let common = source
            .tables()
            .iter()
            .filter(|t| !t.is_existing)
            .map(|t| self.projection.table(&t.key()))
            .filter(|key| target.table(key).is_some_and(|t| !t.is_existing))
            .collect();
        Ok(common)
    }

    fn columns(&mut self, common: &BTreeSet<EntityKey>) -> Result<(), PlanningError> {
        let (source, target) = (self.left, self.right);
        let left: Vec<Pair<Column>> = source
            .columns()
            .sorted()
            .into_iter()
            .map(|c| Pair {
                original: c.clone(),
                projected: self.projection.column(c),
            })
            .filter(|p| common.contains(&p.projected.table_key()))
            .collect();
        let right: Vec<&Column> = target
            .columns()
            .sorted()
            .into_iter()
            .filter(|c| common.contains(&c.table_key()))
            .collect();

        let dialect = source.dialect();
        let renamed = self.diff_kind(
            left,
            right,
            |a, b| compare::columns(a, b, dialect),
            |_, _, content| compare::column_shape(content, dialect),
        )?;
        for (from, to) in renamed {
            self.projection
                .rename_column(to.table_key(), &from.name, &to.name);
        }
        Ok(())
    }

    fn views(&mut self) -> Result<(), PlanningError> {
        let (source, target) = (self.left, self.right);
        let left: Vec<Pair<View>> = source
            .views()
            .sorted()
            .into_iter()
            .filter(|v| !v.is_existing)
            .map(|v| Pair {
                original: v.clone(),
                projected: self.projection.view_entity(v),
            })
            .collect();
        let right: Vec<&View> = target
            .views()
            .sorted()
            .into_iter()
            .filter(|v| !v.is_existing)
            .collect();

        let renamed = self.diff_kind(left, right, compare::views, |_, _, content| {
            compare::view_shape(content)
        })?;
        for (from, to) in renamed {
            self.projection.rename_view(from.key(), to.key());
        }
        Ok(())
    }

    fn constraints(&mut self, common: &BTreeSet<EntityKey>) -> Result<(), PlanningError> {
        let (source, target) = (self.left, self.right);
        let naming = self.naming;

        let pks = self.project(source.pks().sorted(), common, |p, pk| {
            p.primary_key(pk, naming)
        });
        let right = in_tables(target.pks().sorted(), common);
        self.diff_kind(pks, right, compare::primary_keys, |_, _, pk| {
            compare::key_columns_shape(&pk.columns)
        })?;

        let uniques = self.project(source.uniques().sorted(), common, |p, u| {
            p.unique(u, naming)
        });
        let right = in_tables(target.uniques().sorted(), common);
        self.diff_kind(uniques, right, compare::uniques, |_, _, u| {
            compare::key_columns_shape(&u.columns)
        })?;

        let checks = self.project(source.checks().sorted(), common, |p, c| {
            p.check(c, naming)
        });
        let right = in_tables(target.checks().sorted(), common);
        self.diff_kind(checks, right, compare::checks, |_, _, c| {
            normalize_sql(&c.value)
        })?;

        let indexes = self.project(source.indexes().sorted(), common, |p, i| {
            p.index(i, naming)
        });
        let right = in_tables(target.indexes().sorted(), common);
        self.diff_kind(indexes, right, compare::indexes, |_, _, i| {
            compare::index_shape(i)
        })?;

        Ok(())
    }

    /// Foreign keys of every managed table; the planner decides which of
    /// them need statements of their own
    fn foreign_keys(&mut self) -> Result<(), PlanningError> {
        let (source, target) = (self.left, self.right);
        let naming = self.naming;
        let left: Vec<Pair<ForeignKey>> = source
            .fks()
            .sorted()
            .into_iter()
            .filter(|fk| !source.is_existing_table(&fk.table_key()))
            .map(|fk| Pair {
                original: fk.clone(),
                projected: self.projection.foreign_key(fk, naming),
            })
            .collect();
        let right: Vec<&ForeignKey> = target
            .fks()
            .sorted()
            .into_iter()
            .filter(|fk| !target.is_existing_table(&fk.table_key()))
            .collect();

        self.diff_kind(left, right, compare::foreign_keys, |_, _, fk| {
            compare::foreign_key_shape(fk)
        })?;
        Ok(())
    }

    fn project<E: Entity>(
        &self,
        items: Vec<&E>,
        common: &BTreeSet<EntityKey>,
        projector: impl Fn(&Projection, &E) -> E,
    ) -> Vec<Pair<E>> {
        items
            .into_iter()
            .map(|e| Pair {
                original: e.clone(),
                projected: projector(&self.projection, e),
            })
            .filter(|p| {
                p.projected
                    .parent_key()
                    .is_some_and(|table| common.contains(&table))
            })
            .collect()
    }

    /// Diff one entity kind and record the results.
    ///
    /// `shape` receives the model the entity belongs to, the entity to look
    /// up in that model and the entity whose content describes it (the
    /// projection, for source entities). Returns the resolver-accepted
    /// renames as `(original, target)` pairs.
    fn diff_kind<E, C, S>(
        &mut self,
        left: Vec<Pair<E>>,
        right: Vec<&E>,
        compare: C,
        shape: S,
    ) -> Result<Vec<(E, E)>, PlanningError>
    where
        E: Entity + Into<DdlEntity>,
        C: Fn(&E, &E) -> Vec<FieldChange>,
        S: Fn(&Ddl, &E, &E) -> String,
    {
        let kind = E::KIND;
        let (source, target_model) = (self.left, self.right);
        let scope = |e: &E| {
            if kind.is_table_scoped() {
                e.parent_key()
            } else {
                None
            }
        };

        let mut by_key: BTreeMap<EntityKey, &E> = right.into_iter().map(|e| (e.key(), e)).collect();
        let mut matched = Vec::new();
        let mut deleted: BTreeMap<Option<EntityKey>, Vec<Pair<E>>> = BTreeMap::new();
        for pair in left {
            match by_key.remove(&pair.projected.key()) {
                Some(target) => matched.push((pair, target.clone())),
                None => deleted
                    .entry(scope(&pair.projected))
                    .or_default()
                    .push(pair),
            }
        }
        let mut created: BTreeMap<Option<EntityKey>, Vec<E>> = BTreeMap::new();
        for target in by_key.into_values() {
            created.entry(scope(target)).or_default().push(target.clone());
        }

        let mut renamed = Vec::new();
        for (scope_key, gone) in deleted.iter_mut() {
            let Some(added) = created.get_mut(scope_key) else {
                continue;
            };
            while !gone.is_empty() && !added.is_empty() {
                let gone_candidates: Vec<Candidate> = gone
                    .iter()
                    .map(|p| Candidate {
                        kind,
                        key: p.projected.key(),
                        original: p.original.key(),
                        entity: p.original.clone().into(),
                        shape: shape(source, &p.original, &p.projected),
                    })
                    .collect();
                let added_candidates: Vec<Candidate> = added
                    .iter()
                    .map(|e| Candidate {
                        kind,
                        key: e.key(),
                        original: e.key(),
                        entity: e.clone().into(),
                        shape: shape(target_model, e, e),
                    })
                    .collect();

                match self
                    .resolver
                    .resolve(kind, &gone_candidates, &added_candidates)?
                {
                    Decision::NoRename => break,
                    Decision::Rename { from, to } => {
                        let unknown = |key: &EntityKey| PlanningError::UnknownCandidate {
                            kind,
                            name: key.qualified(),
                        };
                        let from_idx = gone
                            .iter()
                            .position(|p| p.original.key() == from)
                            .ok_or_else(|| unknown(&from))?;
                        let to_idx = added
                            .iter()
                            .position(|e| e.key() == to)
                            .ok_or_else(|| unknown(&to))?;
                        tracing::debug!(kind = %kind, from = %from, to = %to, "rename accepted");
                        renamed.push((gone.remove(from_idx), added.remove(to_idx)));
                    }
                }
            }
        }

        for (pair, target) in matched {
            let changes = compare(&pair.projected, &target);
            tracing::trace!(
                kind = %kind,
                key = %target.key(),
                changes = changes.len(),
                "compared"
            );
            let diff_type = if pair.original.name() != target.name() {
                DiffType::Rename
            } else if !changes.is_empty() {
                DiffType::Alter
            } else {
                continue;
            };
            self.push(diff_type, target.key(), Some(pair.original), Some(target), changes);
        }

        let mut accepted = Vec::new();
        for (pair, target) in renamed {
            let changes = compare(&pair.projected, &target);
            self.renames
                .push(RenameHint::from_keys(&pair.original.key(), &target.key()));
            self.push(
                DiffType::Rename,
                target.key(),
                Some(pair.original.clone()),
                Some(target.clone()),
                changes,
            );
            accepted.push((pair.original, target));
        }

        for pair in deleted.into_values().flatten() {
            self.push(DiffType::Drop, pair.original.key(), Some(pair.original), None, Vec::new());
        }
        for target in created.into_values().flatten() {
            self.push(DiffType::Create, target.key(), None, Some(target), Vec::new());
        }

        Ok(accepted)
    }

    fn push<E: Entity + Into<DdlEntity>>(
        &mut self,
        diff_type: DiffType,
        key: EntityKey,
        left: Option<E>,
        right: Option<E>,
        changes: Vec<FieldChange>,
    ) {
        self.diffs.push(EntityDiff {
            diff_type,
            kind: E::KIND,
            key,
            left: left.map(Into::into),
            right: right.map(Into::into),
            changes,
        });
    }
}

/// Target entities whose table exists on both sides
fn in_tables<'e, E: Entity>(items: Vec<&'e E>, common: &BTreeSet<EntityKey>) -> Vec<&'e E> {
    items
        .into_iter()
        .filter(|e| e.parent_key().is_some_and(|table| common.contains(&table)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::PrimaryKey;
    use crate::error::ResolveError;
    use crate::resolver::{DeterministicResolver, NoRenames};
    use driftless_types::ColumnType;

    fn int() -> ColumnType {
        ColumnType::parse("integer", Dialect::PostgreSQL).unwrap()
    }

    fn users(table: &str) -> Ddl {
        let mut ddl = Ddl::new(Dialect::PostgreSQL);
        ddl.tables.push(Table {
            schema: "public".into(),
            name: table.into(),
            is_existing: false,
        });
        let mut id = Column::new("public", table, "id", int());
        id.not_null = true;
        ddl.columns.push(id);
        ddl.pks.push(PrimaryKey {
            schema: "public".into(),
            table: table.into(),
            name: format!("{}_pkey", table),
            name_explicit: false,
            columns: vec!["id".into()],
        });
        ddl
    }

    fn with_column(mut ddl: Ddl, table: &str, name: &str) -> Ddl {
        let mut column = Column::new("public", table, name, ColumnType::Text);
        column.ordinal = 1;
        ddl.columns.push(column);
        ddl
    }

    #[test]
    fn test_identical_models_produce_no_diff() {
        let model = with_column(users("users"), "users", "name");
        let result = diff(&model, &model.clone(), &mut NoRenames).unwrap();
        assert!(result.is_empty(), "unexpected diffs: {:?}", result.diffs);
    }

    #[test]
    fn test_added_column() {
        let left = users("users");
        let right = with_column(users("users"), "users", "name");
        let result = diff(&left, &right, &mut NoRenames).unwrap();

        assert_eq!(result.diffs.len(), 1);
        let d = &result.diffs[0];
        assert_eq!(d.diff_type, DiffType::Create);
        assert_eq!(d.kind, EntityKind::Column);
        assert_eq!(d.key, EntityKey::child("public", "users", "name"));
    }

    #[test]
    fn test_changed_column_lists_field_changes() {
        let left = with_column(users("users"), "users", "name");
        let mut right = users("users");
        let mut name = Column::new("public", "users", "name", ColumnType::Text);
        name.not_null = true;
        right.columns.push(name);

        let result = diff(&left, &right, &mut NoRenames).unwrap();
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].diff_type, DiffType::Alter);
        assert_eq!(result.diffs[0].changes[0].to_string(), "notNull: false -> true");
    }

    #[test]
    fn test_table_rename_with_hint() {
        let left = users("t1");
        let right = users("t2");
        let mut resolver =
            DeterministicResolver::new(Dialect::PostgreSQL, ["public.t1->public.t2"]).unwrap();
        let result = diff(&left, &right, &mut resolver).unwrap();

        let tables: Vec<_> = result.of_kind(EntityKind::Table).collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].diff_type, DiffType::Rename);
        assert_eq!(tables[0].from_key(), Some(EntityKey::table("public", "t1")));
        assert_eq!(tables[0].key, EntityKey::table("public", "t2"));

        // the synthesized primary key name follows the table
        let pks: Vec<_> = result.of_kind(EntityKind::PrimaryKey).collect();
        assert_eq!(pks.len(), 1);
        assert_eq!(pks[0].diff_type, DiffType::Rename);
        assert!(pks[0].changes.is_empty());

        assert!(result.of_kind(EntityKind::Column).next().is_none());
        assert_eq!(result.renames.len(), 1);
        assert_eq!(result.renames[0].to_string(), "public.t1->public.t2");
    }

    #[test]
    fn test_table_rename_without_hint_is_drop_and_create() {
        let result = diff(&users("t1"), &users("t2"), &mut NoRenames).unwrap();
        let tables: Vec<_> = result.of_kind(EntityKind::Table).collect();
        assert_eq!(tables.len(), 2);
        assert!(tables.iter().any(|d| d.diff_type == DiffType::Drop));
        assert!(tables.iter().any(|d| d.diff_type == DiffType::Create));
        assert!(result.renames.is_empty());
    }

    #[test]
    fn test_column_rename_inside_renamed_table() {
        let left = with_column(users("users"), "users", "mail");
        let right = with_column(users("people"), "people", "email");
        let mut resolver = DeterministicResolver::new(
            Dialect::PostgreSQL,
            ["users->people", "users.mail->people.email"],
        )
        .unwrap();
        let result = diff(&left, &right, &mut resolver).unwrap();

        let columns: Vec<_> = result.of_kind(EntityKind::Column).collect();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].diff_type, DiffType::Rename);
        assert_eq!(
            columns[0].from_key(),
            Some(EntityKey::child("public", "users", "mail"))
        );
        assert_eq!(result.renames.len(), 2);
    }

    #[test]
    fn test_existing_tables_are_ignored() {
        let mut left = users("users");
        let mut right = Ddl::new(Dialect::PostgreSQL);
        right.tables.push(Table {
            schema: "public".into(),
            name: "legacy".into(),
            is_existing: true,
        });
        right.columns.push(Column::new("public", "legacy", "id", int()));
        left.tables.push(Table {
            schema: "public".into(),
            name: "legacy".into(),
            is_existing: true,
        });
        right.tables.push(Table {
            schema: "public".into(),
            name: "users".into(),
            is_existing: false,
        });
        let mut id = Column::new("public", "users", "id", int());
        id.not_null = true;
        right.columns.push(id);
        right.pks.push(left.pks().list()[0].clone());

        let result = diff(&left, &right, &mut NoRenames).unwrap();
        assert!(result.is_empty(), "unexpected diffs: {:?}", result.diffs);
    }

    #[test]
    fn test_schema_rename_moves_tables_with_it() {
        let mut left = Ddl::new(Dialect::PostgreSQL);
        left.schemas.push(Schema { name: "a".into() });
        left.tables.push(Table {
            schema: "a".into(),
            name: "t".into(),
            is_existing: false,
        });
        let mut right = Ddl::new(Dialect::PostgreSQL);
        right.schemas.push(Schema { name: "b".into() });
        right.tables.push(Table {
            schema: "b".into(),
            name: "t".into(),
            is_existing: false,
        });

        let mut resolver = DeterministicResolver::new(Dialect::PostgreSQL, ["a->b"]).unwrap();
        let result = diff(&left, &right, &mut resolver).unwrap();
        assert_eq!(result.diffs.len(), 1, "diffs: {:?}", result.diffs);
        assert_eq!(result.diffs[0].kind, EntityKind::Schema);
        assert_eq!(result.projection().schema("a"), "b");
    }

    #[test]
    fn test_dialect_mismatch() {
        let left = Ddl::new(Dialect::PostgreSQL);
        let right = Ddl::new(Dialect::SQLite);
        let err = diff(&left, &right, &mut NoRenames).unwrap_err();
        assert_eq!(
            err,
            PlanningError::DialectMismatch {
                left: Dialect::PostgreSQL,
                right: Dialect::SQLite
            }
        );
    }

    struct Bogus;

    impl RenameResolver for Bogus {
        fn resolve(
            &mut self,
            _kind: EntityKind,
            _deleted: &[Candidate],
            _created: &[Candidate],
        ) -> Result<Decision, ResolveError> {
            Ok(Decision::Rename {
                from: EntityKey::table("public", "nope"),
                to: EntityKey::table("public", "t2"),
            })
        }
    }

    #[test]
    fn test_unknown_candidate_is_rejected() {
        let err = diff(&users("t1"), &users("t2"), &mut Bogus).unwrap_err();
        assert!(matches!(err, PlanningError::UnknownCandidate { .. }));
    }
}
