//! Explain hints for planned operations
//!
//! A read-only pass over a plan that flags what could lose data or fail on
//! a populated database. Hints never change the plan.

use crate::ddl::Ddl;
use crate::plan::{ColumnAlteration, Constraint, Operation};
use crate::traits::EntityKey;
use driftless_types::ColumnType;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Category of a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HintKind {
    /// Rows or column values are removed
    DataLoss,
    /// A new constraint may reject rows that already exist
    MayFailOnExistingRows,
    /// A primary key goes away while an identity column stays
    OrphanedIdentity,
    /// A drop and a create in the same scope that might have been a rename
    AmbiguousRename,
    /// Values are converted between types
    TypeChange,
}

impl HintKind {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DataLoss => "data loss",
            Self::MayFailOnExistingRows => "may fail",
            Self::OrphanedIdentity => "orphaned identity",
            Self::AmbiguousRename => "possible rename",
            Self::TypeChange => "type change",
        }
    }
}

/// Advisory warning about one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub kind: HintKind,
    pub message: String,
    /// Index of the related operation in the plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<usize>,
}

impl Hint {
    /// Whether confirming this hint means accepting lost data
    pub fn is_destructive(&self) -> bool {
        matches!(self.kind, HintKind::DataLoss | HintKind::OrphanedIdentity)
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)
    }
}

/// Source of row counts for the tables a plan touches
pub trait DataProbe {
    /// Rows currently in the table, or `None` when unknown
    fn row_count(&self, schema: &str, table: &str) -> Option<u64>;
}

/// Classify `ops`, planned towards `target`.
///
/// With no probe, or when the probe cannot tell, every table is assumed
/// to hold rows.
pub fn classify(ops: &[Operation], target: &Ddl, probe: Option<&dyn DataProbe>) -> Vec<Hint> {
    let classifier = Classifier {
        ops,
        target,
        probe,
        shadowed: ops
            .iter()
            .filter_map(|op| match op {
                Operation::CopyColumnData {
                    schema, table, from, to, ..
                } => Some((EntityKey::table(schema, table), from.clone(), to.name.clone())),
                _ => None,
            })
            .collect(),
    };

    let mut hints = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        classifier.operation(i, op, &mut hints);
    }
    classifier.ambiguous_renames(&mut hints);

    tracing::debug!(operations = ops.len(), hints = hints.len(), "plan classified");
    hints
}

struct Classifier<'a> {
    ops: &'a [Operation],
    target: &'a Ddl,
    probe: Option<&'a dyn DataProbe>,
    /// (table, shadow column, replacement column) of shadow sequences
    shadowed: BTreeSet<(EntityKey, String, String)>,
}

impl Classifier<'_> {
    /// Known to be empty
    fn is_empty(&self, table: &EntityKey) -> bool {
        let (schema, name) = crate::diff::split_table(table);
        self.probe
            .and_then(|p| p.row_count(&schema, &name))
            .is_some_and(|n| n == 0)
    }

    fn rows(&self, table: &EntityKey) -> String {
        let (schema, name) = crate::diff::split_table(table);
        match self.probe.and_then(|p| p.row_count(&schema, &name)) {
            Some(n) => format!(" ({} rows)", n),
            None => String::new(),
        }
    }

    fn type_sql(&self, ty: &ColumnType) -> String {
        ty.to_sql(self.target.dialect())
    }

    fn is_shadow(&self, table: &EntityKey, column: &str) -> bool {
        self.shadowed
            .iter()
            .any(|(t, shadow, _)| t == table && shadow == column)
    }

    fn is_replacement(&self, table: &EntityKey, column: &str) -> bool {
        self.shadowed
            .iter()
            .any(|(t, _, replacement)| t == table && replacement == column)
    }

    fn operation(&self, i: usize, op: &Operation, hints: &mut Vec<Hint>) {
        let Some(table) = op.table_key() else {
            return;
        };
        let mut push = |kind, message: String| {
            hints.push(Hint {
                kind,
                message,
                operation: Some(i),
            })
        };

        match op {
            Operation::DropTable { .. } if !self.is_empty(&table) => push(
                HintKind::DataLoss,
                format!("table {} will be dropped{}", table, self.rows(&table)),
            ),
            Operation::DropColumn { column }
                if !self.is_shadow(&table, &column.name) && !self.is_empty(&table) =>
            {
                push(
                    HintKind::DataLoss,
                    format!(
                        "column {}.{} will be dropped{}",
                        table,
                        column.name,
                        self.rows(&table)
                    ),
                )
            }
            Operation::RecreateTable { from, to } => {
                let lost: Vec<&str> = from
                    .columns
                    .iter()
                    .filter(|c| to.column(&c.name).is_none())
                    .map(|c| c.name.as_str())
                    .collect();
                if !lost.is_empty() && !self.is_empty(&table) {
                    push(
                        HintKind::DataLoss,
                        format!(
                            "table {} is rebuilt without column(s) {}{}",
                            table,
                            lost.join(", "),
                            self.rows(&table)
                        ),
                    );
                }
                let required: Vec<&str> = to
                    .columns
                    .iter()
                    .filter(|c| from.column(&c.name).is_none())
                    .filter(|c| c.not_null && c.default.is_none() && c.generated.is_none())
                    .map(|c| c.name.as_str())
                    .collect();
                if !required.is_empty() && !self.is_empty(&table) {
                    push(
                        HintKind::MayFailOnExistingRows,
                        format!(
                            "table {} is rebuilt with new NOT NULL column(s) {} that have no default",
                            table,
                            required.join(", ")
                        ),
                    );
                }
                for column in &to.columns {
                    if let Some(old) = from.column(&column.name)
                        && old.sql_type != column.sql_type
                    {
                        push(
                            HintKind::TypeChange,
                            format!(
                                "column {}.{} is converted from {} to {} while the table is rebuilt",
                                table,
                                column.name,
                                self.type_sql(&old.sql_type),
                                self.type_sql(&column.sql_type)
                            ),
                        );
                    }
                }
            }
            Operation::AddColumn { column }
                if column.not_null
                    && column.default.is_none()
                    && column.identity.is_none()
                    && column.generated.is_none()
                    && !self.is_empty(&table) =>
            {
                push(
                    HintKind::MayFailOnExistingRows,
                    format!(
                        "NOT NULL column {}.{} is added without a default",
                        table, column.name
                    ),
                )
            }
            Operation::AlterColumn {
                column, changes, ..
            } => {
                for change in changes {
                    match change {
                        ColumnAlteration::SetNotNull
                            if !self.is_replacement(&table, &column.name)
                                && !self.is_empty(&table) =>
                        {
                            push(
                                HintKind::MayFailOnExistingRows,
                                format!(
                                    "column {}.{} becomes NOT NULL; existing NULL values will fail",
                                    table, column.name
                                ),
                            )
                        }
                        ColumnAlteration::SetType { from, to } => push(
                            HintKind::TypeChange,
                            format!(
                                "column {}.{} changes type from {} to {}",
                                table,
                                column.name,
                                self.type_sql(from),
                                self.type_sql(to)
                            ),
                        ),
                        _ => {}
                    }
                }
            }
            Operation::CopyColumnData { from_type, to, .. } => {
                if *from_type != to.sql_type {
                    push(
                        HintKind::TypeChange,
                        format!(
                            "values of {}.{} are converted from {} to {}",
                            table,
                            to.name,
                            self.type_sql(from_type),
                            self.type_sql(&to.sql_type)
                        ),
                    );
                }
                // explicit values into an identity column are rejected by
                // MSSQL and by GENERATED ALWAYS
                if to.identity.is_some() && !self.is_empty(&table) {
                    push(
                        HintKind::MayFailOnExistingRows,
                        format!(
                            "existing values are copied into identity column {}.{}",
                            table, to.name
                        ),
                    );
                }
            }
            Operation::AddConstraint { constraint } if !self.is_empty(&table) => {
                let what = match constraint {
                    Constraint::PrimaryKey(_) => Some("primary key"),
                    Constraint::Unique(_) => Some("unique constraint"),
                    Constraint::Check(_) => Some("check constraint"),
                    Constraint::ForeignKey(_) => None,
                };
                if let Some(what) = what
                    && !self.readds_dropped(constraint)
                {
                    push(
                        HintKind::MayFailOnExistingRows,
                        format!(
                            "{} {} on {} may be violated by existing rows",
                            what,
                            constraint.name(),
                            table
                        ),
                    );
                }
            }
            Operation::CreateIndex { index } if index.is_unique && !self.is_empty(&table) => push(
                HintKind::MayFailOnExistingRows,
                format!(
                    "unique index {} on {} may be violated by existing rows",
                    index.name, table
                ),
            ),
            Operation::DropConstraint {
                constraint: Constraint::PrimaryKey(pk),
            } => {
                let readded = self.ops.iter().any(|op| {
                    matches!(op, Operation::AddConstraint { constraint: Constraint::PrimaryKey(other) } if other.table_key() == pk.table_key())
                });
                let identity: Vec<&str> = self
                    .target
                    .columns_of(&table)
                    .into_iter()
                    .filter(|c| c.identity.is_some())
                    .map(|c| c.name.as_str())
                    .collect();
                if !readded && !identity.is_empty() {
                    push(
                        HintKind::OrphanedIdentity,
                        format!(
                            "primary key {} on {} is dropped but identity column(s) {} remain",
                            pk.name,
                            table,
                            identity.join(", ")
                        ),
                    );
                }
            }
            _ => {}
        }
    }

    /// A constraint dropped earlier in the plan and added back unchanged
    fn readds_dropped(&self, constraint: &Constraint) -> bool {
        self.ops.iter().any(|op| {
            matches!(op, Operation::DropConstraint { constraint: dropped } if dropped == constraint)
        })
    }

    fn ambiguous_renames(&self, hints: &mut Vec<Hint>) {
        for (i, op) in self.ops.iter().enumerate() {
            match op {
                Operation::DropTable { schema, name } => {
                    let created: Vec<&str> = self
                        .ops
                        .iter()
                        .filter_map(|other| match other {
                            Operation::CreateTable { table } if table.schema == *schema => {
                                Some(table.name.as_str())
                            }
                            _ => None,
                        })
                        .collect();
                    if !created.is_empty() {
                        hints.push(Hint {
                            kind: HintKind::AmbiguousRename,
                            message: format!(
                                "table {} is dropped while {} is created; supply a rename hint if it was renamed",
                                EntityKey::table(schema, name),
                                created.join(", ")
                            ),
                            operation: Some(i),
                        });
                    }
                }
                Operation::DropColumn { column } => {
                    let table = column.table_key();
                    if self.is_shadow(&table, &column.name) {
                        continue;
                    }
                    let created: Vec<&str> = self
                        .ops
                        .iter()
                        .filter_map(|other| match other {
                            Operation::AddColumn { column: added }
                                if added.table_key() == table
                                    && !self.is_replacement(&table, &added.name) =>
                            {
                                Some(added.name.as_str())
                            }
                            _ => None,
                        })
                        .collect();
                    if !created.is_empty() {
                        hints.push(Hint {
                            kind: HintKind::AmbiguousRename,
                            message: format!(
                                "column {}.{} is dropped while {} is added; supply a rename hint if it was renamed",
                                table,
                                column.name,
                                created.join(", ")
                            ),
                            operation: Some(i),
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

/// Whether any hint asks the operator to accept lost data
pub fn has_destructive(hints: &[Hint]) -> bool {
    hints.iter().any(Hint::is_destructive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, Identity, IdentityKind, TableDef};
    use driftless_types::Dialect;
    use std::collections::HashMap;

    struct Rows(HashMap<String, u64>);

    impl DataProbe for Rows {
        fn row_count(&self, _schema: &str, table: &str) -> Option<u64> {
            self.0.get(table).copied()
        }
    }

    fn drop_table(name: &str) -> Operation {
        Operation::DropTable {
            schema: "public".into(),
            name: name.into(),
        }
    }

    #[test]
    fn test_drops_are_data_loss_without_probe() {
        let target = Ddl::new(Dialect::PostgreSQL);
        let hints = classify(&[drop_table("users")], &target, None);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].kind, HintKind::DataLoss);
        assert_eq!(hints[0].operation, Some(0));
        assert!(has_destructive(&hints));
    }

    #[test]
    fn test_empty_tables_are_not_flagged() {
        let target = Ddl::new(Dialect::PostgreSQL);
        let probe = Rows(HashMap::from([("users".to_string(), 0), ("posts".to_string(), 3)]));
        let hints = classify(
            &[drop_table("users"), drop_table("posts")],
            &target,
            Some(&probe),
        );
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].message, "table public.posts will be dropped (3 rows)");
    }

    #[test]
    fn test_not_null_without_default() {
        let target = Ddl::new(Dialect::PostgreSQL);
        let mut column = Column::new("public", "users", "name", ColumnType::Text);
        column.not_null = true;
        let hints = classify(&[Operation::AddColumn { column }], &target, None);
        assert_eq!(hints[0].kind, HintKind::MayFailOnExistingRows);
    }

    #[test]
    fn test_copy_into_identity_may_fail() {
        let target = Ddl::new(Dialect::MSSQL);
        let mut to = Column::new("dbo", "users", "id", ColumnType::Text);
        to.identity = Some(Identity::new(IdentityKind::Always));
        let copy = Operation::CopyColumnData {
            schema: "dbo".into(),
            table: "users".into(),
            from: "__id_old".into(),
            from_type: ColumnType::Text,
            to,
        };
        let hints = classify(&[copy], &target, None);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].kind, HintKind::MayFailOnExistingRows);
        assert_eq!(
            hints[0].message,
            "existing values are copied into identity column dbo.users.id"
        );
    }

    #[test]
    fn test_drop_and_create_in_same_scope_is_a_possible_rename() {
        let target = Ddl::new(Dialect::PostgreSQL);
        let create = Operation::CreateTable {
            table: TableDef {
                schema: "public".into(),
                name: "people".into(),
                columns: Vec::new(),
                primary_key: None,
                uniques: Vec::new(),
                checks: Vec::new(),
                foreign_keys: Vec::new(),
            },
        };
        let hints = classify(&[drop_table("users"), create], &target, None);
        let kinds: Vec<HintKind> = hints.iter().map(|h| h.kind).collect();
        assert_eq!(kinds, vec![HintKind::DataLoss, HintKind::AmbiguousRename]);
        assert!(hints[1].to_string().starts_with("[possible rename] table public.users"));
    }
}
