//! Rename resolution
//!
//! When one entity disappears and another appears in the same scope, the
//! differ cannot tell a rename from a drop followed by a create. It asks a
//! [`RenameResolver`] instead, once per (kind, scope), repeatedly until the
//! resolver answers [`Decision::NoRename`].
//!
//! Resolvers never see the models themselves, only [`Candidate`]s, so the
//! differ stays pure no matter which implementation is plugged in.

use crate::ddl::DdlEntity;
use crate::error::{PlanningError, ResolveError};
use crate::traits::{EntityKey, EntityKind};
use driftless_types::Dialect;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One side of a possible rename
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: EntityKind,
    /// Identity in the target model's terms, after earlier renames
    pub key: EntityKey,
    /// Identity in the model it came from
    pub original: EntityKey,
    pub entity: DdlEntity,
    /// Content summary that ignores the entity's own name
    pub shape: String,
}

impl Candidate {
    /// Qualified name shown to an operator
    pub fn display_name(&self) -> String {
        self.original.qualified()
    }
}

/// Outcome of one resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `from` is a deleted candidate's original key, `to` a created
    /// candidate's key
    Rename { from: EntityKey, to: EntityKey },
    NoRename,
}

/// Decides whether a deleted/created pair is a rename
pub trait RenameResolver {
    fn resolve(
        &mut self,
        kind: EntityKind,
        deleted: &[Candidate],
        created: &[Candidate],
    ) -> Result<Decision, ResolveError>;
}

/// Kinds whose drop+create loses data, and therefore deserve a question
pub fn needs_confirmation(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Schema | EntityKind::Table | EntityKind::View | EntityKind::Column
    )
}

// =============================================================================
// Rename hints
// =============================================================================

/// A rename in `namespace.parent.name->namespace.parent.newName` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenameHint {
    pub from: Vec<String>,
    pub to: Vec<String>,
}

impl RenameHint {
    /// Build a hint from two entity keys, dropping empty namespace parts
    pub fn from_keys(from: &EntityKey, to: &EntityKey) -> Self {
        let parts = |key: &EntityKey| -> Vec<String> {
            key.parts()
                .into_iter()
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        };
        Self {
            from: parts(from),
            to: parts(to),
        }
    }

    pub fn parse(input: &str) -> Result<Self, PlanningError> {
        let invalid = |reason: &str| PlanningError::InvalidRenameHint {
            hint: input.to_string(),
            reason: reason.to_string(),
        };

        let Some((from, to)) = input.split_once("->") else {
            return Err(invalid("expected 'old->new'"));
        };
        if to.contains("->") {
            return Err(invalid("more than one '->'"));
        }

        let split = |side: &str| -> Result<Vec<String>, PlanningError> {
            let parts: Vec<String> = side.trim().split('.').map(|p| p.trim().to_string()).collect();
            if parts.iter().any(|p| p.is_empty()) {
                return Err(invalid("empty name part"));
            }
            if parts.len() > 3 {
                return Err(invalid("at most three name parts are allowed"));
            }
            Ok(parts)
        };

        let from = split(from)?;
        let to = split(to)?;
        if from == to {
            return Err(invalid("source and target are the same"));
        }
        Ok(Self { from, to })
    }

    pub fn source(&self) -> String {
        self.from.join(".")
    }

    pub fn target(&self) -> String {
        self.to.join(".")
    }
}

impl fmt::Display for RenameHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source(), self.target())
    }
}

impl FromStr for RenameHint {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether hint parts name `key`; a leading default namespace may be omitted
fn hint_matches(parts: &[String], key: &EntityKey, dialect: Dialect) -> bool {
    let key_parts = key.parts();
    if parts.len() == key_parts.len() {
        return parts.iter().zip(&key_parts).all(|(a, b)| a.as_str() == *b);
    }
    parts.len() + 1 == key_parts.len()
        && key_parts[0] == dialect.default_namespace()
        && parts.iter().zip(&key_parts[1..]).all(|(a, b)| a.as_str() == *b)
}

// =============================================================================
// Resolvers
// =============================================================================

/// Never renames anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenames;

impl RenameResolver for NoRenames {
    fn resolve(
        &mut self,
        _kind: EntityKind,
        _deleted: &[Candidate],
        _created: &[Candidate],
    ) -> Result<Decision, ResolveError> {
        Ok(Decision::NoRename)
    }
}

/// Renames exactly the pairs named by an explicit hint list
#[derive(Debug, Clone)]
pub struct DeterministicResolver {
    dialect: Dialect,
    hints: Vec<RenameHint>,
    strict: bool,
}

impl DeterministicResolver {
    /// Parse and validate hint strings
    pub fn new<I, S>(dialect: Dialect, hints: I) -> Result<Self, PlanningError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hints = hints
            .into_iter()
            .map(|h| RenameHint::parse(h.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_hints(dialect, hints)
    }

    /// Validate already-parsed hints
    pub fn from_hints(dialect: Dialect, hints: Vec<RenameHint>) -> Result<Self, PlanningError> {
        let mut sources = BTreeSet::new();
        let mut targets = BTreeSet::new();
        let mut edges = BTreeMap::new();

        for hint in &hints {
            let from = hint.source();
            let to = hint.target();
            if !sources.insert(from.clone()) {
                return Err(PlanningError::DuplicateRenameSource(from));
            }
            if !targets.insert(to.clone()) {
                return Err(PlanningError::DuplicateRenameTarget(to));
            }
            edges.insert(from, to);
        }

        if let Some(cycle) = find_cycle(&edges) {
            return Err(PlanningError::RenameCycle(cycle));
        }

        Ok(Self {
            dialect,
            hints,
            strict: false,
        })
    }

    /// Fail instead of guessing when a scope has unexplained drops and creates
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn hints(&self) -> &[RenameHint] {
        &self.hints
    }
}

fn find_cycle(edges: &BTreeMap<String, String>) -> Option<Vec<String>> {
    for start in edges.keys() {
        let mut path = vec![start.clone()];
        let mut current = start;
        while let Some(next) = edges.get(current) {
            if next == start {
                path.push(next.clone());
                return Some(path);
            }
            if path.contains(next) {
                break;
            }
            path.push(next.clone());
            current = next;
        }
    }
    None
}

impl RenameResolver for DeterministicResolver {
    fn resolve(
        &mut self,
        kind: EntityKind,
        deleted: &[Candidate],
        created: &[Candidate],
    ) -> Result<Decision, ResolveError> {
        for hint in &self.hints {
            let from = deleted
                .iter()
                .find(|c| hint_matches(&hint.from, &c.original, self.dialect));
            let to = created
                .iter()
                .find(|c| hint_matches(&hint.to, &c.key, self.dialect));
            if let (Some(from), Some(to)) = (from, to) {
                tracing::debug!(kind = %kind, hint = %hint, "rename hint applied");
                return Ok(Decision::Rename {
                    from: from.original.clone(),
                    to: to.key.clone(),
                });
            }
        }

        if self.strict && needs_confirmation(kind) && !deleted.is_empty() && !created.is_empty() {
            return Err(ResolveError::Ambiguous {
                kind,
                scope: scope_of(&created[0].key),
                deleted: names(deleted),
                created: names(created),
            });
        }

        Ok(Decision::NoRename)
    }
}

/// Renames a lone deleted/created pair whose content is identical apart
/// from the name
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicResolver;

impl RenameResolver for HeuristicResolver {
    fn resolve(
        &mut self,
        _kind: EntityKind,
        deleted: &[Candidate],
        created: &[Candidate],
    ) -> Result<Decision, ResolveError> {
        match (deleted, created) {
            ([from], [to]) if from.shape == to.shape => Ok(Decision::Rename {
                from: from.original.clone(),
                to: to.key.clone(),
            }),
            _ => Ok(Decision::NoRename),
        }
    }
}

/// Parent part of a key, for messages
pub fn scope_of(key: &EntityKey) -> String {
    let parts = key.parts();
    let parent: Vec<&str> = parts[..parts.len() - 1]
        .iter()
        .copied()
        .filter(|p| !p.is_empty())
        .collect();
    if parent.is_empty() {
        "<root>".to_string()
    } else {
        parent.join(".")
    }
}

fn names(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| c.key.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::Table;

    fn table_candidate(schema: &str, name: &str, shape: &str) -> Candidate {
        let table = Table {
            schema: schema.into(),
            name: name.into(),
            is_existing: false,
        };
        Candidate {
            kind: EntityKind::Table,
            key: EntityKey::table(schema, name),
            original: EntityKey::table(schema, name),
            entity: table.into(),
            shape: shape.into(),
        }
    }

    #[test]
    fn test_hint_round_trip() {
        let hint = RenameHint::parse("public.users.name->public.users.full_name").unwrap();
        assert_eq!(hint.to_string(), "public.users.name->public.users.full_name");

        let from_keys = RenameHint::from_keys(
            &EntityKey::child("", "users", "name"),
            &EntityKey::child("", "users", "full_name"),
        );
        assert_eq!(from_keys.to_string(), "users.name->users.full_name");
    }

    #[test]
    fn test_invalid_hints() {
        assert!(RenameHint::parse("users").is_err());
        assert!(RenameHint::parse("a..b->c").is_err());
        assert!(RenameHint::parse("a->a").is_err());
        assert!(RenameHint::parse("a.b.c.d->a.b.c.e").is_err());
    }

    #[test]
    fn test_hint_set_validation() {
        let err = DeterministicResolver::new(Dialect::PostgreSQL, ["a->b", "a->c"]).unwrap_err();
        assert_eq!(err, PlanningError::DuplicateRenameSource("a".into()));

        let err = DeterministicResolver::new(Dialect::PostgreSQL, ["a->c", "b->c"]).unwrap_err();
        assert_eq!(err, PlanningError::DuplicateRenameTarget("c".into()));

        let err = DeterministicResolver::new(Dialect::PostgreSQL, ["a->b", "b->a"]).unwrap_err();
        assert!(matches!(err, PlanningError::RenameCycle(_)));

        assert!(DeterministicResolver::new(Dialect::PostgreSQL, ["a->b", "b->c"]).is_ok());
    }

    #[test]
    fn test_deterministic_resolver_matches_both_halves() {
        let mut resolver =
            DeterministicResolver::new(Dialect::PostgreSQL, ["public.t1->public.t2"]).unwrap();
        let deleted = [table_candidate("public", "t1", "")];
        let created = [table_candidate("public", "t2", "")];
        assert_eq!(
            resolver
                .resolve(EntityKind::Table, &deleted, &created)
                .unwrap(),
            Decision::Rename {
                from: EntityKey::table("public", "t1"),
                to: EntityKey::table("public", "t2"),
            }
        );

        let other = [table_candidate("public", "t3", "")];
        assert_eq!(
            resolver.resolve(EntityKind::Table, &deleted, &other).unwrap(),
            Decision::NoRename
        );
    }

    #[test]
    fn test_default_namespace_may_be_omitted() {
        let mut resolver = DeterministicResolver::new(Dialect::PostgreSQL, ["t1->t2"]).unwrap();
        let decision = resolver
            .resolve(
                EntityKind::Table,
                &[table_candidate("public", "t1", "")],
                &[table_candidate("public", "t2", "")],
            )
            .unwrap();
        assert!(matches!(decision, Decision::Rename { .. }));
    }

    #[test]
    fn test_strict_mode_reports_ambiguity() {
        let mut resolver = DeterministicResolver::new(Dialect::PostgreSQL, Vec::<String>::new())
            .unwrap()
            .strict();
        let err = resolver
            .resolve(
                EntityKind::Table,
                &[table_candidate("public", "t1", "")],
                &[table_candidate("public", "t2", "")],
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { .. }));
    }

    #[test]
    fn test_heuristic_resolver_requires_same_shape() {
        let mut resolver = HeuristicResolver;
        let deleted = [table_candidate("public", "t1", "id:integer")];
        let same = [table_candidate("public", "t2", "id:integer")];
        let different = [table_candidate("public", "t2", "id:text")];

        assert!(matches!(
            resolver.resolve(EntityKind::Table, &deleted, &same).unwrap(),
            Decision::Rename { .. }
        ));
        assert_eq!(
            resolver
                .resolve(EntityKind::Table, &deleted, &different)
                .unwrap(),
            Decision::NoRename
        );
    }
}
