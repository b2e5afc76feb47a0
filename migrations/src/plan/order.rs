//! Dependency ordering helpers for the planner

use crate::ddl::RelationSet;
use crate::traits::EntityKey;
use std::collections::BTreeSet;

/// Result of topological sorting with circular dependency detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologicalOrder<K> {
    /// Sorted nodes
    pub items: Vec<K>,
    /// Whether circular dependencies were detected
    pub has_circular_deps: bool,
}

/// Sort `nodes` so that every node comes after the nodes it depends on.
///
/// Nodes are released in rounds: each round takes every remaining node
/// whose dependencies are satisfied, in key order. When a round releases
/// nothing the rest form a cycle and are appended in key order.
pub fn topological<K, F>(nodes: &[K], depends_on: F) -> TopologicalOrder<K>
where
    K: Ord + Clone,
    F: Fn(&K, &K) -> bool,
{
    let mut remaining: BTreeSet<K> = nodes.iter().cloned().collect();
    let mut satisfied: BTreeSet<K> = BTreeSet::new();
    let mut items = Vec::with_capacity(remaining.len());
    let mut has_circular_deps = false;

    while !remaining.is_empty() {
        let ready: Vec<K> = remaining
            .iter()
            .filter(|node| {
                remaining
                    .iter()
                    .filter(|other| *other != *node)
                    .all(|other| !depends_on(node, other) || satisfied.contains(other))
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            has_circular_deps = true;
            items.extend(remaining.iter().cloned());
            break;
        }

        for node in ready {
            remaining.remove(&node);
            satisfied.insert(node.clone());
            items.push(node);
        }
    }

    TopologicalOrder {
        items,
        has_circular_deps,
    }
}

/// Order tables for CREATE: referenced tables come first
pub fn sort_for_create(tables: &[EntityKey], relations: &RelationSet) -> TopologicalOrder<EntityKey> {
    topological(tables, |table, other| relations.contains(table, other))
}

/// Order tables for DROP: tables with foreign keys come first
pub fn sort_for_drop(tables: &[EntityKey], relations: &RelationSet) -> TopologicalOrder<EntityKey> {
    let create = sort_for_create(tables, relations);
    TopologicalOrder {
        items: create.items.into_iter().rev().collect(),
        has_circular_deps: create.has_circular_deps,
    }
}

/// Order renames so a name is vacated before another entity takes it:
/// with `a -> b` and `b -> c`, `b -> c` runs first.
pub fn sort_renames<K: Ord + Clone>(renames: &[(K, K)]) -> Vec<(K, K)> {
    topological(renames, |rename, other| rename.1 == other.0).items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> EntityKey {
        EntityKey::table("public", name)
    }

    #[test]
    fn test_referenced_tables_are_created_first() {
        let mut relations = RelationSet::default();
        relations.insert(key("posts"), key("users"));
        relations.insert(key("comments"), key("posts"));

        let order = sort_for_create(&[key("comments"), key("posts"), key("users")], &relations);
        assert!(!order.has_circular_deps);
        assert_eq!(order.items, vec![key("users"), key("posts"), key("comments")]);

        let drop = sort_for_drop(&[key("users"), key("posts"), key("comments")], &relations);
        assert_eq!(drop.items, vec![key("comments"), key("posts"), key("users")]);
    }

    #[test]
    fn test_cycles_are_detected() {
        let mut relations = RelationSet::default();
        relations.insert(key("a"), key("b"));
        relations.insert(key("b"), key("a"));
        relations.insert(key("c"), key("c"));

        let order = sort_for_create(&[key("a"), key("b"), key("c")], &relations);
        assert!(order.has_circular_deps);
        // the self reference does not block c
        assert_eq!(order.items, vec![key("c"), key("a"), key("b")]);
    }

    #[test]
    fn test_relations_outside_the_set_are_ignored() {
        let mut relations = RelationSet::default();
        relations.insert(key("posts"), key("users"));
        let order = sort_for_create(&[key("posts")], &relations);
        assert_eq!(order.items, vec![key("posts")]);
    }

    #[test]
    fn test_rename_chains_vacate_names_first() {
        let renames = vec![("a", "b"), ("b", "c")];
        assert_eq!(sort_renames(&renames), vec![("b", "c"), ("a", "b")]);
    }
}
