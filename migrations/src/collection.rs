//! Generic entity collection for DDL storage
//!
//! A `Collection<E>` stores entities of one kind in insertion order with an
//! index on their [`EntityKey`]. The normalizer is the only writer; every
//! other stage reads.

use crate::traits::{Entity, EntityKey};
use std::collections::HashMap;

/// Generic collection for any DDL entity type.
///
/// Provides O(1) lookup via an internal index, along with standard
/// collection operations like push, list, delete.
#[derive(Debug, Clone)]
pub struct Collection<E: Entity> {
    entities: Vec<E>,
    /// Index from entity key to position for fast lookups
    index: HashMap<EntityKey, usize>,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Collection<E> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Push an entity, returns true if inserted, false if duplicate key
    pub fn push(&mut self, entity: E) -> bool {
        let key = entity.key();
        if self.index.contains_key(&key) {
            return false;
        }
        let idx = self.entities.len();
        self.entities.push(entity);
        self.index.insert(key, idx);
        true
    }

    /// Get an entity by its key
    pub fn get(&self, key: &EntityKey) -> Option<&E> {
        self.index.get(key).map(|&idx| &self.entities[idx])
    }

    /// Check if an entity with the given key exists
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.contains_key(key)
    }

    /// Delete an entity by key, returns the removed entity if found
    pub fn delete(&mut self, key: &EntityKey) -> Option<E> {
        let idx = self.index.remove(key)?;
        let removed = self.entities.swap_remove(idx);
        if idx < self.entities.len() {
            // Update index for the element that was swapped in
            let swapped_key = self.entities[idx].key();
            self.index.insert(swapped_key, idx);
        }
        Some(removed)
    }

    /// List all entities
    pub fn list(&self) -> &[E] {
        &self.entities
    }

    /// Check if collection is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get the count of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over entities
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.iter()
    }

    /// Entities sorted by key, for deterministic output
    pub fn sorted(&self) -> Vec<&E> {
        let mut all: Vec<&E> = self.entities.iter().collect();
        all.sort_by_key(|e| e.key());
        all
    }

    /// Filter entities matching a predicate
    pub fn filter<P>(&self, predicate: P) -> Vec<&E>
    where
        P: Fn(&E) -> bool,
    {
        self.entities.iter().filter(|e| predicate(*e)).collect()
    }

    /// Entities whose parent key equals `parent`
    pub fn children_of(&self, parent: &EntityKey) -> Vec<&E> {
        self.filter(|e| e.parent_key().as_ref() == Some(parent))
    }
}
