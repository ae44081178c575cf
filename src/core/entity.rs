//! Entity identifiers and the entity arena

use crate::{Result, RulesError};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Simple integer ID for game objects (cards, tokens, abilities on the stack)
///
/// IDs are never reused within a game, so a stale id can be detected by a
/// failed lookup instead of silently aliasing a new object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    pub fn new(id: u32) -> Self {
        EntityId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player identifier, distinct from object ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u32);

impl PlayerId {
    pub fn new(id: u32) -> Self {
        PlayerId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Central storage for all game entities
///
/// Uses FxHashMap for fast hashing of integer keys. Iteration order is not
/// part of the game state; callers that need a stable order use [`EntityStore::ids`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStore<T> {
    entities: FxHashMap<EntityId, T>,
    next_id: u32,
}

impl<T> EntityStore<T> {
    pub fn new() -> Self {
        EntityStore {
            entities: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// Generate a new unique EntityId
    pub fn next_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: EntityId, entity: T) {
        self.entities.insert(id, entity);
    }

    pub fn get(&self, id: EntityId) -> Result<&T> {
        self.entities
            .get(&id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))
    }

    pub fn get_mut(&mut self, id: EntityId) -> Result<&mut T> {
        self.entities
            .get_mut(&id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))
    }

    /// Lookup that treats a missing entity as absent rather than an error
    pub fn find(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    /// All ids in ascending order
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &T)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
