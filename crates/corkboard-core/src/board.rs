//! The shared entity collection for one board.

use kurbo::Rect;
use std::collections::HashMap;

use crate::connection::{Connection, ConnectionGraph};
use crate::entity::{BoardId, Entity, EntityId};
use crate::geometry::aabb_overlaps;

/// Entities keyed by id, the connection graph between them, and the z counter.
///
/// This is the single mutable collection that gestures, selection and remote
/// events all work against.
#[derive(Debug, Clone)]
pub struct Board {
    /// Board (workspace) identifier; stamped onto locally created records.
    pub id: BoardId,
    entities: HashMap<EntityId, Entity>,
    /// Edges between entities.
    pub connections: ConnectionGraph,
    /// Highest z-index handed out or observed so far.
    z_counter: i64,
}

impl Board {
    /// Create an empty board.
    pub fn new(id: BoardId) -> Self {
        Self {
            id,
            entities: HashMap::new(),
            connections: ConnectionGraph::new(),
            z_counter: 0,
        }
    }

    /// Replace all content with a full snapshot.
    pub fn load_snapshot(&mut self, entities: Vec<Entity>, connections: Vec<Connection>) {
        self.entities.clear();
        self.connections.clear();
        self.z_counter = 0;
        for entity in entities {
            self.upsert_entity(entity);
        }
        for connection in connections {
            if !self.connections.insert(connection) {
                log::debug!("snapshot contained a duplicate or self-looped connection; skipped");
            }
        }
        let pruned = self.prune_dangling();
        if !pruned.is_empty() {
            log::warn!("snapshot contained {} connection(s) to missing entities", pruned.len());
        }
    }

    /// Take the next z-index from the board-wide counter.
    pub fn next_z(&mut self) -> i64 {
        self.z_counter += 1;
        self.z_counter
    }

    /// Highest z-index seen so far.
    pub fn max_z(&self) -> i64 {
        self.z_counter
    }

    /// Insert or replace an entity; geometry is normalized and the z counter advanced past it.
    pub fn upsert_entity(&mut self, mut entity: Entity) {
        entity.normalize();
        self.z_counter = self.z_counter.max(entity.z_index);
        self.entities.insert(entity.id, entity);
    }

    /// Add a brand-new entity on top of everything else.
    pub fn add_entity(&mut self, mut entity: Entity) -> EntityId {
        entity.z_index = self.next_z();
        let id = entity.id;
        self.upsert_entity(entity);
        id
    }

    /// Remove an entity and every connection touching it.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<(Entity, Vec<Connection>)> {
        let entity = self.entities.remove(&id)?;
        let connections = self.connections.remove_for_entity(id);
        Some((entity, connections))
    }

    /// Assign a fresh top z-index to the entity. Returns the new value.
    pub fn bring_to_front(&mut self, id: EntityId) -> Option<i64> {
        if !self.entities.contains_key(&id) {
            return None;
        }
        let z = self.next_z();
        let entity = self.entities.get_mut(&id)?;
        entity.z_index = z;
        Some(z)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// All entities in draw order: `(z_index, id)` ascending.
    pub fn entities_ordered(&self) -> Vec<&Entity> {
        let mut ordered: Vec<&Entity> = self.entities.values().collect();
        ordered.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        ordered
    }

    /// Ids of entities whose scaled AABB overlaps `rect` (world space).
    pub fn entities_in_rect(&self, rect: Rect) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| aabb_overlaps(e.aabb(), rect))
            .map(|e| e.id)
            .collect()
    }

    /// Drop connections whose endpoints no longer exist.
    pub fn prune_dangling(&mut self) -> Vec<Connection> {
        let entities = &self.entities;
        self.connections.prune_dangling(|id| entities.contains_key(&id))
    }

    /// Union of all entity AABBs.
    pub fn bounds(&self) -> Option<Rect> {
        self.entities.values().map(Entity::aabb).reduce(|acc, r| acc.union(r))
    }

    /// Remove all entities and connections.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.connections.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
