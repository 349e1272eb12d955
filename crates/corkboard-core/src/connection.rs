//! Connection graph: undirected edges between entities, stored by id pair.
//!
//! Edges never hold references to entities. Referential integrity is checked
//! when the graph is read, so an edge whose endpoint disappeared is simply
//! pruned instead of dangling.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{BoardId, EntityId};

/// Unique identifier for a connection.
pub type ConnectionId = Uuid;

/// A string drawn between two entities' pins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub board_id: BoardId,
    pub source_entity_id: EntityId,
    pub target_entity_id: EntityId,
    pub color: String,
}

impl Connection {
    /// Create a connection with a fresh id.
    pub fn new(
        board_id: BoardId,
        source: EntityId,
        target: EntityId,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            board_id,
            source_entity_id: source,
            target_entity_id: target,
            color: color.into(),
        }
    }

    /// Whether either endpoint is `id`.
    pub fn touches(&self, id: EntityId) -> bool {
        self.source_entity_id == id || self.target_entity_id == id
    }

    /// Whether this edge joins `a` and `b`, in either direction.
    pub fn joins(&self, a: EntityId, b: EntityId) -> bool {
        (self.source_entity_id == a && self.target_entity_id == b)
            || (self.source_entity_id == b && self.target_entity_id == a)
    }
}

/// Edge list keyed by entity ids, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    edges: Vec<Connection>,
}

impl ConnectionGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `a` and `b` are already connected in either direction.
    pub fn contains_pair(&self, a: EntityId, b: EntityId) -> bool {
        self.edges.iter().any(|c| c.joins(a, b))
    }

    /// Add an edge unless it is a self-loop, a duplicate id, or repeats an existing pair.
    ///
    /// Returns true when the edge was added.
    pub fn insert(&mut self, connection: Connection) -> bool {
        if connection.source_entity_id == connection.target_entity_id {
            return false;
        }
        if self.get(connection.id).is_some()
            || self.contains_pair(connection.source_entity_id, connection.target_entity_id)
        {
            return false;
        }
        self.edges.push(connection);
        true
    }

    /// Insert, or overwrite the edge with the same id.
    ///
    /// An overwrite that would duplicate another edge's pair is refused.
    pub fn upsert(&mut self, connection: Connection) -> bool {
        let clash = self
            .edges
            .iter()
            .any(|c| {
                c.id != connection.id
                    && c.joins(connection.source_entity_id, connection.target_entity_id)
            });
        if clash || connection.source_entity_id == connection.target_entity_id {
            return false;
        }
        match self.edges.iter_mut().find(|c| c.id == connection.id) {
            Some(existing) => *existing = connection,
            None => self.edges.push(connection),
        }
        true
    }

    /// Look up an edge by id.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.edges.iter().find(|c| c.id == id)
    }

    /// Remove an edge by id.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let idx = self.edges.iter().position(|c| c.id == id)?;
        Some(self.edges.remove(idx))
    }

    /// Remove every edge touching `entity`, returning what was removed.
    pub fn remove_for_entity(&mut self, entity: EntityId) -> Vec<Connection> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.edges.drain(..).partition(|c| c.touches(entity));
        self.edges = kept;
        removed
    }

    /// Drop edges whose endpoints fail `exists`, returning the pruned edges.
    pub fn prune_dangling(&mut self, exists: impl Fn(EntityId) -> bool) -> Vec<Connection> {
        let (kept, pruned): (Vec<_>, Vec<_>) = self
            .edges
            .drain(..)
            .partition(|c| exists(c.source_entity_id) && exists(c.target_entity_id));
        self.edges = kept;
        if !pruned.is_empty() {
            log::debug!("pruned {} dangling connection(s)", pruned.len());
        }
        pruned
    }

    /// All edges, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.edges.iter()
    }

    /// Edges touching `entity`.
    pub fn for_entity(&self, entity: EntityId) -> impl Iterator<Item = &Connection> {
        self.edges.iter().filter(move |c| c.touches(entity))
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.edges.clear();
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(a: EntityId, b: EntityId) -> Connection {
        Connection::new(Uuid::nil(), a, b, "#c0392b")
    }

    #[test]
    fn test_dedup_unordered_pair() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ConnectionGraph::new();
        assert!(graph.insert(edge(a, b)));
        assert!(!graph.insert(edge(a, b)));
        assert!(!graph.insert(edge(b, a)));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_rejects_self_loop() {
        let a = Uuid::new_v4();
        let mut graph = ConnectionGraph::new();
        assert!(!graph.insert(edge(a, a)));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_remove_for_entity_leaves_unrelated() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ConnectionGraph::new();
        graph.insert(edge(a, b));
        graph.insert(edge(c, a));
        graph.insert(edge(c, d));

        let removed = graph.remove_for_entity(a);
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.len(), 1);
        assert!(graph.contains_pair(c, d));
    }

    #[test]
    fn test_prune_dangling() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ConnectionGraph::new();
        graph.insert(edge(a, b));
        graph.insert(edge(b, c));

        let pruned = graph.prune_dangling(|id| id != c);
        assert_eq!(pruned.len(), 1);
        assert!(graph.contains_pair(a, b));
        assert!(!graph.contains_pair(b, c));
    }

    #[test]
    fn test_upsert_overwrites_by_id() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ConnectionGraph::new();
        let mut conn = edge(a, b);
        graph.insert(conn.clone());
        conn.color = "#2c3e50".to_string();
        assert!(graph.upsert(conn.clone()));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(conn.id).unwrap().color, "#2c3e50");
    }

    #[test]
    fn test_upsert_refuses_pair_clash() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut graph = ConnectionGraph::new();
        graph.insert(edge(a, b));
        assert!(!graph.upsert(edge(b, a)));
        assert_eq!(graph.len(), 1);
    }
}
