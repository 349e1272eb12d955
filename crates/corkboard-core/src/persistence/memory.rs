//! In-memory persistence gateway.

use super::{BoardSnapshot, BoxFuture, PersistResult, PersistenceError, PersistenceGateway};
use crate::connection::{Connection, ConnectionId};
use crate::entity::{BoardId, Entity, EntityId};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Rows {
    entities: HashMap<EntityId, Entity>,
    connections: HashMap<ConnectionId, Connection>,
}

/// In-memory gateway for tests and offline use.
#[derive(Default)]
pub struct MemoryGateway {
    rows: RwLock<Rows>,
}

fn lock_error(e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Other(format!("Lock error: {}", e))
}

impl MemoryGateway {
    /// Create a new empty gateway.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn upsert_entities(&self, entities: &[Entity]) -> BoxFuture<'_, PersistResult<()>> {
        let entities = entities.to_vec();
        Box::pin(async move {
            let mut rows = self.rows.write().map_err(lock_error)?;
            for entity in entities {
                rows.entities.insert(entity.id, entity);
            }
            Ok(())
        })
    }

    fn upsert_connections(&self, connections: &[Connection]) -> BoxFuture<'_, PersistResult<()>> {
        let connections = connections.to_vec();
        Box::pin(async move {
            let mut rows = self.rows.write().map_err(lock_error)?;
            for connection in connections {
                rows.connections.insert(connection.id, connection);
            }
            Ok(())
        })
    }

    fn delete_entity(&self, id: EntityId) -> BoxFuture<'_, PersistResult<()>> {
        Box::pin(async move {
            let mut rows = self.rows.write().map_err(lock_error)?;
            rows.entities
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
        })
    }

    fn delete_connection(&self, id: ConnectionId) -> BoxFuture<'_, PersistResult<()>> {
        Box::pin(async move {
            let mut rows = self.rows.write().map_err(lock_error)?;
            rows.connections
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
        })
    }

    fn delete_all_for_board(&self, board: BoardId) -> BoxFuture<'_, PersistResult<()>> {
        Box::pin(async move {
            let mut rows = self.rows.write().map_err(lock_error)?;
            rows.entities.retain(|_, e| e.board_id != board);
            rows.connections.retain(|_, c| c.board_id != board);
            Ok(())
        })
    }

    fn load_board(&self, board: BoardId) -> BoxFuture<'_, PersistResult<BoardSnapshot>> {
        Box::pin(async move {
            let rows = self.rows.read().map_err(lock_error)?;
            Ok(BoardSnapshot {
                entities: rows
                    .entities
                    .values()
                    .filter(|e| e.board_id == board)
                    .cloned()
                    .collect(),
                connections: rows
                    .connections
                    .values()
                    .filter(|c| c.board_id == board)
                    .cloned()
                    .collect(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use kurbo::Point;
    use pollster::block_on;
    use uuid::Uuid;

    #[test]
    fn test_upsert_and_load() {
        let gateway = MemoryGateway::new();
        let board = Uuid::new_v4();
        let mut entity = Entity::new(board, EntityKind::Dossier, Point::ZERO);
        block_on(gateway.upsert_entities(&[entity.clone()])).unwrap();
        entity.x = 42.0;
        block_on(gateway.upsert_entities(&[entity.clone()])).unwrap();

        let snapshot = block_on(gateway.load_board(board)).unwrap();
        assert_eq!(snapshot.entities, vec![entity]);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let gateway = MemoryGateway::new();
        let result = block_on(gateway.delete_entity(Uuid::new_v4()));
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn test_delete_all_for_board_is_scoped() {
        let gateway = MemoryGateway::new();
        let (mine, theirs) = (Uuid::new_v4(), Uuid::new_v4());
        let a = Entity::new(mine, EntityKind::Marker, Point::ZERO);
        let b = Entity::new(mine, EntityKind::Marker, Point::ZERO);
        let c = Entity::new(theirs, EntityKind::Marker, Point::ZERO);
        block_on(gateway.upsert_entities(&[a.clone(), b.clone(), c])).unwrap();
        block_on(gateway.upsert_connections(&[Connection::new(mine, a.id, b.id, "red")])).unwrap();

        block_on(gateway.delete_all_for_board(mine)).unwrap();
        assert_eq!(block_on(gateway.load_board(mine)).unwrap(), BoardSnapshot::default());
        assert_eq!(block_on(gateway.load_board(theirs)).unwrap().entities.len(), 1);
    }
}
