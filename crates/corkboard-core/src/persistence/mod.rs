//! Persistence abstraction.
//!
//! The engine never talks to storage directly. It emits [`PersistOp`]s and the
//! host hands them to [`flush`], which runs them against a
//! [`PersistenceGateway`] and logs whatever fails. There is no retry: the local
//! board stays as the user left it and the next write of the same record wins.

mod memory;
mod upload;

pub use memory::MemoryGateway;
pub use upload::{InlineUploader, Uploader};

use crate::connection::{Connection, ConnectionId};
use crate::entity::{BoardId, Entity, EntityId};
use crate::sync::{ChangeOp, RealtimeEvent, Table};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Persistence error: {0}")]
    Other(String),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistenceError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything stored for one board.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardSnapshot {
    pub entities: Vec<Entity>,
    pub connections: Vec<Connection>,
}

/// Trait for the remote store that entity and connection rows are written to.
pub trait PersistenceGateway: Send + Sync {
    /// Insert or replace entity rows.
    fn upsert_entities(&self, entities: &[Entity]) -> BoxFuture<'_, PersistResult<()>>;

    /// Insert or replace connection rows.
    fn upsert_connections(&self, connections: &[Connection]) -> BoxFuture<'_, PersistResult<()>>;

    /// Delete one entity row.
    fn delete_entity(&self, id: EntityId) -> BoxFuture<'_, PersistResult<()>>;

    /// Delete one connection row.
    fn delete_connection(&self, id: ConnectionId) -> BoxFuture<'_, PersistResult<()>>;

    /// Delete every entity and connection of a board.
    fn delete_all_for_board(&self, board: BoardId) -> BoxFuture<'_, PersistResult<()>>;

    /// Load everything stored for a board.
    fn load_board(&self, board: BoardId) -> BoxFuture<'_, PersistResult<BoardSnapshot>>;
}

/// One outbound write, produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    UpsertEntities(Vec<Entity>),
    UpsertConnections(Vec<Connection>),
    DeleteEntity(EntityId),
    DeleteConnection(ConnectionId),
    DeleteAllForBoard(BoardId),
}

impl PersistOp {
    /// Run this write against `gateway`.
    pub fn run<'a>(
        &'a self,
        gateway: &'a dyn PersistenceGateway,
    ) -> BoxFuture<'a, PersistResult<()>> {
        match self {
            PersistOp::UpsertEntities(entities) => gateway.upsert_entities(entities),
            PersistOp::UpsertConnections(connections) => gateway.upsert_connections(connections),
            PersistOp::DeleteEntity(id) => gateway.delete_entity(*id),
            PersistOp::DeleteConnection(id) => gateway.delete_connection(*id),
            PersistOp::DeleteAllForBoard(board) => gateway.delete_all_for_board(*board),
        }
    }

    /// Realtime events announcing this write to the other clients of a board.
    ///
    /// Upserts go out as updates; receivers merge inserts and updates alike.
    /// Clearing a board has no per-row event.
    pub fn to_events(&self, board: BoardId) -> Vec<RealtimeEvent> {
        match self {
            PersistOp::UpsertEntities(entities) => {
                entities.iter().map(|e| RealtimeEvent::entity(ChangeOp::Update, e)).collect()
            }
            PersistOp::UpsertConnections(connections) => connections
                .iter()
                .map(|c| RealtimeEvent::connection(ChangeOp::Update, c))
                .collect(),
            PersistOp::DeleteEntity(id) => {
                vec![RealtimeEvent::deleted(Table::Entities, board, *id)]
            }
            PersistOp::DeleteConnection(id) => {
                vec![RealtimeEvent::deleted(Table::Connections, board, *id)]
            }
            PersistOp::DeleteAllForBoard(_) => Vec::new(),
        }
    }

    /// Short description used in log lines.
    pub fn describe(&self) -> String {
        match self {
            PersistOp::UpsertEntities(entities) => {
                format!("upsert {} entity row(s)", entities.len())
            }
            PersistOp::UpsertConnections(connections) => {
                format!("upsert {} connection row(s)", connections.len())
            }
            PersistOp::DeleteEntity(id) => format!("delete entity {id}"),
            PersistOp::DeleteConnection(id) => format!("delete connection {id}"),
            PersistOp::DeleteAllForBoard(board) => format!("clear board {board}"),
        }
    }
}

/// Outcome of a [`flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run writes in order, logging failures and carrying on.
///
/// A failed write never stops the ones after it and is never retried.
pub async fn flush(gateway: &dyn PersistenceGateway, ops: &[PersistOp]) -> FlushReport {
    let mut report = FlushReport::default();
    for op in ops {
        match op.run(gateway).await {
            Ok(()) => report.succeeded += 1,
            Err(err) => {
                log::warn!("persistence write failed ({}): {}", op.describe(), err);
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use kurbo::Point;
    use uuid::Uuid;

    /// Gateway whose entity deletes always fail.
    struct FlakyGateway {
        inner: MemoryGateway,
    }

    impl PersistenceGateway for FlakyGateway {
        fn upsert_entities(&self, entities: &[Entity]) -> BoxFuture<'_, PersistResult<()>> {
            self.inner.upsert_entities(entities)
        }

        fn upsert_connections(
            &self,
            connections: &[Connection],
        ) -> BoxFuture<'_, PersistResult<()>> {
            self.inner.upsert_connections(connections)
        }

        fn delete_entity(&self, id: EntityId) -> BoxFuture<'_, PersistResult<()>> {
            Box::pin(async move { Err(PersistenceError::Backend(format!("row {id} is locked"))) })
        }

        fn delete_connection(&self, id: ConnectionId) -> BoxFuture<'_, PersistResult<()>> {
            self.inner.delete_connection(id)
        }

        fn delete_all_for_board(&self, board: BoardId) -> BoxFuture<'_, PersistResult<()>> {
            self.inner.delete_all_for_board(board)
        }

        fn load_board(&self, board: BoardId) -> BoxFuture<'_, PersistResult<BoardSnapshot>> {
            self.inner.load_board(board)
        }
    }

    #[test]
    fn test_flush_absorbs_failures() {
        let gateway = FlakyGateway { inner: MemoryGateway::new() };
        let board = Uuid::new_v4();
        let a = Entity::new(board, EntityKind::Photo, Point::ZERO);
        let b = Entity::new(board, EntityKind::Marker, Point::ZERO);
        let ops = vec![
            PersistOp::UpsertEntities(vec![a.clone()]),
            PersistOp::DeleteEntity(a.id),
            PersistOp::UpsertEntities(vec![b.clone()]),
        ];

        let report = pollster::block_on(flush(&gateway, &ops));
        assert_eq!(report, FlushReport { succeeded: 2, failed: 1 });

        let stored = pollster::block_on(gateway.load_board(board)).unwrap();
        assert_eq!(stored.entities.len(), 2);
    }

    #[test]
    fn test_delete_becomes_realtime_event() {
        let board = Uuid::new_v4();
        let id = Uuid::new_v4();
        let events = PersistOp::DeleteEntity(id).to_events(board);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].op, ChangeOp::Delete);
        assert_eq!(events[0].record_id(), Some(id));
        assert_eq!(events[0].board_id(), Some(board));
        assert!(PersistOp::DeleteAllForBoard(board).to_events(board).is_empty());
    }

    #[test]
    fn test_describe() {
        let op = PersistOp::UpsertEntities(Vec::new());
        assert_eq!(op.describe(), "upsert 0 entity row(s)");
    }
}
