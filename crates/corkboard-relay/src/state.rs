//! Per-board relay state: connected peers, a broadcast channel, and the
//! latest row per id (the in-memory persistence endpoint).

use corkboard_core::{BoardId, RealtimeEvent, RemoteChange, SyncError};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::protocol::{BoardRecords, ServerMessage};

const CHANNEL_CAPACITY: usize = 256;

/// Reasons a client change is refused.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Join a board first")]
    NotJoined,
    #[error("Change targets board {got}, but this connection is on {expected}")]
    WrongBoard { expected: BoardId, got: BoardId },
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Board state
struct BoardRoom {
    /// Broadcast channel for this board
    tx: broadcast::Sender<(String, ServerMessage)>,
    /// Connected peer ids
    peers: HashSet<String>,
    entities: HashMap<Uuid, Value>,
    connections: HashMap<Uuid, Value>,
}

impl BoardRoom {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            entities: HashMap::new(),
            connections: HashMap::new(),
        }
    }

    fn records(&self) -> BoardRecords {
        BoardRecords {
            entities: self.entities.values().cloned().collect(),
            connections: self.connections.values().cloned().collect(),
        }
    }

    /// Drop connection rows that reference `entity`.
    fn cascade(&mut self, entity: Uuid) {
        let entity = entity.to_string();
        let refers =
            |row: &Value, key: &str| row.get(key).and_then(Value::as_str) == Some(entity.as_str());
        self.connections
            .retain(|_, row| !refers(row, "sourceEntityId") && !refers(row, "targetEntityId"));
    }
}

/// Shared relay state
#[derive(Default)]
pub struct RelayState {
    boards: DashMap<BoardId, BoardRoom>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to a board
    pub fn join(
        &self,
        board: BoardId,
        peer_id: &str,
    ) -> (broadcast::Receiver<(String, ServerMessage)>, BoardRecords, usize) {
        let mut room = self.boards.entry(board).or_insert_with(BoardRoom::new);
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), room.records(), room.peers.len())
    }

    /// Remove a peer; the board's rows go once its last peer leaves
    pub fn leave(&self, board: BoardId, peer_id: &str) {
        let empty = match self.boards.get_mut(&board) {
            Some(mut room) => {
                room.peers.remove(peer_id);
                room.peers.is_empty()
            }
            None => false,
        };
        if empty {
            self.boards.remove(&board);
        }
    }

    /// Validate a change and store its row
    pub fn apply_change(&self, board: BoardId, event: &RealtimeEvent) -> Result<(), RelayError> {
        let change = event.decode()?;
        if let Some(got) = change.board_id().filter(|got| *got != board) {
            return Err(RelayError::WrongBoard { expected: board, got });
        }
        let mut room = self.boards.get_mut(&board).ok_or(RelayError::NotJoined)?;
        match change {
            RemoteChange::Entity { entity, .. } => {
                room.entities.insert(entity.id, event.record.clone());
            }
            RemoteChange::Connection { connection, .. } => {
                room.connections.insert(connection.id, event.record.clone());
            }
            RemoteChange::EntityDeleted { id, .. } => {
                room.entities.remove(&id);
                room.cascade(id);
            }
            RemoteChange::ConnectionDeleted { id, .. } => {
                room.connections.remove(&id);
            }
        }
        Ok(())
    }

    /// Delete every row of a board
    pub fn clear(&self, board: BoardId) {
        if let Some(mut room) = self.boards.get_mut(&board) {
            room.entities.clear();
            room.connections.clear();
        }
    }

    /// Current rows of a board
    pub fn records(&self, board: BoardId) -> BoardRecords {
        self.boards.get(&board).map(|room| room.records()).unwrap_or_default()
    }

    /// Broadcast a message to a board's peers
    pub fn broadcast(&self, board: BoardId, from: &str, msg: ServerMessage) {
        if let Some(room) = self.boards.get(&board) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    pub fn is_open(&self, board: BoardId) -> bool {
        self.boards.contains_key(&board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corkboard_core::{ChangeOp, Table};
    use corkboard_core::{Connection, Entity, EntityKind};

    fn note(board: BoardId) -> Entity {
        let mut entity = Entity::new(board, EntityKind::TextNote, Default::default());
        entity.content = serde_json::json!({ "text": "alibi" });
        entity
    }

    #[test]
    fn test_changes_stay_on_their_board() {
        let state = RelayState::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (mut rx_a, _, _) = state.join(a, "p1");
        let (mut rx_b, _, _) = state.join(b, "p2");

        let event = RealtimeEvent::entity(ChangeOp::Insert, &note(a));
        state.apply_change(a, &event).unwrap();
        state.broadcast(a, "p1", ServerMessage::Change { from: "p1".into(), event });

        assert_eq!(state.records(a).entities.len(), 1);
        assert!(state.records(b).entities.is_empty());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_wrong_board_rejected() {
        let state = RelayState::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        state.join(a, "p1");
        let event = RealtimeEvent::entity(ChangeOp::Insert, &note(b));
        assert!(matches!(state.apply_change(a, &event), Err(RelayError::WrongBoard { .. })));
        assert!(state.records(a).entities.is_empty());
    }

    #[test]
    fn test_change_before_join_rejected() {
        let state = RelayState::new();
        let board = Uuid::new_v4();
        let event = RealtimeEvent::entity(ChangeOp::Insert, &note(board));
        assert!(matches!(state.apply_change(board, &event), Err(RelayError::NotJoined)));
    }

    #[test]
    fn test_latest_row_wins_and_delete_cascades() {
        let state = RelayState::new();
        let board = Uuid::new_v4();
        state.join(board, "p1");
        let mut x = note(board);
        let y = note(board);
        state.apply_change(board, &RealtimeEvent::entity(ChangeOp::Insert, &x)).unwrap();
        state.apply_change(board, &RealtimeEvent::entity(ChangeOp::Insert, &y)).unwrap();
        x.x = 77.0;
        state.apply_change(board, &RealtimeEvent::entity(ChangeOp::Update, &x)).unwrap();
        let edge = Connection::new(board, x.id, y.id, "#c0392b");
        state.apply_change(board, &RealtimeEvent::connection(ChangeOp::Insert, &edge)).unwrap();

        let records = state.records(board);
        assert_eq!(records.entities.len(), 2);
        assert!(records.entities.iter().any(|row| row["x"] == 77.0));
        assert_eq!(records.connections.len(), 1);

        state
            .apply_change(board, &RealtimeEvent::deleted(Table::Entities, board, x.id))
            .unwrap();
        let records = state.records(board);
        assert_eq!(records.entities.len(), 1);
        assert!(records.connections.is_empty());
    }

    #[test]
    fn test_last_peer_leaving_drops_board() {
        let state = RelayState::new();
        let board = Uuid::new_v4();
        state.join(board, "p1");
        let (_, _, count) = state.join(board, "p2");
        assert_eq!(count, 2);
        state.leave(board, "p1");
        assert!(state.is_open(board));
        state.leave(board, "p2");
        assert!(!state.is_open(board));
    }

    #[test]
    fn test_undecodable_change_rejected() {
        let state = RelayState::new();
        let board = Uuid::new_v4();
        state.join(board, "p1");
        let event = RealtimeEvent {
            table: Table::Entities,
            op: ChangeOp::Update,
            record: serde_json::json!({ "id": false }),
        };
        assert!(matches!(state.apply_change(board, &event), Err(RelayError::Sync(_))));
    }
}
