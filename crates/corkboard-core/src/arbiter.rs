//! Arbitration between local gestures and incoming remote changes.
//!
//! Entities owned by an in-progress gesture sit in the guard set. Remote
//! updates to a guarded entity are held back so they cannot yank the entity
//! out from under the pointer; once the gesture ends, the guard is released
//! and later updates apply as usual (last writer wins). Deletes always apply.

use std::collections::HashSet;

use crate::board::Board;
use crate::entity::EntityId;
use crate::sync::{ChangeOp, RemoteChange};

/// What happened to a remote change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// Merged into the board.
    Applied,
    /// An entity was removed, together with its connections.
    Removed(EntityId),
    /// Held back because the entity is guarded by a local gesture.
    Suppressed,
    /// Not applicable here (other board, unknown id, duplicate pair, bad record).
    Ignored,
}

impl RemoteOutcome {
    /// Whether the board changed.
    pub fn changed(&self) -> bool {
        matches!(self, RemoteOutcome::Applied | RemoteOutcome::Removed(_))
    }
}

/// Guard set plus the merge rules for remote changes.
#[derive(Debug, Clone, Default)]
pub struct SyncArbiter {
    guarded: HashSet<EntityId>,
}

impl SyncArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shield the given ids until [`release`](Self::release).
    pub fn guard(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        self.guarded.extend(ids);
    }

    /// Drop every guard.
    pub fn release(&mut self) {
        self.guarded.clear();
    }

    /// Drop the guard on one id.
    pub fn unguard(&mut self, id: EntityId) {
        self.guarded.remove(&id);
    }

    pub fn is_guarded(&self, id: EntityId) -> bool {
        self.guarded.contains(&id)
    }

    pub fn guarded(&self) -> &HashSet<EntityId> {
        &self.guarded
    }

    /// Merge one remote change into `board`.
    pub fn apply(&mut self, change: RemoteChange, board: &mut Board) -> RemoteOutcome {
        if change.board_id().is_some_and(|target| target != board.id) {
            return RemoteOutcome::Ignored;
        }

        match change {
            RemoteChange::Entity { op, entity } => {
                if self.is_guarded(entity.id) {
                    log::debug!("remote {:?} for guarded entity {} suppressed", op, entity.id);
                    return RemoteOutcome::Suppressed;
                }
                if op == ChangeOp::Insert && board.contains(entity.id) {
                    log::debug!("remote insert for existing entity {} merged as update", entity.id);
                }
                board.upsert_entity(entity);
                RemoteOutcome::Applied
            }
            RemoteChange::EntityDeleted { id, .. } => {
                self.unguard(id);
                match board.remove_entity(id) {
                    Some((_, connections)) => {
                        log::debug!(
                            "remote delete of {} removed {} connection(s)",
                            id,
                            connections.len()
                        );
                        RemoteOutcome::Removed(id)
                    }
                    None => RemoteOutcome::Ignored,
                }
            }
            RemoteChange::Connection { op, connection } => {
                let known = board.connections.get(connection.id).is_some();
                if op == ChangeOp::Insert
                    && !known
                    && board
                        .connections
                        .contains_pair(connection.source_entity_id, connection.target_entity_id)
                {
                    log::debug!(
                        "remote connection {} duplicates an existing pair; dropped",
                        connection.id
                    );
                    return RemoteOutcome::Ignored;
                }
                if board.connections.upsert(connection) {
                    RemoteOutcome::Applied
                } else {
                    RemoteOutcome::Ignored
                }
            }
            RemoteChange::ConnectionDeleted { id, .. } => match board.connections.remove(id) {
                Some(_) => RemoteOutcome::Applied,
                None => RemoteOutcome::Ignored,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::entity::{Entity, EntityKind};
    use kurbo::Point;
    use uuid::Uuid;

    fn setup() -> (Board, Entity) {
        let mut board = Board::new(Uuid::new_v4());
        let entity = Entity::new(board.id, EntityKind::Photo, Point::new(10.0, 10.0));
        board.add_entity(entity.clone());
        let stored = board.get(entity.id).unwrap().clone();
        (board, stored)
    }

    fn moved(entity: &Entity, x: f64) -> RemoteChange {
        let mut remote = entity.clone();
        remote.x = x;
        RemoteChange::Entity { op: ChangeOp::Update, entity: remote }
    }

    #[test]
    fn test_guarded_update_suppressed_then_applied_after_release() {
        let (mut board, entity) = setup();
        let mut arbiter = SyncArbiter::new();
        arbiter.guard([entity.id]);

        assert_eq!(arbiter.apply(moved(&entity, 999.0), &mut board), RemoteOutcome::Suppressed);
        assert!((board.get(entity.id).unwrap().x - 10.0).abs() < f64::EPSILON);

        arbiter.release();
        assert_eq!(arbiter.apply(moved(&entity, 555.0), &mut board), RemoteOutcome::Applied);
        assert!((board.get(entity.id).unwrap().x - 555.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delete_wins_over_guard() {
        let (mut board, entity) = setup();
        let mut arbiter = SyncArbiter::new();
        arbiter.guard([entity.id]);
        let change = RemoteChange::EntityDeleted { id: entity.id, board_id: None };
        let outcome = arbiter.apply(change, &mut board);
        assert_eq!(outcome, RemoteOutcome::Removed(entity.id));
        assert!(!board.contains(entity.id));
        assert!(!arbiter.is_guarded(entity.id));
    }

    #[test]
    fn test_insert_of_existing_respects_guard() {
        let (mut board, entity) = setup();
        let mut arbiter = SyncArbiter::new();
        arbiter.guard([entity.id]);
        let mut remote = entity.clone();
        remote.y = -50.0;
        let change = RemoteChange::Entity { op: ChangeOp::Insert, entity: remote };
        let outcome = arbiter.apply(change, &mut board);
        assert_eq!(outcome, RemoteOutcome::Suppressed);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_other_board_ignored() {
        let (mut board, _) = setup();
        let stranger = Entity::new(Uuid::new_v4(), EntityKind::Marker, Point::ZERO);
        let change = RemoteChange::Entity { op: ChangeOp::Insert, entity: stranger };
        let outcome = SyncArbiter::new().apply(change, &mut board);
        assert_eq!(outcome, RemoteOutcome::Ignored);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_remote_insert_advances_z_counter() {
        let (mut board, _) = setup();
        let mut remote = Entity::new(board.id, EntityKind::Marker, Point::ZERO);
        remote.z_index = 90;
        let change = RemoteChange::Entity { op: ChangeOp::Insert, entity: remote };
        SyncArbiter::new().apply(change, &mut board);
        assert_eq!(board.next_z(), 91);
    }

    #[test]
    fn test_duplicate_pair_insert_dropped() {
        let (mut board, a) = setup();
        let b = board.add_entity(Entity::new(board.id, EntityKind::Marker, Point::ZERO));
        board.connections.insert(Connection::new(board.id, a.id, b, "red"));
        let mut arbiter = SyncArbiter::new();
        let dup = Connection::new(board.id, b, a.id, "blue");
        let change = RemoteChange::Connection { op: ChangeOp::Insert, connection: dup };
        let outcome = arbiter.apply(change, &mut board);
        assert_eq!(outcome, RemoteOutcome::Ignored);
        assert_eq!(board.connections.len(), 1);
    }

    #[test]
    fn test_connection_delete() {
        let (mut board, a) = setup();
        let b = board.add_entity(Entity::new(board.id, EntityKind::Marker, Point::ZERO));
        let conn = Connection::new(board.id, a.id, b, "red");
        board.connections.insert(conn.clone());
        let mut arbiter = SyncArbiter::new();
        let change = RemoteChange::ConnectionDeleted { id: conn.id, board_id: Some(board.id) };
        assert_eq!(arbiter.apply(change.clone(), &mut board), RemoteOutcome::Applied);
        assert_eq!(arbiter.apply(change, &mut board), RemoteOutcome::Ignored);
    }
}
