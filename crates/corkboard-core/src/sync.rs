//! Realtime change events as they travel over the wire.
//!
//! The channel carries `{table, op, record}` objects. Records stay raw JSON
//! until [`RealtimeEvent::decode`] turns them into a typed [`RemoteChange`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::connection::{Connection, ConnectionId};
use crate::entity::{BoardId, Entity, EntityId};

/// Which collection a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Entities,
    Connections,
}

/// The kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Errors raised while decoding realtime events.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Malformed realtime event: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Undecodable {table:?} record: {source}")]
    Record {
        table: Table,
        #[source]
        source: serde_json::Error,
    },
}

/// A change event on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub table: Table,
    pub op: ChangeOp,
    pub record: Value,
}

/// Minimal shape of a deleted row: only the keys are guaranteed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletedRecord {
    id: uuid::Uuid,
    #[serde(default)]
    board_id: Option<BoardId>,
}

/// A decoded remote change.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteChange {
    /// Insert or update of an entity.
    Entity { op: ChangeOp, entity: Entity },
    EntityDeleted { id: EntityId, board_id: Option<BoardId> },
    /// Insert or update of a connection.
    Connection { op: ChangeOp, connection: Connection },
    ConnectionDeleted { id: ConnectionId, board_id: Option<BoardId> },
}

impl RemoteChange {
    /// The board the change targets, when the record says.
    pub fn board_id(&self) -> Option<BoardId> {
        match self {
            RemoteChange::Entity { entity, .. } => Some(entity.board_id),
            RemoteChange::Connection { connection, .. } => Some(connection.board_id),
            RemoteChange::EntityDeleted { board_id, .. }
            | RemoteChange::ConnectionDeleted { board_id, .. } => *board_id,
        }
    }
}

impl RealtimeEvent {
    /// Parse an event from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event carrying any serializable row.
    pub fn try_record<T: Serialize>(
        table: Table,
        op: ChangeOp,
        row: &T,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            table,
            op,
            record: serde_json::to_value(row)?,
        })
    }

    /// Event for an inserted or updated entity.
    pub fn entity(op: ChangeOp, entity: &Entity) -> Self {
        Self::try_record(Table::Entities, op, entity).unwrap_or_else(|err| {
            log::warn!("entity {} not encodable: {}", entity.id, err);
            Self::key_only(Table::Entities, op, entity.board_id, entity.id)
        })
    }

    /// Event for an inserted or updated connection.
    pub fn connection(op: ChangeOp, connection: &Connection) -> Self {
        Self::try_record(Table::Connections, op, connection).unwrap_or_else(|err| {
            log::warn!("connection {} not encodable: {}", connection.id, err);
            Self::key_only(Table::Connections, op, connection.board_id, connection.id)
        })
    }

    /// Event whose record holds only the row's keys.
    fn key_only(table: Table, op: ChangeOp, board_id: BoardId, id: uuid::Uuid) -> Self {
        Self {
            table,
            op,
            record: serde_json::json!({ "id": id, "boardId": board_id }),
        }
    }

    /// Event for a deleted row.
    pub fn deleted(table: Table, board_id: BoardId, id: uuid::Uuid) -> Self {
        Self::key_only(table, ChangeOp::Delete, board_id, id)
    }

    /// Id of the record, if it has one.
    pub fn record_id(&self) -> Option<uuid::Uuid> {
        self.record.get("id")?.as_str()?.parse().ok()
    }

    /// Board id of the record, if it has one.
    pub fn board_id(&self) -> Option<BoardId> {
        self.record.get("boardId")?.as_str()?.parse().ok()
    }

    /// Decode the raw record into a typed change.
    pub fn decode(&self) -> Result<RemoteChange, SyncError> {
        let table = self.table;
        let wrap = |source| SyncError::Record { table, source };
        Ok(match (self.table, self.op) {
            (Table::Entities, ChangeOp::Delete) => {
                let row: DeletedRecord = serde_json::from_value(self.record.clone()).map_err(wrap)?;
                RemoteChange::EntityDeleted { id: row.id, board_id: row.board_id }
            }
            (Table::Connections, ChangeOp::Delete) => {
                let row: DeletedRecord = serde_json::from_value(self.record.clone()).map_err(wrap)?;
                RemoteChange::ConnectionDeleted { id: row.id, board_id: row.board_id }
            }
            (Table::Entities, op) => RemoteChange::Entity {
                op,
                entity: serde_json::from_value(self.record.clone()).map_err(wrap)?,
            },
            (Table::Connections, op) => RemoteChange::Connection {
                op,
                connection: serde_json::from_value(self.record.clone()).map_err(wrap)?,
            },
        })
    }
}
