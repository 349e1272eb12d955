//! Messages exchanged between the relay and its clients.
//!
//! ```json
//! { "type": "join", "board": "<board-uuid>" }
//! { "type": "change", "event": { "table": "entities", "op": "update", "record": { ... } } }
//! { "type": "clear" }
//! { "type": "leave" }
//! ```

use corkboard_core::{BoardId, RealtimeEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join a board
    Join { board: BoardId },
    /// Leave the current board
    Leave,
    /// A row change to store and fan out
    Change { event: RealtimeEvent },
    /// Delete everything on the current board
    Clear,
}

/// Latest stored rows of a board, handed to new joiners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardRecords {
    pub entities: Vec<Value>,
    pub connections: Vec<Value>,
}

/// A message sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Confirm a join with the board's current rows
    Joined {
        board: BoardId,
        peer_count: usize,
        snapshot: BoardRecords,
    },
    /// A change made by another peer
    Change { from: String, event: RealtimeEvent },
    /// Another peer deleted everything on the board
    Cleared { from: String },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Error { message: String },
}
