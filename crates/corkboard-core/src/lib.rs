//! Corkboard Core Library
//!
//! Platform-agnostic spatial interaction engine for the Corkboard infinite canvas:
//! viewport, selection, gestures, pins and connections, and the arbitration of
//! remote changes against local gestures.

pub mod arbiter;
pub mod board;
pub mod camera;
pub mod config;
pub mod connection;
pub mod engine;
pub mod entity;
pub mod geometry;
pub mod input;
pub mod persistence;
pub mod pin;
pub mod scene;
pub mod selection;
pub mod sync;
pub mod transform;

pub use arbiter::{RemoteOutcome, SyncArbiter};
pub use board::Board;
pub use camera::{Camera, ViewState};
pub use config::{ConfigError, EngineConfig};
pub use connection::{Connection, ConnectionGraph, ConnectionId};
pub use engine::{Action, Engine};
pub use entity::{BoardId, Entity, EntityId, EntityKind, KindTraits, ResizeModes};
pub use input::{Intent, Modifiers, MouseButton, PointerTarget};
pub use persistence::{
    BoardSnapshot, FlushReport, InlineUploader, MemoryGateway, PersistOp, PersistenceError,
    PersistenceGateway, Uploader,
    flush,
};
pub use pin::PinAnchorSolver;
pub use scene::Scene;
pub use selection::SelectionIndex;
pub use sync::{ChangeOp, RealtimeEvent, RemoteChange, SyncError, Table};
pub use transform::{Corner, Edge, GestureKind, ResizeHandle, TransformError, TransformSession};
