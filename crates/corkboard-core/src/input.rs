//! Typed input the rendering layer sends to the engine.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionId;
use crate::entity::{EntityId, EntityKind};
use crate::transform::ResizeHandle;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false, ctrl: false, alt: false, meta: false };
    pub const SHIFT: Self = Self { shift: true, ctrl: false, alt: false, meta: false };

    /// Whether a selection modifier (shift, ctrl or cmd) is held.
    pub fn extends_selection(&self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

/// What sits under the pointer, as hit-tested by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// Empty canvas.
    Background,
    /// The body of an entity.
    Entity(EntityId),
    /// A resize handle of an entity.
    Resize(EntityId, ResizeHandle),
    /// The rotate handle of an entity.
    Rotate(EntityId),
    /// An entity's pin.
    Pin(EntityId),
}

/// A command from the rendering layer. Positions are in screen space.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    PointerDown {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        target: PointerTarget,
    },
    PointerMove {
        position: Point,
    },
    PointerUp {
        position: Point,
    },
    /// Mouse wheel; negative `delta_y` is scrolling up.
    Wheel {
        position: Point,
        delta_y: f64,
    },
    /// Click on a pin, or on an entity body while pin placement is on.
    ClickPin {
        entity: EntityId,
        position: Point,
    },
    RemovePin(EntityId),
    TogglePinMode,
    BringToFront(EntityId),
    /// Place a new entity of `kind` centered on `position`.
    CreateEntity {
        kind: EntityKind,
        position: Point,
        content: serde_json::Value,
    },
    SetContent {
        entity: EntityId,
        content: serde_json::Value,
    },
    /// Attach the URL returned by the upload collaborator.
    SetImageUrl {
        entity: EntityId,
        url: String,
    },
    DeleteEntity(EntityId),
    DeleteSelected,
    DeleteConnection(ConnectionId),
    SelectAll,
    ClearSelection,
    /// Delete everything on the board.
    ClearBoard,
    /// Animate the view back to the origin.
    ResetView,
    /// Abandon every in-progress interaction without committing it.
    Reset,
}
