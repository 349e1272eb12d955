//! Gesture state machine: drag, rotate, resize and pin-drag.
//!
//! Every frame is computed from the snapshot taken when the gesture started,
//! never from the previous frame, so long gestures do not drift.

use kurbo::{Point, Vec2};
use std::collections::HashMap;
use thiserror::Error;

use crate::board::Board;
use crate::config::{MAX_SCALE, MIN_SCALE};
use crate::entity::{Entity, EntityId, EntityKind};
use crate::geometry::{clamp_to_box, local_delta_to_world, world_delta_to_local};
use crate::selection::SelectionIndex;

/// One of the four proportional corner handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Outward direction of the corner in the local frame.
    pub fn signs(self) -> (f64, f64) {
        match self {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomLeft => (-1.0, 1.0),
            Corner::BottomRight => (1.0, 1.0),
        }
    }
}

/// One of the four single-axis edge handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    /// Left and right edges change only the width.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }

    fn sign(self) -> f64 {
        match self {
            Edge::Left | Edge::Top => -1.0,
            Edge::Right | Edge::Bottom => 1.0,
        }
    }
}

/// A resize handle grabbed by the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    Corner(Corner),
    Edge(Edge),
}

impl ResizeHandle {
    /// Whether entities of `kind` offer this handle at all.
    pub fn offered_by(self, kind: EntityKind) -> bool {
        let modes = kind.traits().resize;
        match self {
            ResizeHandle::Corner(_) => modes.corner,
            ResizeHandle::Edge(edge) if edge.is_horizontal() => modes.horizontal,
            ResizeHandle::Edge(_) => modes.vertical,
        }
    }
}

/// What the active gesture does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Dragging,
    Rotating,
    Resizing(ResizeHandle),
    PinDragging,
}

/// Reasons a gesture cannot start.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("Entity not found: {0}")]
    UnknownEntity(EntityId),
    #[error("{kind:?} entities do not offer the {handle:?} handle")]
    HandleNotOffered { kind: EntityKind, handle: ResizeHandle },
    #[error("Entity {0} has no pin to drag")]
    NoPin(EntityId),
    #[error("A gesture is already in progress")]
    Busy,
}

/// The in-progress gesture and its start-of-gesture snapshot.
#[derive(Debug, Clone)]
pub struct GestureSession {
    pub kind: GestureKind,
    /// The entity under the pointer when the gesture began.
    pub subject: EntityId,
    /// Screen position of the pointer-down.
    pub origin: Point,
    /// Zoom at gesture start; screen deltas are divided by it.
    pub zoom: f64,
    snapshot: HashMap<EntityId, Entity>,
}

impl GestureSession {
    /// Ids this gesture owns; remote updates to them are held back.
    pub fn guarded(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.snapshot.keys().copied()
    }

    pub fn guards(&self, id: EntityId) -> bool {
        self.snapshot.contains_key(&id)
    }

    /// Start-of-gesture geometry of one subject.
    pub fn snapshot_of(&self, id: EntityId) -> Option<&Entity> {
        self.snapshot.get(&id)
    }
}

/// Owns at most one [`GestureSession`] and applies pointer motion to the board.
#[derive(Debug, Clone)]
pub struct TransformSession {
    /// Degrees of rotation per screen pixel of horizontal travel.
    pub rotate_sensitivity: f64,
    active: Option<GestureSession>,
}

impl Default for TransformSession {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TransformSession {
    pub fn new(rotate_sensitivity: f64) -> Self {
        Self { rotate_sensitivity, active: None }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.active.as_ref()
    }

    /// Enter a gesture state, snapshotting every subject.
    ///
    /// A drag carries the whole selection along with the grabbed entity.
    pub fn begin(
        &mut self,
        kind: GestureKind,
        subject: EntityId,
        origin: Point,
        zoom: f64,
        board: &Board,
        selection: &SelectionIndex,
    ) -> Result<&GestureSession, TransformError> {
        if self.active.is_some() {
            return Err(TransformError::Busy);
        }
        let grabbed = board.get(subject).ok_or(TransformError::UnknownEntity(subject))?;
        match kind {
            GestureKind::Resizing(handle) if !handle.offered_by(grabbed.kind) => {
                return Err(TransformError::HandleNotOffered { kind: grabbed.kind, handle });
            }
            GestureKind::PinDragging if !grabbed.has_pin => {
                return Err(TransformError::NoPin(subject));
            }
            _ => {}
        }

        let mut snapshot = HashMap::new();
        snapshot.insert(subject, grabbed.clone());
        if kind == GestureKind::Dragging {
            for id in selection.selected() {
                if let Some(entity) = board.get(*id) {
                    snapshot.insert(*id, entity.clone());
                }
            }
        }
        log::debug!("gesture {:?} started on {} ({} subject(s))", kind, subject, snapshot.len());
        Ok(self.active.insert(GestureSession { kind, subject, origin, zoom, snapshot }))
    }

    /// Apply the pointer at `screen` to every subject. Returns true when anything moved.
    pub fn update(&self, screen: Point, board: &mut Board) -> bool {
        let Some(session) = self.active.as_ref() else {
            return false;
        };
        let screen_delta = screen - session.origin;
        let world_delta = screen_delta / session.zoom;
        let mut changed = false;
        for (id, start) in &session.snapshot {
            let Some(entity) = board.get_mut(*id) else {
                continue;
            };
            match session.kind {
                GestureKind::Dragging => {
                    entity.x = start.x + world_delta.x;
                    entity.y = start.y + world_delta.y;
                }
                GestureKind::Rotating => {
                    entity.rotation = start.rotation - self.rotate_sensitivity * screen_delta.x;
                }
                GestureKind::Resizing(ResizeHandle::Corner(corner)) => {
                    resize_corner(entity, start, corner, world_delta)
                }
                GestureKind::Resizing(ResizeHandle::Edge(edge)) => {
                    resize_edge(entity, start, edge, world_delta)
                }
                GestureKind::PinDragging => drag_pin(entity, start, world_delta),
            }
            changed = true;
        }
        changed
    }

    /// Leave the gesture, keeping the board geometry as it is.
    ///
    /// The returned session tells the caller which entities to persist.
    pub fn end(&mut self) -> Option<GestureSession> {
        let session = self.active.take()?;
        log::debug!("gesture {:?} on {} committed", session.kind, session.subject);
        Some(session)
    }

    /// Abort the gesture and put every subject back to its snapshot.
    pub fn cancel(&mut self, board: &mut Board) -> Option<GestureSession> {
        let session = self.active.take()?;
        for (id, start) in &session.snapshot {
            if let Some(entity) = board.get_mut(*id) {
                entity.copy_geometry_from(start);
            }
        }
        log::debug!("gesture {:?} on {} cancelled", session.kind, session.subject);
        Some(session)
    }

    /// Drop an entity that no longer exists from the gesture.
    ///
    /// The gesture ends once no subject is left.
    pub fn forget(&mut self, id: EntityId) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.snapshot.remove(&id);
        if session.snapshot.is_empty() {
            log::debug!("gesture on {} lost its last subject", session.subject);
            self.active = None;
        }
    }

    /// Whether `id` is owned by the active gesture.
    pub fn guards(&self, id: EntityId) -> bool {
        self.active.as_ref().is_some_and(|s| s.guards(id))
    }
}

/// Proportional resize about the start center.
fn resize_corner(entity: &mut Entity, start: &Entity, corner: Corner, world_delta: Vec2) {
    let traits = start.traits();
    let local = world_delta_to_local(world_delta, start.rotation);
    let (sx, sy) = corner.signs();
    let aspect = start.width / start.height;
    let avg = (sx * local.x + sy * local.y * aspect) / 2.0;

    let mut width = (start.width + avg).max(traits.min_width);
    let mut height = width / aspect;
    if height < traits.min_height {
        height = traits.min_height;
        width = height * aspect;
    }
    if traits.supports_scale {
        let base = start.width / start.scale;
        let scale = (width / base).clamp(MIN_SCALE, MAX_SCALE);
        entity.scale = scale;
        width = base * scale;
        height = width / aspect;
    }

    entity.set_centered(start.center(), width, height);
    scale_pin(entity, start);
}

/// Single-axis resize with the opposite edge held fixed in world space.
///
/// Below the minimum the box keeps its minimum size and the free edge keeps
/// following the pointer, so the whole box is pushed along.
fn resize_edge(entity: &mut Entity, start: &Entity, edge: Edge, world_delta: Vec2) {
    let traits = start.traits();
    let local = world_delta_to_local(world_delta, start.rotation);
    let sign = edge.sign();
    let (start_size, min_size, moved) = if edge.is_horizontal() {
        (start.width, traits.min_width, local.x)
    } else {
        (start.height, traits.min_height, local.y)
    };

    let size = (start_size + sign * moved).max(min_size);
    // Free edge offset from the start center, then back off by half the new size.
    let shift = sign * start_size / 2.0 + moved - sign * size / 2.0;
    let (width, height, local_shift) = if edge.is_horizontal() {
        (size, start.height, Vec2::new(shift, 0.0))
    } else {
        (start.width, size, Vec2::new(0.0, shift))
    };

    let center = start.center() + local_delta_to_world(local_shift, start.rotation);
    entity.set_centered(center, width, height);
    scale_pin(entity, start);
}

/// Keep a pin at the same relative spot while the box changes size.
fn scale_pin(entity: &mut Entity, start: &Entity) {
    if !start.has_pin {
        return;
    }
    let pin = Point::new(
        start.pin_x * entity.width / start.width,
        start.pin_y * entity.height / start.height,
    );
    let pin = clamp_to_box(pin, entity.width, entity.height);
    entity.pin_x = pin.x;
    entity.pin_y = pin.y;
}

fn drag_pin(entity: &mut Entity, start: &Entity, world_delta: Vec2) {
    let local = world_delta_to_local(world_delta, start.rotation);
    let pin = clamp_to_box(
        Point::new(start.pin_x + local.x, start.pin_y + local.y),
        entity.width,
        entity.height,
    );
    entity.pin_x = pin.x;
    entity.pin_y = pin.y;
}
