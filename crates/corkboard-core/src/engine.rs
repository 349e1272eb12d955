//! The interaction engine: one owner for every piece of board state.
//!
//! The rendering layer sends [`Intent`]s to [`Engine::dispatch`] and reads back
//! a [`Scene`]. Writes leave the engine as [`Action::Persist`] values; the
//! host runs them through [`persistence::flush`](crate::persistence::flush).
//! Remote changes come in through [`Engine::apply_remote`].

use kurbo::Point;
use std::time::Duration;

use crate::arbiter::{RemoteOutcome, SyncArbiter};
use crate::board::Board;
use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::connection::{Connection, ConnectionId};
use crate::entity::{BoardId, Entity, EntityId};
use crate::input::{Intent, Modifiers, MouseButton, PointerTarget};
use crate::persistence::{BoardSnapshot, PersistOp};
use crate::pin::PinAnchorSolver;
use crate::scene::Scene;
use crate::selection::SelectionIndex;
use crate::sync::RealtimeEvent;
use crate::transform::{GestureKind, TransformSession};

/// Pointer travel (screen px) under which a press on a pin counts as a click.
const CLICK_DISTANCE: f64 = 3.0;

/// Side effects of a dispatch for the host to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The scene changed and should be redrawn.
    Render,
    /// A write to hand to the persistence gateway.
    Persist(PersistOp),
}

/// Owns the board, viewport, selection, gesture and guard state.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    board: Board,
    camera: Camera,
    selection: SelectionIndex,
    transform: TransformSession,
    arbiter: SyncArbiter,
    pins: PinAnchorSolver,
    /// Entity whose pin was clicked first, waiting for the other end.
    active_pin: Option<EntityId>,
    /// Clicking an un-pinned entity places a pin while this is on.
    pin_mode: bool,
    /// Last pointer position of an in-progress pan.
    pan_anchor: Option<Point>,
}

impl Engine {
    /// Create an engine for an empty board.
    pub fn new(board_id: BoardId, config: EngineConfig) -> Self {
        Self {
            camera: Camera::with_limits(config.min_zoom, config.max_zoom),
            transform: TransformSession::new(config.rotate_sensitivity),
            pins: PinAnchorSolver::new(config.default_pin_inset),
            board: Board::new(board_id),
            selection: SelectionIndex::new(),
            arbiter: SyncArbiter::new(),
            active_pin: None,
            pin_mode: false,
            pan_anchor: None,
            config,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn selection(&self) -> &SelectionIndex {
        &self.selection
    }

    pub fn transform(&self) -> &TransformSession {
        &self.transform
    }

    pub fn arbiter(&self) -> &SyncArbiter {
        &self.arbiter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_pin(&self) -> Option<EntityId> {
        self.active_pin
    }

    pub fn pin_mode(&self) -> bool {
        self.pin_mode
    }

    /// Replace board content with what the gateway loaded, dropping all local interaction state.
    pub fn load_snapshot(&mut self, snapshot: BoardSnapshot) {
        self.reset_interaction();
        self.selection.clear();
        self.board.load_snapshot(snapshot.entities, snapshot.connections);
        log::info!(
            "loaded board {} ({} entities, {} connections)",
            self.board.id,
            self.board.len(),
            self.board.connections.len()
        );
    }

    /// Handle one intent from the rendering layer.
    pub fn dispatch(&mut self, intent: Intent) -> Vec<Action> {
        match intent {
            Intent::PointerDown { position, button, modifiers, target } => {
                self.pointer_down(position, button, modifiers, target)
            }
            Intent::PointerMove { position } => self.pointer_move(position),
            Intent::PointerUp { position } => self.pointer_up(position),
            Intent::Wheel { position, delta_y } => {
                self.camera.zoom_by_wheel(position, delta_y, self.config.wheel_zoom_step);
                vec![Action::Render]
            }
            Intent::ClickPin { entity, position } => self.click_pin(entity, position),
            Intent::RemovePin(id) => self.remove_pin(id),
            Intent::TogglePinMode => {
                self.pin_mode = !self.pin_mode;
                if !self.pin_mode {
                    self.active_pin = None;
                }
                vec![Action::Render]
            }
            Intent::BringToFront(id) => match self.board.bring_to_front(id) {
                Some(_) => self.persist_entities([id]),
                None => Vec::new(),
            },
            Intent::CreateEntity { kind, position, content } => {
                let center = self.camera.to_world(position);
                let mut entity = Entity::centered_at(self.board.id, kind, center);
                entity.content = content;
                let id = self.board.add_entity(entity);
                self.selection.select_only(id);
                self.persist_entities([id])
            }
            Intent::SetContent { entity, content } => match self.board.get_mut(entity) {
                Some(e) => {
                    e.content = content;
                    self.persist_entities([entity])
                }
                None => Vec::new(),
            },
            Intent::SetImageUrl { entity, url } => match self.board.get_mut(entity) {
                Some(e) => {
                    e.image_url = Some(url);
                    self.persist_entities([entity])
                }
                None => Vec::new(),
            },
            Intent::DeleteEntity(id) => self.delete_entities(&[id]),
            Intent::DeleteSelected => {
                let ids: Vec<EntityId> = self.selection.selected().iter().copied().collect();
                self.delete_entities(&ids)
            }
            Intent::DeleteConnection(id) => match self.board.connections.remove(id) {
                Some(_) => vec![Action::Persist(PersistOp::DeleteConnection(id)), Action::Render],
                None => Vec::new(),
            },
            Intent::SelectAll => {
                self.selection.clear();
                for entity in self.board.entities_ordered() {
                    self.selection.click(entity.id, true);
                }
                vec![Action::Render]
            }
            Intent::ClearSelection => {
                self.selection.clear();
                vec![Action::Render]
            }
            Intent::ClearBoard => {
                self.reset_interaction();
                self.selection.clear();
                self.board.clear();
                vec![Action::Persist(PersistOp::DeleteAllForBoard(self.board.id)), Action::Render]
            }
            Intent::ResetView => {
                if self.camera.reset_animated(self.config.reset_duration()) {
                    vec![Action::Render]
                } else {
                    Vec::new()
                }
            }
            Intent::Reset => {
                self.reset_interaction();
                vec![Action::Render]
            }
        }
    }

    /// Merge a realtime event from another client.
    pub fn apply_remote(&mut self, event: &RealtimeEvent) -> RemoteOutcome {
        let change = match event.decode() {
            Ok(change) => change,
            Err(err) => {
                log::warn!("ignoring realtime event: {}", err);
                return RemoteOutcome::Ignored;
            }
        };
        let outcome = self.arbiter.apply(change, &mut self.board);
        if let RemoteOutcome::Removed(id) = outcome {
            self.forget_entity(id);
        }
        outcome
    }

    /// Advance time-based state (the view reset). Returns true when a redraw is needed.
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.camera.tick(dt)
    }

    /// World endpoints of every connection, after pruning edges whose entities are gone.
    pub fn connection_endpoints(&mut self) -> Vec<(ConnectionId, Point, Point)> {
        self.board.prune_dangling();
        self.scene().connections.into_iter().map(|c| (c.id, c.from, c.to)).collect()
    }

    /// The current frame for the renderer.
    pub fn scene(&self) -> Scene {
        Scene::build(
            &self.board,
            &self.camera,
            &self.selection,
            &self.pins,
            self.active_pin,
            self.pin_mode,
        )
    }

    fn pointer_down(
        &mut self,
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
        target: PointerTarget,
    ) -> Vec<Action> {
        if button != MouseButton::Left {
            self.pan_anchor = Some(position);
            return Vec::new();
        }
        match target {
            PointerTarget::Background => {
                self.selection.begin_marquee(position, modifiers.extends_selection());
                vec![Action::Render]
            }
            PointerTarget::Entity(id) if self.pin_mode => self.click_pin(id, position),
            PointerTarget::Entity(id) => {
                if !self.board.contains(id) {
                    return Vec::new();
                }
                self.selection.click(id, modifiers.extends_selection());
                self.board.bring_to_front(id);
                if self.selection.is_selected(id)
                    && self.begin_gesture(GestureKind::Dragging, id, position)
                {
                    // The new z is written with the rest of the gesture on release.
                    return vec![Action::Render];
                }
                let mut actions = self.persist_entities([id]);
                actions.push(Action::Render);
                actions
            }
            PointerTarget::Resize(id, handle) => {
                self.gesture_actions(GestureKind::Resizing(handle), id, position)
            }
            PointerTarget::Rotate(id) => self.gesture_actions(GestureKind::Rotating, id, position),
            PointerTarget::Pin(id) => self.gesture_actions(GestureKind::PinDragging, id, position),
        }
    }

    fn pointer_move(&mut self, position: Point) -> Vec<Action> {
        if let Some(last) = self.pan_anchor {
            self.pan_anchor = Some(position);
            self.camera.pan(position - last);
            return vec![Action::Render];
        }
        if self.selection.marquee().is_some() {
            self.selection.update_marquee(position, &self.camera, &self.board);
            return vec![Action::Render];
        }
        if self.transform.update(position, &mut self.board) {
            return vec![Action::Render];
        }
        Vec::new()
    }

    fn pointer_up(&mut self, position: Point) -> Vec<Action> {
        if self.pan_anchor.take().is_some() {
            return Vec::new();
        }
        if self.selection.end_marquee() {
            return vec![Action::Render];
        }
        let Some(session) = self.transform.session() else {
            return Vec::new();
        };

        // A press on a pin that barely moved is a click, not a drag.
        if session.kind == GestureKind::PinDragging
            && (position - session.origin).hypot() < CLICK_DISTANCE
        {
            let subject = session.subject;
            self.transform.cancel(&mut self.board);
            self.arbiter.release();
            return self.click_pin(subject, position);
        }

        self.transform.update(position, &mut self.board);
        let Some(session) = self.transform.end() else {
            return Vec::new();
        };
        self.arbiter.release();
        let mut actions = self.persist_entities(session.guarded());
        actions.push(Action::Render);
        actions
    }

    /// Start a gesture and guard its subjects. Returns false when it was refused.
    fn begin_gesture(&mut self, kind: GestureKind, id: EntityId, position: Point) -> bool {
        let zoom = self.camera.zoom;
        match self.transform.begin(kind, id, position, zoom, &self.board, &self.selection) {
            Ok(session) => {
                self.arbiter.guard(session.guarded());
                true
            }
            Err(err) => {
                log::debug!("gesture refused: {}", err);
                false
            }
        }
    }

    fn gesture_actions(&mut self, kind: GestureKind, id: EntityId, position: Point) -> Vec<Action> {
        if self.begin_gesture(kind, id, position) {
            vec![Action::Render]
        } else {
            Vec::new()
        }
    }

    /// Two-click connection flow. The first pin clicked becomes active; a
    /// click on a different entity's pin joins the two and clears it.
    fn click_pin(&mut self, id: EntityId, position: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        let world = self.camera.to_world(position);
        let Some(entity) = self.board.get_mut(id) else {
            return actions;
        };
        if !entity.has_pin {
            if !self.pin_mode {
                return actions;
            }
            self.pins.place(entity, world);
            actions.extend(self.persist_entities([id]));
        }

        match self.active_pin {
            None => self.active_pin = Some(id),
            Some(active) if active == id => {}
            Some(active) => {
                self.active_pin = None;
                if self.board.contains(active)
                    && !self.board.connections.contains_pair(active, id)
                {
                    let color = self.config.connection_color.clone();
                    let connection = Connection::new(self.board.id, active, id, color);
                    if self.board.connections.insert(connection.clone()) {
                        let op = PersistOp::UpsertConnections(vec![connection]);
                        actions.push(Action::Persist(op));
                    }
                }
            }
        }
        actions.push(Action::Render);
        actions
    }

    /// Take the pin off an entity. For the active entity the pending
    /// connection is dropped along with every connection it already has.
    fn remove_pin(&mut self, id: EntityId) -> Vec<Action> {
        let Some(entity) = self.board.get_mut(id) else {
            return Vec::new();
        };
        entity.has_pin = false;
        entity.pin_x = 0.0;
        entity.pin_y = 0.0;

        let mut actions = Vec::new();
        if self.active_pin == Some(id) {
            self.active_pin = None;
            for connection in self.board.connections.remove_for_entity(id) {
                actions.push(Action::Persist(PersistOp::DeleteConnection(connection.id)));
            }
        }
        actions.extend(self.persist_entities([id]));
        actions.push(Action::Render);
        actions
    }

    /// Delete entities with their connections, as a single batch of writes.
    fn delete_entities(&mut self, ids: &[EntityId]) -> Vec<Action> {
        let mut actions = Vec::new();
        for &id in ids {
            let Some((_, connections)) = self.board.remove_entity(id) else {
                continue;
            };
            for connection in connections {
                actions.push(Action::Persist(PersistOp::DeleteConnection(connection.id)));
            }
            actions.push(Action::Persist(PersistOp::DeleteEntity(id)));
            self.forget_entity(id);
        }
        if !actions.is_empty() {
            actions.push(Action::Render);
        }
        actions
    }

    /// Scrub a removed entity from selection, gesture, guard and pending pin.
    fn forget_entity(&mut self, id: EntityId) {
        self.selection.remove(id);
        self.transform.forget(id);
        self.arbiter.unguard(id);
        if self.active_pin == Some(id) {
            self.active_pin = None;
        }
    }

    /// Return every interaction to idle without committing anything.
    fn reset_interaction(&mut self) {
        self.transform.cancel(&mut self.board);
        self.arbiter.release();
        self.selection.end_marquee();
        self.pan_anchor = None;
        self.active_pin = None;
    }

    /// One upsert carrying the current state of every listed entity that still exists.
    fn persist_entities(&self, ids: impl IntoIterator<Item = EntityId>) -> Vec<Action> {
        let entities: Vec<Entity> = ids
            .into_iter()
            .filter_map(|id| self.board.get(id).cloned())
            .collect();
        if entities.is_empty() {
            return Vec::new();
        }
        vec![Action::Persist(PersistOp::UpsertEntities(entities))]
    }
}
