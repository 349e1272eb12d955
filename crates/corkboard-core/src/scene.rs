//! Read-only projection of the engine state for the rendering layer.

use kurbo::{Affine, Point, Rect};
use serde::Serialize;

use crate::board::Board;
use crate::camera::{Camera, ViewState};
use crate::connection::ConnectionId;
use crate::entity::{EntityId, EntityKind};
use crate::pin::PinAnchorSolver;
use crate::selection::SelectionIndex;

/// One entity as the renderer draws it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Unrotated box in world space.
    pub rect: Rect,
    /// Degrees, about the rect center.
    pub rotation: f64,
    pub scale: f64,
    pub z_index: i64,
    pub selected: bool,
    pub image_url: Option<String>,
    pub content: serde_json::Value,
}

/// A visible pin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePin {
    pub entity: EntityId,
    pub world: Point,
    /// Waiting for the second end of a connection.
    pub active: bool,
}

/// A connection resolved to world-space endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConnection {
    pub id: ConnectionId,
    pub from: Point,
    pub to: Point,
    pub color: String,
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub view: ViewState,
    /// World → screen transform.
    #[serde(skip)]
    pub transform: Affine,
    /// Entities in draw order (back to front).
    pub entities: Vec<SceneEntity>,
    pub pins: Vec<ScenePin>,
    pub connections: Vec<SceneConnection>,
    /// Marquee rectangle in screen space.
    pub marquee: Option<Rect>,
    pub pin_mode: bool,
}

impl Scene {
    /// Project the current state. Edges with a missing endpoint are skipped.
    pub fn build(
        board: &Board,
        camera: &Camera,
        selection: &SelectionIndex,
        pins: &PinAnchorSolver,
        active_pin: Option<EntityId>,
        pin_mode: bool,
    ) -> Self {
        let entities = board
            .entities_ordered()
            .into_iter()
            .map(|e| SceneEntity {
                id: e.id,
                kind: e.kind,
                rect: Rect::new(e.x, e.y, e.x + e.width, e.y + e.height),
                rotation: e.rotation,
                scale: e.scale,
                z_index: e.z_index,
                selected: selection.is_selected(e.id),
                image_url: e.image_url.clone(),
                content: e.content.clone(),
            })
            .collect();

        let pin_list = board
            .entities_ordered()
            .into_iter()
            .filter(|e| e.has_pin)
            .map(|e| ScenePin {
                entity: e.id,
                world: pins.world(e),
                active: active_pin == Some(e.id),
            })
            .collect();

        let connections = board
            .connections
            .iter()
            .filter_map(|c| {
                let source = board.get(c.source_entity_id)?;
                let target = board.get(c.target_entity_id)?;
                let (from, to) = pins.endpoints(c, source, target)?;
                Some(SceneConnection { id: c.id, from, to, color: c.color.clone() })
            })
            .collect();

        Self {
            view: camera.view(),
            transform: camera.transform(),
            entities,
            pins: pin_list,
            connections,
            marquee: selection.marquee().map(|m| m.screen_rect()),
            pin_mode,
        }
    }
}
