//! Board entities and the per-kind behaviour table.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{MAX_SCALE, MIN_SCALE};
use crate::geometry::{clamp_to_box, local_delta_to_world};

/// Unique identifier for an entity.
pub type EntityId = Uuid;

/// Unique identifier for a board (workspace).
pub type BoardId = Uuid;

/// The kind of a placeable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Sticky note with free text.
    TextNote,
    /// Polaroid-style photo.
    Photo,
    /// Folder with a title and body text.
    Dossier,
    /// Torn paper strip holding a one-line caption.
    Scrap,
    /// Small marker token.
    Marker,
    /// Evidence bag / item card.
    Evidence,
}

/// Which resize handles a kind offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeModes {
    /// Proportional corner handles.
    pub corner: bool,
    /// Left/right edge handles (width only).
    pub horizontal: bool,
    /// Top/bottom edge handles (height only).
    pub vertical: bool,
}

/// Behaviour of one entity kind, consulted instead of scattered kind checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindTraits {
    pub default_width: f64,
    pub default_height: f64,
    pub min_width: f64,
    pub min_height: f64,
    pub resize: ResizeModes,
    /// Text-bearing kinds carry a font scale tied to their width.
    pub supports_scale: bool,
}

const ALL_MODES: ResizeModes = ResizeModes { corner: true, horizontal: true, vertical: true };

impl EntityKind {
    /// Every kind, in declaration order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::TextNote,
        EntityKind::Photo,
        EntityKind::Dossier,
        EntityKind::Scrap,
        EntityKind::Marker,
        EntityKind::Evidence,
    ];

    /// Look up the behaviour table row for this kind.
    pub fn traits(self) -> KindTraits {
        match self {
            EntityKind::TextNote => KindTraits {
                default_width: 256.0,
                default_height: 160.0,
                min_width: 120.0,
                min_height: 80.0,
                resize: ALL_MODES,
                supports_scale: true,
            },
            EntityKind::Photo => KindTraits {
                default_width: 240.0,
                default_height: 280.0,
                min_width: 100.0,
                min_height: 100.0,
                resize: ALL_MODES,
                supports_scale: false,
            },
            EntityKind::Dossier => KindTraits {
                default_width: 300.0,
                default_height: 220.0,
                min_width: 160.0,
                min_height: 120.0,
                resize: ALL_MODES,
                supports_scale: true,
            },
            // Caption strip: never grows taller by edge drag.
            EntityKind::Scrap => KindTraits {
                default_width: 220.0,
                default_height: 60.0,
                min_width: 100.0,
                min_height: 40.0,
                resize: ResizeModes { corner: true, horizontal: true, vertical: false },
                supports_scale: true,
            },
            EntityKind::Marker => KindTraits {
                default_width: 48.0,
                default_height: 48.0,
                min_width: 32.0,
                min_height: 32.0,
                resize: ResizeModes { corner: true, horizontal: false, vertical: false },
                supports_scale: false,
            },
            EntityKind::Evidence => KindTraits {
                default_width: 200.0,
                default_height: 200.0,
                min_width: 80.0,
                min_height: 80.0,
                resize: ALL_MODES,
                supports_scale: false,
            },
        }
    }

    /// Whether the kind carries a text scale.
    pub fn is_text_bearing(self) -> bool {
        self.traits().supports_scale
    }
}

fn default_scale() -> f64 {
    1.0
}

/// A placeable, transformable item on the board, as stored and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub board_id: BoardId,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// World-space left of the unrotated box.
    pub x: f64,
    /// World-space top of the unrotated box.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees around the box center.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub z_index: i64,
    #[serde(default)]
    pub has_pin: bool,
    /// Pin position in the local, unrotated frame.
    #[serde(default)]
    pub pin_x: f64,
    #[serde(default)]
    pub pin_y: f64,
    /// Image reference produced by the upload collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Kind-specific content fields; opaque to the engine.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Entity {
    /// Create an entity of `kind` with its default size, top-left at `position`.
    pub fn new(board_id: BoardId, kind: EntityKind, position: Point) -> Self {
        let traits = kind.traits();
        Self {
            id: Uuid::new_v4(),
            board_id,
            kind,
            x: position.x,
            y: position.y,
            width: traits.default_width,
            height: traits.default_height,
            rotation: 0.0,
            scale: 1.0,
            z_index: 0,
            has_pin: false,
            pin_x: 0.0,
            pin_y: 0.0,
            image_url: None,
            content: serde_json::json!({}),
        }
    }

    /// Create an entity with its default size centered on `center`.
    pub fn centered_at(board_id: BoardId, kind: EntityKind, center: Point) -> Self {
        let traits = kind.traits();
        let origin = Point::new(
            center.x - traits.default_width / 2.0,
            center.y - traits.default_height / 2.0,
        );
        Self::new(board_id, kind, origin)
    }

    /// Behaviour table row for this entity's kind.
    pub fn traits(&self) -> KindTraits {
        self.kind.traits()
    }

    /// Center of the unrotated box, the rotation pivot.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Axis-aligned box used for marquee hit-testing: `[x, x+w·scale] × [y, y+h·scale]`.
    ///
    /// Rotation is deliberately ignored.
    pub fn aabb(&self) -> Rect {
        Rect::new(
            self.x,
            self.y,
            self.x + self.width * self.scale,
            self.y + self.height * self.scale,
        )
    }

    /// Map a point in the local, unrotated frame (origin at the top-left) to world space.
    pub fn local_to_world(&self, local: Point) -> Point {
        let from_center = Vec2::new(local.x - self.width / 2.0, local.y - self.height / 2.0);
        self.center() + local_delta_to_world(from_center, self.rotation)
    }

    /// Set the box from a center point and size, keeping rotation.
    pub fn set_centered(&mut self, center: Point, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.x = center.x - width / 2.0;
        self.y = center.y - height / 2.0;
    }

    /// Copy position, size, rotation, scale, z and pin from `other`.
    pub fn copy_geometry_from(&mut self, other: &Entity) {
        self.x = other.x;
        self.y = other.y;
        self.width = other.width;
        self.height = other.height;
        self.rotation = other.rotation;
        self.scale = other.scale;
        self.z_index = other.z_index;
        self.has_pin = other.has_pin;
        self.pin_x = other.pin_x;
        self.pin_y = other.pin_y;
    }

    /// Clamp every geometric field back into its legal range.
    ///
    /// Out-of-range values are never an error; they are silently corrected.
    pub fn normalize(&mut self) {
        let traits = self.traits();
        if !self.width.is_finite() || self.width < traits.min_width {
            self.width = traits.min_width;
        }
        if !self.height.is_finite() || self.height < traits.min_height {
            self.height = traits.min_height;
        }
        self.scale = if traits.supports_scale && self.scale.is_finite() {
            self.scale.clamp(MIN_SCALE, MAX_SCALE)
        } else {
            1.0
        };
        if !self.rotation.is_finite() {
            self.rotation = 0.0;
        }
        let pin = clamp_to_box(Point::new(self.pin_x, self.pin_y), self.width, self.height);
        self.pin_x = pin.x;
        self.pin_y = pin.y;
    }
}
