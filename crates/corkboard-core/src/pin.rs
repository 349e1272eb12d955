//! Pin anchors: where a pin sits in world space, and the reverse mapping
//! used when a pin is placed by clicking.

use kurbo::{Point, Vec2};

use crate::connection::Connection;
use crate::entity::Entity;
use crate::geometry::{clamp_to_box, world_delta_to_local};

/// Resolves pin positions for entities and connection endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinAnchorSolver {
    /// Distance of the default (top-center) pin from the top edge.
    pub default_inset: f64,
}

impl Default for PinAnchorSolver {
    fn default() -> Self {
        Self { default_inset: 10.0 }
    }
}

impl PinAnchorSolver {
    pub fn new(default_inset: f64) -> Self {
        Self { default_inset }
    }

    /// Top-center pin position in the local frame.
    pub fn default_local(&self, entity: &Entity) -> Point {
        let anchor = Point::new(entity.width / 2.0, self.default_inset);
        clamp_to_box(anchor, entity.width, entity.height)
    }

    /// The pin in the local frame: the stored one, or the default when unset.
    pub fn local(&self, entity: &Entity) -> Point {
        if entity.has_pin {
            Point::new(entity.pin_x, entity.pin_y)
        } else {
            self.default_local(entity)
        }
    }

    /// World position: `center + R(rotation)·(pin − size/2)`.
    pub fn world(&self, entity: &Entity) -> Point {
        entity.local_to_world(self.local(entity))
    }

    /// Map a world point into the entity's local frame, clamped to its box.
    pub fn world_to_local(&self, entity: &Entity, world: Point) -> Point {
        let center = entity.center();
        let local = world_delta_to_local(world - center, entity.rotation)
            + Vec2::new(entity.width / 2.0, entity.height / 2.0);
        clamp_to_box(local.to_point(), entity.width, entity.height)
    }

    /// Give the entity a pin at the world point (clamped into its box).
    pub fn place(&self, entity: &mut Entity, world: Point) {
        let local = self.world_to_local(entity, world);
        entity.has_pin = true;
        entity.pin_x = local.x;
        entity.pin_y = local.y;
    }

    /// Give the entity a pin at its default position if it has none.
    pub fn ensure(&self, entity: &mut Entity) {
        if !entity.has_pin {
            let local = self.default_local(entity);
            entity.has_pin = true;
            entity.pin_x = local.x;
            entity.pin_y = local.y;
        }
    }

    /// World endpoints of a connection, given its two entities.
    pub fn endpoints(
        &self,
        connection: &Connection,
        source: &Entity,
        target: &Entity,
    ) -> Option<(Point, Point)> {
        if connection.source_entity_id != source.id || connection.target_entity_id != target.id {
            return None;
        }
        Some((self.world(source), self.world(target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use uuid::Uuid;

    const EPS: f64 = 1e-9;

    fn photo_at(x: f64, y: f64) -> Entity {
        Entity::new(Uuid::nil(), EntityKind::Photo, Point::new(x, y))
    }

    #[test]
    fn test_default_pin_is_top_center() {
        let solver = PinAnchorSolver::default();
        let entity = photo_at(100.0, 50.0);
        let world = solver.world(&entity);
        assert!((world.x - 220.0).abs() < EPS);
        assert!((world.y - 60.0).abs() < EPS);
    }

    #[test]
    fn test_world_position_rotates_about_center() {
        let solver = PinAnchorSolver::default();
        let mut entity = photo_at(0.0, 0.0);
        entity.has_pin = true;
        entity.pin_x = 240.0;
        entity.pin_y = 140.0;
        entity.rotation = 180.0;
        // Right-middle flips to left-middle.
        let world = solver.world(&entity);
        assert!(world.x.abs() < EPS);
        assert!((world.y - 140.0).abs() < EPS);
    }

    #[test]
    fn test_world_to_local_inverts_world() {
        let solver = PinAnchorSolver::default();
        let mut entity = photo_at(-30.0, 12.0);
        entity.rotation = 33.0;
        entity.has_pin = true;
        entity.pin_x = 70.0;
        entity.pin_y = 200.0;
        let back = solver.world_to_local(&entity, solver.world(&entity));
        assert!((back.x - 70.0).abs() < 1e-6);
        assert!((back.y - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_place_clamps_outside_points() {
        let solver = PinAnchorSolver::default();
        let mut entity = photo_at(0.0, 0.0);
        solver.place(&mut entity, Point::new(-500.0, 9000.0));
        assert!(entity.has_pin);
        assert!(entity.pin_x.abs() < EPS);
        assert!((entity.pin_y - entity.height).abs() < EPS);
    }

    #[test]
    fn test_default_inset_clamped_for_short_boxes() {
        let solver = PinAnchorSolver::new(500.0);
        let entity = photo_at(0.0, 0.0);
        let local = solver.local(&entity);
        assert!((local.y - entity.height).abs() < EPS);
    }
}
