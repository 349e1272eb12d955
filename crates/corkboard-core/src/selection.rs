//! Selection set and marquee (rubber-band) multi-selection.

use kurbo::{Point, Rect};
use std::collections::HashSet;

use crate::board::Board;
use crate::camera::Camera;
use crate::entity::EntityId;
use crate::geometry::rect_from_corners;

/// An in-progress marquee, tracked in screen space.
#[derive(Debug, Clone)]
pub struct Marquee {
    /// Screen point where the marquee started.
    pub start: Point,
    /// Current screen point of the pointer.
    pub current: Point,
    /// Selection that existed before an additive marquee started.
    base: HashSet<EntityId>,
}

impl Marquee {
    /// The marquee rectangle in screen space.
    pub fn screen_rect(&self) -> Rect {
        rect_from_corners(self.start, self.current)
    }

    /// The marquee rectangle in world space, both corners mapped through the camera.
    pub fn world_rect(&self, camera: &Camera) -> Rect {
        rect_from_corners(camera.to_world(self.start), camera.to_world(self.current))
    }
}

/// Client-local set of selected entity ids. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct SelectionIndex {
    selected: HashSet<EntityId>,
    marquee: Option<Marquee>,
}

impl SelectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, id: EntityId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> &HashSet<EntityId> {
        &self.selected
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Replace the selection with a single id.
    pub fn select_only(&mut self, id: EntityId) {
        self.selected.clear();
        self.selected.insert(id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Apply click semantics for a pointer-down on an entity body.
    ///
    /// Without a modifier, an unselected entity collapses the selection to
    /// itself while a selected one leaves the selection untouched, so a group
    /// can be dragged from any member. With a modifier, membership toggles.
    pub fn click(&mut self, id: EntityId, modifier: bool) {
        if modifier {
            if !self.selected.remove(&id) {
                self.selected.insert(id);
            }
        } else if !self.selected.contains(&id) {
            self.select_only(id);
        }
    }

    /// Start a marquee at a background pointer-down.
    ///
    /// Without a modifier the existing selection is cleared first; with one it
    /// is kept and the marquee adds to it.
    pub fn begin_marquee(&mut self, screen: Point, additive: bool) {
        if !additive {
            self.selected.clear();
        }
        self.marquee = Some(Marquee {
            start: screen,
            current: screen,
            base: self.selected.clone(),
        });
    }

    /// Extend the marquee to `screen` and recompute membership.
    pub fn update_marquee(&mut self, screen: Point, camera: &Camera, board: &Board) {
        let Some(marquee) = self.marquee.as_mut() else {
            return;
        };
        marquee.current = screen;
        let world = marquee.world_rect(camera);
        let mut selected = marquee.base.clone();
        selected.extend(board.entities_in_rect(world));
        self.selected = selected;
    }

    /// Finish the marquee, keeping the current selection.
    pub fn end_marquee(&mut self) -> bool {
        self.marquee.take().is_some()
    }

    pub fn marquee(&self) -> Option<&Marquee> {
        self.marquee.as_ref()
    }

    /// Remove an id (e.g. after the entity was deleted).
    pub fn remove(&mut self, id: EntityId) {
        self.selected.remove(&id);
        if let Some(marquee) = self.marquee.as_mut() {
            marquee.base.remove(&id);
        }
    }

    /// Keep only ids for which `keep` holds.
    pub fn retain(&mut self, keep: impl Fn(EntityId) -> bool) {
        self.selected.retain(|id| keep(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityKind};
    use crate::geometry::aabb_overlaps;
    use kurbo::Vec2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use uuid::Uuid;

    fn board_with(boxes: &[(f64, f64)]) -> (Board, Vec<EntityId>) {
        let mut board = Board::new(Uuid::new_v4());
        let ids = boxes
            .iter()
            .map(|&(x, y)| {
                board.add_entity(Entity::new(board.id, EntityKind::Evidence, Point::new(x, y)))
            })
            .collect();
        (board, ids)
    }

    #[test]
    fn test_click_collapses_to_unselected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut selection = SelectionIndex::new();
        selection.select_only(a);
        selection.click(b, false);
        assert!(selection.is_selected(b));
        assert!(!selection.is_selected(a));
    }

    #[test]
    fn test_click_on_selected_preserves_group() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut selection = SelectionIndex::new();
        selection.click(a, false);
        selection.click(b, true);
        selection.click(a, false);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn test_modifier_click_toggles() {
        let a = Uuid::new_v4();
        let mut selection = SelectionIndex::new();
        selection.click(a, true);
        assert!(selection.is_selected(a));
        selection.click(a, true);
        assert!(!selection.is_selected(a));
    }

    #[test]
    fn test_marquee_selects_overlapping() {
        let (board, ids) = board_with(&[(0.0, 0.0), (500.0, 500.0)]);
        let camera = Camera::new();
        let mut selection = SelectionIndex::new();
        selection.begin_marquee(Point::new(-10.0, -10.0), false);
        selection.update_marquee(Point::new(50.0, 50.0), &camera, &board);
        assert!(selection.is_selected(ids[0]));
        assert!(!selection.is_selected(ids[1]));
        // Shrinking back drops the entity again.
        selection.update_marquee(Point::new(-5.0, -5.0), &camera, &board);
        assert!(selection.is_empty());
        assert!(selection.end_marquee());
    }

    #[test]
    fn test_marquee_respects_camera() {
        let (board, ids) = board_with(&[(1000.0, 1000.0)]);
        let mut camera = Camera::new();
        camera.zoom = 0.5;
        camera.offset = Vec2::new(-100.0, -100.0);
        // World (1000,1000) is at screen (400,400).
        let mut selection = SelectionIndex::new();
        selection.begin_marquee(Point::new(390.0, 390.0), false);
        selection.update_marquee(Point::new(410.0, 410.0), &camera, &board);
        assert!(selection.is_selected(ids[0]));
    }

    #[test]
    fn test_non_additive_marquee_clears() {
        let (board, ids) = board_with(&[(0.0, 0.0)]);
        let stray = Uuid::new_v4();
        let mut selection = SelectionIndex::new();
        selection.select_only(stray);
        selection.begin_marquee(Point::new(-10.0, -10.0), false);
        selection.update_marquee(Point::new(20.0, 20.0), &Camera::new(), &board);
        assert!(!selection.is_selected(stray));
        assert!(selection.is_selected(ids[0]));
    }

    #[test]
    fn test_additive_marquee_keeps_prior() {
        let (board, ids) = board_with(&[(0.0, 0.0), (900.0, 900.0)]);
        let mut selection = SelectionIndex::new();
        selection.select_only(ids[1]);
        selection.begin_marquee(Point::new(-10.0, -10.0), true);
        selection.update_marquee(Point::new(20.0, 20.0), &Camera::new(), &board);
        assert!(selection.is_selected(ids[0]));
        assert!(selection.is_selected(ids[1]));
    }

    #[test]
    fn test_marquee_matches_aabb_overlap_randomized() {
        let mut rng = StdRng::seed_from_u64(0x0c0_4b0a);
        for _ in 0..200 {
            let mut board = Board::new(Uuid::new_v4());
            for _ in 0..12 {
                let kind = EntityKind::ALL[rng.random_range(0..EntityKind::ALL.len())];
                let origin = Point::new(
                    rng.random_range(-800.0..800.0),
                    rng.random_range(-800.0..800.0),
                );
                let mut entity = Entity::new(board.id, kind, origin);
                entity.width = rng.random_range(20.0..400.0);
                entity.height = rng.random_range(20.0..400.0);
                entity.scale = rng.random_range(0.5..3.0);
                board.add_entity(entity);
            }
            let mut camera = Camera::new();
            camera.zoom = rng.random_range(0.1..3.0);
            camera.offset = Vec2::new(
                rng.random_range(-500.0..500.0),
                rng.random_range(-500.0..500.0),
            );
            let start = Point::new(
                rng.random_range(-600.0..600.0),
                rng.random_range(-600.0..600.0),
            );
            let end = Point::new(rng.random_range(-600.0..600.0), rng.random_range(-600.0..600.0));

            let mut selection = SelectionIndex::new();
            selection.begin_marquee(start, false);
            selection.update_marquee(end, &camera, &board);

            let world = rect_from_corners(camera.to_world(start), camera.to_world(end));
            for entity in board.entities_ordered() {
                assert_eq!(selection.is_selected(entity.id), aabb_overlaps(entity.aabb(), world));
            }
        }
    }
}
