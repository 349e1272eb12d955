//! Affine helpers shared by the viewport, pin solver and transform session.
//!
//! Rotations are stored in degrees on entities; everything here takes degrees
//! and converts at the boundary.

use kurbo::{Point, Rect, Vec2};

/// Rotate a vector by `degrees` (positive = clockwise on a y-down screen).
pub fn rotate_vec(v: Vec2, degrees: f64) -> Vec2 {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Bring a world-space delta into the local, unrotated frame of a shape
/// rotated by `rotation` degrees.
pub fn world_delta_to_local(delta: Vec2, rotation: f64) -> Vec2 {
    rotate_vec(delta, -rotation)
}

/// Inverse of [`world_delta_to_local`].
pub fn local_delta_to_world(delta: Vec2, rotation: f64) -> Vec2 {
    rotate_vec(delta, rotation)
}

/// Normalized rectangle spanning two arbitrary corner points.
pub fn rect_from_corners(a: Point, b: Point) -> Rect {
    Rect::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
}

/// Separating-axis test for two axis-aligned boxes.
///
/// Boxes that merely touch along an edge count as overlapping.
pub fn aabb_overlaps(a: Rect, b: Rect) -> bool {
    !(a.x1 < b.x0 || a.x0 > b.x1 || a.y1 < b.y0 || a.y0 > b.y1)
}

/// Clamp a point into `[0, width] × [0, height]`.
pub fn clamp_to_box(p: Point, width: f64, height: f64) -> Point {
    Point::new(p.x.clamp(0.0, width.max(0.0)), p.y.clamp(0.0, height.max(0.0)))
}
