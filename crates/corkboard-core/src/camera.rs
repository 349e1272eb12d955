//! Viewport controller: pan/zoom transform and the animated view reset.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{MAX_ZOOM, MIN_ZOOM};

/// Serializable snapshot of the view transform handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub offset_x: f64,
    pub offset_y: f64,
    pub zoom: f64,
}

impl ViewState {
    /// The untransformed view: no offset, zoom 1.
    pub const IDENTITY: Self = Self { offset_x: 0.0, offset_y: 0.0, zoom: 1.0 };
}

impl Default for ViewState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// An in-flight ease back to [`ViewState::IDENTITY`].
#[derive(Debug, Clone)]
struct ResetAnimation {
    from_offset: Vec2,
    from_zoom: f64,
    elapsed: Duration,
    duration: Duration,
}

/// Ease-out quartic: fast start, gentle landing.
pub fn ease_out_quart(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(4)
}

/// Camera manages the view transform for the board.
///
/// Screen = world · zoom + offset. Any direct pan or zoom cancels a running
/// reset animation, so the animation never fights the user.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Current translation offset in screen pixels.
    pub offset: Vec2,
    /// Current zoom factor.
    pub zoom: f64,
    /// Minimum allowed zoom level.
    pub min_zoom: f64,
    /// Maximum allowed zoom level.
    pub max_zoom: f64,
    reset: Option<ResetAnimation>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            reset: None,
        }
    }
}

impl Camera {
    /// Create a new camera at the identity view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a camera with custom zoom limits.
    pub fn with_limits(min_zoom: f64, max_zoom: f64) -> Self {
        Self { min_zoom, max_zoom, ..Self::default() }
    }

    /// World → screen transform, the single outer transform the renderer applies.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Convert a screen point to world coordinates.
    pub fn to_world(&self, screen: Point) -> Point {
        Point::new((screen.x - self.offset.x) / self.zoom, (screen.y - self.offset.y) / self.zoom)
    }

    /// Convert a world point to screen coordinates.
    pub fn to_screen(&self, world: Point) -> Point {
        Point::new(world.x * self.zoom + self.offset.x, world.y * self.zoom + self.offset.y)
    }

    /// Convert a screen-space delta into a world-space delta.
    pub fn screen_delta_to_world(&self, delta: Vec2) -> Vec2 {
        delta / self.zoom
    }

    /// Pan the camera by a delta in screen pixels (1:1, zoom-independent).
    pub fn pan(&mut self, delta: Vec2) {
        self.cancel_animation();
        self.offset += delta;
    }

    /// Set the zoom to `new_zoom` while keeping the world point under `screen` fixed.
    pub fn zoom_at(&mut self, screen: Point, new_zoom: f64) {
        self.cancel_animation();
        let new_zoom = new_zoom.clamp(self.min_zoom, self.max_zoom);
        // Must use the pre-change zoom.
        let world = self.to_world(screen);
        self.zoom = new_zoom;
        self.offset = Vec2::new(screen.x - world.x * new_zoom, screen.y - world.y * new_zoom);
    }

    /// Apply one wheel event: negative `delta_y` (scroll up) zooms in by `step`.
    pub fn zoom_by_wheel(&mut self, screen: Point, delta_y: f64, step: f64) {
        if delta_y == 0.0 {
            return;
        }
        let factor = 1.0 + step;
        let new_zoom = if delta_y < 0.0 { self.zoom * factor } else { self.zoom / factor };
        self.zoom_at(screen, new_zoom);
    }

    /// Current view as a plain value.
    pub fn view(&self) -> ViewState {
        ViewState { offset_x: self.offset.x, offset_y: self.offset.y, zoom: self.zoom }
    }

    /// Jump to a view without animating (zoom is clamped).
    pub fn set_view(&mut self, view: ViewState) {
        self.cancel_animation();
        self.offset = Vec2::new(view.offset_x, view.offset_y);
        self.zoom = view.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Start easing back to the identity view over `duration`.
    ///
    /// Returns false when the camera is already at identity (nothing to animate).
    pub fn reset_animated(&mut self, duration: Duration) -> bool {
        if self.view() == ViewState::IDENTITY {
            self.reset = None;
            return false;
        }
        if duration.is_zero() {
            self.land();
            return true;
        }
        self.reset = Some(ResetAnimation {
            from_offset: self.offset,
            from_zoom: self.zoom,
            elapsed: Duration::ZERO,
            duration,
        });
        true
    }

    /// Advance a running reset by one frame of `dt`.
    ///
    /// Returns true when the view changed this frame.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(anim) = self.reset.as_mut() else {
            return false;
        };
        anim.elapsed += dt;
        let t = anim.elapsed.as_secs_f64() / anim.duration.as_secs_f64();
        if t >= 1.0 {
            self.land();
            return true;
        }
        let e = ease_out_quart(t);
        let (from_offset, from_zoom) = (anim.from_offset, anim.from_zoom);
        self.offset = from_offset * (1.0 - e);
        self.zoom = from_zoom + (1.0 - from_zoom) * e;
        true
    }

    /// Whether a reset animation is running.
    pub fn is_animating(&self) -> bool {
        self.reset.is_some()
    }

    /// Drop a running reset animation, leaving the view where it is.
    pub fn cancel_animation(&mut self) {
        if self.reset.take().is_some() {
            log::debug!("view reset animation cancelled");
        }
    }

    fn land(&mut self) {
        self.reset = None;
        self.offset = Vec2::ZERO;
        self.zoom = 1.0;
    }
}
