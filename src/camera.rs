//! Coordinate spaces: screen, world, and sprite-local.
//!
//! Screen space is what pointer events deliver. World space is the map's own
//! coordinate system, reached by removing the canvas origin and the camera's
//! pan and dividing by zoom. Local space is a sprite's unrotated, unit-scale
//! frame with its origin at the sprite's anchor (top-left corner of the bitmap).
//!
//! `local_to_world(world_to_local(p, s), s) == p` for every sprite with a
//! positive scale; dragging depends on that round trip.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{MAX_ZOOM, MIN_ZOOM};
use crate::doc::Sprite;

/// A point (or vector) in screen, world, or local space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera state for pan/zoom over the map.
///
/// `pan_x` / `pan_y` are in CSS pixels relative to the canvas origin.
/// `zoom` is a scale factor (1.0 = one world unit per pixel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { pan_x: 0.0, pan_y: 0.0, zoom: 1.0 }
    }
}

impl Camera {
    /// Convert a canvas-relative point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.pan_x) / self.zoom,
            y: (screen.y - self.pan_y) / self.zoom,
        }
    }

    /// Convert a world-space point to canvas-relative coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: world.x * self.zoom + self.pan_x,
            y: world.y * self.zoom + self.pan_y,
        }
    }


    /// Shift the view by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    /// Change zoom while keeping the world point under `anchor` fixed on screen.
    ///
    /// The requested zoom is clamped to the allowed range; a non-finite
    /// request leaves the camera untouched.
    pub fn zoom_at(&mut self, anchor: Point, zoom: f64) {
        if !zoom.is_finite() {
            return;
        }
        let world = self.screen_to_world(anchor);
        self.zoom = clamp_zoom(zoom);
        self.pan_x = anchor.x - world.x * self.zoom;
        self.pan_y = anchor.y - world.y * self.zoom;
    }
}

/// Clamp a zoom factor to the supported range.
#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Convert a raw screen point to world space, given the canvas's top-left
/// corner in screen space.
#[must_use]
pub fn screen_to_world(screen: Point, origin: Point, camera: &Camera) -> Point {
    camera.screen_to_world(Point::new(screen.x - origin.x, screen.y - origin.y))
}

/// Rotate a local-space vector by `rotation_deg` and scale it uniformly.
///
/// This is the linear part of [`local_to_world`], without the translation.
#[must_use]
pub fn rotate_scale(v: Point, rotation_deg: f64, scale: f64) -> Point {
    let (sin, cos) = rotation_deg.to_radians().sin_cos();
    Point {
        x: scale * (v.x * cos - v.y * sin),
        y: scale * (v.x * sin + v.y * cos),
    }
}

/// Convert a world-space point into `sprite`'s local space.
///
/// Translate by `-position`, rotate by `-rotation` (the transpose of the
/// rotation matrix), then divide by scale.
#[must_use]
pub fn world_to_local(world: Point, sprite: &Sprite) -> Point {
    let dx = world.x - sprite.x;
    let dy = world.y - sprite.y;
    let (sin, cos) = sprite.rotation.to_radians().sin_cos();
    Point {
        x: (dx * cos + dy * sin) / sprite.scale,
        y: (-dx * sin + dy * cos) / sprite.scale,
    }
}

/// Convert a point in `sprite`'s local space to world space.
#[must_use]
pub fn local_to_world(local: Point, sprite: &Sprite) -> Point {
    let v = rotate_scale(local, sprite.rotation, sprite.scale);
    Point { x: sprite.x + v.x, y: sprite.y + v.y }
}
