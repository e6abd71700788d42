#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::assets::AssetCatalog;
use crate::camera::{Point, world_to_local};
use crate::doc::{Sprite, SpriteSet};

/// Which sprites a pick may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    /// Visible and unlocked only. Used to start gestures.
    Grabbable,
    /// Visible, locked or not. Used for hover highlighting.
    IncludingLocked,
}

/// Topmost visible, unlocked sprite with a loaded bitmap under `world_pt`.
#[must_use]
pub fn pick<'a, C: AssetCatalog>(world_pt: Point, sprites: &'a SpriteSet, catalog: &C) -> Option<&'a Sprite> {
    pick_with(world_pt, sprites, catalog, PickMode::Grabbable)
}

/// Like [`pick`], but locked sprites are eligible too.
#[must_use]
pub fn pick_including_locked<'a, C: AssetCatalog>(
    world_pt: Point,
    sprites: &'a SpriteSet,
    catalog: &C,
) -> Option<&'a Sprite> {
    pick_with(world_pt, sprites, catalog, PickMode::IncludingLocked)
}

/// Walk sprites topmost first and return the first whose bitmap rectangle,
/// in the sprite's local space, contains `world_pt`.
#[must_use]
pub fn pick_with<'a, C: AssetCatalog>(
    world_pt: Point,
    sprites: &'a SpriteSet,
    catalog: &C,
    mode: PickMode,
) -> Option<&'a Sprite> {
    sprites.ordered().rev().find(|s| {
        if !s.visible || (s.locked && mode == PickMode::Grabbable) {
            return false;
        }
        catalog
            .lookup(&s.asset)
            .is_some_and(|bmp| contains(s, bmp.width, bmp.height, world_pt))
    })
}

/// Whether `world_pt` falls inside a `width` × `height` bitmap placed by `sprite`.
/// Edges are inclusive.
#[must_use]
pub fn contains(sprite: &Sprite, width: f64, height: f64, world_pt: Point) -> bool {
    let local = world_to_local(world_pt, sprite);
    (0.0..=width).contains(&local.x) && (0.0..=height).contains(&local.y)
}
