//! Scene model: sprite instances, their z-ordered collection, and the scene.
//!
//! This module defines what is on the map (`Sprite`), a sparse-update type for
//! property edits (`SpritePatch`), the ordered collection that exclusively owns
//! all instances (`SpriteSet`), and the `Scene` that bundles the collection
//! with map size, grid, background and camera.
//!
//! `SpriteSet` keeps an explicit draw-order index sorted by `(z, insertion)`.
//! The index is updated incrementally by every operation that touches `z`, so
//! the renderer and hit-tester walk it directly instead of sorting per frame.
//!
//! Every mutation is total: an unknown id is a no-op, never a fault.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::consts::{DEFAULT_GRID_SIZE, DEFAULT_MAP_H, DEFAULT_MAP_W, MAX_SCALE, MIN_SCALE};

/// Opaque, scene-unique identifier of a placed sprite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteId(String);

impl SpriteId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// A fresh random id for a newly placed sprite.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookup-only reference into the external asset catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(String);

impl AssetRef {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A placed image instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Unique identifier within the scene.
    pub id: SpriteId,
    /// Bitmap this sprite shows. May not be loaded yet.
    pub asset: AssetRef,
    /// Anchor (bitmap top-left) x in world units.
    pub x: f64,
    /// Anchor (bitmap top-left) y in world units.
    pub y: f64,
    /// Clockwise rotation in degrees around the anchor. Unbounded.
    pub rotation: f64,
    /// Uniform scale factor, always within `[MIN_SCALE, MAX_SCALE]`.
    pub scale: f64,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Hidden sprites are neither drawn nor picked.
    pub visible: bool,
    /// Locked sprites are drawn but cannot be grabbed.
    pub locked: bool,
    /// Stacking key. Only its relative order matters.
    pub z: f64,
}

impl Sprite {
    /// A visible, unlocked, unrotated sprite at unit scale and full opacity.
    #[must_use]
    pub fn new(id: SpriteId, asset: AssetRef, x: f64, y: f64) -> Self {
        Self {
            id,
            asset,
            x,
            y,
            rotation: 0.0,
            scale: 1.0,
            opacity: 1.0,
            visible: true,
            locked: false,
            z: 0.0,
        }
    }

    /// Builder-style z setter.
    #[must_use]
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    /// Replace out-of-range or non-finite fields with the nearest valid value.
    fn sanitize(&mut self) {
        for v in [&mut self.x, &mut self.y, &mut self.rotation, &mut self.z] {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        self.scale = clamp_scale(self.scale).unwrap_or(1.0);
        self.opacity = clamp_opacity(self.opacity).unwrap_or(1.0);
    }
}

/// Clamp a scale to the valid range. `None` for NaN.
#[must_use]
pub fn clamp_scale(scale: f64) -> Option<f64> {
    if scale.is_nan() {
        None
    } else {
        Some(scale.clamp(MIN_SCALE, MAX_SCALE))
    }
}

/// Clamp an opacity to `0..=1`. `None` for NaN.
#[must_use]
pub fn clamp_opacity(opacity: f64) -> Option<f64> {
    if opacity.is_nan() {
        None
    } else {
        Some(opacity.clamp(0.0, 1.0))
    }
}

/// Sparse update for a sprite. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpritePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl SpritePatch {
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Default::default() }
    }

    #[must_use]
    pub fn rotation(rotation: f64) -> Self {
        Self { rotation: Some(rotation), ..Default::default() }
    }

    #[must_use]
    pub fn scale(scale: f64) -> Self {
        Self { scale: Some(scale), ..Default::default() }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    sprite: Sprite,
    seq: u64,
}

/// The ordered set of sprite instances.
///
/// Cloning produces an independent deep copy, which is what history snapshots
/// store.
#[derive(Debug, Clone, Default)]
pub struct SpriteSet {
    entries: HashMap<SpriteId, Entry>,
    /// Draw order, bottom first, sorted by `(z, seq)`.
    order: Vec<SpriteId>,
    next_seq: u64,
}

impl PartialEq for SpriteSet {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.order.iter().all(|id| match (self.get(id), other.get(id)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            })
    }
}

impl SpriteSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &SpriteId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &SpriteId) -> Option<&Sprite> {
        self.entries.get(id).map(|e| &e.sprite)
    }

    /// Sprites in draw order, bottom first. Reverse it for topmost first.
    pub fn ordered(&self) -> impl DoubleEndedIterator<Item = &Sprite> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| &e.sprite))
    }

    #[must_use]
    pub fn max_z(&self) -> Option<f64> {
        self.ordered().next_back().map(|s| s.z)
    }

    #[must_use]
    pub fn min_z(&self) -> Option<f64> {
        self.ordered().next().map(|s| s.z)
    }

    /// The z a newly placed sprite should get: one above the current maximum.
    #[must_use]
    pub fn next_z(&self) -> f64 {
        self.max_z().map_or(1.0, |z| z + 1.0)
    }

    /// Add a sprite. Returns `false` (and changes nothing) if the id is taken.
    pub fn add(&mut self, mut sprite: Sprite) -> bool {
        if self.entries.contains_key(&sprite.id) {
            log::warn!("sprite {} already present; add ignored", sprite.id);
            return false;
        }
        sprite.sanitize();
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = (sprite.z, seq);
        let idx = self.insertion_index(key);
        self.order.insert(idx, sprite.id.clone());
        self.entries.insert(sprite.id.clone(), Entry { sprite, seq });
        true
    }

    /// Remove a sprite, returning it if it was present.
    pub fn remove(&mut self, id: &SpriteId) -> Option<Sprite> {
        let idx = self.index_of(id)?;
        self.order.remove(idx);
        self.entries.remove(id).map(|e| e.sprite)
    }

    /// Apply a partial update. Returns `true` if anything changed.
    ///
    /// Non-finite values are ignored; scale and opacity are clamped.
    pub fn patch(&mut self, id: &SpriteId, patch: &SpritePatch) -> bool {
        let Some(old_idx) = self.index_of(id) else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };
        let s = &mut entry.sprite;
        let before = s.clone();
        if let Some(x) = patch.x.filter(|v| v.is_finite()) {
            s.x = x;
        }
        if let Some(y) = patch.y.filter(|v| v.is_finite()) {
            s.y = y;
        }
        if let Some(r) = patch.rotation.filter(|v| v.is_finite()) {
            s.rotation = r;
        }
        if let Some(scale) = patch.scale.and_then(clamp_scale) {
            s.scale = scale;
        }
        if let Some(opacity) = patch.opacity.and_then(clamp_opacity) {
            s.opacity = opacity;
        }
        if let Some(visible) = patch.visible {
            s.visible = visible;
        }
        if let Some(locked) = patch.locked {
            s.locked = locked;
        }
        if let Some(z) = patch.z.filter(|v| v.is_finite()) {
            s.z = z;
        }
        let changed = *s != before;
        if s.z != before.z {
            self.reindex(old_idx);
        }
        changed
    }

    /// Set a sprite's z to one above the current maximum.
    pub fn bring_to_front(&mut self, id: &SpriteId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if idx + 1 == self.order.len() {
            return false;
        }
        let z = self.max_z().unwrap_or(0.0) + 1.0;
        self.set_z_at(idx, z);
        true
    }

    /// Set a sprite's z to one below the current minimum.
    pub fn send_to_back(&mut self, id: &SpriteId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if idx == 0 {
            return false;
        }
        let z = self.min_z().unwrap_or(0.0) - 1.0;
        self.set_z_at(idx, z);
        true
    }

    /// Exchange z with the nearest sprite above whose z is strictly greater.
    ///
    /// Sprites tied with the target keep their relative order. When only tied
    /// sprites lie above, the target moves past them instead.
    pub fn raise_one_step(&mut self, id: &SpriteId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let z = self.z_at(idx);
        let neighbor = (idx + 1..self.order.len()).find(|&i| self.z_at(i) > z);
        match neighbor {
            Some(n) => {
                self.swap_z(idx, n);
                true
            }
            None => self.bring_to_front(id),
        }
    }

    /// Exchange z with the nearest sprite below whose z is strictly lower.
    pub fn lower_one_step(&mut self, id: &SpriteId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let z = self.z_at(idx);
        let neighbor = (0..idx).rev().find(|&i| self.z_at(i) < z);
        match neighbor {
            Some(n) => {
                self.swap_z(idx, n);
                true
            }
            None => self.send_to_back(id),
        }
    }

    // --- Order index ---

    fn key_of(&self, id: &SpriteId) -> Option<(f64, u64)> {
        self.entries.get(id).map(|e| (e.sprite.z, e.seq))
    }

    fn z_at(&self, idx: usize) -> f64 {
        self.key_of(&self.order[idx]).map_or(0.0, |k| k.0)
    }

    fn index_of(&self, id: &SpriteId) -> Option<usize> {
        let key = self.key_of(id)?;
        match self.order.binary_search_by(|probe| self.cmp_probe(probe, key)) {
            Ok(i) => Some(i),
            Err(_) => None,
        }
    }

    fn insertion_index(&self, key: (f64, u64)) -> usize {
        match self.order.binary_search_by(|probe| self.cmp_probe(probe, key)) {
            Ok(i) | Err(i) => i,
        }
    }

    fn cmp_probe(&self, probe: &SpriteId, key: (f64, u64)) -> Ordering {
        let probe_key = self.key_of(probe).unwrap_or((f64::NEG_INFINITY, 0));
        cmp_keys(probe_key, key)
    }

    /// Move the id at `old_idx` to where its (already updated) key belongs.
    fn reindex(&mut self, old_idx: usize) {
        let id = self.order.remove(old_idx);
        let Some(key) = self.key_of(&id) else {
            return;
        };
        let idx = self.insertion_index(key);
        self.order.insert(idx, id);
    }

    fn set_z_at(&mut self, idx: usize, z: f64) {
        if let Some(entry) = self.entries.get_mut(&self.order[idx]) {
            entry.sprite.z = z;
        }
        self.reindex(idx);
    }

    fn swap_z(&mut self, a: usize, b: usize) {
        let id_a = self.order[a].clone();
        let id_b = self.order[b].clone();
        let za = self.z_at(a);
        let zb = self.z_at(b);
        // Remove both before re-inserting so neither lookup sees a stale key.
        let (hi, lo) = if a > b { (a, b) } else { (b, a) };
        self.order.remove(hi);
        self.order.remove(lo);
        for (id, z) in [(&id_a, zb), (&id_b, za)] {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.sprite.z = z;
            }
        }
        for id in [id_a, id_b] {
            if let Some(key) = self.key_of(&id) {
                let idx = self.insertion_index(key);
                self.order.insert(idx, id);
            }
        }
    }
}

fn cmp_keys(a: (f64, u64), b: (f64, u64)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Map dimensions in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSize {
    pub w: f64,
    pub h: f64,
}

impl Default for MapSize {
    fn default() -> Self {
        Self { w: DEFAULT_MAP_W, h: DEFAULT_MAP_H }
    }
}

impl MapSize {
    /// Both sides finite and positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.w.is_finite() && self.h.is_finite() && self.w > 0.0 && self.h > 0.0
    }
}

/// Grid overlay and snapping settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    pub enabled: bool,
    pub size: f64,
    pub snap: bool,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self { enabled: false, size: DEFAULT_GRID_SIZE, snap: false }
    }
}

impl GridSettings {
    /// Round a world coordinate to the grid when snapping is on.
    #[must_use]
    pub fn snap_value(&self, v: f64) -> f64 {
        if self.snap && self.size > 0.0 {
            (v / self.size).round() * self.size
        } else {
            v
        }
    }
}

/// Everything the editor shows: map bounds, background, grid, sprites, view.
///
/// `camera` is session state carried alongside the scene for convenience.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub map_size: MapSize,
    pub background: Option<AssetRef>,
    pub grid: GridSettings,
    pub sprites: SpriteSet,
    pub camera: Camera,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
