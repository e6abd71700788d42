//! Scene snapshot schema for the persistence layer.
//!
//! [`SceneDocument`] is the JSON shape a saved scene takes. Converting a
//! [`Scene`] to a document and back is lossless: every field survives exactly,
//! and sprites keep their draw order (including among equal z values, since
//! sprites are written bottom first and re-inserted in that order).
//!
//! Rehydration is lenient where that costs nothing. Missing sections take
//! defaults, the legacy names `backgroundAssetId` and `assetId` are accepted,
//! and out-of-range numbers are clamped the same way property edits are.

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

use serde::{Deserialize, Serialize};

use crate::camera::{Camera, clamp_zoom};
use crate::doc::{AssetRef, GridSettings, MapSize, Scene, Sprite, SpriteId, SpriteSet};

/// Current snapshot format version.
pub const SCENE_VERSION: u32 = 1;

/// Failure to rehydrate a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("malformed scene json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported scene version {0}")]
    UnsupportedVersion(u32),
    #[error("duplicate sprite id {0}")]
    DuplicateId(SpriteId),
}

/// Serialized scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub map_size: MapSize,
    #[serde(default)]
    pub view: ViewDocument,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default, alias = "backgroundAssetId")]
    pub background_ref: Option<AssetRef>,
    #[serde(default)]
    pub sprites: Vec<SpriteDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanDocument {
    pub x: f64,
    pub y: f64,
}

/// Saved camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewDocument {
    pub pan: PanDocument,
    pub zoom: f64,
}

impl Default for ViewDocument {
    /// A scene saved without a view opens slightly inset from the corner.
    fn default() -> Self {
        Self { pan: PanDocument { x: 40.0, y: 40.0 }, zoom: 1.0 }
    }
}

/// Saved sprite. Draw order is the order of appearance among equal `z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteDocument {
    pub id: SpriteId,
    #[serde(alias = "assetId")]
    pub asset_ref: AssetRef,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "one")]
    pub scale: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
}

fn current_version() -> u32 {
    SCENE_VERSION
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

impl From<&Sprite> for SpriteDocument {
    fn from(s: &Sprite) -> Self {
        Self {
            id: s.id.clone(),
            asset_ref: s.asset.clone(),
            x: s.x,
            y: s.y,
            z: s.z,
            scale: s.scale,
            rotation: s.rotation,
            opacity: s.opacity,
            visible: s.visible,
            locked: s.locked,
        }
    }
}

impl From<SpriteDocument> for Sprite {
    fn from(d: SpriteDocument) -> Self {
        let mut s = Sprite::new(d.id, d.asset_ref, d.x, d.y).with_z(d.z);
        s.scale = d.scale;
        s.rotation = d.rotation;
        s.opacity = d.opacity;
        s.visible = d.visible;
        s.locked = d.locked;
        s
    }
}

impl SceneDocument {
    /// Capture `scene`, sprites bottom first.
    #[must_use]
    pub fn from_scene(scene: &Scene) -> Self {
        let camera = scene.camera;
        Self {
            version: SCENE_VERSION,
            map_size: scene.map_size,
            view: ViewDocument { pan: PanDocument { x: camera.pan_x, y: camera.pan_y }, zoom: camera.zoom },
            grid: scene.grid,
            background_ref: scene.background.clone(),
            sprites: scene.sprites.ordered().map(SpriteDocument::from).collect(),
        }
    }

    /// Build a scene from this document.
    ///
    /// # Errors
    ///
    /// Returns `Err` for an unknown version or a repeated sprite id.
    pub fn into_scene(self) -> Result<Scene, SceneError> {
        if self.version != SCENE_VERSION {
            return Err(SceneError::UnsupportedVersion(self.version));
        }
        let mut sprites = SpriteSet::new();
        for doc in self.sprites {
            let id = doc.id.clone();
            if !sprites.add(Sprite::from(doc)) {
                return Err(SceneError::DuplicateId(id));
            }
        }
        let map_size = if self.map_size.is_valid() {
            self.map_size
        } else {
            log::warn!("invalid map size {}x{}, using default", self.map_size.w, self.map_size.h);
            MapSize::default()
        };
        let scene = Scene {
            map_size,
            background: self.background_ref,
            grid: self.grid,
            sprites,
            camera: sanitize_view(self.view),
        };
        log::info!("scene rehydrated: {} sprites", scene.sprites.len());
        Ok(scene)
    }

    /// # Errors
    ///
    /// Returns `Err` if serialization fails.
    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns `Err` if `raw` is not a valid scene document.
    pub fn from_json(raw: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn sanitize_view(view: ViewDocument) -> Camera {
    let finite_or = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
    Camera {
        pan_x: finite_or(view.pan.x, 0.0),
        pan_y: finite_or(view.pan.y, 0.0),
        zoom: clamp_zoom(finite_or(view.zoom, 1.0)),
    }
}
