//! One-shot raster export of the scene.
//!
//! Export reuses [`render::composite`], so its output matches the live editor
//! at `zoom = scale` and zero pan: same layer order, same sprite transforms.
//! There is no backdrop, grid, or outline in an export.

#[cfg(test)]
#[path = "export_test.rs"]
mod export_test;

use crate::assets::AssetCatalog;
use crate::doc::Scene;
use crate::prefs::Preferences;
use crate::render::{self, DrawError, Layers, Surface};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExportError {
    #[error("export scale must be a positive finite number, got {0}")]
    InvalidScale(f64),
    #[error(transparent)]
    Draw(#[from] DrawError),
}

/// Output pixel size of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSize {
    pub width: u32,
    pub height: u32,
}

/// What to export and how.
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub layers: Layers<'a>,
    /// World-to-pixel factor.
    pub scale: f64,
    /// Leave uncovered pixels transparent instead of filling the map color.
    pub transparent: bool,
}

impl<'a> ExportRequest<'a> {
    /// Export of `scene` using the user's last export settings.
    #[must_use]
    pub fn from_scene(scene: &'a Scene, prefs: &Preferences) -> Self {
        Self { layers: Layers::of(scene), scale: prefs.export_scale, transparent: prefs.export_transparent }
    }

    /// `max(1, floor(map * scale))` per axis.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `scale` is not a positive finite number.
    pub fn size(&self) -> Result<ExportSize, ExportError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ExportError::InvalidScale(self.scale));
        }
        let map = self.layers.map_size;
        Ok(ExportSize { width: pixels(map.w * self.scale), height: pixels(map.h * self.scale) })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixels(extent: f64) -> u32 {
    extent.floor().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Render `request` onto `surface`, which must be at least [`ExportRequest::size`].
///
/// Returns the output size the surface was drawn for.
///
/// # Errors
///
/// Returns `Err` for an invalid scale or when the base transform is rejected.
/// Individual sprite faults are logged and skipped.
pub fn render_export<S, C>(surface: &mut S, request: &ExportRequest<'_>, catalog: &C) -> Result<ExportSize, ExportError>
where
    S: Surface,
    C: AssetCatalog<Image = S::Image>,
{
    let size = request.size()?;
    surface.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)?;
    surface.clear_rect(0.0, 0.0, f64::from(size.width), f64::from(size.height));
    surface.set_transform(request.scale, 0.0, 0.0, request.scale, 0.0, 0.0)?;
    surface.set_global_alpha(1.0);
    render::composite(surface, request.layers, catalog, request.transparent);
    log::info!(
        "exported {} sprites at {}x{} (transparent: {})",
        request.layers.sprites.len(),
        size.width,
        size.height,
        request.transparent
    );
    Ok(size)
}
