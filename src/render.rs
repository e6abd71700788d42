//! Rendering: draws the scene to a 2D drawing surface.
//!
//! Drawing goes through the [`Surface`] trait so the same compositing code
//! serves the live canvas ([`Canvas2dSurface`]), one-shot export
//! ([`crate::export`]) and tests. This module and its Canvas2D adapter are
//! the only places that touch [`web_sys::CanvasRenderingContext2d`]. They read
//! scene and UI state and never mutate application state.
//!
//! Faults are contained per element: a sprite whose draw call fails is logged
//! and skipped, and the frame keeps compositing the rest.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::assets::{AssetCatalog, Bitmap};
use crate::camera::{Camera, Point};
use crate::consts::{
    BACKDROP_COLOR, GRID_COLOR, HOVER_COLOR, HOVER_LINE_PX, MAP_COLOR, SELECTION_COLOR, SELECTION_LINE_PX,
};
use crate::doc::{AssetRef, GridSettings, MapSize, Scene, Sprite, SpriteId, SpriteSet};
use crate::input::UiState;

/// A drawing call failed on the host surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DrawError {
    #[error("canvas call failed: {0}")]
    Canvas(String),
    #[error("2d context unavailable")]
    NoContext,
}

impl From<JsValue> for DrawError {
    fn from(value: JsValue) -> Self {
        Self::Canvas(format!("{value:?}"))
    }
}

/// The subset of Canvas2D the renderer needs.
///
/// Transform calls compose onto the current transform; `save`/`restore`
/// bracket state changes exactly as in Canvas2D.
pub trait Surface {
    /// Host image type accepted by [`Surface::draw_image`].
    type Image;

    fn save(&mut self);
    fn restore(&mut self);

    /// Replace the current transform with `[a c e; b d f]`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the host rejects the call.
    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), DrawError>;

    /// # Errors
    ///
    /// Returns `Err` if the host rejects the call.
    fn translate(&mut self, x: f64, y: f64) -> Result<(), DrawError>;

    /// Rotate by `radians`, clockwise on a y-down surface.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the host rejects the call.
    fn rotate(&mut self, radians: f64) -> Result<(), DrawError>;

    /// # Errors
    ///
    /// Returns `Err` if the host rejects the call.
    fn scale(&mut self, x: f64, y: f64) -> Result<(), DrawError>;

    fn set_global_alpha(&mut self, alpha: f64);
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str, line_width: f64);
    fn stroke_line(&mut self, from: Point, to: Point, color: &str, line_width: f64);

    /// Draw `image` into the destination rectangle.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the host fails to draw the image (e.g. a decode fault).
    fn draw_image(&mut self, image: &Self::Image, x: f64, y: f64, w: f64, h: f64) -> Result<(), DrawError>;
}

/// Viewport size in CSS pixels plus device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub dpr: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 0.0, height: 0.0, dpr: 1.0 }
    }
}

/// What gets composited: shared by live rendering and export.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
    pub sprites: &'a SpriteSet,
    pub background: Option<&'a AssetRef>,
    pub map_size: MapSize,
}

impl<'a> Layers<'a> {
    #[must_use]
    pub fn of(scene: &'a Scene) -> Self {
        Self { sprites: &scene.sprites, background: scene.background.as_ref(), map_size: scene.map_size }
    }
}

/// Draw a full editor frame: backdrop, map, sprites, grid, and outlines.
///
/// # Errors
///
/// Returns `Err` if setting up the view transform fails. Faults while drawing
/// individual sprites are logged and skipped, not returned.
pub fn draw<S, C>(surface: &mut S, scene: &Scene, ui: &UiState, catalog: &C, viewport: Viewport) -> Result<(), DrawError>
where
    S: Surface,
    C: AssetCatalog<Image = S::Image>,
{
    let camera = &scene.camera;

    // Layer 1: reset transform and clear the backdrop.
    surface.set_transform(viewport.dpr, 0.0, 0.0, viewport.dpr, 0.0, 0.0)?;
    surface.set_global_alpha(1.0);
    surface.fill_rect(0.0, 0.0, viewport.width, viewport.height, BACKDROP_COLOR);

    // Layer 2: map contents under the camera transform.
    surface.save();
    let result = apply_camera(surface, camera).map(|()| {
        composite(surface, Layers::of(scene), catalog, false);
        if scene.grid.enabled {
            draw_grid(surface, scene.grid, scene.map_size, camera.zoom);
        }
        // Layer 3: hover and selection outlines.
        draw_outlines(surface, scene, ui, catalog);
    });
    surface.restore();
    result
}

fn apply_camera<S: Surface>(surface: &mut S, camera: &Camera) -> Result<(), DrawError> {
    surface.translate(camera.pan_x, camera.pan_y)?;
    surface.scale(camera.zoom, camera.zoom)
}

/// Composite background and visible sprites, bottom first, under whatever
/// world transform the surface currently has.
///
/// A missing background is replaced by the map color unless `transparent`.
pub fn composite<S, C>(surface: &mut S, layers: Layers<'_>, catalog: &C, transparent: bool)
where
    S: Surface,
    C: AssetCatalog<Image = S::Image>,
{
    draw_background(surface, layers, catalog, transparent);

    for sprite in layers.sprites.ordered() {
        if !sprite.visible {
            continue;
        }
        let Some(bitmap) = catalog.lookup(&sprite.asset) else {
            continue;
        };
        if let Err(e) = draw_sprite(surface, sprite, bitmap) {
            log::error!("draw failed for sprite {} (asset {}): {e}", sprite.id, sprite.asset);
        }
    }
}

fn draw_background<S, C>(surface: &mut S, layers: Layers<'_>, catalog: &C, transparent: bool)
where
    S: Surface,
    C: AssetCatalog<Image = S::Image>,
{
    let MapSize { w, h } = layers.map_size;
    if !transparent {
        surface.fill_rect(0.0, 0.0, w, h, MAP_COLOR);
    }
    let Some(bitmap) = layers.background.and_then(|r| catalog.lookup(r)) else {
        return;
    };
    if let Err(e) = surface.draw_image(&bitmap.image, 0.0, 0.0, w, h) {
        log::warn!("background draw failed: {e}");
        if !transparent {
            surface.fill_rect(0.0, 0.0, w, h, MAP_COLOR);
        }
    }
}

fn draw_sprite<S: Surface>(surface: &mut S, sprite: &Sprite, bitmap: &Bitmap<S::Image>) -> Result<(), DrawError> {
    surface.save();
    surface.set_global_alpha(sprite.opacity);
    let result = place_sprite(surface, sprite)
        .and_then(|()| surface.draw_image(&bitmap.image, 0.0, 0.0, bitmap.width, bitmap.height));
    surface.restore();
    result
}

/// Compose the sprite's local-to-world transform onto the surface.
fn place_sprite<S: Surface>(surface: &mut S, sprite: &Sprite) -> Result<(), DrawError> {
    surface.translate(sprite.x, sprite.y)?;
    surface.rotate(sprite.rotation.to_radians())?;
    surface.scale(sprite.scale, sprite.scale)
}

fn draw_grid<S: Surface>(surface: &mut S, grid: GridSettings, map: MapSize, zoom: f64) {
    if grid.size.is_nan() || grid.size < 1.0 {
        return;
    }
    let line_width = 1.0 / zoom;
    let mut x = 0.0;
    while x <= map.w {
        surface.stroke_line(Point::new(x, 0.0), Point::new(x, map.h), GRID_COLOR, line_width);
        x += grid.size;
    }
    let mut y = 0.0;
    while y <= map.h {
        surface.stroke_line(Point::new(0.0, y), Point::new(map.w, y), GRID_COLOR, line_width);
        y += grid.size;
    }
}

fn draw_outlines<S, C>(surface: &mut S, scene: &Scene, ui: &UiState, catalog: &C)
where
    S: Surface,
    C: AssetCatalog<Image = S::Image>,
{
    let zoom = scene.camera.zoom;
    if let Some(hover) = ui.hover_id.as_ref().filter(|h| ui.selected_id.as_ref() != Some(*h)) {
        outline(surface, scene, catalog, hover, HOVER_COLOR, HOVER_LINE_PX / zoom);
    }
    if let Some(selected) = ui.selected_id.as_ref() {
        outline(surface, scene, catalog, selected, SELECTION_COLOR, SELECTION_LINE_PX / zoom);
    }
}

fn outline<S, C>(surface: &mut S, scene: &Scene, catalog: &C, id: &SpriteId, color: &str, world_width: f64)
where
    S: Surface,
    C: AssetCatalog<Image = S::Image>,
{
    let Some(sprite) = scene.sprites.get(id).filter(|s| s.visible) else {
        return;
    };
    let Some(bitmap) = catalog.lookup(&sprite.asset) else {
        return;
    };
    surface.save();
    match place_sprite(surface, sprite) {
        Ok(()) => surface.stroke_rect(0.0, 0.0, bitmap.width, bitmap.height, color, world_width / sprite.scale),
        Err(e) => log::warn!("outline failed for sprite {}: {e}", sprite.id),
    }
    surface.restore();
}

// =============================================================
// Canvas2D adapter
// =============================================================

/// [`Surface`] backed by a browser `CanvasRenderingContext2d`.
pub struct Canvas2dSurface {
    ctx: CanvasRenderingContext2d,
}

impl Canvas2dSurface {
    #[must_use]
    pub fn new(ctx: CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }

    /// Acquire the 2D context of `canvas`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the canvas has no 2D context.
    pub fn from_canvas(canvas: &HtmlCanvasElement) -> Result<Self, DrawError> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or(DrawError::NoContext)?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| DrawError::NoContext)?;
        Ok(Self::new(ctx))
    }
}

impl Surface for Canvas2dSurface {
    type Image = HtmlImageElement;

    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }

    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), DrawError> {
        Ok(self.ctx.set_transform(a, b, c, d, e, f)?)
    }

    fn translate(&mut self, x: f64, y: f64) -> Result<(), DrawError> {
        Ok(self.ctx.translate(x, y)?)
    }

    fn rotate(&mut self, radians: f64) -> Result<(), DrawError> {
        Ok(self.ctx.rotate(radians)?)
    }

    fn scale(&mut self, x: f64, y: f64) -> Result<(), DrawError> {
        Ok(self.ctx.scale(x, y)?)
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.ctx.set_global_alpha(alpha);
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ctx.clear_rect(x, y, w, h);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.ctx.set_fill_style_str(color);
        self.ctx.fill_rect(x, y, w, h);
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str, line_width: f64) {
        self.ctx.set_stroke_style_str(color);
        self.ctx.set_line_width(line_width);
        self.ctx.stroke_rect(x, y, w, h);
    }

    fn stroke_line(&mut self, from: Point, to: Point, color: &str, line_width: f64) {
        self.ctx.set_stroke_style_str(color);
        self.ctx.set_line_width(line_width);
        self.ctx.begin_path();
        self.ctx.move_to(from.x, from.y);
        self.ctx.line_to(to.x, to.y);
        self.ctx.stroke();
    }

    fn draw_image(&mut self, image: &HtmlImageElement, x: f64, y: f64, w: f64, h: f64) -> Result<(), DrawError> {
        Ok(self
            .ctx
            .draw_image_with_html_image_element_and_dw_and_dh(image, x, y, w, h)?)
    }
}
