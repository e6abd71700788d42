//! Interaction controller and engine entry points.
//!
//! [`EngineCore`] turns pointer, wheel and key events into scene mutations and
//! reports what happened as [`Action`]s for the host to process. It has no
//! browser dependency, so it is driven directly by the unit tests. [`Engine`]
//! wraps it with the `<canvas>` element, the Canvas2D surface, and
//! `localStorage`-backed preferences.
//!
//! Every sprite mutation runs inside a history interaction. Pointer gestures
//! span pointer-down to pointer-up; wheel bursts on the rotate/scale tools
//! close once the wheel has been idle for [`WHEEL_BATCH_MS`]; keyboard nudges
//! close on key-up. Discrete commands (place, edit, delete, z-order) are one
//! interaction each.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlCanvasElement, HtmlImageElement};

use crate::assets::{AssetCatalog, AssetTable};
use crate::camera::{self, Camera, Point, rotate_scale, world_to_local};
use crate::consts::{ROTATE_DEG_PER_PX, SCALE_PER_PX, WHEEL_BATCH_MS, WHEEL_STEP_PX, ZOOM_STEP};
use crate::doc::{AssetRef, GridSettings, MapSize, Scene, Sprite, SpriteId, SpritePatch, SpriteSet};
use crate::export::{ExportError, ExportRequest, render_export};
use crate::hit;
use crate::history::History;
use crate::input::{Button, InputState, Key, Modifiers, Tool, UiState, WheelDelta};
use crate::prefs::{LocalStore, Preferences, PreferencesError, PreferencesHandle};
use crate::render::{self, Canvas2dSurface, DrawError, Surface, Viewport};
use crate::schedule::{AnimationFrameScheduler, FrameLoop, ScheduleError};
use crate::snapshot::{SceneDocument, SceneError};

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SpritePlaced(Sprite),
    SpriteUpdated { id: SpriteId, fields: SpritePatch },
    SpriteDeleted { id: SpriteId },
    /// The user asked to delete a sprite. The host confirms (when `confirm`)
    /// and then calls [`EngineCore::delete_sprite`].
    DeleteRequested { id: SpriteId, confirm: bool },
    SelectionChanged(Option<SpriteId>),
    SetCursor(String),
    HistoryChanged { can_undo: bool, can_redo: bool },
    RenderNeeded,
}

/// Core engine state: everything that doesn't depend on the canvas element.
pub struct EngineCore<A: AssetCatalog> {
    pub scene: Scene,
    pub ui: UiState,
    pub input: InputState,
    pub history: History,
    pub prefs: Preferences,
    pub assets: A,
    pub viewport: Viewport,
    /// Canvas top-left in the coordinate space pointer events are reported in.
    pub origin: Point,
    /// When the open wheel batch closes, if one is open.
    wheel_batch_deadline: Option<f64>,
    /// A keyboard nudge/rotate batch is open.
    key_batch_open: bool,
    cursor: &'static str,
}

impl<A: AssetCatalog + Default> Default for EngineCore<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A: AssetCatalog> EngineCore<A> {
    #[must_use]
    pub fn new(assets: A) -> Self {
        Self {
            scene: Scene::new(),
            ui: UiState::default(),
            input: InputState::default(),
            history: History::default(),
            prefs: Preferences::default(),
            assets,
            viewport: Viewport::default(),
            origin: Point::default(),
            wheel_batch_deadline: None,
            key_batch_open: false,
            cursor: "default",
        }
    }

    // --- Scene lifecycle ---

    /// Replace the scene with a rehydrated document. History starts empty.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the document cannot be turned into a scene; the
    /// current scene is left untouched.
    pub fn load_document(&mut self, doc: SceneDocument) -> Result<Vec<Action>, SceneError> {
        self.scene = doc.into_scene()?;
        self.history.clear();
        self.input = InputState::Idle;
        self.wheel_batch_deadline = None;
        self.key_batch_open = false;
        self.ui.hover_id = None;
        let mut actions = Vec::new();
        if self.ui.selected_id.take().is_some() {
            actions.push(Action::SelectionChanged(None));
        }
        actions.push(self.history_changed());
        actions.push(Action::RenderNeeded);
        Ok(actions)
    }

    /// Capture the scene for persistence.
    #[must_use]
    pub fn to_document(&self) -> SceneDocument {
        SceneDocument::from_scene(&self.scene)
    }

    pub fn set_map_size(&mut self, size: MapSize) -> Vec<Action> {
        if !size.is_valid() {
            log::warn!("ignoring invalid map size {}x{}", size.w, size.h);
            return Vec::new();
        }
        self.scene.map_size = size;
        vec![Action::RenderNeeded]
    }

    pub fn set_grid(&mut self, grid: GridSettings) -> Vec<Action> {
        self.scene.grid = grid;
        vec![Action::RenderNeeded]
    }

    pub fn set_background(&mut self, background: Option<AssetRef>) -> Vec<Action> {
        self.scene.background = background;
        vec![Action::RenderNeeded]
    }

    // --- Tool / viewport ---

    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        self.ui.tool = tool;
        let mut actions = Vec::new();
        self.push_cursor(&mut actions);
        actions
    }

    /// Update viewport dimensions (CSS pixels) and device pixel ratio.
    pub fn set_viewport(&mut self, width: f64, height: f64, dpr: f64) {
        self.viewport = Viewport { width, height, dpr: if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 } };
    }

    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    /// Zoom by `factor` keeping the world point under `screen_pt` fixed.
    pub fn zoom_by(&mut self, factor: f64, screen_pt: Point) -> Vec<Action> {
        let anchor = self.canvas_point(screen_pt);
        let before = self.scene.camera;
        self.scene.camera.zoom_at(anchor, before.zoom * factor);
        if self.scene.camera == before {
            return Vec::new();
        }
        vec![Action::RenderNeeded]
    }

    // --- Commands ---

    /// Drop a new sprite for `asset` at a screen point: topmost, selected, one
    /// history entry.
    pub fn place_sprite(&mut self, asset: AssetRef, screen_pt: Point) -> Vec<Action> {
        let mut actions = self.settle();
        let world = self.screen_to_world(screen_pt);
        let sprite = Sprite::new(SpriteId::generate(), asset, world.x, world.y).with_z(self.scene.sprites.next_z());
        let id = sprite.id.clone();

        self.history.begin(&self.scene.sprites);
        self.scene.sprites.add(sprite.clone());
        self.commit(&mut actions);

        actions.push(Action::SpritePlaced(sprite));
        self.set_selection(Some(id), &mut actions);
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Apply a property edit as one undoable step.
    pub fn edit_sprite(&mut self, id: &SpriteId, fields: SpritePatch) -> Vec<Action> {
        let mut actions = self.settle();
        self.history.begin(&self.scene.sprites);
        let changed = self.scene.sprites.patch(id, &fields);
        self.commit(&mut actions);
        if changed {
            actions.push(Action::SpriteUpdated { id: id.clone(), fields });
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Remove a sprite as one undoable step. Clears selection and hover if
    /// they pointed at it.
    pub fn delete_sprite(&mut self, id: &SpriteId) -> Vec<Action> {
        let mut actions = self.settle();
        self.history.begin(&self.scene.sprites);
        let removed = self.scene.sprites.remove(id).is_some();
        self.commit(&mut actions);
        if !removed {
            return actions;
        }
        self.heal_references(&mut actions);
        actions.push(Action::SpriteDeleted { id: id.clone() });
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn bring_to_front(&mut self, id: &SpriteId) -> Vec<Action> {
        self.reorder(id, SpriteSet::bring_to_front)
    }

    pub fn send_to_back(&mut self, id: &SpriteId) -> Vec<Action> {
        self.reorder(id, SpriteSet::send_to_back)
    }

    pub fn raise_one_step(&mut self, id: &SpriteId) -> Vec<Action> {
        self.reorder(id, SpriteSet::raise_one_step)
    }

    pub fn lower_one_step(&mut self, id: &SpriteId) -> Vec<Action> {
        self.reorder(id, SpriteSet::lower_one_step)
    }

    fn reorder(&mut self, id: &SpriteId, op: fn(&mut SpriteSet, &SpriteId) -> bool) -> Vec<Action> {
        let mut actions = self.settle();
        self.history.begin(&self.scene.sprites);
        let changed = op(&mut self.scene.sprites, id);
        self.commit(&mut actions);
        if changed {
            if let Some(z) = self.scene.sprites.get(id).map(|s| s.z) {
                actions.push(Action::SpriteUpdated { id: id.clone(), fields: SpritePatch { z: Some(z), ..Default::default() } });
            }
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Select a sprite by id. Unknown ids clear the selection.
    pub fn select(&mut self, id: Option<SpriteId>) -> Vec<Action> {
        let id = id.filter(|id| self.scene.sprites.contains(id));
        let mut actions = Vec::new();
        self.set_selection(id, &mut actions);
        if !actions.is_empty() {
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    pub fn undo(&mut self) -> Vec<Action> {
        self.step_history(History::undo)
    }

    pub fn redo(&mut self) -> Vec<Action> {
        self.step_history(History::redo)
    }

    fn step_history(&mut self, step: fn(&mut History, &mut SpriteSet) -> bool) -> Vec<Action> {
        // Any open batch is folded into history by the step itself.
        let mut actions = Vec::new();
        self.input = InputState::Idle;
        self.wheel_batch_deadline = None;
        self.key_batch_open = false;
        self.push_cursor(&mut actions);
        if !step(&mut self.history, &mut self.scene.sprites) {
            return actions;
        }
        self.heal_references(&mut actions);
        actions.push(self.history_changed());
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        let mut actions = self.finish_batches();
        if !self.input.is_idle() {
            return actions;
        }

        let tool = self.ui.tool;
        let is_pan =
            button == Button::Middle || (button == Button::Primary && (modifiers.shift || tool == Tool::Pan));
        if is_pan {
            self.input = InputState::Panning { last_screen: screen_pt };
            self.push_cursor(&mut actions);
            return actions;
        }
        if button != Button::Primary {
            return actions;
        }

        let world = self.screen_to_world(screen_pt);
        let Some(picked) = hit::pick(world, &self.scene.sprites, &self.assets).cloned() else {
            if self.ui.selected_id.is_some() {
                self.set_selection(None, &mut actions);
                actions.push(Action::RenderNeeded);
            }
            return actions;
        };

        self.set_selection(Some(picked.id.clone()), &mut actions);
        actions.push(Action::RenderNeeded);

        if tool == Tool::Delete {
            actions.push(Action::DeleteRequested { id: picked.id, confirm: !self.prefs.skip_delete_confirm });
            return actions;
        }

        self.history.begin(&self.scene.sprites);
        self.input = if modifiers.alt || tool == Tool::Rotate {
            InputState::Rotating { id: picked.id, start_screen_x: screen_pt.x, start_rotation: picked.rotation }
        } else if tool == Tool::Scale {
            InputState::Scaling { id: picked.id, start_screen_x: screen_pt.x, start_scale: picked.scale }
        } else {
            InputState::Dragging {
                offset_local: world_to_local(world, &picked),
                id: picked.id,
                start_rotation: picked.rotation,
                start_scale: picked.scale,
            }
        };
        self.push_cursor(&mut actions);
        actions
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.input.clone() {
            InputState::Idle => self.update_hover(screen_pt, &mut actions),
            InputState::Panning { last_screen } => {
                self.scene.camera.pan_by(screen_pt.x - last_screen.x, screen_pt.y - last_screen.y);
                self.input = InputState::Panning { last_screen: screen_pt };
                actions.push(Action::RenderNeeded);
            }
            InputState::Dragging { id, offset_local, start_rotation, start_scale } => {
                // Keep the grabbed local point under the cursor.
                let world = self.screen_to_world(screen_pt);
                let arm = rotate_scale(offset_local, start_rotation, start_scale);
                let grid = self.scene.grid;
                let x = grid.snap_value(world.x - arm.x);
                let y = grid.snap_value(world.y - arm.y);
                self.apply_patch(&id, SpritePatch::position(x, y), &mut actions);
            }
            InputState::Rotating { id, start_screen_x, start_rotation } => {
                let rotation = start_rotation + (screen_pt.x - start_screen_x) * ROTATE_DEG_PER_PX;
                self.apply_patch(&id, SpritePatch::rotation(rotation), &mut actions);
            }
            InputState::Scaling { id, start_screen_x, start_scale } => {
                let scale = start_scale * (1.0 + (screen_pt.x - start_screen_x) * SCALE_PER_PX);
                self.apply_patch(&id, SpritePatch::scale(scale), &mut actions);
            }
        }
        actions
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        self.end_gesture()
    }

    /// The pointer left the canvas: drop the hover.
    ///
    /// An active gesture keeps running until [`Self::on_pointer_up`], which the
    /// host reports from a window-level listener so releases outside the
    /// canvas still end it.
    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.ui.hover_id.take().is_some() {
            actions.push(Action::RenderNeeded);
        }
        self.push_cursor(&mut actions);
        actions
    }

    fn end_gesture(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        match std::mem::take(&mut self.input) {
            InputState::Idle => return actions,
            InputState::Panning { .. } => {}
            InputState::Dragging { .. } | InputState::Rotating { .. } | InputState::Scaling { .. } => {
                self.commit(&mut actions);
            }
        }
        self.push_cursor(&mut actions);
        actions
    }

    // --- Wheel ---

    /// Wheel input at `now_ms` (any monotonic millisecond clock).
    ///
    /// With the rotate or scale tool and a selection, each notch adjusts the
    /// selected sprite and the burst is one history entry; otherwise the wheel
    /// pans, or zooms about the cursor with Ctrl/Meta.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers, now_ms: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        self.finish_key_batch(&mut actions);
        self.poll_wheel_batch(now_ms, &mut actions);

        if self.ui.tool.is_transform() {
            if let Some(id) = self.ui.selected_id.clone().filter(|id| self.scene.sprites.contains(id)) {
                if self.input.is_idle() && delta.dy != 0.0 {
                    self.wheel_adjust(&id, delta.dy, now_ms, &mut actions);
                }
                return actions;
            }
        }

        if modifiers.command() {
            let factor = if delta.dy > 0.0 { 0.9 } else { 1.1 };
            actions.extend(self.zoom_by(factor, screen_pt));
        } else if modifiers.shift {
            self.scene.camera.pan_by(-delta.dy, 0.0);
            actions.push(Action::RenderNeeded);
        } else {
            self.scene.camera.pan_by(-delta.dx, -delta.dy);
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    fn wheel_adjust(&mut self, id: &SpriteId, dy: f64, now_ms: f64, actions: &mut Vec<Action>) {
        let Some(sprite) = self.scene.sprites.get(id) else {
            return;
        };
        let direction = dy.signum();
        let patch = match self.ui.tool {
            Tool::Rotate => SpritePatch::rotation(sprite.rotation + direction * WHEEL_STEP_PX * ROTATE_DEG_PER_PX),
            Tool::Scale => {
                let step = 1.0 + WHEEL_STEP_PX * SCALE_PER_PX;
                let factor = if direction > 0.0 { 1.0 / step } else { step };
                SpritePatch::scale(sprite.scale * factor)
            }
            Tool::Select | Tool::Pan | Tool::Delete => return,
        };
        if self.wheel_batch_deadline.is_none() {
            self.history.begin(&self.scene.sprites);
        }
        self.wheel_batch_deadline = Some(now_ms + WHEEL_BATCH_MS);
        self.apply_patch(id, patch, actions);
    }

    /// Close timed batches whose deadline has passed. Call once per frame.
    pub fn poll_timers(&mut self, now_ms: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        self.poll_wheel_batch(now_ms, &mut actions);
        actions
    }

    fn poll_wheel_batch(&mut self, now_ms: f64, actions: &mut Vec<Action>) {
        if self.wheel_batch_deadline.is_some_and(|deadline| now_ms >= deadline) {
            self.finish_wheel_batch(actions);
        }
    }

    fn finish_wheel_batch(&mut self, actions: &mut Vec<Action>) {
        if self.wheel_batch_deadline.take().is_some() {
            self.commit(actions);
        }
    }

    /// Whether a wheel batch is waiting for its idle timeout.
    #[must_use]
    pub fn wheel_batch_open(&self) -> bool {
        self.wheel_batch_deadline.is_some()
    }

    // --- Keyboard ---

    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        let name = key.0.as_str();
        if modifiers.command() {
            if name.eq_ignore_ascii_case("z") {
                return if modifiers.shift { self.redo() } else { self.undo() };
            }
            if name.eq_ignore_ascii_case("y") {
                return self.redo();
            }
            return Vec::new();
        }

        let center = self.viewport_center();
        match name {
            "+" | "=" => return self.zoom_by(ZOOM_STEP, center),
            "-" => return self.zoom_by(1.0 / ZOOM_STEP, center),
            _ => {}
        }

        let Some(id) = self.ui.selected_id.clone().filter(|id| self.scene.sprites.contains(id)) else {
            return Vec::new();
        };
        if key.is_delete() {
            return vec![Action::DeleteRequested { id, confirm: !self.prefs.skip_delete_confirm }];
        }
        if !self.input.is_idle() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let Some((dx, dy)) = key.arrow_direction() {
            let step = if modifiers.shift { self.prefs.nudge_step_large } else { self.prefs.nudge_step };
            if let Some(s) = self.scene.sprites.get(&id) {
                let patch = SpritePatch::position(s.x + dx * step, s.y + dy * step);
                self.open_key_batch(&mut actions);
                self.apply_patch(&id, patch, &mut actions);
            }
        } else if let Some(direction) = key.rotate_direction() {
            if let Some(s) = self.scene.sprites.get(&id) {
                let patch = SpritePatch::rotation(s.rotation + direction * WHEEL_STEP_PX * ROTATE_DEG_PER_PX);
                self.open_key_batch(&mut actions);
                self.apply_patch(&id, patch, &mut actions);
            }
        }
        actions
    }

    pub fn on_key_up(&mut self, key: Key, _modifiers: Modifiers) -> Vec<Action> {
        let mut actions = Vec::new();
        if key.arrow_direction().is_some() || key.rotate_direction().is_some() {
            self.finish_key_batch(&mut actions);
        }
        actions
    }

    fn open_key_batch(&mut self, actions: &mut Vec<Action>) {
        if !self.key_batch_open {
            self.finish_wheel_batch(actions);
            self.history.begin(&self.scene.sprites);
            self.key_batch_open = true;
        }
    }

    fn finish_key_batch(&mut self, actions: &mut Vec<Action>) {
        if std::mem::take(&mut self.key_batch_open) {
            self.commit(actions);
        }
    }

    /// End whatever gesture or batch is open so a command gets its own entry.
    fn settle(&mut self) -> Vec<Action> {
        let mut actions = self.end_gesture();
        self.finish_key_batch(&mut actions);
        self.finish_wheel_batch(&mut actions);
        actions
    }

    fn finish_batches(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.finish_key_batch(&mut actions);
        self.finish_wheel_batch(&mut actions);
        actions
    }

    // --- Rendering ---

    /// Draw the editor frame.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the surface rejects the frame setup.
    pub fn render<S: Surface<Image = A::Image>>(&self, surface: &mut S) -> Result<(), DrawError> {
        render::draw(surface, &self.scene, &self.ui, &self.assets, self.viewport)
    }

    /// The export request for the current scene and export preferences.
    #[must_use]
    pub fn export_request(&self) -> ExportRequest<'_> {
        ExportRequest::from_scene(&self.scene, &self.prefs)
    }

    // --- Queries ---

    #[must_use]
    pub fn selection(&self) -> Option<&SpriteId> {
        self.ui.selected_id.as_ref()
    }

    #[must_use]
    pub fn hover(&self) -> Option<&SpriteId> {
        self.ui.hover_id.as_ref()
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.scene.camera
    }

    #[must_use]
    pub fn sprite(&self, id: &SpriteId) -> Option<&Sprite> {
        self.scene.sprites.get(id)
    }

    /// Current cursor name.
    #[must_use]
    pub fn cursor(&self) -> &'static str {
        self.cursor
    }

    /// Convert a screen point to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen_pt: Point) -> Point {
        camera::screen_to_world(screen_pt, self.origin, &self.scene.camera)
    }

    // --- Internals ---

    fn canvas_point(&self, screen_pt: Point) -> Point {
        Point::new(screen_pt.x - self.origin.x, screen_pt.y - self.origin.y)
    }

    fn viewport_center(&self) -> Point {
        Point::new(self.origin.x + self.viewport.width / 2.0, self.origin.y + self.viewport.height / 2.0)
    }

    fn apply_patch(&mut self, id: &SpriteId, fields: SpritePatch, actions: &mut Vec<Action>) {
        if self.scene.sprites.patch(id, &fields) {
            actions.push(Action::SpriteUpdated { id: id.clone(), fields });
            actions.push(Action::RenderNeeded);
        }
    }

    fn commit(&mut self, actions: &mut Vec<Action>) {
        if self.history.commit(&self.scene.sprites) {
            actions.push(self.history_changed());
        }
    }

    fn history_changed(&self) -> Action {
        Action::HistoryChanged { can_undo: self.history.can_undo(), can_redo: self.history.can_redo() }
    }

    fn set_selection(&mut self, id: Option<SpriteId>, actions: &mut Vec<Action>) {
        if self.ui.selected_id != id {
            self.ui.selected_id.clone_from(&id);
            actions.push(Action::SelectionChanged(id));
        }
    }

    /// Drop selection/hover ids that no longer exist in the scene.
    fn heal_references(&mut self, actions: &mut Vec<Action>) {
        if self.ui.selected_id.as_ref().is_some_and(|id| !self.scene.sprites.contains(id)) {
            self.set_selection(None, actions);
        }
        if self.ui.hover_id.as_ref().is_some_and(|id| !self.scene.sprites.contains(id)) {
            self.ui.hover_id = None;
            self.push_cursor(actions);
        }
    }

    fn update_hover(&mut self, screen_pt: Point, actions: &mut Vec<Action>) {
        let world = self.screen_to_world(screen_pt);
        let hover = hit::pick_including_locked(world, &self.scene.sprites, &self.assets).map(|s| s.id.clone());
        if hover != self.ui.hover_id {
            self.ui.hover_id = hover;
            actions.push(Action::RenderNeeded);
        }
        self.push_cursor(actions);
    }

    fn cursor_for_state(&self) -> &'static str {
        let over = self.ui.hover_id.is_some();
        match self.input {
            InputState::Panning { .. } | InputState::Dragging { .. } => "grabbing",
            InputState::Rotating { .. } => "crosshair",
            InputState::Scaling { .. } => "nwse-resize",
            InputState::Idle => match self.ui.tool {
                Tool::Pan => "grab",
                Tool::Delete => "not-allowed",
                Tool::Rotate if over => "crosshair",
                Tool::Scale if over => "nwse-resize",
                Tool::Select if over => "pointer",
                Tool::Rotate | Tool::Scale | Tool::Select => "default",
            },
        }
    }

    fn push_cursor(&mut self, actions: &mut Vec<Action>) {
        let next = self.cursor_for_state();
        if next != self.cursor {
            self.cursor = next;
            actions.push(Action::SetCursor(next.to_owned()));
        }
    }
}

// =============================================================
// Browser engine
// =============================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Preferences(#[from] PreferencesError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("dom call failed: {0}")]
    Dom(String),
}

impl From<JsValue> for EngineError {
    fn from(value: JsValue) -> Self {
        Self::Dom(format!("{value:?}"))
    }
}

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    surface: Canvas2dSurface,
    prefs: Option<PreferencesHandle<LocalStore>>,
    pub core: EngineCore<AssetTable<HtmlImageElement>>,
}

impl Engine {
    /// Create an engine bound to `canvas`, loading preferences from `localStorage`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, EngineError> {
        let surface = Canvas2dSurface::from_canvas(&canvas)?;
        let mut core = EngineCore::new(AssetTable::new());
        let prefs = match LocalStore::open() {
            Ok(store) => {
                let handle = PreferencesHandle::load(store);
                core.prefs = handle.get().clone();
                Some(handle)
            }
            Err(e) => {
                log::warn!("preferences will not persist: {e}");
                None
            }
        };
        Ok(Self { canvas, surface, prefs, core })
    }

    /// Start the render loop for this engine. Actions produced by frame timers
    /// (closing a wheel batch) are passed to `on_actions`.
    ///
    /// The loop stops when the returned [`FrameLoop`] is torn down or dropped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if animation frames cannot be scheduled.
    pub fn mount(
        engine: &Rc<RefCell<Self>>,
        mut on_actions: Box<dyn FnMut(Vec<Action>)>,
    ) -> Result<FrameLoop<AnimationFrameScheduler>, EngineError> {
        let engine = Rc::clone(engine);
        let mut frame_loop = FrameLoop::new(AnimationFrameScheduler::new());
        frame_loop.mount(Box::new(move |_ts: f64| {
            let Ok(mut engine) = engine.try_borrow_mut() else {
                return;
            };
            let actions = engine.frame(js_sys::Date::now());
            drop(engine);
            if !actions.is_empty() {
                on_actions(actions);
            }
        }))?;
        Ok(frame_loop)
    }

    /// Run timers and draw one frame.
    pub fn frame(&mut self, now_ms: f64) -> Vec<Action> {
        let actions = self.core.poll_timers(now_ms);
        if let Err(e) = self.render() {
            log::error!("frame render failed: {e}");
        }
        actions
    }

    /// Draw the current state to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the frame could not be set up.
    pub fn render(&mut self) -> Result<(), EngineError> {
        self.core.render(&mut self.surface)?;
        Ok(())
    }

    /// Resize the backing store to `width × height` CSS pixels at `dpr`.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.core.set_viewport(width_css, height_css, dpr);
        let dpr = self.core.viewport.dpr;
        self.canvas.set_width(device_pixels(width_css * dpr));
        self.canvas.set_height(device_pixels(height_css * dpr));
    }

    /// Register a loaded bitmap with the asset catalog.
    pub fn insert_image(&mut self, asset: AssetRef, image: HtmlImageElement) -> Vec<Action> {
        let width = f64::from(image.natural_width());
        let height = f64::from(image.natural_height());
        self.core.assets.insert(asset, image, width, height);
        vec![Action::RenderNeeded]
    }

    /// Change preferences and persist them.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the changed preferences could not be saved; they still
    /// apply for this session.
    pub fn update_preferences(&mut self, edit: impl FnOnce(&mut Preferences)) -> Result<bool, EngineError> {
        let Some(handle) = self.prefs.as_mut() else {
            let mut next = self.core.prefs.clone();
            edit(&mut next);
            let next = next.sanitized();
            let changed = next != self.core.prefs;
            self.core.prefs = next;
            return Ok(changed);
        };
        let result = handle.update(edit);
        self.core.prefs = handle.get().clone();
        Ok(result?)
    }

    /// Render the scene into a fresh canvas sized for export.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the export canvas cannot be created or drawn.
    pub fn export_canvas(&self) -> Result<HtmlCanvasElement, EngineError> {
        let request = self.core.export_request();
        let size = request.size()?;
        let document = self
            .canvas
            .owner_document()
            .ok_or_else(|| EngineError::Dom("canvas has no owner document".into()))?;
        let out = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| EngineError::Dom("created element is not a canvas".into()))?;
        out.set_width(size.width);
        out.set_height(size.height);
        let mut surface = Canvas2dSurface::from_canvas(&out)?;
        render_export(&mut surface, &request, &self.core.assets)?;
        Ok(out)
    }

    /// Serialize the scene to JSON.
    ///
    /// # Errors
    ///
    /// Returns `Err` if serialization fails.
    pub fn save_json(&self) -> Result<String, SceneError> {
        self.core.to_document().to_json()
    }

    /// Replace the scene from JSON.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `raw` is not a valid scene; the current scene is kept.
    pub fn load_json(&mut self, raw: &str) -> Result<Vec<Action>, SceneError> {
        let doc = SceneDocument::from_json(raw)?;
        self.core.load_document(doc)
    }

    // --- Delegated input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_down(screen_pt, button, modifiers)
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_move(screen_pt, modifiers)
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_pointer_up(screen_pt, button, modifiers)
    }

    pub fn on_pointer_leave(&mut self) -> Vec<Action> {
        self.core.on_pointer_leave()
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_wheel(screen_pt, delta, modifiers, js_sys::Date::now())
    }

    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_key_down(key, modifiers)
    }

    pub fn on_key_up(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        self.core.on_key_up(key, modifiers)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn device_pixels(extent: f64) -> u32 {
    if extent.is_finite() { extent.round().clamp(0.0, f64::from(u32::MAX)) as u32 } else { 0 }
}
