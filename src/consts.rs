//! Shared numeric constants for the map canvas crate.

// ── Camera ──────────────────────────────────────────────────────

/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Largest allowed zoom factor.
pub const MAX_ZOOM: f64 = 8.0;

/// Multiplicative zoom step for one wheel notch or `+`/`-` key press.
pub const ZOOM_STEP: f64 = 1.1;

// ── Sprite transforms ───────────────────────────────────────────

/// Smallest allowed sprite scale. Scale never reaches zero.
pub const MIN_SCALE: f64 = 0.01;

/// Largest allowed sprite scale.
pub const MAX_SCALE: f64 = 8.0;

/// Degrees of rotation per screen pixel of horizontal pointer travel.
pub const ROTATE_DEG_PER_PX: f64 = 0.3;

/// Relative scale change per screen pixel of horizontal pointer travel.
pub const SCALE_PER_PX: f64 = 0.005;

/// One wheel notch (or `[` / `]` press) counts as this much pointer travel.
pub const WHEEL_STEP_PX: f64 = 10.0;

/// Default arrow-key nudge in world units.
pub const NUDGE_STEP: f64 = 1.0;

/// Default arrow-key nudge with Shift held.
pub const NUDGE_STEP_LARGE: f64 = 10.0;

// ── History ─────────────────────────────────────────────────────

/// Maximum number of undo entries kept; the oldest is dropped first.
pub const HISTORY_LIMIT: usize = 100;

/// Idle time after the last wheel tick that closes a wheel gesture batch.
pub const WHEEL_BATCH_MS: f64 = 180.0;

// ── Scene defaults ──────────────────────────────────────────────

/// Default map width in world units.
pub const DEFAULT_MAP_W: f64 = 1024.0;

/// Default map height in world units.
pub const DEFAULT_MAP_H: f64 = 768.0;

/// Default grid cell size in world units.
pub const DEFAULT_GRID_SIZE: f64 = 64.0;

// ── Colors ──────────────────────────────────────────────────────

/// Editor backdrop behind the map.
pub const BACKDROP_COLOR: &str = "#0b1020";

/// Map fill when no background bitmap is available.
pub const MAP_COLOR: &str = "#0f162b";

/// Grid line color.
pub const GRID_COLOR: &str = "#1f2a44";

/// Outline of the selected sprite.
pub const SELECTION_COLOR: &str = "#7dd3fc";

/// Outline of the hovered sprite.
pub const HOVER_COLOR: &str = "#a78bfa";

/// Selection outline width in screen pixels.
pub const SELECTION_LINE_PX: f64 = 2.0;

/// Hover outline width in screen pixels.
pub const HOVER_LINE_PX: f64 = 1.0;
