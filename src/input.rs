//! Input model: tools, modifier keys, mouse buttons, and the gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `InputState` is the active gesture tracked between pointer-down and
//! pointer-up, carrying everything captured at grab time so each move can be
//! solved from the gesture's start rather than accumulated from deltas.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::doc::SpriteId;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pick and drag sprites (default).
    #[default]
    Select,
    /// Primary-button drag pans the view.
    Pan,
    /// Horizontal drag rotates the grabbed sprite.
    Rotate,
    /// Horizontal drag scales the grabbed sprite.
    Scale,
    /// Clicking a sprite requests its deletion.
    Delete,
}

impl Tool {
    /// Whether wheel motion adjusts the selected sprite instead of the view.
    #[must_use]
    pub fn is_transform(self) -> bool {
        matches!(self, Self::Rotate | Self::Scale)
    }
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the browser (e.g. `"Delete"`, `"ArrowLeft"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Unit direction for arrow keys, `None` otherwise.
    #[must_use]
    pub fn arrow_direction(&self) -> Option<(f64, f64)> {
        match self.0.as_str() {
            "ArrowLeft" => Some((-1.0, 0.0)),
            "ArrowRight" => Some((1.0, 0.0)),
            "ArrowUp" => Some((0.0, -1.0)),
            "ArrowDown" => Some((0.0, 1.0)),
            _ => None,
        }
    }

    /// Rotation direction for `[` / `]`, `None` otherwise.
    #[must_use]
    pub fn rotate_direction(&self) -> Option<f64> {
        match self.0.as_str() {
            "[" => Some(-1.0),
            "]" => Some(1.0),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self.0.as_str(), "Delete" | "Backspace")
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Persistent UI state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Currently active tool.
    pub tool: Tool,
    /// The selected sprite. Always `None` or an id present in the scene.
    pub selected_id: Option<SpriteId>,
    /// The sprite under the pointer, locked or not.
    pub hover_id: Option<SpriteId>,
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The user is panning the view.
    Panning {
        /// Screen-space position of the previous pointer event.
        last_screen: Point,
    },
    /// The user is moving a sprite.
    Dragging {
        /// Id of the sprite being dragged.
        id: SpriteId,
        /// Grabbed point in the sprite's local space at grab time.
        offset_local: Point,
        /// Rotation at grab time; the offset is interpreted under it.
        start_rotation: f64,
        /// Scale at grab time; the offset is interpreted under it.
        start_scale: f64,
    },
    /// The user is rotating a sprite with horizontal pointer travel.
    Rotating {
        id: SpriteId,
        /// Screen x at pointer-down.
        start_screen_x: f64,
        /// Rotation in degrees at pointer-down.
        start_rotation: f64,
    },
    /// The user is scaling a sprite with horizontal pointer travel.
    Scaling {
        id: SpriteId,
        /// Screen x at pointer-down.
        start_screen_x: f64,
        /// Scale at pointer-down.
        start_scale: f64,
    },
}

impl InputState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}
