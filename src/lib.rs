//! Interactive sprite canvas for laying out 2D maps.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns a
//! scene of image sprites over a map background: placing, dragging, rotating
//! and scaling sprites with the pointer, panning and zooming the view,
//! undo/redo with gesture batching, and rendering through Canvas2D. The host
//! layer wires DOM events to [`engine::Engine`] and reacts to the returned
//! [`engine::Action`]s (persisting, confirming deletes, updating toolbars).
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`doc`] | Sprites, z-ordered sprite set, scene settings |
//! | [`camera`] | Pan/zoom camera and screen/world/local conversions |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`hit`] | Topmost-sprite hit-testing |
//! | [`history`] | Snapshot undo/redo with interaction batching |
//! | [`assets`] | Weak bitmap lookups by asset ref |
//! | [`render`] | Frame drawing over a [`render::Surface`] |
//! | [`export`] | Map-sized image export |
//! | [`schedule`] | Render loop scheduling (`requestAnimationFrame`) |
//! | [`snapshot`] | Versioned JSON scene documents |
//! | [`prefs`] | User preferences and `localStorage` persistence |
//! | [`consts`] | Shared numeric constants and colors |

pub mod assets;
pub mod camera;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod export;
pub mod history;
pub mod hit;
pub mod input;
pub mod prefs;
pub mod render;
pub mod schedule;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_support;

/// Route `log` output and panics to the browser console.
///
/// Safe to call more than once; later calls keep the first logger.
pub fn init_logging(level: log::Level) {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(level) {
        log::debug!("console logger already installed: {e}");
    }
}
