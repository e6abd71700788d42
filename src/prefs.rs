//! User preferences and their persistence.
//!
//! Preferences are an explicit value handed to whoever needs them. They are
//! loaded once at startup from a [`PreferenceStore`] and written back through
//! [`PreferencesHandle::update`] whenever they change. A missing or corrupt
//! stored value falls back to defaults and never blocks startup.

#[cfg(test)]
#[path = "prefs_test.rs"]
mod prefs_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;
use web_sys::Storage;

use crate::consts::{NUDGE_STEP, NUDGE_STEP_LARGE};

/// Storage key for the serialized preferences.
pub const PREFERENCES_KEY: &str = "mapcanvas.preferences";

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("preference storage unavailable")]
    Unavailable,
    #[error("preference storage rejected the call: {0}")]
    Storage(String),
    #[error("preference encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<JsValue> for PreferencesError {
    fn from(value: JsValue) -> Self {
        Self::Storage(format!("{value:?}"))
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// Delete without asking for confirmation.
    pub skip_delete_confirm: bool,
    /// Last export scale.
    pub export_scale: f64,
    /// Last export transparency choice.
    pub export_transparent: bool,
    /// Arrow-key nudge in world units.
    pub nudge_step: f64,
    /// Arrow-key nudge with Shift.
    pub nudge_step_large: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            skip_delete_confirm: false,
            export_scale: 1.0,
            export_transparent: false,
            nudge_step: NUDGE_STEP,
            nudge_step_large: NUDGE_STEP_LARGE,
        }
    }
}

impl Preferences {
    /// Read preferences from `store`, falling back to defaults on any failure.
    #[must_use]
    pub fn load<S: PreferenceStore + ?Sized>(store: &S) -> Self {
        let raw = match store.read(PREFERENCES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::default(),
            Err(e) => {
                log::warn!("preferences: read failed, using defaults: {e}");
                return Self::default();
            }
        };
        match serde_json::from_str::<Self>(&raw) {
            Ok(prefs) => prefs.sanitized(),
            Err(e) => {
                log::warn!("preferences: stored value is corrupt, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Write preferences to `store`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if encoding fails or the store rejects the write.
    pub fn save<S: PreferenceStore + ?Sized>(&self, store: &mut S) -> Result<(), PreferencesError> {
        let raw = serde_json::to_string(self)?;
        store.write(PREFERENCES_KEY, &raw)
    }

    /// Replace non-positive or non-finite numbers with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.export_scale) {
            self.export_scale = defaults.export_scale;
        }
        if !positive(self.nudge_step) {
            self.nudge_step = defaults.nudge_step;
        }
        if !positive(self.nudge_step_large) {
            self.nudge_step_large = defaults.nudge_step_large;
        }
        self
    }
}

// =============================================================
// Stores
// =============================================================

/// Key/value string storage.
pub trait PreferenceStore {
    /// # Errors
    ///
    /// Returns `Err` if the backing storage cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, PreferencesError>;

    /// # Errors
    ///
    /// Returns `Err` if the backing storage rejects the write (e.g. quota).
    fn write(&mut self, key: &str, value: &str) -> Result<(), PreferencesError>;
}

/// Browser `localStorage`.
pub struct LocalStore {
    storage: Storage,
}

impl LocalStore {
    /// Open the window's local storage.
    ///
    /// # Errors
    ///
    /// Returns `Err` outside a browser or when storage is disabled.
    pub fn open() -> Result<Self, PreferencesError> {
        let window = web_sys::window().ok_or(PreferencesError::Unavailable)?;
        let storage = window.local_storage()?.ok_or(PreferencesError::Unavailable)?;
        Ok(Self { storage })
    }
}

impl PreferenceStore for LocalStore {
    fn read(&self, key: &str) -> Result<Option<String>, PreferencesError> {
        Ok(self.storage.get_item(key)?)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PreferencesError> {
        Ok(self.storage.set_item(key, value)?)
    }
}

/// In-memory store for headless hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, PreferencesError> {
        Ok(self.items.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PreferencesError> {
        self.items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

// =============================================================
// Handle
// =============================================================

/// Loaded preferences bound to the store they persist to.
pub struct PreferencesHandle<S: PreferenceStore> {
    prefs: Preferences,
    store: S,
}

impl<S: PreferenceStore> PreferencesHandle<S> {
    /// Load from `store` once.
    #[must_use]
    pub fn load(store: S) -> Self {
        let prefs = Preferences::load(&store);
        Self { prefs, store }
    }

    #[must_use]
    pub fn get(&self) -> &Preferences {
        &self.prefs
    }

    /// Apply `edit`; if anything changed, sanitize and save.
    ///
    /// Returns whether the preferences changed. The in-memory value is updated
    /// even when saving fails.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the changed preferences could not be saved.
    pub fn update(&mut self, edit: impl FnOnce(&mut Preferences)) -> Result<bool, PreferencesError> {
        let mut next = self.prefs.clone();
        edit(&mut next);
        let next = next.sanitized();
        if next == self.prefs {
            return Ok(false);
        }
        self.prefs = next;
        self.prefs.save(&mut self.store)?;
        Ok(true)
    }
}
