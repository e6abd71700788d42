//! Asset catalog contract: weak bitmap lookups by [`AssetRef`].
//!
//! The engine never owns bitmaps. Sprites and the background hold an
//! [`AssetRef`] and resolve it on every use; a reference that is stale or not
//! yet loaded simply resolves to `None`, and callers skip the element.

use std::collections::HashMap;

use crate::doc::AssetRef;

/// A loaded bitmap and its natural size in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap<I> {
    pub image: I,
    pub width: f64,
    pub height: f64,
}

/// Lookup-only access to loaded bitmaps.
pub trait AssetCatalog {
    /// Host image handle the renderer draws (e.g. `HtmlImageElement`).
    type Image;

    /// Resolve a reference. Must tolerate unknown or not-yet-loaded refs.
    fn lookup(&self, asset: &AssetRef) -> Option<&Bitmap<Self::Image>>;
}

/// A simple in-memory catalog keyed by asset ref.
///
/// Hosts insert a bitmap once its image has finished loading, so lookups only
/// ever see complete images.
#[derive(Debug, Clone)]
pub struct AssetTable<I> {
    bitmaps: HashMap<AssetRef, Bitmap<I>>,
}

impl<I> Default for AssetTable<I> {
    fn default() -> Self {
        Self { bitmaps: HashMap::new() }
    }
}

impl<I> AssetTable<I> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a loaded bitmap.
    pub fn insert(&mut self, asset: AssetRef, image: I, width: f64, height: f64) {
        self.bitmaps.insert(asset, Bitmap { image, width, height });
    }

    /// Forget a bitmap. Sprites still referencing it are skipped from then on.
    pub fn remove(&mut self, asset: &AssetRef) -> Option<Bitmap<I>> {
        self.bitmaps.remove(asset)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }
}

impl<I> AssetCatalog for AssetTable<I> {
    type Image = I;

    fn lookup(&self, asset: &AssetRef) -> Option<&Bitmap<I>> {
        self.bitmaps.get(asset)
    }
}
