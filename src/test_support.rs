//! Test doubles shared by the unit tests of several modules.

use crate::assets::AssetTable;
use crate::camera::Point;
use crate::doc::AssetRef;
use crate::render::{DrawError, Surface};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Save,
    Restore,
    SetTransform([f64; 6]),
    Translate(f64, f64),
    Rotate(f64),
    Scale(f64, f64),
    Alpha(f64),
    Clear([f64; 4]),
    Fill { rect: [f64; 4], color: String },
    StrokeRect { rect: [f64; 4], color: String, width: f64 },
    Line { from: Point, to: Point, color: String, width: f64 },
    Image { image: String, rect: [f64; 4] },
}

/// A [`Surface`] that records every call. Images are their asset names.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<Op>,
    /// `draw_image` fails for this image.
    pub fail_image: Option<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(image: &str) -> Self {
        Self { ops: Vec::new(), fail_image: Some(image.to_owned()) }
    }

    /// Names of the images drawn, in draw order.
    pub fn images(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Image { image, .. } => Some(image.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(&[f64; 4], &str)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Fill { rect, color } => Some((rect, color.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn outlines(&self) -> Vec<(&str, f64)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::StrokeRect { color, width, .. } => Some((color.as_str(), *width)),
                _ => None,
            })
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Line { .. })).count()
    }

    /// Whether every `save` is matched by a later `restore`.
    pub fn balanced(&self) -> bool {
        let mut depth = 0_i32;
        for op in &self.ops {
            match op {
                Op::Save => depth += 1,
                Op::Restore => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        depth == 0
    }
}

impl Surface for RecordingSurface {
    type Image = String;

    fn save(&mut self) {
        self.ops.push(Op::Save);
    }

    fn restore(&mut self) {
        self.ops.push(Op::Restore);
    }

    fn set_transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<(), DrawError> {
        self.ops.push(Op::SetTransform([a, b, c, d, e, f]));
        Ok(())
    }

    fn translate(&mut self, x: f64, y: f64) -> Result<(), DrawError> {
        self.ops.push(Op::Translate(x, y));
        Ok(())
    }

    fn rotate(&mut self, radians: f64) -> Result<(), DrawError> {
        self.ops.push(Op::Rotate(radians));
        Ok(())
    }

    fn scale(&mut self, x: f64, y: f64) -> Result<(), DrawError> {
        self.ops.push(Op::Scale(x, y));
        Ok(())
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.ops.push(Op::Alpha(alpha));
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.ops.push(Op::Clear([x, y, w, h]));
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str) {
        self.ops.push(Op::Fill { rect: [x, y, w, h], color: color.to_owned() });
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str, line_width: f64) {
        self.ops.push(Op::StrokeRect { rect: [x, y, w, h], color: color.to_owned(), width: line_width });
    }

    fn stroke_line(&mut self, from: Point, to: Point, color: &str, line_width: f64) {
        self.ops.push(Op::Line { from, to, color: color.to_owned(), width: line_width });
    }

    fn draw_image(&mut self, image: &String, x: f64, y: f64, w: f64, h: f64) -> Result<(), DrawError> {
        if self.fail_image.as_deref() == Some(image.as_str()) {
            return Err(DrawError::Canvas(format!("decode failed: {image}")));
        }
        self.ops.push(Op::Image { image: image.clone(), rect: [x, y, w, h] });
        Ok(())
    }
}

/// Catalog whose image handles are the asset names themselves.
pub fn catalog(entries: &[(&str, f64, f64)]) -> AssetTable<String> {
    let mut table = AssetTable::new();
    for &(name, w, h) in entries {
        table.insert(AssetRef::new(name), name.to_owned(), w, h);
    }
    table
}
