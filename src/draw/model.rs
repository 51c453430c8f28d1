use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Committed strokes need at least this many points.
pub const MIN_STROKE_POINTS: usize = 2;
/// Widest brush, in pixels, a stroke may carry.
pub const MAX_STROKE_WIDTH: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgba(220, 38, 38, 255)
    }
}

/// A point expressed as a fraction of the canvas extent, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn from_screen(point: (f64, f64), size: CanvasSize) -> Self {
        let width = f64::from(size.width.max(1));
        let height = f64::from(size.height.max(1));
        Self {
            x: (point.0 / width).clamp(0.0, 1.0),
            y: (point.1 / height).clamp(0.0, 1.0),
        }
    }

    /// Both coordinates finite and inside `[0, 1]`.
    pub fn is_in_range(self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Out-of-range coordinates land on the canvas edge; NaN maps to 0.
    pub fn to_screen(self, size: CanvasSize) -> (i32, i32) {
        (
            (self.x.clamp(0.0, 1.0) * f64::from(size.width)).round() as i32,
            (self.y.clamp(0.0, 1.0) * f64::from(size.height)).round() as i32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    /// Unique per stroke, `{sourceId}-{seq}`.
    pub id: String,
    pub points: Vec<NormalizedPoint>,
    #[serde(default)]
    pub is_eraser: bool,
    #[serde(default)]
    pub color: Color,
    #[serde(default = "default_stroke_width")]
    pub width: u32,
}

fn default_stroke_width() -> u32 {
    4
}

impl Stroke {
    /// Enough points, all of them on the canvas, and a sane brush width.
    pub fn is_well_formed(&self) -> bool {
        self.points.len() >= MIN_STROKE_POINTS
            && self.width <= MAX_STROKE_WIDTH
            && self.points.iter().all(|p| p.is_in_range())
    }
}

/// Append-only replicated stroke log. Appends are keyed by stroke id, so
/// delivering the same stroke twice leaves the log unchanged. Malformed
/// strokes are refused.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawingLog {
    strokes: Vec<Stroke>,
}

impl DrawingLog {
    pub fn append(&mut self, stroke: Stroke) -> bool {
        if !stroke.is_well_formed() || self.contains(&stroke.id) {
            return false;
        }
        self.strokes.push(stroke);
        true
    }

    /// Appends every stroke not already present and returns how many were new.
    pub fn merge(&mut self, strokes: impl IntoIterator<Item = Stroke>) -> usize {
        strokes
            .into_iter()
            .map(|stroke| self.append(stroke))
            .filter(|added| *added)
            .count()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.strokes.iter().any(|stroke| stroke.id == id)
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn stroke_ids(&self) -> BTreeSet<String> {
        self.strokes.iter().map(|stroke| stroke.id.clone()).collect()
    }
}
