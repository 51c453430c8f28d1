use crate::bus::SourceId;
use crate::draw::model::{CanvasSize, Color, NormalizedPoint, Stroke, MAX_STROKE_WIDTH, MIN_STROKE_POINTS};

const MIN_POINT_DIST_SQ: f64 = 4.0;

/// Builds one stroke at a time from pointer input in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeCapture {
    owner: SourceId,
    next_seq: u64,
    active: Option<Vec<(f64, f64)>>,
    eraser: bool,
    color: Color,
    width: u32,
}

impl StrokeCapture {
    pub fn new(owner: SourceId) -> Self {
        Self {
            owner,
            next_seq: 1,
            active: None,
            eraser: false,
            color: Color::default(),
            width: 4,
        }
    }

    pub fn is_eraser(&self) -> bool {
        self.eraser
    }

    pub fn set_eraser(&mut self, eraser: bool) {
        self.eraser = eraser;
    }

    pub fn toggle_eraser(&mut self) -> bool {
        self.eraser = !self.eraser;
        self.eraser
    }

    pub fn set_style(&mut self, color: Color, width: u32) {
        self.color = color;
        self.width = width.clamp(1, MAX_STROKE_WIDTH);
    }

    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    pub fn start_stroke(&mut self, point: (f64, f64)) {
        self.active = Some(vec![point]);
    }

    /// The newest sample always becomes the tail. A previous tail that sits
    /// too close to its predecessor is replaced instead of kept.
    pub fn extend_stroke(&mut self, point: (f64, f64)) {
        let Some(points) = self.active.as_mut() else {
            return;
        };
        let tail_too_close = matches!(
            points.as_slice(),
            [.., before, tail] if !should_append_point(Some(*before), *tail)
        );
        if tail_too_close {
            points.pop();
        }
        points.push(point);
    }

    pub fn cancel_stroke(&mut self) {
        self.active = None;
    }

    /// Normalizes against `size` and returns the stroke, or `None` for a
    /// click without drag.
    pub fn commit_stroke(&mut self, size: CanvasSize) -> Option<Stroke> {
        let points = self.active.take()?;
        if points.len() < MIN_STROKE_POINTS {
            tracing::debug!(points = points.len(), "discarding stroke below minimum length");
            return None;
        }
        let id = format!("{}-{}", self.owner, self.next_seq);
        self.next_seq += 1;
        Some(Stroke {
            id,
            points: points
                .into_iter()
                .map(|point| NormalizedPoint::from_screen(point, size))
                .collect(),
            is_eraser: self.eraser,
            color: self.color,
            width: self.width,
        })
    }
}

fn should_append_point(last: Option<(f64, f64)>, point: (f64, f64)) -> bool {
    let Some((last_x, last_y)) = last else {
        return true;
    };
    let dx = point.0 - last_x;
    let dy = point.1 - last_y;
    dx * dx + dy * dy >= MIN_POINT_DIST_SQ
}
