use crate::draw::model::{CanvasSize, Color, DrawingLog, Stroke};

const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

/// A stroke mapped onto the current canvas size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedStroke {
    pub id: String,
    pub points: Vec<(i32, i32)>,
    pub is_eraser: bool,
}

/// RGBA raster that is only ever produced by replaying the whole log.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingCanvas {
    size: CanvasSize,
    pixels: Vec<u8>,
    projected: Vec<ProjectedStroke>,
    replay_count: usize,
}

impl DrawingCanvas {
    pub fn new(size: CanvasSize) -> Self {
        Self {
            size,
            pixels: vec![0; pixel_len(size)],
            projected: Vec::new(),
            replay_count: 0,
        }
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn projected(&self) -> &[ProjectedStroke] {
        &self.projected
    }

    pub fn replay_count(&self) -> usize {
        self.replay_count
    }

    /// Reallocates the bitmap. The caller replays the log afterwards.
    pub fn resize(&mut self, size: CanvasSize) {
        self.size = size;
        self.pixels = vec![0; pixel_len(size)];
        self.projected.clear();
    }

    pub fn replay(&mut self, log: &DrawingLog) {
        self.pixels.fill(0);
        self.projected.clear();
        for stroke in log.strokes() {
            let projected = project_stroke(stroke, self.size);
            let color = if stroke.is_eraser { TRANSPARENT } else { stroke.color };
            draw_polyline(
                &projected.points,
                color,
                stroke.width.max(1),
                &mut self.pixels,
                self.size,
            );
            self.projected.push(projected);
        }
        self.replay_count += 1;
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let idx = pixel_index(self.size, x, y);
        let px = self.pixels.get(idx..idx + 4)?;
        Some(Color::rgba(px[0], px[1], px[2], px[3]))
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|b| *b == 0)
    }
}

pub fn project_stroke(stroke: &Stroke, size: CanvasSize) -> ProjectedStroke {
    ProjectedStroke {
        id: stroke.id.clone(),
        points: stroke.points.iter().map(|p| p.to_screen(size)).collect(),
        is_eraser: stroke.is_eraser,
    }
}

fn pixel_len(size: CanvasSize) -> usize {
    size.width as usize * size.height as usize * 4
}

fn pixel_index(size: CanvasSize, x: u32, y: u32) -> usize {
    (y as usize * size.width as usize + x as usize) * 4
}

fn draw_polyline(points: &[(i32, i32)], color: Color, stroke_width: u32, pixels: &mut [u8], size: CanvasSize) {
    for segment in points.windows(2) {
        draw_segment(segment[0], segment[1], color, stroke_width, pixels, size);
    }
}

fn draw_segment(
    start: (i32, i32),
    end: (i32, i32),
    color: Color,
    stroke_width: u32,
    pixels: &mut [u8],
    size: CanvasSize,
) {
    let (sx, sy) = (i64::from(start.0), i64::from(start.1));
    let dx = i64::from(end.0) - sx;
    let dy = i64::from(end.1) - sy;
    let steps = dx.abs().max(dy.abs()).max(1);
    for step in 0..=steps {
        // Every step lies between the two endpoints, so it fits back in i32.
        let x = (sx + (dx * step) / steps) as i32;
        let y = (sy + (dy * step) / steps) as i32;
        draw_brush((x, y), color, stroke_width, pixels, size);
    }
}

fn draw_brush(center: (i32, i32), color: Color, stroke_width: u32, pixels: &mut [u8], size: CanvasSize) {
    let radius = (stroke_width.saturating_sub(1) / 2) as i32;
    for y in (center.1 - radius)..=(center.1 + radius) {
        for x in (center.0 - radius)..=(center.0 + radius) {
            let dx = x - center.0;
            let dy = y - center.1;
            if dx * dx + dy * dy <= radius * radius {
                set_pixel_rgba(pixels, size, x, y, color);
            }
        }
    }
}

fn set_pixel_rgba(pixels: &mut [u8], size: CanvasSize, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 || x >= size.width as i32 || y >= size.height as i32 {
        return;
    }
    let idx = pixel_index(size, x as u32, y as u32);
    if idx + 3 >= pixels.len() {
        return;
    }
    pixels[idx] = color.r;
    pixels[idx + 1] = color.g;
    pixels[idx + 2] = color.b;
    pixels[idx + 3] = color.a;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::model::NormalizedPoint;

    fn horizontal(id: &str, y: f64, is_eraser: bool) -> Stroke {
        Stroke {
            id: id.to_string(),
            points: vec![NormalizedPoint { x: 0.1, y }, NormalizedPoint { x: 0.9, y }],
            is_eraser,
            color: Color::rgba(0, 0, 255, 255),
            width: 1,
        }
    }

    #[test]
    fn replay_paints_every_stroke() {
        let mut log = DrawingLog::default();
        log.append(horizontal("a-1", 0.5, false));
        let mut canvas = DrawingCanvas::new(CanvasSize::new(100, 100));
        canvas.replay(&log);

        assert_eq!(canvas.pixel(50, 50), Some(Color::rgba(0, 0, 255, 255)));
        assert_eq!(canvas.pixel(50, 10), Some(TRANSPARENT));
        assert_eq!(canvas.projected().len(), 1);
    }

    #[test]
    fn eraser_clears_pixels_underneath() {
        let mut log = DrawingLog::default();
        log.append(horizontal("a-1", 0.5, false));
        log.append(horizontal("a-2", 0.5, true));
        let mut canvas = DrawingCanvas::new(CanvasSize::new(100, 100));
        canvas.replay(&log);

        assert!(canvas.is_blank());
    }

    #[test]
    fn replay_of_empty_log_is_blank() {
        let mut canvas = DrawingCanvas::new(CanvasSize::new(10, 10));
        canvas.replay(&DrawingLog::default());
        assert!(canvas.is_blank());
        assert_eq!(canvas.replay_count(), 1);
    }

    #[test]
    fn off_canvas_points_project_onto_the_edge() {
        let stroke = Stroke {
            points: vec![
                NormalizedPoint { x: -1e12, y: 0.5 },
                NormalizedPoint { x: 1e12, y: 0.5 },
                NormalizedPoint { x: f64::NAN, y: 0.5 },
            ],
            ..horizontal("z-1", 0.5, false)
        };
        let size = CanvasSize::new(100, 100);
        assert_eq!(project_stroke(&stroke, size).points, vec![(0, 50), (100, 50), (0, 50)]);
    }

    #[test]
    fn pixel_index_does_not_wrap_on_large_canvases() {
        let size = CanvasSize::new(70_000, 70_000);
        assert_eq!(pixel_index(size, 69_999, 69_999), (69_999usize * 70_000 + 69_999) * 4);
    }

    #[test]
    fn resize_rescales_projection() {
        let mut log = DrawingLog::default();
        log.append(horizontal("a-1", 0.5, false));
        let mut canvas = DrawingCanvas::new(CanvasSize::new(100, 100));
        canvas.replay(&log);
        assert_eq!(canvas.projected()[0].points, vec![(10, 50), (90, 50)]);

        canvas.resize(CanvasSize::new(200, 50));
        canvas.replay(&log);
        assert_eq!(canvas.projected()[0].points, vec![(20, 25), (180, 25)]);
        assert_eq!(canvas.pixels().len(), 200 * 50 * 4);
        assert_eq!(canvas.pixel(100, 25), Some(Color::rgba(0, 0, 255, 255)));
    }
}
