//! Freehand annotation layer replicated between windows.

pub mod input;
pub mod model;
pub mod overlay;
pub mod render;

pub use model::{CanvasSize, Color, DrawingLog, NormalizedPoint, Stroke};
pub use overlay::DrawingOverlay;
pub use render::DrawingCanvas;
