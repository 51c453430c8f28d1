//! Slide state ownership (source) and its read-through presenter view (mirror).

pub mod keyboard;
pub mod mirror;
pub mod notes;
pub mod source;
pub mod state;
pub mod timer;
pub mod window;

pub use mirror::{MirrorEvent, MirrorView, PresenterMirror};
pub use source::{Direction, PresentationSource, SourceEvent};
pub use window::{SourceWindow, SourceWindowEvent};
