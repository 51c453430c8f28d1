//! Opening and watching the secondary presenter window.

pub mod launcher;
pub mod monitor;
pub mod state;
pub mod thread;

pub use launcher::{BlockedNotice, LauncherEvent, NoticeAction, PresenterLauncher};
pub use monitor::{LifecycleMonitor, LivenessVerdict, MonitorSettings};
pub use state::{OpenAttempt, PresenterLifecycle};
pub use thread::ThreadWindowOpener;

use url::Url;

/// A handle to a window this process asked to open.
pub trait PopupWindow: Send {
    fn is_closed(&self) -> bool;
    fn close(&mut self);
}

/// Opens secondary windows. Returns `None` when the request was refused
/// outright, the way a popup blocker returns no handle.
pub trait WindowOpener: Send {
    fn open(&mut self, url: &Url, features: &WindowFeatures) -> Option<Box<dyn PopupWindow>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFeatures {
    pub attempt: OpenAttempt,
    pub width: u32,
    pub height: u32,
}

impl WindowFeatures {
    pub fn for_attempt(attempt: OpenAttempt, width: u32, height: u32) -> Self {
        Self {
            attempt,
            width,
            height,
        }
    }

    /// Feature string in `window.open` form. Minimal attempts carry none.
    pub fn to_feature_string(&self) -> String {
        match self.attempt {
            OpenAttempt::Sized => format!(
                "width={},height={},menubar=no,toolbar=no,location=no,status=no,resizable=yes",
                self.width, self.height
            ),
            OpenAttempt::Minimal => String::new(),
        }
    }
}
