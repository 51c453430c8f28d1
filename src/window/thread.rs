//! Secondary windows hosted on their own threads.
//!
//! Each opened window runs the supplied entrypoint on a named thread. The
//! closed flag flips when the entrypoint returns, fails or panics, which is
//! the only thing the opener can observe.

use crate::window::{PopupWindow, WindowFeatures, WindowOpener};
use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use url::Url;

const WINDOW_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What a hosted window gets to see of its opener.
#[derive(Debug, Clone)]
pub struct WindowContext {
    pub url: Url,
    pub features: WindowFeatures,
    close_requested: Arc<AtomicBool>,
}

impl WindowContext {
    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }
}

type Entrypoint = dyn Fn(WindowContext) -> Result<()> + Send + Sync;

pub struct ThreadWindowOpener {
    entrypoint: Arc<Entrypoint>,
    spawned: AtomicUsize,
}

impl ThreadWindowOpener {
    pub fn new<F>(entrypoint: F) -> Self
    where
        F: Fn(WindowContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            entrypoint: Arc::new(entrypoint),
            spawned: AtomicUsize::new(0),
        }
    }
}

impl WindowOpener for ThreadWindowOpener {
    fn open(&mut self, url: &Url, features: &WindowFeatures) -> Option<Box<dyn PopupWindow>> {
        let closed = Arc::new(AtomicBool::new(false));
        let close_requested = Arc::new(AtomicBool::new(false));
        let context = WindowContext {
            url: url.clone(),
            features: *features,
            close_requested: Arc::clone(&close_requested),
        };
        let entrypoint = Arc::clone(&self.entrypoint);
        let thread_closed = Arc::clone(&closed);
        let n = self.spawned.fetch_add(1, Ordering::SeqCst);

        let spawned = std::thread::Builder::new()
            .name(format!("presenter-window-{n}"))
            .spawn(move || {
                run_window_entrypoint(move || entrypoint(context));
                thread_closed.store(true, Ordering::SeqCst);
            });
        match spawned {
            Ok(handle) => Some(Box::new(ThreadWindow {
                closed,
                close_requested,
                handle: Some(handle),
            })),
            Err(err) => {
                tracing::error!(?err, "failed to spawn presenter window thread");
                None
            }
        }
    }
}

fn run_window_entrypoint<F>(entrypoint: F)
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(entrypoint)) {
        Ok(Ok(())) => tracing::debug!("presenter window exited"),
        Ok(Err(err)) => tracing::error!(?err, "presenter window failed"),
        Err(payload) => {
            let panic_message = if let Some(message) = payload.downcast_ref::<&str>() {
                (*message).to_string()
            } else if let Some(message) = payload.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic payload".to_string()
            };
            tracing::error!(panic_message, "presenter window panicked");
        }
    }
}

struct ThreadWindow {
    closed: Arc<AtomicBool>,
    close_requested: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PopupWindow for ThreadWindow {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.close_requested.store(true, Ordering::SeqCst);
        join_window_thread_with_timeout(self.handle.take());
    }
}

impl Drop for ThreadWindow {
    fn drop(&mut self) {
        self.close_requested.store(true, Ordering::SeqCst);
    }
}

fn join_window_thread_with_timeout(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(handle.join());
    });

    match done_rx.recv_timeout(WINDOW_JOIN_TIMEOUT) {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::error!("presenter window thread panicked while joining"),
        Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("presenter window thread join timed out")
        }
        Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
            tracing::error!("presenter window thread join channel disconnected")
        }
    }
}
