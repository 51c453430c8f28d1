use crate::window::monitor::{LifecycleMonitor, LivenessVerdict, MonitorSettings};
use crate::window::state::{can_transition, OpenAttempt, PresenterLifecycle};
use crate::window::{WindowFeatures, WindowOpener};
use anyhow::{anyhow, Result};
use std::time::Instant;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    TryAgain,
    OpenInSameTab,
    Dismiss,
}

/// Shown when both open attempts were refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedNotice {
    pub message: String,
    pub actions: [NoticeAction; 3],
}

impl Default for BlockedNotice {
    fn default() -> Self {
        Self {
            message: "The presenter window was blocked. Allow popups for this site or continue in this tab."
                .to_string(),
            actions: [
                NoticeAction::TryAgain,
                NoticeAction::OpenInSameTab,
                NoticeAction::Dismiss,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherEvent {
    Attached(OpenAttempt),
    Blocked,
    /// The window went away; presenter-attached UI should revert.
    Detached(LivenessVerdict),
}

pub struct PresenterLauncher {
    opener: Box<dyn WindowOpener>,
    url: Url,
    width: u32,
    height: u32,
    settings: MonitorSettings,
    lifecycle: PresenterLifecycle,
    monitor: Option<LifecycleMonitor>,
    notice: Option<BlockedNotice>,
}

impl PresenterLauncher {
    pub fn new(
        opener: Box<dyn WindowOpener>,
        url: Url,
        (width, height): (u32, u32),
        settings: MonitorSettings,
    ) -> Self {
        Self {
            opener,
            url,
            width,
            height,
            settings,
            lifecycle: PresenterLifecycle::Detached,
            monitor: None,
            notice: None,
        }
    }

    pub fn lifecycle(&self) -> PresenterLifecycle {
        self.lifecycle
    }

    pub fn notice(&self) -> Option<&BlockedNotice> {
        self.notice.as_ref()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Two-stage open: sized first, then with no feature flags.
    pub fn open(&mut self, now: Instant) -> Result<LauncherEvent> {
        if let PresenterLifecycle::Attached(attempt) = self.lifecycle {
            return Ok(LauncherEvent::Attached(attempt));
        }
        self.open_from(OpenAttempt::Sized, now)
    }

    fn open_from(&mut self, first: OpenAttempt, now: Instant) -> Result<LauncherEvent> {
        let attempts: &[OpenAttempt] = match first {
            OpenAttempt::Sized => &[OpenAttempt::Sized, OpenAttempt::Minimal],
            OpenAttempt::Minimal => &[OpenAttempt::Minimal],
        };
        for &attempt in attempts {
            let features = WindowFeatures::for_attempt(attempt, self.width, self.height);
            match self.opener.open(&self.url, &features) {
                Some(window) if !window.is_closed() => {
                    self.transition(PresenterLifecycle::Attached(attempt))?;
                    self.monitor = Some(LifecycleMonitor::new(
                        window,
                        attempt,
                        now,
                        self.settings.clone(),
                    ));
                    self.notice = None;
                    tracing::info!(?attempt, url = %self.url, "presenter window opened");
                    return Ok(LauncherEvent::Attached(attempt));
                }
                Some(_) => tracing::warn!(?attempt, "presenter window closed immediately after open"),
                None => tracing::warn!(?attempt, "presenter window open refused"),
            }
        }
        self.block()
    }

    fn block(&mut self) -> Result<LauncherEvent> {
        self.transition(PresenterLifecycle::Blocked)?;
        self.notice = Some(BlockedNotice::default());
        Ok(LauncherEvent::Blocked)
    }

    pub fn record_heartbeat(&mut self, now: Instant) {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.record_heartbeat(now);
        }
    }

    /// Polls the attached window. A window that dies inside the blocked
    /// grace period counts as blocked and moves on to the next attempt.
    pub fn tick(&mut self, now: Instant) -> Result<Option<LauncherEvent>> {
        let Some(verdict) = self.monitor.as_mut().and_then(|monitor| monitor.tick(now)) else {
            return Ok(None);
        };
        if let Some(monitor) = self.monitor.take() {
            monitor.close_window();
        }
        self.transition(PresenterLifecycle::Detached)?;

        match verdict {
            LivenessVerdict::ClosedEarly(OpenAttempt::Sized) => {
                tracing::warn!("sized presenter window closed by blocker, retrying with minimal flags");
                self.open_from(OpenAttempt::Minimal, now).map(Some)
            }
            LivenessVerdict::ClosedEarly(OpenAttempt::Minimal) => {
                tracing::warn!("minimal presenter window closed by blocker");
                self.block().map(Some)
            }
            verdict => {
                tracing::info!(?verdict, "presenter window detached");
                Ok(Some(LauncherEvent::Detached(verdict)))
            }
        }
    }

    /// Returns the URL to navigate the current tab to when the user chose
    /// to continue without a second window.
    pub fn resolve_notice(&mut self, action: NoticeAction, now: Instant) -> Result<Option<Url>> {
        if self.notice.is_none() {
            return Err(anyhow!("no blocked notice to resolve"));
        }
        match action {
            NoticeAction::TryAgain => {
                self.open_from(OpenAttempt::Sized, now)?;
                Ok(None)
            }
            NoticeAction::OpenInSameTab => {
                self.transition(PresenterLifecycle::SameTab)?;
                self.notice = None;
                tracing::info!(url = %self.url, "continuing presenter view in same tab");
                Ok(Some(self.url.clone()))
            }
            NoticeAction::Dismiss => {
                self.transition(PresenterLifecycle::Detached)?;
                self.notice = None;
                Ok(None)
            }
        }
    }

    /// Closes the window from the opener side.
    pub fn detach(&mut self) -> Result<()> {
        if let Some(monitor) = self.monitor.take() {
            monitor.close_window();
        }
        if self.lifecycle.is_attached() {
            self.transition(PresenterLifecycle::Detached)?;
        }
        Ok(())
    }

    fn transition(&mut self, next: PresenterLifecycle) -> Result<()> {
        if !can_transition(self.lifecycle, next) {
            return Err(anyhow!(
                "invalid presenter lifecycle transition: {:?} -> {:?}",
                self.lifecycle,
                next
            ));
        }
        self.lifecycle = next;
        Ok(())
    }
}
