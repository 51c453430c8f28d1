//! Liveness of a secondary window as seen from its opener.
//!
//! There is no close event across the window boundary, so the opener polls
//! the handle's closed flag and, as a second signal, watches the mirror's
//! heartbeat.

use crate::window::state::OpenAttempt;
use crate::window::PopupWindow;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    /// A window that closes within this long after opening was blocked.
    #[serde(default = "default_blocked_grace_ms")]
    pub blocked_grace_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_heartbeat_interval_ms() -> u64 {
    2_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    6_000
}

fn default_blocked_grace_ms() -> u64 {
    250
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            blocked_grace_ms: default_blocked_grace_ms(),
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn blocked_grace(&self) -> Duration {
        Duration::from_millis(self.blocked_grace_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessVerdict {
    /// Closed right after opening: treated as a popup blocker.
    ClosedEarly(OpenAttempt),
    Closed,
    HeartbeatLost,
}

pub struct LifecycleMonitor {
    window: Box<dyn PopupWindow>,
    attempt: OpenAttempt,
    opened_at: Instant,
    last_poll: Option<Instant>,
    last_heartbeat: Option<Instant>,
    settings: MonitorSettings,
}

impl LifecycleMonitor {
    pub fn new(
        window: Box<dyn PopupWindow>,
        attempt: OpenAttempt,
        opened_at: Instant,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            window,
            attempt,
            opened_at,
            last_poll: None,
            last_heartbeat: None,
            settings,
        }
    }

    pub fn attempt(&self) -> OpenAttempt {
        self.attempt
    }

    pub fn record_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }

    /// Polls at most once per poll interval. The heartbeat check only arms
    /// after the first heartbeat, so mirrors that never send one still rely
    /// on the closed flag alone.
    pub fn tick(&mut self, now: Instant) -> Option<LivenessVerdict> {
        let within_grace = now.saturating_duration_since(self.opened_at) < self.settings.blocked_grace();
        let poll_due = within_grace
            || self
                .last_poll
                .map_or(true, |last| now.saturating_duration_since(last) >= self.settings.poll_interval());
        if poll_due {
            self.last_poll = Some(now);
            if self.window.is_closed() {
                return Some(if within_grace {
                    LivenessVerdict::ClosedEarly(self.attempt)
                } else {
                    LivenessVerdict::Closed
                });
            }
        }

        let heartbeat_lost = self
            .last_heartbeat
            .is_some_and(|last| now.saturating_duration_since(last) > self.settings.heartbeat_timeout());
        heartbeat_lost.then_some(LivenessVerdict::HeartbeatLost)
    }

    /// Closes the window if it is still open and gives the handle back up.
    pub fn close_window(mut self) {
        if !self.window.is_closed() {
            self.window.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlagWindow {
        closed: Arc<AtomicBool>,
        polls: Arc<AtomicUsize>,
    }

    impl PopupWindow for FlagWindow {
        fn is_closed(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.closed.load(Ordering::SeqCst)
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn monitor(opened_at: Instant) -> (LifecycleMonitor, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicBool::new(false));
        let polls = Arc::new(AtomicUsize::new(0));
        let window = FlagWindow {
            closed: Arc::clone(&closed),
            polls: Arc::clone(&polls),
        };
        (
            LifecycleMonitor::new(
                Box::new(window),
                OpenAttempt::Sized,
                opened_at,
                MonitorSettings::default(),
            ),
            closed,
            polls,
        )
    }

    #[test]
    fn close_inside_grace_is_reported_as_blocked() {
        let t0 = Instant::now();
        let (mut monitor, closed, _) = monitor(t0);
        closed.store(true, Ordering::SeqCst);
        assert_eq!(
            monitor.tick(t0 + Duration::from_millis(100)),
            Some(LivenessVerdict::ClosedEarly(OpenAttempt::Sized))
        );
    }

    #[test]
    fn external_close_is_detected_on_next_poll() {
        let t0 = Instant::now();
        let (mut monitor, closed, polls) = monitor(t0);
        assert_eq!(monitor.tick(t0 + Duration::from_secs(1)), None);

        closed.store(true, Ordering::SeqCst);
        assert_eq!(monitor.tick(t0 + Duration::from_millis(1_200)), None);
        assert_eq!(polls.load(Ordering::SeqCst), 1, "poll interval not yet elapsed");

        assert_eq!(
            monitor.tick(t0 + Duration::from_millis(1_500)),
            Some(LivenessVerdict::Closed)
        );
    }

    #[test]
    fn silent_mirror_after_heartbeat_is_declared_lost() {
        let t0 = Instant::now();
        let (mut monitor, _, _) = monitor(t0);
        assert_eq!(monitor.tick(t0 + Duration::from_secs(30)), None);

        monitor.record_heartbeat(t0 + Duration::from_secs(30));
        assert_eq!(monitor.tick(t0 + Duration::from_secs(35)), None);
        assert_eq!(
            monitor.tick(t0 + Duration::from_secs(37)),
            Some(LivenessVerdict::HeartbeatLost)
        );
    }

    #[test]
    fn close_window_closes_open_handle() {
        let t0 = Instant::now();
        let (monitor, closed, _) = monitor(t0);
        monitor.close_window();
        assert!(closed.load(Ordering::SeqCst));
    }
}
