use std::time::{Duration, Instant};

/// Presenter-console stopwatch. Local to one window, never replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElapsedTimer {
    started_at: Option<Instant>,
    accumulated: Duration,
    paused: bool,
}

impl ElapsedTimer {
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && !self.paused
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some() || !self.accumulated.is_zero()
    }

    /// Starts a fresh timer. No-op once started, even while paused.
    pub fn start(&mut self, now: Instant) {
        if !self.has_started() && !self.paused {
            self.started_at = Some(now);
            self.paused = false;
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += now.saturating_duration_since(started_at);
            self.paused = true;
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.paused {
            self.started_at = Some(now);
            self.paused = false;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.accumulated
            + self
                .started_at
                .map(|started_at| now.saturating_duration_since(started_at))
                .unwrap_or_default()
    }

    /// `HH:MM:SS`.
    pub fn display(&self, now: Instant) -> String {
        let secs = self.elapsed(now).as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}
