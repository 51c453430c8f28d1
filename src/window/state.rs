#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAttempt {
    /// Explicit size and chrome flags.
    Sized,
    /// No feature flags at all, for blockers that reject the sized request.
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterLifecycle {
    Detached,
    Attached(OpenAttempt),
    /// Both attempts failed; a dismissable notice is showing.
    Blocked,
    /// Degraded path: the presentation continues in the opener's own tab.
    SameTab,
}

impl PresenterLifecycle {
    pub fn is_attached(self) -> bool {
        matches!(self, Self::Attached(_))
    }
}

pub fn can_transition(from: PresenterLifecycle, to: PresenterLifecycle) -> bool {
    use PresenterLifecycle::*;
    matches!(
        (from, to),
        (Detached, Attached(_))
            | (Detached, Blocked)
            | (Attached(_), Detached)
            | (Blocked, Attached(_))
            | (Blocked, Detached)
            | (Blocked, SameTab)
    ) || from == to
}
