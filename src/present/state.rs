use crate::deck::SessionMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLifecycle {
    Idle,
    Active { index: usize },
}

impl SourceLifecycle {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn index(self) -> Option<usize> {
        match self {
            Self::Active { index } => Some(index),
            Self::Idle => None,
        }
    }
}

/// Owned by the source window only; gone when that window closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationState {
    pub current_index: usize,
    pub total_slides: usize,
    pub session_meta: SessionMeta,
}

/// Clamps into `[0, total - 1]`. A zero-slide total clamps to 0.
pub fn clamp_index(index: usize, total: usize) -> usize {
    index.min(total.saturating_sub(1))
}

/// `index + delta`, saturating at both ends of the deck.
pub fn step_index(index: usize, delta: isize, total: usize) -> usize {
    clamp_index(index.saturating_add_signed(delta), total)
}
