use crate::bus::{BusHandle, ControlCommand, Envelope, Message, SlideSnapshot, SlideUpdate, SourceId};
use crate::deck::{Deck, SessionMeta};
use crate::present::state::{clamp_index, step_index, PresentationState, SourceLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

impl Direction {
    fn delta(self) -> isize {
        match self {
            Direction::Next => 1,
            Direction::Prev => -1,
        }
    }
}

/// Mirror lifecycle notices observed on the slide topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    MirrorOpened,
    MirrorAlive,
    MirrorClosed,
    ConflictingSource(SourceId),
}

/// The single writer of the active slide index for a topic.
pub struct PresentationSource {
    handle: BusHandle,
    deck: Option<Deck>,
    meta: SessionMeta,
    lifecycle: SourceLifecycle,
}

impl PresentationSource {
    pub fn new(handle: BusHandle) -> Self {
        Self {
            handle,
            deck: None,
            meta: SessionMeta::default(),
            lifecycle: SourceLifecycle::Idle,
        }
    }

    pub fn lifecycle(&self) -> SourceLifecycle {
        self.lifecycle
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lifecycle.index()
    }

    pub fn handle(&self) -> &BusHandle {
        &self.handle
    }

    pub fn state(&self) -> Option<PresentationState> {
        let deck = self.deck.as_ref()?;
        let index = self.lifecycle.index()?;
        Some(PresentationState {
            current_index: index,
            total_slides: deck.len(),
            session_meta: self.meta.clone(),
        })
    }

    /// Loads the deck, activates slide 0 and announces it.
    pub fn load(&mut self, deck: Deck, meta: SessionMeta) {
        tracing::info!(
            topic = self.handle.topic(),
            slides = deck.len(),
            session = %meta.session_id,
            "presentation deck loaded"
        );
        self.deck = Some(deck);
        self.meta = meta;
        self.lifecycle = SourceLifecycle::Active { index: 0 };
        self.broadcast_slide();
    }

    /// Always broadcasts, even when the index did not move.
    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        let SourceLifecycle::Active { index } = self.lifecycle else {
            tracing::debug!("navigate ignored: no deck loaded");
            return None;
        };
        let total = self.deck.as_ref().map_or(0, Deck::len);
        let next = step_index(index, direction.delta(), total);
        self.lifecycle = SourceLifecycle::Active { index: next };
        self.broadcast_slide();
        Some(next)
    }

    pub fn goto(&mut self, index: usize) -> Option<usize> {
        if !self.lifecycle.is_active() {
            tracing::debug!(index, "goto ignored: no deck loaded");
            return None;
        }
        let total = self.deck.as_ref().map_or(0, Deck::len);
        let next = clamp_index(index, total);
        self.lifecycle = SourceLifecycle::Active { index: next };
        self.broadcast_slide();
        Some(next)
    }

    pub fn apply_control(&mut self, command: ControlCommand) -> Option<usize> {
        match command {
            ControlCommand::Next => self.navigate(Direction::Next),
            ControlCommand::Prev => self.navigate(Direction::Prev),
            ControlCommand::Goto { index } => self.goto(index),
        }
    }

    pub fn snapshot(&self) -> Option<SlideSnapshot> {
        let deck = self.deck.as_ref()?;
        let index = self.lifecycle.index()?;
        Some(SlideSnapshot {
            index,
            slide: deck.get(index)?.clone(),
            next_slide: deck.get(index + 1).cloned(),
            total_slides: deck.len(),
            session_meta: self.meta.clone(),
        })
    }

    pub fn broadcast_init(&mut self) {
        if let Some(snapshot) = self.snapshot() {
            tracing::debug!(index = snapshot.index, "broadcasting init snapshot");
            self.handle.post(Message::Init(snapshot));
        }
    }

    fn broadcast_slide(&mut self) {
        if let Some(snapshot) = self.snapshot() {
            tracing::debug!(index = snapshot.index, total = snapshot.total_slides, "broadcasting slide");
            self.handle.post(Message::Slide(SlideUpdate::from(snapshot)));
        }
    }

    /// Asks an attached mirror to close itself.
    pub fn request_mirror_close(&mut self) {
        self.handle.post(Message::PresenterWindowCloseRequest {});
    }

    /// Processes everything pending on the slide topic.
    pub fn pump(&mut self) -> Vec<SourceEvent> {
        let mut inbox = Vec::new();
        self.handle.pump(|envelope| inbox.push(envelope));
        inbox
            .into_iter()
            .filter_map(|envelope| self.handle_envelope(envelope))
            .collect()
    }

    fn handle_envelope(&mut self, envelope: Envelope) -> Option<SourceEvent> {
        if !envelope.accepted_by(self.handle.source_id()) {
            return None;
        }
        match envelope.message {
            Message::Control(command) => {
                tracing::debug!(?command, from = %envelope.source_id, "control received");
                self.apply_control(command);
                None
            }
            Message::RequestInit {} => {
                self.broadcast_init();
                None
            }
            Message::PresenterWindowOpened {} => Some(SourceEvent::MirrorOpened),
            Message::PresenterAlive {} => Some(SourceEvent::MirrorAlive),
            Message::PresenterWindowClosed {} => Some(SourceEvent::MirrorClosed),
            Message::Init(_) | Message::Slide(_) => {
                tracing::warn!(
                    from = %envelope.source_id,
                    topic = self.handle.topic(),
                    "another window is broadcasting slide state; ignoring it"
                );
                Some(SourceEvent::ConflictingSource(envelope.source_id))
            }
            other => {
                tracing::trace!(kind = other.kind(), "source ignores message");
                None
            }
        }
    }

    pub fn close(&mut self) {
        self.handle.close();
        self.deck = None;
        self.lifecycle = SourceLifecycle::Idle;
    }
}
