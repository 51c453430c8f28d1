use crate::bus::{BusHandle, ControlCommand, Envelope, Message, SlideSnapshot, SlideUpdate};
use crate::deck::{SessionMeta, Slide};
use crate::present::notes::NotesStore;
use crate::present::timer::ElapsedTimer;
use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

/// Last slide state received from the source. Fields missing from a
/// `slide` update keep their previous values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredSlide {
    pub index: usize,
    pub slide: Slide,
    pub next_slide: Option<Slide>,
    pub total_slides: Option<usize>,
    pub session_meta: Option<SessionMeta>,
}

impl From<SlideSnapshot> for MirroredSlide {
    fn from(snapshot: SlideSnapshot) -> Self {
        Self {
            index: snapshot.index,
            slide: snapshot.slide,
            next_slide: snapshot.next_slide,
            total_slides: Some(snapshot.total_slides),
            session_meta: Some(snapshot.session_meta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorView {
    /// Nothing received yet. No timeout: waits until a source answers.
    Waiting,
    Showing(MirroredSlide),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEvent {
    CloseRequested,
}

/// Presenter console. A read-through cache of source state plus
/// window-local notes, font size and timer.
pub struct PresenterMirror {
    handle: BusHandle,
    session_id: String,
    view: MirrorView,
    timer: ElapsedTimer,
    notes: Option<NotesStore>,
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
}

impl PresenterMirror {
    pub fn new(handle: BusHandle, session_id: impl Into<String>, heartbeat_interval: Duration) -> Self {
        Self {
            handle,
            session_id: session_id.into(),
            view: MirrorView::Waiting,
            timer: ElapsedTimer::default(),
            notes: None,
            heartbeat_interval,
            last_heartbeat: None,
        }
    }

    pub fn with_notes(mut self, notes: NotesStore) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Announces the window and asks the source for its current state.
    pub fn attach(&mut self, now: Instant) {
        tracing::info!(topic = self.handle.topic(), "presenter mirror attaching");
        self.handle.post(Message::PresenterWindowOpened {});
        self.handle.post(Message::RequestInit {});
        self.last_heartbeat = Some(now);
    }

    pub fn view(&self) -> &MirrorView {
        &self.view
    }

    pub fn displayed_index(&self) -> Option<usize> {
        match &self.view {
            MirrorView::Showing(state) => Some(state.index),
            MirrorView::Waiting => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn timer(&self) -> &ElapsedTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut ElapsedTimer {
        &mut self.timer
    }

    // Navigation only asks; the view changes when the resulting `slide` arrives.
    pub fn next(&mut self) {
        self.handle.post(Message::Control(ControlCommand::Next));
    }

    pub fn prev(&mut self) {
        self.handle.post(Message::Control(ControlCommand::Prev));
    }

    pub fn goto(&mut self, index: usize) {
        self.handle
            .post(Message::Control(ControlCommand::Goto { index }));
    }

    /// Applies pending slide state. A close request from the opener closes
    /// the mirror before it is reported.
    pub fn pump(&mut self, now: Instant) -> Vec<MirrorEvent> {
        let mut inbox = Vec::new();
        self.handle.pump(|envelope| inbox.push(envelope));
        let events: Vec<MirrorEvent> = inbox
            .into_iter()
            .filter_map(|envelope| self.handle_envelope(envelope, now))
            .collect();
        if events.contains(&MirrorEvent::CloseRequested) {
            self.close();
        }
        events
    }

    fn handle_envelope(&mut self, envelope: Envelope, now: Instant) -> Option<MirrorEvent> {
        if !envelope.accepted_by(self.handle.source_id()) {
            return None;
        }
        match envelope.message {
            Message::Init(snapshot) => {
                tracing::debug!(index = snapshot.index, "mirror received init");
                self.view = MirrorView::Showing(snapshot.into());
                self.timer.start(now);
                None
            }
            Message::Slide(update) => {
                self.apply_update(update);
                self.timer.start(now);
                None
            }
            Message::PresenterWindowCloseRequest {} => Some(MirrorEvent::CloseRequested),
            _ => None,
        }
    }

    fn apply_update(&mut self, update: SlideUpdate) {
        let previous = match &self.view {
            MirrorView::Showing(state) => Some(state),
            MirrorView::Waiting => None,
        };
        let merged = MirroredSlide {
            index: update.index,
            slide: update.slide,
            next_slide: update.next_slide,
            total_slides: update
                .total_slides
                .or_else(|| previous.and_then(|p| p.total_slides)),
            session_meta: update
                .session_meta
                .or_else(|| previous.and_then(|p| p.session_meta.clone())),
        };
        tracing::debug!(index = merged.index, "mirror received slide");
        self.view = MirrorView::Showing(merged);
    }

    /// Posts the liveness heartbeat when it is due.
    pub fn tick(&mut self, now: Instant) {
        if self.handle.is_closed() {
            return;
        }
        let due = self
            .last_heartbeat
            .map_or(true, |last| now.saturating_duration_since(last) >= self.heartbeat_interval);
        if due {
            self.handle.post(Message::PresenterAlive {});
            self.last_heartbeat = Some(now);
        }
    }

    fn current_slide_id(&self) -> Option<&str> {
        match &self.view {
            MirrorView::Showing(state) => Some(state.slide.id.as_str()),
            MirrorView::Waiting => None,
        }
    }

    pub fn current_note(&self) -> Option<&str> {
        let slide_id = self.current_slide_id()?;
        self.notes.as_ref()?.note(&self.session_id, slide_id)
    }

    pub fn set_current_note(&mut self, text: &str) -> Result<()> {
        let slide_id = self
            .current_slide_id()
            .ok_or_else(|| anyhow!("no slide shown yet"))?
            .to_string();
        let notes = self
            .notes
            .as_mut()
            .ok_or_else(|| anyhow!("notes storage is not configured"))?;
        notes.set_note(&self.session_id, &slide_id, text)
    }

    pub fn notes_mut(&mut self) -> Option<&mut NotesStore> {
        self.notes.as_mut()
    }

    /// Best-effort unload notice. The opener must not rely on it arriving.
    pub fn close(&mut self) {
        if self.handle.is_closed() {
            return;
        }
        self.handle.post(Message::PresenterWindowClosed {});
        self.handle.close();
        tracing::info!("presenter mirror closed");
    }
}

impl Drop for PresenterMirror {
    fn drop(&mut self) {
        self.close();
    }
}
