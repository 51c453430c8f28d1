#![allow(dead_code)]

use council_projector::bus::{BusHandle, Transport};
use council_projector::deck::{Deck, SessionMeta, Slide, SlideKind};
use council_projector::draw::{CanvasSize, DrawingOverlay, Stroke};
use council_projector::present::{PresentationSource, PresenterMirror, SourceWindow};
use council_projector::session::{drawing_topic, slide_topic, Identity, Role};
use council_projector::window::{
    MonitorSettings, PopupWindow, PresenterLauncher, WindowFeatures, WindowOpener,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const SESSION: &str = "42";

pub fn deck(len: usize) -> Deck {
    let slides = (0..len)
        .map(|i| Slide {
            id: format!("slide-{i}"),
            kind: if i == 0 { SlideKind::Cover } else { SlideKind::Section },
            title: format!("Item {i}"),
            subtitle: None,
            number: Some(i.to_string()),
            documents: Vec::new(),
        })
        .collect();
    Deck::new(slides).unwrap()
}

pub fn meta() -> SessionMeta {
    SessionMeta {
        session_id: SESSION.to_string(),
        title: "Budget Hearing".to_string(),
        ..SessionMeta::default()
    }
}

pub fn source(transport: &dyn Transport, slides: usize) -> PresentationSource {
    let handle = BusHandle::open(transport, &slide_topic(SESSION), Identity::new(Role::Source)).unwrap();
    let mut source = PresentationSource::new(handle);
    source.load(deck(slides), meta());
    source
}

pub fn mirror(transport: &dyn Transport) -> PresenterMirror {
    let handle = BusHandle::open(transport, &slide_topic(SESSION), Identity::new(Role::Mirror)).unwrap();
    PresenterMirror::new(handle, SESSION, Duration::from_secs(2))
}

pub fn overlay(transport: &dyn Transport, size: CanvasSize) -> DrawingOverlay {
    let handle =
        BusHandle::open(transport, &drawing_topic(SESSION), Identity::new(Role::Mirror)).unwrap();
    DrawingOverlay::new(handle, size)
}

pub fn draw_line(overlay: &mut DrawingOverlay, from: (f64, f64), to: (f64, f64)) -> Option<Stroke> {
    overlay.start_stroke(from);
    overlay.extend_stroke(((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0));
    overlay.extend_stroke(to);
    overlay.commit_stroke()
}

pub fn presenter_url() -> Url {
    Url::parse("https://council.example/presenter?session=42&role=mirror").unwrap()
}

/// Closed flag of a fake popup, shared with the test.
#[derive(Clone, Default)]
pub struct PopupFlag(Arc<AtomicBool>);

impl PopupFlag {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct FakePopup(PopupFlag);

impl PopupWindow for FakePopup {
    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    fn close(&mut self) {
        self.0.close();
    }
}

pub enum OpenOutcome {
    /// No handle at all.
    Refused,
    /// A handle whose closed flag is already set.
    ClosedImmediately,
    Opened(PopupFlag),
}

/// Window opener that replays scripted outcomes and records what was asked.
#[derive(Clone, Default)]
pub struct FakeOpener {
    script: Arc<Mutex<VecDeque<OpenOutcome>>>,
    pub requests: Arc<Mutex<Vec<WindowFeatures>>>,
}

impl FakeOpener {
    pub fn scripted(outcomes: Vec<OpenOutcome>) -> Self {
        let opener = Self::default();
        *opener.script.lock().unwrap() = outcomes.into();
        opener
    }

    pub fn push(&self, outcome: OpenOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl WindowOpener for FakeOpener {
    fn open(&mut self, _url: &Url, features: &WindowFeatures) -> Option<Box<dyn PopupWindow>> {
        self.requests.lock().unwrap().push(*features);
        match self.script.lock().unwrap().pop_front()? {
            OpenOutcome::Refused => None,
            OpenOutcome::ClosedImmediately => {
                let flag = PopupFlag::default();
                flag.close();
                Some(Box::new(FakePopup(flag)))
            }
            OpenOutcome::Opened(flag) => Some(Box::new(FakePopup(flag))),
        }
    }
}

pub fn source_window(transport: &dyn Transport, opener: FakeOpener) -> SourceWindow {
    let launcher = PresenterLauncher::new(
        Box::new(opener),
        presenter_url(),
        (1280, 800),
        MonitorSettings::default(),
    );
    SourceWindow::new(source(transport, 5), launcher)
}
