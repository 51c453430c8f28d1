//! The audience window: slide source, optional annotation layer and the
//! presenter popup it manages.

use crate::bus::SourceId;
use crate::draw::overlay::DrawingOverlay;
use crate::present::keyboard::{map_key_event_to_command, KeyEvent, SourceCommand};
use crate::present::source::{Direction, PresentationSource, SourceEvent};
use crate::window::{LauncherEvent, NoticeAction, OpenAttempt, PresenterLauncher, PresenterLifecycle};
use anyhow::Result;
use std::time::Instant;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceUi {
    pub menu_open: bool,
    pub drawing_mode: bool,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceWindowEvent {
    Navigated(usize),
    PresenterAttached(OpenAttempt),
    PresenterBlocked,
    PresenterDetached,
    /// The dual-window flow was abandoned; show the presenter view here.
    NavigateSameTab(Url),
    ConflictingSource(SourceId),
}

pub struct SourceWindow {
    source: PresentationSource,
    overlay: Option<DrawingOverlay>,
    launcher: PresenterLauncher,
    ui: SourceUi,
}

impl SourceWindow {
    pub fn new(source: PresentationSource, launcher: PresenterLauncher) -> Self {
        Self {
            source,
            overlay: None,
            launcher,
            ui: SourceUi::default(),
        }
    }

    pub fn with_overlay(mut self, mut overlay: DrawingOverlay) -> Self {
        overlay.attach();
        self.overlay = Some(overlay);
        self
    }

    pub fn source(&self) -> &PresentationSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut PresentationSource {
        &mut self.source
    }

    pub fn overlay(&self) -> Option<&DrawingOverlay> {
        self.overlay.as_ref()
    }

    pub fn overlay_mut(&mut self) -> Option<&mut DrawingOverlay> {
        self.overlay.as_mut()
    }

    pub fn launcher(&self) -> &PresenterLauncher {
        &self.launcher
    }

    pub fn ui(&self) -> SourceUi {
        self.ui
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.ui.fullscreen = fullscreen;
    }

    pub fn handle_key(&mut self, event: KeyEvent, now: Instant) -> Result<Option<SourceWindowEvent>> {
        let Some(command) = map_key_event_to_command(event) else {
            return Ok(None);
        };
        tracing::trace!(?command, "source key command");
        match command {
            SourceCommand::Next => Ok(self.navigate(Direction::Next)),
            SourceCommand::Prev => Ok(self.navigate(Direction::Prev)),
            SourceCommand::ToggleMenu => {
                self.ui.menu_open = !self.ui.menu_open;
                Ok(None)
            }
            SourceCommand::TogglePresenter => self.toggle_presenter(now),
            SourceCommand::ToggleDrawing => {
                if self.overlay.is_some() {
                    self.ui.drawing_mode = !self.ui.drawing_mode;
                }
                Ok(None)
            }
            SourceCommand::ToggleEraser => {
                if self.ui.drawing_mode {
                    if let Some(overlay) = self.overlay.as_mut() {
                        overlay.toggle_eraser();
                    }
                }
                Ok(None)
            }
            SourceCommand::ExitFullscreen => {
                self.ui.fullscreen = false;
                Ok(None)
            }
        }
    }

    fn navigate(&mut self, direction: Direction) -> Option<SourceWindowEvent> {
        self.source.navigate(direction).map(SourceWindowEvent::Navigated)
    }

    pub fn toggle_presenter(&mut self, now: Instant) -> Result<Option<SourceWindowEvent>> {
        if self.launcher.lifecycle().is_attached() {
            self.source.request_mirror_close();
            self.launcher.detach()?;
            return Ok(Some(SourceWindowEvent::PresenterDetached));
        }
        let event = self.launcher.open(now)?;
        Ok(Some(map_launcher_event(event)))
    }

    pub fn resolve_notice(&mut self, action: NoticeAction, now: Instant) -> Result<Option<SourceWindowEvent>> {
        let url = self.launcher.resolve_notice(action, now)?;
        if let Some(url) = url {
            return Ok(Some(SourceWindowEvent::NavigateSameTab(url)));
        }
        Ok(match self.launcher.lifecycle() {
            PresenterLifecycle::Attached(attempt) => {
                Some(SourceWindowEvent::PresenterAttached(attempt))
            }
            PresenterLifecycle::Blocked => Some(SourceWindowEvent::PresenterBlocked),
            _ => None,
        })
    }

    /// One turn of the window's event loop.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<SourceWindowEvent>> {
        let mut events = Vec::new();
        for event in self.source.pump() {
            match event {
                SourceEvent::MirrorOpened => {
                    self.launcher.record_heartbeat(now);
                    self.source.broadcast_init();
                }
                SourceEvent::MirrorAlive => self.launcher.record_heartbeat(now),
                SourceEvent::MirrorClosed => {
                    if self.launcher.lifecycle().is_attached() {
                        self.launcher.detach()?;
                        events.push(SourceWindowEvent::PresenterDetached);
                    }
                }
                SourceEvent::ConflictingSource(id) => {
                    events.push(SourceWindowEvent::ConflictingSource(id));
                }
            }
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.pump();
        }
        if let Some(event) = self.launcher.tick(now)? {
            events.push(map_launcher_event(event));
        }
        Ok(events)
    }

    pub fn close(&mut self) -> Result<()> {
        if self.launcher.lifecycle().is_attached() {
            self.source.request_mirror_close();
            self.launcher.detach()?;
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.close();
        }
        self.source.close();
        Ok(())
    }
}

fn map_launcher_event(event: LauncherEvent) -> SourceWindowEvent {
    match event {
        LauncherEvent::Attached(attempt) => SourceWindowEvent::PresenterAttached(attempt),
        LauncherEvent::Blocked => SourceWindowEvent::PresenterBlocked,
        LauncherEvent::Detached(_) => SourceWindowEvent::PresenterDetached,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusHandle, ChannelTransport};
    use crate::deck::{AgendaItem, Deck, SessionMeta};
    use crate::draw::model::CanvasSize;
    use crate::present::keyboard::{KeyCode, KeyModifiers};
    use crate::session::{Identity, Role};
    use crate::window::{MonitorSettings, PopupWindow, WindowFeatures, WindowOpener};

    struct RefusingOpener;

    impl WindowOpener for RefusingOpener {
        fn open(&mut self, _url: &Url, _features: &WindowFeatures) -> Option<Box<dyn PopupWindow>> {
            None
        }
    }

    fn window(transport: &ChannelTransport) -> SourceWindow {
        let handle = BusHandle::open(transport, "session-9", Identity::new(Role::Source)).expect("open");
        let mut source = PresentationSource::new(handle);
        let meta = SessionMeta {
            session_id: "9".into(),
            title: "Regular Session".into(),
            ..SessionMeta::default()
        };
        let agenda = vec![AgendaItem {
            id: "a1".into(),
            title: "Budget".into(),
            number: Some("1".into()),
            documents: Vec::new(),
        }];
        source.load(Deck::for_session(&meta, &agenda), meta);
        let launcher = PresenterLauncher::new(
            Box::new(RefusingOpener),
            Url::parse("https://council.example/presenter?session=9").expect("url"),
            (1280, 800),
            MonitorSettings::default(),
        );
        SourceWindow::new(source, launcher)
    }

    #[test]
    fn arrow_keys_navigate_and_ctrl_is_ignored() {
        let transport = ChannelTransport::new();
        let mut window = window(&transport);
        let now = Instant::now();

        let event = window.handle_key(KeyEvent::plain(KeyCode::ArrowRight), now).expect("key");
        assert_eq!(event, Some(SourceWindowEvent::Navigated(1)));

        let ctrl = KeyEvent {
            key: KeyCode::ArrowRight,
            modifiers: KeyModifiers {
                ctrl: true,
                shift: false,
            },
        };
        assert_eq!(window.handle_key(ctrl, now).expect("key"), None);
        assert_eq!(window.source().current_index(), Some(1));
    }

    #[test]
    fn drawing_toggle_requires_overlay() {
        let transport = ChannelTransport::new();
        let mut window = window(&transport);
        let now = Instant::now();
        window.handle_key(KeyEvent::plain(KeyCode::D), now).expect("key");
        assert!(!window.ui().drawing_mode);

        let handle = BusHandle::open(&transport, "session-9-drawing", Identity::new(Role::Source)).expect("open");
        let mut window = window.with_overlay(DrawingOverlay::new(handle, CanvasSize::new(64, 64)));
        window.handle_key(KeyEvent::plain(KeyCode::D), now).expect("key");
        window.handle_key(KeyEvent::plain(KeyCode::E), now).expect("key");
        assert!(window.ui().drawing_mode);
        assert!(window.overlay().is_some_and(DrawingOverlay::is_eraser));
    }

    #[test]
    fn blocked_presenter_surfaces_notice() {
        let transport = ChannelTransport::new();
        let mut window = window(&transport);
        let event = window
            .handle_key(KeyEvent::plain(KeyCode::P), Instant::now())
            .expect("key");
        assert_eq!(event, Some(SourceWindowEvent::PresenterBlocked));
        assert!(window.launcher().notice().is_some());
    }

    #[test]
    fn escape_leaves_fullscreen() {
        let transport = ChannelTransport::new();
        let mut window = window(&transport);
        window.set_fullscreen(true);
        window
            .handle_key(KeyEvent::plain(KeyCode::Escape), Instant::now())
            .expect("key");
        assert!(!window.ui().fullscreen);
    }
}
