use anyhow::Result;
use council_projector::bus::{select_transport, BusHandle, Transport};
use council_projector::deck::{AgendaItem, Deck, DocumentRef, SessionMeta};
use council_projector::draw::{CanvasSize, DrawingOverlay};
use council_projector::present::notes::NotesStore;
use council_projector::present::{
    Direction, MirrorEvent, MirrorView, PresentationSource, PresenterMirror, SourceWindow, SourceWindowEvent,
};
use council_projector::session::{Identity, LaunchParams, Role};
use council_projector::settings::Settings;
use council_projector::window::{PresenterLauncher, ThreadWindowOpener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(20);
const DEMO_SESSION: &str = "2024-11-council";

fn main() -> Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("settings.json"));
    let settings = Settings::load(&settings_path)?;
    council_projector::logging::init(settings.debug_logging, settings.log_file.as_deref());

    let transport = select_transport(&settings.bus)?;
    tracing::info!(transport = ?transport.kind(), session = DEMO_SESSION, "starting projector demo");

    let (deck, meta) = demo_deck();
    let params = LaunchParams::new(DEMO_SESSION, Role::Mirror);
    let presenter_url = params.to_url(&settings.base_url()?)?;

    let opener = ThreadWindowOpener::new({
        let transport = Arc::clone(&transport);
        let notes_dir = settings.notes_dir();
        let heartbeat = settings.monitor.heartbeat_interval();
        move |ctx| {
            let params = LaunchParams::from_url(&ctx.url)?;
            run_presenter_window(transport.as_ref(), &params, &notes_dir, heartbeat, || {
                ctx.close_requested()
            })
        }
    });
    let launcher = PresenterLauncher::new(
        Box::new(opener),
        presenter_url,
        (
            settings.presenter_window.width,
            settings.presenter_window.height,
        ),
        settings.monitor.clone(),
    );

    let source_handle = BusHandle::open(
        transport.as_ref(),
        &params.slide_topic(),
        Identity::new(Role::Source),
    )?;
    let mut source = PresentationSource::new(source_handle);
    source.load(deck, meta);

    let canvas = CanvasSize::new(1920, 1080);
    let audience_overlay = DrawingOverlay::new(
        BusHandle::open(
            transport.as_ref(),
            &params.drawing_topic(),
            Identity::new(Role::Source),
        )?,
        canvas,
    );
    let mut window = SourceWindow::new(source, launcher).with_overlay(audience_overlay);
    window.set_fullscreen(true);

    let mut peer_overlay = DrawingOverlay::new(
        BusHandle::open(
            transport.as_ref(),
            &params.drawing_topic(),
            Identity::new(Role::Mirror),
        )?,
        CanvasSize::new(1280, 720),
    );
    peer_overlay.attach();

    if let Some(event) = window.toggle_presenter(Instant::now())? {
        log_window_event(&event);
    }

    for frame in 0..100u32 {
        let now = Instant::now();
        for event in window.tick(now)? {
            log_window_event(&event);
        }
        peer_overlay.pump();

        match frame {
            20 | 40 => {
                window.source_mut().navigate(Direction::Next);
            }
            30 => {
                if let Some(overlay) = window.overlay_mut() {
                    overlay.start_stroke((200.0, 300.0));
                    overlay.extend_stroke((600.0, 320.0));
                    overlay.extend_stroke((900.0, 500.0));
                    overlay.commit_stroke();
                }
            }
            50 => {
                peer_overlay.start_stroke((100.0, 100.0));
                peer_overlay.extend_stroke((400.0, 120.0));
                peer_overlay.commit_stroke();
            }
            _ => {}
        }
        std::thread::sleep(FRAME);
    }

    let audience_strokes = window.overlay().map_or(0, |overlay| overlay.log().len());
    tracing::info!(
        index = ?window.source().current_index(),
        presenter = ?window.launcher().lifecycle(),
        audience_strokes,
        peer_strokes = peer_overlay.log().len(),
        "demo finished"
    );
    peer_overlay.close();
    window.close()
}

fn run_presenter_window(
    transport: &dyn Transport,
    params: &LaunchParams,
    notes_dir: &Path,
    heartbeat: Duration,
    close_requested: impl Fn() -> bool,
) -> Result<()> {
    let handle = BusHandle::open(transport, &params.slide_topic(), Identity::new(Role::Mirror))?;
    let mut mirror = PresenterMirror::new(handle, params.session_id.clone(), heartbeat);
    match NotesStore::open(notes_dir) {
        Ok(notes) => mirror = mirror.with_notes(notes),
        Err(err) => tracing::warn!(?err, "speaker notes unavailable"),
    }
    mirror.attach(Instant::now());

    let mut asked_for_next = false;
    while !close_requested() {
        let now = Instant::now();
        if mirror.pump(now).contains(&MirrorEvent::CloseRequested) {
            break;
        }
        mirror.tick(now);
        if let MirrorView::Showing(state) = mirror.view() {
            if !asked_for_next && state.index == 0 {
                mirror.next();
                asked_for_next = true;
            }
        }
        std::thread::sleep(FRAME);
    }
    tracing::info!(
        index = ?mirror.displayed_index(),
        elapsed = %mirror.timer().display(Instant::now()),
        "presenter window closing"
    );
    mirror.close();
    Ok(())
}

fn log_window_event(event: &SourceWindowEvent) {
    match event {
        SourceWindowEvent::PresenterBlocked => {
            tracing::warn!("presenter window blocked; continuing without it")
        }
        other => tracing::info!(event = ?other, "source window event"),
    }
}

fn demo_deck() -> (Deck, SessionMeta) {
    let meta = SessionMeta {
        session_id: DEMO_SESSION.to_string(),
        title: "Regular Council Meeting".to_string(),
        date: Some("2024-11-12".to_string()),
        location: Some("Council Chamber".to_string()),
    };
    let agenda = [
        ("call-to-order", "Call to Order", Vec::new()),
        (
            "budget",
            "2025 Operating Budget",
            vec![DocumentRef {
                id: "doc-17".to_string(),
                title: "Budget Report".to_string(),
                number: Some("R-17".to_string()),
            }],
        ),
        ("zoning", "Zoning Amendment Hearing", Vec::new()),
        ("adjourn", "Adjournment", Vec::new()),
    ]
    .into_iter()
    .enumerate()
    .map(|(n, (id, title, documents))| AgendaItem {
        id: id.to_string(),
        title: title.to_string(),
        number: Some((n + 1).to_string()),
        documents,
    })
    .collect::<Vec<_>>();
    (Deck::for_session(&meta, &agenda), meta)
}
