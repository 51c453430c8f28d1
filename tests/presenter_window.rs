mod support;

use council_projector::bus::{BusHandle, ChannelTransport};
use council_projector::present::{MirrorEvent, PresenterMirror, SourceWindowEvent};
use council_projector::session::{Identity, LaunchParams, Role};
use council_projector::window::{
    MonitorSettings, NoticeAction, OpenAttempt, PresenterLauncher, PresenterLifecycle,
    ThreadWindowOpener,
};
use council_projector::present::SourceWindow;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use support::{mirror, presenter_url, source, source_window, FakeOpener, OpenOutcome, PopupFlag};

#[test]
fn blocked_sized_open_falls_back_to_minimal_silently() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Refused, OpenOutcome::Opened(PopupFlag::default())]);
    let mut window = source_window(&transport, opener.clone());

    let event = window.toggle_presenter(Instant::now()).unwrap();

    assert_eq!(event, Some(SourceWindowEvent::PresenterAttached(OpenAttempt::Minimal)));
    assert!(window.launcher().lifecycle().is_attached());
    assert!(window.launcher().notice().is_none());
    let requests = opener.requests.lock().unwrap();
    assert_eq!(requests[0].attempt, OpenAttempt::Sized);
    assert!(!requests[0].to_feature_string().is_empty());
    assert_eq!(requests[1].to_feature_string(), "");
}

#[test]
fn handle_closed_at_open_counts_as_blocked() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![
        OpenOutcome::ClosedImmediately,
        OpenOutcome::Opened(PopupFlag::default()),
    ]);
    let mut window = source_window(&transport, opener);
    assert_eq!(
        window.toggle_presenter(Instant::now()).unwrap(),
        Some(SourceWindowEvent::PresenterAttached(OpenAttempt::Minimal))
    );
}

#[test]
fn both_attempts_blocked_then_try_again_succeeds() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Refused, OpenOutcome::ClosedImmediately]);
    let mut window = source_window(&transport, opener.clone());
    let now = Instant::now();

    assert_eq!(
        window.toggle_presenter(now).unwrap(),
        Some(SourceWindowEvent::PresenterBlocked)
    );
    let notice = window.launcher().notice().expect("notice shown");
    assert!(notice.actions.contains(&NoticeAction::TryAgain));
    assert!(notice.actions.contains(&NoticeAction::OpenInSameTab));

    opener.push(OpenOutcome::Opened(PopupFlag::default()));
    let event = window.resolve_notice(NoticeAction::TryAgain, now).unwrap();
    assert_eq!(event, Some(SourceWindowEvent::PresenterAttached(OpenAttempt::Sized)));
    assert!(window.launcher().notice().is_none());
    assert_eq!(opener.request_count(), 3);
}

#[test]
fn same_tab_fallback_abandons_dual_window_flow() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Refused, OpenOutcome::Refused]);
    let mut window = source_window(&transport, opener);
    let now = Instant::now();
    window.toggle_presenter(now).unwrap();

    let event = window.resolve_notice(NoticeAction::OpenInSameTab, now).unwrap();
    assert_eq!(event, Some(SourceWindowEvent::NavigateSameTab(presenter_url())));
    assert_eq!(window.launcher().lifecycle(), PresenterLifecycle::SameTab);
    assert_eq!(window.source().current_index(), Some(0), "presentation keeps running");
}

#[test]
fn dismissing_notice_returns_to_detached() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Refused, OpenOutcome::Refused]);
    let mut window = source_window(&transport, opener);
    let now = Instant::now();
    window.toggle_presenter(now).unwrap();

    assert_eq!(window.resolve_notice(NoticeAction::Dismiss, now).unwrap(), None);
    assert_eq!(window.launcher().lifecycle(), PresenterLifecycle::Detached);
    assert!(window.launcher().notice().is_none());
}

#[test]
fn externally_closed_popup_is_detected_by_polling() {
    let transport = ChannelTransport::new();
    let flag = PopupFlag::default();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Opened(flag.clone())]);
    let mut window = source_window(&transport, opener);
    let t0 = Instant::now();
    window.toggle_presenter(t0).unwrap();

    assert!(window.tick(t0 + Duration::from_secs(1)).unwrap().is_empty());
    flag.close();
    assert!(window.tick(t0 + Duration::from_millis(1_200)).unwrap().is_empty());
    assert_eq!(
        window.tick(t0 + Duration::from_millis(1_500)).unwrap(),
        vec![SourceWindowEvent::PresenterDetached]
    );
    assert_eq!(window.launcher().lifecycle(), PresenterLifecycle::Detached);
}

#[test]
fn popup_closed_inside_grace_retries_with_minimal_flags() {
    let transport = ChannelTransport::new();
    let sized = PopupFlag::default();
    let opener = FakeOpener::scripted(vec![
        OpenOutcome::Opened(sized.clone()),
        OpenOutcome::Opened(PopupFlag::default()),
    ]);
    let mut window = source_window(&transport, opener);
    let t0 = Instant::now();
    window.toggle_presenter(t0).unwrap();
    sized.close();

    assert_eq!(
        window.tick(t0 + Duration::from_millis(100)).unwrap(),
        vec![SourceWindowEvent::PresenterAttached(OpenAttempt::Minimal)]
    );
}

#[test]
fn silent_mirror_is_detached_after_heartbeat_timeout() {
    let transport = ChannelTransport::new();
    let flag = PopupFlag::default();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Opened(flag.clone())]);
    let mut window = source_window(&transport, opener);
    let t0 = Instant::now();
    window.toggle_presenter(t0).unwrap();

    let mut mirror = mirror(&transport);
    mirror.attach(t0);
    window.tick(t0).unwrap();

    // The popup still looks open, but the mirror never speaks again.
    assert!(window.tick(t0 + Duration::from_secs(5)).unwrap().is_empty());
    assert_eq!(
        window.tick(t0 + Duration::from_secs(7)).unwrap(),
        vec![SourceWindowEvent::PresenterDetached]
    );
    assert!(flag.is_closed(), "the stale popup is closed from the opener side");
}

#[test]
fn heartbeating_mirror_stays_attached() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Opened(PopupFlag::default())]);
    let mut window = source_window(&transport, opener);
    let t0 = Instant::now();
    window.toggle_presenter(t0).unwrap();
    let mut mirror = mirror(&transport);
    mirror.attach(t0);

    for second in 0..=20 {
        let now = t0 + Duration::from_secs(second);
        mirror.tick(now);
        mirror.pump(now);
        assert!(window.tick(now).unwrap().is_empty(), "detached at {second}s");
    }
    assert_eq!(mirror.displayed_index(), Some(0));
}

#[test]
fn mirror_close_notice_reverts_attached_state() {
    let transport = ChannelTransport::new();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Opened(PopupFlag::default())]);
    let mut window = source_window(&transport, opener);
    let t0 = Instant::now();
    window.toggle_presenter(t0).unwrap();
    let mut mirror = mirror(&transport);
    mirror.attach(t0);
    window.tick(t0).unwrap();

    mirror.close();
    assert_eq!(
        window.tick(t0 + Duration::from_millis(300)).unwrap(),
        vec![SourceWindowEvent::PresenterDetached]
    );
}

#[test]
fn toggling_presenter_off_asks_mirror_to_close() {
    let transport = ChannelTransport::new();
    let flag = PopupFlag::default();
    let opener = FakeOpener::scripted(vec![OpenOutcome::Opened(flag.clone())]);
    let mut window = source_window(&transport, opener);
    let t0 = Instant::now();
    window.toggle_presenter(t0).unwrap();
    let mut mirror = mirror(&transport);
    mirror.attach(t0);
    window.tick(t0).unwrap();

    assert_eq!(
        window.toggle_presenter(t0).unwrap(),
        Some(SourceWindowEvent::PresenterDetached)
    );
    assert!(flag.is_closed());
    assert!(mirror.pump(t0).contains(&MirrorEvent::CloseRequested));
}

#[test]
fn thread_hosted_mirror_follows_source_and_stops_on_close() {
    let transport = ChannelTransport::new();
    let shown = Arc::new(Mutex::new(None::<usize>));

    let opener = ThreadWindowOpener::new({
        let transport = transport.clone();
        let shown = Arc::clone(&shown);
        move |ctx| {
            let params = LaunchParams::from_url(&ctx.url)?;
            let handle = BusHandle::open(&transport, &params.slide_topic(), Identity::new(Role::Mirror))?;
            let mut mirror = PresenterMirror::new(handle, params.session_id, Duration::from_millis(50));
            mirror.attach(Instant::now());
            while !ctx.close_requested() {
                let now = Instant::now();
                if mirror.pump(now).contains(&MirrorEvent::CloseRequested) {
                    break;
                }
                mirror.tick(now);
                if let Ok(mut slot) = shown.lock() {
                    *slot = mirror.displayed_index();
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    });
    let url = LaunchParams::new(support::SESSION, Role::Mirror)
        .to_url(&url::Url::parse("https://council.example/").unwrap())
        .unwrap();
    let launcher = PresenterLauncher::new(Box::new(opener), url, (1280, 800), MonitorSettings::default());
    let mut source = source(&transport, 5);
    source.goto(3);
    let mut window = SourceWindow::new(source, launcher);

    assert_eq!(
        window.toggle_presenter(Instant::now()).unwrap(),
        Some(SourceWindowEvent::PresenterAttached(OpenAttempt::Sized))
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    while *shown.lock().unwrap() != Some(3) {
        assert!(Instant::now() < deadline, "mirror never showed the source's slide");
        window.tick(Instant::now()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(
        window.toggle_presenter(Instant::now()).unwrap(),
        Some(SourceWindowEvent::PresenterDetached)
    );
    assert_eq!(window.launcher().lifecycle(), PresenterLifecycle::Detached);
}
