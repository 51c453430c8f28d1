mod support;

use council_projector::bus::{BusHandle, ChannelTransport, Envelope, Message, SlideUpdate};
use council_projector::present::{Direction, MirrorView, SourceEvent};
use council_projector::session::{slide_topic, Identity, Role};
use std::time::Instant;
use support::{mirror, source, SESSION};

fn observer(transport: &ChannelTransport) -> BusHandle {
    BusHandle::open(transport, &slide_topic(SESSION), Identity::new(Role::Mirror)).unwrap()
}

fn drain(handle: &mut BusHandle) -> Vec<Envelope> {
    let mut out = Vec::new();
    handle.pump(|envelope| out.push(envelope));
    out
}

#[test]
fn next_on_last_slide_rebroadcasts_unchanged_index() {
    let transport = ChannelTransport::new();
    let mut source = source(&transport, 5);
    source.goto(4);
    let mut watcher = observer(&transport);

    assert_eq!(source.navigate(Direction::Next), Some(4));

    let received = drain(&mut watcher);
    assert_eq!(received.len(), 1, "exactly one slide broadcast");
    match &received[0].message {
        Message::Slide(update) => assert_eq!(update.index, 4),
        other => panic!("expected slide, got {}", other.kind()),
    }
}

#[test]
fn prev_on_first_slide_stays_at_zero() {
    let transport = ChannelTransport::new();
    let mut source = source(&transport, 3);
    assert_eq!(source.navigate(Direction::Prev), Some(0));
    assert_eq!(source.current_index(), Some(0));
}

#[test]
fn navigation_never_leaves_deck_bounds() {
    let transport = ChannelTransport::new();
    for total in 1..=6 {
        let mut source = source(&transport, total);
        for target in [0, 1, total.saturating_sub(1), total, total + 3, usize::MAX] {
            let index = source.goto(target).unwrap();
            assert!(index < total, "goto({target}) on {total} slides gave {index}");
            for direction in [Direction::Next, Direction::Prev, Direction::Next] {
                let index = source.navigate(direction).unwrap();
                assert!(index < total);
            }
        }
    }
}

#[test]
fn late_mirror_converges_through_request_init() {
    let transport = ChannelTransport::new();
    let mut source = source(&transport, 5);
    source.goto(2);

    let mut mirror = mirror(&transport);
    let now = Instant::now();
    mirror.attach(now);
    assert_eq!(mirror.view(), &MirrorView::Waiting);

    let events = source.pump();
    assert_eq!(events, vec![SourceEvent::MirrorOpened]);
    mirror.pump(now);

    let MirrorView::Showing(state) = mirror.view() else {
        panic!("mirror still waiting after init");
    };
    assert_eq!(state.index, 2);
    assert_eq!(state.total_slides, Some(5));
    assert_eq!(state.slide.id, "slide-2");
    assert_eq!(state.next_slide.as_ref().map(|s| s.id.as_str()), Some("slide-3"));
    assert!(mirror.timer().has_started());
}

#[test]
fn mirror_navigation_waits_for_source_broadcast() {
    let transport = ChannelTransport::new();
    let mut source = source(&transport, 5);
    let mut mirror = mirror(&transport);
    let now = Instant::now();
    mirror.attach(now);
    source.pump();
    mirror.pump(now);
    assert_eq!(mirror.displayed_index(), Some(0));

    mirror.next();
    mirror.next();
    assert_eq!(mirror.displayed_index(), Some(0), "mirror never moves on its own");

    source.pump();
    assert_eq!(source.current_index(), Some(2));
    mirror.pump(now);
    assert_eq!(mirror.displayed_index(), Some(2));

    mirror.goto(99);
    source.pump();
    mirror.pump(now);
    assert_eq!(mirror.displayed_index(), Some(4));
}

#[test]
fn mirror_without_source_keeps_waiting() {
    let transport = ChannelTransport::new();
    let mut mirror = mirror(&transport);
    let now = Instant::now();
    mirror.attach(now);
    mirror.next();
    assert!(mirror.pump(now).is_empty());
    assert_eq!(mirror.view(), &MirrorView::Waiting);
}

#[test]
fn mirror_cannot_take_over_slide_state() {
    let transport = ChannelTransport::new();
    let mut source = source(&transport, 5);
    let mut rogue = observer(&transport);
    rogue.post(Message::RequestInit {});
    source.pump();

    let mut update: Option<SlideUpdate> = None;
    rogue.pump(|envelope| {
        if let Message::Init(snapshot) = envelope.message {
            update = Some(snapshot.into());
        }
    });
    let update = update.expect("init reply");
    rogue.post(Message::Slide(update));

    assert!(source.pump().is_empty(), "mirror-role slide posts are refused");
    assert_eq!(source.current_index(), Some(0));
}

#[test]
fn second_source_is_reported_as_conflict() {
    let transport = ChannelTransport::new();
    let mut first = source(&transport, 5);
    let second = source(&transport, 5);

    let events = first.pump();
    assert_eq!(
        events,
        vec![SourceEvent::ConflictingSource(second.handle().source_id().clone())]
    );
    assert_eq!(first.current_index(), Some(0));
}
