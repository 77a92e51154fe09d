//! End-to-end two-session scenarios, wired together through a pair of
//! [`LoopbackTransport`]s (`tests/common/mod.rs`).

mod common;

use common::Pair;
use lockframe::prelude::*;

#[test]
fn two_sessions_holding_still_never_roll_back() {
    let config = SessionConfig::builder().build().unwrap();
    let mut pair = Pair::new(config);
    for _ in 0..20 {
        pair.tick(Input::NULL, Input::NULL);
    }
    assert_eq!(pair.session_a.metrics().rollbacks(), 0);
    assert_eq!(pair.session_b.metrics().rollbacks(), 0);
}

#[test]
fn changing_input_with_no_delay_buffer_forces_a_rollback() {
    // With zero input delay there is no buffer to absorb one tick of
    // network latency, so a peer's input change is always guessed wrong by
    // its counterpart at least once.
    let config = SessionConfig::builder().input_delay_frames(0).build().unwrap();
    let mut pair = Pair::new(config);

    for _ in 0..3 {
        pair.tick(Input::NULL, Input::NULL);
    }
    for _ in 0..10 {
        pair.tick(Input::NULL, Input::new(buttons::RIGHT));
    }

    assert!(pair.session_a.metrics().rollbacks() >= 1);
}

#[test]
fn sessions_in_sync_never_flag_desync_under_periodic_checksum_exchange() {
    let config = SessionConfig::builder()
        .sync_test_interval(4)
        .snapshot_interval(4)
        .build()
        .unwrap();
    let mut pair = Pair::new(config);
    for _ in 0..16 {
        pair.tick(Input::NULL, Input::NULL);
    }
    assert!(!pair.session_a.is_desync_flagged());
    assert!(!pair.session_b.is_desync_flagged());
}

#[test]
fn stale_input_delivered_after_eviction_is_dropped_without_effect() {
    let local = PeerId::from("local");
    let remote = PeerId::from("remote");
    let config = SessionConfig::builder().max_rollback_frames(3).build().unwrap();
    let mut session = RollbackSession::new(config);
    let world = World::new(NoRules, &[local.clone(), remote.clone()], 5);
    session.initialize(world, local).unwrap();
    session.add_peer(remote.clone(), 0).unwrap();
    session.start().unwrap();

    let mut transport = LoopbackTransport::new();
    for _ in 0..20 {
        session.tick(&mut transport).unwrap();
    }
    let rollbacks_before = session.metrics().rollbacks();

    transport.deliver(TransportEvent::Input {
        peer: remote,
        frame: Frame::new(0),
        bytes: Input::new(1).to_bytes().to_vec(),
    });
    session.tick(&mut transport).unwrap();

    assert_eq!(session.metrics().rollbacks(), rollbacks_before);
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn fabricated_sync_test_mismatch_flags_desync_without_becoming_fatal() {
    let local = PeerId::from("local");
    let remote = PeerId::from("remote");
    let config = SessionConfig::builder()
        .sync_test_interval(2)
        .snapshot_interval(2)
        .build()
        .unwrap();
    let mut session = RollbackSession::new(config);
    let world = World::new(NoRules, &[local.clone(), remote.clone()], 5);
    session.initialize(world, local).unwrap();
    session.add_peer(remote.clone(), 0).unwrap();
    session.start().unwrap();

    let mut transport = LoopbackTransport::new();
    session.tick(&mut transport).unwrap();
    session.tick(&mut transport).unwrap();
    assert!(!session.is_desync_flagged());

    transport.deliver(TransportEvent::SyncTest {
        peer: remote,
        frame: Frame::new(2),
        checksum: 0xDEAD_BEEF,
    });
    session.tick(&mut transport).unwrap();

    assert!(session.is_desync_flagged());
    assert_eq!(session.state(), SessionState::Running);
    let events = session.drain_events();
    assert!(events.iter().any(|event| matches!(event, RollbackEvent::DesyncDetected { .. })));

    session.acknowledge_desync();
    assert!(!session.is_desync_flagged());
}

#[test]
fn removing_a_peer_mid_session_keeps_it_running() {
    let local = PeerId::from("local");
    let remote = PeerId::from("remote");
    let config = SessionConfig::builder().build().unwrap();
    let mut session = RollbackSession::new(config);
    let world = World::new(NoRules, &[local.clone(), remote.clone()], 5);
    session.initialize(world, local).unwrap();
    session.add_peer(remote.clone(), 2).unwrap();
    session.start().unwrap();

    let mut transport = LoopbackTransport::new();
    session.tick(&mut transport).unwrap();
    session.remove_peer(&remote).unwrap();
    assert_eq!(session.confirmed_frame(), Frame::NULL);

    session.tick(&mut transport).unwrap();
    assert_eq!(session.state(), SessionState::Running);
    let events = session.drain_events();
    assert!(events.iter().any(|event| matches!(event, RollbackEvent::PeerLost { .. })));
}
