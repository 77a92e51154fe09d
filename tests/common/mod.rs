//! Shared helpers for wiring two in-process [`RollbackSession`]s together
//! over a pair of [`LoopbackTransport`]s.

use lockframe::prelude::*;

/// Two peers, a two-player [`World`], and the transports connecting them.
pub struct Pair {
    pub peer_a: PeerId,
    pub peer_b: PeerId,
    pub session_a: RollbackSession<World<NoRules>>,
    pub session_b: RollbackSession<World<NoRules>>,
    pub transport_a: LoopbackTransport,
    pub transport_b: LoopbackTransport,
}

impl Pair {
    pub fn new(config: SessionConfig) -> Self {
        let peer_a = PeerId::from("peer-a");
        let peer_b = PeerId::from("peer-b");

        let mut session_a = RollbackSession::new(config);
        let world_a = World::new(NoRules, &[peer_a.clone(), peer_b.clone()], 1234);
        session_a.initialize(world_a, peer_a.clone()).unwrap();
        session_a.add_peer(peer_b.clone(), config.input_delay_frames()).unwrap();
        session_a.start().unwrap();

        let mut session_b = RollbackSession::new(config);
        let world_b = World::new(NoRules, &[peer_a.clone(), peer_b.clone()], 1234);
        session_b.initialize(world_b, peer_b.clone()).unwrap();
        session_b.add_peer(peer_a.clone(), config.input_delay_frames()).unwrap();
        session_b.start().unwrap();

        Self {
            peer_a,
            peer_b,
            session_a,
            session_b,
            transport_a: LoopbackTransport::new(),
            transport_b: LoopbackTransport::new(),
        }
    }

    /// Ticks both sessions with the given local inputs, then forwards
    /// whatever each transport sent into the other's inbox, so the next
    /// call's `poll_events` sees it.
    pub fn tick(&mut self, input_a: Input, input_b: Input) {
        self.session_a.set_local_input_source(move || input_a);
        self.session_b.set_local_input_source(move || input_b);

        self.session_a.tick(&mut self.transport_a).unwrap();
        self.session_b.tick(&mut self.transport_b).unwrap();
        self.relay();
    }

    /// Forwards queued sends on each transport into the other's inbox
    /// without ticking either session.
    pub fn relay(&mut self) {
        for (peer, frame, bytes) in self.transport_a.take_sent_inputs() {
            if peer == self.peer_b {
                self.transport_b.deliver(TransportEvent::Input {
                    peer: self.peer_a.clone(),
                    frame,
                    bytes,
                });
            }
        }
        for (peer, frame, checksum) in self.transport_a.take_sent_sync_tests() {
            if peer == self.peer_b {
                self.transport_b.deliver(TransportEvent::SyncTest {
                    peer: self.peer_a.clone(),
                    frame,
                    checksum,
                });
            }
        }
        for (peer, frame, bytes) in self.transport_b.take_sent_inputs() {
            if peer == self.peer_a {
                self.transport_a.deliver(TransportEvent::Input {
                    peer: self.peer_b.clone(),
                    frame,
                    bytes,
                });
            }
        }
        for (peer, frame, checksum) in self.transport_b.take_sent_sync_tests() {
            if peer == self.peer_a {
                self.transport_a.deliver(TransportEvent::SyncTest {
                    peer: self.peer_b.clone(),
                    frame,
                    checksum,
                });
            }
        }
    }
}
