//! The peer transport adapter surface (spec §4.7, §6).
//!
//! This is deliberately narrow. The controller never learns peer network
//! details; the adapter never learns simulation content — it moves opaque
//! bytes and little-endian 32-bit frame/checksum numbers. Grounded in the
//! teacher's `NonBlockingSocket` trait and `Message` enum, narrowed to
//! exactly this surface: the teacher's UDP/Tokio socket implementations,
//! chaos-injection test socket, and RLE/delta wire compression are *not*
//! needed here (transport implementation is explicitly out of scope, spec
//! §1) and are not carried over.

use std::collections::VecDeque;

use crate::{Frame, PeerId};

/// Something that happened on the transport since the controller last
/// polled.
///
/// Spec §5: "Transport interaction... callbacks enqueue inputs and
/// sync-tests in per-peer queues; the next tick's step 2 drains them."
/// [`PeerTransport::poll_events`] *is* that drain — an implementation's
/// on-receipt callbacks (however it receives bytes: async task, OS thread,
/// whatever) must only ever push onto an internal queue, never call back
/// into the controller directly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportEvent {
    /// A peer's input for `frame` arrived.
    Input {
        /// The peer the input came from.
        peer: PeerId,
        /// The frame the input applies to.
        frame: Frame,
        /// Opaque input payload, meaningful only to
        /// [`crate::sim::entity::Input::from_bytes`].
        bytes: Vec<u8>,
    },
    /// A peer's sync-test checksum for `frame` arrived.
    SyncTest {
        /// The peer the checksum came from.
        peer: PeerId,
        /// The frame the checksum was computed at.
        frame: Frame,
        /// The peer's reported checksum.
        checksum: u32,
    },
    /// The transport reports a peer as unreachable/disconnected.
    PeerLost {
        /// The peer that was lost.
        peer: PeerId,
    },
}

/// The narrow interface the rollback controller expects from a transport
/// implementation (spec §6).
///
/// Frame numbers and checksums are little-endian 32-bit unsigned on the
/// wire (spec §6); this trait's signatures already use [`Frame`]/`u32`, so
/// an implementation converts at its own serialization boundary, not here.
pub trait PeerTransport {
    /// Best-effort, unordered, unreliable send of `frame`'s input to
    /// `peer`.
    fn send_input(&mut self, peer: &PeerId, frame: Frame, input_bytes: &[u8]);

    /// Best-effort send of a sync-test checksum for `frame` to `peer`.
    fn send_sync_test(&mut self, peer: &PeerId, frame: Frame, checksum: u32);

    /// Drains every event received since the last call. Called exactly
    /// once per tick, before local input capture (spec §4.6 step 2, §5
    /// "drain first").
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

/// An in-process transport with no actual networking: sent messages are
/// recorded for inspection, and inbound events are queued by calling
/// [`LoopbackTransport::deliver`] directly.
///
/// Useful for tests and for wiring two sessions together in the same
/// process (spec's end-to-end scenarios in §8 run exactly this way).
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    outbox_inputs: Vec<(PeerId, Frame, Vec<u8>)>,
    outbox_sync_tests: Vec<(PeerId, Frame, u32)>,
    inbox: VecDeque<TransportEvent>,
}

impl LoopbackTransport {
    /// Builds an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `event` to be returned by the next [`PeerTransport::poll_events`].
    pub fn deliver(&mut self, event: TransportEvent) {
        self.inbox.push_back(event);
    }

    /// Every input this transport has been asked to send, in send order.
    #[must_use]
    pub fn sent_inputs(&self) -> &[(PeerId, Frame, Vec<u8>)] {
        &self.outbox_inputs
    }

    /// Every sync-test this transport has been asked to send, in send
    /// order.
    #[must_use]
    pub fn sent_sync_tests(&self) -> &[(PeerId, Frame, u32)] {
        &self.outbox_sync_tests
    }

    /// Drains and returns every input queued since the last drain. Useful
    /// for wiring two loopback transports together: forward one session's
    /// drained sends into the other's [`LoopbackTransport::deliver`].
    pub fn take_sent_inputs(&mut self) -> Vec<(PeerId, Frame, Vec<u8>)> {
        std::mem::take(&mut self.outbox_inputs)
    }

    /// Drains and returns every sync-test queued since the last drain.
    pub fn take_sent_sync_tests(&mut self) -> Vec<(PeerId, Frame, u32)> {
        std::mem::take(&mut self.outbox_sync_tests)
    }
}

impl PeerTransport for LoopbackTransport {
    fn send_input(&mut self, peer: &PeerId, frame: Frame, input_bytes: &[u8]) {
        self.outbox_inputs
            .push((peer.clone(), frame, input_bytes.to_vec()));
    }

    fn send_sync_test(&mut self, peer: &PeerId, frame: Frame, checksum: u32) {
        self.outbox_sync_tests.push((peer.clone(), frame, checksum));
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.inbox.drain(..).collect()
    }
}


/// An async-friendly [`PeerTransport`] backed by `tokio::sync::mpsc`
/// channels, for callers driving the session loop from a Tokio task while
/// receiving bytes on other tasks (e.g. a socket-read task).
///
/// This is a channel bridge, not a network transport: feeding it real
/// UDP/QUIC bytes is the caller's job (transport implementation is out of
/// scope for this crate, spec §1).
#[cfg(feature = "tokio")]
pub mod tokio_channel {
    use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

    use super::{PeerTransport, TransportEvent};
    use crate::{Frame, PeerId};

    /// The sending half: clone into every task that needs to enqueue an
    /// inbound event (e.g. a socket-read task decoding bytes off the wire).
    #[derive(Clone)]
    pub struct TokioEventSender(UnboundedSender<TransportEvent>);

    impl TokioEventSender {
        /// Enqueues `event` for the next `poll_events` call. A send after
        /// the receiving [`TokioChannelTransport`] has been dropped is a
        /// silent no-op.
        pub fn send(&self, event: TransportEvent) {
            let _ = self.0.send(event);
        }
    }

    /// A [`PeerTransport`] whose inbound side is fed by [`TokioEventSender`]
    /// clones from other tasks, and whose outbound side records sends for
    /// the caller to forward however it actually talks to the network.
    pub struct TokioChannelTransport {
        inbox: UnboundedReceiver<TransportEvent>,
        outbox_inputs: Vec<(PeerId, Frame, Vec<u8>)>,
        outbox_sync_tests: Vec<(PeerId, Frame, u32)>,
    }

    impl TokioChannelTransport {
        /// Builds a connected sender/transport pair.
        #[must_use]
        pub fn channel() -> (TokioEventSender, Self) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                TokioEventSender(tx),
                Self {
                    inbox: rx,
                    outbox_inputs: Vec::new(),
                    outbox_sync_tests: Vec::new(),
                },
            )
        }

        /// Every input queued for send since the last drain.
        pub fn take_sent_inputs(&mut self) -> Vec<(PeerId, Frame, Vec<u8>)> {
            std::mem::take(&mut self.outbox_inputs)
        }

        /// Every sync-test queued for send since the last drain.
        pub fn take_sent_sync_tests(&mut self) -> Vec<(PeerId, Frame, u32)> {
            std::mem::take(&mut self.outbox_sync_tests)
        }
    }

    impl PeerTransport for TokioChannelTransport {
        fn send_input(&mut self, peer: &PeerId, frame: Frame, input_bytes: &[u8]) {
            self.outbox_inputs
                .push((peer.clone(), frame, input_bytes.to_vec()));
        }

        fn send_sync_test(&mut self, peer: &PeerId, frame: Frame, checksum: u32) {
            self.outbox_sync_tests.push((peer.clone(), frame, checksum));
        }

        fn poll_events(&mut self) -> Vec<TransportEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.inbox.try_recv() {
                events.push(event);
            }
            events
        }
    }

}
