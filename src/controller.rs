//! The rollback controller: frame advancement, input buffering, rollback
//! detection, resimulation, and sync-test cadence (spec §4.6).
//!
//! Adapted from the teacher's `sessions::p2p_session::P2PSession` tick
//! algorithm, collapsed from the teacher's three session types
//! (`P2PSession`, `SpectatorSession`, `SyncTestSession`) into the single
//! state machine spec §4.6 describes — this crate has sync-test broadcast
//! as an always-on cadence of one controller rather than a distinct session
//! type. Exposes a method-call API (`initialize`/`add_peer`/`start`/`tick`/
//! ...) rather than the teacher's request-queue/callback style, since the
//! simpler concrete four-callback harness doesn't need that indirection
//! (see `DESIGN.md`).

use std::collections::{BTreeMap, VecDeque};

use crate::config::SessionConfig;
use crate::error::{RollbackError, RollbackResult};
use crate::input_queue::InputQueue;
use crate::metrics::MetricsSink;
use crate::sim::{FrameInputs, GameHarness, Input};
use crate::sync_layer::SnapshotRing;
use crate::transport::{PeerTransport, TransportEvent};
use crate::{Frame, InputStatus, PeerId, RollbackEvent};

/// Extra frames of slack kept beyond `max_rollback_frames` before an input
/// ring entry is evicted, so a rollback targeting the oldest frame
/// `max_rollback_frames` still finds its input still retained (spec §4.4's
/// eviction rule names a "margin" without pinning its value).
const EVICTION_MARGIN: i32 = 1;

/// The controller's lifecycle (spec §4.6 "state machine").
///
/// The state machine's "running + desync flag" branch is represented as
/// [`RollbackSession::is_desync_flagged`] rather than a fifth variant here —
/// it is reporting-only and does not change what operations are valid, so
/// modeling it as a flag alongside `Running` avoids a state that behaves
/// identically to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No harness attached yet.
    Uninitialized,
    /// Harness attached, not yet ticking.
    Idle,
    /// Ticking.
    Running,
    /// A fatal error occurred; the session will not process further ticks.
    Fatal,
}

struct PeerEntry {
    input_delay: u32,
    is_local: bool,
}

fn is_fatal(err: &RollbackError) -> bool {
    matches!(
        err,
        RollbackError::RollbackMiss { .. } | RollbackError::StateCorrupt { .. } | RollbackError::ArithmeticError
    )
}

/// Builds the per-frame input map for `frame`, reading (and, for
/// unconfirmed frames, freezing) each peer's prediction, and counting
/// predicted draws into `metrics`.
///
/// A free function rather than a method: it needs `&mut` access to
/// `queues` and `metrics` while a caller elsewhere in `tick` may be
/// holding a live `&mut H` borrowed from a different field of
/// `RollbackSession` — a method taking `&mut self` would make the borrow
/// checker treat that as a conflicting borrow of the whole session even
/// though the two borrows never touch the same field.
fn gather_inputs(
    queues: &mut BTreeMap<PeerId, InputQueue>,
    metrics: &mut MetricsSink,
    frame: Frame,
) -> FrameInputs {
    let mut inputs = FrameInputs::new();
    for (peer, queue) in queues.iter_mut() {
        let (input, status) = queue.input_for(frame);
        if status == InputStatus::Predicted {
            metrics.record_predicted_input();
        }
        inputs.insert(peer.clone(), input);
    }
    inputs
}

fn recompute_confirmed_frame(peers: &BTreeMap<PeerId, PeerEntry>, queues: &BTreeMap<PeerId, InputQueue>) -> Frame {
    peers
        .iter()
        .filter(|(_, entry)| !entry.is_local)
        .filter_map(|(peer, _)| queues.get(peer).map(InputQueue::last_confirmed_frame))
        .min()
        .unwrap_or(Frame::NULL)
}

/// The rollback controller: owns the input ring, snapshot ring, peer
/// table, metrics, and current/confirmed frame (spec §3 "Ownership"), and
/// drives a concrete [`GameHarness`] through its four-operation contract.
pub struct RollbackSession<H: GameHarness> {
    state: SessionState,
    harness: Option<H>,
    config: SessionConfig,
    local_peer: Option<PeerId>,
    peers: BTreeMap<PeerId, PeerEntry>,
    queues: BTreeMap<PeerId, InputQueue>,
    snapshots: SnapshotRing,
    metrics: MetricsSink,
    current_frame: Frame,
    confirmed_frame: Frame,
    desync_flagged: bool,
    local_input_source: Option<Box<dyn FnMut() -> Input + Send>>,
    pending_future_inputs: Vec<(PeerId, Frame, Vec<u8>)>,
    events: VecDeque<RollbackEvent>,
}

impl<H: GameHarness> RollbackSession<H> {
    /// Builds an uninitialized session. Call [`RollbackSession::initialize`]
    /// before [`RollbackSession::start`]/[`RollbackSession::tick`].
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::Uninitialized,
            harness: None,
            snapshots: SnapshotRing::sized_for(config.max_rollback_frames(), config.snapshot_interval()),
            config,
            local_peer: None,
            peers: BTreeMap::new(),
            queues: BTreeMap::new(),
            metrics: MetricsSink::new(),
            current_frame: Frame::new(0),
            confirmed_frame: Frame::NULL,
            desync_flagged: false,
            local_input_source: None,
            pending_future_inputs: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// Attaches `harness` and registers `local_peer`. Fails with
    /// [`RollbackError::AlreadyInitialized`] if called more than once.
    pub fn initialize(&mut self, harness: H, local_peer: PeerId) -> RollbackResult<()> {
        if self.state != SessionState::Uninitialized {
            return Err(RollbackError::AlreadyInitialized);
        }
        self.snapshots.snapshot(&harness, Frame::new(0))?;
        self.peers.insert(
            local_peer.clone(),
            PeerEntry {
                input_delay: self.config.input_delay_frames(),
                is_local: true,
            },
        );
        self.queues.insert(local_peer.clone(), InputQueue::with_default_strategy());
        self.local_peer = Some(local_peer);
        self.harness = Some(harness);
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Registers a remote peer. Fails with [`RollbackError::DuplicatePeer`]
    /// if already registered.
    pub fn add_peer(&mut self, peer: PeerId, input_delay: u32) -> RollbackResult<()> {
        if self.peers.contains_key(&peer) {
            return Err(RollbackError::DuplicatePeer { peer });
        }
        self.peers.insert(peer.clone(), PeerEntry { input_delay, is_local: false });
        self.queues.insert(peer, InputQueue::with_default_strategy());
        Ok(())
    }

    /// Removes a peer, e.g. in response to
    /// [`TransportEvent::PeerLost`] or an explicit application decision.
    /// Fails with [`RollbackError::UnknownPeer`] if not registered.
    pub fn remove_peer(&mut self, peer: &PeerId) -> RollbackResult<()> {
        if self.peers.remove(peer).is_none() {
            return Err(RollbackError::UnknownPeer { peer: peer.clone() });
        }
        self.queues.remove(peer);
        self.confirmed_frame = recompute_confirmed_frame(&self.peers, &self.queues);
        self.events.push_back(RollbackEvent::PeerLost { peer: peer.clone() });
        Ok(())
    }

    /// Installs the function the tick loop calls each tick to sample the
    /// local input for the frame being scheduled.
    pub fn set_local_input_source(&mut self, source: impl FnMut() -> Input + Send + 'static) {
        self.local_input_source = Some(Box::new(source));
    }

    /// Transitions `Idle -> Running`. Fails with
    /// [`RollbackError::NotInitialized`] if the session hasn't been
    /// initialized.
    pub fn start(&mut self) -> RollbackResult<()> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Running;
                Ok(())
            }
            SessionState::Uninitialized => Err(RollbackError::NotInitialized),
            SessionState::Running | SessionState::Fatal => Err(RollbackError::NotRunning),
        }
    }

    /// Transitions `Running -> Idle`. Honored only between ticks — there is
    /// no mid-tick stop (spec §5 "cancellation and timeout").
    pub fn stop(&mut self) -> RollbackResult<()> {
        if self.state != SessionState::Running {
            return Err(RollbackError::NotRunning);
        }
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// `true` if a sync-test mismatch has been observed and not yet
    /// acknowledged by the caller. Non-fatal and reporting-only (spec §4.6,
    /// §7): the session keeps running.
    #[must_use]
    pub const fn is_desync_flagged(&self) -> bool {
        self.desync_flagged
    }

    /// Clears the desync flag, e.g. after the caller has surfaced it to the
    /// user.
    pub fn acknowledge_desync(&mut self) {
        self.desync_flagged = false;
    }

    /// The frame most recently completed.
    #[must_use]
    pub const fn current_frame(&self) -> Frame {
        self.current_frame
    }

    /// The largest frame for which every non-local peer's input is known
    /// (spec §3).
    #[must_use]
    pub const fn confirmed_frame(&self) -> Frame {
        self.confirmed_frame
    }

    /// Read-only rollback/prediction counters.
    #[must_use]
    pub const fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }

    /// A read-only, render-ready view of the current simulation (spec §6).
    /// Fails with [`RollbackError::NotInitialized`] before
    /// [`RollbackSession::initialize`].
    pub fn get_render_state(&self) -> RollbackResult<H::RenderState> {
        Ok(self.harness.as_ref().ok_or(RollbackError::NotInitialized)?.render_state())
    }

    /// Drains every [`RollbackEvent`] queued since the last call.
    pub fn drain_events(&mut self) -> Vec<RollbackEvent> {
        self.events.drain(..).collect()
    }

    /// Runs one frame of the tick algorithm (spec §4.6). Fails with
    /// [`RollbackError::NotRunning`] unless [`SessionState::Running`]. A
    /// fatal error ([`RollbackError::RollbackMiss`],
    /// [`RollbackError::StateCorrupt`], [`RollbackError::ArithmeticError`])
    /// moves the session to [`SessionState::Fatal`] before returning.
    pub fn tick(&mut self, transport: &mut impl PeerTransport) -> RollbackResult<()> {
        if self.state != SessionState::Running {
            return Err(RollbackError::NotRunning);
        }
        match self.tick_inner(transport) {
            Ok(()) => Ok(()),
            Err(err) => {
                if is_fatal(&err) {
                    self.state = SessionState::Fatal;
                }
                Err(err)
            }
        }
    }

    fn tick_inner(&mut self, transport: &mut impl PeerTransport) -> RollbackResult<()> {
        let _span = tracing::debug_span!("tick", frame = %self.current_frame).entered();
        let local_peer = self.local_peer.clone().ok_or(RollbackError::NotInitialized)?;

        // Step 1.
        self.current_frame += 1;

        // Step 2: drain transport events, honoring bound checks. Collected
        // into a plain `Vec` first rather than processed via an iterator
        // adapter chain, since a closure capturing `&mut self` to call
        // `handle_non_input_event` would stay borrowed for the whole
        // iterator's lifetime and collide with the `&mut self` this loop's
        // own body needs for `handle_input_event`.
        let mut input_events = std::mem::take(&mut self.pending_future_inputs);
        for event in transport.poll_events() {
            match event {
                TransportEvent::Input { peer, frame, bytes } => input_events.push((peer, frame, bytes)),
                other => self.handle_non_input_event(other),
            }
        }
        for (peer, frame, bytes) in input_events {
            self.handle_input_event(peer, frame, bytes);
        }

        // Step 3: capture and (if non-null) ring + broadcast local input.
        if let Some(mut source) = self.local_input_source.take() {
            let input = source();
            self.local_input_source = Some(source);
            if input != Input::NULL {
                let delay = self
                    .peers
                    .get(&local_peer)
                    .map_or(0, |entry| entry.input_delay) as i32;
                let target_frame = self.current_frame + delay;
                if let Some(queue) = self.queues.get_mut(&local_peer) {
                    queue.add_input(target_frame, input);
                }
                for peer in self.peers.keys().filter(|peer| **peer != local_peer) {
                    transport.send_input(peer, target_frame, &input.to_bytes());
                }
            }
        }

        // Step 4: rollback detection — earliest frame any non-local peer's
        // frozen prediction has since been contradicted.
        let rollback_target = self
            .queues
            .iter()
            .filter(|(peer, _)| **peer != local_peer)
            .filter_map(|(_, queue)| queue.first_incorrect_frame())
            .min();

        let harness = self.harness.as_mut().ok_or(RollbackError::NotInitialized)?;

        // Steps 5-6: resimulate through the rollback target (inclusive of
        // `current_frame`, which folds the teacher's separate "simulate
        // current_frame itself" step into the same resimulation pass
        // rather than simulating it twice — see DESIGN.md).
        if let Some(target) = rollback_target {
            let snapshot_frame = self.snapshots.restore_nearest(harness, target)?;
            let depth = (self.current_frame - target).max(0) as u32;

            for raw_frame in (snapshot_frame.as_i32() + 1)..=self.current_frame.as_i32() {
                let frame = Frame::new(raw_frame);
                let inputs = gather_inputs(&mut self.queues, &mut self.metrics, frame);
                harness.advance(&inputs)?;
                if raw_frame % self.config.snapshot_interval() as i32 == 0 {
                    self.snapshots.snapshot(harness, frame)?;
                }
            }
            for queue in self.queues.values_mut() {
                queue.reset_prediction();
            }
            self.metrics.record_rollback(depth);
            self.events.push_back(RollbackEvent::RolledBack {
                from: snapshot_frame,
                to: self.current_frame,
            });
            tracing::info!(from = %snapshot_frame, to = %self.current_frame, depth, "rollback resimulated");
        } else {
            let inputs = gather_inputs(&mut self.queues, &mut self.metrics, self.current_frame);
            harness.advance(&inputs)?;
            if self.current_frame.as_i32() % self.config.snapshot_interval() as i32 == 0 {
                self.snapshots.snapshot(harness, self.current_frame)?;
            }
        }

        // Step 7.
        self.confirmed_frame = recompute_confirmed_frame(&self.peers, &self.queues);

        // Step 8: sync-test cadence.
        if let crate::DesyncDetection::On { interval } = self.config.desync_detection() {
            if interval > 0 && self.current_frame.as_i32() % interval as i32 == 0 {
                let checksum = harness.checksum();
                for peer in self.peers.keys().filter(|peer| **peer != local_peer) {
                    transport.send_sync_test(peer, self.current_frame, checksum);
                }
            }
        }

        // Step 9: evict stale ring entries.
        let boundary = self.current_frame - (self.config.max_rollback_frames() as i32 + EVICTION_MARGIN);
        for queue in self.queues.values_mut() {
            queue.evict_before(boundary);
        }

        Ok(())
    }

    fn handle_non_input_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::SyncTest { peer, frame, checksum } => {
                if let Some(local_checksum) = self.snapshots.checksum_at(frame) {
                    if local_checksum != checksum {
                        self.desync_flagged = true;
                        self.events
                            .push_back(RollbackEvent::DesyncDetected { peer: peer.clone(), frame });
                        tracing::warn!(%peer, %frame, "sync test checksum mismatch");
                    }
                }
                // Otherwise the tested frame predates confirmed state and
                // is silently ignored (spec §4.6 "sync test").
            }
            TransportEvent::PeerLost { peer } => {
                self.peers.remove(&peer);
                self.queues.remove(&peer);
                self.confirmed_frame = recompute_confirmed_frame(&self.peers, &self.queues);
                self.events.push_back(RollbackEvent::PeerLost { peer });
            }
            TransportEvent::Input { .. } => unreachable!("filtered out by the caller"),
        }
    }

    fn handle_input_event(&mut self, peer: PeerId, frame: Frame, bytes: Vec<u8>) {
        if Some(&peer) == self.local_peer.as_ref() {
            return;
        }
        if frame < self.current_frame - self.config.max_rollback_frames() as i32 {
            tracing::debug!(%peer, %frame, current = %self.current_frame, "dropping stale input");
            return;
        }
        if frame > self.current_frame + self.config.max_prediction_frames() as i32 {
            self.pending_future_inputs.push((peer, frame, bytes));
            return;
        }
        let Some(queue) = self.queues.get_mut(&peer) else {
            return;
        };
        let Some(input) = Input::from_bytes(&bytes) else {
            tracing::warn!(%peer, %frame, "received malformed input payload");
            return;
        };
        queue.add_input(frame, input);
        self.metrics.record_input_lag((self.current_frame - frame).max(0) as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::rules::NoRules;
    use crate::sim::world::World;
    use crate::transport::LoopbackTransport;

    fn session() -> RollbackSession<World<NoRules>> {
        let config = SessionConfig::builder().sync_test_interval(4).build().unwrap();
        RollbackSession::new(config)
    }

    fn peers() -> (PeerId, PeerId) {
        (PeerId::from("aa"), PeerId::from("bb"))
    }

    #[test]
    fn starts_uninitialized_and_rejects_tick() {
        let mut session = session();
        let mut transport = LoopbackTransport::new();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(matches!(session.tick(&mut transport), Err(RollbackError::NotRunning)));
    }

    #[test]
    fn double_initialize_fails() {
        let (local, remote) = peers();
        let mut session = session();
        let world = World::new(NoRules, &[local.clone(), remote], 1);
        session.initialize(world, local.clone()).unwrap();
        let world_again = World::new(NoRules, &[local.clone()], 1);
        assert!(matches!(
            session.initialize(world_again, local),
            Err(RollbackError::AlreadyInitialized)
        ));
    }

    #[test]
    fn start_before_initialize_fails() {
        let mut session = session();
        assert!(matches!(session.start(), Err(RollbackError::NotInitialized)));
    }

    #[test]
    fn tick_advances_frame_and_runs_without_peers() {
        let (local, _remote) = peers();
        let mut session = session();
        let world = World::new(NoRules, &[local.clone()], 1);
        session.initialize(world, local).unwrap();
        session.start().unwrap();

        let mut transport = LoopbackTransport::new();
        session.tick(&mut transport).unwrap();
        assert_eq!(session.current_frame(), Frame::new(1));
    }

    #[test]
    fn duplicate_peer_registration_fails() {
        let (local, remote) = peers();
        let mut session = session();
        let world = World::new(NoRules, &[local.clone(), remote.clone()], 1);
        session.initialize(world, local).unwrap();
        session.add_peer(remote.clone(), 2).unwrap();
        assert!(matches!(
            session.add_peer(remote, 2),
            Err(RollbackError::DuplicatePeer { .. })
        ));
    }

    #[test]
    fn remote_input_triggers_rollback_on_mismatch() {
        let (local, remote) = peers();
        let mut session = session();
        let world = World::new(NoRules, &[local.clone(), remote.clone()], 1);
        session.initialize(world, local.clone()).unwrap();
        session.add_peer(remote.clone(), 2).unwrap();
        session.start().unwrap();

        let mut transport = LoopbackTransport::new();
        for _ in 0..5 {
            session.tick(&mut transport).unwrap();
        }
        // A late-arriving input for an already-simulated frame should
        // trigger a rollback on the next tick.
        transport.deliver(TransportEvent::Input {
            peer: remote,
            frame: Frame::new(2),
            bytes: crate::sim::Input::new(3).to_bytes().to_vec(),
        });
        session.tick(&mut transport).unwrap();
        assert!(session.metrics().rollbacks() >= 1);
    }

    #[test]
    fn stop_then_start_resumes_ticking() {
        let (local, _remote) = peers();
        let mut session = session();
        let world = World::new(NoRules, &[local.clone()], 1);
        session.initialize(world, local).unwrap();
        session.start().unwrap();
        let mut transport = LoopbackTransport::new();
        session.tick(&mut transport).unwrap();
        session.stop().unwrap();
        assert!(matches!(session.tick(&mut transport), Err(RollbackError::NotRunning)));
        session.start().unwrap();
        session.tick(&mut transport).unwrap();
        assert_eq!(session.current_frame(), Frame::new(2));
    }
}
