//! The snapshot ring: a bounded history of `(frame, opaque state,
//! checksum)` triples the rollback controller resimulates from.
//!
//! The teacher's `sync_layer` module already matches this spec's "Snapshot
//! Ring" component almost verbatim — [`GameStateCell`] and [`SavedStates`]
//! are adapted directly from it, narrowed to the concrete byte-blob
//! snapshot model this crate's [`crate::sim::GameHarness`] trait uses.

pub mod game_state_cell;
pub mod saved_states;

pub use game_state_cell::GameStateCell;
pub use saved_states::SavedStates;

use crate::error::{RollbackError, RollbackResult};
use crate::sim::GameHarness;
use crate::Frame;

/// Bundles a [`SavedStates`] ring with the capture/restore operations the
/// rollback controller drives every tick (spec §4.5, §4.6 steps 5-6), so
/// `controller.rs` drives it with one call each way rather than reaching
/// into the ring's internals.
pub struct SnapshotRing {
    states: SavedStates,
}

impl SnapshotRing {
    /// Allocates a ring sized for `max_rollback` frames of history,
    /// assuming a snapshot is taken every frame (`snapshot_interval == 1`).
    #[must_use]
    pub fn new(max_rollback: u32) -> Self {
        Self {
            states: SavedStates::new(max_rollback),
        }
    }

    /// Allocates a ring sized for the general case where snapshots are
    /// only taken every `snapshot_interval` frames (spec §9's open
    /// question): `len = ceil((max_rollback + 1) / snapshot_interval) +
    /// 1`, so a rollback target is never older than every retained
    /// snapshot purely because the cadence skipped over it.
    #[must_use]
    pub fn sized_for(max_rollback: u32, snapshot_interval: u32) -> Self {
        let interval = snapshot_interval.max(1);
        let len = (max_rollback + 1).div_ceil(interval) + 1;
        Self {
            states: SavedStates::with_capacity(len as usize),
        }
    }

    /// Captures `harness`'s current state and checksum into `frame`'s slot.
    pub fn snapshot<H: GameHarness>(&self, harness: &H, frame: Frame) -> RollbackResult<()> {
        let data = harness.save_state();
        let checksum = harness.checksum();
        self.states.save(frame, data, checksum)
    }

    /// Restores `harness` from the nearest retained snapshot at or before
    /// `target`, returning the frame it actually loaded from. Fails with
    /// [`RollbackError::RollbackMiss`] if every retained snapshot is newer
    /// than `target` or the ring holds nothing at all — per spec §4.6 step
    /// 5, this is fatal: the session cannot resimulate from a state it no
    /// longer has.
    pub fn restore_nearest<H: GameHarness>(
        &self,
        harness: &mut H,
        target: Frame,
    ) -> RollbackResult<Frame> {
        let (frame, data) = self
            .states
            .nearest_at_or_before(target)
            .ok_or_else(|| RollbackError::RollbackMiss {
                target,
                oldest_retained: self.states.oldest_retained_frame(),
            })?;
        harness.load_state(&data)?;
        Ok(frame)
    }

    /// The checksum recorded for `frame`, if it is still retained — used to
    /// answer an incoming sync-test message (spec §4.6 "sync test").
    #[must_use]
    pub fn checksum_at(&self, frame: Frame) -> Option<u32> {
        self.states.checksum_at(frame)
    }

    /// The oldest frame still retained anywhere in the ring.
    #[must_use]
    pub fn oldest_retained_frame(&self) -> Frame {
        self.states.oldest_retained_frame()
    }

    /// Ring capacity in slots (`max_rollback + 1`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// `true` if the ring has zero capacity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
