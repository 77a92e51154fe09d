//! Fixed-size circular buffer of [`GameStateCell`] slots.

use crate::error::{RollbackError, RollbackResult};
use crate::sync_layer::game_state_cell::GameStateCell;
use crate::Frame;

/// A ring of `max_rollback + 1` snapshot slots, indexed by `frame mod
/// states.len()` (spec §4.5: "slot index = frame mod length").
///
/// Sizing at `max_rollback + 1` guarantees that the oldest frame that might
/// still need to be rolled back to has not yet been overwritten by a
/// same-indexed newer frame, as long as the snapshot cadence keeps the ring
/// populated densely enough — see the open question in `DESIGN.md` about
/// snapshot interval vs. ring length.
pub struct SavedStates {
    states: Vec<GameStateCell>,
}

impl SavedStates {
    /// Allocates a ring sized for `max_rollback` frames of history: `len =
    /// max_rollback + 1` (spec §4.5). Sufficient only when
    /// `snapshot_interval == 1`; see [`SavedStates::with_capacity`] for the
    /// general case.
    #[must_use]
    pub fn new(max_rollback: u32) -> Self {
        Self::with_capacity(max_rollback as usize + 1)
    }

    /// Allocates a ring with exactly `len` slots. Use this directly when
    /// `snapshot_interval > 1`: spec §9's open question requires `len >=
    /// ceil((max_rollback + 1) / snapshot_interval) + 1` so that a rollback
    /// target is never older than every retained snapshot purely because
    /// the cadence skipped it.
    #[must_use]
    pub fn with_capacity(len: usize) -> Self {
        let len = len.max(1);
        Self {
            states: (0..len).map(|_| GameStateCell::new()).collect(),
        }
    }

    /// The ring's slot count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// `true` if the ring has zero capacity (never constructed this way in
    /// practice; `max_rollback` is validated to be nonzero by
    /// [`crate::config::SessionConfig`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Returns the cell that owns `frame`'s slot.
    pub fn get_cell(&self, frame: Frame) -> RollbackResult<&GameStateCell> {
        let index = self.slot_index(frame)?;
        Ok(&self.states[index])
    }

    fn slot_index(&self, frame: Frame) -> RollbackResult<usize> {
        if !frame.is_valid() {
            return Err(RollbackError::StateCorrupt {
                reason: format!("cannot index the snapshot ring with {frame}"),
            });
        }
        Ok(frame.as_i32() as usize % self.states.len())
    }

    /// Writes `data`/`checksum` into `frame`'s slot, overwriting whatever
    /// was there (spec §4.5: "writing always overwrites").
    pub fn save(&self, frame: Frame, data: Vec<u8>, checksum: u32) -> RollbackResult<()> {
        self.get_cell(frame)?.save(frame, data, checksum);
        Ok(())
    }

    /// Linear scan for the slot holding the greatest frame `<= target`
    /// (spec §4.5). Returns `None` if no retained slot qualifies — callers
    /// treat that as a [`RollbackError::RollbackMiss`].
    #[must_use]
    pub fn nearest_at_or_before(&self, target: Frame) -> Option<(Frame, Vec<u8>)> {
        self.states
            .iter()
            .filter(|cell| !cell.is_empty() && cell.frame() <= target)
            .max_by_key(|cell| cell.frame())
            .and_then(|cell| cell.load().map(|data| (cell.frame(), data)))
    }

    /// The checksum recorded for `frame`, if that exact frame is still
    /// retained in the ring (used by sync-test comparison, spec §4.6).
    #[must_use]
    pub fn checksum_at(&self, frame: Frame) -> Option<u32> {
        self.states
            .iter()
            .find(|cell| cell.frame() == frame && !cell.is_empty())
            .map(GameStateCell::checksum)
    }

    /// The oldest frame still retained anywhere in the ring, or
    /// [`Frame::NULL`] if nothing has been saved yet.
    #[must_use]
    pub fn oldest_retained_frame(&self) -> Frame {
        self.states
            .iter()
            .filter(|cell| !cell.is_empty())
            .map(GameStateCell::frame)
            .min()
            .unwrap_or(Frame::NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_frame_is_rejected() {
        let ring = SavedStates::new(8);
        assert!(matches!(
            ring.get_cell(Frame::NULL),
            Err(RollbackError::StateCorrupt { .. })
        ));
    }

    #[test]
    fn save_and_nearest_at_or_before() {
        let ring = SavedStates::new(8);
        ring.save(Frame::new(3), vec![3], 30).unwrap();
        ring.save(Frame::new(6), vec![6], 60).unwrap();
        let (frame, data) = ring.nearest_at_or_before(Frame::new(7)).unwrap();
        assert_eq!(frame, Frame::new(6));
        assert_eq!(data, vec![6]);
    }

    #[test]
    fn nearest_at_or_before_returns_none_when_all_newer() {
        let ring = SavedStates::new(8);
        ring.save(Frame::new(5), vec![5], 50).unwrap();
        assert!(ring.nearest_at_or_before(Frame::new(2)).is_none());
    }

    #[test]
    fn checksum_at_requires_exact_frame_match() {
        let ring = SavedStates::new(8);
        ring.save(Frame::new(4), vec![4], 99).unwrap();
        assert_eq!(ring.checksum_at(Frame::new(4)), Some(99));
        assert_eq!(ring.checksum_at(Frame::new(5)), None);
    }

    #[test]
    fn ring_wraps_by_modulo() {
        let ring = SavedStates::new(2); // length 3
        ring.save(Frame::new(0), vec![0], 0).unwrap();
        ring.save(Frame::new(3), vec![3], 3).unwrap();
        // Frame 3 and frame 0 share slot index 0 mod 3.
        assert_eq!(ring.get_cell(Frame::new(0)).unwrap().frame(), Frame::new(3));
    }

    #[test]
    fn oldest_retained_frame_tracks_minimum() {
        let ring = SavedStates::new(8);
        assert_eq!(ring.oldest_retained_frame(), Frame::NULL);
        ring.save(Frame::new(5), vec![], 0).unwrap();
        ring.save(Frame::new(2), vec![], 0).unwrap();
        assert_eq!(ring.oldest_retained_frame(), Frame::new(2));
    }
}
