//! Per-peer input ring and prediction slot (spec §4.4).
//!
//! Adapted from the teacher's `input_queue` module, which is already
//! shaped almost exactly like this spec's "input ring entry (frame, map:
//! peer → input) + per-peer prediction slot" — one [`InputQueue`] per peer,
//! held by the rollback controller in a map keyed by
//! [`crate::PeerId`]. Dropped relative to the teacher: the
//! `InvariantChecker`/`report_violation!` telemetry layer and any
//! Kani-oriented doc references — this module's correctness is exercised by
//! the unit tests and the crate-level determinism tests, not by formal
//! verification tooling.

pub mod prediction;

pub use prediction::{BlankPrediction, PredictionStrategy, RepeatLastConfirmed};

use std::collections::BTreeMap;

use crate::sim::Input;
use crate::{Frame, InputStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    value: Input,
    confirmed: bool,
}

/// One peer's input ring: a sparse map from frame number to input, plus the
/// prediction slot used to stand in for frames that have not arrived yet.
///
/// Reading a not-yet-confirmed frame *freezes* the prediction used into the
/// ring. This is what lets the rollback controller compare "the prediction
/// a frame was actually simulated with" against "the input that later
/// arrived" (spec §9's open question on avoiding reference-identity
/// comparisons) — re-deriving the current prediction at comparison time
/// would give the wrong answer if `last_confirmed_input` had since changed.
pub struct InputQueue {
    entries: BTreeMap<i32, Slot>,
    last_confirmed_input: Option<Input>,
    last_confirmed_frame: Frame,
    first_incorrect_frame: Option<Frame>,
    strategy: Box<dyn PredictionStrategy>,
}

impl InputQueue {
    /// Builds an empty queue using the given prediction strategy.
    #[must_use]
    pub fn new(strategy: impl PredictionStrategy + 'static) -> Self {
        Self {
            entries: BTreeMap::new(),
            last_confirmed_input: None,
            last_confirmed_frame: Frame::NULL,
            first_incorrect_frame: None,
            strategy: Box::new(strategy),
        }
    }

    /// Builds an empty queue using [`RepeatLastConfirmed`], the default
    /// strategy for most games.
    #[must_use]
    pub fn with_default_strategy() -> Self {
        Self::new(RepeatLastConfirmed)
    }

    /// Records an actually-received input for `frame` (spec §4.4: "adding
    /// an input at (f, p) updates the ring, sets prediction[p] := that
    /// input... updates peer.last_confirmed_frame := max(existing, f)").
    ///
    /// If a prediction had already stood in for this frame, compares it by
    /// value against `input`; a mismatch extends
    /// [`InputQueue::first_incorrect_frame`] backward if this frame
    /// predates the current one.
    pub fn add_input(&mut self, frame: Frame, input: Input) {
        if let Some(slot) = self.entries.get(&frame.as_i32()) {
            if !slot.confirmed && slot.value != input {
                self.first_incorrect_frame =
                    Some(self.first_incorrect_frame.map_or(frame, |existing| existing.min(frame)));
            }
        }
        self.entries.insert(frame.as_i32(), Slot { value: input, confirmed: true });
        self.last_confirmed_input = Some(input);
        self.last_confirmed_frame = self.last_confirmed_frame.max(frame);
    }

    /// Returns the input to use when simulating `frame`, and whether it is
    /// the peer's confirmed value or a stand-in prediction.
    ///
    /// A read for a frame with no ring entry yet creates one, predicted
    /// from the current prediction slot, and freezes it — later reads for
    /// the same still-unconfirmed frame return that same frozen value, not
    /// a fresh prediction.
    pub fn input_for(&mut self, frame: Frame) -> (Input, InputStatus) {
        if let Some(slot) = self.entries.get(&frame.as_i32()) {
            let status = if slot.confirmed {
                InputStatus::Confirmed
            } else {
                InputStatus::Predicted
            };
            return (slot.value, status);
        }
        let predicted = self.strategy.predict(self.last_confirmed_input);
        self.entries.insert(frame.as_i32(), Slot { value: predicted, confirmed: false });
        (predicted, InputStatus::Predicted)
    }

    /// Returns the confirmed input stored for `frame`, if any, without
    /// creating a prediction entry as a side effect.
    #[must_use]
    pub fn confirmed_input(&self, frame: Frame) -> Option<Input> {
        self.entries
            .get(&frame.as_i32())
            .filter(|slot| slot.confirmed)
            .map(|slot| slot.value)
    }

    /// The earliest frame whose frozen prediction has since been
    /// contradicted by a confirmed input — the rollback target this peer
    /// contributes, if any (spec §4.6 step 4).
    #[must_use]
    pub fn first_incorrect_frame(&self) -> Option<Frame> {
        self.first_incorrect_frame
    }

    /// Clears the incorrect-frame marker. Called once the controller has
    /// finished resimulating past it (spec §4.6 step 5 completes, ready for
    /// the next tick's rollback check to start fresh).
    pub fn reset_prediction(&mut self) {
        self.first_incorrect_frame = None;
    }

    /// This peer's most recently confirmed frame.
    #[must_use]
    pub const fn last_confirmed_frame(&self) -> Frame {
        self.last_confirmed_frame
    }

    /// Removes ring entries older than `boundary` (spec §4.4 eviction
    /// policy: `frame < current_frame - max_rollback - margin`).
    pub fn evict_before(&mut self, boundary: Frame) {
        self.entries.retain(|&frame, _| frame >= boundary.as_i32());
    }

    /// Number of entries currently retained, for diagnostics/tests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_unconfirmed_frame_predicts_and_freezes() {
        let mut queue = InputQueue::with_default_strategy();
        queue.add_input(Frame::new(0), Input::new(5));
        let (first, status) = queue.input_for(Frame::new(1));
        assert_eq!(status, InputStatus::Predicted);
        assert_eq!(first, Input::new(5));

        // Re-reading the same unconfirmed frame returns the frozen value,
        // even if a newer confirmed input would have predicted something
        // else.
        queue.add_input(Frame::new(2), Input::new(9));
        let (second, status) = queue.input_for(Frame::new(1));
        assert_eq!(status, InputStatus::Predicted);
        assert_eq!(second, Input::new(5));
    }

    #[test]
    fn mismatched_actual_input_sets_first_incorrect_frame() {
        let mut queue = InputQueue::with_default_strategy();
        queue.add_input(Frame::new(0), Input::new(1));
        let _ = queue.input_for(Frame::new(1)); // predicts Input::new(1)
        queue.add_input(Frame::new(1), Input::new(2)); // actual differs
        assert_eq!(queue.first_incorrect_frame(), Some(Frame::new(1)));
    }

    #[test]
    fn matching_actual_input_does_not_flag_incorrect() {
        let mut queue = InputQueue::with_default_strategy();
        queue.add_input(Frame::new(0), Input::new(1));
        let _ = queue.input_for(Frame::new(1));
        queue.add_input(Frame::new(1), Input::new(1));
        assert_eq!(queue.first_incorrect_frame(), None);
    }

    #[test]
    fn reset_prediction_clears_marker() {
        let mut queue = InputQueue::with_default_strategy();
        let _ = queue.input_for(Frame::new(0));
        queue.add_input(Frame::new(0), Input::new(7));
        assert!(queue.first_incorrect_frame().is_some());
        queue.reset_prediction();
        assert_eq!(queue.first_incorrect_frame(), None);
    }

    #[test]
    fn eviction_removes_old_entries_only() {
        let mut queue = InputQueue::with_default_strategy();
        for frame in 0..10 {
            queue.add_input(Frame::new(frame), Input::new(frame as u16));
        }
        queue.evict_before(Frame::new(5));
        assert_eq!(queue.len(), 5);
        assert!(queue.confirmed_input(Frame::new(4)).is_none());
        assert!(queue.confirmed_input(Frame::new(5)).is_some());
    }

    #[test]
    fn last_confirmed_frame_tracks_maximum() {
        let mut queue = InputQueue::with_default_strategy();
        queue.add_input(Frame::new(5), Input::NULL);
        queue.add_input(Frame::new(2), Input::NULL);
        assert_eq!(queue.last_confirmed_frame(), Frame::new(5));
    }
}
