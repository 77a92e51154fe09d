//! Strategies for standing in a predicted input for a peer whose actual
//! input for a given frame has not yet arrived.
//!
//! Adapted from the teacher's `input_queue::prediction` module: the trait
//! shape and the two stock strategies are kept, narrowed to this crate's
//! concrete [`Input`](crate::sim::Input) type.

use crate::sim::Input;

/// Produces the input a peer is assumed to hold for a frame that has not
/// yet been confirmed.
///
/// Both stock implementations below are deterministic given the same
/// `last_confirmed` value, which matters: `last_confirmed` is itself
/// network-synchronized (it only changes when an actual input arrives), so
/// every peer computes the same prediction for the same frame.
pub trait PredictionStrategy: Send + Sync {
    /// Returns the input to use in place of an unconfirmed one.
    /// `last_confirmed` is the peer's most recently received actual input,
    /// or `None` if none has arrived yet this session.
    fn predict(&self, last_confirmed: Option<Input>) -> Input;
}

/// Predicts that a peer continues holding their last known input — the
/// standard GGPO-style prediction, good for games dominated by held
/// movement keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatLastConfirmed;

impl PredictionStrategy for RepeatLastConfirmed {
    fn predict(&self, last_confirmed: Option<Input>) -> Input {
        last_confirmed.unwrap_or(Input::NULL)
    }
}

/// Predicts the null input regardless of history. Simpler, and sometimes a
/// better fit for games where holding a stale button is more disruptive
/// than a blank frame (e.g. an attack button that shouldn't repeat).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankPrediction;

impl PredictionStrategy for BlankPrediction {
    fn predict(&self, _last_confirmed: Option<Input>) -> Input {
        Input::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_last_confirmed_echoes_input() {
        let strategy = RepeatLastConfirmed;
        let input = Input::new(1);
        assert_eq!(strategy.predict(Some(input)), input);
    }

    #[test]
    fn repeat_last_confirmed_falls_back_to_null() {
        let strategy = RepeatLastConfirmed;
        assert_eq!(strategy.predict(None), Input::NULL);
    }

    #[test]
    fn blank_prediction_always_null() {
        let strategy = BlankPrediction;
        assert_eq!(strategy.predict(Some(Input::new(0xFF))), Input::NULL);
        assert_eq!(strategy.predict(None), Input::NULL);
    }
}
