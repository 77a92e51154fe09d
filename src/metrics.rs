//! Read-only rollback metrics (spec §4.8).
//!
//! Shaped after the teacher's `NetworkStats`: a plain data struct with a
//! `new()`/`Default` constructor and `#[must_use]` accessors, scoped here to
//! exactly the counters spec §4.8 names instead of network ping/bandwidth.
//! The controller holds the only `&mut MetricsSink`; callers only ever see
//! `&MetricsSink` through [`crate::controller::RollbackSession::metrics`].

use std::collections::VecDeque;
use std::fmt;

/// Input-lag samples beyond this count age out oldest-first (spec §4.8:
/// "a bounded (≤100 entries) ring of observed input-lag samples").
const MAX_INPUT_LAG_SAMPLES: usize = 100;

/// Running counters for one session's rollback activity.
///
/// Every field is read-only to external observers; only `controller.rs`
/// mutates a `MetricsSink`, via crate-private `record_*` methods.
#[derive(Debug, Clone)]
pub struct MetricsSink {
    rollbacks: u64,
    rollback_frames: u64,
    predicted_inputs_consumed: u64,
    input_lag_samples: VecDeque<u32>,
}

impl MetricsSink {
    /// All counters start at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed rollback of `depth` frames (spec §4.6 step 5:
    /// "rollbacks += 1, rollback_frames += current - T").
    pub(crate) fn record_rollback(&mut self, depth: u32) {
        self.rollbacks += 1;
        self.rollback_frames += u64::from(depth);
    }

    /// Records that one predicted (not confirmed) input was fed into
    /// `advance` for a frame.
    pub(crate) fn record_predicted_input(&mut self) {
        self.predicted_inputs_consumed += 1;
    }

    /// Records an observed input-lag sample in frames.
    pub(crate) fn record_input_lag(&mut self, lag_frames: u32) {
        if self.input_lag_samples.len() == MAX_INPUT_LAG_SAMPLES {
            self.input_lag_samples.pop_front();
        }
        self.input_lag_samples.push_back(lag_frames);
    }

    /// Total number of rollbacks triggered this session.
    #[must_use]
    pub const fn rollbacks(&self) -> u64 {
        self.rollbacks
    }

    /// Total number of frames resimulated across every rollback this
    /// session.
    #[must_use]
    pub const fn rollback_frames(&self) -> u64 {
        self.rollback_frames
    }

    /// Total number of predicted (rather than confirmed) inputs consumed
    /// by `advance` this session.
    #[must_use]
    pub const fn predicted_inputs_consumed(&self) -> u64 {
        self.predicted_inputs_consumed
    }

    /// The retained input-lag samples, oldest first.
    #[must_use]
    pub fn input_lag_samples(&self) -> impl ExactSizeIterator<Item = u32> + '_ {
        self.input_lag_samples.iter().copied()
    }

    /// Mean rollback depth, or `0.0` if no rollback has occurred yet.
    #[must_use]
    pub fn average_rollback_depth(&self) -> f64 {
        if self.rollbacks == 0 {
            0.0
        } else {
            self.rollback_frames as f64 / self.rollbacks as f64
        }
    }

    /// Mean observed input lag over the retained samples, or `0.0` if none
    /// have been recorded.
    #[must_use]
    pub fn average_input_lag(&self) -> f64 {
        if self.input_lag_samples.is_empty() {
            0.0
        } else {
            let sum: u64 = self.input_lag_samples.iter().map(|&s| u64::from(s)).sum();
            sum as f64 / self.input_lag_samples.len() as f64
        }
    }
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self {
            rollbacks: 0,
            rollback_frames: 0,
            predicted_inputs_consumed: 0,
            input_lag_samples: VecDeque::with_capacity(MAX_INPUT_LAG_SAMPLES),
        }
    }
}

#[cfg(feature = "json")]
impl MetricsSink {
    /// Serializes the current counters to a [`serde_json::Value`], for
    /// operator dashboards that consume JSON rather than the [`Display`]
    /// text line.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rollbacks": self.rollbacks,
            "rollback_frames": self.rollback_frames,
            "predicted_inputs_consumed": self.predicted_inputs_consumed,
            "average_rollback_depth": self.average_rollback_depth(),
            "average_input_lag": self.average_input_lag(),
        })
    }
}

impl fmt::Display for MetricsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rollbacks={} rollback_frames={} avg_depth={:.2} predicted_inputs={} avg_input_lag={:.2}",
            self.rollbacks,
            self.rollback_frames,
            self.average_rollback_depth(),
            self.predicted_inputs_consumed,
            self.average_input_lag()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sink_is_all_zero() {
        let metrics = MetricsSink::new();
        assert_eq!(metrics.rollbacks(), 0);
        assert_eq!(metrics.rollback_frames(), 0);
        assert_eq!(metrics.predicted_inputs_consumed(), 0);
        assert_eq!(metrics.average_input_lag(), 0.0);
        assert_eq!(metrics.average_rollback_depth(), 0.0);
    }

    #[test]
    fn record_rollback_updates_both_counters() {
        let mut metrics = MetricsSink::new();
        metrics.record_rollback(3);
        metrics.record_rollback(5);
        assert_eq!(metrics.rollbacks(), 2);
        assert_eq!(metrics.rollback_frames(), 8);
        assert!((metrics.average_rollback_depth() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn input_lag_ring_is_bounded() {
        let mut metrics = MetricsSink::new();
        for lag in 0..150 {
            metrics.record_input_lag(lag);
        }
        assert_eq!(metrics.input_lag_samples().len(), 100);
        // Oldest entries (0..50) aged out; first retained sample is 50.
        assert_eq!(metrics.input_lag_samples().next(), Some(50));
    }

    #[test]
    fn display_includes_all_counters() {
        let mut metrics = MetricsSink::new();
        metrics.record_rollback(2);
        metrics.record_predicted_input();
        let text = metrics.to_string();
        assert!(text.contains("rollbacks=1"));
        assert!(text.contains("predicted_inputs=1"));
    }

    #[cfg(feature = "json")]
    #[test]
    fn to_json_includes_rollback_count() {
        let mut metrics = MetricsSink::new();
        metrics.record_rollback(2);
        let value = metrics.to_json();
        assert_eq!(value["rollbacks"], 1);
    }
}
