//! Session configuration (spec §6) and its validating builder.
//!
//! Mirrors the teacher's `sessions::builder` pattern: a fluent builder
//! validates every constant at `build()` time and returns
//! [`RollbackError::InvalidConfig`] rather than letting a bad value reach a
//! running session.

use crate::error::{RollbackError, RollbackResult};
use crate::DesyncDetection;

/// The six configuration constants spec §6 recognizes, fixed for the
/// lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    max_rollback_frames: u32,
    input_delay_frames: u32,
    max_prediction_frames: u32,
    sync_test_interval: u32,
    frame_rate: u32,
    snapshot_interval: u32,
}

impl SessionConfig {
    /// Starts a [`SessionBuilder`] seeded with spec §6's defaults.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Upper bound on resimulation depth, and the basis for the snapshot
    /// ring's length.
    #[must_use]
    pub const fn max_rollback_frames(&self) -> u32 {
        self.max_rollback_frames
    }

    /// Frames of local input delay before a captured input is applied.
    #[must_use]
    pub const fn input_delay_frames(&self) -> u32 {
        self.input_delay_frames
    }

    /// Upper bound on unconfirmed future frames before an incoming remote
    /// input is left in the receive queue rather than applied.
    #[must_use]
    pub const fn max_prediction_frames(&self) -> u32 {
        self.max_prediction_frames
    }

    /// Frames between snapshots (spec default 3; prefer 1 unless state
    /// size makes that prohibitive — see spec §9's open question and
    /// `DESIGN.md`).
    #[must_use]
    pub const fn snapshot_interval(&self) -> u32 {
        self.snapshot_interval
    }

    /// Target ticks per real second for the fixed-timestep loop.
    #[must_use]
    pub const fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Whether desync detection is enabled, and at what cadence.
    #[must_use]
    pub const fn desync_detection(&self) -> DesyncDetection {
        if self.sync_test_interval == 0 {
            DesyncDetection::Off
        } else {
            DesyncDetection::On {
                interval: self.sync_test_interval,
            }
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rollback_frames: 8,
            input_delay_frames: 2,
            max_prediction_frames: 8,
            sync_test_interval: 60,
            frame_rate: 60,
            snapshot_interval: 3,
        }
    }
}

/// Fluent, validating builder for [`SessionConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }
}

impl SessionBuilder {
    /// Sets `max_rollback_frames`.
    #[must_use]
    pub const fn max_rollback_frames(mut self, frames: u32) -> Self {
        self.config.max_rollback_frames = frames;
        self
    }

    /// Sets `input_delay_frames`.
    #[must_use]
    pub const fn input_delay_frames(mut self, frames: u32) -> Self {
        self.config.input_delay_frames = frames;
        self
    }

    /// Sets `max_prediction_frames`.
    #[must_use]
    pub const fn max_prediction_frames(mut self, frames: u32) -> Self {
        self.config.max_prediction_frames = frames;
        self
    }

    /// Sets `sync_test_interval`. `0` disables desync detection.
    #[must_use]
    pub const fn sync_test_interval(mut self, frames: u32) -> Self {
        self.config.sync_test_interval = frames;
        self
    }

    /// Sets `frame_rate`.
    #[must_use]
    pub const fn frame_rate(mut self, ticks_per_second: u32) -> Self {
        self.config.frame_rate = ticks_per_second;
        self
    }

    /// Sets `snapshot_interval`.
    #[must_use]
    pub const fn snapshot_interval(mut self, frames: u32) -> Self {
        self.config.snapshot_interval = frames;
        self
    }

    /// Validates every constant and produces a [`SessionConfig`], or the
    /// first [`RollbackError::InvalidConfig`] encountered.
    pub fn build(self) -> RollbackResult<SessionConfig> {
        let config = self.config;
        if config.max_rollback_frames == 0 {
            return Err(RollbackError::InvalidConfig {
                field: "max_rollback_frames",
                reason: "must be at least 1",
            });
        }
        if config.max_prediction_frames == 0 {
            return Err(RollbackError::InvalidConfig {
                field: "max_prediction_frames",
                reason: "must be at least 1",
            });
        }
        if config.frame_rate == 0 {
            return Err(RollbackError::InvalidConfig {
                field: "frame_rate",
                reason: "must be at least 1",
            });
        }
        if config.snapshot_interval == 0 {
            return Err(RollbackError::InvalidConfig {
                field: "snapshot_interval",
                reason: "must be at least 1 (use sync_test_interval = 0 to disable desync detection, not this)",
            });
        }
        Ok(config)
    }
}
