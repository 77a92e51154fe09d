//! Error types for the rollback core.
//!
//! Every error kind in spec §7's policy table gets exactly one
//! [`RollbackError`] variant. Variants carry structured fields instead of
//! formatted strings so construction on hot paths (e.g. a dropped stale
//! input, checked every tick) never allocates.

use std::fmt;

use crate::{Frame, PeerId};

/// Convenience alias for `Result<T, RollbackError>`.
pub type RollbackResult<T> = Result<T, RollbackError>;

/// Errors produced by the rollback core.
///
/// Fatal variants ([`RollbackError::RollbackMiss`], [`RollbackError::StateCorrupt`],
/// [`RollbackError::ArithmeticError`]) move the session into
/// [`crate::SessionState::Fatal`] — the core does not attempt to recover from
/// them, per spec §7: they indicate a programming error in snapshot cadence
/// or state serialization, not a condition the session can paper over.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RollbackError {
    /// `initialize` was called on a session that has already been initialized.
    AlreadyInitialized,
    /// A method that requires initialization was called before `initialize`.
    NotInitialized,
    /// An operation that requires a running session was attempted while idle
    /// or fatal.
    NotRunning,
    /// A peer identifier was not found in the peer table.
    UnknownPeer {
        /// The peer that was looked up.
        peer: PeerId,
    },
    /// A peer was registered twice.
    DuplicatePeer {
        /// The peer that was already present.
        peer: PeerId,
    },
    /// A configuration value failed validation at `build()` time.
    InvalidConfig {
        /// The field that failed validation.
        field: &'static str,
        /// Why it failed.
        reason: &'static str,
    },
    /// Received input whose frame is older than `current - max_rollback`.
    /// Logged and dropped, per spec §7 — this variant exists so callers that
    /// want to observe drops for diagnostics can do so.
    StaleInput {
        /// The frame the input was for.
        frame: Frame,
        /// The current frame at drop time.
        current_frame: Frame,
    },
    /// Received input whose frame is further ahead than `current +
    /// max_prediction`. Retained in the receive queue, not applied yet.
    FutureInput {
        /// The frame the input was for.
        frame: Frame,
        /// The current frame at observation time.
        current_frame: Frame,
    },
    /// A rollback target precedes every retained snapshot. Fatal: the
    /// session cannot resimulate from a state it no longer has.
    RollbackMiss {
        /// The frame rollback needed to resimulate from.
        target: Frame,
        /// The oldest frame still present in the snapshot ring.
        oldest_retained: Frame,
    },
    /// `load_state` was handed a blob that failed to deserialize or whose
    /// frame did not match the slot it was loaded from. Fatal.
    StateCorrupt {
        /// Description of what about the blob was invalid.
        reason: String,
    },
    /// A fixed-point division by zero occurred inside a simulation callback.
    /// Per spec §7, the controller treats this as a callback failure and
    /// becomes fatal.
    ArithmeticError,
}

impl fmt::Display for RollbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInitialized => write!(f, "session already initialized"),
            Self::NotInitialized => write!(f, "session not initialized"),
            Self::NotRunning => write!(f, "session not running"),
            Self::UnknownPeer { peer } => write!(f, "unknown peer {peer}"),
            Self::DuplicatePeer { peer } => write!(f, "peer {peer} already registered"),
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid config field `{field}`: {reason}")
            }
            Self::StaleInput { frame, current_frame } => write!(
                f,
                "dropped stale input for frame {frame} (current frame {current_frame})"
            ),
            Self::FutureInput { frame, current_frame } => write!(
                f,
                "input for frame {frame} is beyond the prediction window (current frame {current_frame})"
            ),
            Self::RollbackMiss { target, oldest_retained } => write!(
                f,
                "rollback target {target} precedes oldest retained snapshot {oldest_retained}"
            ),
            Self::StateCorrupt { reason } => write!(f, "state corrupt: {reason}"),
            Self::ArithmeticError => write!(f, "arithmetic error in simulation callback"),
        }
    }
}

impl std::error::Error for RollbackError {}
