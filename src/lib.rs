//! # lockframe
//!
//! A deterministic rollback simulation core for peer-to-peer real-time
//! multiplayer games: GGPO-style lockstep simulation with input prediction
//! and rollback, a fixed-point deterministic simulation harness, and a
//! desync-detection protocol built on periodic state hashing.
//!
//! Lobby/matchmaking, the peer-to-peer transport byte pipe, and rendering are
//! external collaborators — see [`transport`] for the narrow adapter surface
//! this crate expects from the transport layer.
//!
//! ```ignore
//! use lockframe::prelude::*;
//!
//! let config = SessionConfig::builder().build()?;
//! let mut session: RollbackSession<MyHarness> = RollbackSession::new(config);
//! session.initialize(harness, local_peer)?;
//! session.add_peer(remote_peer, 2)?;
//! session.start()?;
//! loop {
//!     session.tick(&mut transport)?;
//! }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt;

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod fixed;
pub mod input_queue;
pub mod metrics;
pub mod prelude;
pub mod sim;
pub mod sync_layer;
pub mod transport;

pub use config::SessionConfig;
pub use controller::{RollbackSession, SessionState};
pub use error::{RollbackError, RollbackResult};
pub use metrics::MetricsSink;

/// Internally, -1 represents no frame / invalid frame.
pub const NULL_FRAME: i32 = -1;

/// A single discrete step of simulation.
///
/// Frame numbers start at 0 and increase monotonically. The sentinel
/// [`Frame::NULL`] represents "no frame" / "uninitialized" and must never be
/// treated as a valid simulation step.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct Frame(i32);

impl Frame {
    /// The null frame constant.
    pub const NULL: Frame = Frame(NULL_FRAME);

    /// Creates a new `Frame` from a raw step count. Does not validate.
    #[inline]
    #[must_use]
    pub const fn new(frame: i32) -> Self {
        Frame(frame)
    }

    /// Returns the underlying `i32`.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// `true` if this is [`Frame::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_FRAME
    }

    /// `true` if this frame is non-negative (a real simulation step).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "NULL_FRAME")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl std::ops::Add<i32> for Frame {
    type Output = Frame;
    #[inline]
    fn add(self, rhs: i32) -> Self::Output {
        Frame(self.0 + rhs)
    }
}

impl std::ops::AddAssign<i32> for Frame {
    #[inline]
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs;
    }
}

impl std::ops::Sub<i32> for Frame {
    type Output = Frame;
    #[inline]
    fn sub(self, rhs: i32) -> Self::Output {
        Frame(self.0 - rhs)
    }
}

impl std::ops::Sub<Frame> for Frame {
    type Output = i32;
    #[inline]
    fn sub(self, rhs: Frame) -> Self::Output {
        self.0 - rhs.0
    }
}

impl std::ops::Rem<i32> for Frame {
    type Output = i32;
    #[inline]
    fn rem(self, rhs: i32) -> Self::Output {
        self.0 % rhs
    }
}

impl From<i32> for Frame {
    #[inline]
    fn from(value: i32) -> Self {
        Frame(value)
    }
}

impl From<Frame> for i32 {
    #[inline]
    fn from(frame: Frame) -> Self {
        frame.0
    }
}

impl PartialEq<i32> for Frame {
    #[inline]
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i32> for Frame {
    #[inline]
    fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

/// An opaque, totally ordered peer identifier, stable across the match.
///
/// Lobby/matchmaking (out of scope for this crate) is responsible for
/// handing out stable peer identities; the rollback core only needs to
/// compare and order them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PeerId(Vec<u8>);

impl PeerId {
    /// Creates a peer id from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

/// Whether an input observed for a given frame was the peer's actual input
/// or a stand-in prediction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputStatus {
    /// The input is the peer's actually-received value for this frame.
    Confirmed,
    /// The input is a prediction standing in for an unreceived value.
    Predicted,
}

/// Desync detection by periodic checksum exchange.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DesyncDetection {
    /// Desync detection is enabled with the given frame interval between
    /// checksum broadcasts. `0` is equivalent to [`DesyncDetection::Off`].
    On {
        /// Frames between checksum broadcasts.
        interval: u32,
    },
    /// Desync detection is disabled; no sync-test messages are sent.
    Off,
}

/// Notifications the controller surfaces to the caller. Purely informational
/// except where noted; handling them is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RollbackEvent {
    /// A rollback was triggered and completed.
    RolledBack {
        /// The frame resimulation started from (inclusive of the loaded snapshot).
        from: Frame,
        /// The frame resimulation brought the session back up to.
        to: Frame,
    },
    /// The controller detected a state checksum mismatch with a peer. The
    /// session keeps running; this is reporting only (see spec Non-goals —
    /// there is no automatic recovery from a desync).
    DesyncDetected {
        /// The peer whose checksum disagreed.
        peer: PeerId,
        /// The frame at which the checksums were compared.
        frame: Frame,
    },
    /// A peer was removed from the session (either explicitly or because the
    /// transport reported the peer as lost).
    PeerLost {
        /// The peer that was removed.
        peer: PeerId,
    },
}
