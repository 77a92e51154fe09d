//! Convenience re-exports for consumers of this crate.
//!
//! Mirrors the teacher's own `prelude` module: `use lockframe::prelude::*;`
//! pulls in the types a caller wiring up a session needs without reaching
//! into every submodule by hand.

pub use crate::clock::{Clock, FixedTimestepLoop, ManualClock, SystemClock};
pub use crate::config::{SessionBuilder, SessionConfig};
pub use crate::controller::{RollbackSession, SessionState};
pub use crate::error::{RollbackError, RollbackResult};
pub use crate::metrics::MetricsSink;
pub use crate::sim::{
    buttons, DeterministicRng, Entity, EntityId, EntityKind, FrameInputs, GameHarness, Input, NoRules,
    PlayerState, RenderEntity, RenderState, Rules, SimContext, Vector, World,
};
pub use crate::transport::{LoopbackTransport, PeerTransport, TransportEvent};
pub use crate::{DesyncDetection, Frame, InputStatus, PeerId, RollbackEvent};
