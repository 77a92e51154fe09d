//! The concrete deterministic simulation harness: entity/position/velocity
//! tables, a player table, a deterministic PRNG, and the four-operation
//! contract the rollback controller drives every tick.
//!
//! Modeled after the teacher crate's own example game (a graphical demo
//! outside this crate's scope, not carried over) and generalized onto the
//! fixed-point kernel: entity state lives in ordered tables keyed by
//! [`entity::EntityId`], and a [`rules::Rules`] implementation plugs in
//! game-specific behavior without the harness itself needing to be generic
//! over an external session `Config`.

pub mod entity;
pub mod rng;
pub mod rules;
pub mod world;

pub use entity::{buttons, Entity, EntityId, EntityKind, FrameInputs, Input, PlayerState, Vector};
pub use rng::DeterministicRng;
pub use rules::{NoRules, Rules, SimContext};
pub use world::{RenderEntity, RenderState, World};

use crate::error::RollbackResult;

/// The four-operation contract the rollback controller drives every tick
/// (spec §4.3).
///
/// Implemented concretely by [`World`] for this crate's entity/player
/// model. Unlike the teacher's `Config`-generic session types, this trait is
/// not itself generic over an external state type — the simulation's
/// entity/player model is fixed by the spec, so implementers customize
/// behavior through [`Rules`] instead of through this trait.
pub trait GameHarness {
    /// Captures a deep, self-contained copy of every observable piece of
    /// state as an opaque byte blob (spec §4.3, design notes "opaque state
    /// blobs").
    #[must_use]
    fn save_state(&self) -> Vec<u8>;

    /// Replaces all observable state with the blob's contents. Fails with
    /// [`crate::error::RollbackError::StateCorrupt`] if the blob doesn't
    /// decode or doesn't match the harness's expected shape.
    fn load_state(&mut self, blob: &[u8]) -> RollbackResult<()>;

    /// Advances the simulation by one frame given this frame's per-peer
    /// inputs.
    fn advance(&mut self, inputs: &FrameInputs) -> RollbackResult<()>;

    /// A 32-bit value folding every field that participates in the
    /// checksum, consistent across any two harnesses holding bit-identical
    /// state (spec §4.3).
    #[must_use]
    fn checksum(&self) -> u32;

    /// The render-ready view type this harness produces (spec §6: "a
    /// read-only view of the current simulation suitable for presentation,
    /// with positions converted to real numbers at the boundary").
    type RenderState;

    /// Produces a read-only, render-ready snapshot of the current
    /// simulation. Never mutates the harness.
    #[must_use]
    fn render_state(&self) -> Self::RenderState;
}
