//! Game-specific hooks invoked by the simulation harness.
//!
//! Spec design notes §9: the JavaScript original overrides methods on a base
//! class; a systems language models that as an explicit trait instead. The
//! rollback controller ([`crate::controller::RollbackSession`]) depends only
//! on [`crate::sim::GameHarness`], never on this trait directly — `Rules` is
//! [`crate::sim::World`]'s concern alone.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::sim::entity::{Entity, EntityId, EntityKind, Vector};
use crate::fixed::Fixed;
use crate::PeerId;

/// A mutable view over the entity/position/velocity tables, handed to
/// `Rules` hooks so they can spawn, inspect, and remove entities without
/// depending on `World<Self>` (which would require `World` to be generic
/// over a trait that names `World` itself).
pub struct SimContext<'a> {
    pub(crate) entities: &'a mut BTreeMap<EntityId, Entity>,
    pub(crate) positions: &'a mut BTreeMap<EntityId, Vector>,
    pub(crate) velocities: &'a mut BTreeMap<EntityId, Vector>,
    pub(crate) next_entity_id: &'a mut u32,
}

impl SimContext<'_> {
    /// Spawns a new entity and returns its id. The harness assigns the next
    /// sequential id; callers never choose one, preserving the "ascending
    /// entity-id order" iteration invariant the harness relies on for
    /// determinism.
    pub fn spawn(&mut self, kind: EntityKind, position: Vector, radius: Fixed) -> EntityId {
        let id = EntityId::new(*self.next_entity_id);
        *self.next_entity_id += 1;
        self.entities.insert(
            id,
            Entity {
                id,
                kind,
                alive: true,
                radius,
            },
        );
        self.positions.insert(id, position);
        self.velocities.insert(id, Vector::ZERO);
        id
    }

    /// Marks an entity dead. It is removed at the end of the current tick
    /// (spec §4.3 step 4), not immediately — a hook that kills an entity
    /// mid-iteration must not invalidate other hooks still iterating the
    /// same tables.
    pub fn kill(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.alive = false;
        }
    }

    /// Reads an entity's current position, if it still exists.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<Vector> {
        self.positions.get(&id).copied()
    }

    /// Reads an entity's current velocity, if it still exists.
    #[must_use]
    pub fn velocity(&self, id: EntityId) -> Option<Vector> {
        self.velocities.get(&id).copied()
    }

    /// Overwrites an entity's velocity, if it still exists.
    pub fn set_velocity(&mut self, id: EntityId, velocity: Vector) {
        if let Some(slot) = self.velocities.get_mut(&id) {
            *slot = velocity;
        }
    }
}

/// Explicit game-rules hooks, replacing the "subclass a base class and
/// override" pattern of the source this spec was distilled from.
///
/// Every method has a no-op default; implement only the hooks your game
/// needs. `State` is the rules-specific state folded into save/load/checksum
/// alongside the harness's own entity/position/velocity/player tables.
pub trait Rules {
    /// Rules-specific state, snapshotted and restored alongside the rest of
    /// the simulation.
    type State: Clone + Default + Serialize + DeserializeOwned;

    /// Called once when the harness is constructed, before any ticks run.
    fn on_initialize(&mut self, _state: &mut Self::State, _ctx: &mut SimContext<'_>) {}

    /// Called once per player, in ascending peer-id order, after the
    /// harness has applied that player's input to their entity's velocity
    /// (spec §4.3 step 1) but before integration runs.
    fn on_player_action(
        &mut self,
        _state: &mut Self::State,
        _peer: &PeerId,
        _entity: EntityId,
        _input: crate::sim::entity::Input,
        _ctx: &mut SimContext<'_>,
    ) {
    }

    /// Called for each overlapping entity pair, `a.id < b.id`, detected in
    /// step 3. Collision response (bouncing, damage, destruction) belongs
    /// here.
    fn on_collision(&mut self, _state: &mut Self::State, _a: EntityId, _b: EntityId, _ctx: &mut SimContext<'_>) {}

    /// Called once per tick after collision detection and before dead
    /// entities are removed — the harness's general "run game rules" step.
    fn update_game_logic(&mut self, _state: &mut Self::State, _ctx: &mut SimContext<'_>) {}

    /// Produces the deep copy of rules state stored in a snapshot. The
    /// default clones `state` directly, which is correct as long as `State`
    /// owns everything it references (spec design notes: "opaque state
    /// blobs... deep copy... sharing with live state is a defect").
    #[must_use]
    fn on_save_state(&self, state: &Self::State) -> Self::State {
        state.clone()
    }

    /// Called after a snapshot's rules state has replaced the live state,
    /// giving the implementation a chance to react (e.g. rebuild a
    /// derived cache). The default does nothing.
    fn on_load_state(&mut self, _state: &Self::State) {}

    /// Rules-specific contribution folded into the harness checksum. The
    /// default contributes nothing.
    #[must_use]
    fn on_checksum(&self, _state: &Self::State) -> u32 {
        0
    }
}

/// A `Rules` implementation with no game-specific behavior: movement,
/// integration, and collision detection run, but nothing reacts to them.
/// Useful as a baseline for testing the harness in isolation.
#[derive(Debug, Default)]
pub struct NoRules;

impl Rules for NoRules {
    type State = ();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rules_checksum_contribution_is_zero() {
        let rules = NoRules;
        assert_eq!(rules.on_checksum(&()), 0);
    }
}
