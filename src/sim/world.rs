//! [`World`]: the concrete [`crate::sim::GameHarness`] implementation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{RollbackError, RollbackResult};
use crate::fixed::Fixed;
use crate::sim::entity::{buttons, Entity, EntityId, EntityKind, FrameInputs, Input, PlayerState, Vector};
use crate::sim::rng::DeterministicRng;
use crate::sim::rules::{Rules, SimContext};
use crate::sim::GameHarness;
use crate::{Frame, PeerId};

/// Movement speed, in fixed-point world units per tick.
const MOVE_SPEED: Fixed = Fixed::from_int(4);
/// Multiplicative velocity decay applied every tick (~0.9).
const FRICTION: Fixed = Fixed::from_raw(58_982);
/// Inclusive lower world bound on both axes.
const WORLD_MIN: Fixed = Fixed::from_int(0);
/// Inclusive upper world bound on both axes.
const WORLD_MAX: Fixed = Fixed::from_int(800);
/// Default collision radius for a freshly spawned player entity.
const PLAYER_RADIUS: Fixed = Fixed::from_int(16);
/// Default starting lives.
const STARTING_LIVES: u32 = 3;

fn velocity_from_input(input: Input) -> Vector {
    let mut dx = 0_i32;
    let mut dy = 0_i32;
    if input.is_set(buttons::LEFT) {
        dx -= 1;
    }
    if input.is_set(buttons::RIGHT) {
        dx += 1;
    }
    if input.is_set(buttons::UP) {
        dy -= 1;
    }
    if input.is_set(buttons::DOWN) {
        dy += 1;
    }
    if dx == 0 && dy == 0 {
        return Vector::ZERO;
    }
    let raw = Vector::new(Fixed::from_int(dx), Fixed::from_int(dy));
    if dx != 0 && dy != 0 {
        // Diagonal: normalize to MOVE_SPEED via fixed-point sqrt (spec §4.3
        // step 1), rather than letting diagonal movement be faster by a
        // factor of sqrt(2).
        let magnitude = raw.length_squared().sqrt();
        Vector::new(
            raw.x.mul(MOVE_SPEED).div(magnitude).unwrap_or(Fixed::ZERO),
            raw.y.mul(MOVE_SPEED).div(magnitude).unwrap_or(Fixed::ZERO),
        )
    } else {
        Vector::new(raw.x.mul(MOVE_SPEED), raw.y.mul(MOVE_SPEED))
    }
}

/// Read-only, render-ready view of [`World`]'s current entities (spec §6:
/// positions converted to real numbers at the boundary).
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// The frame this view was captured at.
    pub frame: Frame,
    /// Every entity still in the simulation.
    pub entities: Vec<RenderEntity>,
}

/// One entity's render-ready state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderEntity {
    /// The entity's stable id.
    pub id: EntityId,
    /// What kind of entity this is.
    pub kind: EntityKind,
    /// Horizontal position as a real number.
    pub x: f32,
    /// Vertical position as a real number.
    pub y: f32,
}

#[derive(Serialize, Deserialize)]
struct WorldSnapshot<S> {
    frame: i32,
    next_entity_id: u32,
    rng_state: u32,
    entities: BTreeMap<EntityId, Entity>,
    positions: BTreeMap<EntityId, Vector>,
    velocities: BTreeMap<EntityId, Vector>,
    players: BTreeMap<PeerId, PlayerState>,
    rules_state: S,
}

/// The concrete fixed-tick simulation: entity/position/velocity/player
/// tables plus a deterministic PRNG, driven one frame at a time by
/// [`GameHarness::advance`].
///
/// Generic only over [`Rules`] — the table layout itself is fixed by the
/// spec's data model, so a new game is written by implementing `Rules`, not
/// by reimplementing `World`.
pub struct World<R: Rules> {
    frame: Frame,
    next_entity_id: u32,
    rng: DeterministicRng,
    entities: BTreeMap<EntityId, Entity>,
    positions: BTreeMap<EntityId, Vector>,
    velocities: BTreeMap<EntityId, Vector>,
    players: BTreeMap<PeerId, PlayerState>,
    rules: R,
    rules_state: R::State,
}

impl<R: Rules> World<R> {
    /// Builds a fresh world, spawning one player entity per peer at evenly
    /// spaced starting positions (spec §3: "a player entity is created at
    /// session initialization for each participant").
    #[must_use]
    pub fn new(mut rules: R, peers: &[PeerId], seed: u32) -> Self {
        let mut sorted_peers = peers.to_vec();
        sorted_peers.sort();

        let mut entities = BTreeMap::new();
        let mut positions = BTreeMap::new();
        let mut velocities = BTreeMap::new();
        let mut players = BTreeMap::new();
        let mut next_entity_id = 0_u32;

        for (index, peer) in sorted_peers.iter().enumerate() {
            let id = EntityId::new(next_entity_id);
            next_entity_id += 1;
            entities.insert(
                id,
                Entity {
                    id,
                    kind: EntityKind::Player,
                    alive: true,
                    radius: PLAYER_RADIUS,
                },
            );
            let start_x = Fixed::from_int(100 + 100 * index as i32);
            let start_y = Fixed::from_int(300);
            positions.insert(id, Vector::new(start_x, start_y));
            velocities.insert(id, Vector::ZERO);
            players.insert(
                peer.clone(),
                PlayerState {
                    entity_id: id,
                    score: 0,
                    lives: STARTING_LIVES,
                    input: Input::NULL,
                },
            );
        }

        let mut rules_state = R::State::default();
        {
            let mut ctx = SimContext {
                entities: &mut entities,
                positions: &mut positions,
                velocities: &mut velocities,
                next_entity_id: &mut next_entity_id,
            };
            rules.on_initialize(&mut rules_state, &mut ctx);
        }

        Self {
            frame: Frame::new(0),
            next_entity_id,
            rng: DeterministicRng::new(seed),
            entities,
            positions,
            velocities,
            players,
            rules,
            rules_state,
        }
    }

    /// The frame this world has most recently completed.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// Read access to the deterministic PRNG, for `Rules` implementations
    /// driven from outside `advance` (e.g. in tests).
    pub fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Read-only snapshot of current entity positions, for the render
    /// boundary (converted to real numbers by the caller via
    /// [`Fixed::to_f32`]).
    #[must_use]
    pub fn positions(&self) -> &BTreeMap<EntityId, Vector> {
        &self.positions
    }

    /// Read-only view of the player table.
    #[must_use]
    pub fn players(&self) -> &BTreeMap<PeerId, PlayerState> {
        &self.players
    }

}

impl<R: Rules> GameHarness for World<R> {
    fn save_state(&self) -> Vec<u8> {
        let snapshot = WorldSnapshot {
            frame: self.frame.as_i32(),
            next_entity_id: self.next_entity_id,
            rng_state: self.rng.state(),
            entities: self.entities.clone(),
            positions: self.positions.clone(),
            velocities: self.velocities.clone(),
            players: self.players.clone(),
            rules_state: self.rules.on_save_state(&self.rules_state),
        };
        bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .expect("world snapshot is plain owned data and always encodes")
    }

    fn load_state(&mut self, blob: &[u8]) -> RollbackResult<()> {
        let (snapshot, _): (WorldSnapshot<R::State>, usize) =
            bincode::serde::decode_from_slice(blob, bincode::config::standard()).map_err(|err| {
                RollbackError::StateCorrupt {
                    reason: err.to_string(),
                }
            })?;

        self.frame = Frame::new(snapshot.frame);
        self.next_entity_id = snapshot.next_entity_id;
        self.rng.set_state(snapshot.rng_state);
        self.entities = snapshot.entities;
        self.positions = snapshot.positions;
        self.velocities = snapshot.velocities;
        self.players = snapshot.players;
        self.rules_state = snapshot.rules_state;
        self.rules.on_load_state(&self.rules_state);
        Ok(())
    }

    fn advance(&mut self, inputs: &FrameInputs) -> RollbackResult<()> {
        // Step 1: apply input to player velocity, ascending peer-id order
        // (`BTreeMap` already iterates in key order). Rollback games rarely
        // exceed a handful of participants, so this per-tick scratch list
        // stays on the stack via `SmallVec` instead of heap-allocating a
        // `Vec` every single frame.
        let player_actions: SmallVec<[(PeerId, EntityId, Input); 8]> = self
            .players
            .iter()
            .map(|(peer, player)| {
                let input = inputs.get(peer).copied().unwrap_or(Input::NULL);
                (peer.clone(), player.entity_id, input)
            })
            .collect();

        for (peer, player) in self.players.iter_mut() {
            let input = inputs.get(peer).copied().unwrap_or(Input::NULL);
            player.input = input;
            if let Some(slot) = self.velocities.get_mut(&player.entity_id) {
                *slot = velocity_from_input(input);
            }
        }

        for (peer, entity_id, input) in &player_actions {
            let mut ctx = SimContext {
                entities: &mut self.entities,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
                next_entity_id: &mut self.next_entity_id,
            };
            self.rules
                .on_player_action(&mut self.rules_state, peer, *entity_id, *input, &mut ctx);
        }

        // Step 2: integrate position, apply friction, clamp to bounds.
        let ids: Vec<EntityId> = self.positions.keys().copied().collect();
        for id in &ids {
            let velocity = self.velocities.get(id).copied().unwrap_or(Vector::ZERO);
            let Some(position) = self.positions.get_mut(id) else {
                continue;
            };
            *position = *position + velocity;

            let mut next_velocity = Vector::new(velocity.x.mul(FRICTION), velocity.y.mul(FRICTION));
            if position.x < WORLD_MIN {
                position.x = WORLD_MIN;
                next_velocity.x = Fixed::ZERO;
            } else if position.x > WORLD_MAX {
                position.x = WORLD_MAX;
                next_velocity.x = Fixed::ZERO;
            }
            if position.y < WORLD_MIN {
                position.y = WORLD_MIN;
                next_velocity.y = Fixed::ZERO;
            } else if position.y > WORLD_MAX {
                position.y = WORLD_MAX;
                next_velocity.y = Fixed::ZERO;
            }

            if let Some(slot) = self.velocities.get_mut(id) {
                *slot = next_velocity;
            }
        }

        // Step 3: ascending-id pairwise collision detection.
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let a = ids[i];
                let b = ids[j];
                let (Some(pos_a), Some(pos_b)) =
                    (self.positions.get(&a).copied(), self.positions.get(&b).copied())
                else {
                    continue;
                };
                let (Some(radius_a), Some(radius_b)) = (
                    self.entities.get(&a).map(|e| e.radius),
                    self.entities.get(&b).map(|e| e.radius),
                ) else {
                    continue;
                };
                let radius_sum = radius_a.add(radius_b);
                let distance_sq = (pos_b - pos_a).length_squared();
                if distance_sq <= radius_sum.mul(radius_sum) {
                    let mut ctx = SimContext {
                        entities: &mut self.entities,
                        positions: &mut self.positions,
                        velocities: &mut self.velocities,
                        next_entity_id: &mut self.next_entity_id,
                    };
                    self.rules.on_collision(&mut self.rules_state, a, b, &mut ctx);
                }
            }
        }

        // Step 4: general game-logic hook, after collisions and before dead
        // entities are culled.
        {
            let mut ctx = SimContext {
                entities: &mut self.entities,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
                next_entity_id: &mut self.next_entity_id,
            };
            self.rules.update_game_logic(&mut self.rules_state, &mut ctx);
        }

        // Step 5: remove entities marked dead during this tick, ascending
        // id order.
        let dead: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| !entity.alive)
            .map(|(&id, _)| id)
            .collect();
        for id in dead {
            self.entities.remove(&id);
            self.positions.remove(&id);
            self.velocities.remove(&id);
        }

        self.frame += 1;
        Ok(())
    }

    fn checksum(&self) -> u32 {
        let mut hash = self.frame.as_i32() as u32;
        for position in self.positions.values() {
            hash ^= position.x.to_raw() as u32;
            hash ^= position.y.to_raw() as u32;
        }
        for player in self.players.values() {
            hash ^= player.score as u32;
        }
        hash ^= self.rules.on_checksum(&self.rules_state);
        hash
    }

    type RenderState = RenderState;

    fn render_state(&self) -> RenderState {
        RenderState {
            frame: self.frame,
            entities: self
                .positions
                .iter()
                .filter_map(|(&id, pos)| {
                    self.entities.get(&id).map(|entity| RenderEntity {
                        id,
                        kind: entity.kind,
                        x: pos.x.to_f32(),
                        y: pos.y.to_f32(),
                    })
                })
                .collect(),
        }
    }
}
