//! A single interior-mutable snapshot slot.
//!
//! Adapted from the teacher's `sync_layer::game_state_cell`: the same
//! `Arc<parking_lot::Mutex<_>>` shape, narrowed from an arbitrary generic
//! state type to the opaque byte blob this spec's data model calls for
//! (§3: "save produces an opaque blob"). The teacher's `#[cfg(loom)]`
//! alternate-mutex branches (concurrency-model formal testing) are not
//! carried over — this crate's snapshot ring is only ever touched from the
//! single cooperative simulation timeline (spec §5), so loom's
//! interleaving exploration has nothing to verify here.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::Frame;

struct GameState {
    frame: Frame,
    data: Option<Vec<u8>>,
    checksum: u32,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            frame: Frame::NULL,
            data: None,
            checksum: 0,
        }
    }
}

/// One slot of the snapshot ring: a frame number, an opaque state blob, and
/// its checksum (spec §3's "Snapshot" entity).
///
/// Cloning a `GameStateCell` clones the handle, not the data — both handles
/// observe the same underlying slot, matching the teacher's
/// `GameStateCell::clone` semantics.
#[derive(Clone)]
pub struct GameStateCell(Arc<Mutex<GameState>>);

impl GameStateCell {
    /// An empty cell holding no snapshot yet.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(GameState::default())))
    }

    /// Overwrites this slot with a freshly captured snapshot.
    pub fn save(&self, frame: Frame, data: Vec<u8>, checksum: u32) {
        let mut guard = self.0.lock();
        guard.frame = frame;
        guard.data = Some(data);
        guard.checksum = checksum;
    }

    /// The frame this slot currently holds, or [`Frame::NULL`] if empty.
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.0.lock().frame
    }

    /// The checksum recorded alongside this slot's data.
    #[must_use]
    pub fn checksum(&self) -> u32 {
        self.0.lock().checksum
    }

    /// Clones out the blob held in this slot, if any.
    #[must_use]
    pub fn load(&self) -> Option<Vec<u8>> {
        self.0.lock().data.clone()
    }

    /// `true` if this slot has never been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().data.is_none()
    }
}

impl Default for GameStateCell {
    fn default() -> Self {
        Self::new()
    }
}
