//! Shared entity base
//!
//! Everything simulated has a `Body`. Cross-entity references are ids that
//! are resolved lazily against the owning collection; a missing id means the
//! entity is already gone.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identity of a simulated enemy or projectile.
///
/// On a client, enemy ids are the host's ids taken from world snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

/// Identity of a peer in a multiplayer room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which player something belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerKey {
    Local,
    Remote(PeerId),
}

/// Position, hitbox and deferred-removal flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub pos: Vec2,
    pub radius: f32,
    /// Entities are never removed mid-iteration; they are flagged and swept
    /// at the end of the tick.
    #[serde(skip)]
    pub marked_for_deletion: bool,
}

impl Body {
    pub fn new(pos: Vec2, radius: f32) -> Self {
        Self {
            pos,
            radius,
            marked_for_deletion: false,
        }
    }

    /// Strict circle-circle overlap.
    #[inline]
    pub fn overlaps(&self, pos: Vec2, radius: f32) -> bool {
        self.pos.distance(pos) < self.radius + radius
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.marked_for_deletion
    }
}

/// Unit vector from `from` toward `to`, `None` when the points coincide.
#[inline]
pub fn direction(from: Vec2, to: Vec2) -> Option<Vec2> {
    (to - from).try_normalize()
}

/// Something an enemy can pursue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Player(PlayerKey),
    Station(PlayerKey),
}

/// A resolved pursuit target for this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub kind: TargetKind,
    pub pos: Vec2,
    pub radius: f32,
}

impl Target {
    pub fn is_station(&self) -> bool {
        matches!(self.kind, TargetKind::Station(_))
    }
}
