//! Simulation module
//!
//! All gameplay logic lives here:
//! - Variable real-time step, clamped per frame
//! - Seeded RNG only
//! - Stable iteration order (enemies sorted by id, teammates by peer id)
//! - No rendering or transport dependencies; the network plugs in through
//!   [`tick::Reconciler`]

pub mod collision;
pub mod enemy;
pub mod entity;
pub mod entropy;
pub mod player;
pub mod projectile;
pub mod state;
pub mod tick;
pub mod wave;

pub use enemy::{Enemy, EnemyKind};
pub use entity::{Body, EntityId, PeerId, PlayerKey, Target, TargetKind};
pub use entropy::EntropySystem;
pub use player::{HealingStation, Player, RemotePlayer, Role, TimedPowerUp};
pub use projectile::Projectile;
pub use state::{Authority, GameEvent, GamePhase, GameState, HitTier, Overlay};
pub use tick::{Reconciler, TickInput, tick};
pub use wave::WaveDirector;
