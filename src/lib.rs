//! Antigravity - top-down wave-survival arcade shooter with peer-to-peer co-op
//!
//! Core modules:
//! - `sim`: Simulation core (entities, spawn director, collisions, tick loop)
//! - `net`: Host-authoritative reconciliation over an abstract peer channel
//! - `shop`: Arsenal upgrades and power-up catalogue
//! - `persistence`: Key/value storage (LocalStorage on web, files on native)
//! - `platform`: Browser/native platform abstraction
//! - `autopilot`: Bot input for headless and attract-mode runs

pub mod autopilot;
pub mod error;
pub mod highscores;
pub mod net;
pub mod persistence;
pub mod platform;
pub mod settings;
pub mod shop;
pub mod sim;

pub use error::{NetError, ShopError, StoreError};
pub use highscores::HighScores;
pub use settings::Settings;

use glam::Vec2;

/// Game balance constants
pub mod consts {
    /// Headless runner timestep (one tick per rendered frame at 60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Frame deltas are clamped to this to bound catch-up after a stall
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Default arena dimensions
    pub const ARENA_WIDTH: f32 = 1280.0;
    pub const ARENA_HEIGHT: f32 = 720.0;

    /// Player firing
    pub const BASE_FIRE_INTERVAL: f32 = 0.15;
    pub const MAX_SHOTS_PER_TICK: u32 = 3;
    /// Horizontal offset of each barrel while Double Fire is active
    pub const DOUBLE_FIRE_OFFSET: f32 = 10.0;
    pub const PLAYER_RADIUS: f32 = 15.0;

    /// Projectiles
    pub const PROJECTILE_SPEED: f32 = 600.0;
    pub const PROJECTILE_RADIUS: f32 = 4.0;
    pub const PROJECTILE_DAMAGE: f32 = 40.0;
    /// Projectiles are culled this far outside the arena
    pub const OFFSCREEN_MARGIN: f32 = 100.0;
    pub const ENEMY_PROJECTILE_DAMAGE: f32 = 10.0;

    /// Continuous chip damage per tick while an enemy body overlaps the player
    pub const CONTACT_DAMAGE: f32 = 0.5;

    /// Waves
    pub const WAVE_DURATION: f32 = 20.0;
    pub const POWERUP_WAVE_INTERVAL: u32 = 2;
    pub const BOSS_WAVE_INTERVAL: u32 = 6;
    pub const BOSS_SKIP_CHANCE: f64 = 0.7;
    pub const BOSS_HP_PER_WAVE: f32 = 0.2;
    pub const BASE_SPAWN_INTERVAL: f32 = 1.2;
    pub const SPAWN_INTERVAL_STEP: f32 = 0.1;
    pub const MIN_SPAWN_INTERVAL: f32 = 0.15;
    pub const SPAWN_EDGE_MARGIN: f32 = 30.0;

    /// Entropy clock
    pub const ENTROPY_WINDOW: f32 = 20.0;
    pub const ENTROPY_STEP: f32 = 0.6;

    /// Shooter stand-off band
    pub const SHOOTER_STOP_DIST: f32 = 300.0;
    pub const SHOOTER_RETREAT_BAND: f32 = 50.0;
    pub const SHOOTER_FIRE_RATE: f32 = 2.0;

    /// Gunner Dead Eye
    pub const BULLET_TIME_SCALE: f32 = 0.1;
    pub const DEAD_EYE_WINDOW: f32 = 3.0;
    pub const DEAD_EYE_DECAY: f32 = 9.0;
    pub const DEAD_EYE_DAMAGE: f32 = 1000.0;
    pub const DEAD_EYE_PICK_RADIUS: f32 = 30.0;

    /// Giant slam
    pub const GIANT_ACTIVE_SECS: f32 = 5.0;
    pub const GIANT_SLAM_RADIUS: f32 = 250.0;
    pub const GIANT_SLAM_DAMAGE: f32 = 150.0;
    pub const GIANT_SLAM_KNOCKBACK: f32 = 120.0;
    /// Giant bullet splash (primary target excluded)
    pub const GIANT_SPLASH_RADIUS: f32 = 60.0;
    pub const GIANT_SPLASH_FRACTION: f32 = 0.5;
    pub const GIANT_SPLASH_KNOCKBACK: f32 = 20.0;

    /// Healer station
    pub const STATION_RADIUS: f32 = 150.0;
    pub const STATION_LIFETIME: f32 = 15.0;
    pub const STATION_HP: f32 = 150.0;
    pub const STATION_HEAL_RATE: f32 = 20.0;
    /// Enemies closer than their radius plus this chew on the station
    pub const STATION_CAPTURE_RADIUS: f32 = 30.0;
    pub const STATION_ENEMY_DPS: f32 = 50.0;

    /// Energy blade power-up
    pub const SWORD_ORBIT: f32 = 60.0;
    pub const SWORD_HIT_RADIUS: f32 = 20.0;
    pub const SWORD_DPS: f32 = 150.0;
    pub const SWORD_SPIN: f32 = 5.0;

    /// Timed power-up durations (seconds)
    pub const SHIELD_SECS: f32 = 10.0;
    pub const DOUBLE_FIRE_SECS: f32 = 15.0;
    pub const SWORD_SECS: f32 = 12.0;
    pub const GLASS_CANNON_SECS: f32 = 10.0;

    /// Orbital strike power-up
    pub const ORBITAL_STRIKE_RADIUS: f32 = 500.0;
    pub const ORBITAL_STRIKE_DAMAGE: f32 = 150.0;

    /// Free power-up choice
    pub const POWERUP_CHOICES: usize = 3;
    pub const POWERUP_CHOICE_SECS: f32 = 4.0;

    /// Currency
    pub const SHARDS_PER_KILL: u32 = 2;
    pub const SHARDS_PER_BOSS: u32 = 50;
    pub const REVIVE_COST: u32 = 100;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_angle_wraps_into_half_open_range() {
        use std::f32::consts::PI;
        assert!((normalize_angle(3.0 * PI) - (-PI)).abs() < 1e-5);
        assert!((normalize_angle(-PI) - (-PI)).abs() < 1e-6);
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn polar_to_cartesian_on_axes() {
        let p = polar_to_cartesian(60.0, 0.0);
        assert!((p.x - 60.0).abs() < 1e-4 && p.y.abs() < 1e-4);
        let q = polar_to_cartesian(60.0, std::f32::consts::FRAC_PI_2);
        assert!(q.x.abs() < 1e-4 && (q.y - 60.0).abs() < 1e-4);
    }
}
