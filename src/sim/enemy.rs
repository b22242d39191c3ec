//! Hostile entities
//!
//! Every kind pursues its current target. Shooters hold a stand-off band and
//! fire on a timer; they hand shots back to the caller as intents instead of
//! pushing projectiles themselves.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{Body, EntityId, Target, TargetKind, direction};
use crate::consts::*;

/// Enemy archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnemyKind {
    Basic,
    Runner,
    Shooter,
    Tank,
    Boss,
}

/// Base stats fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyStats {
    pub speed: f32,
    pub hp: f32,
    pub radius: f32,
}

impl EnemyKind {
    pub fn stats(self) -> EnemyStats {
        let (speed, hp, radius) = match self {
            EnemyKind::Basic => (150.0, 50.0, 14.0),
            EnemyKind::Runner => (220.0, 60.0, 12.0),
            EnemyKind::Shooter => (100.0, 80.0, 15.0),
            EnemyKind::Tank => (90.0, 300.0, 25.0),
            EnemyKind::Boss => (60.0, 6000.0, 60.0),
        };
        EnemyStats { speed, hp, radius }
    }

    /// Score awarded on kill
    pub fn score_value(self) -> u64 {
        match self {
            EnemyKind::Basic => 10,
            EnemyKind::Runner => 20,
            EnemyKind::Shooter => 35,
            EnemyKind::Tank => 75,
            EnemyKind::Boss => 1000,
        }
    }

    /// Shards awarded on kill
    pub fn shard_value(self) -> u32 {
        if self == EnemyKind::Boss {
            SHARDS_PER_BOSS
        } else {
            SHARDS_PER_KILL
        }
    }
}

/// Shooter behaviour, derived from distance each tick and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShooterStance {
    Approach,
    Hold,
    Retreat,
}

impl ShooterStance {
    pub fn for_distance(dist: f32) -> Self {
        if dist > SHOOTER_STOP_DIST {
            ShooterStance::Approach
        } else if dist < SHOOTER_STOP_DIST - SHOOTER_RETREAT_BAND {
            ShooterStance::Retreat
        } else {
            ShooterStance::Hold
        }
    }
}

/// Side effects an enemy requests from the simulation core.
#[derive(Debug, Clone, PartialEq)]
pub enum EnemyIntent {
    Fire { from: Vec2, at: Vec2 },
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub body: Body,
    pub hp: f32,
    pub max_hp: f32,
    pub speed: f32,
    /// What the enemy pursued last tick
    pub target: Option<TargetKind>,
    pub shoot_timer: f32,
    pub fire_rate: f32,
}

impl Enemy {
    pub fn new(id: EntityId, kind: EnemyKind, pos: Vec2) -> Self {
        let stats = kind.stats();
        Self {
            id,
            kind,
            body: Body::new(pos, stats.radius),
            hp: stats.hp,
            max_hp: stats.hp,
            speed: stats.speed,
            target: None,
            shoot_timer: 0.0,
            fire_rate: SHOOTER_FIRE_RATE,
        }
    }

    /// Apply difficulty multipliers. Only called at spawn.
    pub fn scaled(mut self, hp_mult: f32, speed_mult: f32) -> Self {
        self.hp *= hp_mult;
        self.max_hp = self.hp;
        self.speed *= speed_mult;
        self
    }

    pub fn is_boss(&self) -> bool {
        self.kind == EnemyKind::Boss
    }

    /// Remove hp, never dropping below zero. Returns true if this crossed
    /// into death.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        let was_alive = self.hp > 0.0;
        self.hp = (self.hp - amount).clamp(0.0, self.max_hp);
        was_alive && self.hp <= 0.0
    }

    /// Steer toward `target`. Shooters may return a fire intent.
    pub fn update(&mut self, dt: f32, target: &Target) -> Option<EnemyIntent> {
        self.target = Some(target.kind.clone());

        let dist = self.body.pos.distance(target.pos);
        let dir = direction(self.body.pos, target.pos);

        if self.kind == EnemyKind::Shooter {
            if let Some(dir) = dir {
                match ShooterStance::for_distance(dist) {
                    ShooterStance::Approach => self.body.pos += dir * self.speed * dt,
                    ShooterStance::Retreat => self.body.pos -= dir * self.speed * 0.5 * dt,
                    ShooterStance::Hold => {}
                }
            }

            self.shoot_timer += dt;
            if self.shoot_timer >= self.fire_rate {
                self.shoot_timer = 0.0;
                return Some(EnemyIntent::Fire {
                    from: self.body.pos,
                    at: target.pos,
                });
            }
        } else if dist > self.body.radius + target.radius {
            if let Some(dir) = dir {
                self.body.pos += dir * self.speed * dt;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::PlayerKey;

    fn target_at(pos: Vec2) -> Target {
        Target {
            kind: TargetKind::Player(PlayerKey::Local),
            pos,
            radius: PLAYER_RADIUS,
        }
    }

    #[test]
    fn melee_pursues_until_touching() {
        let mut e = Enemy::new(EntityId(1), EnemyKind::Basic, Vec2::ZERO);
        e.update(1.0, &target_at(Vec2::new(1000.0, 0.0)));
        assert!((e.body.pos.x - 150.0).abs() < 1e-3);

        let mut touching = Enemy::new(EntityId(2), EnemyKind::Basic, Vec2::ZERO);
        touching.update(1.0, &target_at(Vec2::new(20.0, 0.0)));
        assert_eq!(touching.body.pos, Vec2::ZERO);
    }

    #[test]
    fn shooter_stance_bands() {
        assert_eq!(ShooterStance::for_distance(400.0), ShooterStance::Approach);
        assert_eq!(ShooterStance::for_distance(280.0), ShooterStance::Hold);
        assert_eq!(ShooterStance::for_distance(100.0), ShooterStance::Retreat);
    }

    #[test]
    fn shooter_retreats_at_half_speed_and_fires_on_timer() {
        let mut e = Enemy::new(EntityId(1), EnemyKind::Shooter, Vec2::new(100.0, 0.0));
        let target = target_at(Vec2::ZERO);
        assert!(e.update(1.0, &target).is_none());
        assert!((e.body.pos.x - 150.0).abs() < 1e-3);

        let intent = e.update(1.0, &target);
        assert!(matches!(intent, Some(EnemyIntent::Fire { at, .. }) if at == Vec2::ZERO));
        assert_eq!(e.shoot_timer, 0.0);
    }

    #[test]
    fn coincident_target_does_not_produce_nan() {
        let mut e = Enemy::new(EntityId(1), EnemyKind::Shooter, Vec2::ZERO);
        e.update(0.5, &target_at(Vec2::ZERO));
        assert!(e.body.pos.is_finite());
    }

    #[test]
    fn damage_clamps_at_zero_and_reports_crossing_once() {
        let mut e = Enemy::new(EntityId(1), EnemyKind::Basic, Vec2::ZERO);
        assert!(e.take_damage(80.0));
        assert_eq!(e.hp, 0.0);
        assert!(!e.take_damage(10.0));
    }

    #[test]
    fn scaling_syncs_max_hp() {
        let e = Enemy::new(EntityId(1), EnemyKind::Tank, Vec2::ZERO).scaled(1.4, 1.15);
        assert!((e.hp - 420.0).abs() < 1e-3);
        assert_eq!(e.hp, e.max_hp);
        assert!((e.speed - 103.5).abs() < 1e-3);
    }
}
