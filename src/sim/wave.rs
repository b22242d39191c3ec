//! Spawn director
//!
//! Decides when and what to spawn. It never owns enemies; the caller turns a
//! [`Spawn`] into an [`Enemy`] with a fresh id.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::enemy::{Enemy, EnemyKind};
use super::entity::EntityId;
use crate::consts::*;

/// Gap between spawns for a given wave. Non-increasing, floored.
pub fn spawn_interval(wave: u32) -> f32 {
    (BASE_SPAWN_INTERVAL - wave as f32 * SPAWN_INTERVAL_STEP).max(MIN_SPAWN_INTERVAL)
}

/// Wave-gated type table. `roll` is uniform in [0, 1).
pub fn pick_kind(wave: u32, roll: f32) -> EnemyKind {
    match wave {
        w if w >= 5 => {
            if roll < 0.15 {
                EnemyKind::Tank
            } else if roll < 0.45 {
                EnemyKind::Shooter
            } else if roll < 0.75 {
                EnemyKind::Runner
            } else {
                EnemyKind::Basic
            }
        }
        3 | 4 => {
            if roll < 0.35 {
                EnemyKind::Shooter
            } else if roll < 0.70 {
                EnemyKind::Runner
            } else {
                EnemyKind::Basic
            }
        }
        2 if roll < 0.5 => EnemyKind::Runner,
        _ => EnemyKind::Basic,
    }
}

pub fn is_boss_wave(wave: u32) -> bool {
    wave > 0 && wave % BOSS_WAVE_INTERVAL == 0
}

/// Uniform point on one of the four edges, pushed outward by the margin.
pub fn edge_spawn<R: Rng + ?Sized>(rng: &mut R, bounds: Vec2) -> Vec2 {
    if rng.random_bool(0.5) {
        let x = if rng.random_bool(0.5) {
            -SPAWN_EDGE_MARGIN
        } else {
            bounds.x + SPAWN_EDGE_MARGIN
        };
        Vec2::new(x, rng.random::<f32>() * bounds.y)
    } else {
        let y = if rng.random_bool(0.5) {
            -SPAWN_EDGE_MARGIN
        } else {
            bounds.y + SPAWN_EDGE_MARGIN
        };
        Vec2::new(rng.random::<f32>() * bounds.x, y)
    }
}

/// A spawn decision, scaled at creation time only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawn {
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub hp_mult: f32,
    pub speed_mult: f32,
}

impl Spawn {
    pub fn into_enemy(self, id: EntityId) -> Enemy {
        Enemy::new(id, self.kind, self.pos).scaled(self.hp_mult, self.speed_mult)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveDirector {
    pub wave: u32,
    pub spawn_timer: f32,
    pub spawn_interval: f32,
    pub hp_mult: f32,
    pub speed_mult: f32,
}

impl Default for WaveDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveDirector {
    pub fn new() -> Self {
        Self {
            wave: 1,
            spawn_timer: 0.0,
            spawn_interval: spawn_interval(1),
            hp_mult: 1.0,
            speed_mult: 1.0,
        }
    }

    /// Push the current difficulty multipliers and wave number.
    pub fn set_difficulty(&mut self, wave: u32, hp_mult: f32, speed_mult: f32) {
        self.wave = wave;
        self.hp_mult = hp_mult;
        self.speed_mult = speed_mult;
        self.spawn_interval = spawn_interval(wave);
    }

    /// Accumulate time and return at most one spawn.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        enemies: &[Enemy],
        bounds: Vec2,
        rng: &mut R,
    ) -> Option<Spawn> {
        self.spawn_timer += dt;
        if self.spawn_timer < self.spawn_interval {
            return None;
        }
        self.spawn_timer = 0.0;
        self.next_spawn(enemies, bounds, rng)
    }

    fn next_spawn<R: Rng + ?Sized>(&self, enemies: &[Enemy], bounds: Vec2, rng: &mut R) -> Option<Spawn> {
        if is_boss_wave(self.wave) {
            let boss_alive = enemies.iter().any(|e| e.is_boss() && e.body.is_alive());
            if !boss_alive {
                log::info!("Boss spawning on wave {}", self.wave);
                return Some(Spawn {
                    kind: EnemyKind::Boss,
                    pos: Vec2::new(bounds.x / 2.0, -100.0),
                    hp_mult: 1.0 + self.wave as f32 * BOSS_HP_PER_WAVE,
                    speed_mult: 1.0,
                });
            }
            if rng.random_bool(BOSS_SKIP_CHANCE) {
                return None;
            }
        }

        let pos = edge_spawn(rng, bounds);
        let kind = pick_kind(self.wave, rng.random::<f32>());
        Some(Spawn {
            kind,
            pos,
            hp_mult: self.hp_mult,
            speed_mult: self.speed_mult,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const BOUNDS: Vec2 = Vec2::new(ARENA_WIDTH, ARENA_HEIGHT);

    #[test]
    fn type_table_thresholds() {
        assert_eq!(pick_kind(1, 0.0), EnemyKind::Basic);
        assert_eq!(pick_kind(2, 0.49), EnemyKind::Runner);
        assert_eq!(pick_kind(2, 0.5), EnemyKind::Basic);
        assert_eq!(pick_kind(3, 0.1), EnemyKind::Shooter);
        assert_eq!(pick_kind(4, 0.6), EnemyKind::Runner);
        assert_eq!(pick_kind(5, 0.1), EnemyKind::Tank);
        assert_eq!(pick_kind(9, 0.3), EnemyKind::Shooter);
        assert_eq!(pick_kind(9, 0.9), EnemyKind::Basic);
    }

    #[test]
    fn edge_spawns_sit_outside_the_arena() {
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..200 {
            let p = edge_spawn(&mut rng, BOUNDS);
            let on_x_edge = p.x == -SPAWN_EDGE_MARGIN || p.x == BOUNDS.x + SPAWN_EDGE_MARGIN;
            let on_y_edge = p.y == -SPAWN_EDGE_MARGIN || p.y == BOUNDS.y + SPAWN_EDGE_MARGIN;
            assert!(on_x_edge || on_y_edge);
        }
    }

    #[test]
    fn spawn_is_scaled_once_at_creation() {
        let mut dir = WaveDirector::new();
        dir.set_difficulty(1, 2.0, 1.5);
        let mut rng = Pcg32::seed_from_u64(9);
        let spawn = dir.update(2.0, &[], BOUNDS, &mut rng).unwrap();
        let enemy = spawn.into_enemy(EntityId(1));
        assert_eq!(enemy.kind, EnemyKind::Basic);
        assert_eq!(enemy.hp, 100.0);
        assert_eq!(enemy.max_hp, 100.0);
        assert_eq!(enemy.speed, 225.0);
        assert_eq!(dir.spawn_timer, 0.0);
    }

    #[test]
    fn boss_wave_spawns_exactly_one_boss() {
        let mut rng = Pcg32::seed_from_u64(42);
        for wave in [6, 12, 18] {
            let mut dir = WaveDirector::new();
            dir.set_difficulty(wave, 1.0, 1.0);
            let mut enemies: Vec<Enemy> = Vec::new();
            let mut next = 1;
            for _ in 0..2000 {
                if let Some(spawn) = dir.update(SIM_DT, &enemies, BOUNDS, &mut rng) {
                    enemies.push(spawn.into_enemy(EntityId(next)));
                    next += 1;
                }
                assert!(enemies.iter().filter(|e| e.is_boss()).count() <= 1);
            }
            let bosses: Vec<_> = enemies.iter().filter(|e| e.is_boss()).collect();
            assert_eq!(bosses.len(), 1);
            let expected = 6000.0 * (1.0 + wave as f32 * BOSS_HP_PER_WAVE);
            assert!((bosses[0].max_hp - expected).abs() < 1e-2);
            assert_eq!(bosses[0].body.pos, Vec2::new(BOUNDS.x / 2.0, -100.0));
        }
    }

    proptest! {
        #[test]
        fn spawn_interval_is_monotone_and_floored(a in 0u32..500, b in 0u32..500) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(spawn_interval(hi) <= spawn_interval(lo));
            prop_assert!(spawn_interval(hi) >= MIN_SPAWN_INTERVAL);
        }
    }
}
