//! Player avatar
//!
//! Role stats, the ability state machine, timed power-ups and the Healer's
//! deployable station. Remote teammates are plain projections of their last
//! snapshot and never run any of this.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::{Body, EntityId, PeerId};
use crate::consts::*;

/// Player class, fixed for the life of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Gunner,
    Giant,
    Healer,
}

/// Base stats a role starts with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleStats {
    pub speed: f32,
    pub max_hp: f32,
    pub fire_rate_mult: f32,
    pub damage_mult: f32,
    pub ability_cooldown: f32,
    pub max_targets: usize,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Gunner, Role::Giant, Role::Healer];

    pub fn stats(self) -> RoleStats {
        match self {
            Role::Gunner => RoleStats {
                speed: 400.0,
                max_hp: 100.0,
                fire_rate_mult: 1.3,
                damage_mult: 1.0,
                ability_cooldown: 7.0,
                max_targets: 3,
            },
            Role::Giant => RoleStats {
                speed: 220.0,
                max_hp: 400.0,
                fire_rate_mult: 1.0,
                damage_mult: 0.6,
                ability_cooldown: 15.0,
                max_targets: 0,
            },
            Role::Healer => RoleStats {
                speed: 320.0,
                max_hp: 120.0,
                fire_rate_mult: 1.0,
                damage_mult: 0.45,
                ability_cooldown: 20.0,
                max_targets: 0,
            },
        }
    }
}

/// Observable ability state, derived from the timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityState {
    /// Cooling down
    Idle,
    Ready,
    Active,
}

/// Timed power-ups, each with an independent countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimedPowerUp {
    Shield,
    DoubleFire,
    Sword,
    GlassCannon,
}

impl TimedPowerUp {
    pub const ALL: [TimedPowerUp; 4] = [
        TimedPowerUp::Shield,
        TimedPowerUp::DoubleFire,
        TimedPowerUp::Sword,
        TimedPowerUp::GlassCannon,
    ];

    pub fn duration(self) -> f32 {
        match self {
            TimedPowerUp::Shield => SHIELD_SECS,
            TimedPowerUp::DoubleFire => DOUBLE_FIRE_SECS,
            TimedPowerUp::Sword => SWORD_SECS,
            TimedPowerUp::GlassCannon => GLASS_CANNON_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedEffect {
    pub active: bool,
    pub timer: f32,
}

/// The four timed power-up slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerUps {
    pub shield: TimedEffect,
    pub double_fire: TimedEffect,
    pub sword: TimedEffect,
    pub glass_cannon: TimedEffect,
}

impl PowerUps {
    pub fn get(&self, kind: TimedPowerUp) -> &TimedEffect {
        match kind {
            TimedPowerUp::Shield => &self.shield,
            TimedPowerUp::DoubleFire => &self.double_fire,
            TimedPowerUp::Sword => &self.sword,
            TimedPowerUp::GlassCannon => &self.glass_cannon,
        }
    }

    pub fn get_mut(&mut self, kind: TimedPowerUp) -> &mut TimedEffect {
        match kind {
            TimedPowerUp::Shield => &mut self.shield,
            TimedPowerUp::DoubleFire => &mut self.double_fire,
            TimedPowerUp::Sword => &mut self.sword,
            TimedPowerUp::GlassCannon => &mut self.glass_cannon,
        }
    }

    pub fn is_active(&self, kind: TimedPowerUp) -> bool {
        self.get(kind).active
    }
}

/// Healer deployable. Pulls all enemy aggro while it stands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealingStation {
    pub pos: Vec2,
    pub radius: f32,
    /// Seconds until it collapses on its own
    pub timer: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub active: bool,
}

impl HealingStation {
    pub fn deploy(pos: Vec2) -> Self {
        Self {
            pos,
            radius: STATION_RADIUS,
            timer: STATION_LIFETIME,
            hp: STATION_HP,
            max_hp: STATION_HP,
            active: true,
        }
    }

    pub fn take_damage(&mut self, amount: f32) {
        self.hp = (self.hp - amount).max(0.0);
    }

    /// Timer expiry and hp depletion are both terminal.
    pub fn is_spent(&self) -> bool {
        self.timer <= 0.0 || self.hp <= 0.0
    }

    pub fn covers(&self, pos: Vec2) -> bool {
        self.pos.distance(pos) < self.radius
    }
}

/// The locally controlled player
#[derive(Debug, Clone)]
pub struct Player {
    pub role: Role,
    pub body: Body,
    pub speed: f32,
    /// Permanent max hp; shop upgrades raise this
    pub base_max_hp: f32,
    /// Effective max hp (halved under Glass Cannon)
    pub max_hp: f32,
    pub hp: f32,
    pub fire_rate_mult: f32,
    pub damage_mult: f32,
    /// 0 = off, otherwise the damage fraction of the second hit
    pub penetration: f32,
    /// Hp restored on each non-boss kill
    pub lifesteal: f32,

    pub ability_cooldown: f32,
    /// Cooldown remaining; usable at or below zero
    pub ability_timer: f32,
    pub is_ability_active: bool,
    /// Remaining active duration (Dead Eye window, Giant invincibility)
    pub active_timer: f32,

    pub is_invincible: bool,
    pub is_dead: bool,

    pub power_ups: PowerUps,
    pub sword_angle: f32,

    pub max_targets: usize,
    /// Dead Eye marks in selection order
    pub marked_targets: Vec<EntityId>,

    pub healing_station: Option<HealingStation>,

    /// Accumulates time toward the next shot
    pub fire_timer: f32,
    /// Last aim point, mirrored into snapshots
    pub aim: Vec2,
    pub is_firing: bool,
}

impl Player {
    pub fn new(role: Role, pos: Vec2) -> Self {
        let stats = role.stats();
        let fire_interval = BASE_FIRE_INTERVAL / stats.fire_rate_mult;
        Self {
            role,
            body: Body::new(pos, PLAYER_RADIUS),
            speed: stats.speed,
            base_max_hp: stats.max_hp,
            max_hp: stats.max_hp,
            hp: stats.max_hp,
            fire_rate_mult: stats.fire_rate_mult,
            damage_mult: stats.damage_mult,
            penetration: 0.0,
            lifesteal: 0.0,
            ability_cooldown: stats.ability_cooldown,
            ability_timer: 0.0,
            is_ability_active: false,
            active_timer: 0.0,
            is_invincible: false,
            is_dead: false,
            power_ups: PowerUps::default(),
            sword_angle: 0.0,
            max_targets: stats.max_targets,
            marked_targets: Vec::new(),
            healing_station: None,
            // First press fires immediately
            fire_timer: fire_interval,
            aim: pos,
            is_firing: false,
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec2 {
        self.body.pos
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    /// Seconds between shots
    pub fn fire_interval(&self) -> f32 {
        BASE_FIRE_INTERVAL / self.fire_rate_mult
    }

    pub fn is_protected(&self) -> bool {
        self.is_invincible || self.power_ups.shield.active
    }

    pub fn ability_state(&self) -> AbilityState {
        if self.is_ability_active {
            AbilityState::Active
        } else if self.ability_timer <= 0.0 {
            AbilityState::Ready
        } else {
            AbilityState::Idle
        }
    }

    /// Start the ability if it is off cooldown. The cooldown restarts on
    /// activation, not on deactivation.
    pub fn try_use_ability(&mut self) -> bool {
        if self.is_dead || self.ability_timer > 0.0 {
            return false;
        }
        self.ability_timer = self.ability_cooldown;
        self.is_ability_active = true;
        true
    }

    pub fn deactivate_ability(&mut self) {
        self.is_ability_active = false;
        self.active_timer = 0.0;
        if !self.power_ups.shield.active {
            self.is_invincible = false;
        }
    }

    /// Advance cooldown, ability duration and power-up timers.
    ///
    /// The Gunner's Dead Eye window is owned by the simulation core, which
    /// decays it on world time and executes on expiry.
    pub fn update_timers(&mut self, dt: f32) {
        if self.is_dead {
            return;
        }

        if self.ability_timer > 0.0 {
            self.ability_timer -= dt;
        }

        if self.is_ability_active && self.role != Role::Gunner {
            self.active_timer -= dt;
            if self.active_timer <= 0.0 {
                self.deactivate_ability();
            }
        }

        for kind in TimedPowerUp::ALL {
            let effect = self.power_ups.get_mut(kind);
            if !effect.active {
                continue;
            }
            effect.timer -= dt;
            if effect.timer <= 0.0 {
                effect.active = false;
                effect.timer = 0.0;
                self.revert(kind);
            }
        }

        self.max_hp = if self.power_ups.glass_cannon.active {
            self.base_max_hp / 2.0
        } else {
            self.base_max_hp
        };
        self.hp = self.hp.min(self.max_hp);

        if self.power_ups.sword.active {
            self.sword_angle = crate::normalize_angle(self.sword_angle + SWORD_SPIN * dt);
        }
    }

    /// Grant a timed power-up. Re-granting an active one only refreshes its
    /// timer so stat mutations are never stacked.
    pub fn grant(&mut self, kind: TimedPowerUp) {
        let already = self.power_ups.is_active(kind);
        let effect = self.power_ups.get_mut(kind);
        effect.active = true;
        effect.timer = kind.duration();
        if already {
            return;
        }

        match kind {
            TimedPowerUp::Shield => self.is_invincible = true,
            TimedPowerUp::GlassCannon => {
                self.damage_mult *= 2.0;
                self.max_hp /= 2.0;
                self.hp /= 2.0;
                self.hp = self.hp.min(self.max_hp);
            }
            TimedPowerUp::DoubleFire | TimedPowerUp::Sword => {}
        }
    }

    fn revert(&mut self, kind: TimedPowerUp) {
        match kind {
            TimedPowerUp::Shield => {
                let giant_active = self.role == Role::Giant && self.is_ability_active;
                if !giant_active {
                    self.is_invincible = false;
                }
            }
            TimedPowerUp::GlassCannon => {
                self.damage_mult /= 2.0;
                self.max_hp = self.base_max_hp;
                // Doubled back up rather than restored
                self.hp = (self.hp * 2.0).min(self.max_hp);
            }
            TimedPowerUp::DoubleFire | TimedPowerUp::Sword => {}
        }
    }

    /// Move along `axis` at full speed regardless of stick magnitude.
    pub fn apply_movement(&mut self, axis: Vec2, dt: f32) {
        if self.is_dead {
            return;
        }
        if let Some(dir) = axis.try_normalize() {
            self.body.pos += dir * self.speed * dt;
        }
    }

    pub fn clamp_to(&mut self, bounds: Vec2) {
        let r = self.body.radius;
        self.body.pos = self.body.pos.clamp(Vec2::splat(r), (bounds - r).max(Vec2::splat(r)));
    }

    /// Apply damage unless protected. Returns true when this crossed hp to zero.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        if self.is_dead || self.is_protected() {
            return false;
        }
        let was_alive = self.hp > 0.0;
        self.hp = (self.hp - amount).clamp(0.0, self.max_hp);
        was_alive && self.hp <= 0.0
    }

    pub fn heal(&mut self, amount: f32) {
        if self.is_dead {
            return;
        }
        self.hp = (self.hp + amount).min(self.max_hp);
    }

    pub fn full_heal(&mut self) {
        if !self.is_dead {
            self.hp = self.max_hp;
        }
    }

    /// Enter spectator mode (multiplayer death).
    pub fn die(&mut self) {
        self.is_dead = true;
        self.hp = 0.0;
        self.is_firing = false;
        if self.is_ability_active {
            self.deactivate_ability();
        }
        self.marked_targets.clear();
    }

    pub fn revive(&mut self) {
        self.is_dead = false;
        self.hp = self.max_hp;
    }

    /// Add a Dead Eye mark. Duplicates and marks past the cap are rejected.
    pub fn mark_target(&mut self, enemy: EntityId) -> bool {
        if self.marked_targets.len() >= self.max_targets || self.marked_targets.contains(&enemy) {
            return false;
        }
        self.marked_targets.push(enemy);
        true
    }

    /// Drop marks whose enemy no longer exists.
    pub fn prune_marks(&mut self, mut exists: impl FnMut(EntityId) -> bool) {
        self.marked_targets.retain(|id| exists(*id));
    }

    /// World position of the orbiting blade, if drawn
    pub fn sword_tip(&self) -> Option<Vec2> {
        self.power_ups
            .sword
            .active
            .then(|| self.body.pos + crate::polar_to_cartesian(SWORD_ORBIT, self.sword_angle))
    }
}

/// Which timed effects a remote player reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpFlags {
    pub shield: bool,
    pub sword: bool,
    pub double_fire: bool,
    pub glass_cannon: bool,
}

impl From<&PowerUps> for PowerUpFlags {
    fn from(p: &PowerUps) -> Self {
        Self {
            shield: p.shield.active,
            sword: p.sword.active,
            double_fire: p.double_fire.active,
            glass_cannon: p.glass_cannon.active,
        }
    }
}

/// A teammate as last reported over the wire
#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub id: PeerId,
    pub role: Role,
    pub body: Body,
    pub hp: f32,
    pub max_hp: f32,
    pub is_dead: bool,
    pub score: u64,
    pub is_firing: bool,
    pub aim: Vec2,
    pub healing_station: Option<HealingStation>,
    pub power_ups: PowerUpFlags,
    /// Spun locally; the angle is not replicated
    pub sword_angle: f32,
}

impl RemotePlayer {
    pub fn new(id: PeerId, role: Role, pos: Vec2) -> Self {
        let max_hp = role.stats().max_hp;
        Self {
            id,
            role,
            body: Body::new(pos, PLAYER_RADIUS),
            hp: max_hp,
            max_hp,
            is_dead: false,
            score: 0,
            is_firing: false,
            aim: pos,
            healing_station: None,
            power_ups: PowerUpFlags::default(),
            sword_angle: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    pub fn advance_sword(&mut self, dt: f32) {
        if self.power_ups.sword && !self.is_dead {
            self.sword_angle = crate::normalize_angle(self.sword_angle + SWORD_SPIN * dt);
        }
    }

    pub fn sword_tip(&self) -> Option<Vec2> {
        (self.power_ups.sword && !self.is_dead)
            .then(|| self.body.pos + crate::polar_to_cartesian(SWORD_ORBIT, self.sword_angle))
    }
}
