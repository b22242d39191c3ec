//! Projectiles
//!
//! Straight-line damage carriers. Direction is fixed at spawn (no homing) and
//! lifetime is bounded only by leaving the arena.

use glam::Vec2;

use super::entity::{Body, EntityId, PlayerKey, direction};
use super::player::Role;
use crate::consts::*;

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub body: Body,
    pub vel: Vec2,
    pub damage: f32,
    /// Enemy shots only collide with players, player shots only with enemies
    pub is_enemy: bool,
    /// Selects splash/penetration rules; `None` for enemy shots
    pub owner_role: Option<Role>,
    /// Who collects kill rewards
    pub owner: Option<PlayerKey>,
    /// Firing player's penetration stat, frozen at spawn
    pub owner_penetration: f32,
    /// Damage multiplier for the next hit
    pub current_penetration: f32,
    /// Enemies already damaged by this shot
    pub hit_enemies: Vec<EntityId>,
}

impl Projectile {
    /// Spawn a projectile at `from` travelling toward `toward`.
    ///
    /// Returns `None` when the two points coincide.
    pub fn new(id: EntityId, from: Vec2, toward: Vec2, damage: f32, is_enemy: bool) -> Option<Self> {
        let dir = direction(from, toward)?;
        Some(Self {
            id,
            body: Body::new(from, PROJECTILE_RADIUS),
            vel: dir * PROJECTILE_SPEED,
            damage,
            is_enemy,
            owner_role: None,
            owner: None,
            owner_penetration: 0.0,
            current_penetration: 1.0,
            hit_enemies: Vec::new(),
        })
    }

    /// Player shot carrying the shooter's role and penetration stat.
    pub fn player_shot(
        id: EntityId,
        from: Vec2,
        toward: Vec2,
        damage: f32,
        role: Role,
        penetration: f32,
        owner: PlayerKey,
    ) -> Option<Self> {
        let mut shot = Self::new(id, from, toward, damage, false)?;
        shot.owner_role = Some(role);
        shot.owner_penetration = penetration;
        shot.owner = Some(owner);
        Some(shot)
    }

    /// Euler step plus off-screen cull.
    pub fn update(&mut self, dt: f32, bounds: Vec2) {
        self.body.pos += self.vel * dt;

        let p = self.body.pos;
        if p.x < -OFFSCREEN_MARGIN
            || p.x > bounds.x + OFFSCREEN_MARGIN
            || p.y < -OFFSCREEN_MARGIN
            || p.y > bounds.y + OFFSCREEN_MARGIN
        {
            self.body.marked_for_deletion = true;
        }
    }

    pub fn has_hit(&self, enemy: EntityId) -> bool {
        self.hit_enemies.contains(&enemy)
    }

    pub fn record_hit(&mut self, enemy: EntityId) {
        if !self.has_hit(enemy) {
            self.hit_enemies.push(enemy);
        }
    }

    /// Giant shots trade penetration for splash.
    pub fn splashes(&self) -> bool {
        self.owner_role == Some(Role::Giant)
    }

    /// Damage dealt by the next hit.
    pub fn hit_damage(&self) -> f32 {
        self.damage * self.current_penetration
    }

    /// Decide what happens after a hit was recorded: either arm the single
    /// pass-through or consume the shot.
    pub fn after_hit(&mut self) {
        if self.splashes() {
            self.body.marked_for_deletion = true;
        } else if self.owner_penetration > 0.0 && self.hit_enemies.len() < 2 {
            self.current_penetration = self.owner_penetration;
        } else {
            self.body.marked_for_deletion = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(penetration: f32, role: Role) -> Projectile {
        Projectile::player_shot(
            EntityId(1),
            Vec2::ZERO,
            Vec2::new(10.0, 0.0),
            40.0,
            role,
            penetration,
            PlayerKey::Local,
        )
        .unwrap()
    }

    #[test]
    fn velocity_is_normalized_times_speed() {
        let p = Projectile::new(EntityId(1), Vec2::ZERO, Vec2::new(3.0, 4.0), 10.0, true).unwrap();
        assert!((p.vel.length() - PROJECTILE_SPEED).abs() < 1e-3);
        assert!((p.vel.x / p.vel.y - 0.75).abs() < 1e-5);
    }

    #[test]
    fn degenerate_direction_is_rejected() {
        assert!(Projectile::new(EntityId(1), Vec2::ONE, Vec2::ONE, 10.0, false).is_none());
    }

    #[test]
    fn culled_only_past_margin() {
        let bounds = Vec2::new(800.0, 600.0);
        let mut p = Projectile::new(EntityId(1), Vec2::new(790.0, 300.0), Vec2::new(900.0, 300.0), 1.0, false)
            .unwrap();
        p.update(0.1, bounds); // x = 850, inside the margin
        assert!(!p.body.marked_for_deletion);
        p.update(0.1, bounds); // x = 910
        assert!(p.body.marked_for_deletion);
    }

    #[test]
    fn no_penetration_consumes_on_first_hit() {
        let mut p = shot(0.0, Role::Gunner);
        p.record_hit(EntityId(7));
        p.after_hit();
        assert!(p.body.marked_for_deletion);
    }

    #[test]
    fn penetration_allows_exactly_one_pass_through() {
        let mut p = shot(0.5, Role::Healer);
        p.record_hit(EntityId(7));
        p.after_hit();
        assert!(!p.body.marked_for_deletion);
        assert!((p.hit_damage() - 20.0).abs() < 1e-5);

        p.record_hit(EntityId(8));
        p.after_hit();
        assert!(p.body.marked_for_deletion);
    }

    #[test]
    fn giant_shots_never_penetrate() {
        let mut p = shot(0.875, Role::Giant);
        p.record_hit(EntityId(7));
        p.after_hit();
        assert!(p.body.marked_for_deletion);
        assert_eq!(p.hit_enemies.len(), 1);
    }
}
