//! Arsenal upgrades and the power-up catalogue
//!
//! Upgrades are permanent for the run and paid with shards. Power-ups are
//! free picks offered every few waves.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ShopError;
use crate::net::protocol::{AbilityCast, NetMessage, RevivePlayer};
use crate::sim::collision::damage_enemy;
use crate::sim::entity::{PeerId, PlayerKey};
use crate::sim::player::TimedPowerUp;
use crate::sim::state::{GameEvent, GameState, HitTier};

/// Permanent stat upgrades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Upgrade {
    FireRate,
    MaxHp,
    Damage,
    Penetration,
}

impl Upgrade {
    pub const ALL: [Upgrade; 4] = [
        Upgrade::FireRate,
        Upgrade::MaxHp,
        Upgrade::Damage,
        Upgrade::Penetration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Upgrade::FireRate => "Rapid Fire",
            Upgrade::MaxHp => "Structural Integrity",
            Upgrade::Damage => "Plasma Tuning",
            Upgrade::Penetration => "Railgun Tech",
        }
    }

    pub fn base_cost(self) -> u32 {
        match self {
            Upgrade::FireRate => 20,
            Upgrade::MaxHp => 15,
            Upgrade::Damage => 25,
            Upgrade::Penetration => 40,
        }
    }

    pub fn max_level(self) -> u32 {
        match self {
            Upgrade::FireRate => 10,
            Upgrade::MaxHp => 20,
            Upgrade::Damage => 10,
            Upgrade::Penetration => 5,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Penetration fraction for an upgrade level
pub fn penetration_for_level(level: u32) -> f32 {
    if level == 0 {
        0.0
    } else {
        0.5 + (level - 1) as f32 * 0.125
    }
}

/// Purchased upgrade levels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arsenal {
    levels: [u32; 4],
}

impl Arsenal {
    pub fn level(&self, upgrade: Upgrade) -> u32 {
        self.levels[upgrade.slot()]
    }

    /// Price of the next level
    pub fn cost(&self, upgrade: Upgrade) -> u32 {
        upgrade.base_cost() * (self.level(upgrade) + 1)
    }

    pub fn can_buy(&self, upgrade: Upgrade, shards: u32) -> bool {
        self.level(upgrade) < upgrade.max_level() && shards >= self.cost(upgrade)
    }
}

/// Buy the next level of `upgrade` and apply it to the local player.
pub fn purchase(state: &mut GameState, upgrade: Upgrade) -> Result<u32, ShopError> {
    if state.player.is_dead {
        return Err(ShopError::PlayerDead);
    }
    if state.arsenal.level(upgrade) >= upgrade.max_level() {
        return Err(ShopError::MaxLevel);
    }
    let cost = state.arsenal.cost(upgrade);
    if state.shards < cost {
        return Err(ShopError::InsufficientShards {
            need: cost,
            have: state.shards,
        });
    }

    state.spend_shards(cost);
    let level = state.arsenal.level(upgrade) + 1;
    state.arsenal.levels[upgrade.slot()] = level;

    let player = &mut state.player;
    let base = player.role.stats();
    let glass = if player.power_ups.glass_cannon.active { 2.0 } else { 1.0 };
    match upgrade {
        Upgrade::FireRate => {
            player.fire_rate_mult = base.fire_rate_mult + level as f32 * 0.15;
        }
        Upgrade::MaxHp => {
            player.base_max_hp += 25.0;
            player.max_hp = player.base_max_hp / glass;
            player.hp = (player.hp + 25.0).min(player.max_hp);
        }
        Upgrade::Damage => {
            player.damage_mult = (base.damage_mult + level as f32 * 0.2) * glass;
        }
        Upgrade::Penetration => {
            player.penetration = penetration_for_level(level);
        }
    }
    log::info!("Bought {} level {level} for {cost} shards", upgrade.name());
    Ok(level)
}

/// Pay to bring a dead teammate back. The target's own peer applies the
/// revive when the message reaches it.
pub fn revive(state: &mut GameState, target: &PeerId) -> Result<(), ShopError> {
    if state.player.is_dead {
        return Err(ShopError::PlayerDead);
    }
    if !state.remotes.get(target).is_some_and(|r| r.is_dead) {
        return Err(ShopError::NoSuchTarget(target.to_string()));
    }
    if state.shards < REVIVE_COST {
        return Err(ShopError::InsufficientShards {
            need: REVIVE_COST,
            have: state.shards,
        });
    }

    state.spend_shards(REVIVE_COST);
    if let Some(remote) = state.remotes.get_mut(target) {
        remote.is_dead = false;
        remote.hp = remote.max_hp;
    }
    state.outbox.push(NetMessage::RevivePlayer(RevivePlayer {
        target_id: target.clone(),
    }));
    state
        .events
        .push(GameEvent::PlayerRevived(PlayerKey::Remote(target.clone())));
    log::info!("Revived {target}");
    Ok(())
}

/// Free power-up picks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerUp {
    Heal,
    OrbitalStrike,
    Shield,
    DoubleFire,
    Sword,
    GlassCannon,
}

impl PowerUp {
    pub const ALL: [PowerUp; 6] = [
        PowerUp::Heal,
        PowerUp::OrbitalStrike,
        PowerUp::Shield,
        PowerUp::DoubleFire,
        PowerUp::Sword,
        PowerUp::GlassCannon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PowerUp::Heal => "Emergency Repair",
            PowerUp::OrbitalStrike => "Orbital Strike",
            PowerUp::Shield => "Force Field",
            PowerUp::DoubleFire => "Twin Linked",
            PowerUp::Sword => "Energy Blade",
            PowerUp::GlassCannon => "Overclock",
        }
    }

    /// The timed slot this fills, `None` for instant effects
    pub fn timed(self) -> Option<TimedPowerUp> {
        match self {
            PowerUp::Heal | PowerUp::OrbitalStrike => None,
            PowerUp::Shield => Some(TimedPowerUp::Shield),
            PowerUp::DoubleFire => Some(TimedPowerUp::DoubleFire),
            PowerUp::Sword => Some(TimedPowerUp::Sword),
            PowerUp::GlassCannon => Some(TimedPowerUp::GlassCannon),
        }
    }

    pub fn apply(self, state: &mut GameState) {
        log::info!("Power-up applied: {}", self.name());
        match self.timed() {
            Some(kind) => state.player.grant(kind),
            None if self == PowerUp::Heal => state.player.full_heal(),
            None => orbital_strike(state),
        }
        state.events.push(GameEvent::PowerUpApplied(self));
    }
}

fn orbital_strike(state: &mut GameState) {
    let center = state.player.pos();
    state.shake.trigger(0.8, 25.0);
    if !state.is_authoritative() {
        state.outbox.push(NetMessage::AbilityActivated(AbilityCast::OrbitalStrike {
            x: center.x,
            y: center.y,
        }));
    }
    strike_around(state, center, Some(PlayerKey::Local));
}

/// Orbital strike damage around `center`. Clients only get the visuals.
pub fn strike_around(state: &mut GameState, center: Vec2, killer: Option<PlayerKey>) {
    let authoritative = state.is_authoritative();
    for idx in 0..state.enemies.len() {
        let enemy = &state.enemies[idx];
        if !enemy.body.is_alive() || enemy.body.pos.distance(center) >= ORBITAL_STRIKE_RADIUS {
            continue;
        }
        let pos = enemy.body.pos;
        state.events.push(GameEvent::Explosion { pos, particles: 30 });
        if authoritative {
            damage_enemy(state, idx, ORBITAL_STRIKE_DAMAGE, HitTier::Splash, killer.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::{Enemy, EnemyKind};
    use crate::sim::player::{RemotePlayer, Role};
    use crate::sim::state::Authority;

    fn solo(role: Role) -> GameState {
        GameState::new(5, role, Vec2::new(ARENA_WIDTH, ARENA_HEIGHT))
    }

    #[test]
    fn cost_scales_with_level() {
        let mut s = solo(Role::Gunner);
        s.shards = 1000;
        assert_eq!(s.arsenal.cost(Upgrade::FireRate), 20);
        purchase(&mut s, Upgrade::FireRate).unwrap();
        assert_eq!(s.arsenal.cost(Upgrade::FireRate), 40);
        assert_eq!(s.shards, 980);
        assert!((s.player.fire_rate_mult - (Role::Gunner.stats().fire_rate_mult + 0.15)).abs() < 1e-6);
    }

    #[test]
    fn purchase_rejects_when_poor_or_maxed() {
        let mut s = solo(Role::Gunner);
        s.shards = 10;
        assert_eq!(
            purchase(&mut s, Upgrade::Penetration),
            Err(ShopError::InsufficientShards { need: 40, have: 10 })
        );

        s.shards = 10_000;
        for _ in 0..5 {
            purchase(&mut s, Upgrade::Penetration).unwrap();
        }
        assert_eq!(purchase(&mut s, Upgrade::Penetration), Err(ShopError::MaxLevel));
        assert!((s.player.penetration - 1.0).abs() < 1e-6);
    }

    #[test]
    fn damage_upgrade_survives_glass_cannon_expiry() {
        let mut s = solo(Role::Giant);
        s.shards = 100;
        PowerUp::GlassCannon.apply(&mut s);
        purchase(&mut s, Upgrade::Damage).unwrap();
        s.player.update_timers(GLASS_CANNON_SECS + 0.01);
        assert!((s.player.damage_mult - 0.8).abs() < 1e-5);
    }

    #[test]
    fn max_hp_upgrade_raises_base() {
        let mut s = solo(Role::Gunner);
        s.shards = 15;
        s.player.hp = 50.0;
        purchase(&mut s, Upgrade::MaxHp).unwrap();
        assert_eq!(s.player.base_max_hp, 125.0);
        assert_eq!(s.player.max_hp, 125.0);
        assert_eq!(s.player.hp, 75.0);
    }

    #[test]
    fn revive_requires_dead_teammate_and_shards() {
        let mut s = solo(Role::Healer).with_authority(Authority::Host);
        let peer = PeerId::new("B");
        s.remotes.insert(peer.clone(), RemotePlayer::new(peer.clone(), Role::Giant, Vec2::ZERO));
        s.shards = 500;
        assert!(matches!(revive(&mut s, &peer), Err(ShopError::NoSuchTarget(_))));

        if let Some(r) = s.remotes.get_mut(&peer) {
            r.is_dead = true;
        }
        revive(&mut s, &peer).unwrap();
        assert_eq!(s.shards, 400);
        assert!(!s.remotes[&peer].is_dead);
        assert!(s.outbox.iter().any(|m| matches!(m, NetMessage::RevivePlayer(_))));
    }

    #[test]
    fn client_spends_are_sent_to_the_host() {
        let mut s = solo(Role::Gunner).with_authority(Authority::Client);
        s.shards = 60;
        purchase(&mut s, Upgrade::Damage).unwrap();
        assert_eq!(s.shards, 35);
        assert_eq!(s.shards_spent, 25);
        assert_eq!(
            s.outbox,
            vec![NetMessage::SpendShards(crate::net::protocol::SpendShards { amount: 25 })]
        );

        let mut host = solo(Role::Gunner).with_authority(Authority::Host);
        host.shards = 60;
        purchase(&mut host, Upgrade::Damage).unwrap();
        assert_eq!(host.shards_spent, 0);
        assert!(host.outbox.is_empty());
    }

    #[test]
    fn orbital_strike_hits_within_range() {
        let mut s = solo(Role::Gunner);
        let center = s.player.pos();
        let near = s.next_entity_id();
        s.enemies.push(Enemy::new(near, EnemyKind::Tank, center + Vec2::new(400.0, 0.0)));
        let far = s.next_entity_id();
        s.enemies.push(Enemy::new(far, EnemyKind::Basic, center + Vec2::new(0.0, 600.0)));

        PowerUp::OrbitalStrike.apply(&mut s);

        assert_eq!(s.enemies[0].hp, 150.0);
        assert_eq!(s.enemies[1].hp, 50.0);
    }

    #[test]
    fn client_strike_is_replicated_not_applied() {
        let mut s = solo(Role::Gunner).with_authority(Authority::Client);
        let center = s.player.pos();
        let id = s.next_entity_id();
        s.enemies.push(Enemy::new(id, EnemyKind::Basic, center));

        PowerUp::OrbitalStrike.apply(&mut s);

        assert_eq!(s.enemies[0].hp, 50.0);
        assert!(matches!(
            s.outbox.as_slice(),
            [NetMessage::AbilityActivated(AbilityCast::OrbitalStrike { .. })]
        ));
    }

    #[test]
    fn heal_restores_full_hp() {
        let mut s = solo(Role::Gunner);
        s.player.hp = 1.0;
        PowerUp::Heal.apply(&mut s);
        assert_eq!(s.player.hp, s.player.max_hp);
    }
}
