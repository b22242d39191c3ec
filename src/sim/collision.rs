//! Collision and damage resolution
//!
//! Projectile hits, area splash, healing stations and body contact. Damage to
//! enemies only lands on authoritative peers; clients keep the hit-set and
//! visual bookkeeping and wait for the next world snapshot.

use glam::Vec2;

use super::enemy::{Enemy, EnemyKind};
use super::entity::{EntityId, PlayerKey, direction};
use super::player::{HealingStation, Player};
use super::state::{Authority, GameEvent, GamePhase, GameState, HitTier};
use crate::consts::*;
use crate::net::protocol::{EnemyKilled, MissionFailed, NetMessage};

/// Displacement for a blast at `center` pushing something at `target`.
///
/// Linear falloff from full `force` at the centre to zero at `reach`.
pub fn knockback(center: Vec2, target: Vec2, force: f32, reach: f32) -> Vec2 {
    let dist = center.distance(target);
    if dist >= reach || reach <= 0.0 {
        return Vec2::ZERO;
    }
    match direction(center, target) {
        Some(dir) => dir * force * (1.0 - dist / reach),
        None => Vec2::ZERO,
    }
}

/// Award kill rewards. Guarded by the deletion flag, so a second call for
/// the same enemy is a no-op returning false.
pub fn handle_enemy_death(state: &mut GameState, idx: usize, killer: Option<PlayerKey>) -> bool {
    let Some(enemy) = state.enemies.get_mut(idx) else {
        return false;
    };
    if enemy.body.marked_for_deletion {
        return false;
    }
    enemy.body.marked_for_deletion = true;
    let (id, kind, pos) = (enemy.id, enemy.kind, enemy.body.pos);
    let is_boss = kind == EnemyKind::Boss;

    state.events.push(GameEvent::Explosion {
        pos,
        particles: if is_boss { 50 } else { 15 },
    });
    if is_boss {
        state.shake.trigger(0.5, 20.0);
    } else {
        state.shake.trigger(0.1, 3.0);
    }

    state.score += kind.score_value();
    state.shards += kind.shard_value();

    if is_boss {
        log::info!("Boss destroyed on wave {}", state.wave);
    }
    match &killer {
        Some(PlayerKey::Local) => state.reward_local_kill(kind),
        Some(PlayerKey::Remote(peer)) if state.authority == Authority::Host => {
            state.outbox.push(NetMessage::EnemyKilled(EnemyKilled {
                killer_id: peer.clone(),
                enemy_id: id,
                kind,
            }));
        }
        _ => {}
    }

    state.events.push(GameEvent::EnemyKilled { id, kind, killer });
    true
}

/// Apply authoritative damage to one enemy and run death handling if this
/// crossed its hp to zero.
pub fn damage_enemy(
    state: &mut GameState,
    idx: usize,
    amount: f32,
    tier: HitTier,
    killer: Option<PlayerKey>,
) -> bool {
    let Some(enemy) = state.enemies.get_mut(idx) else {
        return false;
    };
    if !enemy.body.is_alive() {
        return false;
    }
    let pos = enemy.body.pos;
    let crossed = enemy.take_damage(amount);
    state.events.push(GameEvent::DamageNumber { pos, amount, tier });
    crossed && handle_enemy_death(state, idx, killer)
}

/// Area damage to every living enemy within `radius` (plus its own radius)
/// of `center`, skipping `exclude`.
pub fn splash(
    state: &mut GameState,
    center: Vec2,
    radius: f32,
    damage: f32,
    force: f32,
    exclude: Option<EntityId>,
    killer: Option<PlayerKey>,
) {
    state.events.push(GameEvent::Explosion { pos: center, particles: 30 });
    let authoritative = state.is_authoritative();

    for idx in 0..state.enemies.len() {
        let enemy = &state.enemies[idx];
        if !enemy.body.is_alive() || Some(enemy.id) == exclude {
            continue;
        }
        let pos = enemy.body.pos;
        let reach = radius + enemy.body.radius;
        if center.distance(pos) >= reach {
            continue;
        }

        if authoritative {
            if force > 0.0 {
                state.enemies[idx].body.pos += knockback(center, pos, force, reach);
            }
            damage_enemy(state, idx, damage, HitTier::Splash, killer.clone());
        } else {
            state.events.push(GameEvent::DamageNumber {
                pos,
                amount: damage,
                tier: HitTier::Splash,
            });
        }
    }
}

/// Hurt the local player and handle the death transition.
pub fn damage_local_player(state: &mut GameState, amount: f32) {
    if state.player.take_damage(amount) {
        local_player_down(state);
    }
}

fn local_player_down(state: &mut GameState) {
    if !state.is_multiplayer() {
        state.end_run();
        return;
    }
    log::info!("Local player down, spectating");
    state.player.die();
    state.events.push(GameEvent::PlayerDied(PlayerKey::Local));
    check_team_wipe(state);
}

/// Host-only: once every known player is dead, broadcast MISSION_FAILED
/// exactly once and end the run.
pub fn check_team_wipe(state: &mut GameState) {
    if state.authority != Authority::Host || state.mission_failed || !state.all_players_dead() {
        return;
    }
    log::info!("All players down, mission failed");
    state.mission_failed = true;
    state.outbox.push(NetMessage::MissionFailed(MissionFailed {
        wave: state.wave,
        score: state.score,
    }));
    state.end_run();
}

/// Full resolution pass: projectiles, stations, then body contact.
pub fn resolve(state: &mut GameState, dt: f32) {
    resolve_projectiles(state);
    update_stations(state, dt);
    resolve_contact(state);
}

fn resolve_projectiles(state: &mut GameState) {
    let authoritative = state.is_authoritative();

    for pi in 0..state.projectiles.len() {
        if !state.projectiles[pi].body.is_alive() {
            continue;
        }

        if state.projectiles[pi].is_enemy {
            let shot = &state.projectiles[pi];
            if shot.body.overlaps(state.player.pos(), state.player.body.radius) {
                state.projectiles[pi].body.marked_for_deletion = true;
                if state.player.is_alive() && !state.player.is_protected() {
                    state.shake.trigger(0.2, 5.0);
                    damage_local_player(state, ENEMY_PROJECTILE_DAMAGE);
                }
            }
            continue;
        }

        // First match wins, in enumeration order
        for ei in 0..state.enemies.len() {
            let shot = &state.projectiles[pi];
            if !shot.body.is_alive() {
                break;
            }
            let enemy = &state.enemies[ei];
            if !enemy.body.is_alive() || shot.has_hit(enemy.id) {
                continue;
            }
            if !enemy.body.overlaps(shot.body.pos, shot.body.radius) {
                continue;
            }
            let (enemy_id, enemy_pos) = (enemy.id, enemy.body.pos);

            let shot = &mut state.projectiles[pi];
            let amount = shot.hit_damage();
            shot.record_hit(enemy_id);
            let penetrating = shot.hit_enemies.len() > 1;
            let splashes = shot.splashes();
            let (impact, base_damage, owner) = (shot.body.pos, shot.damage, shot.owner.clone());
            shot.after_hit();

            let tier = if penetrating {
                state.shake.trigger(0.05, 1.0);
                HitTier::Penetrating
            } else {
                HitTier::Primary
            };
            state.events.push(GameEvent::Explosion {
                pos: enemy_pos,
                particles: if penetrating { 15 } else { 5 },
            });

            if authoritative {
                damage_enemy(state, ei, amount, tier, owner.clone());
            } else {
                state.events.push(GameEvent::DamageNumber {
                    pos: enemy_pos,
                    amount,
                    tier,
                });
            }

            if splashes {
                splash(
                    state,
                    impact,
                    GIANT_SPLASH_RADIUS,
                    base_damage * GIANT_SPLASH_FRACTION,
                    GIANT_SPLASH_KNOCKBACK,
                    Some(enemy_id),
                    owner,
                );
            }
        }
    }
}

/// Tick one station. Returns true once it is spent.
fn run_station(station: &mut HealingStation, dt: f32, enemies: &[Enemy], player: &mut Player) -> bool {
    station.timer -= dt;

    if player.is_alive() && station.covers(player.pos()) {
        player.heal(STATION_HEAL_RATE * dt);
    }

    let attackers = enemies
        .iter()
        .filter(|e| e.body.is_alive())
        .filter(|e| e.body.pos.distance(station.pos) < e.body.radius + STATION_CAPTURE_RADIUS)
        .count();
    station.take_damage(STATION_ENEMY_DPS * dt * attackers as f32);

    station.is_spent()
}

fn update_stations(state: &mut GameState, dt: f32) {
    if let Some(mut station) = state.player.healing_station.filter(|s| s.active) {
        let spent = run_station(&mut station, dt, &state.enemies, &mut state.player);
        if spent {
            state.player.healing_station = None;
            station_destroyed(state, PlayerKey::Local, station.pos);
        } else {
            state.player.healing_station = Some(station);
        }
    }

    let owners: Vec<_> = state
        .remotes
        .iter()
        .filter(|(_, r)| r.healing_station.is_some_and(|s| s.active))
        .map(|(id, _)| id.clone())
        .collect();
    for owner in owners {
        let Some(mut station) = state.remotes.get(&owner).and_then(|r| r.healing_station) else {
            continue;
        };
        let spent = run_station(&mut station, dt, &state.enemies, &mut state.player);
        if let Some(remote) = state.remotes.get_mut(&owner) {
            remote.healing_station = (!spent).then_some(station);
        }
        if spent {
            station_destroyed(state, PlayerKey::Remote(owner), station.pos);
        }
    }
}

fn station_destroyed(state: &mut GameState, owner: PlayerKey, pos: Vec2) {
    log::debug!("Healing station of {owner:?} destroyed");
    state.events.push(GameEvent::Explosion { pos, particles: 30 });
    state.events.push(GameEvent::StationDestroyed { owner, pos });
}

fn resolve_contact(state: &mut GameState) {
    for ei in 0..state.enemies.len() {
        if state.player.is_dead || state.phase != GamePhase::Playing {
            return;
        }
        let enemy = &state.enemies[ei];
        if enemy.body.is_alive() && enemy.body.overlaps(state.player.pos(), state.player.body.radius) {
            damage_local_player(state, CONTACT_DAMAGE);
        }
    }
}
