//! Autopilot
//!
//! A simple bot that plays the game from the outside, the same way a human
//! would: it produces [`TickInput`] and answers the shop screens. Used by
//! the headless runner for smoke runs and attract mode.

use glam::Vec2;

use crate::consts::*;
use crate::shop::{Upgrade, purchase, revive};
use crate::sim::enemy::Enemy;
use crate::sim::player::{AbilityState, Role};
use crate::sim::state::{GameState, Overlay};
use crate::sim::tick::TickInput;

/// Enemies closer than this push the bot away
const FLEE_RADIUS: f32 = 220.0;
/// Slams and stations are only worth it with company this close
const ABILITY_TRIGGER_RADIUS: f32 = 250.0;

fn living(state: &GameState) -> impl Iterator<Item = &Enemy> {
    state.enemies.iter().filter(|e| e.body.is_alive())
}

fn nearest_enemy(state: &GameState, from: Vec2) -> Option<&Enemy> {
    living(state).min_by(|a, b| {
        a.body
            .pos
            .distance_squared(from)
            .total_cmp(&b.body.pos.distance_squared(from))
    })
}

/// Decide this tick's input.
pub fn input_for(state: &GameState) -> TickInput {
    let player = &state.player;
    let pos = player.pos();
    let mut input = TickInput {
        aim: player.aim,
        ..TickInput::default()
    };
    if player.is_dead {
        return input;
    }

    // Steer away from crowding enemies with a weak pull back to the centre
    let mut push = (state.bounds / 2.0 - pos) * 0.002;
    for enemy in living(state) {
        let away = pos - enemy.body.pos;
        let dist = away.length();
        if dist > 0.0 && dist < FLEE_RADIUS {
            push += away / dist * (1.0 - dist / FLEE_RADIUS);
        }
    }
    input.movement = push.clamp_length_max(1.0);

    if player.role == Role::Gunner && player.is_ability_active {
        // Sweep the pointer over unmarked enemies, fire again once full
        let unmarked = living(state)
            .filter(|e| !player.marked_targets.contains(&e.id))
            .max_by(|a, b| a.max_hp.total_cmp(&b.max_hp));
        match unmarked {
            Some(enemy) if player.marked_targets.len() < player.max_targets => {
                input.aim = enemy.body.pos;
                input.fire = true;
            }
            _ => input.ability = true,
        }
        return input;
    }

    if let Some(target) = nearest_enemy(state, pos) {
        input.aim = target.body.pos;
        input.fire = true;

        if player.ability_state() == AbilityState::Ready {
            let crowd = living(state)
                .filter(|e| e.body.pos.distance(pos) < ABILITY_TRIGGER_RADIUS)
                .count();
            input.ability = match player.role {
                Role::Gunner => living(state).count() >= 2,
                Role::Giant => crowd >= 3,
                Role::Healer => player.hp < player.max_hp * 0.6 || crowd >= 4,
            };
        }
    }
    input
}

/// Answer whatever modal screen is open: take the first free power-up,
/// spend shards on the cheapest useful upgrades and pay for revives.
pub fn tend_overlays(state: &mut GameState) {
    if state.player.is_alive() && state.shards >= REVIVE_COST {
        let dead: Vec<_> = state.remotes.values().filter(|r| r.is_dead).map(|r| r.id.clone()).collect();
        for id in dead {
            if let Err(e) = revive(state, &id) {
                log::debug!("Autopilot revive skipped: {e}");
            }
        }
    }

    match state.overlay {
        Some(Overlay::PowerUpChoice(_)) => {
            if let Some(picked) = state.choose_power_up(0) {
                log::info!("Autopilot picked {}", picked.name());
            }
        }
        Some(Overlay::Arsenal) => {
            while let Some(upgrade) = cheapest_affordable(state) {
                if let Err(e) = purchase(state, upgrade) {
                    log::debug!("Autopilot purchase failed: {e}");
                    break;
                }
            }
            state.close_overlay();
        }
        None => {}
    }
}

fn cheapest_affordable(state: &GameState) -> Option<Upgrade> {
    Upgrade::ALL
        .into_iter()
        .filter(|u| state.arsenal.can_buy(*u, state.shards))
        .min_by_key(|u| state.arsenal.cost(*u))
}
