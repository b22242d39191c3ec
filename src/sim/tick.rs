//! Simulation tick
//!
//! One ordered pass per rendered frame. The order matters: timers before
//! firing, firing before movement, movement before enemies, and collision
//! resolution last so every hp change of the tick is settled before the
//! sweep and the network exchange.

use glam::Vec2;

use super::collision::{self, damage_enemy, splash};
use super::enemy::EnemyIntent;
use super::entity::{EntityId, PlayerKey, Target};
use super::player::{HealingStation, Role};
use super::projectile::Projectile;
use super::state::{Authority, GameEvent, GamePhase, GameState, HitTier, Overlay};
use crate::consts::*;
use crate::net::protocol::{AbilityCast, FireBullet, NetMessage};

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Movement axes, each in [-1, 1]
    pub movement: Vec2,
    /// Pointer position in world coordinates
    pub aim: Vec2,
    /// Primary action engaged (pointer down, touch, aim stick)
    pub fire: bool,
    /// Ability key pressed this tick
    pub ability: bool,
    /// Pause key pressed this tick
    pub pause: bool,
    /// Arsenal key pressed this tick
    pub arsenal: bool,
}

/// Merges remote state into the simulation at the end of a tick.
pub trait Reconciler {
    fn sync(&mut self, state: &mut GameState, dt: f32);
}

/// Advance the game by one frame of `dt` real seconds.
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32, mut net: Option<&mut dyn Reconciler>) {
    let dt = if dt.is_finite() { dt.clamp(0.0, MAX_FRAME_DT) } else { 0.0 };

    handle_menu_input(state, input);
    state.update_overlay(dt);
    if !state.is_running() {
        if let Some(net) = net.as_deref_mut() {
            net.sync(state, dt);
        }
        return;
    }

    // World time is scaled by bullet time; the local player is compensated
    let world_dt = dt * state.time_scale;
    let player_dt = if state.time_scale < 1.0 && state.time_scale > 0.0 {
        world_dt / state.time_scale
    } else {
        world_dt
    };

    state.shake.update(dt);
    state.entropy.update(world_dt);
    state.player.update_timers(player_dt);
    state.player.aim = input.aim;

    if input.ability && state.player.is_alive() {
        if state.player.role == Role::Gunner && state.player.is_ability_active {
            execute_dead_eye(state);
        } else if state.player.try_use_ability() {
            activate_ability(state);
        }
    }

    let dead_eye = state.player.role == Role::Gunner && state.player.is_ability_active;
    if dead_eye {
        update_dead_eye(state, input, world_dt);
    } else {
        state.time_scale = 1.0;
        fire(state, input, player_dt);
    }

    apply_swords(state, world_dt);

    if state.is_authoritative() {
        state.wave_timer += world_dt;
        if state.wave_timer >= WAVE_DURATION {
            state.wave_timer = 0.0;
            state.advance_wave();
        }
    }

    let mults = state.entropy.multipliers();
    let wave = state.wave;
    state.director.set_difficulty(wave, mults.hp, mults.speed);

    state.player.apply_movement(input.movement, player_dt);
    let bounds = state.bounds;
    state.player.clamp_to(bounds);
    for remote in state.remotes.values_mut() {
        remote.advance_sword(world_dt);
    }

    update_enemies(state, world_dt);

    for projectile in &mut state.projectiles {
        projectile.update(world_dt, bounds);
    }

    collision::resolve(state, world_dt);

    sweep(state);

    if let Some(net) = net {
        net.sync(state, dt);
    }
}

fn handle_menu_input(state: &mut GameState, input: &TickInput) {
    if input.pause {
        if state.is_multiplayer() {
            log::debug!("Pause ignored in multiplayer");
        } else {
            state.phase = match state.phase {
                GamePhase::Playing => GamePhase::Paused,
                GamePhase::Paused => GamePhase::Playing,
                GamePhase::GameOver => GamePhase::GameOver,
            };
        }
    }

    if input.arsenal && state.phase == GamePhase::Playing {
        match state.overlay {
            Some(Overlay::Arsenal) => state.close_overlay(),
            None => state.open_arsenal(),
            Some(Overlay::PowerUpChoice(_)) => {}
        }
    }
}

fn activate_ability(state: &mut GameState) {
    let pos = state.player.pos();
    log::debug!("{:?} ability activated", state.player.role);
    match state.player.role {
        Role::Gunner => {
            state.player.active_timer = DEAD_EYE_WINDOW;
            state.player.marked_targets.clear();
            state.time_scale = BULLET_TIME_SCALE;
        }
        Role::Giant => {
            state.player.active_timer = GIANT_ACTIVE_SECS;
            state.player.is_invincible = true;
            if state.authority == Authority::Client {
                state
                    .outbox
                    .push(NetMessage::AbilityActivated(AbilityCast::GiantSlam { x: pos.x, y: pos.y }));
            }
            giant_slam(state, pos, Some(PlayerKey::Local));
            state.shake.trigger(0.8, 25.0);
        }
        Role::Healer => {
            state.player.healing_station = Some(HealingStation::deploy(pos));
            // Instant cast
            state.player.is_ability_active = false;
        }
    }
}

/// Giant slam shockwave centred on `center`.
pub fn giant_slam(state: &mut GameState, center: Vec2, killer: Option<PlayerKey>) {
    splash(
        state,
        center,
        GIANT_SLAM_RADIUS,
        GIANT_SLAM_DAMAGE,
        GIANT_SLAM_KNOCKBACK,
        None,
        killer,
    );
}

fn update_dead_eye(state: &mut GameState, input: &TickInput, world_dt: f32) {
    state.time_scale = BULLET_TIME_SCALE;
    state.player.active_timer -= DEAD_EYE_DECAY * world_dt;

    if input.fire {
        let picked = state
            .enemies
            .iter()
            .find(|e| e.body.is_alive() && e.body.pos.distance(input.aim) < e.body.radius + DEAD_EYE_PICK_RADIUS)
            .map(|e| e.id);
        if let Some(id) = picked {
            state.player.mark_target(id);
        }
    }

    if state.player.active_timer <= 0.0 {
        execute_dead_eye(state);
    }
}

/// Resolve Dead Eye: hit every still-living mark, then restore normal time.
fn execute_dead_eye(state: &mut GameState) {
    let targets = std::mem::take(&mut state.player.marked_targets);
    let damage = DEAD_EYE_DAMAGE * state.player.damage_mult;
    state.player.deactivate_ability();
    state.time_scale = 1.0;

    if targets.is_empty() {
        return;
    }
    if state.authority == Authority::Client {
        state.outbox.push(NetMessage::AbilityActivated(AbilityCast::DeadEye {
            targets: targets.clone(),
            damage,
        }));
    }
    execute_marks(state, &targets, damage, Some(PlayerKey::Local));
}

/// Apply execute damage to each listed enemy that still exists.
pub fn execute_marks(state: &mut GameState, targets: &[EntityId], damage: f32, killer: Option<PlayerKey>) {
    let authoritative = state.is_authoritative();
    for &id in targets {
        let Some(idx) = state.enemy_index(id) else {
            continue;
        };
        let enemy = &state.enemies[idx];
        if !enemy.body.is_alive() {
            continue;
        }
        let pos = enemy.body.pos;
        state.events.push(GameEvent::Explosion { pos, particles: 20 });
        if authoritative {
            damage_enemy(state, idx, damage, HitTier::Execute, killer.clone());
        } else {
            state.events.push(GameEvent::DamageNumber {
                pos,
                amount: damage,
                tier: HitTier::Execute,
            });
        }
    }
}

/// Rate-limited firing. The timer is clamped rather than zeroed so the
/// sub-frame remainder carries into the next shot.
fn fire(state: &mut GameState, input: &TickInput, dt: f32) {
    let interval = state.player.fire_interval();
    state.player.fire_timer += dt;
    state.player.is_firing = input.fire && state.player.is_alive();

    if state.player.is_firing {
        let mut shots = 0;
        while state.player.fire_timer >= interval && shots < MAX_SHOTS_PER_TICK {
            state.player.fire_timer -= interval;
            shots += 1;
            fire_volley(state, input.aim);
        }
    }
    state.player.fire_timer = state.player.fire_timer.min(interval);
}

fn fire_volley(state: &mut GameState, aim: Vec2) {
    let pos = state.player.pos();
    let barrels: &[f32] = if state.player.power_ups.double_fire.active {
        &[-DOUBLE_FIRE_OFFSET, DOUBLE_FIRE_OFFSET]
    } else {
        &[0.0]
    };
    let damage = PROJECTILE_DAMAGE * state.player.damage_mult;

    for &offset in barrels {
        let from = pos + Vec2::new(offset, 0.0);
        let id = state.next_entity_id();
        let Some(shot) = Projectile::player_shot(
            id,
            from,
            aim,
            damage,
            state.player.role,
            state.player.penetration,
            PlayerKey::Local,
        ) else {
            log::debug!("Shot skipped: aim point on the barrel");
            continue;
        };
        state.projectiles.push(shot);

        if state.is_multiplayer() {
            state.outbox.push(NetMessage::FireBullet(FireBullet {
                x: from.x,
                y: from.y,
                tx: aim.x,
                ty: aim.y,
                damage_mult: state.player.damage_mult,
                role: Some(state.player.role),
                penetration: state.player.penetration,
            }));
        }
    }
    state.shake.trigger(0.1, 2.0);
}

/// Continuous blade damage. Authoritative peers apply the local blade and,
/// on the host, every teammate blade reported by snapshots.
fn apply_swords(state: &mut GameState, world_dt: f32) {
    if !state.is_authoritative() {
        return;
    }
    let mut blades: Vec<(Vec2, PlayerKey)> = Vec::new();
    if state.player.is_alive() {
        if let Some(tip) = state.player.sword_tip() {
            blades.push((tip, PlayerKey::Local));
        }
    }
    for (id, remote) in &state.remotes {
        if let Some(tip) = remote.sword_tip() {
            blades.push((tip, PlayerKey::Remote(id.clone())));
        }
    }

    let damage = SWORD_DPS * world_dt;
    for (tip, owner) in blades {
        for idx in 0..state.enemies.len() {
            let enemy = &state.enemies[idx];
            if enemy.body.is_alive() && enemy.body.pos.distance(tip) < enemy.body.radius + SWORD_HIT_RADIUS {
                damage_enemy(state, idx, damage, HitTier::Primary, Some(owner.clone()));
            }
        }
    }
}

fn nearest<'a>(targets: &'a [Target], from: Vec2) -> Option<&'a Target> {
    targets.iter().fold(None, |best: Option<&Target>, t| match best {
        Some(b) if b.pos.distance_squared(from) <= t.pos.distance_squared(from) => Some(b),
        _ => Some(t),
    })
}

fn update_enemies(state: &mut GameState, world_dt: f32) {
    if state.is_authoritative() {
        let bounds = state.bounds;
        if let Some(spawn) = state.director.update(world_dt, &state.enemies, bounds, &mut state.rng) {
            let id = state.next_entity_id();
            log::debug!("Spawned {:?} as {:?}", spawn.kind, id);
            state.enemies.push(spawn.into_enemy(id));
        }
    }

    let targets = state.pursuit_targets();
    let mut intents = Vec::new();
    for enemy in state.enemies.iter_mut().filter(|e| e.body.is_alive()) {
        let Some(target) = nearest(&targets, enemy.body.pos) else {
            continue;
        };
        if let Some(intent) = enemy.update(world_dt, target) {
            intents.push(intent);
        }
    }

    for EnemyIntent::Fire { from, at } in intents {
        let id = state.next_entity_id();
        if let Some(shot) = Projectile::new(id, from, at, ENEMY_PROJECTILE_DAMAGE, true) {
            state.projectiles.push(shot);
        }
    }
}

/// Drop flagged entities and any Dead Eye marks that pointed at them.
fn sweep(state: &mut GameState) {
    state.projectiles.retain(|p| p.body.is_alive());
    state.enemies.retain(|e| e.body.is_alive());
    let enemies = &state.enemies;
    state
        .player
        .prune_marks(|id| enemies.binary_search_by_key(&id, |e| e.id).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::enemy::{Enemy, EnemyKind};
    use crate::sim::entity::PeerId;
    use crate::sim::player::RemotePlayer;
    use proptest::prelude::*;

    fn solo(role: Role) -> GameState {
        GameState::new(11, role, Vec2::new(ARENA_WIDTH, ARENA_HEIGHT))
    }

    fn spawn(state: &mut GameState, kind: EnemyKind, pos: Vec2) -> EntityId {
        let id = state.next_entity_id();
        state.enemies.push(Enemy::new(id, kind, pos));
        id
    }

    fn idle() -> TickInput {
        TickInput::default()
    }

    #[test]
    fn first_press_fires_immediately() {
        let mut s = solo(Role::Healer);
        let input = TickInput {
            fire: true,
            aim: Vec2::new(0.0, 0.0),
            ..idle()
        };
        tick(&mut s, &input, SIM_DT, None);
        assert_eq!(s.projectiles.iter().filter(|p| !p.is_enemy).count(), 1);
    }

    #[test]
    fn catch_up_is_capped_at_three_shots() {
        let mut s = solo(Role::Healer);
        s.player.fire_rate_mult = 10.0;
        let input = TickInput {
            fire: true,
            aim: Vec2::ZERO,
            ..idle()
        };
        tick(&mut s, &input, 1.0, None);
        assert_eq!(s.projectiles.iter().filter(|p| !p.is_enemy).count(), 3);
        assert!(s.player.fire_timer <= s.player.fire_interval());
    }

    #[test]
    fn double_fire_spawns_two_barrels() {
        let mut s = solo(Role::Healer);
        s.player.grant(crate::sim::player::TimedPowerUp::DoubleFire);
        let input = TickInput {
            fire: true,
            aim: Vec2::new(640.0, 0.0),
            ..idle()
        };
        tick(&mut s, &input, SIM_DT, None);
        assert_eq!(s.projectiles.len(), 2);
    }

    #[test]
    fn pause_toggles_in_solo_only() {
        let mut s = solo(Role::Gunner);
        let press = TickInput { pause: true, ..idle() };
        tick(&mut s, &press, SIM_DT, None);
        assert_eq!(s.phase, GamePhase::Paused);
        let before = s.entropy.time_elapsed;
        tick(&mut s, &idle(), SIM_DT, None);
        assert_eq!(s.entropy.time_elapsed, before);
        tick(&mut s, &press, SIM_DT, None);
        assert_eq!(s.phase, GamePhase::Playing);

        let mut mp = solo(Role::Gunner).with_authority(Authority::Host);
        tick(&mut mp, &press, SIM_DT, None);
        assert_eq!(mp.phase, GamePhase::Playing);
    }

    #[test]
    fn arsenal_key_toggles_overlay() {
        let mut s = solo(Role::Gunner);
        let press = TickInput { arsenal: true, ..idle() };
        tick(&mut s, &press, SIM_DT, None);
        assert_eq!(s.overlay, Some(Overlay::Arsenal));
        assert!(!s.is_running());
        tick(&mut s, &press, SIM_DT, None);
        assert_eq!(s.overlay, None);
    }

    #[test]
    fn dead_eye_marks_and_executes() {
        let mut s = solo(Role::Gunner);
        let target = spawn(&mut s, EnemyKind::Basic, Vec2::new(900.0, 360.0));
        spawn(&mut s, EnemyKind::Basic, Vec2::new(200.0, 100.0));

        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        assert!(s.player.is_ability_active);
        assert_eq!(s.time_scale, BULLET_TIME_SCALE);

        let aim = s.enemies[0].body.pos;
        tick(&mut s, &TickInput { fire: true, aim, ..idle() }, SIM_DT, None);
        tick(&mut s, &TickInput { fire: true, aim, ..idle() }, SIM_DT, None);
        assert_eq!(s.player.marked_targets, vec![target]);
        assert!(s.projectiles.iter().all(|p| p.is_enemy));

        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        assert!(!s.player.is_ability_active);
        assert_eq!(s.time_scale, 1.0);
        assert!(s.enemy_index(target).is_none());
        assert_eq!(s.score, EnemyKind::Basic.score_value());
        assert!(s.events.iter().any(|e| matches!(
            e,
            GameEvent::DamageNumber {
                tier: HitTier::Execute,
                ..
            }
        )));
    }

    #[test]
    fn dead_eye_with_no_marks_expires_quietly() {
        let mut s = solo(Role::Gunner);
        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        for _ in 0..400 {
            tick(&mut s, &idle(), SIM_DT, None);
        }
        assert!(!s.player.is_ability_active);
        assert_eq!(s.time_scale, 1.0);
        assert_eq!(s.score, 0);
    }

    #[test]
    fn bullet_time_does_not_slow_the_player() {
        let mut s = solo(Role::Gunner);
        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        let start = s.player.pos();
        let right = TickInput {
            movement: Vec2::X,
            ..idle()
        };
        tick(&mut s, &right, SIM_DT, None);
        let moved = s.player.pos().x - start.x;
        assert!((moved - s.player.speed * SIM_DT).abs() < 1e-3);
    }

    #[test]
    fn bullet_time_slows_the_world() {
        let mut s = solo(Role::Gunner);
        let enemy = spawn(&mut s, EnemyKind::Basic, Vec2::new(100.0, 100.0));
        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        assert_eq!(s.time_scale, BULLET_TIME_SCALE);

        let shot_id = s.next_entity_id();
        let shot = Projectile::new(shot_id, Vec2::new(100.0, 600.0), Vec2::new(0.0, 600.0), 10.0, true).unwrap();
        s.projectiles.push(shot);

        let idx = s.enemy_index(enemy).unwrap();
        let (enemy_start, enemy_speed) = (s.enemies[idx].body.pos, s.enemies[idx].speed);
        let shot_speed = s.projectiles[0].vel.length();
        let entropy_start = s.entropy.time_elapsed;
        let wave_start = s.wave_timer;

        tick(&mut s, &idle(), SIM_DT, None);

        let world_dt = SIM_DT * BULLET_TIME_SCALE;
        let idx = s.enemy_index(enemy).unwrap();
        let enemy_moved = s.enemies[idx].body.pos.distance(enemy_start);
        assert!((enemy_moved - enemy_speed * world_dt).abs() < 1e-3);
        let shot = s.projectiles.iter().find(|p| p.id == shot_id).unwrap();
        assert!((shot.body.pos.x - (100.0 - shot_speed * world_dt)).abs() < 1e-3);
        assert!((s.entropy.time_elapsed - entropy_start - world_dt).abs() < 1e-6);
        assert!((s.wave_timer - wave_start - world_dt).abs() < 1e-6);
    }

    #[test]
    fn giant_slam_hits_the_ring_and_grants_invincibility() {
        let mut s = solo(Role::Giant);
        let center = s.player.pos();
        let near = spawn(&mut s, EnemyKind::Basic, center + Vec2::new(100.0, 0.0));
        let far = spawn(&mut s, EnemyKind::Basic, center + Vec2::new(0.0, 340.0));

        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        assert!(s.player.is_invincible);
        assert!(s.enemy_index(near).is_none());
        assert!(s.enemy_index(far).is_some());
        assert_eq!(s.shake.intensity, 25.0);
    }

    #[test]
    fn healer_deploys_station_instantly() {
        let mut s = solo(Role::Healer);
        tick(&mut s, &TickInput { ability: true, ..idle() }, SIM_DT, None);
        assert!(!s.player.is_ability_active);
        let station = s.player.healing_station.unwrap();
        assert!(station.active);
        assert!(s.player.ability_timer > 0.0);
    }

    #[test]
    fn wave_advances_and_offers_power_up() {
        let mut s = solo(Role::Giant);
        s.player.is_invincible = true;
        for _ in 0..210 {
            tick(&mut s, &idle(), 0.1, None);
        }
        assert_eq!(s.wave, 2);
        assert!(matches!(s.overlay, Some(Overlay::PowerUpChoice(_))));
        assert!(!s.is_running());
    }

    #[test]
    fn clients_never_spawn_and_announce_shots() {
        let mut s = solo(Role::Healer).with_authority(Authority::Client);
        s.remotes.insert(
            PeerId::new("HOST"),
            RemotePlayer::new(PeerId::new("HOST"), Role::Giant, Vec2::ZERO),
        );
        let input = TickInput {
            fire: true,
            aim: Vec2::ZERO,
            ..idle()
        };
        for _ in 0..100 {
            tick(&mut s, &input, 0.1, None);
        }
        assert!(s.enemies.is_empty());
        assert_eq!(s.wave, 1);
        assert!(s.outbox.iter().any(|m| matches!(m, NetMessage::FireBullet(_))));
    }

    #[test]
    fn enemies_chase_the_nearest_player() {
        let mut s = solo(Role::Giant).with_authority(Authority::Host);
        let far_peer = PeerId::new("B");
        s.remotes.insert(
            far_peer.clone(),
            RemotePlayer::new(far_peer.clone(), Role::Healer, Vec2::new(100.0, 100.0)),
        );
        let id = spawn(&mut s, EnemyKind::Basic, Vec2::new(90.0, 50.0));
        tick(&mut s, &idle(), SIM_DT, None);
        let enemy = &s.enemies[s.enemy_index(id).unwrap()];
        assert_eq!(
            enemy.target,
            Some(crate::sim::entity::TargetKind::Player(PlayerKey::Remote(far_peer)))
        );
    }

    #[test]
    fn same_seed_same_run() {
        let run = || {
            let mut s = solo(Role::Giant);
            s.player.is_invincible = true;
            let input = TickInput {
                fire: true,
                aim: Vec2::new(0.0, 0.0),
                ..idle()
            };
            for _ in 0..600 {
                tick(&mut s, &input, SIM_DT, None);
            }
            (s.score, s.enemies.len(), s.enemies.iter().map(|e| e.body.pos).collect::<Vec<_>>())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn nearest_prefers_earlier_on_ties() {
        let a = Target {
            kind: crate::sim::entity::TargetKind::Player(PlayerKey::Local),
            pos: Vec2::new(10.0, 0.0),
            radius: 1.0,
        };
        let mut b = a.clone();
        b.pos = Vec2::new(-10.0, 0.0);
        b.kind = crate::sim::entity::TargetKind::Player(PlayerKey::Remote(PeerId::new("X")));
        let targets = [a.clone(), b];
        assert_eq!(nearest(&targets, Vec2::ZERO), Some(&a));
    }

    fn arb_input() -> impl Strategy<Value = TickInput> {
        (
            -1.0f32..1.0,
            -1.0f32..1.0,
            0.0f32..ARENA_WIDTH,
            0.0f32..ARENA_HEIGHT,
            any::<bool>(),
            prop::bool::weighted(0.02),
        )
            .prop_map(|(mx, my, ax, ay, fire, ability)| TickInput {
                movement: Vec2::new(mx, my),
                aim: Vec2::new(ax, ay),
                fire,
                ability,
                ..TickInput::default()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn hp_stays_in_bounds(
            seed in any::<u64>(),
            role in prop::sample::select(Role::ALL.to_vec()),
            inputs in prop::collection::vec(arb_input(), 1..300),
        ) {
            let mut s = GameState::new(seed, role, Vec2::new(ARENA_WIDTH, ARENA_HEIGHT));
            for input in &inputs {
                tick(&mut s, input, 0.05, None);
                prop_assert!(s.player.hp >= 0.0 && s.player.hp <= s.player.max_hp);
                for e in &s.enemies {
                    prop_assert!(e.hp >= 0.0 && e.hp <= e.max_hp);
                }
                if s.phase == GamePhase::GameOver {
                    break;
                }
            }
        }
    }
}
