//! Host-authoritative session
//!
//! The room creator owns enemy hp, waves and currency. Every peer owns its
//! own avatar. Inbound messages are queued as they arrive and merged at the
//! end of the next tick; outbound traffic is whatever the simulation left in
//! `GameState::outbox` plus the periodic snapshots.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use glam::Vec2;
use rand::Rng;

use super::protocol::{
    AbilityCast, EnemyKilled, FireBullet, NetMessage, PlayerSnapshot, RestartMission, SpendShards,
    WorldSnapshot, decode,
};
use crate::consts::PROJECTILE_DAMAGE;
use crate::error::NetError;
use crate::shop::strike_around;
use crate::sim::collision::check_team_wipe;
use crate::sim::enemy::Enemy;
use crate::sim::entity::{PeerId, PlayerKey};
use crate::sim::projectile::Projectile;
use crate::sim::state::{GameEvent, GameState, HitTier, Overlay, PowerUpChoice};
use crate::sim::tick::{Reconciler, execute_marks, giant_slam};

/// Default PLAYER_SYNC period (seconds)
pub const PLAYER_SYNC_INTERVAL: f32 = 0.05;
/// Default WORLD_SYNC period (seconds)
pub const WORLD_SYNC_INTERVAL: f32 = 0.1;

const ROOM_ID_LEN: usize = 6;
const ROOM_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Outbound half of the peer channel.
pub trait Messenger {
    /// Send to every connected peer except those in `exclude`.
    fn broadcast(&mut self, msg: &NetMessage, exclude: &[PeerId]);
    /// Send to the room host. On the host itself this is a no-op.
    fn send_to_authority(&mut self, msg: &NetMessage);
}

/// Room establishment with the signalling broker.
pub trait Connector {
    fn create_room(&mut self, room: &str) -> Result<(), NetError>;
    /// Join `room`, returning the host's peer id.
    fn join_room(&mut self, room: &str) -> Result<PeerId, NetError>;
}

/// Random room code, six characters of uppercase base 36.
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_ID_LEN)
        .map(|_| ROOM_ID_ALPHABET[rng.random_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect()
}

/// Create a room under a fresh id, retrying once with a new id if the
/// broker reports a collision.
pub fn open_room<C, R>(connector: &mut C, rng: &mut R) -> Result<String, NetError>
where
    C: Connector + ?Sized,
    R: Rng + ?Sized,
{
    let room = generate_room_id(rng);
    match connector.create_room(&room) {
        Ok(()) => Ok(room),
        Err(NetError::RoomIdTaken) => {
            log::info!("Room id {room} taken, retrying");
            let room = generate_room_id(rng);
            connector.create_room(&room)?;
            Ok(room)
        }
        Err(e) => Err(e),
    }
}

/// Something that happened on the channel, merged at the next sync
#[derive(Debug)]
enum Inbound {
    Message(PeerId, NetMessage),
    Left(PeerId),
}

pub struct NetSession<M: Messenger> {
    local_id: PeerId,
    host_id: PeerId,
    messenger: M,
    inbox: VecDeque<Inbound>,
    /// Host only: shards debited on behalf of each client this run
    spent: BTreeMap<PeerId, u64>,
    /// Peers whose connection closed; late payloads from them are dropped
    departed: BTreeSet<PeerId>,
    player_sync_timer: f32,
    world_sync_timer: f32,
    pub player_sync_interval: f32,
    pub world_sync_interval: f32,
}

impl<M: Messenger> NetSession<M> {
    /// Session for the room creator.
    pub fn host(local_id: PeerId, messenger: M) -> Self {
        Self::new(local_id.clone(), local_id, messenger)
    }

    pub fn client(local_id: PeerId, host_id: PeerId, messenger: M) -> Self {
        Self::new(local_id, host_id, messenger)
    }

    fn new(local_id: PeerId, host_id: PeerId, messenger: M) -> Self {
        Self {
            local_id,
            host_id,
            messenger,
            inbox: VecDeque::new(),
            spent: BTreeMap::new(),
            departed: BTreeSet::new(),
            player_sync_timer: 0.0,
            world_sync_timer: 0.0,
            player_sync_interval: PLAYER_SYNC_INTERVAL,
            world_sync_interval: WORLD_SYNC_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, player_sync: f32, world_sync: f32) -> Self {
        self.player_sync_interval = player_sync;
        self.world_sync_interval = world_sync;
        self
    }

    pub fn is_host(&self) -> bool {
        self.local_id == self.host_id
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn host_id(&self) -> &PeerId {
        &self.host_id
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut M {
        &mut self.messenger
    }

    /// Number of messages waiting for the next merge
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Accept one raw payload from `from`. Malformed payloads are dropped;
    /// client messages that other clients need are relayed immediately.
    pub fn receive(&mut self, from: PeerId, raw: &str) -> Result<(), NetError> {
        let msg = match decode(raw) {
            Ok(msg) => msg,
            Err(e) => {
                log::warn!("Dropping payload from {from}: {e}");
                return Err(e);
            }
        };
        if from == self.local_id {
            log::debug!("Ignoring echo of own message");
            return Ok(());
        }
        if self.departed.contains(&from) {
            log::debug!("Ignoring late message from departed peer {from}");
            return Ok(());
        }
        if self.is_host() && msg.is_relayed() {
            self.messenger.broadcast(&msg, std::slice::from_ref(&from));
        }
        self.inbox.push_back(Inbound::Message(from, msg));
        Ok(())
    }

    /// The connection to `peer` closed. Its avatar is dropped at the next
    /// merge, after anything it sent before leaving.
    pub fn peer_left(&mut self, peer: PeerId) {
        if peer == self.local_id || !self.departed.insert(peer.clone()) {
            return;
        }
        self.inbox.push_back(Inbound::Left(peer));
    }

    /// Host only: start a new run everywhere with the same roles.
    pub fn restart_mission(&mut self, state: &mut GameState, seed: u64) {
        if !self.is_host() {
            log::debug!("Only the host can restart the mission");
            return;
        }
        state.restart(seed);
        self.spent.clear();
        self.messenger
            .broadcast(&NetMessage::RestartMission(RestartMission { seed }), &[]);
    }

    fn send(&mut self, msg: &NetMessage) {
        if self.is_host() {
            self.messenger.broadcast(msg, &[]);
        } else {
            self.messenger.send_to_authority(msg);
        }
    }

    fn flush_outbox(&mut self, state: &mut GameState) {
        for msg in std::mem::take(&mut state.outbox) {
            self.send(&msg);
        }
    }

    fn apply(&mut self, state: &mut GameState, from: PeerId, msg: NetMessage) {
        match msg {
            NetMessage::PlayerSync(snapshot) => self.apply_player(state, snapshot),
            NetMessage::FireBullet(shot) => spawn_remote_shot(state, from, &shot),
            NetMessage::WorldSync(world) => {
                if self.is_host() {
                    log::debug!("Host ignoring WORLD_SYNC from {from}");
                } else {
                    self.apply_world(state, world);
                }
            }
            NetMessage::RevivePlayer(revive) => {
                if revive.target_id == self.local_id {
                    if state.player.is_dead {
                        log::info!("Revived by {from}");
                        state.player.revive();
                        state.events.push(GameEvent::PlayerRevived(PlayerKey::Local));
                    }
                } else if let Some(remote) = state.remotes.get_mut(&revive.target_id) {
                    if remote.is_dead {
                        remote.is_dead = false;
                        remote.hp = remote.max_hp;
                        state
                            .events
                            .push(GameEvent::PlayerRevived(PlayerKey::Remote(revive.target_id)));
                    }
                }
            }
            NetMessage::MissionFailed(failed) => {
                log::info!("Mission failed on wave {} with score {}", failed.wave, failed.score);
                state.mission_failed = true;
                state.end_run();
            }
            NetMessage::RestartMission(restart) => {
                if !self.is_host() {
                    state.restart(restart.seed);
                }
            }
            NetMessage::PowerupPause(pause) => {
                if let Some(Overlay::PowerUpChoice(PowerUpChoice { time_left, .. })) = &mut state.overlay {
                    *time_left = Some(pause.duration);
                }
            }
            NetMessage::TriggerPowerup(trigger) => {
                if !self.is_host() {
                    log::info!("Host offered a power-up on wave {}", trigger.wave);
                    state.open_power_up_choice();
                }
            }
            NetMessage::AbilityActivated(cast) => {
                if self.is_host() {
                    apply_remote_ability(state, from, cast);
                } else {
                    show_remote_ability(state, &cast);
                }
            }
            NetMessage::SpendShards(SpendShards { amount }) => {
                if !self.is_host() {
                    return;
                }
                if state.shards < amount {
                    log::warn!("{from} spent {amount} shards with only {} banked", state.shards);
                }
                state.shards = state.shards.saturating_sub(amount);
                *self.spent.entry(from).or_default() += u64::from(amount);
            }
            NetMessage::EnemyKilled(EnemyKilled { killer_id, kind, .. }) => {
                if killer_id == self.local_id && !state.player.is_dead {
                    state.reward_local_kill(kind);
                }
            }
        }
    }

    fn remove_peer(&mut self, state: &mut GameState, peer: PeerId) {
        if !self.is_host() && peer == self.host_id {
            log::warn!("Host {peer} left, ending the run");
            state.remotes.remove(&peer);
            state.end_run();
            return;
        }
        if state.remotes.remove(&peer).is_some() {
            log::info!("Teammate {peer} left");
            state.events.push(GameEvent::PlayerLeft(peer));
            check_team_wipe(state);
        }
    }

    /// Adopt the host's enemy roster, wave and currency. Shards this client
    /// spent that the host has not debited yet stay deducted.
    fn apply_world(&self, state: &mut GameState, world: WorldSnapshot) {
        let acked = world.spent.get(&self.local_id).copied().unwrap_or(0);
        let pending = u32::try_from(state.shards_spent.saturating_sub(acked)).unwrap_or(u32::MAX);
        let shards = world.shards.saturating_sub(pending);
        adopt_world(state, world);
        state.shards = shards;
    }

    fn apply_player(&mut self, state: &mut GameState, snapshot: PlayerSnapshot) {
        if snapshot.id == self.local_id {
            return;
        }
        let id = snapshot.id.clone();
        let was_alive = match state.remotes.get_mut(&id) {
            Some(remote) => {
                let was_alive = remote.is_alive();
                snapshot.apply_to(remote);
                was_alive
            }
            None => {
                log::info!("Teammate {id} joined as {:?}", snapshot.role);
                state.remotes.insert(id.clone(), snapshot.to_remote());
                true
            }
        };

        if was_alive && snapshot.is_dead {
            log::info!("Teammate {id} down");
            state.events.push(GameEvent::PlayerDied(PlayerKey::Remote(id)));
            check_team_wipe(state);
        }
    }
}

fn spawn_remote_shot(state: &mut GameState, from: PeerId, shot: &FireBullet) {
    let id = state.next_entity_id();
    let origin = Vec2::new(shot.x, shot.y);
    let aim = Vec2::new(shot.tx, shot.ty);
    let damage = PROJECTILE_DAMAGE * shot.damage_mult;
    // Older peers omit the role; those shots never splash or penetrate
    let projectile = match shot.role {
        Some(role) => Projectile::player_shot(
            id,
            origin,
            aim,
            damage,
            role,
            shot.penetration,
            PlayerKey::Remote(from),
        ),
        None => Projectile::new(id, origin, aim, damage, false).map(|mut p| {
            p.owner = Some(PlayerKey::Remote(from));
            p
        }),
    };
    match projectile {
        Some(p) => state.projectiles.push(p),
        None => log::debug!("Remote shot with zero-length aim skipped"),
    }
}

fn adopt_world(state: &mut GameState, world: WorldSnapshot) {
    let mut enemies: Vec<Enemy> = world
        .enemies
        .iter()
        .map(|snap| {
            let pos = Vec2::new(snap.x, snap.y);
            let mut enemy = match state.enemy_index(snap.id) {
                Some(idx) if state.enemies[idx].kind == snap.kind => state.enemies[idx].clone(),
                _ => Enemy::new(snap.id, snap.kind, pos),
            };
            enemy.body.pos = pos;
            enemy.max_hp = snap.max_hp.unwrap_or(enemy.max_hp).max(snap.hp);
            enemy.hp = snap.hp.clamp(0.0, enemy.max_hp);
            enemy.body.marked_for_deletion = false;
            enemy
        })
        .collect();
    enemies.sort_by_key(|e| e.id);
    enemies.dedup_by_key(|e| e.id);

    if let Some(last) = enemies.last() {
        state.reserve_ids_through(last.id);
    }
    state.enemies = enemies;
    let enemies = &state.enemies;
    state
        .player
        .prune_marks(|id| enemies.binary_search_by_key(&id, |e| e.id).is_ok());

    if world.wave > state.wave {
        state.events.push(GameEvent::WaveStarted { wave: world.wave });
    }
    state.wave = world.wave;
    state.score = world.score;
}

/// Effects only; the host's next snapshot carries the damage.
fn show_remote_ability(state: &mut GameState, cast: &AbilityCast) {
    match cast {
        AbilityCast::GiantSlam { x, y } | AbilityCast::OrbitalStrike { x, y } => {
            state.events.push(GameEvent::Explosion {
                pos: Vec2::new(*x, *y),
                particles: 30,
            });
        }
        AbilityCast::DeadEye { targets, damage } => {
            for id in targets {
                if let Some(idx) = state.enemy_index(*id) {
                    let pos = state.enemies[idx].body.pos;
                    state.events.push(GameEvent::DamageNumber {
                        pos,
                        amount: *damage,
                        tier: HitTier::Execute,
                    });
                }
            }
        }
    }
}

fn apply_remote_ability(state: &mut GameState, from: PeerId, cast: AbilityCast) {
    let killer = Some(PlayerKey::Remote(from));
    match cast {
        AbilityCast::GiantSlam { x, y } => giant_slam(state, Vec2::new(x, y), killer),
        AbilityCast::DeadEye { targets, damage } => execute_marks(state, &targets, damage, killer),
        AbilityCast::OrbitalStrike { x, y } => strike_around(state, Vec2::new(x, y), killer),
    }
}

impl<M: Messenger> Reconciler for NetSession<M> {
    /// Merge queued messages, flush the simulation's outbox and send the
    /// periodic snapshots that are due.
    fn sync(&mut self, state: &mut GameState, dt: f32) {
        while let Some(inbound) = self.inbox.pop_front() {
            match inbound {
                Inbound::Message(from, msg) => self.apply(state, from, msg),
                Inbound::Left(peer) => self.remove_peer(state, peer),
            }
        }
        self.flush_outbox(state);

        self.player_sync_timer += dt;
        if self.player_sync_timer >= self.player_sync_interval {
            self.player_sync_timer = 0.0;
            let snapshot = PlayerSnapshot::from_player(self.local_id.clone(), &state.player, state.score);
            self.send(&NetMessage::PlayerSync(snapshot));
        }

        if self.is_host() {
            self.world_sync_timer += dt;
            if self.world_sync_timer >= self.world_sync_interval {
                self.world_sync_timer = 0.0;
                let mut world = WorldSnapshot::from_state(state);
                world.spent = self.spent.clone();
                self.messenger.broadcast(&NetMessage::WorldSync(world), &[]);
            }
        }
    }
}
