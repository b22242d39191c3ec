//! Game state and core simulation types
//!
//! Everything the tick mutates lives here. Rendering reads it and drains
//! `events`; the network session drains `outbox`.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::enemy::{Enemy, EnemyKind};
use super::entity::{EntityId, PeerId, PlayerKey, Target, TargetKind};
use super::entropy::EntropySystem;
use super::player::{Player, RemotePlayer, Role};
use super::projectile::Projectile;
use super::wave::WaveDirector;
use crate::consts::*;
use crate::net::protocol::{NetMessage, PowerUpPause, SpendShards, TriggerPowerUp};
use crate::shop::{Arsenal, PowerUp};

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Playing,
    /// Pause key (single-player only)
    Paused,
    GameOver,
}

/// Who owns enemy hp, waves and currency on this peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Solo,
    /// Room creator
    Host,
    Client,
}

impl Authority {
    pub fn is_authoritative(self) -> bool {
        matches!(self, Authority::Solo | Authority::Host)
    }

    pub fn is_multiplayer(self) -> bool {
        !matches!(self, Authority::Solo)
    }
}

/// Free power-up selection offered every few waves
#[derive(Debug, Clone, PartialEq)]
pub struct PowerUpChoice {
    pub options: Vec<PowerUp>,
    /// Auto-close countdown in multiplayer; `None` waits forever
    pub time_left: Option<f32>,
}

/// Modal shop screens
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Arsenal,
    PowerUpChoice(PowerUpChoice),
}

/// Visual tier of a damage number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTier {
    Primary,
    Penetrating,
    Splash,
    Execute,
}

/// Fire-and-forget notifications for the render/HUD layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Explosion { pos: Vec2, particles: u32 },
    DamageNumber { pos: Vec2, amount: f32, tier: HitTier },
    EnemyKilled { id: EntityId, kind: EnemyKind, killer: Option<PlayerKey> },
    StationDestroyed { owner: PlayerKey, pos: Vec2 },
    WaveStarted { wave: u32 },
    ArsenalOpened,
    PowerUpChoiceOpened,
    PowerUpApplied(PowerUp),
    PlayerDied(PlayerKey),
    PlayerRevived(PlayerKey),
    PlayerLeft(PeerId),
    RunEnded { score: u64, wave: u32 },
}

/// Camera shake. A new trigger replaces the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScreenShake {
    pub timer: f32,
    pub intensity: f32,
}

impl ScreenShake {
    pub fn trigger(&mut self, duration: f32, intensity: f32) {
        self.timer = duration;
        self.intensity = intensity;
    }

    pub fn update(&mut self, dt: f32) {
        if self.timer > 0.0 {
            self.timer -= dt;
            if self.timer <= 0.0 {
                self.timer = 0.0;
                self.intensity = 0.0;
            }
        }
    }
}

/// Complete simulation state for one peer
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    /// Arena size
    pub bounds: Vec2,
    pub phase: GamePhase,
    pub authority: Authority,

    /// Locally controlled avatar
    pub player: Player,
    /// Teammates keyed by peer id
    pub remotes: BTreeMap<PeerId, RemotePlayer>,
    /// Sorted by id
    pub enemies: Vec<Enemy>,
    pub projectiles: Vec<Projectile>,

    pub wave: u32,
    pub wave_timer: f32,
    pub director: WaveDirector,
    pub entropy: EntropySystem,

    pub score: u64,
    pub shards: u32,
    /// Client only: shards spent this run, reconciled against the host's ledger
    pub shards_spent: u64,
    pub arsenal: Arsenal,

    /// World time dilation (Dead Eye)
    pub time_scale: f32,
    pub shake: ScreenShake,
    pub overlay: Option<Overlay>,

    pub events: Vec<GameEvent>,
    /// Messages for the network session to send
    pub outbox: Vec<NetMessage>,
    /// MISSION_FAILED has been sent or received
    pub mission_failed: bool,

    next_id: u32,
}

impl GameState {
    /// Single-player run with the player centred in the arena.
    pub fn new(seed: u64, role: Role, bounds: Vec2) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            bounds,
            phase: GamePhase::Playing,
            authority: Authority::Solo,
            player: Player::new(role, bounds / 2.0),
            remotes: BTreeMap::new(),
            enemies: Vec::new(),
            projectiles: Vec::new(),
            wave: 1,
            wave_timer: 0.0,
            director: WaveDirector::new(),
            entropy: EntropySystem::new(),
            score: 0,
            shards: 0,
            shards_spent: 0,
            arsenal: Arsenal::default(),
            time_scale: 1.0,
            shake: ScreenShake::default(),
            overlay: None,
            events: Vec::new(),
            outbox: Vec::new(),
            mission_failed: false,
            next_id: 1,
        }
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Keep locally allocated ids clear of ids adopted from the host.
    pub fn reserve_ids_through(&mut self, id: EntityId) {
        self.next_id = self.next_id.max(id.0 + 1);
    }

    #[inline]
    pub fn is_authoritative(&self) -> bool {
        self.authority.is_authoritative()
    }

    #[inline]
    pub fn is_multiplayer(&self) -> bool {
        self.authority.is_multiplayer()
    }

    pub fn enemy_index(&self, id: EntityId) -> Option<usize> {
        self.enemies.binary_search_by_key(&id, |e| e.id).ok()
    }

    pub fn boss(&self) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.is_boss() && e.body.is_alive())
    }

    pub fn alive_player_count(&self) -> usize {
        usize::from(self.player.is_alive()) + self.remotes.values().filter(|r| r.is_alive()).count()
    }

    pub fn all_players_dead(&self) -> bool {
        self.alive_player_count() == 0
    }

    /// Enemy pursuit candidates: every active station if any exist,
    /// otherwise every living player. Local entries come first.
    pub fn pursuit_targets(&self) -> Vec<Target> {
        let local_station = self
            .player
            .healing_station
            .filter(|s| s.active)
            .map(|s| (PlayerKey::Local, s.pos));
        let remote_stations = self.remotes.iter().filter_map(|(id, r)| {
            r.healing_station
                .filter(|s| s.active)
                .map(|s| (PlayerKey::Remote(id.clone()), s.pos))
        });
        let stations: Vec<Target> = local_station
            .into_iter()
            .chain(remote_stations)
            .map(|(owner, pos)| Target {
                kind: TargetKind::Station(owner),
                pos,
                radius: STATION_CAPTURE_RADIUS,
            })
            .collect();
        if !stations.is_empty() {
            return stations;
        }

        let mut players = Vec::with_capacity(1 + self.remotes.len());
        if self.player.is_alive() {
            players.push(Target {
                kind: TargetKind::Player(PlayerKey::Local),
                pos: self.player.pos(),
                radius: self.player.body.radius,
            });
        }
        players.extend(self.remotes.iter().filter(|(_, r)| r.is_alive()).map(|(id, r)| Target {
            kind: TargetKind::Player(PlayerKey::Remote(id.clone())),
            pos: r.body.pos,
            radius: r.body.radius,
        }));
        players
    }

    /// Whether the current overlay freezes the local simulation.
    pub fn overlay_pauses(&self) -> bool {
        match &self.overlay {
            None => false,
            Some(Overlay::Arsenal) => !self.is_multiplayer() || self.alive_player_count() <= 1,
            Some(Overlay::PowerUpChoice(_)) => !self.is_multiplayer(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == GamePhase::Playing && !self.overlay_pauses()
    }

    pub fn open_arsenal(&mut self) {
        if self.player.is_dead || self.phase == GamePhase::GameOver {
            return;
        }
        self.overlay = Some(Overlay::Arsenal);
        self.events.push(GameEvent::ArsenalOpened);
    }

    /// Offer a random selection of power-ups. The host also tells every
    /// client how long the window stays open.
    pub fn open_power_up_choice(&mut self) {
        if self.player.is_dead || self.phase == GamePhase::GameOver {
            return;
        }
        let mut pool = PowerUp::ALL.to_vec();
        pool.shuffle(&mut self.rng);
        pool.truncate(POWERUP_CHOICES);

        let time_left = self.is_multiplayer().then_some(POWERUP_CHOICE_SECS);
        if self.authority == Authority::Host {
            self.outbox.push(NetMessage::PowerupPause(PowerUpPause {
                duration: POWERUP_CHOICE_SECS,
            }));
        }
        self.overlay = Some(Overlay::PowerUpChoice(PowerUpChoice {
            options: pool,
            time_left,
        }));
        self.events.push(GameEvent::PowerUpChoiceOpened);
    }

    /// Pick option `index` from the open power-up choice.
    pub fn choose_power_up(&mut self, index: usize) -> Option<PowerUp> {
        let picked = match &self.overlay {
            Some(Overlay::PowerUpChoice(choice)) => choice.options.get(index).copied()?,
            _ => return None,
        };
        self.overlay = None;
        picked.apply(self);
        Some(picked)
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    /// Count down a multiplayer choice window on real time.
    pub fn update_overlay(&mut self, real_dt: f32) {
        let expired = match &mut self.overlay {
            Some(Overlay::PowerUpChoice(PowerUpChoice {
                time_left: Some(t), ..
            })) => {
                *t -= real_dt;
                *t <= 0.0
            }
            _ => false,
        };
        if expired {
            log::debug!("Power-up choice expired without a pick");
            self.overlay = None;
        }
    }

    /// Take `amount` shards from the counter. A client also asks the host to
    /// debit the authoritative total.
    pub fn spend_shards(&mut self, amount: u32) {
        self.shards = self.shards.saturating_sub(amount);
        if self.authority == Authority::Client {
            self.shards_spent += u64::from(amount);
            self.outbox.push(NetMessage::SpendShards(SpendShards { amount }));
        }
    }

    /// Rewards for the local player landing a killing blow.
    pub fn reward_local_kill(&mut self, kind: EnemyKind) {
        if kind == EnemyKind::Boss {
            self.player.full_heal();
            self.open_arsenal();
        } else if self.player.lifesteal > 0.0 {
            let amount = self.player.lifesteal;
            self.player.heal(amount);
        }
    }

    /// Advance the wave counter (authoritative peers only).
    pub fn advance_wave(&mut self) {
        self.wave += 1;
        log::info!("Wave {} started", self.wave);
        self.events.push(GameEvent::WaveStarted { wave: self.wave });
        if self.wave % POWERUP_WAVE_INTERVAL == 0 {
            if self.authority == Authority::Host {
                self.outbox
                    .push(NetMessage::TriggerPowerup(TriggerPowerUp { wave: self.wave }));
            }
            self.open_power_up_choice();
        }
    }

    /// Terminal transition; fires at most once per run.
    pub fn end_run(&mut self) {
        if self.phase == GamePhase::GameOver {
            return;
        }
        log::info!("Run ended on wave {} with score {}", self.wave, self.score);
        self.phase = GamePhase::GameOver;
        self.overlay = None;
        self.time_scale = 1.0;
        self.events.push(GameEvent::RunEnded {
            score: self.score,
            wave: self.wave,
        });
    }

    /// Start a fresh run with the same role, authority and teammates.
    pub fn restart(&mut self, seed: u64) {
        let role = self.player.role;
        let mut fresh = GameState::new(seed, role, self.bounds).with_authority(self.authority);
        fresh.remotes = std::mem::take(&mut self.remotes);
        for remote in fresh.remotes.values_mut() {
            *remote = RemotePlayer::new(remote.id.clone(), remote.role, self.bounds / 2.0);
        }
        log::info!("Restarting run with seed {seed}");
        *self = fresh;
    }
}
