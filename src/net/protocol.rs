//! Wire protocol
//!
//! Every message is `{"type": "...", "payload": {...}}` with camelCase payload
//! fields. Inbound payloads are validated before they touch the simulation.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::sim::enemy::{Enemy, EnemyKind};
use crate::sim::entity::{EntityId, PeerId};
use crate::sim::player::{HealingStation, Player, PowerUpFlags, RemotePlayer, Role};
use crate::sim::state::GameState;

/// Messages exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetMessage {
    // Periodic full avatar snapshot, relayed by the host.
    PlayerSync(PlayerSnapshot),
    // Remote shot spawn request, relayed by the host.
    FireBullet(FireBullet),
    // Authoritative enemy roster, wave and currency (host to all).
    WorldSync(WorldSnapshot),
    RevivePlayer(RevivePlayer),
    MissionFailed(MissionFailed),
    RestartMission(RestartMission),
    // Length of the free power-up window.
    PowerupPause(PowerUpPause),
    TriggerPowerup(TriggerPowerUp),
    // Client ability; the host applies the damage, everyone shows it.
    AbilityActivated(AbilityCast),
    // Client shard purchase the host debits from the shared counter.
    SpendShards(SpendShards),
    // Host tells a client it landed a killing blow.
    EnemyKilled(EnemyKilled),
}

impl NetMessage {
    /// Client-originated messages the host forwards to every other client.
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            NetMessage::PlayerSync(_)
                | NetMessage::FireBullet(_)
                | NetMessage::RevivePlayer(_)
                | NetMessage::AbilityActivated(_)
        )
    }

    /// Reject payloads with non-finite numbers or impossible values.
    pub fn validate(&self) -> Result<(), NetError> {
        match self {
            NetMessage::PlayerSync(s) => s.validate(),
            NetMessage::FireBullet(f) => {
                require_finite(&[f.x, f.y, f.tx, f.ty, f.damage_mult, f.penetration])?;
                require(f.damage_mult >= 0.0, "negative damage multiplier")?;
                require(f.penetration >= 0.0, "negative penetration")
            }
            NetMessage::WorldSync(w) => {
                for e in &w.enemies {
                    require_finite(&[e.x, e.y, e.hp])?;
                    require(e.hp >= 0.0, "negative enemy hp")?;
                    if let Some(max) = e.max_hp {
                        require(max.is_finite() && max > 0.0, "bad enemy max hp")?;
                    }
                }
                Ok(())
            }
            NetMessage::RevivePlayer(r) => require(!r.target_id.as_str().is_empty(), "empty revive target"),
            NetMessage::MissionFailed(_)
            | NetMessage::RestartMission(_)
            | NetMessage::TriggerPowerup(_)
            | NetMessage::SpendShards(_) => Ok(()),
            NetMessage::EnemyKilled(k) => require(!k.killer_id.as_str().is_empty(), "empty killer id"),
            NetMessage::PowerupPause(p) => {
                require(p.duration.is_finite() && p.duration >= 0.0, "bad pause duration")
            }
            NetMessage::AbilityActivated(cast) => match cast {
                AbilityCast::GiantSlam { x, y } | AbilityCast::OrbitalStrike { x, y } => require_finite(&[*x, *y]),
                AbilityCast::DeadEye { damage, .. } => {
                    require(damage.is_finite() && *damage >= 0.0, "bad execute damage")
                }
            },
        }
    }
}

fn require(cond: bool, reason: &str) -> Result<(), NetError> {
    if cond {
        Ok(())
    } else {
        Err(NetError::Malformed(reason.to_string()))
    }
}

fn require_finite(values: &[f32]) -> Result<(), NetError> {
    require(values.iter().all(|v| v.is_finite()), "non-finite number")
}

/// Serialize a message for the wire.
pub fn encode(msg: &NetMessage) -> Result<String, NetError> {
    serde_json::to_string(msg).map_err(|e| NetError::Encode(e.to_string()))
}

/// Parse and validate an inbound payload.
pub fn decode(raw: &str) -> Result<NetMessage, NetError> {
    let msg: NetMessage = serde_json::from_str(raw).map_err(|e| NetError::Malformed(e.to_string()))?;
    msg.validate()?;
    Ok(msg)
}

/// Healing station as carried inside a player snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSnapshot {
    pub active: bool,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hp: f32,
    pub max_hp: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<f32>,
}

impl From<&HealingStation> for StationSnapshot {
    fn from(s: &HealingStation) -> Self {
        Self {
            active: s.active,
            x: s.pos.x,
            y: s.pos.y,
            radius: s.radius,
            hp: s.hp,
            max_hp: s.max_hp,
            timer: Some(s.timer),
        }
    }
}

impl StationSnapshot {
    pub fn to_station(self) -> HealingStation {
        HealingStation {
            pos: Vec2::new(self.x, self.y),
            radius: self.radius,
            timer: self.timer.unwrap_or(crate::consts::STATION_LIFETIME),
            hp: self.hp.clamp(0.0, self.max_hp),
            max_hp: self.max_hp,
            active: self.active,
        }
    }
}

/// One player's self-reported state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PeerId,
    pub role: Role,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub is_dead: bool,
    pub score: u64,
    pub is_firing: bool,
    pub aim_x: f32,
    pub aim_y: f32,
    #[serde(default)]
    pub healing_station: Option<StationSnapshot>,
    #[serde(default)]
    pub power_ups: Option<PowerUpFlags>,
}

impl PlayerSnapshot {
    pub fn from_player(id: PeerId, player: &Player, score: u64) -> Self {
        Self {
            id,
            role: player.role,
            x: player.body.pos.x,
            y: player.body.pos.y,
            hp: player.hp,
            max_hp: player.max_hp,
            is_dead: player.is_dead,
            score,
            is_firing: player.is_firing,
            aim_x: player.aim.x,
            aim_y: player.aim.y,
            healing_station: player.healing_station.as_ref().map(StationSnapshot::from),
            power_ups: Some(PowerUpFlags::from(&player.power_ups)),
        }
    }

    fn validate(&self) -> Result<(), NetError> {
        require(!self.id.as_str().is_empty(), "empty player id")?;
        require_finite(&[self.x, self.y, self.hp, self.max_hp, self.aim_x, self.aim_y])?;
        require(self.max_hp > 0.0, "non-positive max hp")?;
        if let Some(s) = &self.healing_station {
            require_finite(&[s.x, s.y, s.radius, s.hp, s.max_hp])?;
            require(s.max_hp > 0.0 && s.radius > 0.0, "bad station")?;
            if let Some(t) = s.timer {
                require(t.is_finite(), "bad station timer")?;
            }
        }
        Ok(())
    }

    /// Overwrite a remote projection with this snapshot. Hp is clamped so a
    /// sloppy sender cannot break the hp bounds.
    pub fn apply_to(&self, remote: &mut RemotePlayer) {
        remote.role = self.role;
        remote.body.pos = Vec2::new(self.x, self.y);
        remote.max_hp = self.max_hp;
        remote.hp = self.hp.clamp(0.0, self.max_hp);
        remote.is_dead = self.is_dead;
        remote.score = self.score;
        remote.is_firing = self.is_firing;
        remote.aim = Vec2::new(self.aim_x, self.aim_y);
        remote.healing_station = self
            .healing_station
            .filter(|s| s.active)
            .map(StationSnapshot::to_station);
        remote.power_ups = self.power_ups.unwrap_or_default();
    }

    pub fn to_remote(&self) -> RemotePlayer {
        let mut remote = RemotePlayer::new(self.id.clone(), self.role, Vec2::new(self.x, self.y));
        self.apply_to(&mut remote);
        remote
    }
}

/// A shot fired by a remote player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireBullet {
    pub x: f32,
    pub y: f32,
    pub tx: f32,
    pub ty: f32,
    pub damage_mult: f32,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub penetration: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemySnapshot {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    #[serde(default)]
    pub max_hp: Option<f32>,
}

impl From<&Enemy> for EnemySnapshot {
    fn from(e: &Enemy) -> Self {
        Self {
            id: e.id,
            kind: e.kind,
            x: e.body.pos.x,
            y: e.body.pos.y,
            hp: e.hp,
            max_hp: Some(e.max_hp),
        }
    }
}

/// Authoritative world state broadcast by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    pub enemies: Vec<EnemySnapshot>,
    pub wave: u32,
    pub shards: u32,
    #[serde(default)]
    pub score: u64,
    /// Running total of SPEND_SHARDS the host has debited, per client
    #[serde(default)]
    pub spent: BTreeMap<PeerId, u64>,
}

impl WorldSnapshot {
    pub fn from_state(state: &GameState) -> Self {
        Self {
            enemies: state
                .enemies
                .iter()
                .filter(|e| e.body.is_alive())
                .map(EnemySnapshot::from)
                .collect(),
            wave: state.wave,
            shards: state.shards,
            score: state.score,
            spent: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevivePlayer {
    pub target_id: PeerId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionFailed {
    #[serde(default)]
    pub wave: u32,
    #[serde(default)]
    pub score: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartMission {
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpPause {
    pub duration: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerPowerUp {
    #[serde(default)]
    pub wave: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendShards {
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyKilled {
    pub killer_id: PeerId,
    pub enemy_id: EntityId,
    #[serde(rename = "type")]
    pub kind: EnemyKind,
}

/// Ability effects a client asks the host to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ability", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbilityCast {
    GiantSlam { x: f32, y: f32 },
    DeadEye { targets: Vec<EntityId>, damage: f32 },
    OrbitalStrike { x: f32, y: f32 },
}
