//! Runtime settings
//!
//! Persisted separately from high scores.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::StoreError;
use crate::net::session::{PLAYER_SYNC_INTERVAL, WORLD_SYNC_INTERVAL};
use crate::persistence::{Storage, load_json, save_json};
use crate::sim::player::Role;

/// Smallest arena edge the simulation accepts
const MIN_ARENA_EDGE: f32 = 200.0;
/// Fastest allowed snapshot cadence (seconds)
const MIN_SYNC_INTERVAL: f32 = 1.0 / 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Arena ===
    pub arena_width: f32,
    pub arena_height: f32,
    /// Fixed run seed; `None` draws a fresh one per run
    pub seed: Option<u64>,
    /// Role for new runs
    pub role: Role,

    // === Network ===
    /// Seconds between PLAYER_SYNC messages
    pub player_sync_interval: f32,
    /// Seconds between WORLD_SYNC messages (host only)
    pub world_sync_interval: f32,
    /// Give up on creating or joining a room after this long
    pub connect_timeout_secs: f32,

    // === Headless runner ===
    /// Simulated seconds before the autopilot stops
    pub autopilot_secs: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            arena_width: ARENA_WIDTH,
            arena_height: ARENA_HEIGHT,
            seed: None,
            role: Role::Gunner,

            player_sync_interval: PLAYER_SYNC_INTERVAL,
            world_sync_interval: WORLD_SYNC_INTERVAL,
            connect_timeout_secs: 10.0,

            autopilot_secs: 120.0,
        }
    }
}

impl Settings {
    /// Storage key
    const STORAGE_KEY: &'static str = "antigravity_settings";

    pub fn bounds(&self) -> Vec2 {
        Vec2::new(self.arena_width, self.arena_height)
    }

    /// Seed for the next run
    pub fn run_seed(&self) -> u64 {
        self.seed.unwrap_or_else(crate::platform::random_seed)
    }

    /// Replace out-of-range values with usable ones.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let fix = |value: f32, min: f32, fallback: f32| {
            if value.is_finite() && value >= min { value } else { fallback }
        };
        self.arena_width = fix(self.arena_width, MIN_ARENA_EDGE, defaults.arena_width);
        self.arena_height = fix(self.arena_height, MIN_ARENA_EDGE, defaults.arena_height);
        self.player_sync_interval = fix(
            self.player_sync_interval,
            MIN_SYNC_INTERVAL,
            defaults.player_sync_interval,
        );
        self.world_sync_interval = fix(
            self.world_sync_interval,
            MIN_SYNC_INTERVAL,
            defaults.world_sync_interval,
        );
        self.connect_timeout_secs = fix(self.connect_timeout_secs, 0.0, defaults.connect_timeout_secs);
        self.autopilot_secs = fix(self.autopilot_secs, 0.0, defaults.autopilot_secs);
        self
    }

    /// Load from storage, falling back to defaults.
    pub fn load<S: Storage + ?Sized>(store: &S) -> Self {
        match load_json::<Self, _>(store, Self::STORAGE_KEY) {
            Ok(Some(settings)) => {
                log::info!("Loaded settings");
                settings.sanitized()
            }
            Ok(None) => {
                log::info!("Using default settings");
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring stored settings: {e}");
                Self::default()
            }
        }
    }

    pub fn save<S: Storage + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        save_json(store, Self::STORAGE_KEY, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::tests::MemoryStore;

    #[test]
    fn partial_documents_fill_in_defaults() {
        let store = MemoryStore::default();
        store
            .write(Settings::STORAGE_KEY, r#"{"role":"HEALER","seed":42}"#)
            .unwrap();
        let s = Settings::load(&store);
        assert_eq!(s.role, Role::Healer);
        assert_eq!(s.run_seed(), 42);
        assert_eq!(s.arena_width, ARENA_WIDTH);
    }

    #[test]
    fn saved_settings_load_back() {
        let store = MemoryStore::default();
        let s = Settings {
            seed: Some(7),
            role: Role::Giant,
            autopilot_secs: 30.0,
            ..Settings::default()
        };
        s.save(&store).unwrap();
        assert!(store.items.borrow()[Settings::STORAGE_KEY].contains("autopilotSecs"));
        assert_eq!(Settings::load(&store), s);
    }

    #[test]
    fn nonsense_values_are_replaced() {
        let s = Settings {
            arena_width: -5.0,
            player_sync_interval: 0.0,
            world_sync_interval: f32::NAN,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(s, Settings::default());
    }
}
