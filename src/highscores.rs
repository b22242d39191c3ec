//! High-water marks
//!
//! Best score and best wave, read at startup and written when a finished run
//! beats either of them.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::persistence::{Storage, load_json, save_json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScores {
    pub best_score: u64,
    pub best_wave: u32,
}

impl HighScores {
    /// Storage key
    const STORAGE_KEY: &'static str = "antigravity_highscores";

    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a finished run. Returns true if either mark improved.
    pub fn record(&mut self, score: u64, wave: u32) -> bool {
        let mut improved = false;
        if score > self.best_score {
            self.best_score = score;
            improved = true;
        }
        if wave > self.best_wave {
            self.best_wave = wave;
            improved = true;
        }
        improved
    }

    /// Load from storage. Missing or unreadable data starts fresh.
    pub fn load<S: Storage + ?Sized>(store: &S) -> Self {
        match load_json(store, Self::STORAGE_KEY) {
            Ok(Some(scores)) => {
                log::info!("Loaded high scores: {scores:?}");
                scores
            }
            Ok(None) => {
                log::info!("No high scores found, starting fresh");
                Self::new()
            }
            Err(e) => {
                log::warn!("Ignoring stored high scores: {e}");
                Self::new()
            }
        }
    }

    pub fn save<S: Storage + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        save_json(store, Self::STORAGE_KEY, self)?;
        log::info!("High scores saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::tests::MemoryStore;

    #[test]
    fn record_keeps_each_mark_independently() {
        let mut hs = HighScores::new();
        assert!(hs.record(500, 3));
        assert!(hs.record(200, 7));
        assert_eq!(hs, HighScores { best_score: 500, best_wave: 7 });
        assert!(!hs.record(100, 2));
    }

    #[test]
    fn load_survives_corruption() {
        let store = MemoryStore::default();
        store.write(HighScores::STORAGE_KEY, "garbage").unwrap();
        assert_eq!(HighScores::load(&store), HighScores::new());

        let hs = HighScores { best_score: 1950, best_wave: 6 };
        hs.save(&store).unwrap();
        assert_eq!(HighScores::load(&store), hs);
        assert!(store.items.borrow()[HighScores::STORAGE_KEY].contains("bestScore"));
    }
}
