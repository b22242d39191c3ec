//! Difficulty curve
//!
//! Runs on its own clock, independent of the wave counter.

use serde::{Deserialize, Serialize};

use crate::consts::{ENTROPY_STEP, ENTROPY_WINDOW};

/// Enemy stat multipliers for the current difficulty level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Multipliers {
    pub hp: f32,
    pub speed: f32,
    pub damage: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntropySystem {
    pub time_elapsed: f32,
}

impl EntropySystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, dt: f32) {
        if dt > 0.0 {
            self.time_elapsed += dt;
        }
    }

    /// Steps by a fixed amount every window; never decreases.
    pub fn difficulty_level(&self) -> f32 {
        1.0 + (self.time_elapsed / ENTROPY_WINDOW).floor() * ENTROPY_STEP
    }

    pub fn multipliers(&self) -> Multipliers {
        let steps = self.difficulty_level() - 1.0;
        Multipliers {
            hp: 1.0 + steps * 0.4,
            speed: 1.0 + steps * 0.15,
            damage: 1.0 + steps * 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_steps_every_window() {
        let mut e = EntropySystem::new();
        assert_eq!(e.difficulty_level(), 1.0);
        e.update(19.9);
        assert_eq!(e.difficulty_level(), 1.0);
        e.update(0.2);
        assert!((e.difficulty_level() - 1.6).abs() < 1e-6);

        let m = e.multipliers();
        assert!((m.hp - 1.24).abs() < 1e-5);
        assert!((m.speed - 1.09).abs() < 1e-5);
        assert!((m.damage - 1.18).abs() < 1e-5);
    }

    proptest! {
        #[test]
        fn level_never_decreases(steps in proptest::collection::vec(-1.0f32..5.0, 1..100)) {
            let mut e = EntropySystem::new();
            let mut last = e.difficulty_level();
            for dt in steps {
                e.update(dt);
                let level = e.difficulty_level();
                prop_assert!(level >= last);
                last = level;
            }
        }
    }
}
