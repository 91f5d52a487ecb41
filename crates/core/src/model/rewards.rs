use serde::{Deserialize, Serialize};

use crate::model::StudyMode;

/// Gamification coefficients supplied by the backend.
///
/// The aliases accept the settings record's historical column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCoefficients {
    #[serde(alias = "xp_per_correct_answer")]
    pub xp_per_correct: u32,
    pub xp_per_correct_hard_mode: u32,
    #[serde(alias = "coins_per_correct_answer")]
    pub coins_per_correct: u32,
    pub coins_per_correct_hard_mode: u32,
}

impl Default for RewardCoefficients {
    fn default() -> Self {
        Self {
            xp_per_correct: 50,
            xp_per_correct_hard_mode: 100,
            coins_per_correct: 10,
            coins_per_correct_hard_mode: 20,
        }
    }
}

impl RewardCoefficients {
    /// XP granted per correct answer in the given mode.
    #[must_use]
    pub fn xp_for(&self, mode: StudyMode) -> u32 {
        match mode {
            StudyMode::Zen => self.xp_per_correct,
            StudyMode::Hard => self.xp_per_correct_hard_mode,
        }
    }

    /// Coins granted per correct answer in the given mode.
    #[must_use]
    pub fn coins_for(&self, mode: StudyMode) -> u32 {
        match mode {
            StudyMode::Zen => self.coins_per_correct,
            StudyMode::Hard => self.coins_per_correct_hard_mode,
        }
    }
}

/// XP and currency granted for one answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reward {
    pub xp: u32,
    pub coins: u32,
}

impl Reward {
    pub const ZERO: Reward = Reward { xp: 0, coins: 0 };

    /// Compute the reward for one answer.
    ///
    /// Total over all inputs: an incorrect answer earns zero, and missing
    /// coefficients fall back to the built-in defaults instead of failing.
    #[must_use]
    pub fn for_answer(
        is_correct: bool,
        mode: StudyMode,
        coefficients: Option<&RewardCoefficients>,
    ) -> Reward {
        if !is_correct {
            return Reward::ZERO;
        }
        let defaults = RewardCoefficients::default();
        let coefficients = coefficients.unwrap_or(&defaults);
        Reward {
            xp: coefficients.xp_for(mode),
            coins: coefficients.coins_for(mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_answer_earns_nothing() {
        let coefficients = RewardCoefficients::default();
        let reward = Reward::for_answer(false, StudyMode::Hard, Some(&coefficients));
        assert_eq!(reward, Reward::ZERO);
    }

    #[test]
    fn hard_mode_uses_hard_coefficients() {
        let coefficients = RewardCoefficients {
            xp_per_correct_hard_mode: 100,
            coins_per_correct_hard_mode: 33,
            ..RewardCoefficients::default()
        };
        let reward = Reward::for_answer(true, StudyMode::Hard, Some(&coefficients));
        assert_eq!(reward.xp, 100);
        assert_eq!(reward.coins, 33);
    }

    #[test]
    fn missing_coefficients_fall_back_by_mode() {
        let zen = Reward::for_answer(true, StudyMode::Zen, None);
        let hard = Reward::for_answer(true, StudyMode::Hard, None);
        assert_eq!((zen.xp, zen.coins), (50, 10));
        assert_eq!((hard.xp, hard.coins), (100, 20));
    }
}
