//! Default leveled interval policy

use serde::{Deserialize, Serialize};

use super::{IntervalPolicy, PolicyInput, Rating, Transition};
use crate::error::{EngineError, Result};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Base interval per level: levels 0-1 hard, 2 medium, 3-5 easy
pub const DEFAULT_BASE_INTERVALS: [u32; 6] = [1, 2, 3, 4, 8, 16];

/// Lower difficulty factor bound
pub const MIN_DIFFICULTY_FACTOR: f64 = 1.3;

/// Difficulty factor for a freshly registered item
pub const DEFAULT_DIFFICULTY_FACTOR: f64 = 2.5;

/// Longest interval the default policy will schedule
pub const MAX_INTERVAL_DAYS: u32 = 365;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tunables for [`LevelledPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Base interval in days indexed by level; the last entry seeds geometric growth
    pub base_intervals: Vec<u32>,
    pub min_interval_days: u32,
    pub max_interval_days: u32,
    pub min_difficulty_factor: f64,
    /// Levels lost on Again
    pub again_level_penalty: u32,
    pub again_factor_penalty: f64,
    pub hard_factor_penalty: f64,
    pub hard_multiplier: f64,
    /// Levels gained on Easy
    pub easy_level_bonus: u32,
    pub easy_factor_bonus: f64,
    pub easy_multiplier: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_intervals: DEFAULT_BASE_INTERVALS.to_vec(),
            min_interval_days: 1,
            max_interval_days: MAX_INTERVAL_DAYS,
            min_difficulty_factor: MIN_DIFFICULTY_FACTOR,
            again_level_penalty: 2,
            again_factor_penalty: 0.2,
            hard_factor_penalty: 0.05,
            hard_multiplier: 1.2,
            easy_level_bonus: 2,
            easy_factor_bonus: 0.15,
            easy_multiplier: 1.3,
        }
    }
}

impl PolicyConfig {
    /// Reject configurations that would break the policy's guarantees
    pub fn validate(&self) -> Result<()> {
        if self.base_intervals.is_empty() || self.base_intervals.contains(&0) {
            return Err(EngineError::Validation(
                "baseIntervals must be non-empty and strictly positive".into(),
            ));
        }
        if self.min_interval_days == 0 || self.min_interval_days > self.max_interval_days {
            return Err(EngineError::Validation(format!(
                "interval bounds must satisfy 1 <= min ({}) <= max ({})",
                self.min_interval_days, self.max_interval_days
            )));
        }
        // Item States are checked against the fixed floor
        if !self.min_difficulty_factor.is_finite()
            || self.min_difficulty_factor < MIN_DIFFICULTY_FACTOR
        {
            return Err(EngineError::Validation(format!(
                "minDifficultyFactor must be at least {}, got {}",
                MIN_DIFFICULTY_FACTOR, self.min_difficulty_factor
            )));
        }
        let multipliers = [self.hard_multiplier, self.easy_multiplier];
        if multipliers.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(EngineError::Validation(
                "interval multipliers must be positive".into(),
            ));
        }
        let adjustments = [
            self.again_factor_penalty,
            self.hard_factor_penalty,
            self.easy_factor_bonus,
        ];
        if adjustments.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(EngineError::Validation(
                "difficulty factor adjustments must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// POLICY
// ============================================================================

/// Bucketed leveling with difficulty-factor growth
///
/// | Rating | Level       | Difficulty factor | Interval                    |
/// |--------|-------------|-------------------|-----------------------------|
/// | Again  | `level - 2` | `- 0.2`           | 1 day                       |
/// | Hard   | unchanged   | `- 0.05`          | `prev * 1.2`                |
/// | Good   | `level + 1` | unchanged         | `prev * df` (or bucket base)|
/// | Easy   | `level + 2` | `+ 0.15`          | `prev * df * 1.3`           |
#[derive(Debug, Clone, Default)]
pub struct LevelledPolicy {
    config: PolicyConfig,
}

impl LevelledPolicy {
    /// Create a policy from a validated configuration
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Round half away from zero and clamp into the configured interval bounds
    fn clamp_days(&self, days: f64) -> u32 {
        let min = self.config.min_interval_days;
        let max = self.config.max_interval_days;
        if days.is_nan() {
            return min;
        }
        let rounded = days.round();
        if rounded >= f64::from(max) {
            max
        } else if rounded <= f64::from(min) {
            min
        } else {
            rounded as u32
        }
    }

    fn floor_factor(&self, factor: f64) -> f64 {
        factor.max(self.config.min_difficulty_factor)
    }
}

impl IntervalPolicy for LevelledPolicy {
    fn base_interval(&self, level: u32, difficulty_factor: f64) -> u32 {
        let table = &self.config.base_intervals;
        let last_index = table.len().saturating_sub(1);
        let index = level as usize;
        if index <= last_index {
            return self.clamp_days(f64::from(table[index]));
        }

        let seed = f64::from(table[last_index]);
        // Exponent is bounded; anything this large is far past the cap anyway
        let steps = (index - last_index).min(4096) as i32;
        let grown = seed * self.floor_factor(difficulty_factor).powi(steps);
        self.clamp_days(grown)
    }

    fn transition(&self, input: &PolicyInput, rating: Rating) -> Transition {
        let cfg = &self.config;
        let level = input.level;
        let factor = self.floor_factor(input.difficulty_factor);
        let previous = input
            .previous_interval_days
            .unwrap_or_else(|| self.base_interval(level, factor));
        let previous_f = f64::from(previous);

        match rating {
            Rating::Again => Transition {
                level: level.saturating_sub(cfg.again_level_penalty),
                difficulty_factor: self.floor_factor(factor - cfg.again_factor_penalty),
                interval_days: self.clamp_days(1.0),
                resets_streak: true,
            },
            Rating::Hard => Transition {
                level,
                difficulty_factor: self.floor_factor(factor - cfg.hard_factor_penalty),
                interval_days: self.clamp_days(previous_f * cfg.hard_multiplier),
                resets_streak: false,
            },
            Rating::Good => {
                let next_level = level.saturating_add(1);
                let interval_days = if previous > 0 {
                    self.clamp_days(previous_f * factor)
                } else {
                    self.base_interval(next_level, factor)
                };
                Transition {
                    level: next_level,
                    difficulty_factor: factor,
                    interval_days,
                    resets_streak: false,
                }
            }
            Rating::Easy => Transition {
                level: level.saturating_add(cfg.easy_level_bonus),
                difficulty_factor: factor + cfg.easy_factor_bonus,
                interval_days: self.clamp_days(previous_f * factor * cfg.easy_multiplier),
                resets_streak: false,
            },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
