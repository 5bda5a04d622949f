//! Interval Policy Module
//!
//! Maps a review outcome onto the next schedule for an item:
//! `(level, difficulty factor, previous interval, rating) -> (level, factor, interval)`.
//!
//! The policy is a pure function with no state and no I/O. The growth curve is
//! a product decision, so the engine only knows the [`IntervalPolicy`] trait and
//! [`LevelledPolicy`] is the default, fully driven by [`PolicyConfig`].
//!
//! ## Default buckets
//! - Levels 0-1 (hard): 1-2 days
//! - Level 2 (medium): 3 days
//! - Levels 3-5 (easy): 4-16 days
//! - Beyond level 5: geometric growth by the difficulty factor, capped at 365 days

mod levelled;
mod rating;

pub use levelled::{
    LevelledPolicy, PolicyConfig, DEFAULT_BASE_INTERVALS, DEFAULT_DIFFICULTY_FACTOR,
    MAX_INTERVAL_DAYS, MIN_DIFFICULTY_FACTOR,
};
pub use rating::Rating;

use serde::{Deserialize, Serialize};

/// Scheduling inputs the policy needs from an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyInput {
    pub level: u32,
    pub difficulty_factor: f64,
    /// Interval that led to this review; `None` before the first review
    pub previous_interval_days: Option<u32>,
}

/// The policy's decision for one rating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub level: u32,
    pub difficulty_factor: f64,
    pub interval_days: u32,
    /// The consecutive-correct streak goes back to zero
    pub resets_streak: bool,
}

/// Transitions for every rating, for showing "due in N days" next to each button
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResults {
    pub again: Transition,
    pub hard: Transition,
    pub good: Transition,
    pub easy: Transition,
}

impl PreviewResults {
    /// Transition for a given rating
    pub fn get(&self, rating: Rating) -> &Transition {
        match rating {
            Rating::Again => &self.again,
            Rating::Hard => &self.hard,
            Rating::Good => &self.good,
            Rating::Easy => &self.easy,
        }
    }
}

/// A replaceable interval growth strategy
///
/// Implementations must be total: every valid rating yields a transition with a
/// difficulty factor at or above the floor and an interval of at least one day.
pub trait IntervalPolicy: Send + Sync {
    /// Compute the next schedule for a rating
    fn transition(&self, input: &PolicyInput, rating: Rating) -> Transition;

    /// Base interval in days of the bucket a level falls in
    fn base_interval(&self, level: u32, difficulty_factor: f64) -> u32;

    /// Transitions for all four ratings
    fn preview(&self, input: &PolicyInput) -> PreviewResults {
        PreviewResults {
            again: self.transition(input, Rating::Again),
            hard: self.transition(input, Rating::Hard),
            good: self.transition(input, Rating::Good),
            easy: self.transition(input, Rating::Easy),
        }
    }
}
