//! Item State - the scheduling record for one (user, item) pair
//!
//! Item content lives in the external content store; this record carries only
//! the scheduling metadata. A new record starts at level 0, due immediately,
//! version 0. It is changed only by the outcome processor.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::policy::{
    PolicyInput, Rating, Transition, DEFAULT_DIFFICULTY_FACTOR, MIN_DIFFICULTY_FACTOR,
};

// ============================================================================
// REVIEW HISTORY
// ============================================================================

/// One accepted review, in the order it was applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub reviewed_at: DateTime<Utc>,
    pub rating: Rating,
    pub resulting_level: u32,
    pub interval_days: u32,
    pub submission_id: String,
}

// ============================================================================
// ITEM STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemState {
    pub user_id: String,
    pub item_id: String,
    /// Registration order supplied by the content store
    pub sequence: u64,
    /// Proficiency bucket (unbounded above)
    pub level: u32,
    /// Per-item easing multiplier, never below 1.3
    pub difficulty_factor: f64,
    pub consecutive_correct: u32,
    pub created_at: DateTime<Utc>,
    /// `None` only before the first review
    pub last_reviewed: Option<DateTime<Utc>>,
    pub next_review: DateTime<Utc>,
    /// Append-only
    pub review_history: Vec<ReviewEntry>,
    /// Optimistic-concurrency token, +1 per accepted mutation
    pub version: u64,
    /// Idempotency token of the most recently applied submission
    pub last_submission_id: Option<String>,
}

impl ItemState {
    /// Fresh record for a newly registered item, due at `now`
    pub fn new(user_id: &str, item_id: &str, sequence: u64, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            sequence,
            level: 0,
            difficulty_factor: DEFAULT_DIFFICULTY_FACTOR,
            consecutive_correct: 0,
            created_at: now,
            last_reviewed: None,
            next_review: now,
            review_history: Vec::new(),
            version: 0,
            last_submission_id: None,
        }
    }

    /// Never reviewed
    pub fn is_new(&self) -> bool {
        self.last_reviewed.is_none()
    }

    pub fn is_mastered(&self, mastery_threshold: u32) -> bool {
        self.level >= mastery_threshold
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.next_review <= as_of
    }

    /// Interval the current schedule was built with, derived from the timestamps
    pub fn scheduled_interval_days(&self) -> Option<u32> {
        let last = self.last_reviewed?;
        let days = (self.next_review - last).num_days();
        Some(u32::try_from(days.max(0)).unwrap_or(u32::MAX))
    }

    pub fn policy_input(&self) -> PolicyInput {
        PolicyInput {
            level: self.level,
            difficulty_factor: self.difficulty_factor,
            previous_interval_days: self.scheduled_interval_days(),
        }
    }

    /// The state after applying a policy decision at `now`
    pub(crate) fn reviewed(
        &self,
        transition: &Transition,
        rating: Rating,
        submission_id: &str,
        now: DateTime<Utc>,
    ) -> ItemState {
        let mut next = self.clone();
        next.level = transition.level;
        next.difficulty_factor = transition.difficulty_factor;
        next.consecutive_correct = if transition.resets_streak {
            0
        } else {
            self.consecutive_correct.saturating_add(1)
        };
        next.last_reviewed = Some(now);
        next.next_review = now + Duration::days(i64::from(transition.interval_days));
        next.version = self.version + 1;
        next.last_submission_id = Some(submission_id.to_string());
        next.review_history.push(ReviewEntry {
            reviewed_at: now,
            rating,
            resulting_level: transition.level,
            interval_days: transition.interval_days,
            submission_id: submission_id.to_string(),
        });
        next
    }

    /// Verify the record-level invariants
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        match self.last_reviewed {
            Some(last) if self.next_review < last => {
                return Err(InvariantViolation::ReviewBeforeLastReviewed {
                    next_review: self.next_review,
                    last_reviewed: last,
                });
            }
            None if self.next_review < self.created_at => {
                return Err(InvariantViolation::ReviewBeforeCreation {
                    next_review: self.next_review,
                    created_at: self.created_at,
                });
            }
            _ => {}
        }

        if !self.difficulty_factor.is_finite() || self.difficulty_factor < MIN_DIFFICULTY_FACTOR {
            return Err(InvariantViolation::DifficultyBelowFloor(self.difficulty_factor));
        }

        let mut seen = HashSet::with_capacity(self.review_history.len());
        for entry in &self.review_history {
            if !seen.insert(entry.submission_id.as_str()) {
                return Err(InvariantViolation::DuplicateSubmission(
                    entry.submission_id.clone(),
                ));
            }
        }

        let last_entry = self.review_history.last();
        if last_entry.map(|e| e.reviewed_at) != self.last_reviewed
            || last_entry.map(|e| e.submission_id.as_str()) != self.last_submission_id.as_deref()
        {
            return Err(InvariantViolation::HistoryMismatch);
        }
        if self.review_history.windows(2).any(|w| w[1].reviewed_at < w[0].reviewed_at) {
            return Err(InvariantViolation::HistoryOutOfOrder);
        }

        Ok(())
    }
}

/// A broken Item State invariant
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("nextReview {next_review} precedes lastReviewed {last_reviewed}")]
    ReviewBeforeLastReviewed {
        next_review: DateTime<Utc>,
        last_reviewed: DateTime<Utc>,
    },
    #[error("nextReview {next_review} precedes creation {created_at}")]
    ReviewBeforeCreation {
        next_review: DateTime<Utc>,
        created_at: DateTime<Utc>,
    },
    #[error("difficulty factor {0} is below the floor")]
    DifficultyBelowFloor(f64),
    #[error("submission {0} appears twice in the review history")]
    DuplicateSubmission(String),
    #[error("review history does not match lastReviewed/lastSubmissionId")]
    HistoryMismatch,
    #[error("review history is not in chronological order")]
    HistoryOutOfOrder,
}
