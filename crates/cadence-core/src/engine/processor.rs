//! Outcome Processor
//!
//! Applies a rating to an Item State. The sequence for one submission is:
//!
//! 1. Replay check on the submission id (success, no mutation)
//! 2. Optimistic version check against `expected_version`
//! 3. Policy transition and invariant check
//! 4. In-memory apply, then persist; a failed write rolls the partition back,
//!    and a write lost to another engine reloads the partition from storage
//! 5. `ReviewCompleted` event
//!
//! Everything from step 1 to 4 runs under the user's partition write lock.

use uuid::Uuid;

use super::ReviewEngine;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, crosses_mastery};
use crate::item::ItemState;
use crate::policy::{PreviewResults, Rating};
use crate::storage::StorageError;

impl ReviewEngine {
    /// Record a rating for an item and reschedule it
    ///
    /// Resubmitting a `submission_id` the item has already accepted returns the
    /// current state unchanged, so a caller that lost the response can retry
    /// blindly with the same id.
    pub fn submit_review(
        &self,
        user_id: &str,
        item_id: &str,
        rating: Rating,
        submission_id: &str,
        expected_version: Option<u64>,
    ) -> Result<ItemState> {
        if submission_id.trim().is_empty() {
            return Err(EngineError::Validation("submission_id must not be empty".into()));
        }

        let partition = self.partition(user_id)?;
        let mut schedule = partition.write().map_err(|_| EngineError::poisoned("schedule"))?;
        let current = schedule
            .get(item_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(user_id, item_id))?;

        if is_replay(&current, submission_id) {
            tracing::debug!(user_id, item_id, submission_id, "replayed submission");
            return Ok(current);
        }

        if let Some(expected) = expected_version {
            if expected != current.version {
                tracing::warn!(
                    user_id,
                    item_id,
                    expected,
                    actual = current.version,
                    "version conflict"
                );
                return Err(EngineError::Conflict {
                    item_id: item_id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }

        // A clock that stepped backwards must not reorder history
        let now = self.clock.now();
        let reviewed_at = current.last_reviewed.map_or(now, |last| now.max(last));

        let transition = self.policy.transition(&current.policy_input(), rating);
        let next = current.reviewed(&transition, rating, submission_id, reviewed_at);
        next.check_invariants().map_err(|violation| {
            tracing::error!(user_id, item_id, %violation, "policy produced an invalid state");
            EngineError::Internal(format!("Invalid state for {}: {}", item_id, violation))
        })?;

        schedule.replace(next.clone());
        if let Err(e) = self.repo.save_review(&next, current.version) {
            schedule.replace(current);
            return Err(match e {
                // Another writer got there first; load what it stored
                StorageError::VersionConflict { .. } | StorageError::NotFound(_) => {
                    tracing::warn!(
                        user_id,
                        item_id,
                        error = %e,
                        "stored item changed, reloading schedule"
                    );
                    self.reload_locked(user_id, &mut schedule)?;
                    match e {
                        StorageError::NotFound(_) => EngineError::not_found(user_id, item_id),
                        other => EngineError::from(other),
                    }
                }
                other => {
                    tracing::warn!(
                        user_id,
                        item_id,
                        error = %other,
                        "persist failed, rolled back review"
                    );
                    EngineError::from(other)
                }
            });
        }
        drop(schedule);

        let mastered_transition =
            crosses_mastery(current.level, next.level, self.config.mastery_threshold);
        tracing::info!(
            user_id,
            item_id,
            rating = %rating,
            level = next.level,
            interval_days = transition.interval_days,
            version = next.version,
            "review accepted"
        );
        self.emit(EngineEvent::ReviewCompleted {
            event_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            rating,
            previous_level: current.level,
            new_level: next.level,
            mastered_transition,
            reviewed_at,
        });

        Ok(next)
    }

    /// What each rating would do to an item, without applying any of them
    pub fn preview_review(&self, user_id: &str, item_id: &str) -> Result<PreviewResults> {
        let partition = self.partition(user_id)?;
        let schedule = partition.read().map_err(|_| EngineError::poisoned("schedule"))?;
        let state = schedule
            .get(item_id)
            .ok_or_else(|| EngineError::not_found(user_id, item_id))?;
        Ok(self.policy.preview(&state.policy_input()))
    }
}

/// The submission was already applied to this item
fn is_replay(state: &ItemState, submission_id: &str) -> bool {
    state.last_submission_id.as_deref() == Some(submission_id)
        || state
            .review_history
            .iter()
            .any(|entry| entry.submission_id == submission_id)
}
