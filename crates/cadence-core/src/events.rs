//! Engine events
//!
//! Emitted on a tokio broadcast channel toward the gamification and analytics
//! collaborators. `ReviewCompleted` is sent exactly once per accepted
//! submission; idempotent replays emit nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::Rating;

/// Capacity of the broadcast channel; slow receivers observe `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    ReviewCompleted {
        /// Unique per accepted submission, for downstream de-duplication
        event_id: Uuid,
        user_id: String,
        item_id: String,
        rating: Rating,
        previous_level: u32,
        new_level: u32,
        /// The level crossed the mastery threshold upward
        mastered_transition: bool,
        reviewed_at: DateTime<Utc>,
    },
    ItemRegistered {
        user_id: String,
        item_id: String,
        timestamp: DateTime<Utc>,
    },
    ItemRemoved {
        user_id: String,
        item_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn user_id(&self) -> &str {
        match self {
            EngineEvent::ReviewCompleted { user_id, .. }
            | EngineEvent::ItemRegistered { user_id, .. }
            | EngineEvent::ItemRemoved { user_id, .. } => user_id,
        }
    }
}

/// Whether a level change is a mastery transition
pub fn crosses_mastery(previous_level: u32, new_level: u32, threshold: u32) -> bool {
    previous_level < threshold && new_level >= threshold
}
