//! Session Coordinator
//!
//! Builds an ordered, de-duplicated batch of items for one review session:
//!
//! 1. Overdue items (due before the start of `as_of`'s day), most overdue first
//! 2. Items due today up to `as_of`, earliest first
//! 3. With [`SessionMode::IncludeNew`], never-reviewed items in registration
//!    order, up to the daily new-item cap
//!
//! A batch is a pure function of the schedule, the request and the cursor.
//! The returned [`SessionCursor`] records the last key each phase handed out,
//! so the next page seeks past it and never repeats an item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::clock::Calendar;
use crate::engine::UserSchedule;
use crate::error::{EngineError, Result};
use crate::item::ItemState;

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    /// Due and overdue items only
    #[default]
    ReviewOnly,
    /// Due items, then new items if slots remain
    IncludeNew,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::ReviewOnly => "review-only",
            SessionMode::IncludeNew => "include-new",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "reviewonly" | "review" => Ok(SessionMode::ReviewOnly),
            "includenew" | "new" => Ok(SessionMode::IncludeNew),
            _ => Err(EngineError::Validation(format!("Unknown session mode: {}", s))),
        }
    }
}

/// Which part of the ordering an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Overdue,
    DueToday,
    New,
}

// ============================================================================
// CURSOR
// ============================================================================

/// Resumable position within a session
///
/// Each phase resumes by seeking past the key of the last item it handed out,
/// so items the schedule gained or lost since the previous page shift nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCursor {
    pub as_of: DateTime<Utc>,
    pub mode: SessionMode,
    /// Items handed out so far from each phase
    pub overdue: usize,
    pub due_today: usize,
    pub new: usize,
    /// Due-index key `(next_review, item_id)` of the last due item handed out
    pub last_due: Option<(DateTime<Utc>, String)>,
    /// Registration key `(sequence, item_id)` of the last new item handed out
    pub last_new: Option<(u64, String)>,
    /// Ids handed out from the new phase, at most the daily new-item cap
    pub yielded_new: BTreeSet<String>,
}

impl SessionCursor {
    pub fn start(as_of: DateTime<Utc>, mode: SessionMode) -> Self {
        Self {
            as_of,
            mode,
            overdue: 0,
            due_today: 0,
            new: 0,
            last_due: None,
            last_new: None,
            yielded_new: BTreeSet::new(),
        }
    }

    /// Total items handed out in this session
    pub fn position(&self) -> usize {
        self.overdue + self.due_today + self.new
    }

    /// Opaque string form for round-tripping through a client
    pub fn to_token(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Internal(format!("Cannot encode cursor: {}", e)))
    }

    pub fn from_token(token: &str) -> Result<Self> {
        serde_json::from_str(token)
            .map_err(|e| EngineError::Validation(format!("Malformed session cursor: {}", e)))
    }

    fn record(&mut self, phase: SessionPhase, due_at: DateTime<Utc>, state: &ItemState) {
        match phase {
            SessionPhase::Overdue | SessionPhase::DueToday => {
                if phase == SessionPhase::Overdue {
                    self.overdue += 1;
                } else {
                    self.due_today += 1;
                }
                self.last_due = Some((due_at, state.item_id.clone()));
            }
            SessionPhase::New => {
                self.new += 1;
                self.last_new = Some((state.sequence, state.item_id.clone()));
                self.yielded_new.insert(state.item_id.clone());
            }
        }
    }
}

// ============================================================================
// BATCH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub item_id: String,
    pub phase: SessionPhase,
    pub next_review: DateTime<Utc>,
    pub level: u32,
    /// Optimistic-concurrency token to submit with the rating
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBatch {
    pub items: Vec<SessionItem>,
    /// `None` once every phase is exhausted
    pub next_cursor: Option<SessionCursor>,
}

/// Limits applied while composing a batch
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionLimits {
    pub limit: usize,
    pub daily_new_cap: usize,
}

/// Compose one page of a session from a user's schedule
pub(crate) fn compose(
    schedule: &UserSchedule,
    limits: SessionLimits,
    mode: SessionMode,
    as_of: DateTime<Utc>,
    cursor: Option<SessionCursor>,
    calendar: &dyn Calendar,
) -> Result<SessionBatch> {
    if limits.limit == 0 {
        return Err(EngineError::Validation("limit must be positive".into()));
    }
    let mut cursor = match cursor {
        Some(c) if c.as_of != as_of || c.mode != mode => {
            return Err(EngineError::Validation(format!(
                "Cursor was issued for a {} session at {}, not {} at {}",
                c.mode, c.as_of, mode, as_of
            )));
        }
        Some(c) => c,
        None => SessionCursor::start(as_of, mode),
    };

    let today = calendar.date_of(as_of);
    let start_today = calendar.start_of(today);
    let mut items = Vec::with_capacity(limits.limit);
    let mut has_more = false;

    // Due phases: one ordered scan from the last key; overdue sorts ahead of today
    let due = schedule
        .due()
        .range_after(cursor.last_due.clone(), as_of)
        .filter(|(_, id)| !cursor.yielded_new.contains(*id))
        .filter_map(|(due, id)| schedule.get(id).filter(|s| !s.is_new()).map(|s| (due, s)));
    let mut picked = Vec::new();
    for (due_at, state) in due {
        if picked.len() == limits.limit {
            has_more = true;
            break;
        }
        let phase = if due_at < start_today {
            SessionPhase::Overdue
        } else {
            SessionPhase::DueToday
        };
        picked.push((phase, due_at, state));
    }

    if !has_more && mode == SessionMode::IncludeNew {
        let started_today = schedule
            .items()
            .filter(|s| !cursor.yielded_new.contains(&s.item_id))
            .filter(|s| {
                s.review_history
                    .first()
                    .is_some_and(|e| calendar.date_of(e.reviewed_at) == today)
            })
            .count();
        let mut budget = limits
            .daily_new_cap
            .saturating_sub(started_today + cursor.yielded_new.len());

        for state in schedule.unseen_after(cursor.last_new.clone()) {
            if budget == 0 {
                break;
            }
            if picked.len() == limits.limit {
                has_more = true;
                break;
            }
            picked.push((SessionPhase::New, state.next_review, state));
            budget -= 1;
        }
    }

    for (phase, due_at, state) in picked {
        cursor.record(phase, due_at, state);
        items.push(SessionItem {
            item_id: state.item_id.clone(),
            phase,
            next_review: state.next_review,
            level: state.level,
            version: state.version,
        });
    }

    tracing::debug!(
        returned = items.len(),
        position = cursor.position(),
        has_more,
        "composed session batch"
    );

    Ok(SessionBatch {
        items,
        next_cursor: has_more.then_some(cursor),
    })
}

// ============================================================================
// TESTS
// ============================================================================
