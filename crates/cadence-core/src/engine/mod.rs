//! Review Engine
//!
//! Owns the per-user scheduling partitions and wires the injected
//! collaborators together:
//! - [`ItemRepository`] for persistence
//! - [`IntervalPolicy`] for the transition table
//! - [`Clock`] and [`Calendar`] for "now" and day boundaries
//!
//! Partitions are loaded lazily on first use and are independent of each
//! other; operations on different users never contend on the same lock.

mod processor;
mod schedule;

pub(crate) use schedule::UserSchedule;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::clock::{Calendar, Clock, OffsetCalendar, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EVENT_CHANNEL_CAPACITY};
use crate::item::ItemState;
use crate::policy::{IntervalPolicy, LevelledPolicy};
use crate::session::{self, SessionBatch, SessionCursor, SessionLimits, SessionMode};
use crate::storage::ItemRepository;
use crate::summary::{self, ScheduleSummary};

type Partition = Arc<RwLock<UserSchedule>>;

/// The scheduling engine
pub struct ReviewEngine {
    repo: Arc<dyn ItemRepository>,
    policy: Box<dyn IntervalPolicy>,
    clock: Arc<dyn Clock>,
    calendar: Arc<dyn Calendar>,
    config: EngineConfig,
    users: RwLock<HashMap<String, Partition>>,
    events: broadcast::Sender<EngineEvent>,
}

impl ReviewEngine {
    /// Engine over `repo` with the default levelled policy, the system clock
    /// and UTC day boundaries
    pub fn new(repo: Arc<dyn ItemRepository>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let policy = LevelledPolicy::new(config.policy.clone())?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            repo,
            policy: Box::new(policy),
            clock: Arc::new(SystemClock),
            calendar: Arc::new(OffsetCalendar::utc()),
            config,
            users: RwLock::new(HashMap::new()),
            events,
        })
    }

    pub fn with_policy(mut self, policy: Box<dyn IntervalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn Calendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receiver for events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        // No receivers is not a failure
        let _ = self.events.send(event);
    }

    // ========================================================================
    // PARTITIONS
    // ========================================================================

    /// Partition for a read; unknown users get an empty view that is not cached
    fn partition(&self, user_id: &str) -> Result<Partition> {
        self.partition_with(user_id, false)
    }

    /// Partition for a registration; always cached
    fn partition_for_insert(&self, user_id: &str) -> Result<Partition> {
        self.partition_with(user_id, true)
    }

    fn partition_with(&self, user_id: &str, cache_empty: bool) -> Result<Partition> {
        {
            let users = self.users.read().map_err(|_| EngineError::poisoned("users"))?;
            if let Some(p) = users.get(user_id) {
                return Ok(Arc::clone(p));
            }
        }

        // Load outside the map lock; if another thread won the race, keep theirs
        let loaded = self.load_schedule(user_id)?;
        if loaded.is_empty() && !cache_empty {
            return Ok(Arc::new(RwLock::new(loaded)));
        }
        let mut users = self.users.write().map_err(|_| EngineError::poisoned("users"))?;
        Ok(Arc::clone(
            users
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(loaded))),
        ))
    }

    fn load_schedule(&self, user_id: &str) -> Result<UserSchedule> {
        let states = self.repo.load_user(user_id).map_err(|e| {
            tracing::error!(user_id, error = %e, "failed to load user schedule");
            EngineError::from(e)
        })?;
        let schedule = UserSchedule::from_states(states);
        tracing::info!(user_id, items = schedule.len(), "loaded user schedule");
        Ok(schedule)
    }

    /// Replace a locked partition's contents with what the repository holds
    fn reload_locked(&self, user_id: &str, schedule: &mut UserSchedule) -> Result<()> {
        *schedule = self.load_schedule(user_id)?;
        Ok(())
    }

    /// Drop the cached partition and reload it from the repository
    pub fn rebuild_user(&self, user_id: &str) -> Result<usize> {
        validate_id("user_id", user_id)?;
        let loaded = self.load_schedule(user_id)?;
        let len = loaded.len();
        let mut users = self.users.write().map_err(|_| EngineError::poisoned("users"))?;
        if len == 0 {
            users.remove(user_id);
        } else {
            users.insert(user_id.to_string(), Arc::new(RwLock::new(loaded)));
        }
        Ok(len)
    }

    /// Forget a cached partition; the next access reloads it
    pub fn evict_user(&self, user_id: &str) -> Result<bool> {
        let mut users = self.users.write().map_err(|_| EngineError::poisoned("users"))?;
        Ok(users.remove(user_id).is_some())
    }

    // ========================================================================
    // ITEM LIFECYCLE
    // ========================================================================

    /// Start scheduling an item; already-registered items are returned as-is
    pub fn register_item(&self, user_id: &str, item_id: &str) -> Result<ItemState> {
        validate_id("user_id", user_id)?;
        validate_id("item_id", item_id)?;
        let partition = self.partition_for_insert(user_id)?;
        let mut schedule = partition.write().map_err(|_| EngineError::poisoned("schedule"))?;

        if let Some(existing) = schedule.get(item_id) {
            return Ok(existing.clone());
        }

        let now = self.clock.now();
        let state = ItemState::new(user_id, item_id, schedule.next_sequence(), now);
        self.repo.insert_item(&state).map_err(|e| {
            tracing::error!(user_id, item_id, error = %e, "failed to persist registration");
            EngineError::from(e)
        })?;
        schedule.replace(state.clone());
        drop(schedule);

        tracing::info!(user_id, item_id, sequence = state.sequence, "registered item");
        self.emit(EngineEvent::ItemRegistered {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            timestamp: now,
        });
        Ok(state)
    }

    /// Stop scheduling an item and delete its history
    pub fn remove_item(&self, user_id: &str, item_id: &str) -> Result<ItemState> {
        let partition = self.partition(user_id)?;
        let mut schedule = partition.write().map_err(|_| EngineError::poisoned("schedule"))?;
        if schedule.get(item_id).is_none() {
            return Err(EngineError::not_found(user_id, item_id));
        }

        self.repo.delete_item(user_id, item_id).map_err(|e| {
            tracing::error!(user_id, item_id, error = %e, "failed to delete item");
            EngineError::from(e)
        })?;
        let removed = schedule
            .remove(item_id)
            .ok_or_else(|| EngineError::not_found(user_id, item_id))?;
        drop(schedule);

        tracing::info!(user_id, item_id, "removed item");
        self.emit(EngineEvent::ItemRemoved {
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
            timestamp: self.clock.now(),
        });
        Ok(removed)
    }

    pub fn get_item(&self, user_id: &str, item_id: &str) -> Result<ItemState> {
        let partition = self.partition(user_id)?;
        let schedule = partition.read().map_err(|_| EngineError::poisoned("schedule"))?;
        schedule
            .get(item_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(user_id, item_id))
    }

    /// Every item a user owns, in registration order
    pub fn list_items(&self, user_id: &str) -> Result<Vec<ItemState>> {
        let partition = self.partition(user_id)?;
        let schedule = partition.read().map_err(|_| EngineError::poisoned("schedule"))?;
        let mut items: Vec<ItemState> = schedule.items().cloned().collect();
        items.sort_by_key(|s| s.sequence);
        Ok(items)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// One page of a review session
    pub fn get_session(
        &self,
        user_id: &str,
        limit: usize,
        mode: SessionMode,
        as_of: DateTime<Utc>,
        cursor: Option<SessionCursor>,
    ) -> Result<SessionBatch> {
        if limit > self.config.max_session_limit {
            return Err(EngineError::Validation(format!(
                "limit {} exceeds the maximum of {}",
                limit, self.config.max_session_limit
            )));
        }
        let partition = self.partition(user_id)?;
        let schedule = partition.read().map_err(|_| EngineError::poisoned("schedule"))?;
        let limits = SessionLimits {
            limit,
            daily_new_cap: self.config.daily_new_cap,
        };
        session::compose(&schedule, limits, mode, as_of, cursor, self.calendar.as_ref())
    }

    /// Due-load counts for a user, taken from one consistent snapshot
    pub fn get_summary(&self, user_id: &str, as_of: DateTime<Utc>) -> Result<ScheduleSummary> {
        let partition = self.partition(user_id)?;
        let schedule = partition.read().map_err(|_| EngineError::poisoned("schedule"))?;
        Ok(summary::summarize(&schedule, as_of, self.calendar.as_ref()))
    }
}

fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}
