//! In-process repository
//!
//! Keeps Item States in a map. Useful for embedding the engine without a
//! database and for exercising failure paths: [`MemoryRepository::fail_writes`]
//! makes the next writes fail.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::repository::{ItemRepository, Result, StorageError};
use crate::item::ItemState;

type Key = (String, String);

#[derive(Debug, Default)]
pub struct MemoryRepository {
    items: Mutex<BTreeMap<Key, ItemState>>,
    failing_writes: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with [`StorageError::Injected`]
    pub fn fail_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Stored copy of an item, bypassing any engine cache
    pub fn stored(&self, user_id: &str, item_id: &str) -> Option<ItemState> {
        self.items
            .lock()
            .ok()?
            .get(&(user_id.to_string(), item_id.to_string()))
            .cloned()
    }

    fn items(&self) -> Result<MutexGuard<'_, BTreeMap<Key, ItemState>>> {
        self.items
            .lock()
            .map_err(|_| StorageError::Init("Repository lock poisoned".into()))
    }

    fn check_injected(&self, operation: &str) -> Result<()> {
        let tripped = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(StorageError::Injected(operation.to_string()));
        }
        Ok(())
    }
}

impl ItemRepository for MemoryRepository {
    fn load_user(&self, user_id: &str) -> Result<Vec<ItemState>> {
        let items = self.items()?;
        let mut states: Vec<ItemState> = items
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        states.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.item_id.cmp(&b.item_id)));
        Ok(states)
    }

    fn insert_item(&self, state: &ItemState) -> Result<()> {
        self.check_injected("insert_item")?;
        let mut items = self.items()?;
        let key = (state.user_id.clone(), state.item_id.clone());
        if items.contains_key(&key) {
            return Err(StorageError::InvalidData(format!(
                "Item {} already exists for user {}",
                state.item_id, state.user_id
            )));
        }
        items.insert(key, state.clone());
        Ok(())
    }

    fn save_review(&self, state: &ItemState, previous_version: u64) -> Result<()> {
        self.check_injected("save_review")?;
        let mut items = self.items()?;
        let key = (state.user_id.clone(), state.item_id.clone());
        let stored = items
            .get_mut(&key)
            .ok_or_else(|| StorageError::NotFound(state.item_id.clone()))?;
        if stored.version != previous_version {
            return Err(StorageError::VersionConflict {
                item_id: state.item_id.clone(),
                expected: previous_version,
                actual: stored.version,
            });
        }
        *stored = state.clone();
        Ok(())
    }

    fn delete_item(&self, user_id: &str, item_id: &str) -> Result<bool> {
        self.check_injected("delete_item")?;
        let mut items = self.items()?;
        Ok(items
            .remove(&(user_id.to_string(), item_id.to_string()))
            .is_some())
    }
}
