//! Per-user scheduling partition
//!
//! Holds a user's Item States plus the structures derived from them: the due
//! index and the queue of never-reviewed items in registration order. Every
//! change goes through [`UserSchedule::replace`] so the three stay in step.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use crate::index::DueIndex;
use crate::item::ItemState;

#[derive(Debug, Default)]
pub(crate) struct UserSchedule {
    items: HashMap<String, ItemState>,
    due: DueIndex,
    unseen: BTreeSet<(u64, String)>,
    next_sequence: u64,
}

impl UserSchedule {
    pub(crate) fn from_states(states: Vec<ItemState>) -> Self {
        let mut schedule = Self::default();
        for state in states {
            schedule.replace(state);
        }
        schedule
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get(&self, item_id: &str) -> Option<&ItemState> {
        self.items.get(item_id)
    }

    pub(crate) fn due(&self) -> &DueIndex {
        &self.due
    }

    /// Sequence number for the next registration
    pub(crate) fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Never-reviewed items in registration order, after the `(sequence, item_id)` key
    pub(crate) fn unseen_after(
        &self,
        after: Option<(u64, String)>,
    ) -> impl Iterator<Item = &ItemState> + '_ {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.unseen
            .range((lower, Bound::Unbounded))
            .filter_map(|(_, id)| self.items.get(id))
    }

    pub(crate) fn items(&self) -> impl Iterator<Item = &ItemState> + '_ {
        self.items.values()
    }

    /// Insert or overwrite a state; returns the one it replaced
    pub(crate) fn replace(&mut self, state: ItemState) -> Option<ItemState> {
        let item_id = state.item_id.clone();
        if let Some(old) = self.items.get(&item_id) {
            if old.is_new() {
                self.unseen.remove(&(old.sequence, item_id.clone()));
            }
        }
        self.next_sequence = self.next_sequence.max(state.sequence.saturating_add(1));
        self.due.update(item_id.clone(), state.next_review);
        if state.is_new() {
            self.unseen.insert((state.sequence, item_id.clone()));
        }
        self.items.insert(item_id, state)
    }

    pub(crate) fn remove(&mut self, item_id: &str) -> Option<ItemState> {
        let old = self.items.remove(item_id)?;
        self.due.remove(item_id);
        self.unseen.remove(&(old.sequence, old.item_id.clone()));
        Some(old)
    }
}
