//! Due Index
//!
//! Orders a user's items by `next_review` (ties broken by item id) so "what is
//! due" is an ordered range scan instead of a full pass. The index holds no
//! business rules; it is derived from Item States and can be rebuilt at any
//! time.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use crate::clock::Calendar;

/// Length of the "this week" window, today included
pub const WEEK_DAYS: u64 = 7;

/// Counts produced by [`DueIndex::count_buckets`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCounts {
    /// Due before the start of `as_of`'s day
    pub overdue: usize,
    pub due_today: usize,
    pub due_tomorrow: usize,
    /// Today through day six, today and tomorrow included
    pub due_this_week: usize,
    /// Due after the week window
    pub later: usize,
    /// Every non-overdue item keyed by its calendar date
    pub due_by_date: BTreeMap<NaiveDate, usize>,
}

/// Ordered (next_review, item_id) index with point updates
#[derive(Debug, Clone, Default)]
pub struct DueIndex {
    by_due: BTreeSet<(DateTime<Utc>, String)>,
    due_of: HashMap<String, DateTime<Utc>>,
}

impl DueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (item_id, next_review) pairs
    pub fn rebuild<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, DateTime<Utc>)>,
        S: Into<String>,
    {
        let mut index = Self::new();
        for (item_id, due) in entries {
            index.update(item_id.into(), due);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.due_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due_of.is_empty()
    }

    pub fn get(&self, item_id: &str) -> Option<DateTime<Utc>> {
        self.due_of.get(item_id).copied()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.due_of.contains_key(item_id)
    }

    /// Insert or move an item; returns its previous due instant
    pub fn update(&mut self, item_id: String, next_review: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let previous = self.due_of.insert(item_id.clone(), next_review);
        if let Some(old) = previous {
            self.by_due.remove(&(old, item_id.clone()));
        }
        self.by_due.insert((next_review, item_id));
        previous
    }

    pub fn remove(&mut self, item_id: &str) -> Option<DateTime<Utc>> {
        let old = self.due_of.remove(item_id)?;
        self.by_due.remove(&(old, item_id.to_string()));
        Some(old)
    }

    /// All entries in due order
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, &str)> + '_ {
        self.by_due.iter().map(|(due, id)| (*due, id.as_str()))
    }

    /// Items with `next_review <= instant`, earliest first
    pub fn range_before(&self, instant: DateTime<Utc>) -> impl Iterator<Item = (DateTime<Utc>, &str)> + '_ {
        self.iter().take_while(move |(due, _)| *due <= instant)
    }

    /// Items strictly after the `after` key with `next_review <= instant`, in due order
    ///
    /// Seeks straight to the key, so resuming a scan costs nothing for the
    /// entries already passed. `None` starts from the beginning.
    pub fn range_after(
        &self,
        after: Option<(DateTime<Utc>, String)>,
        instant: DateTime<Utc>,
    ) -> impl Iterator<Item = (DateTime<Utc>, &str)> + '_ {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.by_due
            .range((lower, Bound::Unbounded))
            .map(|(due, id)| (*due, id.as_str()))
            .take_while(move |(due, _)| *due <= instant)
    }

    /// Bucket the whole index relative to `as_of`'s calendar day in one ordered scan
    pub fn count_buckets(&self, as_of: DateTime<Utc>, calendar: &dyn Calendar) -> BucketCounts {
        let today = calendar.date_of(as_of);
        let boundary = |days: u64| -> DateTime<Utc> {
            today
                .checked_add_days(Days::new(days))
                .map(|d| calendar.start_of(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        };
        let start_today = calendar.start_of(today);
        let start_tomorrow = boundary(1);
        let start_day_after = boundary(2);
        let week_end = boundary(WEEK_DAYS);

        let mut counts = BucketCounts::default();
        for (due, _) in self.iter() {
            if due < start_today {
                counts.overdue += 1;
                continue;
            }
            *counts.due_by_date.entry(calendar.date_of(due)).or_insert(0) += 1;
            if due >= week_end {
                counts.later += 1;
                continue;
            }
            counts.due_this_week += 1;
            if due < start_tomorrow {
                counts.due_today += 1;
            } else if due < start_day_after {
                counts.due_tomorrow += 1;
            }
        }
        counts
    }
}
