//! Schedule Summary
//!
//! Read-only due-load counts for a dashboard, derived from the Due Index.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::Calendar;
use crate::engine::UserSchedule;

/// Counts relative to `as_of`'s calendar day
///
/// `total == overdue + due_this_week + later`. `due_this_week` already
/// includes `due_today` and `due_tomorrow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub as_of: DateTime<Utc>,
    pub total: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub due_tomorrow: usize,
    pub due_this_week: usize,
    pub later: usize,
    pub due_by_date: BTreeMap<NaiveDate, usize>,
}

impl ScheduleSummary {
    /// Items a session started now could surface from the due phases
    pub fn due_now(&self) -> usize {
        self.overdue + self.due_today
    }
}

pub(crate) fn summarize(
    schedule: &UserSchedule,
    as_of: DateTime<Utc>,
    calendar: &dyn Calendar,
) -> ScheduleSummary {
    let counts = schedule.due().count_buckets(as_of, calendar);
    ScheduleSummary {
        as_of,
        total: schedule.len(),
        overdue: counts.overdue,
        due_today: counts.due_today,
        due_tomorrow: counts.due_tomorrow,
        due_this_week: counts.due_this_week,
        later: counts.later,
        due_by_date: counts.due_by_date,
    }
}
