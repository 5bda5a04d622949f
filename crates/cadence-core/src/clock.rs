//! Clock and calendar collaborators
//!
//! The engine never reads the wall clock or a time zone database directly.
//! "Now" comes from a [`Clock`], and calendar days come from a [`Calendar`],
//! which is the caller's day-boundary policy.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use std::sync::Mutex;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Day-boundary function
///
/// `start_of(date_of(t)) <= t < start_of(date_of(t).succ())` must hold for every
/// instant `t`.
pub trait Calendar: Send + Sync {
    /// Calendar date an instant falls on
    fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate;

    /// First instant of a calendar date
    fn start_of(&self, date: NaiveDate) -> DateTime<Utc>;

    /// First instant of the day containing `instant`
    fn start_of_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(self.date_of(instant))
    }
}

/// Calendar for a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct OffsetCalendar {
    offset: FixedOffset,
}

impl OffsetCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Parse `+HH:MM`, `-HH:MM`, `Z` or `UTC`
    pub fn parse_offset(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
            return Some(Self::utc());
        }
        let (sign, rest) = match s.as_bytes().first()? {
            b'+' => (1, &s[1..]),
            b'-' => (-1, &s[1..]),
            _ => return None,
        };
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
            None => (rest.parse::<i32>().ok()?, 0),
        };
        if !(0..60).contains(&minutes) {
            return None;
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for OffsetCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar for OffsetCalendar {
    fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        // Fixed offsets have no gaps or folds
        (local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}
