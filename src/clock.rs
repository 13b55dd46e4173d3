//! Clock collaborator
//!
//! The engine reads time only through [`Clock`], so tests and offline replays
//! can drive it deterministically.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::sync::{Arc, Mutex};

/// Format a calendar day as the record's date key (YYYY-MM-DD)
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;

    /// Milliseconds used for step timestamps and refractory comparisons
    fn now_ms(&self) -> i64 {
        self.now().and_utc().timestamp_millis()
    }

    /// Local hour of day, 0..24
    fn current_hour(&self) -> usize {
        self.now().hour() as usize
    }

    /// Local calendar day key
    fn today_key(&self) -> String {
        date_key(self.now().date())
    }
}

/// Device clock in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Move forward by `millis`
    pub fn advance_ms(&self, millis: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::milliseconds(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
