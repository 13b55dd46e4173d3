//! Hourly bucket aggregation
//!
//! Assigns each step to the local hour it was detected in and keeps the daily
//! total. This is the only writer of [`DailyStepRecord`] besides load and reset.

use crate::clock::date_key;
use crate::types::{DailyStepRecord, StepEvent};
use chrono::{NaiveDateTime, Timelike};

/// Owner of the current day's record
#[derive(Debug, Clone)]
pub struct BucketAggregator {
    record: DailyStepRecord,
}

impl BucketAggregator {
    pub fn new(record: DailyStepRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &DailyStepRecord {
        &self.record
    }

    /// Replace the record (load at start)
    pub fn replace(&mut self, record: DailyStepRecord) {
        self.record = record;
    }

    /// Add a step detected at local time `at`
    pub fn record_step(&mut self, event: &StepEvent, at: NaiveDateTime) {
        let hour = at.hour() as usize;
        self.record.increment(hour);
        tracing::debug!(
            timestamp_ms = event.timestamp_ms,
            hour,
            total = self.record.total_steps(),
            "step recorded"
        );
    }

    /// Start a fresh record if `at` falls on a different calendar day.
    /// Returns true when the record was reset.
    pub fn roll_over_if_new_day(&mut self, at: NaiveDateTime) -> bool {
        let today = date_key(at.date());
        if self.record.date() == today {
            return false;
        }
        tracing::info!(
            previous_date = self.record.date(),
            previous_total = self.record.total_steps(),
            date = %today,
            "day rollover, starting fresh record"
        );
        self.record = DailyStepRecord::new(today);
        true
    }
}
