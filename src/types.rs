//! Core types for the Synheart Steps engine
//!
//! This module defines the data structures that flow through the engine:
//! raw accelerometer samples, detected step events, the persisted daily record,
//! and the consumer-facing state and derived snapshot.

use crate::error::StepError;
use serde::{Deserialize, Serialize};

/// Number of hourly buckets in a daily record
pub const HOURS_PER_DAY: usize = 24;

/// Number of points in the downsampled sparkline
pub const SPARKLINE_POINTS: usize = 12;

/// Number of bars in the recent-activity chart
pub const ACTIVITY_BAR_COUNT: usize = 7;

/// One tri-axial accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the three axes
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// True when every axis is a finite number
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A detected footstep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Detection time (milliseconds, clock epoch)
    pub timestamp_ms: i64,
}

/// Steps for one calendar day, bucketed by local hour.
///
/// `total_steps` always equals the sum of `hourly_buckets`. The record is only
/// mutated through the bucket aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStepRecord {
    /// Calendar day key (YYYY-MM-DD, local time)
    date: String,
    /// Steps per local hour, index 0 = midnight
    hourly_buckets: [u32; HOURS_PER_DAY],
    /// Sum of all buckets
    total_steps: u32,
}

impl DailyStepRecord {
    /// Create an empty record for the given day
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            hourly_buckets: [0; HOURS_PER_DAY],
            total_steps: 0,
        }
    }

    /// Create a record from existing buckets; the total is derived from them
    pub fn from_buckets(date: impl Into<String>, hourly_buckets: [u32; HOURS_PER_DAY]) -> Self {
        Self {
            date: date.into(),
            total_steps: hourly_buckets.iter().sum(),
            hourly_buckets,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn hourly_buckets(&self) -> &[u32; HOURS_PER_DAY] {
        &self.hourly_buckets
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Add one step to the given hour. `hour` is always produced by chrono and
    /// therefore in `0..24`.
    pub(crate) fn increment(&mut self, hour: usize) {
        self.hourly_buckets[hour] = self.hourly_buckets[hour].saturating_add(1);
        self.total_steps = self.total_steps.saturating_add(1);
    }

    /// Check the bucket/total invariant
    pub fn validate(&self) -> Result<(), StepError> {
        if self.date.is_empty() {
            return Err(StepError::InvalidRecord("empty date key".to_string()));
        }
        let sum: u64 = self.hourly_buckets.iter().map(|&b| u64::from(b)).sum();
        if sum != u64::from(self.total_steps) {
            return Err(StepError::InvalidRecord(format!(
                "totalSteps {} does not match bucket sum {}",
                self.total_steps, sum
            )));
        }
        Ok(())
    }

    /// Parse and validate a stored record
    pub fn from_json(json: &str) -> Result<Self, StepError> {
        let record: Self = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    /// Serialize for storage
    pub fn to_json(&self) -> Result<String, StepError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Consumer-facing engine state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounterState {
    pub total_steps: u32,
    pub hourly_buckets: [u32; HOURS_PER_DAY],
    /// Result of the one-time accelerometer capability probe
    pub is_available: bool,
    /// Whether the engine is currently subscribed to samples
    pub is_tracking: bool,
}

/// One bar of the recent-activity chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBar {
    /// Height normalized to 0..=100 against the tallest selected window
    pub level: u8,
    /// Raw window value is above the median of the selected windows
    pub active: bool,
}

/// Display projections derived from the hourly buckets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedSnapshot {
    pub sparkline: [u32; SPARKLINE_POINTS],
    /// Signed percent change between the two halves of the elapsed day
    pub trend_percent: i32,
    pub activity_bars: [ActivityBar; ACTIVITY_BAR_COUNT],
}

/// Everything a consumer needs in one read: the live state plus its projections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Calendar day the counts belong to
    pub date: String,
    /// Local hour the projections were computed at
    pub current_hour: usize,
    pub state: StepCounterState,
    pub derived: DerivedSnapshot,
}

/// Host process lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    Active,
    Inactive,
    Background,
}

impl AppLifecycle {
    /// Whether entering this state should trigger a persistence flush
    pub fn requires_flush(&self) -> bool {
        matches!(self, AppLifecycle::Inactive | AppLifecycle::Background)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppLifecycle::Active => "active",
            AppLifecycle::Inactive => "inactive",
            AppLifecycle::Background => "background",
        }
    }
}
