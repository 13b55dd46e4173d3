//! Step event detection
//!
//! Emits a step on a rising→falling transition of the smoothed magnitude when
//! the value at the turn exceeds the peak threshold and the refractory interval
//! since the previous step has elapsed. Equal successive values count as not
//! rising, so a plateau after a rise yields one peak at its first sample.
//! Footfalls closer together than the refractory interval collapse into one.

use crate::config::{DetectorConfig, DEFAULT_BASELINE_MAGNITUDE};
use crate::types::StepEvent;

/// Peak detector state
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: DetectorConfig,
    previous_magnitude: f64,
    was_rising: bool,
    last_step_ms: i64,
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), DEFAULT_BASELINE_MAGNITUDE)
    }
}

impl StepDetector {
    /// Create a detector whose first comparison is against `initial_magnitude`
    pub fn new(config: DetectorConfig, initial_magnitude: f64) -> Self {
        Self {
            config,
            previous_magnitude: initial_magnitude,
            was_rising: false,
            last_step_ms: 0,
        }
    }

    /// Process one smoothed value observed at `now_ms`
    pub fn process(&mut self, smoothed: f64, now_ms: i64) -> Option<StepEvent> {
        let is_rising = smoothed > self.previous_magnitude;

        let is_peak = self.was_rising && !is_rising;
        let step = if is_peak
            && smoothed > self.config.peak_threshold
            && now_ms - self.last_step_ms > self.config.min_step_interval_ms
        {
            self.last_step_ms = now_ms;
            Some(StepEvent { timestamp_ms: now_ms })
        } else {
            None
        };

        self.previous_magnitude = smoothed;
        self.was_rising = is_rising;
        step
    }

    /// Timestamp of the last emitted step (0 before the first)
    pub fn last_step_ms(&self) -> i64 {
        self.last_step_ms
    }
}
