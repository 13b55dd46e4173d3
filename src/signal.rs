//! Signal conditioning
//!
//! Low-pass filters the per-sample acceleration magnitude with an exponential
//! moving average: `smoothed = α·magnitude + (1 − α)·smoothed_prev`.

use crate::config::SignalConfig;
use crate::types::AccelSample;

/// Exponential moving average over sample magnitudes
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    alpha: f64,
    smoothed: f64,
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::new(&SignalConfig::default())
    }
}

impl SignalConditioner {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            alpha: config.smoothing_alpha,
            smoothed: config.baseline_magnitude,
        }
    }

    /// Current smoothed magnitude
    pub fn smoothed(&self) -> f64 {
        self.smoothed
    }

    /// Feed one sample and return the updated smoothed magnitude.
    ///
    /// Non-finite samples are rejected with `None` and leave the state
    /// untouched.
    pub fn update(&mut self, sample: &AccelSample) -> Option<f64> {
        if !sample.is_finite() {
            return None;
        }
        let magnitude = sample.magnitude();
        if !magnitude.is_finite() {
            return None;
        }
        // Written in increment form so a constant input is an exact fixed point.
        self.smoothed += self.alpha * (magnitude - self.smoothed);
        Some(self.smoothed)
    }
}
