//! Engine configuration
//!
//! Defaults carry the constants the engine has always shipped with. The
//! smoothing baseline (9.81, m/s²) and the peak threshold (1.18, g) come from
//! different unit assumptions; both are exposed here so they can be calibrated
//! against the units a given sensor source actually reports.

use crate::error::StepError;
use serde::{Deserialize, Serialize};

/// Default low-pass smoothing factor
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.15;

/// Default initial smoothed magnitude (~1g at rest in m/s²)
pub const DEFAULT_BASELINE_MAGNITUDE: f64 = 9.81;

/// Default smoothed magnitude a peak must exceed to count as a step
pub const DEFAULT_PEAK_THRESHOLD: f64 = 1.18;

/// Default refractory period between steps
pub const DEFAULT_MIN_STEP_INTERVAL_MS: i64 = 350;

/// Default number of steps between periodic flushes
pub const DEFAULT_FLUSH_EVERY_STEPS: u32 = 5;

/// Default storage key for the daily record
pub const DEFAULT_STORAGE_KEY: &str = "step_counter_data";

/// Default sensor update interval (~50 Hz)
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 20;

/// Signal conditioner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Weight of the newest magnitude in the moving average (0-1]
    pub smoothing_alpha: f64,
    /// Initial smoothed magnitude
    pub baseline_magnitude: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            baseline_magnitude: DEFAULT_BASELINE_MAGNITUDE,
        }
    }
}

/// Step detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub peak_threshold: f64,
    pub min_step_interval_ms: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            peak_threshold: DEFAULT_PEAK_THRESHOLD,
            min_step_interval_ms: DEFAULT_MIN_STEP_INTERVAL_MS,
        }
    }
}

/// Persistence manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub storage_key: String,
    pub flush_every_steps: u32,
    /// Hand writes to a background writer thread instead of writing inline
    pub background_writes: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            flush_every_steps: DEFAULT_FLUSH_EVERY_STEPS,
            background_writes: true,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub signal: SignalConfig,
    pub detector: DetectorConfig,
    pub persistence: PersistenceConfig,
    /// Sensor update interval requested at start
    pub sample_interval_ms: u64,
    /// Reset the record when a step lands on a new calendar day
    pub continuous_rollover: bool,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            signal: SignalConfig::default(),
            detector: DetectorConfig::default(),
            persistence: PersistenceConfig::default(),
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            continuous_rollover: false,
        }
    }
}

impl StepConfig {
    /// Configuration with inline (synchronous) persistence writes
    pub fn inline_writes() -> Self {
        let mut config = Self::default();
        config.persistence.background_writes = false;
        config
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, StepError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, StepError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), StepError> {
        let alpha = self.signal.smoothing_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(StepError::InvalidConfig(format!(
                "smoothing_alpha must be in (0, 1], got {alpha}"
            )));
        }
        if !self.signal.baseline_magnitude.is_finite() || self.signal.baseline_magnitude < 0.0 {
            return Err(StepError::InvalidConfig(
                "baseline_magnitude must be finite and non-negative".to_string(),
            ));
        }
        if !self.detector.peak_threshold.is_finite() || self.detector.peak_threshold < 0.0 {
            return Err(StepError::InvalidConfig(
                "peak_threshold must be finite and non-negative".to_string(),
            ));
        }
        if self.detector.min_step_interval_ms < 0 {
            return Err(StepError::InvalidConfig(
                "min_step_interval_ms must be non-negative".to_string(),
            ));
        }
        if self.persistence.flush_every_steps == 0 {
            return Err(StepError::InvalidConfig(
                "flush_every_steps must be at least 1".to_string(),
            ));
        }
        if self.persistence.storage_key.is_empty() {
            return Err(StepError::InvalidConfig("storage_key is empty".to_string()));
        }
        if self.sample_interval_ms == 0 {
            return Err(StepError::InvalidConfig(
                "sample_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
