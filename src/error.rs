//! Error types for Synheart Steps
//!
//! None of these reach consumers of the engine facade: load failures degrade to
//! a fresh record and write failures are logged and dropped. They exist so the
//! internal layers can use `?` and so the CLI/FFI can report precise causes.

use thiserror::Error;

/// Errors that can occur inside the step engine
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid step record: {0}")]
    InvalidRecord(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Sensor unavailable: {0}")]
    SensorUnavailable(String),
}
