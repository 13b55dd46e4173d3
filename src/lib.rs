//! Synheart Steps - On-device step detection and daily activity aggregation
//!
//! Steps turns a stream of tri-axial accelerometer readings into a per-day,
//! per-hour step count through a deterministic pipeline: magnitude smoothing →
//! peak detection → hourly bucketing → persistence, with display projections
//! (sparkline, trend, activity bars) computed on demand.
//!
//! ## Usage
//!
//! The host owns the sensor and the durable store. It builds a [`StepEngine`],
//! calls [`StepEngine::start`], forwards each reading to
//! [`StepEngine::on_sample`], forwards lifecycle changes, and calls
//! [`StepEngine::stop`] at teardown.

pub mod aggregator;
pub mod analytics;
pub mod clock;
pub mod config;
pub mod detector;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod sensor;
pub mod signal;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StepConfig;
pub use encoder::{StepReport, StepReportEncoder};
pub use engine::StepEngine;
pub use error::StepError;
pub use sensor::{HostSensor, SensorSource};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    AccelSample, ActivityBar, AppLifecycle, DailyStepRecord, DerivedSnapshot, EngineSnapshot,
    StepCounterState, StepEvent,
};

/// Library version embedded in all step reports
pub const STEPS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for step reports
pub const PRODUCER_NAME: &str = "synheart-steps";
