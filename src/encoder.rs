//! Step report encoding
//!
//! Wraps an engine snapshot with producer metadata so hosts and the CLI can
//! hand a single self-describing JSON document downstream.

use crate::error::StepError;
use crate::types::{DerivedSnapshot, EngineSnapshot, StepCounterState};
use crate::{PRODUCER_NAME, STEPS_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Who produced a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Serialized view of the engine at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub date: String,
    pub current_hour: usize,
    pub state: StepCounterState,
    pub derived: DerivedSnapshot,
}

/// Encoder for step reports
pub struct StepReportEncoder {
    instance_id: String,
}

impl Default for StepReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StepReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, snapshot: &EngineSnapshot) -> StepReport {
        StepReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: STEPS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            date: snapshot.date.clone(),
            current_hour: snapshot.current_hour,
            state: snapshot.state.clone(),
            derived: snapshot.derived.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, snapshot: &EngineSnapshot) -> Result<String, StepError> {
        let report = self.encode(snapshot);
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
