//! Sensor input collaborator
//!
//! The accelerometer is a push source owned by the host. The engine probes it
//! once, asks for an update interval, and subscribes; the host then delivers
//! each reading through `StepEngine::on_sample`.

use crate::error::StepError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Accelerometer capability and subscription control
pub trait SensorSource: Send {
    /// One-time capability probe
    fn is_available(&mut self) -> bool;

    /// Request a sampling interval
    fn set_update_interval(&mut self, interval_ms: u64);

    /// Start delivering samples
    fn subscribe(&mut self) -> Result<(), StepError>;

    /// Stop delivering samples. Must take effect before returning.
    fn unsubscribe(&mut self);
}

#[derive(Debug, Default)]
struct HostSensorState {
    available: bool,
    subscribed: bool,
    update_interval_ms: Option<u64>,
    probes: u32,
}

/// Sensor whose samples are pushed in by the host application.
///
/// Availability is decided by the host up front; subscription calls only
/// record state so the host can observe what the engine requested. Clones
/// share the same state.
#[derive(Debug, Clone)]
pub struct HostSensor {
    state: Arc<Mutex<HostSensorState>>,
}

impl HostSensor {
    pub fn new(available: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostSensorState {
                available,
                ..Default::default()
            })),
        }
    }

    pub fn available() -> Self {
        Self::new(true)
    }

    pub fn unavailable() -> Self {
        Self::new(false)
    }

    fn state(&self) -> MutexGuard<'_, HostSensorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_subscribed(&self) -> bool {
        self.state().subscribed
    }

    pub fn update_interval_ms(&self) -> Option<u64> {
        self.state().update_interval_ms
    }

    /// Number of capability probes performed
    pub fn probe_count(&self) -> u32 {
        self.state().probes
    }
}

impl SensorSource for HostSensor {
    fn is_available(&mut self) -> bool {
        let mut state = self.state();
        state.probes += 1;
        state.available
    }

    fn set_update_interval(&mut self, interval_ms: u64) {
        self.state().update_interval_ms = Some(interval_ms);
    }

    fn subscribe(&mut self) -> Result<(), StepError> {
        let mut state = self.state();
        if !state.available {
            return Err(StepError::SensorUnavailable(
                "accelerometer is not present".to_string(),
            ));
        }
        state.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.state().subscribed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_sensor_subscription() {
        let mut sensor = HostSensor::available();
        let observer = sensor.clone();

        assert!(sensor.is_available());
        sensor.set_update_interval(20);
        sensor.subscribe().unwrap();
        assert!(observer.is_subscribed());
        assert_eq!(observer.update_interval_ms(), Some(20));

        sensor.unsubscribe();
        assert!(!observer.is_subscribed());
        assert_eq!(observer.probe_count(), 1);
    }

    #[test]
    fn test_unavailable_sensor_refuses_subscription() {
        let mut sensor = HostSensor::unavailable();
        assert!(!sensor.is_available());
        assert!(matches!(sensor.subscribe(), Err(StepError::SensorUnavailable(_))));
        assert!(!sensor.is_subscribed());
    }
}
