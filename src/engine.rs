//! Engine facade
//!
//! Wires the conditioner, detector, aggregator, and persistence manager into a
//! single start/stop unit. Samples flow one way:
//! sample → conditioner → detector → aggregator → persistence.
//!
//! All sample processing is synchronous inside `on_sample`; the only work that
//! may happen off this path is the persistence write.

use crate::aggregator::BucketAggregator;
use crate::clock::{Clock, SystemClock};
use crate::config::StepConfig;
use crate::detector::StepDetector;
use crate::error::StepError;
use crate::persistence::PersistenceManager;
use crate::sensor::SensorSource;
use crate::signal::SignalConditioner;
use crate::store::KeyValueStore;
use crate::types::{
    AccelSample, AppLifecycle, DailyStepRecord, DerivedSnapshot, EngineSnapshot,
    StepCounterState, StepEvent,
};
use std::sync::Arc;

/// On-device step counting engine
pub struct StepEngine {
    config: StepConfig,
    clock: Arc<dyn Clock>,
    sensor: Box<dyn SensorSource>,
    conditioner: SignalConditioner,
    detector: StepDetector,
    aggregator: BucketAggregator,
    persistence: PersistenceManager,
    /// Capability probe result, taken at most once
    availability: Option<bool>,
    started: bool,
    is_tracking: bool,
    skipped_samples: u64,
}

impl StepEngine {
    /// Create an engine with injected collaborators
    pub fn new(
        config: StepConfig,
        sensor: Box<dyn SensorSource>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StepError> {
        config.validate()?;
        let today = clock.today_key();
        Ok(Self {
            conditioner: SignalConditioner::new(&config.signal),
            detector: StepDetector::new(
                config.detector.clone(),
                config.signal.baseline_magnitude,
            ),
            aggregator: BucketAggregator::new(DailyStepRecord::new(today)),
            persistence: PersistenceManager::new(store, &config.persistence),
            config,
            clock,
            sensor,
            availability: None,
            started: false,
            is_tracking: false,
            skipped_samples: 0,
        })
    }

    /// Engine with default configuration on the device clock
    pub fn with_defaults(
        sensor: Box<dyn SensorSource>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StepError> {
        Self::new(StepConfig::default(), sensor, store, Arc::new(SystemClock))
    }

    /// Load persisted state, probe the sensor, and subscribe if it is present.
    /// Calling `start` while already running has no effect.
    pub fn start(&mut self) -> StepCounterState {
        if self.started {
            return self.state();
        }
        self.started = true;

        let today = self.clock.today_key();
        let loaded = self.persistence.load(&today);
        let current = self.aggregator.record();
        // A restart must not roll back steps whose last write did not land
        if !(current.date() == loaded.date() && current.total_steps() > loaded.total_steps()) {
            self.aggregator.replace(loaded);
        }

        let sensor = &mut self.sensor;
        let available = *self.availability.get_or_insert_with(|| sensor.is_available());
        if !available {
            tracing::info!("accelerometer unavailable, step tracking disabled");
            return self.state();
        }

        self.sensor.set_update_interval(self.config.sample_interval_ms);
        match self.sensor.subscribe() {
            Ok(()) => {
                self.is_tracking = true;
                tracing::info!(
                    date = self.aggregator.record().date(),
                    total = self.aggregator.record().total_steps(),
                    interval_ms = self.config.sample_interval_ms,
                    "step tracking started"
                );
            }
            Err(e) => tracing::warn!(error = %e, "could not subscribe to accelerometer"),
        }
        self.state()
    }

    /// Unsubscribe, then write the final record. No sample is processed after
    /// this returns.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        if self.is_tracking {
            self.sensor.unsubscribe();
            self.is_tracking = false;
        }
        self.started = false;
        self.persistence.flush(self.aggregator.record());
        self.persistence.shutdown();
        tracing::info!(
            total = self.aggregator.record().total_steps(),
            "step tracking stopped"
        );
    }

    /// Process one accelerometer reading. Returns the step it completed, if any.
    pub fn on_sample(&mut self, sample: AccelSample) -> Option<StepEvent> {
        if !self.is_tracking {
            return None;
        }
        let Some(smoothed) = self.conditioner.update(&sample) else {
            self.skipped_samples += 1;
            tracing::debug!(?sample, "skipping non-finite sample");
            return None;
        };

        let event = self.detector.process(smoothed, self.clock.now_ms())?;
        let now = self.clock.now();
        if self.config.continuous_rollover && self.aggregator.roll_over_if_new_day(now) {
            self.persistence.flush(self.aggregator.record());
        }
        self.aggregator.record_step(&event, now);
        self.persistence.on_step_recorded(self.aggregator.record());
        Some(event)
    }

    /// Host lifecycle notification; leaving the foreground flushes the record
    pub fn on_lifecycle_change(&mut self, lifecycle: AppLifecycle) {
        if !self.started || !lifecycle.requires_flush() {
            return;
        }
        tracing::debug!(state = lifecycle.as_str(), "lifecycle flush");
        self.persistence.flush(self.aggregator.record());
    }

    /// Current consumer-facing state. Pure read.
    pub fn state(&self) -> StepCounterState {
        let record = self.aggregator.record();
        StepCounterState {
            total_steps: record.total_steps(),
            hourly_buckets: *record.hourly_buckets(),
            is_available: self.availability.unwrap_or(false),
            is_tracking: self.is_tracking,
        }
    }

    /// Derived projections at the clock's current hour. Pure read.
    pub fn derived(&self) -> DerivedSnapshot {
        DerivedSnapshot::compute(self.aggregator.record(), self.clock.current_hour())
    }

    /// Poll entry point for periodic schedulers: state plus projections,
    /// without side effects.
    pub fn refresh(&self) -> EngineSnapshot {
        let current_hour = self.clock.current_hour();
        let record = self.aggregator.record();
        EngineSnapshot {
            date: record.date().to_string(),
            current_hour,
            state: self.state(),
            derived: DerivedSnapshot::compute(record, current_hour),
        }
    }

    pub fn record(&self) -> &DailyStepRecord {
        self.aggregator.record()
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    pub fn is_tracking(&self) -> bool {
        self.is_tracking
    }

    /// Samples dropped because they were not finite
    pub fn skipped_samples(&self) -> u64 {
        self.skipped_samples
    }
}

impl Drop for StepEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sensor::HostSensor;
    use crate::store::MemoryStore;
    use crate::types::{ActivityBar, HOURS_PER_DAY};
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    const KEY: &str = "step_counter_data";
    const REST: f64 = 1.0;
    const PULSE: f64 = 3.0;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    struct Harness {
        engine: StepEngine,
        clock: ManualClock,
        store: MemoryStore,
        sensor: HostSensor,
    }

    impl Harness {
        fn new(config: StepConfig, start: &str, sensor: HostSensor) -> Self {
            let clock = ManualClock::new(at(start));
            let store = MemoryStore::new();
            let engine = StepEngine::new(
                config,
                Box::new(sensor.clone()),
                Arc::new(store.clone()),
                Arc::new(clock.clone()),
            )
            .unwrap();
            Self {
                engine,
                clock,
                store,
                sensor,
            }
        }

        fn inline(start: &str) -> Self {
            Self::new(StepConfig::inline_writes(), start, HostSensor::available())
        }

        /// Feed `count` samples of vertical magnitude `z`, one every 20 ms
        fn push(&mut self, z: f64, count: usize) -> Vec<StepEvent> {
            let mut events = Vec::new();
            for _ in 0..count {
                if let Some(event) = self.engine.on_sample(AccelSample::new(0.0, 0.0, z)) {
                    events.push(event);
                }
                self.clock.advance_ms(20);
            }
            events
        }

        /// Let the smoothed signal fall from its baseline to the rest level
        fn settle(&mut self) {
            assert!(self.push(REST, 50).is_empty());
        }

        /// One clean footfall followed by 400 ms of rest
        fn walk_step(&mut self) -> usize {
            let mut events = self.push(PULSE, 5);
            events.extend(self.push(REST, 20));
            events.len()
        }

        fn stored(&self) -> Option<DailyStepRecord> {
            self.store
                .get(KEY)
                .unwrap()
                .map(|raw| DailyStepRecord::from_json(&raw).unwrap())
        }
    }

    #[test]
    fn test_flat_stream_counts_nothing() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        let events = h.push(REST, 3_000);
        assert!(events.is_empty());
        assert_eq!(h.engine.state().total_steps, 0);
    }

    #[test]
    fn test_two_clean_cycles_count_two_steps() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();

        let mut events = h.push(PULSE, 5);
        events.extend(h.push(REST, 20));
        events.extend(h.push(PULSE, 5));
        events.extend(h.push(REST, 5));

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].timestamp_ms - events[0].timestamp_ms, 500);
        let state = h.engine.state();
        assert_eq!(state.total_steps, 2);
        assert_eq!(state.hourly_buckets[10], 2);
    }

    #[test]
    fn test_cycles_inside_refractory_window_count_once() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();

        let mut events = h.push(PULSE, 3);
        events.extend(h.push(REST, 2));
        events.extend(h.push(PULSE, 3));
        events.extend(h.push(REST, 10));

        assert_eq!(events.len(), 1);
        assert_eq!(h.engine.state().total_steps, 1);
    }

    #[test]
    fn test_yesterdays_record_is_ignored() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        let mut buckets = [0; HOURS_PER_DAY];
        buckets[18] = 4_000;
        let yesterday = DailyStepRecord::from_buckets("2024-01-14", buckets);
        h.store.set(KEY, &yesterday.to_json().unwrap()).unwrap();

        let state = h.engine.start();
        assert_eq!(state.total_steps, 0);
        assert_eq!(state.hourly_buckets, [0; HOURS_PER_DAY]);
        assert_eq!(h.engine.record().date(), "2024-01-15");
    }

    #[test]
    fn test_todays_record_is_restored() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        let mut buckets = [0; HOURS_PER_DAY];
        buckets[8] = 300;
        buckets[9] = 200;
        let stored = DailyStepRecord::from_buckets("2024-01-15", buckets);
        h.store.set(KEY, &stored.to_json().unwrap()).unwrap();

        h.engine.start();
        h.settle();
        assert_eq!(h.walk_step(), 1);

        let state = h.engine.state();
        assert_eq!(state.total_steps, 501);
        assert_eq!(state.hourly_buckets[9], 200);
        assert_eq!(state.hourly_buckets[10], 1);
    }

    #[test]
    fn test_early_morning_projections() {
        let mut h = Harness::inline("2024-01-15 00:10:00");
        h.engine.start();
        h.settle();
        assert_eq!(h.walk_step(), 1);
        assert_eq!(h.walk_step(), 1);

        h.clock.set(at("2024-01-15 01:20:00"));
        for _ in 0..3 {
            assert_eq!(h.walk_step(), 1);
        }

        h.clock.set(at("2024-01-15 10:30:00"));
        let derived = h.engine.derived();
        assert_eq!(derived.sparkline, [5, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        // First half (hours 0-4) = 5, second half (hours 5-9) = 0
        assert_eq!(derived.trend_percent, -100);

        let idle = ActivityBar { level: 0, active: false };
        let mut expected = [idle; 7];
        expected[1] = ActivityBar { level: 100, active: true };
        assert_eq!(derived.activity_bars, expected);
    }

    #[test]
    fn test_invariants_hold_on_noisy_stream() {
        let mut h = Harness::inline("2024-01-15 07:00:00");
        h.engine.start();
        h.settle();

        let mut previous_total = 0;
        let mut last_step: Option<i64> = None;
        for i in 0..5_000 {
            let t = i as f64;
            let z = REST + 1.5 * (t * 0.45).sin().max(0.0) + 0.3 * (t * 2.3).sin();
            if let Some(event) = h.engine.on_sample(AccelSample::new(0.1, -0.2, z)) {
                if let Some(last) = last_step {
                    assert!(event.timestamp_ms - last > 350);
                }
                last_step = Some(event.timestamp_ms);

                let state = h.engine.state();
                assert_eq!(state.total_steps, state.hourly_buckets.iter().sum::<u32>());
                assert!(state.total_steps > previous_total);
                previous_total = state.total_steps;
            }
            h.clock.advance_ms(20);
        }
        assert!(previous_total > 0);
    }

    #[test]
    fn test_flushes_every_fifth_step() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();

        for _ in 0..4 {
            assert_eq!(h.walk_step(), 1);
        }
        assert_eq!(h.store.write_count(), 0);

        assert_eq!(h.walk_step(), 1);
        assert_eq!(h.store.write_count(), 1);
        assert_eq!(h.stored().unwrap().total_steps(), 5);
    }

    #[test]
    fn test_background_lifecycle_flushes() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();
        h.walk_step();
        h.walk_step();

        h.engine.on_lifecycle_change(AppLifecycle::Active);
        assert_eq!(h.store.write_count(), 0);

        h.engine.on_lifecycle_change(AppLifecycle::Background);
        assert_eq!(h.stored().unwrap().total_steps(), 2);

        h.walk_step();
        h.engine.on_lifecycle_change(AppLifecycle::Inactive);
        assert_eq!(h.stored().unwrap().total_steps(), 3);
    }

    #[test]
    fn test_lifecycle_before_start_does_not_overwrite() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        let stored = DailyStepRecord::from_buckets("2024-01-15", [1; HOURS_PER_DAY]);
        h.store.set(KEY, &stored.to_json().unwrap()).unwrap();

        h.engine.on_lifecycle_change(AppLifecycle::Background);
        assert_eq!(h.stored().unwrap(), stored);
    }

    #[test]
    fn test_stop_unsubscribes_and_flushes() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        assert!(h.sensor.is_subscribed());
        assert_eq!(h.sensor.update_interval_ms(), Some(20));
        h.settle();
        h.walk_step();

        h.engine.stop();
        assert!(!h.sensor.is_subscribed());
        assert!(!h.engine.state().is_tracking);
        assert_eq!(h.stored().unwrap().total_steps(), 1);

        // Nothing is processed after stop
        h.push(PULSE, 5);
        h.push(REST, 20);
        assert_eq!(h.engine.state().total_steps, 1);
    }

    #[test]
    fn test_background_writes_land_by_stop() {
        let mut h = Harness::new(
            StepConfig::default(),
            "2024-01-15 10:00:00",
            HostSensor::available(),
        );
        h.engine.start();
        h.settle();
        for _ in 0..7 {
            h.walk_step();
        }
        h.engine.stop();
        assert_eq!(h.stored().unwrap().total_steps(), 7);
    }

    #[test]
    fn test_drop_performs_final_flush() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();
        h.walk_step();
        let Harness { engine, store, .. } = h;
        drop(engine);

        let stored = DailyStepRecord::from_json(&store.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.total_steps(), 1);
    }

    #[test]
    fn test_unavailable_sensor_never_tracks() {
        let mut h = Harness::new(
            StepConfig::inline_writes(),
            "2024-01-15 10:00:00",
            HostSensor::unavailable(),
        );
        let state = h.engine.start();
        assert!(!state.is_available);
        assert!(!state.is_tracking);
        assert!(!h.sensor.is_subscribed());

        h.push(REST, 50);
        h.push(PULSE, 5);
        h.push(REST, 20);
        assert_eq!(h.engine.state().total_steps, 0);

        h.engine.stop();
        h.engine.start();
        assert_eq!(h.sensor.probe_count(), 1);
        assert!(!h.engine.state().is_tracking);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();
        h.walk_step();
        let state = h.engine.start();
        assert_eq!(state.total_steps, 1);
        assert_eq!(h.sensor.probe_count(), 1);
    }

    #[test]
    fn test_restart_keeps_unsaved_steps() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();
        h.walk_step();
        h.walk_step();

        h.store.fail_writes(true);
        h.engine.stop();
        h.store.fail_writes(false);

        let state = h.engine.start();
        assert_eq!(state.total_steps, 2);
        assert!(state.is_tracking);
    }

    #[test]
    fn test_non_finite_samples_are_skipped() {
        let mut h = Harness::inline("2024-01-15 10:00:00");
        h.engine.start();
        h.settle();

        assert!(h.engine.on_sample(AccelSample::new(f64::NAN, 0.0, 1.0)).is_none());
        assert!(h.engine.on_sample(AccelSample::new(0.0, f64::INFINITY, 1.0)).is_none());
        assert_eq!(h.engine.skipped_samples(), 2);

        // Detection still works afterwards
        assert_eq!(h.walk_step(), 1);
    }

    #[test]
    fn test_rollover_is_load_time_only_by_default() {
        let mut h = Harness::inline("2024-01-15 23:59:00");
        h.engine.start();
        h.settle();
        h.walk_step();

        h.clock.set(at("2024-01-16 00:00:30"));
        h.walk_step();

        assert_eq!(h.engine.record().date(), "2024-01-15");
        assert_eq!(h.engine.state().total_steps, 2);
        assert_eq!(h.engine.state().hourly_buckets[0], 1);
    }

    #[test]
    fn test_continuous_rollover_resets_on_new_day() {
        let mut config = StepConfig::inline_writes();
        config.continuous_rollover = true;
        let mut h = Harness::new(config, "2024-01-15 23:59:00", HostSensor::available());
        h.engine.start();
        h.settle();
        h.walk_step();
        assert_eq!(h.engine.state().hourly_buckets[23], 1);

        h.clock.set(at("2024-01-16 00:00:30"));
        h.walk_step();

        assert_eq!(h.engine.record().date(), "2024-01-16");
        assert_eq!(h.engine.state().total_steps, 1);
        assert_eq!(h.engine.state().hourly_buckets[0], 1);
        assert_eq!(h.stored().unwrap().date(), "2024-01-16");
    }

    #[test]
    fn test_refresh_is_side_effect_free() {
        let mut h = Harness::inline("2024-01-15 14:00:00");
        h.engine.start();
        h.settle();
        h.walk_step();

        let first = h.engine.refresh();
        let second = h.engine.refresh();
        assert_eq!(first, second);
        assert_eq!(first.date, "2024-01-15");
        assert_eq!(first.current_hour, 14);
        assert_eq!(first.state.total_steps, 1);
        assert_eq!(first.derived.sparkline[7], 1);
        assert_eq!(h.store.write_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = StepConfig::default();
        config.signal.smoothing_alpha = 2.0;
        let result = StepEngine::new(
            config,
            Box::new(HostSensor::available()),
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(StepError::InvalidConfig(_))));
    }
}
