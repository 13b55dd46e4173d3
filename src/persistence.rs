//! Persistence management
//!
//! Loads the daily record at start, flushes it every N recorded steps, and on
//! request (lifecycle transitions, teardown). Every flush serializes the record
//! as it is at call time, so whichever write lands last is never older than
//! the data it replaced. Write failures are logged and dropped.
//!
//! With background writes enabled, payloads are handed to a writer thread over
//! a channel; the writer coalesces queued payloads and stores only the newest.

use crate::config::PersistenceConfig;
use crate::error::StepError;
use crate::store::KeyValueStore;
use crate::types::DailyStepRecord;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;

enum WriteCommand {
    Write(String),
    Stop,
}

/// Dedicated thread that performs store writes off the sample path
struct BackgroundWriter {
    tx: Sender<WriteCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BackgroundWriter {
    fn spawn(store: Arc<dyn KeyValueStore>, key: String) -> Result<Self, StepError> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("steps-writer".to_string())
            .spawn(move || writer_loop(rx, store, key))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a payload; never blocks
    fn submit(&self, payload: String) -> Result<(), StepError> {
        self.tx
            .send(WriteCommand::Write(payload))
            .map_err(|_| StepError::Store("writer thread is gone".to_string()))
    }

    /// Write whatever is queued, then stop and join the thread
    fn close(&mut self) {
        let _ = self.tx.send(WriteCommand::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("step record writer thread panicked");
            }
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn writer_loop(rx: Receiver<WriteCommand>, store: Arc<dyn KeyValueStore>, key: String) {
    while let Ok(command) = rx.recv() {
        let mut stop = false;
        let mut latest = None;
        for command in std::iter::once(command).chain(rx.try_iter()) {
            match command {
                WriteCommand::Write(payload) => latest = Some(payload),
                WriteCommand::Stop => stop = true,
            }
        }
        if let Some(payload) = latest {
            write_payload(store.as_ref(), &key, &payload);
        }
        if stop {
            break;
        }
    }
    tracing::debug!("step record writer stopped");
}

fn write_payload(store: &dyn KeyValueStore, key: &str, payload: &str) {
    match store.set(key, payload) {
        Ok(()) => tracing::debug!(key, bytes = payload.len(), "step record written"),
        Err(e) => tracing::warn!(key, error = %e, "step record write failed, dropping"),
    }
}

/// Load, flush policy, and write path for the daily record
pub struct PersistenceManager {
    store: Arc<dyn KeyValueStore>,
    key: String,
    flush_every: u32,
    steps_since_flush: u32,
    background: bool,
    writer: Option<BackgroundWriter>,
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &PersistenceConfig) -> Self {
        Self {
            store,
            key: config.storage_key.clone(),
            flush_every: config.flush_every_steps.max(1),
            steps_since_flush: 0,
            background: config.background_writes,
            writer: None,
        }
    }

    /// Storage key the record lives under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Steps recorded since the last flush
    pub fn pending_steps(&self) -> u32 {
        self.steps_since_flush
    }

    /// Load today's record. A missing, unreadable, corrupt, or stale record
    /// yields a fresh one for `today`.
    pub fn load(&self, today: &str) -> DailyStepRecord {
        match self.read_stored() {
            Ok(Some(record)) if record.date() == today => {
                tracing::info!(
                    date = today,
                    total = record.total_steps(),
                    "restored step record"
                );
                record
            }
            Ok(Some(record)) => {
                tracing::info!(
                    stored_date = record.date(),
                    date = today,
                    "stored step record is from another day, starting fresh"
                );
                DailyStepRecord::new(today)
            }
            Ok(None) => DailyStepRecord::new(today),
            Err(e) => {
                tracing::warn!(error = %e, "could not load step record, starting fresh");
                DailyStepRecord::new(today)
            }
        }
    }

    /// Read and validate whatever is stored under the key
    pub fn read_stored(&self) -> Result<Option<DailyStepRecord>, StepError> {
        match self.store.get(&self.key)? {
            Some(raw) => DailyStepRecord::from_json(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Count a recorded step and flush once the threshold is reached.
    /// Returns true when a flush was dispatched.
    pub fn on_step_recorded(&mut self, record: &DailyStepRecord) -> bool {
        self.steps_since_flush += 1;
        if self.steps_since_flush >= self.flush_every {
            self.flush(record);
            return true;
        }
        false
    }

    /// Write the record as it is now, regardless of the step threshold
    pub fn flush(&mut self, record: &DailyStepRecord) {
        self.steps_since_flush = 0;
        let payload = match record.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize step record");
                return;
            }
        };

        if !self.background {
            write_payload(self.store.as_ref(), &self.key, &payload);
            return;
        }

        if self.writer.is_none() {
            match BackgroundWriter::spawn(Arc::clone(&self.store), self.key.clone()) {
                Ok(writer) => self.writer = Some(writer),
                Err(e) => {
                    tracing::warn!(error = %e, "could not start writer thread, writing inline");
                    write_payload(self.store.as_ref(), &self.key, &payload);
                    return;
                }
            }
        }
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.submit(payload) {
                tracing::warn!(error = %e, "step record write dropped");
                self.writer = None;
            }
        }
    }

    /// Drain queued writes and stop the writer thread. A later flush starts a
    /// new one.
    pub fn shutdown(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.close();
        }
    }
}

impl Drop for PersistenceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
