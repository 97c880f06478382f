//! Common test utilities for classification integration tests
//!
//! This module provides:
//! - Batches for typical activities
//! - Small labeled training sets
//! - A recording activity sink
//! - A sensor driver delivering from its own thread

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use motionguard_core::constants::STANDARD_GRAVITY;
use motionguard_core::{
    ActivityChange, CoreResult, FeatureExtractor, FeatureLayout, Sample, SampleBatch,
    SensorDriver, SensorSink, Timestamp,
};
use motionguard_ml::{ActivitySink, MLError, TrainingSet};

/// Device lying still
pub fn stationary(_t: u64) -> [f32; 3] {
    [0.0, 0.0, STANDARD_GRAVITY]
}

/// Two steps per second
pub fn walking(t: u64) -> [f32; 3] {
    let phase = t as f32 / 1000.0 * 4.0 * std::f32::consts::PI;
    [
        1.5 * (phase / 2.0).sin(),
        0.5 * phase.cos(),
        STANDARD_GRAVITY + 3.0 * phase.sin(),
    ]
}

/// Batch of `count` samples of `signal` starting at `start`
pub fn batch(signal: fn(u64) -> [f32; 3], start: Timestamp, spacing_ms: u64, count: usize) -> SampleBatch {
    let mut batch = SampleBatch::new(0, count);
    batch.set_sample_time(start);
    for i in 0..count as u64 {
        let t = start + i * spacing_ms;
        batch.push(Sample::new(t, signal(t)));
    }
    batch
}

/// One exemplar per activity, extracted from the generators
pub fn training_set(layout: FeatureLayout) -> TrainingSet {
    let mut extractor = FeatureExtractor::new(layout);
    let mut set = TrainingSet::new(layout);
    let activities: [(&str, fn(u64) -> [f32; 3]); 2] =
        [("STATIONARY", stationary), ("WALKING", walking)];
    for (label, signal) in activities {
        for offset in [0, 370] {
            let features = extractor.extract(&batch(signal, offset, 50, 64)).unwrap();
            set.push(label, features.values()).unwrap();
        }
    }
    set
}

/// Activity sink that keeps everything it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub changes: Arc<Mutex<Vec<ActivityChange>>>,
    pub extensions: Arc<Mutex<Vec<(String, Timestamp)>>>,
    pub failures: Arc<Mutex<Vec<MLError>>>,
}

impl RecordingSink {
    pub fn changes(&self) -> Vec<ActivityChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn extensions(&self) -> usize {
        self.extensions.lock().unwrap().len()
    }
}

impl ActivitySink for RecordingSink {
    fn activity_changed(&mut self, change: ActivityChange) {
        self.changes.lock().unwrap().push(change);
    }

    fn activity_extended(&mut self, activity_path: &str, end_time: Timestamp) {
        self.extensions
            .lock()
            .unwrap()
            .push((activity_path.to_string(), end_time));
    }

    fn classification_failed(&mut self, error: &MLError) {
        self.failures.lock().unwrap().push(error.clone());
    }
}

/// Pushes `signal(t)` with timestamps `spacing_ms` apart while registered
///
/// Events are delivered every `sleep_ms` of real time, so a test can cover
/// seconds of sensor time in a fraction of that.
pub struct ThreadedDriver {
    signal: fn(u64) -> [f32; 3],
    spacing_ms: u64,
    sleep_ms: u64,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    next_timestamp: u64,
}

impl ThreadedDriver {
    pub fn new(signal: fn(u64) -> [f32; 3], spacing_ms: u64) -> Self {
        Self {
            signal,
            spacing_ms,
            sleep_ms: spacing_ms,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            next_timestamp: 0,
        }
    }

    pub fn with_sleep(mut self, sleep_ms: u64) -> Self {
        self.sleep_ms = sleep_ms;
        self
    }
}

impl SensorDriver for ThreadedDriver {
    fn register(&mut self, sink: SensorSink, _delay_ms: u64) -> CoreResult<()> {
        self.unregister();
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let signal = self.signal;
        let spacing = self.spacing_ms;
        let sleep = Duration::from_millis(self.sleep_ms);
        let mut t = self.next_timestamp;
        self.next_timestamp += 1_000_000;

        self.thread = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                sink.on_sensor_changed(t, signal(t));
                t += spacing;
                thread::sleep(sleep);
            }
        }));
        Ok(())
    }

    fn unregister(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ThreadedDriver {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
