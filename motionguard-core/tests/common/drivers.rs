//! Sensor drivers for integration tests
//!
//! Unlike the synchronous drivers in unit tests, these deliver events from a
//! thread of their own, the way a platform sensor service does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use motionguard_core::{CoreResult, SensorDriver, SensorSink};

/// Pushes `signal(t)` every `spacing_ms` while registered
///
/// Delivery can be switched off with the `working` flag to simulate a
/// stalled sensor without unregistering.
pub struct ThreadedDriver {
    signal: fn(u64) -> [f32; 3],
    spacing_ms: u64,
    working: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    next_timestamp: u64,
    registrations: usize,
}

impl ThreadedDriver {
    pub fn new(signal: fn(u64) -> [f32; 3], spacing_ms: u64) -> Self {
        Self {
            signal,
            spacing_ms,
            working: Arc::new(AtomicBool::new(true)),
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            next_timestamp: 0,
            registrations: 0,
        }
    }

    /// A driver whose sensor never reports
    pub fn silent(spacing_ms: u64) -> Self {
        let driver = Self::new(super::generators::stationary, spacing_ms);
        driver.working.store(false, Ordering::SeqCst);
        driver
    }

    /// Switch that turns delivery on and off from the test
    pub fn working_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.working)
    }

    pub fn registrations(&self) -> usize {
        self.registrations
    }
}

impl SensorDriver for ThreadedDriver {
    fn register(&mut self, sink: SensorSink, _delay_ms: u64) -> CoreResult<()> {
        self.unregister();
        self.registrations += 1;
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let working = Arc::clone(&self.working);
        let signal = self.signal;
        let spacing = self.spacing_ms;
        let mut t = self.next_timestamp;
        // Timestamps continue across registrations
        self.next_timestamp += 1_000_000;

        self.thread = Some(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                if working.load(Ordering::SeqCst) {
                    sink.on_sensor_changed(t, signal(t));
                    t += spacing;
                }
                thread::sleep(Duration::from_millis(spacing));
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
