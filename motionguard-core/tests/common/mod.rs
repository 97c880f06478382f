//! Common test utilities for acquisition integration tests
//!
//! This module provides:
//! - Accelerometer signal generators for typical activities
//! - Sensor drivers that deliver events from their own thread
//! - Recording listeners for fault notifications
//! - Polling helpers for cross-thread assertions

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use motionguard_core::{FaultEvent, FaultKind, FaultListener};

pub mod drivers;
pub mod generators;

/// Fault listener that keeps every event for later inspection
#[derive(Clone, Default)]
pub struct RecordingFaults {
    events: Arc<Mutex<Vec<FaultEvent>>>,
}

impl RecordingFaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FaultEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: FaultKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl FaultListener for RecordingFaults {
    fn fault_raised(&mut self, event: FaultEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn fault_resolved(&mut self, event: FaultEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
