//! Events Leaving the Core
//!
//! The core talks to the surrounding application through two small event
//! types:
//!
//! - [`ActivityChange`]: the smoothed activity changed. This is the only data
//!   persistence, charts and upload need.
//! - [`FaultEvent`]: sampling cannot proceed even at the most tolerant rate
//!   (raised), or it has recovered (resolved).
//!
//! ```text
//! Sampler ──fault_raised / fault_resolved──→ FaultListener
//! Worker  ──activity_changed────────────────→ ActivitySink
//! ```

use crate::time::Timestamp;

/// New stable activity reported by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityChange {
    /// Taxonomy path, e.g. `CLASSIFIED/WALKING`
    pub activity_path: String,
    /// Start of the first batch classified as this activity
    pub start_time: Timestamp,
    /// End of the latest batch classified as this activity
    pub end_time: Timestamp,
}

/// Whether a fault begins or ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Sampling failed at the most tolerant rate
    Raised,
    /// Sampling succeeded again after a raised fault
    Resolved,
}

/// Hardware fault notification for the surrounding application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultEvent {
    /// Raised or resolved
    pub kind: FaultKind,
    /// Clock time of the notification
    pub timestamp: Timestamp,
    /// Sample spacing in use when the event fired (ms)
    pub delay_ms: u64,
}

impl FaultEvent {
    /// Fault raised at `timestamp`
    pub const fn raised(timestamp: Timestamp, delay_ms: u64) -> Self {
        Self {
            kind: FaultKind::Raised,
            timestamp,
            delay_ms,
        }
    }

    /// Fault resolved at `timestamp`
    pub const fn resolved(timestamp: Timestamp, delay_ms: u64) -> Self {
        Self {
            kind: FaultKind::Resolved,
            timestamp,
            delay_ms,
        }
    }
}

/// Receiver of hardware fault notifications
pub trait FaultListener: Send {
    /// Sampling has stopped retrying until the fault is acknowledged
    fn fault_raised(&mut self, event: FaultEvent);

    /// Sampling works again
    fn fault_resolved(&mut self, event: FaultEvent);
}

/// Fault listener that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFaults;

impl FaultListener for LogFaults {
    fn fault_raised(&mut self, event: FaultEvent) {
        log::error!(
            "Accelerometer unusable at {}ms spacing, sampling suspended",
            event.delay_ms
        );
    }

    fn fault_resolved(&mut self, event: FaultEvent) {
        log::info!("Accelerometer recovered at {}ms spacing", event.delay_ms);
    }
}
