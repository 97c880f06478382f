//! Error Types for Sample Acquisition and Batch Hand-off
//!
//! ## Design Philosophy
//!
//! Acquisition errors are returned from the sampling hot path and from the
//! pool hand-off, so they stay small and cheap to clone:
//!
//! 1. **Small Size**: Variants carry a couple of integers or a `&'static str`.
//!
//! 2. **Copy Semantics**: Errors implement `Copy` so a fault can be handed to a
//!    listener and still returned to the caller.
//!
//! 3. **Actionable Information**: Each variant says which recovery applies
//!    without needing to query the sampler again.
//!
//! ## Error Categories
//!
//! ### Hardware
//! - `HardwareFault`: the sensor delivered fewer than two samples before the
//!   fault timeout. Retried with rate degradation by the sampler.
//! - `FaultPending`: a persistent fault was raised and has not been
//!   acknowledged yet. The sampler refuses to start until it is.
//!
//! ### Hand-off
//! - `Interrupted`: a blocking pool wait was cancelled.
//! - `PoolExhausted`: a bounded pool wait timed out.
//! - `ForeignBatch`: a batch was returned to a pool that does not own it.
//!
//! ### Configuration
//! - `InvalidConfig`: a sampling option is outside its usable range.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use motionguard_core::CoreError;
//!
//! fn on_start_failure(err: CoreError) {
//!     match err {
//!         CoreError::HardwareFault { .. } => {
//!             // Sampler degrades the rate on its own; nothing to do here
//!         }
//!         CoreError::FaultPending => {
//!             // Ask the user to check the sensor, then acknowledge
//!         }
//!         CoreError::Interrupted => {
//!             // Shutting down
//!         }
//!         _ => {}
//!     }
//! }
//! ```

use thiserror_no_std::Error;

/// Result type for acquisition operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Acquisition and hand-off errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// Sensor did not produce the first two samples in time
    #[error("Hardware fault: {samples} sample(s) after {waited_ms}ms")]
    HardwareFault {
        /// How long the source waited for samples
        waited_ms: u64,
        /// Samples that did arrive (always fewer than two)
        samples: usize,
    },

    /// A persistent hardware fault is waiting for acknowledgement
    #[error("Hardware fault notification not yet acknowledged")]
    FaultPending,

    /// `start` called while a cycle is already running
    #[error("Sampler is already sampling")]
    AlreadySampling,

    /// Blocking wait was cancelled
    #[error("Wait interrupted")]
    Interrupted,

    /// Bounded wait elapsed without a batch becoming available
    #[error("No batch available after {waited_ms}ms")]
    PoolExhausted {
        /// Length of the wait that timed out
        waited_ms: u64,
    },

    /// Batch does not belong to this pool
    #[error("Batch {id} is not owned by this pool")]
    ForeignBatch {
        /// Identifier carried by the rejected batch
        id: u32,
    },

    /// Configuration value out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which option was rejected
        reason: &'static str,
    },
}
