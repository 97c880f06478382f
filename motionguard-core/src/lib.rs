//! Accelerometer sampling core for MotionGuard
//!
//! Collects fixed-length batches of accelerometer samples and turns them into
//! orientation-independent feature vectors. Designed for phones and wearables
//! where the sensor may stall, deliver bursts or report glitches.
//!
//! Key constraints:
//! - Batches are preallocated and recycled through a [`BatchPool`]
//! - A stalled sensor degrades the sampling rate instead of spinning
//! - Every batch handed out comes back, even when a cycle fails
//!
//! ```no_run
//! use std::sync::Arc;
//! use motionguard_core::{
//!     BatchPool, FeatureExtractor, LogFaults, PoolListener, Sampler,
//!     SamplingConfig, SamplingScheduler, SystemTime,
//! };
//! # use motionguard_core::{SensorDriver, SensorSink, CoreResult};
//! # struct Driver;
//! # impl SensorDriver for Driver {
//! #     fn register(&mut self, _: SensorSink, _: u64) -> CoreResult<()> { Ok(()) }
//! #     fn unregister(&mut self) {}
//! # }
//!
//! let config = SamplingConfig::default();
//! let pool = Arc::new(BatchPool::from_config(&config));
//! let listener = PoolListener::new(pool.clone(), LogFaults);
//! let sampler = Sampler::new(Driver, SystemTime, listener, config.clone()).unwrap();
//! let _scheduler = SamplingScheduler::spawn(pool.clone(), sampler).unwrap();
//!
//! let mut extractor = FeatureExtractor::from_config(&config);
//! let batch = pool.take_filled().unwrap();
//! let features = extractor.extract(&batch);
//! pool.return_empty(batch).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod features;
pub mod pool;
pub mod sampler;
pub mod scheduler;
pub mod source;
pub mod time;

// Public API
pub use batch::{Append, Sample, SampleBatch};
pub use config::SamplingConfig;
pub use errors::{CoreError, CoreResult};
pub use events::{ActivityChange, FaultEvent, FaultKind, FaultListener, LogFaults};
pub use features::{FeatureExtractor, FeatureLayout, FeatureVector, MAX_FEATURES};
pub use pool::{BatchPool, PoolStats};
pub use sampler::{Sampler, SamplerListener, SamplerState};
pub use scheduler::{PoolListener, SamplingScheduler, SchedulerHandle};
pub use source::{AccelSource, SampleOutcome, SamplingQuality, SensorDriver, SensorSink};
pub use time::{MockTimeSource, SystemTime, TimeSource, Timestamp};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
