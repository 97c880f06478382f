//! Constants for MotionGuard Core
//!
//! Defaults for every sampling option, grouped by concern. `SamplingConfig`
//! starts from these values; anything here can be overridden from a
//! configuration file.

// ===== BATCH SHAPE =====

/// Samples held by one batch.
///
/// 128 samples at 50ms spacing covers a 6.4s classification interval, long
/// enough to contain several gait cycles.
pub const DEFAULT_SAMPLES_PER_BATCH: usize = 128;

/// Target spacing between accepted samples (milliseconds).
///
/// 20 Hz, the "game" rate on most phone accelerometers.
pub const DEFAULT_DELAY_BETWEEN_SAMPLES_MS: u64 = 50;

/// Length of one sampling cycle (milliseconds).
pub const DEFAULT_BATCH_DURATION_MS: u64 =
    DEFAULT_SAMPLES_PER_BATCH as u64 * DEFAULT_DELAY_BETWEEN_SAMPLES_MS;

/// Batches allocated for the process lifetime.
pub const DEFAULT_POOL_SIZE: usize = 20;

// ===== FAULT HANDLING =====

/// How long `start_sampling` waits for the first two samples (milliseconds).
pub const DEFAULT_FAULT_TIMEOUT_MS: u64 = 2000;

/// Consecutive start failures before the sampling rate is halved.
pub const DEFAULT_FAULTS_BEFORE_DEGRADE: u8 = 3;

/// Slowest, most tolerant sample spacing (milliseconds).
///
/// Matches the "normal" sensor rate, which every driver supports.
pub const DEFAULT_TOLERANT_DELAY_MS: u64 = 200;

/// Pause before retrying after a failed start (milliseconds).
pub const FAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Minimum samples that prove the sensor is alive.
pub const MIN_SAMPLES_TO_START: usize = 2;

// ===== SIGNAL =====

/// Distance from zero beyond which an exact-zero reading is a glitch.
pub const DEFAULT_GLITCH_EPSILON: f32 = 0.1;

/// Gravity magnitudes below this fall back to the device Z axis.
pub const MIN_GRAVITY_MAGNITUDE: f32 = 1e-3;

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f32 = 9.806_65;
