//! Sampling configuration
//!
//! All options have defaults from [`crate::constants`], so a configuration
//! file only needs to mention what it changes.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{CoreError, CoreResult};

/// Options recognized by the acquisition side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Capacity of every batch in the pool
    pub samples_per_batch: usize,
    /// Target spacing between samples (ms)
    pub delay_between_samples_ms: u64,
    /// Length of one sampling cycle (ms)
    pub batch_duration_ms: u64,
    /// Number of batches in the pool
    pub pool_size: usize,
    /// Wait for the first two samples before declaring a fault (ms)
    pub fault_timeout_ms: u64,
    /// Consecutive faults before the rate is halved
    pub faults_before_degrade: u8,
    /// Slowest spacing the sampler will fall back to (ms)
    pub tolerant_delay_ms: u64,
    /// Keep the sensor listener registered between batches
    pub full_time_sampling: bool,
    /// Append frequency-domain features to every feature vector
    pub frequency_features: bool,
    /// Glitch rejection distance from zero
    pub glitch_epsilon: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples_per_batch: DEFAULT_SAMPLES_PER_BATCH,
            delay_between_samples_ms: DEFAULT_DELAY_BETWEEN_SAMPLES_MS,
            batch_duration_ms: DEFAULT_BATCH_DURATION_MS,
            pool_size: DEFAULT_POOL_SIZE,
            fault_timeout_ms: DEFAULT_FAULT_TIMEOUT_MS,
            faults_before_degrade: DEFAULT_FAULTS_BEFORE_DEGRADE,
            tolerant_delay_ms: DEFAULT_TOLERANT_DELAY_MS,
            full_time_sampling: false,
            frequency_features: false,
            glitch_epsilon: DEFAULT_GLITCH_EPSILON,
        }
    }
}

impl SamplingConfig {
    /// Check every option is usable
    pub fn validate(&self) -> CoreResult<()> {
        if self.samples_per_batch < MIN_SAMPLES_TO_START {
            return Err(CoreError::InvalidConfig {
                reason: "samples_per_batch must hold at least two samples",
            });
        }
        if self.delay_between_samples_ms == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "delay_between_samples_ms must be positive",
            });
        }
        if self.batch_duration_ms == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "batch_duration_ms must be positive",
            });
        }
        if self.pool_size == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "pool_size must be positive",
            });
        }
        if self.faults_before_degrade == 0 {
            return Err(CoreError::InvalidConfig {
                reason: "faults_before_degrade must be positive",
            });
        }
        if self.tolerant_delay_ms < self.delay_between_samples_ms {
            return Err(CoreError::InvalidConfig {
                reason: "tolerant_delay_ms must not be faster than the requested rate",
            });
        }
        if self.glitch_epsilon.is_nan() || self.glitch_epsilon < 0.0 {
            return Err(CoreError::InvalidConfig {
                reason: "glitch_epsilon must be a non-negative number",
            });
        }
        Ok(())
    }
}
