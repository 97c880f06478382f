//! Fixed-Capacity Sample Batch
//!
//! ## Overview
//!
//! One batch holds the accelerometer samples of one classification interval.
//! Batches are allocated once, as part of a [`crate::pool::BatchPool`], and
//! reused for the whole process lifetime: `reset()` rewinds the write cursor
//! without giving the storage back, so the sampling hot path never allocates.
//!
//! ## Invariants
//!
//! - `cursor <= capacity` (a full batch silently refuses further samples)
//! - timestamps never decrease from one sample to the next
//! - a batch is written by one producer and read by one consumer, never both
//!   at once; ownership moves through the pool
//!
//! ```text
//! SampleBatch (capacity 6, cursor 4):
//! ┌─────┬─────┬─────┬─────┬─────┬─────┐
//! │ s0  │ s1  │ s2  │ s3  │     │     │
//! └─────┴─────┴─────┴─────┴─────┴─────┘
//!                          ↑
//!                        cursor (next write)
//! ```

use crate::time::Timestamp;

/// One accelerometer reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Sensor event time in milliseconds
    pub timestamp: Timestamp,
    /// X, Y, Z acceleration in m/s²
    pub axes: [f32; 3],
}

impl Sample {
    /// Create a sample
    pub const fn new(timestamp: Timestamp, axes: [f32; 3]) -> Self {
        Self { timestamp, axes }
    }
}

/// Outcome of appending a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Sample stored at the previous cursor position
    Accepted,
    /// Batch already holds `capacity` samples
    Full,
    /// Timestamp is older than the last stored sample
    OutOfOrder,
}

/// Fixed-capacity, reusable container for one batch of samples
#[derive(Debug, Clone)]
pub struct SampleBatch {
    /// Pool-assigned identity, stable across resets
    id: u32,
    /// Maximum number of samples
    capacity: usize,
    /// Stored samples; `samples.len()` is the write cursor
    samples: Vec<Sample>,
    /// When the batch started filling
    sample_time: Timestamp,
    /// Device was charging while this batch was filled
    charging: bool,
}

impl SampleBatch {
    /// Allocate a batch with room for `capacity` samples
    pub fn new(id: u32, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            samples: Vec::with_capacity(capacity),
            sample_time: 0,
            charging: false,
        }
    }

    /// Pool-assigned identity
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Maximum number of samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Next write position, equal to the number of stored samples
    pub fn cursor(&self) -> usize {
        self.samples.len()
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// No samples stored yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Cursor reached capacity
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Stored samples in arrival order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// When the batch started filling
    pub fn sample_time(&self) -> Timestamp {
        self.sample_time
    }

    /// Mark the start of a fill cycle
    pub fn set_sample_time(&mut self, sample_time: Timestamp) {
        self.sample_time = sample_time;
    }

    /// Device was charging during this batch
    pub fn charging(&self) -> bool {
        self.charging
    }

    /// Record the charging state
    pub fn set_charging(&mut self, charging: bool) {
        self.charging = charging;
    }

    /// Rewind for a new fill cycle, keeping the allocation
    pub fn reset(&mut self) {
        self.samples.clear();
        self.sample_time = 0;
        self.charging = false;
    }

    /// Append a sample at the cursor
    pub fn push(&mut self, sample: Sample) -> Append {
        if self.is_full() {
            return Append::Full;
        }
        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                return Append::OutOfOrder;
            }
        }
        self.samples.push(sample);
        Append::Accepted
    }

    /// Time covered by the stored samples, first to last event
    pub fn elapsed_ms(&self) -> u64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp.saturating_sub(first.timestamp),
            _ => 0,
        }
    }

    /// Keep `target` samples picked at evenly spaced positions
    ///
    /// Order is preserved and the first sample always survives. Does nothing
    /// when the batch already holds `target` samples or fewer.
    pub fn downsample(&mut self, target: usize) {
        let count = self.samples.len();
        if target == 0 || count <= target {
            return;
        }
        for i in 0..target {
            let src = i * count / target;
            self.samples[i] = self.samples[src];
        }
        self.samples.truncate(target);
    }
}
