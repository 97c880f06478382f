//! Batch Pool for Producer/Consumer Hand-off
//!
//! ## Overview
//!
//! The pool owns every [`SampleBatch`] for the process lifetime and is the
//! only structure shared between the sampling thread (producer) and the
//! classification thread (consumer). A batch is always in exactly one place:
//!
//! ```text
//!            take_empty               return_filled
//!   ┌───────┐ ─────────→  Producer  ─────────────→ ┌────────┐
//!   │ empty │                                      │ filled │ (FIFO)
//!   └───────┘ ←─────────  Consumer  ←───────────── └────────┘
//!            return_empty              take_filled
//! ```
//!
//! `empty + filled + checked_out == size` holds after every operation. The
//! pool tracks which ids are checked out, so returning a batch twice or
//! returning a batch from another pool is refused instead of silently
//! duplicating an instance.
//!
//! ## Blocking
//!
//! `take_empty` and `take_filled` block on a condition variable until a batch
//! is available. `close()` cancels every waiter with `Interrupted`. Bounded
//! variants fail with `PoolExhausted`, and `try_*` variants never block,
//! returning `nb::Error::WouldBlock` instead.
//!
//! Filled batches are served oldest first. Empty batches carry no ordering.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::batch::SampleBatch;
use crate::config::SamplingConfig;
use crate::errors::{CoreError, CoreResult};

/// Which set an operation draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Empty,
    Filled,
}

struct PoolState {
    empty: Vec<SampleBatch>,
    filled: VecDeque<SampleBatch>,
    /// Indexed by batch id
    checked_out: Vec<bool>,
    closed: bool,
    handed_out: u64,
}

impl PoolState {
    fn available(&self, side: Side) -> usize {
        match side {
            Side::Empty => self.empty.len(),
            Side::Filled => self.filled.len(),
        }
    }

    fn pop(&mut self, side: Side) -> Option<SampleBatch> {
        let batch = match side {
            Side::Empty => self.empty.pop(),
            Side::Filled => self.filled.pop_front(),
        }?;
        self.checked_out[batch.id() as usize] = true;
        self.handed_out += 1;
        Some(batch)
    }

    fn check_in(&mut self, batch: &SampleBatch) -> CoreResult<()> {
        match self.checked_out.get_mut(batch.id() as usize) {
            Some(out) if *out => {
                *out = false;
                Ok(())
            }
            _ => Err(CoreError::ForeignBatch { id: batch.id() }),
        }
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Batches waiting to be filled
    pub empty: usize,
    /// Batches waiting to be consumed
    pub filled: usize,
    /// Batches currently owned by a producer or consumer
    pub checked_out: usize,
    /// Total batches owned by the pool
    pub size: usize,
    /// Successful takes since creation
    pub handed_out: u64,
}

/// Fixed set of reusable batches with blocking hand-off
pub struct BatchPool {
    state: Mutex<PoolState>,
    empty_ready: Condvar,
    filled_ready: Condvar,
    size: usize,
    batch_capacity: usize,
}

impl BatchPool {
    /// Allocate `size` batches of `batch_capacity` samples each
    pub fn new(size: usize, batch_capacity: usize) -> Self {
        let empty = (0..size)
            .map(|id| SampleBatch::new(id as u32, batch_capacity))
            .collect();

        Self {
            state: Mutex::new(PoolState {
                empty,
                filled: VecDeque::with_capacity(size),
                checked_out: vec![false; size],
                closed: false,
                handed_out: 0,
            }),
            empty_ready: Condvar::new(),
            filled_ready: Condvar::new(),
            size,
            batch_capacity,
        }
    }

    /// Pool shaped by the sampling configuration
    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.pool_size, config.samples_per_batch)
    }

    /// Total batches owned by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Capacity of every batch
    pub fn batch_capacity(&self) -> usize {
        self.batch_capacity
    }

    /// Block until an empty batch is available
    pub fn take_empty(&self) -> CoreResult<SampleBatch> {
        self.take(Side::Empty, None)
    }

    /// Block at most `timeout` for an empty batch
    pub fn take_empty_timeout(&self, timeout: Duration) -> CoreResult<SampleBatch> {
        self.take(Side::Empty, Some(timeout))
    }

    /// Take an empty batch if one is ready
    pub fn try_take_empty(&self) -> nb::Result<SampleBatch, CoreError> {
        self.try_take(Side::Empty)
    }

    /// Hand a filled batch to the consumer side
    pub fn return_filled(&self, batch: SampleBatch) -> CoreResult<()> {
        let mut state = self.lock();
        state.check_in(&batch)?;
        state.filled.push_back(batch);
        drop(state);
        self.filled_ready.notify_one();
        Ok(())
    }

    /// Block until the oldest filled batch is available
    pub fn take_filled(&self) -> CoreResult<SampleBatch> {
        self.take(Side::Filled, None)
    }

    /// Block at most `timeout` for a filled batch
    pub fn take_filled_timeout(&self, timeout: Duration) -> CoreResult<SampleBatch> {
        self.take(Side::Filled, Some(timeout))
    }

    /// Take the oldest filled batch if one is ready
    pub fn try_take_filled(&self) -> nb::Result<SampleBatch, CoreError> {
        self.try_take(Side::Filled)
    }

    /// Give a consumed batch back for refilling
    pub fn return_empty(&self, batch: SampleBatch) -> CoreResult<()> {
        let mut state = self.lock();
        state.check_in(&batch)?;
        state.empty.push(batch);
        drop(state);
        self.empty_ready.notify_one();
        Ok(())
    }

    /// Look at the oldest filled batch without taking it
    pub fn peek_filled<R>(&self, f: impl FnOnce(&SampleBatch) -> R) -> Option<R> {
        let state = self.lock();
        state.filled.front().map(f)
    }

    /// Cancel every current and future blocking take
    ///
    /// Returns are still accepted after closing so checked-out batches can
    /// come home.
    pub fn close(&self) {
        self.lock().closed = true;
        self.empty_ready.notify_all();
        self.filled_ready.notify_all();
    }

    /// Whether `close()` was called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current occupancy
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            empty: state.empty.len(),
            filled: state.filled.len(),
            checked_out: state.checked_out.iter().filter(|out| **out).count(),
            size: self.size,
            handed_out: state.handed_out,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Every mutation leaves the sets consistent before it can panic
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready(&self, side: Side) -> &Condvar {
        match side {
            Side::Empty => &self.empty_ready,
            Side::Filled => &self.filled_ready,
        }
    }

    fn take(&self, side: Side, timeout: Option<Duration>) -> CoreResult<SampleBatch> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(CoreError::Interrupted);
            }
            if let Some(batch) = state.pop(side) {
                return Ok(batch);
            }

            state = match deadline {
                None => self
                    .ready(side)
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited_ms = timeout.map_or(0, |t| t.as_millis() as u64);
                        return Err(CoreError::PoolExhausted { waited_ms });
                    }
                    self.ready(side)
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn try_take(&self, side: Side) -> nb::Result<SampleBatch, CoreError> {
        let mut state = self.lock();
        if state.closed {
            return Err(nb::Error::Other(CoreError::Interrupted));
        }
        if state.available(side) == 0 {
            return Err(nb::Error::WouldBlock);
        }
        state.pop(side).ok_or(nb::Error::WouldBlock)
    }
}
