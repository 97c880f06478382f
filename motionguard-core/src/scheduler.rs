//! Sampling Scheduler Thread
//!
//! Runs the producer side of the pipeline on its own thread:
//!
//! ```text
//! loop:
//!   take_empty ──→ Sampler::start ──→ wait remaining ──→ tick
//!                        │                                 │
//!                        └─ fault: back off, retry         └─ finished → return_filled
//! ```
//!
//! The thread waits on a command channel instead of sleeping, so shutdown and
//! fault acknowledgement take effect immediately.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::batch::SampleBatch;
use crate::constants::FAULT_RETRY_BACKOFF_MS;
use crate::errors::{CoreError, CoreResult};
use crate::events::{FaultEvent, FaultListener};
use crate::pool::BatchPool;
use crate::sampler::{Sampler, SamplerListener};
use crate::source::{SamplingQuality, SensorDriver};
use crate::time::TimeSource;

/// Poll interval while waiting for an empty batch
const EMPTY_WAIT_MS: u64 = 100;

/// Sampler listener that routes batches back into the pool
pub struct PoolListener<F: FaultListener> {
    pool: Arc<BatchPool>,
    faults: F,
}

impl<F: FaultListener> PoolListener<F> {
    /// Route batches into `pool` and faults to `faults`
    pub fn new(pool: Arc<BatchPool>, faults: F) -> Self {
        Self {
            pool,
            faults,
        }
    }
}

impl<F: FaultListener> SamplerListener for PoolListener<F> {
    fn finished(&mut self, batch: SampleBatch, quality: SamplingQuality) {
        log::debug!(
            "Batch {} filled with {} samples, mean spacing {:.1}ms",
            batch.id(),
            batch.len(),
            quality.mean_delay_ms
        );
        if let Err(error) = self.pool.return_filled(batch) {
            log::error!("Could not hand filled batch to the pool: {}", error);
        }
    }

    fn stopped(&mut self, batch: SampleBatch) {
        if let Err(error) = self.pool.return_empty(batch) {
            log::error!("Could not return unused batch to the pool: {}", error);
        }
    }

    fn fault_raised(&mut self, event: FaultEvent) {
        self.faults.fault_raised(event);
    }

    fn fault_resolved(&mut self, event: FaultEvent) {
        self.faults.fault_resolved(event);
    }
}

enum Command {
    AcknowledgeFault,
    Shutdown,
}

enum Flow {
    Continue,
    Shutdown,
}

/// Handle to a running sampling thread
pub struct SchedulerHandle {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Let the sampler retry after a raised hardware fault
    pub fn acknowledge_fault(&self) {
        let _ = self.commands.send(Command::AcknowledgeFault);
    }

    /// Stop sampling and wait for the thread to exit
    ///
    /// A running cycle is aborted and its batch returned to the pool.
    pub fn shutdown(mut self) -> thread::Result<()> {
        let _ = self.commands.send(Command::Shutdown);
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawns the sampling thread
pub struct SamplingScheduler;

impl SamplingScheduler {
    /// Run `sampler` against `pool` until shut down
    pub fn spawn<D, T, F>(
        pool: Arc<BatchPool>,
        sampler: Sampler<D, T, PoolListener<F>>,
    ) -> CoreResult<SchedulerHandle>
    where
        D: SensorDriver + 'static,
        T: TimeSource + 'static,
        F: FaultListener + 'static,
    {
        let (commands, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("motionguard-sampler".into())
            .spawn(move || run(pool, sampler, inbox))
            .map_err(|_| CoreError::InvalidConfig {
                reason: "could not spawn the sampling thread",
            })?;

        Ok(SchedulerHandle {
            commands,
            thread: Some(thread),
        })
    }
}

fn run<D, T, F>(
    pool: Arc<BatchPool>,
    mut sampler: Sampler<D, T, PoolListener<F>>,
    inbox: Receiver<Command>,
) where
    D: SensorDriver,
    T: TimeSource,
    F: FaultListener,
{
    log::info!("Sampling thread started");

    'cycles: loop {
        let batch = match pool.take_empty_timeout(Duration::from_millis(EMPTY_WAIT_MS)) {
            Ok(batch) => batch,
            Err(CoreError::PoolExhausted { .. }) => {
                match wait(&inbox, &mut sampler, Duration::ZERO) {
                    Flow::Continue => continue,
                    Flow::Shutdown => break,
                }
            }
            Err(_) => break,
        };

        if let Err(error) = sampler.start(batch) {
            log::debug!("Sampling cycle not started: {}", error);
            let backoff = Duration::from_millis(FAULT_RETRY_BACKOFF_MS);
            match wait(&inbox, &mut sampler, backoff) {
                Flow::Continue => continue,
                Flow::Shutdown => break,
            }
        }

        loop {
            let remaining = Duration::from_millis(sampler.remaining_ms().max(1));
            if let Flow::Shutdown = wait(&inbox, &mut sampler, remaining) {
                break 'cycles;
            }
            if sampler.tick() || !sampler.is_sampling() {
                break;
            }
        }
    }

    sampler.shutdown();
    log::info!("Sampling thread stopped");
}

/// Wait up to `timeout` for a command
fn wait<D, T, L>(inbox: &Receiver<Command>, sampler: &mut Sampler<D, T, L>, timeout: Duration) -> Flow
where
    D: SensorDriver,
    T: TimeSource,
    L: SamplerListener,
{
    match inbox.recv_timeout(timeout) {
        Ok(Command::AcknowledgeFault) => {
            sampler.acknowledge_fault();
            Flow::Continue
        }
        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => Flow::Shutdown,
        Err(RecvTimeoutError::Timeout) => Flow::Continue,
    }
}
