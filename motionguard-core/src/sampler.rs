//! Sampling State Machine
//!
//! ```text
//!            start(batch) ok
//!   ┌──────┐ ─────────────────→ ┌──────────┐
//!   │ Idle │                    │ Sampling │
//!   └──────┘ ←───────────────── └──────────┘
//!      ↑ │    tick() after batch duration → finished(batch)
//!      │ │    stop()                      → stopped(batch)
//!      └─┘
//!   start(batch) fails → stopped(batch), error(e)
//! ```
//!
//! ## Fault policy
//!
//! A start that gets fewer than two samples before the fault timeout is a
//! hardware fault. Faults are counted; after `faults_before_degrade`
//! consecutive faults the sample spacing doubles (rate halves) up to the
//! tolerant spacing. A run of faults at the tolerant spacing raises a
//! persistent fault notification and the sampler refuses to start until
//! [`Sampler::acknowledge_fault`]. The first successful start afterwards
//! reports the fault as resolved.
//!
//! Every batch handed to `start` comes back through `finished` or `stopped`;
//! none stays checked out when a cycle fails or is aborted.

use crate::batch::SampleBatch;
use crate::config::SamplingConfig;
use crate::errors::{CoreError, CoreResult};
use crate::events::FaultEvent;
use crate::source::{AccelSource, SamplingQuality, SensorDriver, SensorSink};
use crate::time::{elapsed_ms, TimeSource, Timestamp};

/// Sampler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    /// No cycle running
    Idle,
    /// A batch is being filled
    Sampling,
}

/// Callbacks fired by the sampler
pub trait SamplerListener: Send {
    /// Cycle completed normally
    fn finished(&mut self, batch: SampleBatch, quality: SamplingQuality);

    /// Cycle aborted or never started; the batch was not filled
    fn stopped(&mut self, batch: SampleBatch);

    /// A start attempt failed
    fn error(&mut self, error: CoreError) {
        log::warn!("Sampling start failed: {}", error);
    }

    /// Sampling suspended until acknowledged
    fn fault_raised(&mut self, event: FaultEvent);

    /// Sampling works again after a raised fault
    fn fault_resolved(&mut self, event: FaultEvent);
}

/// Drives an [`AccelSource`] through fixed-length sampling cycles
pub struct Sampler<D: SensorDriver, T: TimeSource, L: SamplerListener> {
    source: AccelSource<D>,
    clock: T,
    listener: L,
    config: SamplingConfig,
    state: SamplerState,
    started_at: Timestamp,
    consecutive_faults: u8,
    fault_pending: bool,
    fault_reported: bool,
}

impl<D: SensorDriver, T: TimeSource, L: SamplerListener> Sampler<D, T, L> {
    /// Build a sampler over `driver`
    pub fn new(driver: D, clock: T, listener: L, config: SamplingConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            source: AccelSource::new(driver, &config),
            clock,
            listener,
            config,
            state: SamplerState::Idle,
            started_at: 0,
            consecutive_faults: 0,
            fault_pending: false,
            fault_reported: false,
        })
    }

    /// Current state
    pub fn state(&self) -> SamplerState {
        self.state
    }

    /// A cycle is running
    pub fn is_sampling(&self) -> bool {
        self.state == SamplerState::Sampling
    }

    /// Requested sample spacing after any degradation (ms)
    pub fn delay_ms(&self) -> u64 {
        self.source.delay_ms()
    }

    /// Faults since the last successful start
    pub fn consecutive_faults(&self) -> u8 {
        self.consecutive_faults
    }

    /// Waiting for [`acknowledge_fault`](Self::acknowledge_fault)
    pub fn fault_pending(&self) -> bool {
        self.fault_pending
    }

    /// Sampling configuration
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Handle for pushing sensor events directly
    pub fn sink(&self) -> SensorSink {
        self.source.sink()
    }

    /// The wrapped source
    pub fn source(&self) -> &AccelSource<D> {
        &self.source
    }

    /// Callback receiver
    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Mutable callback receiver
    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Begin filling `batch`
    ///
    /// On failure the batch is handed back through `stopped` before the error
    /// is returned.
    pub fn start(&mut self, mut batch: SampleBatch) -> CoreResult<()> {
        if self.state == SamplerState::Sampling {
            log::error!("Refusing to start batch {} while sampling", batch.id());
            self.listener.stopped(batch);
            return Err(CoreError::AlreadySampling);
        }
        if self.fault_pending {
            self.listener.stopped(batch);
            return Err(CoreError::FaultPending);
        }

        let now = self.clock.now();
        batch.reset();
        batch.set_sample_time(now);

        match self.source.start_sampling(batch) {
            Ok(()) => {
                self.state = SamplerState::Sampling;
                self.started_at = now;
                self.consecutive_faults = 0;
                if self.fault_reported {
                    self.fault_reported = false;
                    let event = FaultEvent::resolved(now, self.source.delay_ms());
                    log::info!("Hardware fault resolved at {}ms spacing", event.delay_ms);
                    self.listener.fault_resolved(event);
                }
                log::debug!("Sampling started at {}", now);
                Ok(())
            }
            Err(error) => {
                if let Some(batch) = self.source.stop_sampling() {
                    self.listener.stopped(batch);
                }
                self.listener.error(error);
                if matches!(error, CoreError::HardwareFault { .. }) {
                    self.record_fault(now);
                }
                Err(error)
            }
        }
    }

    /// Periodic completion check
    ///
    /// Returns `true` when the cycle completed and `finished` fired.
    pub fn tick(&mut self) -> bool {
        if self.state != SamplerState::Sampling {
            return false;
        }
        if elapsed_ms(self.started_at, self.clock.now()) < self.config.batch_duration_ms {
            return false;
        }

        self.state = SamplerState::Idle;
        let Some(mut batch) = self.source.stop_sampling() else {
            return false;
        };
        let quality = self.source.quality();

        let expected = self.expected_samples(batch.elapsed_ms());
        if batch.len() > expected {
            log::debug!(
                "Downsampling batch {} from {} to {} samples",
                batch.id(),
                batch.len(),
                expected
            );
            batch.downsample(expected);
        }

        self.listener.finished(batch, quality);
        true
    }

    /// Time left in the running cycle (ms), zero when idle
    pub fn remaining_ms(&self) -> u64 {
        if self.state != SamplerState::Sampling {
            return 0;
        }
        let elapsed = elapsed_ms(self.started_at, self.clock.now());
        self.config.batch_duration_ms.saturating_sub(elapsed)
    }

    /// Abort the running cycle
    pub fn stop(&mut self) {
        if self.state != SamplerState::Sampling {
            return;
        }
        self.state = SamplerState::Idle;
        if let Some(batch) = self.source.stop_sampling() {
            log::debug!("Sampling of batch {} aborted", batch.id());
            self.listener.stopped(batch);
        }
    }

    /// Abort any cycle and release the sensor
    pub fn shutdown(&mut self) {
        self.stop();
        self.source.shutdown();
    }

    /// Allow starts again after a raised fault
    pub fn acknowledge_fault(&mut self) {
        self.fault_pending = false;
        self.consecutive_faults = 0;
    }

    fn expected_samples(&self, elapsed: u64) -> usize {
        let expected = elapsed / self.source.delay_ms().max(1) + 1;
        (expected as usize).min(self.config.samples_per_batch)
    }

    fn record_fault(&mut self, now: Timestamp) {
        self.consecutive_faults += 1;
        if self.consecutive_faults < self.config.faults_before_degrade {
            return;
        }
        self.consecutive_faults = 0;

        let delay = self.source.delay_ms();
        if delay >= self.config.tolerant_delay_ms {
            self.fault_pending = true;
            self.fault_reported = true;
            self.listener.fault_raised(FaultEvent::raised(now, delay));
            return;
        }

        let degraded = (delay * 2).min(self.config.tolerant_delay_ms);
        log::info!(
            "Degrading accelerometer spacing from {}ms to {}ms",
            delay,
            degraded
        );
        if let Err(error) = self.source.set_delay_ms(degraded) {
            log::warn!("Could not apply degraded rate: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MockTimeSource;

    /// Driver that pushes `burst` samples per registration
    struct BurstDriver {
        burst: usize,
        spacing_ms: u64,
        next_timestamp: u64,
    }

    impl SensorDriver for BurstDriver {
        fn register(&mut self, sink: SensorSink, _delay_ms: u64) -> CoreResult<()> {
            for _ in 0..self.burst {
                sink.on_sensor_changed(self.next_timestamp, [0.2, 0.3, 9.8]);
                self.next_timestamp += self.spacing_ms;
            }
            Ok(())
        }

        fn unregister(&mut self) {}
    }

    #[derive(Default)]
    struct Recorder {
        finished: Vec<SampleBatch>,
        stopped: Vec<u32>,
        errors: usize,
        raised: usize,
        resolved: usize,
    }

    impl SamplerListener for Recorder {
        fn finished(&mut self, batch: SampleBatch, _quality: SamplingQuality) {
            self.finished.push(batch);
        }
        fn stopped(&mut self, batch: SampleBatch) {
            self.stopped.push(batch.id());
        }
        fn error(&mut self, _error: CoreError) {
            self.errors += 1;
        }
        fn fault_raised(&mut self, _event: FaultEvent) {
            self.raised += 1;
        }
        fn fault_resolved(&mut self, _event: FaultEvent) {
            self.resolved += 1;
        }
    }

    fn config() -> SamplingConfig {
        SamplingConfig {
            samples_per_batch: 16,
            delay_between_samples_ms: 50,
            batch_duration_ms: 400,
            tolerant_delay_ms: 200,
            fault_timeout_ms: 5,
            ..Default::default()
        }
    }

    fn sampler(burst: usize, spacing_ms: u64) -> (Sampler<BurstDriver, MockTimeSource, Recorder>, MockTimeSource) {
        let clock = MockTimeSource::new(1_000);
        let driver = BurstDriver {
            burst,
            spacing_ms,
            next_timestamp: 0,
        };
        let sampler = Sampler::new(driver, clock.clone(), Recorder::default(), config()).unwrap();
        (sampler, clock)
    }

    #[test]
    fn completes_after_batch_duration() {
        let (mut sampler, clock) = sampler(9, 50);
        sampler.start(SampleBatch::new(3, 16)).unwrap();
        assert!(sampler.is_sampling());

        clock.advance(399);
        assert_eq!(sampler.remaining_ms(), 1);
        assert!(!sampler.tick());
        clock.advance(1);
        assert!(sampler.tick());

        assert_eq!(sampler.state(), SamplerState::Idle);
        let batch = &sampler.listener().finished[0];
        assert_eq!(batch.sample_time(), 1_000);
        assert_eq!(batch.len(), 9);
    }

    #[test]
    fn fast_sensor_is_downsampled() {
        // 16 samples over 150ms at a 50ms target rate is 4 samples
        let (mut sampler, clock) = sampler(16, 10);
        sampler.start(SampleBatch::new(0, 16)).unwrap();
        clock.advance(400);
        assert!(sampler.tick());
        assert_eq!(sampler.listener().finished[0].len(), 4);
    }

    #[test]
    fn stop_returns_batch() {
        let (mut sampler, _clock) = sampler(4, 50);
        sampler.start(SampleBatch::new(5, 16)).unwrap();
        sampler.stop();
        assert_eq!(sampler.listener().stopped, vec![5]);
        assert!(!sampler.tick());
    }

    #[test]
    fn second_start_is_refused() {
        let (mut sampler, _clock) = sampler(4, 50);
        sampler.start(SampleBatch::new(1, 16)).unwrap();

        let err = sampler.start(SampleBatch::new(2, 16)).unwrap_err();
        assert!(matches!(err, CoreError::AlreadySampling));
        // The refused batch comes straight back; the running one is kept
        assert_eq!(sampler.listener().stopped, vec![2]);
        assert!(sampler.is_sampling());
        assert_eq!(sampler.consecutive_faults(), 0);

        sampler.stop();
        assert_eq!(sampler.listener().stopped, vec![2, 1]);
    }

    #[test]
    fn fault_returns_batch_and_counts() {
        let (mut sampler, _clock) = sampler(1, 50);
        let err = sampler.start(SampleBatch::new(2, 16)).unwrap_err();
        assert!(matches!(err, CoreError::HardwareFault { .. }));
        assert_eq!(sampler.state(), SamplerState::Idle);
        assert_eq!(sampler.listener().stopped, vec![2]);
        assert_eq!(sampler.listener().errors, 1);
        assert_eq!(sampler.consecutive_faults(), 1);
    }

    #[test]
    fn third_fault_halves_rate() {
        let (mut sampler, _clock) = sampler(0, 50);
        for id in 0..3 {
            let _ = sampler.start(SampleBatch::new(id, 16));
        }
        assert_eq!(sampler.delay_ms(), 100);
        assert_eq!(sampler.consecutive_faults(), 0);
    }

    #[test]
    fn tolerant_rate_faults_raise_notification() {
        let (mut sampler, _clock) = sampler(0, 50);
        // 50 → 100 → 200, then three more faults at 200
        for id in 0..9 {
            let _ = sampler.start(SampleBatch::new(id, 16));
        }
        assert_eq!(sampler.delay_ms(), 200);
        assert!(sampler.fault_pending());
        assert_eq!(sampler.listener().raised, 1);

        assert_eq!(
            sampler.start(SampleBatch::new(9, 16)),
            Err(CoreError::FaultPending)
        );
        assert_eq!(sampler.listener().stopped.len(), 10);
    }

    #[test]
    fn success_after_acknowledge_resolves() {
        let (mut sampler, _clock) = sampler(0, 50);
        for id in 0..9 {
            let _ = sampler.start(SampleBatch::new(id, 16));
        }
        sampler.acknowledge_fault();
        sampler.source.driver_mut().burst = 4;
        sampler.start(SampleBatch::new(10, 16)).unwrap();
        assert_eq!(sampler.listener().resolved, 1);
        assert_eq!(sampler.consecutive_faults(), 0);
    }

    #[test]
    fn success_resets_fault_counter() {
        let (mut sampler, _clock) = sampler(0, 50);
        let _ = sampler.start(SampleBatch::new(0, 16));
        let _ = sampler.start(SampleBatch::new(1, 16));
        sampler.source.driver_mut().burst = 4;
        sampler.start(SampleBatch::new(2, 16)).unwrap();
        assert_eq!(sampler.consecutive_faults(), 0);
        assert_eq!(sampler.delay_ms(), 50);
    }
}
