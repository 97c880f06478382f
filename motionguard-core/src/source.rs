//! Accelerometer Source
//!
//! Bridges the push-style sensor callback (any thread, any frequency) into
//! the batch currently being filled.
//!
//! The platform driver is handed a [`SensorSink`] when it registers and calls
//! [`SensorSink::on_sensor_changed`] from its own thread. The sink appends to
//! the active batch under a lock scoped to that one append. The sampler owns
//! the [`AccelSource`] and installs or removes the active batch.
//!
//! ## Glitch rejection
//!
//! Some drivers occasionally report an exact `0.0` on an axis that was far
//! from zero a moment before. A sample is dropped when any axis reads exactly
//! zero while the same axis of the previous accepted sample was more than
//! `glitch_epsilon` away from zero.
//!
//! ## Quality statistics
//!
//! The running mean and variance of the delay between accepted samples use
//! sensor event timestamps, not the time the callback ran. They are reset
//! when sampling starts and reported by [`AccelSource::stop_sampling`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::batch::{Append, Sample, SampleBatch};
use crate::config::SamplingConfig;
use crate::constants::MIN_SAMPLES_TO_START;
use crate::errors::{CoreError, CoreResult};
use crate::time::Timestamp;

/// Platform accelerometer listener registration
///
/// `register` hands the driver the sink it must push events into. The driver
/// keeps delivering until `unregister`.
pub trait SensorDriver: Send {
    /// Start delivering events at roughly `delay_ms` spacing
    fn register(&mut self, sink: SensorSink, delay_ms: u64) -> CoreResult<()>;

    /// Stop delivering events
    fn unregister(&mut self);
}

/// What happened to one sensor event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Appended to the active batch
    Accepted,
    /// Dropped by the zero-glitch heuristic
    Glitch,
    /// Dropped because its timestamp went backwards
    OutOfOrder,
    /// Dropped because the active batch is full
    Overflow,
    /// No batch is being filled
    Inactive,
}

/// Inter-sample delay statistics of one sampling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingQuality {
    /// Mean delay between accepted samples (ms)
    pub mean_delay_ms: f64,
    /// Standard deviation of that delay (ms)
    pub std_dev_delay_ms: f64,
    /// Samples appended
    pub accepted: usize,
    /// Samples dropped as glitches or out of order
    pub rejected: usize,
    /// Samples dropped because the batch was full
    pub overflow: usize,
}

/// Welford running mean/variance
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

struct FillState {
    batch: Option<SampleBatch>,
    previous: Option<[f32; 3]>,
    last_timestamp: Option<Timestamp>,
    delays: RunningStats,
    accepted: usize,
    rejected: usize,
    overflow: usize,
    charging: bool,
    glitch_epsilon: f32,
}

impl FillState {
    fn is_glitch(&self, axes: &[f32; 3]) -> bool {
        let Some(previous) = self.previous else {
            return false;
        };
        axes.iter()
            .zip(previous.iter())
            .any(|(now, before)| *now == 0.0 && before.abs() > self.glitch_epsilon)
    }

    fn begin(&mut self, mut batch: SampleBatch) {
        batch.set_charging(self.charging);
        self.batch = Some(batch);
        self.last_timestamp = None;
        self.delays = RunningStats::default();
        self.accepted = 0;
        self.rejected = 0;
        self.overflow = 0;
    }

    fn quality(&self) -> SamplingQuality {
        SamplingQuality {
            mean_delay_ms: self.delays.mean,
            std_dev_delay_ms: self.delays.std_dev(),
            accepted: self.accepted,
            rejected: self.rejected,
            overflow: self.overflow,
        }
    }
}

struct Shared {
    state: Mutex<FillState>,
    arrived: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FillState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle the platform driver pushes sensor events into
#[derive(Clone)]
pub struct SensorSink {
    shared: Arc<Shared>,
}

impl SensorSink {
    /// Deliver one accelerometer event
    pub fn on_sensor_changed(&self, timestamp: Timestamp, axes: [f32; 3]) -> SampleOutcome {
        let mut state = self.shared.lock();

        if state.batch.is_none() {
            return SampleOutcome::Inactive;
        }
        if state.is_glitch(&axes) {
            state.rejected += 1;
            return SampleOutcome::Glitch;
        }

        let appended = match state.batch.as_mut() {
            Some(batch) => batch.push(Sample::new(timestamp, axes)),
            None => return SampleOutcome::Inactive,
        };

        match appended {
            Append::Accepted => {
                if let Some(last) = state.last_timestamp {
                    state.delays.add(timestamp.saturating_sub(last) as f64);
                }
                state.last_timestamp = Some(timestamp);
                state.previous = Some(axes);
                state.accepted += 1;
                drop(state);
                self.shared.arrived.notify_all();
                SampleOutcome::Accepted
            }
            Append::Full => {
                state.overflow += 1;
                SampleOutcome::Overflow
            }
            Append::OutOfOrder => {
                state.rejected += 1;
                SampleOutcome::OutOfOrder
            }
        }
    }

    /// Record whether the device is charging
    ///
    /// Applies to the batch being filled and to every later batch.
    pub fn set_charging(&self, charging: bool) {
        let mut state = self.shared.lock();
        state.charging = charging;
        if let Some(batch) = state.batch.as_mut() {
            if charging {
                batch.set_charging(true);
            }
        }
    }
}

/// Sampling front end over a platform sensor driver
pub struct AccelSource<D: SensorDriver> {
    driver: D,
    shared: Arc<Shared>,
    registered: bool,
    full_time: bool,
    fault_timeout: Duration,
    delay_ms: u64,
    quality: SamplingQuality,
}

impl<D: SensorDriver> AccelSource<D> {
    /// Wrap `driver` using the sampling options in `config`
    pub fn new(driver: D, config: &SamplingConfig) -> Self {
        Self {
            driver,
            shared: Arc::new(Shared {
                state: Mutex::new(FillState {
                    batch: None,
                    previous: None,
                    last_timestamp: None,
                    delays: RunningStats::default(),
                    accepted: 0,
                    rejected: 0,
                    overflow: 0,
                    charging: false,
                    glitch_epsilon: config.glitch_epsilon,
                }),
                arrived: Condvar::new(),
            }),
            registered: false,
            full_time: config.full_time_sampling,
            fault_timeout: Duration::from_millis(config.fault_timeout_ms),
            delay_ms: config.delay_between_samples_ms,
            quality: SamplingQuality::default(),
        }
    }

    /// Handle for delivering events outside of a driver registration
    pub fn sink(&self) -> SensorSink {
        SensorSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current requested sample spacing (ms)
    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Change the requested sample spacing
    ///
    /// A registered listener is re-registered at the new rate.
    pub fn set_delay_ms(&mut self, delay_ms: u64) -> CoreResult<()> {
        if delay_ms == self.delay_ms {
            return Ok(());
        }
        self.delay_ms = delay_ms;
        if self.registered {
            self.driver.unregister();
            self.registered = false;
            self.register()?;
        }
        Ok(())
    }

    /// Listener currently registered with the driver
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// A batch is installed and being filled
    pub fn is_sampling(&self) -> bool {
        self.shared.lock().batch.is_some()
    }

    /// Statistics of the last finished cycle
    pub fn quality(&self) -> SamplingQuality {
        self.quality
    }

    /// Access the wrapped driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the wrapped driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Install `batch` as the active batch and wait for the sensor
    ///
    /// Blocks until two samples have been accepted or the fault timeout
    /// elapses. On any error the batch stays installed; the caller reclaims
    /// it with [`stop_sampling`](Self::stop_sampling).
    pub fn start_sampling(&mut self, batch: SampleBatch) -> CoreResult<()> {
        self.shared.lock().begin(batch);

        if !self.registered {
            self.register()?;
        }

        let started = Instant::now();
        let deadline = started + self.fault_timeout;
        let mut state = self.shared.lock();
        while state.accepted < MIN_SAMPLES_TO_START {
            let now = Instant::now();
            if now >= deadline {
                let samples = state.accepted;
                drop(state);
                log::warn!(
                    "Sensor delivered {} sample(s) in {:?}, reporting hardware fault",
                    samples,
                    self.fault_timeout
                );
                return Err(CoreError::HardwareFault {
                    waited_ms: started.elapsed().as_millis() as u64,
                    samples,
                });
            }
            state = self
                .shared
                .arrived
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        Ok(())
    }

    /// Remove the active batch and finalize quality statistics
    ///
    /// The listener stays registered when full-time sampling is enabled.
    pub fn stop_sampling(&mut self) -> Option<SampleBatch> {
        if self.registered && !self.full_time {
            self.driver.unregister();
            self.registered = false;
        }

        let mut state = self.shared.lock();
        let batch = state.batch.take();
        self.quality = state.quality();
        drop(state);

        if self.quality.rejected > 0 || self.quality.overflow > 0 {
            log::debug!(
                "Sampling cycle dropped {} glitch(es) and {} overflow sample(s)",
                self.quality.rejected,
                self.quality.overflow
            );
        }
        batch
    }

    /// Unregister regardless of the full-time option
    pub fn shutdown(&mut self) {
        if self.registered {
            self.driver.unregister();
            self.registered = false;
        }
    }

    fn register(&mut self) -> CoreResult<()> {
        let sink = self.sink();
        self.driver.register(sink, self.delay_ms)?;
        self.registered = true;
        log::debug!("Accelerometer listener registered at {}ms", self.delay_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_GLITCH_EPSILON;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Driver that delivers a fixed script synchronously on register
    struct ScriptDriver {
        script: Vec<(Timestamp, [f32; 3])>,
        registrations: Arc<AtomicUsize>,
    }

    impl ScriptDriver {
        fn new(script: Vec<(Timestamp, [f32; 3])>) -> Self {
            Self {
                script,
                registrations: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SensorDriver for ScriptDriver {
        fn register(&mut self, sink: SensorSink, _delay_ms: u64) -> CoreResult<()> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            for (timestamp, axes) in &self.script {
                sink.on_sensor_changed(*timestamp, *axes);
            }
            Ok(())
        }

        fn unregister(&mut self) {}
    }

    fn config() -> SamplingConfig {
        SamplingConfig {
            samples_per_batch: 8,
            fault_timeout_ms: 30,
            ..Default::default()
        }
    }

    #[test]
    fn starts_once_two_samples_arrive() {
        let driver = ScriptDriver::new(vec![(0, [0.1, 0.2, 9.8]), (50, [0.1, 0.2, 9.7])]);
        let mut source = AccelSource::new(driver, &config());

        source.start_sampling(SampleBatch::new(0, 8)).unwrap();
        assert!(source.is_registered());

        let batch = source.stop_sampling().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(!source.is_registered());
        assert_eq!(source.quality().accepted, 2);
        assert_eq!(source.quality().mean_delay_ms, 50.0);
    }

    #[test]
    fn silent_sensor_is_a_hardware_fault() {
        let driver = ScriptDriver::new(vec![(0, [0.1, 0.2, 9.8])]);
        let mut source = AccelSource::new(driver, &config());

        let err = source.start_sampling(SampleBatch::new(0, 8)).unwrap_err();
        assert!(matches!(err, CoreError::HardwareFault { samples: 1, .. }));
        // Batch is still reclaimable after the fault
        assert_eq!(source.stop_sampling().map(|b| b.len()), Some(1));
    }

    #[test]
    fn zero_glitches_rejected() {
        let mut source = AccelSource::new(ScriptDriver::new(vec![]), &config());
        let sink = source.sink();
        source.shared.lock().begin(SampleBatch::new(0, 8));

        assert_eq!(sink.on_sensor_changed(0, [1.0, 0.5, 9.8]), SampleOutcome::Accepted);
        assert_eq!(sink.on_sensor_changed(10, [0.0, 0.5, 9.8]), SampleOutcome::Glitch);
        // Axis that was already near zero may legitimately read zero
        assert_eq!(sink.on_sensor_changed(20, [1.0, 0.05, 9.8]), SampleOutcome::Accepted);
        assert_eq!(sink.on_sensor_changed(30, [1.0, 0.0, 9.8]), SampleOutcome::Accepted);

        let batch = source.stop_sampling().unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(source.quality().rejected, 1);
    }

    #[test]
    fn glitch_epsilon_is_exclusive() {
        let mut source = AccelSource::new(ScriptDriver::new(vec![]), &config());
        let sink = source.sink();
        source.shared.lock().begin(SampleBatch::new(0, 8));

        // Previous reading exactly at the epsilon
        assert_eq!(sink.on_sensor_changed(0, [1.0, DEFAULT_GLITCH_EPSILON, 9.8]), SampleOutcome::Accepted);
        assert_eq!(sink.on_sensor_changed(10, [1.0, 0.0, 9.8]), SampleOutcome::Accepted);
        // Just past it
        assert_eq!(sink.on_sensor_changed(20, [1.0, -0.1001, 9.8]), SampleOutcome::Accepted);
        assert_eq!(sink.on_sensor_changed(30, [1.0, 0.0, 9.8]), SampleOutcome::Glitch);

        assert_eq!(source.stop_sampling().map(|b| b.len()), Some(3));
    }

    #[test]
    fn events_without_batch_are_ignored() {
        let source = AccelSource::new(ScriptDriver::new(vec![]), &config());
        assert_eq!(
            source.sink().on_sensor_changed(0, [0.0, 0.0, 9.8]),
            SampleOutcome::Inactive
        );
    }

    #[test]
    fn overflow_counted() {
        let mut source = AccelSource::new(ScriptDriver::new(vec![]), &config());
        let sink = source.sink();
        source.shared.lock().begin(SampleBatch::new(0, 2));

        sink.on_sensor_changed(0, [0.0, 0.0, 9.8]);
        sink.on_sensor_changed(10, [0.0, 0.0, 9.8]);
        assert_eq!(sink.on_sensor_changed(20, [0.0, 0.0, 9.8]), SampleOutcome::Overflow);
        source.stop_sampling();
        assert_eq!(source.quality().overflow, 1);
    }

    #[test]
    fn full_time_keeps_listener() {
        let driver = ScriptDriver::new(vec![(0, [0.1, 0.2, 9.8]), (50, [0.1, 0.2, 9.7])]);
        let registrations = Arc::clone(&driver.registrations);
        let config = SamplingConfig {
            full_time_sampling: true,
            ..config()
        };
        let mut source = AccelSource::new(driver, &config);

        source.start_sampling(SampleBatch::new(0, 8)).unwrap();
        source.stop_sampling();
        assert!(source.is_registered());

        // Second start must not register again; feed through the sink instead
        let sink = source.sink();
        let feeder = std::thread::spawn(move || {
            for i in 0..20u64 {
                std::thread::sleep(Duration::from_millis(2));
                sink.on_sensor_changed(100 + i * 50, [0.1, 0.2, 9.8]);
            }
        });
        source.start_sampling(SampleBatch::new(1, 32)).unwrap();
        feeder.join().unwrap();
        assert_eq!(registrations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn charging_flag_applied_to_batch() {
        let mut source = AccelSource::new(ScriptDriver::new(vec![]), &config());
        source.sink().set_charging(true);
        source.shared.lock().begin(SampleBatch::new(0, 8));
        assert!(source.stop_sampling().unwrap().charging());
    }
}
