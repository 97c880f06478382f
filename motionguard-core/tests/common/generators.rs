//! Accelerometer signal generators
//!
//! Deterministic signals for the activities the classifiers distinguish.
//! Noise comes from a seeded linear congruential generator so every run sees
//! the same samples.

use motionguard_core::constants::STANDARD_GRAVITY;
use motionguard_core::{Sample, SampleBatch, Timestamp};

/// Seeded pseudo-random source
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    /// Uniform in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.state >> 8) & 0xFFFF) as f32 / 65_536.0
    }

    /// Uniform in `[-amplitude, amplitude)`
    pub fn jitter(&mut self, amplitude: f32) -> f32 {
        (self.next_f32() * 2.0 - 1.0) * amplitude
    }
}

/// Device lying still, screen up
pub fn stationary(_t: u64) -> [f32; 3] {
    [0.0, 0.0, STANDARD_GRAVITY]
}

/// Roughly 2 steps per second with vertical bounce and lateral sway
pub fn walking(t: u64) -> [f32; 3] {
    let phase = t as f32 / 1000.0 * 2.0 * std::f32::consts::PI * 2.0;
    [
        1.5 * (phase / 2.0).sin(),
        0.5 * phase.cos(),
        STANDARD_GRAVITY + 3.0 * phase.sin(),
    ]
}

/// Rotate a signal so gravity lies along the device X axis
pub fn on_its_side(axes: [f32; 3]) -> [f32; 3] {
    [axes[2], axes[1], -axes[0]]
}

/// `count` samples of `signal` at `spacing_ms`, with optional noise
pub fn series(
    signal: fn(u64) -> [f32; 3],
    start: Timestamp,
    spacing_ms: u64,
    count: usize,
    noise: Option<(&mut Noise, f32)>,
) -> Vec<Sample> {
    let mut noise = noise;
    (0..count as u64)
        .map(|i| {
            let t = start + i * spacing_ms;
            let mut axes = signal(t);
            if let Some((rng, amplitude)) = noise.as_mut() {
                for axis in axes.iter_mut() {
                    *axis += rng.jitter(*amplitude);
                }
            }
            Sample::new(t, axes)
        })
        .collect()
}

/// Batch filled with `samples`, sample time set to the first timestamp
pub fn batch_of(id: u32, samples: &[Sample]) -> SampleBatch {
    let mut batch = SampleBatch::new(id, samples.len());
    if let Some(first) = samples.first() {
        batch.set_sample_time(first.timestamp);
    }
    for sample in samples {
        batch.push(*sample);
    }
    batch
}
