//! Gravity-Relative Feature Extraction
//!
//! ## Overview
//!
//! Phones are carried in every orientation, so raw X/Y/Z series say little
//! about the activity. The extractor estimates the gravity direction of a
//! batch and splits every sample into two orientation-independent parts:
//!
//! ```text
//!          ĝ (mean of all samples, normalized)
//!          ↑
//!          │   v
//!   vertical = v·ĝ        horizontal = |v - (v·ĝ)ĝ|
//!          │ ╱
//!          │╱
//! ```
//!
//! Each series is summarized by range (max − min), mean and population
//! standard deviation. With frequency features enabled, two band magnitudes
//! of the vertical series are appended (DC removed, FFT over the batch).
//!
//! ## Layout
//!
//! The order and count of features is fixed by [`FeatureLayout`]. Trained
//! models record the names they were trained with; a model whose names do not
//! match the extractor's layout must be rejected when it is loaded.

use heapless::Vec as FixedVec;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::batch::SampleBatch;
use crate::config::SamplingConfig;
use crate::constants::MIN_GRAVITY_MAGNITUDE;

/// Upper bound on features in any layout
pub const MAX_FEATURES: usize = 8;

/// Names of the time-domain features, in order
pub const BASIC_FEATURES: [&str; 6] = [
    "horizontal_range",
    "horizontal_mean",
    "horizontal_std_dev",
    "vertical_range",
    "vertical_mean",
    "vertical_std_dev",
];

/// Names of the features with the frequency bands appended, in order
pub const FREQUENCY_FEATURES: [&str; 8] = [
    "horizontal_range",
    "horizontal_mean",
    "horizontal_std_dev",
    "vertical_range",
    "vertical_mean",
    "vertical_std_dev",
    "vertical_band_low",
    "vertical_band_high",
];

/// Which features the extractor produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLayout {
    /// Range, mean and standard deviation of both rotated series
    Basic,
    /// Basic features followed by two vertical band magnitudes
    WithFrequency,
}

impl FeatureLayout {
    /// Layout selected by the configuration
    pub fn from_config(config: &SamplingConfig) -> Self {
        if config.frequency_features {
            Self::WithFrequency
        } else {
            Self::Basic
        }
    }

    /// Feature names in vector order
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            Self::Basic => &BASIC_FEATURES,
            Self::WithFrequency => &FREQUENCY_FEATURES,
        }
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Whether `names` lists exactly this layout's features in order
    pub fn matches<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.len() == self.len()
            && names
                .iter()
                .zip(self.names())
                .all(|(given, expected)| given.as_ref() == *expected)
    }
}

/// Fixed-length, named feature values for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    layout: FeatureLayout,
    values: FixedVec<f32, MAX_FEATURES>,
}

impl FeatureVector {
    /// Build from raw values; `None` if the count does not fit the layout
    pub fn from_values(layout: FeatureLayout, values: &[f32]) -> Option<Self> {
        if values.len() != layout.len() {
            return None;
        }
        let values = FixedVec::from_slice(values).ok()?;
        Some(Self { layout, values })
    }

    /// Layout the values follow
    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    /// Values in layout order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true for an extracted vector
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of the feature called `name`
    pub fn get(&self, name: &str) -> Option<f32> {
        self.layout
            .names()
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }
}

/// Range, mean and population standard deviation of a series
fn summarize(series: &[f32]) -> [f32; 3] {
    let n = series.len() as f32;
    let (min, max, sum) = series.iter().fold(
        (f32::INFINITY, f32::NEG_INFINITY, 0.0f32),
        |(min, max, sum), &x| (min.min(x), max.max(x), sum + x),
    );
    let mean = sum / n;
    let variance = series.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n;
    [max - min, mean, variance.sqrt()]
}

/// Converts filled batches into feature vectors
pub struct FeatureExtractor {
    layout: FeatureLayout,
    planner: FftPlanner<f32>,
    horizontal: Vec<f32>,
    vertical: Vec<f32>,
}

impl FeatureExtractor {
    /// Extractor producing `layout`
    pub fn new(layout: FeatureLayout) -> Self {
        Self {
            layout,
            planner: FftPlanner::new(),
            horizontal: Vec::new(),
            vertical: Vec::new(),
        }
    }

    /// Extractor shaped by the configuration
    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(FeatureLayout::from_config(config))
    }

    /// Layout of every vector this extractor produces
    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    /// Unit gravity direction of a batch
    ///
    /// The mean acceleration of the batch, normalized. A batch whose mean is
    /// too small to give a direction falls back to the device Z axis.
    pub fn gravity(batch: &SampleBatch) -> [f32; 3] {
        let n = batch.len().max(1) as f32;
        let mut sum = [0.0f32; 3];
        for sample in batch.samples() {
            for (acc, axis) in sum.iter_mut().zip(sample.axes) {
                *acc += axis;
            }
        }
        let mean = sum.map(|s| s / n);
        normalize(mean).unwrap_or([0.0, 0.0, 1.0])
    }

    /// Features of `batch`, `None` for an empty batch
    pub fn extract(&mut self, batch: &SampleBatch) -> Option<FeatureVector> {
        let gravity = Self::gravity(batch);
        self.extract_with_gravity(batch, gravity)
    }

    /// Features of `batch` rotated against a supplied gravity vector
    pub fn extract_with_gravity(
        &mut self,
        batch: &SampleBatch,
        gravity: [f32; 3],
    ) -> Option<FeatureVector> {
        if batch.is_empty() {
            return None;
        }
        let g = normalize(gravity).unwrap_or([0.0, 0.0, 1.0]);

        self.horizontal.clear();
        self.vertical.clear();
        for sample in batch.samples() {
            let v = sample.axes;
            let vertical = v[0] * g[0] + v[1] * g[1] + v[2] * g[2];
            let squared = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
            self.vertical.push(vertical);
            self.horizontal.push((squared - vertical * vertical).max(0.0).sqrt());
        }

        let mut values: FixedVec<f32, MAX_FEATURES> = FixedVec::new();
        for value in summarize(&self.horizontal)
            .into_iter()
            .chain(summarize(&self.vertical))
        {
            values.push(value).ok()?;
        }

        if self.layout == FeatureLayout::WithFrequency {
            let [low, high] = self.band_magnitudes();
            values.push(low).ok()?;
            values.push(high).ok()?;
        }

        Some(FeatureVector {
            layout: self.layout,
            values,
        })
    }

    /// Low and high band magnitude of the vertical series
    fn band_magnitudes(&mut self) -> [f32; 2] {
        let n = self.vertical.len();
        if n < 4 {
            return [0.0, 0.0];
        }

        let mean = self.vertical.iter().sum::<f32>() / n as f32;
        let mut buffer: Vec<Complex<f32>> = self
            .vertical
            .iter()
            .map(|&x| Complex::new(x - mean, 0.0))
            .collect();
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let split = n / 4;
        let mut low = 0.0;
        let mut high = 0.0;
        for (bin, value) in buffer.iter().enumerate().take(n / 2 + 1).skip(1) {
            if bin <= split {
                low += value.norm();
            } else {
                high += value.norm();
            }
        }
        [low / n as f32, high / n as f32]
    }
}

fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let magnitude = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if !magnitude.is_finite() || magnitude < MIN_GRAVITY_MAGNITUDE {
        return None;
    }
    Some(v.map(|c| c / magnitude))
}
