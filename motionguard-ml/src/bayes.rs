//! Gaussian naive Bayes classifier
//!
//! The model keeps, per activity, a prior and a `(mean, variance)` pair per
//! feature. It is either fitted from a [`TrainingSet`] or loaded as JSON.
//!
//! ## Numeric policy
//!
//! Likelihoods are computed in `f64`. A term that underflows below
//! `f64::MIN_POSITIVE` (subnormals included) is replaced by `f64::MIN_POSITIVE`
//! and an infinite term by `f64::MAX`. Terms are combined as a sum of logs, so
//! one underflowing feature cannot erase the evidence of the others. The
//! argmax is taken in log space; the reported linear posterior is the
//! exponential of that sum, clamped the same way as a term.

use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use motionguard_core::{FeatureLayout, FeatureVector};
use serde::{Deserialize, Serialize};

use crate::model::TrainingSet;
use crate::{check_layout, check_vector, ignore_mask, Classifier, MLError, MLResult, UNKNOWN};

/// Smallest variance used in a likelihood
pub const VARIANCE_FLOOR: f64 = 1e-9;

/// How activity priors are chosen when fitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorPolicy {
    /// Every activity equally likely
    #[default]
    Uniform,
    /// Proportional to the exemplar count of each activity
    Empirical,
}

/// Normal distribution of one feature within one activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianStats {
    /// Mean value
    pub mean: f64,
    /// Population variance
    pub variance: f64,
}

/// Statistics of one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    /// Raw activity label
    pub label: String,
    /// Prior probability
    pub prior: f64,
    /// One entry per model feature
    pub features: Vec<GaussianStats>,
}

/// Per-activity Gaussian parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    /// Feature names, in value order
    pub features: Vec<String>,
    /// Activities in training order
    pub activities: Vec<ActivityStats>,
}

impl NaiveBayesModel {
    /// Fit means and variances from labeled exemplars
    ///
    /// Fails when the set has no features or no exemplars, or when an
    /// exemplar's value count differs from the feature list.
    pub fn fit(set: &TrainingSet, priors: PriorPolicy) -> MLResult<Self> {
        if set.features.is_empty() || set.is_empty() {
            return Err(MLError::InsufficientData);
        }
        set.validate()?;

        let width = set.features.len();
        let labels = set.labels();
        let total = set.len() as f64;
        let mut activities = Vec::with_capacity(labels.len());

        for label in &labels {
            let rows: Vec<&[f32]> = set
                .exemplars
                .iter()
                .filter(|e| e.label == *label)
                .map(|e| e.values.as_slice())
                .collect();
            let n = rows.len() as f64;

            let features = (0..width)
                .map(|j| {
                    let mean = rows.iter().map(|r| r[j] as f64).sum::<f64>() / n;
                    let variance = rows
                        .iter()
                        .map(|r| {
                            let d = r[j] as f64 - mean;
                            d * d
                        })
                        .sum::<f64>()
                        / n;
                    GaussianStats { mean, variance }
                })
                .collect();

            let prior = match priors {
                PriorPolicy::Uniform => 1.0 / labels.len() as f64,
                PriorPolicy::Empirical => n / total,
            };
            activities.push(ActivityStats {
                label: label.to_string(),
                prior,
                features,
            });
        }

        log::info!(
            "Fitted naive Bayes model: {} activities, {} features, {} exemplars",
            activities.len(),
            width,
            set.len()
        );

        Ok(Self {
            features: set.features.clone(),
            activities,
        })
    }

    /// Decode and validate JSON text
    pub fn from_json_str(json: &str) -> MLResult<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Read and validate a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> MLResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Encode as pretty JSON
    pub fn to_json_string(&self) -> MLResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every activity covers every feature with usable parameters
    pub fn validate(&self) -> MLResult<()> {
        if self.features.is_empty() {
            return Err(MLError::InsufficientData);
        }
        let expected = self.features.len();
        for (index, activity) in self.activities.iter().enumerate() {
            if activity.features.len() != expected {
                return Err(MLError::InconsistentExemplar {
                    index,
                    expected,
                    found: activity.features.len(),
                });
            }
            let usable = activity.prior.is_finite()
                && activity.prior >= 0.0
                && activity
                    .features
                    .iter()
                    .all(|s| s.mean.is_finite() && s.variance.is_finite() && s.variance >= 0.0);
            if !usable {
                return Err(MLError::InvalidConfig {
                    reason: "activity statistics must be finite and non-negative",
                });
            }
        }
        Ok(())
    }
}

/// Clamp one term into `[MIN_POSITIVE, MAX]`
fn clamp_term(value: f64) -> f64 {
    if value.is_nan() || value < f64::MIN_POSITIVE {
        f64::MIN_POSITIVE
    } else if value.is_infinite() {
        f64::MAX
    } else {
        value
    }
}

fn likelihood(x: f64, stats: &GaussianStats) -> f64 {
    let variance = stats.variance.max(VARIANCE_FLOOR);
    let d = x - stats.mean;
    clamp_term((-(d * d) / (2.0 * variance)).exp() / (2.0 * PI * variance).sqrt())
}

/// Maximum-posterior classifier over a shared [`NaiveBayesModel`]
pub struct NaiveBayesClassifier {
    model: Arc<NaiveBayesModel>,
    layout: FeatureLayout,
    ignored: Vec<bool>,
    log_posteriors: Vec<f64>,
    posteriors: Vec<f64>,
}

impl NaiveBayesClassifier {
    /// Classifier over `model`, which must be fitted for `layout`
    pub fn new<S: AsRef<str>>(
        model: Arc<NaiveBayesModel>,
        layout: FeatureLayout,
        ignored: &[S],
    ) -> MLResult<Self> {
        model.validate()?;
        check_layout(layout, &model.features)?;
        let ignored = ignore_mask(layout, ignored)?;

        log::info!(
            "Naive Bayes classifier ready: {} activities",
            model.activities.len()
        );

        Ok(Self {
            log_posteriors: Vec::with_capacity(model.activities.len()),
            posteriors: Vec::with_capacity(model.activities.len()),
            model,
            layout,
            ignored,
        })
    }

    /// The shared model
    pub fn model(&self) -> &NaiveBayesModel {
        &self.model
    }

    /// Log of the unnormalized posterior of every activity, in model order
    pub fn log_posteriors(&mut self, features: &FeatureVector) -> MLResult<&[f64]> {
        check_vector(self.layout, features)?;

        self.log_posteriors.clear();
        for activity in &self.model.activities {
            let mut sum = clamp_term(activity.prior).ln();
            for ((x, stats), ignored) in features
                .values()
                .iter()
                .zip(&activity.features)
                .zip(&self.ignored)
            {
                if !*ignored {
                    sum += likelihood(*x as f64, stats).ln();
                }
            }
            self.log_posteriors.push(sum);
        }
        Ok(&self.log_posteriors)
    }

    /// Unnormalized posterior of every activity, in model order
    pub fn posteriors(&mut self, features: &FeatureVector) -> MLResult<&[f64]> {
        self.log_posteriors(features)?;
        self.posteriors.clear();
        self.posteriors
            .extend(self.log_posteriors.iter().map(|sum| clamp_term(sum.exp())));
        Ok(&self.posteriors)
    }
}

impl Classifier for NaiveBayesClassifier {
    fn layout(&self) -> FeatureLayout {
        self.layout
    }

    fn classify(&mut self, features: &FeatureVector) -> MLResult<String> {
        let model = Arc::clone(&self.model);
        let sums = self.log_posteriors(features)?;

        let mut best: Option<(usize, f64)> = None;
        for (index, &sum) in sums.iter().enumerate() {
            if best.map_or(true, |(_, b)| sum > b) {
                best = Some((index, sum));
            }
        }

        Ok(match best {
            Some((index, sum)) => {
                let label = model.activities[index].label.clone();
                log::debug!("Naive Bayes picked {} (log posterior {:.3})", label, sum);
                label
            }
            None => UNKNOWN.to_string(),
        })
    }
}
