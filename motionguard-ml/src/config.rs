//! Combined settings file
//!
//! One JSON document configures both sides. Every section and field is
//! optional:
//!
//! ```json
//! {
//!   "sampling":   { "samples_per_batch": 128, "frequency_features": false },
//!   "classifier": { "kind": "knn", "k": 4, "ignored_features": [] },
//!   "aggregator": { "delta": 0.25, "threshold": 0.5 }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use motionguard_core::{FeatureLayout, SamplingConfig};
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatorConfig;
use crate::bayes::{NaiveBayesClassifier, NaiveBayesModel, PriorPolicy};
use crate::knn::KnnClassifier;
use crate::model::TrainingSet;
use crate::{Classifier, MLResult};

/// Default neighbour count
pub const DEFAULT_K: usize = 4;

/// Which classifier to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// K-nearest neighbours
    #[default]
    Knn,
    /// Gaussian naive Bayes
    Bayes,
}

/// Classifier options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Which classifier to build
    pub kind: ClassifierKind,
    /// Neighbours consulted by KNN
    pub k: usize,
    /// Feature names left out of distances and likelihoods
    pub ignored_features: Vec<String>,
    /// Priors used when fitting naive Bayes
    pub prior: PriorPolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Knn,
            k: DEFAULT_K,
            ignored_features: Vec::new(),
            prior: PriorPolicy::Uniform,
        }
    }
}

impl ClassifierConfig {
    /// Build the configured classifier from a training set
    ///
    /// Naive Bayes is fitted from the same exemplars KNN would scan.
    pub fn build(
        &self,
        training: Arc<TrainingSet>,
        layout: FeatureLayout,
    ) -> MLResult<Box<dyn Classifier>> {
        let classifier: Box<dyn Classifier> = match self.kind {
            ClassifierKind::Knn => Box::new(KnnClassifier::new(
                training,
                layout,
                self.k,
                self.ignored_features.as_slice(),
            )?),
            ClassifierKind::Bayes => {
                training.check_layout(layout)?;
                let model = NaiveBayesModel::fit(&training, self.prior)?;
                Box::new(NaiveBayesClassifier::new(
                    Arc::new(model),
                    layout,
                    self.ignored_features.as_slice(),
                )?)
            }
        };
        Ok(classifier)
    }
}

/// All settings of a running pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Acquisition side
    pub sampling: SamplingConfig,
    /// Classifier choice and options
    pub classifier: ClassifierConfig,
    /// Smoothing constants
    pub aggregator: AggregatorConfig,
}

impl MotionConfig {
    /// Decode and validate JSON text
    pub fn from_json_str(json: &str) -> MLResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> MLResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every section
    pub fn validate(&self) -> MLResult<()> {
        self.sampling.validate()?;
        self.aggregator.validate()?;
        if self.classifier.k == 0 {
            return Err(crate::MLError::InvalidConfig {
                reason: "k must be at least 1",
            });
        }
        Ok(())
    }

    /// Feature layout shared by the extractor and the classifier
    pub fn layout(&self) -> FeatureLayout {
        FeatureLayout::from_config(&self.sampling)
    }
}
