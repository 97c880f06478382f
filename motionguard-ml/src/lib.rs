//! Activity Classification and Hierarchical Smoothing
//!
//! ## Overview
//!
//! This crate turns feature vectors from `motionguard-core` into a stable
//! activity. Two independent classifiers map a single batch to a raw label,
//! and an aggregator smooths the noisy label stream over a taxonomy tree:
//!
//! ```text
//! FeatureVector ──→ Classifier ──→ raw label ──→ Aggregator ──→ stable path
//!                   (KNN | Bayes)   "WALKING"     (decay over     "CLASSIFIED/WALKING"
//!                                                  taxonomy)
//! ```
//!
//! ## Classifiers
//!
//! ### K-Nearest Neighbours
//! Squared Euclidean distance to every training exemplar, majority vote among
//! the K closest. Ties go to the label seen first among the nearest, so the
//! order of the training set is part of the model.
//!
//! ### Gaussian Naive Bayes
//! Per-activity mean and variance per feature, fitted once from the same
//! training set. Likelihood terms are clamped and summed as logs, so one
//! extreme feature cannot zero out (or blow up) a whole posterior:
//! ```text
//! log posterior(a) = ln clamp(prior(a)) + Σ ln clamp(N(x_i | μ_ai, σ²_ai))
//! ```
//!
//! ## Aggregation
//!
//! Each classification decays every sibling score by `1 - DELTA` and boosts
//! the matched one by `DELTA` at every level of its path. Absorbing labels
//! (`UNCARRIED`, `CHARGING` by default) are forced to exactly 1 when matched and
//! to exactly 0 when a sibling is matched. The stable output descends from the
//! root through the best child while its score reaches `THRESHOLD`.
//!
//! ## Models Are Configuration
//!
//! Models and taxonomies are loaded once at startup and shared read-only
//! behind `Arc`. A model trained with a different feature layout than the
//! extractor is refused at load time with [`MLError::ModelMismatch`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use motionguard_core::{FeatureExtractor, FeatureLayout};
//! use motionguard_ml::{Aggregator, AggregatorConfig, ClassificationPipeline, KnnClassifier, Taxonomy, TrainingSet};
//!
//! let training = Arc::new(TrainingSet::from_file("model.json").unwrap());
//! let classifier = KnnClassifier::new(training, FeatureLayout::Basic, 4, &[] as &[&str]).unwrap();
//! let aggregator = Aggregator::new(Arc::new(Taxonomy::default()), &AggregatorConfig::default()).unwrap();
//! let pipeline = ClassificationPipeline::new(
//!     FeatureExtractor::new(FeatureLayout::Basic),
//!     classifier,
//!     aggregator,
//! ).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregator;
pub mod bayes;
pub mod config;
pub mod knn;
pub mod model;
pub mod pipeline;
pub mod taxonomy;

use motionguard_core::{CoreError, FeatureLayout, FeatureVector};
use thiserror_no_std::Error;

pub use aggregator::{Aggregator, AggregatorConfig};
pub use bayes::{NaiveBayesClassifier, NaiveBayesModel, PriorPolicy};
pub use config::{ClassifierConfig, ClassifierKind, MotionConfig};
pub use knn::KnnClassifier;
pub use model::{Exemplar, TrainingSet};
pub use pipeline::{ActivitySink, ClassificationPipeline, ClassificationWorker, PipelineEvent, WorkerHandle};
pub use taxonomy::{Taxonomy, TaxonomyDefinition};

/// Label and path for "no usable activity"
pub const UNKNOWN: &str = "UNKNOWN";

/// Result type for model and aggregation operations
pub type MLResult<T> = Result<T, MLError>;

/// Model loading, classification and aggregation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MLError {
    /// Feature names of a model differ from the extractor layout
    #[error("Model features [{found}] do not match extractor features [{expected}]")]
    ModelMismatch {
        /// Features the extractor produces
        expected: String,
        /// Features the model was trained with
        found: String,
    },

    /// A training exemplar has the wrong number of values
    #[error("Exemplar {index} has {found} values, expected {expected}")]
    InconsistentExemplar {
        /// Position in the training set
        index: usize,
        /// Values required by the feature list
        expected: usize,
        /// Values present
        found: usize,
    },

    /// Not enough training data to build a model
    #[error("Training data has no features or no exemplars")]
    InsufficientData,

    /// A feature name that the model does not have
    #[error("Unknown feature '{name}'")]
    UnknownFeature {
        /// The rejected name
        name: String,
    },

    /// A classification path outside the taxonomy
    #[error("Path '{path}' is not in the taxonomy")]
    UnknownTaxonomyPath {
        /// The rejected path
        path: String,
    },

    /// Taxonomy definition is structurally unusable
    #[error("Invalid taxonomy: {reason}")]
    InvalidTaxonomy {
        /// What is wrong with it
        reason: String,
    },

    /// Classifier or aggregator option out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Which option was rejected
        reason: &'static str,
    },

    /// JSON could not be decoded
    #[error("Parse error: {reason}")]
    Parse {
        /// Decoder message
        reason: String,
    },

    /// File could not be read
    #[error("I/O error: {reason}")]
    Io {
        /// Operating system message
        reason: String,
    },

    /// Error from the acquisition side
    #[error("Acquisition error: {0}")]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for MLError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse {
            reason: error.to_string(),
        }
    }
}

impl From<std::io::Error> for MLError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            reason: error.to_string(),
        }
    }
}

/// Maps one feature vector to a raw activity label
///
/// Implementations reuse internal buffers and take `&mut self`; a single
/// instance classifies one vector at a time.
pub trait Classifier: Send {
    /// Layout of the vectors this classifier accepts
    fn layout(&self) -> FeatureLayout;

    /// Raw activity label for `features`, [`UNKNOWN`] when the model is empty
    fn classify(&mut self, features: &FeatureVector) -> MLResult<String>;
}

impl Classifier for Box<dyn Classifier> {
    fn layout(&self) -> FeatureLayout {
        (**self).layout()
    }

    fn classify(&mut self, features: &FeatureVector) -> MLResult<String> {
        (**self).classify(features)
    }
}

/// Refuse a model whose feature names differ from `layout`
pub(crate) fn check_layout<S: AsRef<str>>(layout: FeatureLayout, names: &[S]) -> MLResult<()> {
    if layout.matches(names) {
        return Ok(());
    }
    Err(MLError::ModelMismatch {
        expected: layout.names().join(","),
        found: names
            .iter()
            .map(|n| n.as_ref())
            .collect::<Vec<_>>()
            .join(","),
    })
}

/// Refuse a vector produced under a different layout
pub(crate) fn check_vector(layout: FeatureLayout, features: &FeatureVector) -> MLResult<()> {
    if features.layout() == layout {
        return Ok(());
    }
    check_layout(layout, features.layout().names())
}

/// Index mask of features to skip, from their names
pub(crate) fn ignore_mask<S: AsRef<str>>(layout: FeatureLayout, ignored: &[S]) -> MLResult<Vec<bool>> {
    let names = layout.names();
    let mut mask = vec![false; names.len()];
    for name in ignored {
        let name = name.as_ref();
        let index = names
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| MLError::UnknownFeature { name: name.to_string() })?;
        mask[index] = true;
    }
    Ok(mask)
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
