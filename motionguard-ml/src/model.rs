//! Labeled training exemplars
//!
//! Stored as JSON with the feature names alongside the values, so a model and
//! an extractor can be compared before anything is classified:
//!
//! ```json
//! {
//!   "features": ["horizontal_range", "horizontal_mean", "..."],
//!   "exemplars": [
//!     { "label": "STATIONARY", "values": [0.0, 0.0, 0.0, 0.0, 9.8, 0.0] }
//!   ]
//! }
//! ```

use std::path::Path;

use motionguard_core::FeatureLayout;
use serde::{Deserialize, Serialize};

use crate::{check_layout, MLError, MLResult};

/// One labeled feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    /// Raw activity label
    pub label: String,
    /// Feature values in the order of [`TrainingSet::features`]
    pub values: Vec<f32>,
}

/// Ordered set of exemplars sharing one feature list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    /// Feature names, in value order
    pub features: Vec<String>,
    /// Exemplars in scan order
    pub exemplars: Vec<Exemplar>,
}

impl TrainingSet {
    /// Empty set for `layout`
    pub fn new(layout: FeatureLayout) -> Self {
        Self {
            features: layout.names().iter().map(|n| n.to_string()).collect(),
            exemplars: Vec::new(),
        }
    }

    /// Decode and validate JSON text
    pub fn from_json_str(json: &str) -> MLResult<Self> {
        let set: Self = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
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

    /// Append an exemplar
    pub fn push(&mut self, label: impl Into<String>, values: &[f32]) -> MLResult<()> {
        if values.len() != self.features.len() {
            return Err(MLError::InconsistentExemplar {
                index: self.exemplars.len(),
                expected: self.features.len(),
                found: values.len(),
            });
        }
        self.exemplars.push(Exemplar {
            label: label.into(),
            values: values.to_vec(),
        });
        Ok(())
    }

    /// Every exemplar has one value per feature
    pub fn validate(&self) -> MLResult<()> {
        let expected = self.features.len();
        for (index, exemplar) in self.exemplars.iter().enumerate() {
            if exemplar.values.len() != expected {
                return Err(MLError::InconsistentExemplar {
                    index,
                    expected,
                    found: exemplar.values.len(),
                });
            }
        }
        Ok(())
    }

    /// Feature names match the extractor exactly
    pub fn check_layout(&self, layout: FeatureLayout) -> MLResult<()> {
        check_layout(layout, &self.features)
    }

    /// Distinct labels in first-seen order
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for exemplar in &self.exemplars {
            if !labels.contains(&exemplar.label.as_str()) {
                labels.push(&exemplar.label);
            }
        }
        labels
    }

    /// Number of exemplars
    pub fn len(&self) -> usize {
        self.exemplars.len()
    }

    /// No exemplars
    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }
}
