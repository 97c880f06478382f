//! Hierarchical Label Smoothing
//!
//! ## Scores
//!
//! Every child of every taxonomy node has a score in `[0, 1]`, starting at
//! `1 / siblings`. A classification path updates each level it passes:
//!
//! ```text
//! score(sibling) ← score(sibling) × (1 − DELTA)        every sibling
//! score(matched) ← score(matched) + DELTA
//! matched absorbing      → score(matched) = 1, other absorbing siblings = 0
//! matched not absorbing  → score(absorbing siblings) = 0
//! ```
//!
//! ## Resolution
//!
//! From the root, take the best-scoring child (first child on ties). A best
//! score below `THRESHOLD` is a null pick and ends the walk. Descend while the
//! chosen child has children of its own.
//!
//! | Walk ends at                 | Output                 |
//! |------------------------------|------------------------|
//! | null at the root             | `UNKNOWN`              |
//! | `UNKNOWN`                    | `UNKNOWN`              |
//! | null under a root child      | `UNKNOWN`              |
//! | null deeper down             | path of the parent     |
//! | a leaf                       | full path              |
//!
//! An `UNKNOWN` output is fed back as a classification. The first `UNKNOWN`
//! of an aggregator's lifetime is reported as the empty path instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::taxonomy::{NodeId, Taxonomy, SEPARATOR};
use crate::{MLError, MLResult, UNKNOWN};

/// Default decay constant
pub const DEFAULT_DELTA: f32 = 0.25;

/// Default decision threshold
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Smoothing constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Weight of each new classification, in `(0, 1]`
    pub delta: f32,
    /// Minimum score for a label to be chosen, in `[0, 1]`
    pub threshold: f32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AggregatorConfig {
    /// Check both constants are in range
    pub fn validate(&self) -> MLResult<()> {
        if !(self.delta > 0.0 && self.delta <= 1.0) {
            return Err(MLError::InvalidConfig {
                reason: "delta must be in (0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(MLError::InvalidConfig {
                reason: "threshold must be in [0, 1]",
            });
        }
        Ok(())
    }
}

/// Smoothed activity state over a taxonomy
pub struct Aggregator {
    taxonomy: Arc<Taxonomy>,
    /// Indexed by node id, then child position
    scores: Vec<Vec<f32>>,
    delta: f32,
    threshold: f32,
    unknown: Vec<(NodeId, usize)>,
    unknown_reported: bool,
}

impl Aggregator {
    /// Fresh state over `taxonomy`
    pub fn new(taxonomy: Arc<Taxonomy>, config: &AggregatorConfig) -> MLResult<Self> {
        config.validate()?;
        let unknown = taxonomy.resolve(UNKNOWN).map_err(|_| MLError::InvalidTaxonomy {
            reason: format!("root needs an {UNKNOWN} label"),
        })?;

        let scores = taxonomy
            .nodes()
            .iter()
            .map(|node| {
                let n = node.children.len();
                vec![1.0 / n as f32; n]
            })
            .collect();

        Ok(Self {
            taxonomy,
            scores,
            delta: config.delta,
            threshold: config.threshold,
            unknown,
            unknown_reported: false,
        })
    }

    /// The tree being scored
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Record one classification path
    ///
    /// A path outside the taxonomy fails with `UnknownTaxonomyPath` and leaves
    /// every score untouched.
    pub fn add_classification(&mut self, path: &str) -> MLResult<()> {
        let steps = self.taxonomy.resolve(path)?;
        self.apply(&steps);
        log::trace!("Classification {} recorded", path);
        Ok(())
    }

    fn apply(&mut self, steps: &[(NodeId, usize)]) {
        let keep = 1.0 - self.delta;
        for &(node, matched) in steps {
            let children = &self.taxonomy.nodes()[node].children;
            let scores = &mut self.scores[node];

            for score in scores.iter_mut() {
                *score *= keep;
            }
            scores[matched] += self.delta;

            for (score, child) in scores.iter_mut().zip(children) {
                if child.absorbing {
                    *score = 0.0;
                }
            }
            if children[matched].absorbing {
                scores[matched] = 1.0;
            }
        }
    }

    /// Current stable activity path
    ///
    /// Returns `""` instead of the first `UNKNOWN` of this aggregator's life.
    pub fn get_classification(&mut self) -> String {
        let resolved = self.resolve();
        if resolved != UNKNOWN {
            return resolved;
        }

        let steps = self.unknown.clone();
        self.apply(&steps);
        if !self.unknown_reported {
            self.unknown_reported = true;
            log::debug!("Suppressing first {} resolution", UNKNOWN);
            return String::new();
        }
        resolved
    }

    fn resolve(&self) -> String {
        let nodes = self.taxonomy.nodes();
        let mut path: Vec<&str> = Vec::new();
        let mut node = Taxonomy::ROOT;

        loop {
            let scores = &self.scores[node];
            let mut best: Option<(usize, f32)> = None;
            for (index, &score) in scores.iter().enumerate() {
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((index, score));
                }
            }

            let chosen = match best {
                Some((index, score)) if score >= self.threshold => index,
                // Null pick: stop at the parent, or UNKNOWN near the root
                _ => {
                    if path.len() <= 1 {
                        return UNKNOWN.to_string();
                    }
                    return path.join(&SEPARATOR.to_string());
                }
            };

            let child = &nodes[node].children[chosen];
            path.push(&child.label);
            match child.node {
                Some(next) => node = next,
                None => break,
            }
        }

        path.join(&SEPARATOR.to_string())
    }

    /// Score of `label` under the node at `path`
    pub fn score(&self, path: &str, label: &str) -> Option<f32> {
        let node = self.taxonomy.find_node(path)?;
        let index = self.taxonomy.child_index(node, label)?;
        Some(self.scores[node][index])
    }

    /// Every child score under the node at `path`, in taxonomy order
    pub fn scores(&self, path: &str) -> Option<Vec<(&str, f32)>> {
        let node = self.taxonomy.find_node(path)?;
        Some(
            self.taxonomy.nodes()[node]
                .children
                .iter()
                .zip(&self.scores[node])
                .map(|(child, score)| (child.label.as_str(), *score))
                .collect(),
        )
    }
}
