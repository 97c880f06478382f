//! K-nearest-neighbour classifier

use std::cmp::Ordering;
use std::sync::Arc;

use motionguard_core::{FeatureLayout, FeatureVector};

use crate::model::TrainingSet;
use crate::{check_vector, ignore_mask, Classifier, MLError, MLResult, UNKNOWN};

/// Majority vote among the K closest training exemplars
pub struct KnnClassifier {
    model: Arc<TrainingSet>,
    layout: FeatureLayout,
    k: usize,
    ignored: Vec<bool>,
    /// (squared distance, exemplar index), reused across calls
    distances: Vec<(f32, usize)>,
    /// (exemplar index of first vote, count), in first-seen order
    votes: Vec<(usize, usize)>,
}

impl KnnClassifier {
    /// Classifier over `model`, which must be trained for `layout`
    ///
    /// `ignored` names features left out of the distance.
    pub fn new<S: AsRef<str>>(
        model: Arc<TrainingSet>,
        layout: FeatureLayout,
        k: usize,
        ignored: &[S],
    ) -> MLResult<Self> {
        if k == 0 {
            return Err(MLError::InvalidConfig {
                reason: "k must be at least 1",
            });
        }
        model.validate()?;
        model.check_layout(layout)?;
        let ignored = ignore_mask(layout, ignored)?;

        log::info!(
            "KNN classifier ready: k={}, {} exemplars, {} labels",
            k,
            model.len(),
            model.labels().len()
        );

        Ok(Self {
            distances: Vec::with_capacity(model.len()),
            votes: Vec::with_capacity(k.min(model.len())),
            model,
            layout,
            k,
            ignored,
        })
    }

    /// Neighbours consulted per vote
    pub fn k(&self) -> usize {
        self.k
    }

    /// The shared training set
    pub fn model(&self) -> &TrainingSet {
        &self.model
    }

    fn squared_distance(&self, query: &[f32], values: &[f32]) -> f32 {
        query
            .iter()
            .zip(values)
            .zip(&self.ignored)
            .filter(|(_, ignored)| !**ignored)
            .map(|((q, v), _)| (q - v) * (q - v))
            .sum()
    }
}

impl Classifier for KnnClassifier {
    fn layout(&self) -> FeatureLayout {
        self.layout
    }

    fn classify(&mut self, features: &FeatureVector) -> MLResult<String> {
        check_vector(self.layout, features)?;
        if self.model.is_empty() {
            return Ok(UNKNOWN.to_string());
        }

        let mut distances = std::mem::take(&mut self.distances);
        distances.clear();
        for (index, exemplar) in self.model.exemplars.iter().enumerate() {
            distances.push((self.squared_distance(features.values(), &exemplar.values), index));
        }
        // Stable, so equal distances keep training-set order
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let exemplars = &self.model.exemplars;
        self.votes.clear();
        for &(_, index) in distances.iter().take(self.k) {
            let label = &exemplars[index].label;
            match self
                .votes
                .iter_mut()
                .find(|(first, _)| exemplars[*first].label == *label)
            {
                Some((_, count)) => *count += 1,
                None => self.votes.push((index, 1)),
            }
        }
        self.distances = distances;

        let mut best = self.votes[0];
        for &vote in &self.votes[1..] {
            if vote.1 > best.1 {
                best = vote;
            }
        }
        let label = exemplars[best.0].label.clone();
        log::debug!("KNN vote {} with {}/{}", label, best.1, self.k.min(exemplars.len()));
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: [f32; 6]) -> FeatureVector {
        FeatureVector::from_values(FeatureLayout::Basic, &values).unwrap()
    }

    fn model(entries: &[(&str, [f32; 6])]) -> Arc<TrainingSet> {
        let mut set = TrainingSet::new(FeatureLayout::Basic);
        for (label, values) in entries {
            set.push(*label, values).unwrap();
        }
        Arc::new(set)
    }

    #[test]
    fn single_exemplar_always_wins() {
        let set = model(&[("CYCLING", [1.0, 2.0, 3.0, 4.0, 5.0, 6.0])]);
        let mut knn = KnnClassifier::new(set, FeatureLayout::Basic, 1, &[] as &[&str]).unwrap();
        for query in [[0.0; 6], [100.0; 6], [-3.0, 0.5, 9.0, 1.0, 2.0, 7.0]] {
            assert_eq!(knn.classify(&vector(query)).unwrap(), "CYCLING");
        }
    }

    #[test]
    fn empty_model_is_unknown() {
        let set = Arc::new(TrainingSet::new(FeatureLayout::Basic));
        let mut knn = KnnClassifier::new(set, FeatureLayout::Basic, 4, &[] as &[&str]).unwrap();
        assert_eq!(knn.classify(&vector([0.0; 6])).unwrap(), UNKNOWN);
    }

    #[test]
    fn majority_among_nearest() {
        let set = model(&[
            ("WALKING", [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("STATIONARY", [0.1, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("WALKING", [1.1, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("WALKING", [0.9, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("STATIONARY", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let mut knn = KnnClassifier::new(set, FeatureLayout::Basic, 3, &[] as &[&str]).unwrap();
        assert_eq!(knn.classify(&vector([1.0, 0.0, 0.0, 0.0, 0.0, 0.0])).unwrap(), "WALKING");
    }

    #[test]
    fn k_beyond_model_size_polls_every_exemplar() {
        let set = model(&[
            ("STATIONARY", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("WALKING", [5.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("WALKING", [6.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let mut knn = KnnClassifier::new(set, FeatureLayout::Basic, usize::MAX, &[] as &[&str]).unwrap();
        assert_eq!(knn.k(), usize::MAX);
        assert_eq!(knn.classify(&vector([0.0; 6])).unwrap(), "WALKING");
    }

    #[test]
    fn tie_goes_to_first_seen_nearest() {
        // Two votes each; STATIONARY is nearest so it is seen first
        let set = model(&[
            ("WALKING", [2.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("STATIONARY", [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("WALKING", [3.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("STATIONARY", [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let mut knn = KnnClassifier::new(set, FeatureLayout::Basic, 4, &[] as &[&str]).unwrap();
        assert_eq!(knn.classify(&vector([0.0; 6])).unwrap(), "STATIONARY");
    }

    #[test]
    fn equal_distances_keep_training_order() {
        let set = model(&[
            ("VEHICLE", [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ("CYCLING", [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let mut knn = KnnClassifier::new(set, FeatureLayout::Basic, 2, &[] as &[&str]).unwrap();
        assert_eq!(knn.classify(&vector([0.0; 6])).unwrap(), "VEHICLE");
    }

    #[test]
    fn ignored_features_do_not_count() {
        let set = model(&[
            ("WALKING", [0.0, 0.0, 0.0, 0.0, 0.0, 50.0]),
            ("STATIONARY", [0.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        ]);
        let mut knn =
            KnnClassifier::new(set, FeatureLayout::Basic, 1, &["vertical_std_dev"]).unwrap();
        assert_eq!(knn.classify(&vector([0.0; 6])).unwrap(), "WALKING");
    }

    #[test]
    fn wrong_layout_is_refused() {
        let set = model(&[("X", [0.0; 6])]);
        assert!(matches!(
            KnnClassifier::new(set.clone(), FeatureLayout::WithFrequency, 1, &[] as &[&str]),
            Err(MLError::ModelMismatch { .. })
        ));
        assert!(matches!(
            KnnClassifier::new(set, FeatureLayout::Basic, 0, &[] as &[&str]),
            Err(MLError::InvalidConfig { .. })
        ));
    }
}
