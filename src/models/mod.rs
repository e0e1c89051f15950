//! Classifiers over projected features, and model persistence

pub mod adaboost;
pub mod artifact;
pub mod decision_tree;

pub use adaboost::{AdaBoostM1, BoostParams};
pub use artifact::{ArtifactError, ModelArtifact};
pub use decision_tree::{DecisionTree, TreeParams};

use crate::data::dataset::BowDataset;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training data is empty")]
    EmptyTrainingData,
    #[error("training data has no labeled samples")]
    NoLabeledSamples,
    #[error("model has not been fitted")]
    NotFitted,
}

/// Multi-class classifier over bag-of-words feature vectors.
///
/// Implementations are deterministic: fitting the same data twice builds
/// the same model, and prediction ties break toward the lower class id.
pub trait Classifier {
    /// Fit on the labeled samples of the dataset.
    fn fit(&mut self, data: &BowDataset) -> Result<(), ModelError>;

    /// Predicted class id for one sample.
    fn predict_one(&self, features: &[f64]) -> Result<usize, ModelError>;

    /// Per-class vote distribution for one sample, summing to one.
    fn predict_proba_one(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Predicted class ids for every sample.
    fn predict(&self, data: &BowDataset) -> Result<Vec<usize>, ModelError> {
        data.features
            .iter()
            .map(|f| self.predict_one(f))
            .collect()
    }

    /// Vote distributions for every sample.
    fn predict_proba(&self, data: &BowDataset) -> Result<Vec<Vec<f64>>, ModelError> {
        data.features
            .iter()
            .map(|f| self.predict_proba_one(f))
            .collect()
    }
}
