//! AdaBoost.M1 over weight-aware decision trees
//!
//! Stage-wise reweighting: each round fits a tree on the current weights,
//! shrinks the weight of correctly classified samples by err/(1-err) and
//! renormalizes. The weight threshold trims the lightest samples from
//! each round's fit, keeping the heaviest ones that cover the given
//! percentage of total weight mass. Prediction is a weighted vote across
//! stages with ties broken toward the lower class id.

use crate::data::dataset::BowDataset;
use crate::models::decision_tree::{argmax, DecisionTree, TreeParams};
use crate::models::{Classifier, ModelError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

// stage weight used when a round classifies everything correctly, ln(1e10)
const PERFECT_STAGE_WEIGHT: f64 = 23.025850929940457;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostParams {
    /// Number of boosting rounds
    pub iterations: usize,
    /// Percentage of weight mass each round trains on; 100 disables trimming
    pub weight_threshold: u32,
    /// Base tree parameters
    pub tree: TreeParams,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            weight_threshold: 100,
            tree: TreeParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoostStage {
    tree: DecisionTree,
    alpha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostM1 {
    params: BoostParams,
    stages: Vec<BoostStage>,
    n_classes: usize,
}

impl AdaBoostM1 {
    pub fn new(params: BoostParams) -> Self {
        Self {
            params,
            stages: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn params(&self) -> &BoostParams {
        &self.params
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

impl Classifier for AdaBoostM1 {
    fn fit(&mut self, data: &BowDataset) -> Result<(), ModelError> {
        if data.n_samples() == 0 {
            return Err(ModelError::EmptyTrainingData);
        }
        let labeled: Vec<usize> = (0..data.n_samples())
            .filter(|&i| data.labels[i].is_some())
            .collect();
        if labeled.is_empty() {
            return Err(ModelError::NoLabeledSamples);
        }

        self.n_classes = data.n_classes();
        self.stages.clear();

        let mut weights = vec![0.0; data.n_samples()];
        for &i in &labeled {
            weights[i] = 1.0 / labeled.len() as f64;
        }

        for round in 0..self.params.iterations {
            let trimmed = trim_weights(&weights, &labeled, self.params.weight_threshold);

            let mut tree = DecisionTree::new(self.params.tree);
            tree.fit_weighted(data, &trimmed)?;

            // weighted error over all labeled samples, trimmed or not
            let mut predictions = Vec::with_capacity(labeled.len());
            let mut err = 0.0;
            let mut total = 0.0;
            for &i in &labeled {
                let pred = tree.predict_one(&data.features[i])?;
                if Some(pred) != data.labels[i] {
                    err += weights[i];
                }
                total += weights[i];
                predictions.push(pred);
            }
            let err = err / total;

            if err >= 0.5 {
                // boosting assumption broken; a lone first stage still
                // gives a usable model
                debug!("round {}: weighted error {:.4}, stopping", round + 1, err);
                if self.stages.is_empty() {
                    self.stages.push(BoostStage { tree, alpha: 1.0 });
                }
                break;
            }

            if err <= 1e-10 {
                debug!("round {}: perfect fit, stopping", round + 1);
                self.stages.push(BoostStage {
                    tree,
                    alpha: PERFECT_STAGE_WEIGHT,
                });
                break;
            }

            let beta = err / (1.0 - err);
            let alpha = (1.0 / beta).ln();
            debug!("round {}: weighted error {:.4}, alpha {:.4}", round + 1, err, alpha);

            for (j, &i) in labeled.iter().enumerate() {
                if Some(predictions[j]) == data.labels[i] {
                    weights[i] *= beta;
                }
            }
            let sum: f64 = labeled.iter().map(|&i| weights[i]).sum();
            for &i in &labeled {
                weights[i] /= sum;
            }

            self.stages.push(BoostStage { tree, alpha });
        }

        Ok(())
    }

    fn predict_one(&self, features: &[f64]) -> Result<usize, ModelError> {
        Ok(argmax(&self.predict_proba_one(features)?))
    }

    fn predict_proba_one(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if self.stages.is_empty() {
            return Err(ModelError::NotFitted);
        }

        let mut votes = vec![0.0; self.n_classes];
        let mut total = 0.0;
        for stage in &self.stages {
            let class = stage.tree.predict_one(features)?;
            votes[class] += stage.alpha;
            total += stage.alpha;
        }
        if total > 0.0 {
            for vote in &mut votes {
                *vote /= total;
            }
        }
        Ok(votes)
    }
}

/// Keep the heaviest samples whose weights cover `threshold` percent of
/// the total mass, zeroing the rest. Order ties break by sample index so
/// trimming is deterministic.
fn trim_weights(weights: &[f64], labeled: &[usize], threshold: u32) -> Vec<f64> {
    if threshold >= 100 {
        return weights.to_vec();
    }

    let mut order = labeled.to_vec();
    order.sort_by(|&a, &b| {
        weights[b]
            .partial_cmp(&weights[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let total: f64 = labeled.iter().map(|&i| weights[i]).sum();
    let target = total * threshold as f64 / 100.0;

    let mut kept = vec![0.0; weights.len()];
    let mut mass = 0.0;
    for &i in &order {
        kept[i] = weights[i];
        mass += weights[i];
        if mass >= target {
            break;
        }
    }
    kept
}
