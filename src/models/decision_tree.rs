//! Weight-aware multi-class decision tree
//!
//! CART-style tree over bag-of-words features: weighted Gini impurity,
//! midpoint thresholds, depth and minimum-sample stopping. Sample weights
//! flow through impurity and leaf distributions, which is what the
//! boosting wrapper needs; fitting is deterministic, there is no random
//! feature subsampling.

use crate::data::dataset::BowDataset;
use crate::models::{Classifier, ModelError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth of the tree
    pub max_depth: usize,
    /// Minimum samples required to attempt a split
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 20,
            min_samples_split: 4,
            min_samples_leaf: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    feature_idx: Option<usize>,
    threshold: Option<f64>,
    /// Normalized weighted class distribution at this node
    distribution: Vec<f64>,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn depth(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            1 + self
                .left
                .as_ref()
                .map(|n| n.depth())
                .unwrap_or(0)
                .max(self.right.as_ref().map(|n| n.depth()).unwrap_or(0))
        }
    }

    fn n_leaves(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.left.as_ref().map(|n| n.n_leaves()).unwrap_or(0)
                + self.right.as_ref().map(|n| n.n_leaves()).unwrap_or(0)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    params: TreeParams,
    root: Option<TreeNode>,
    n_classes: usize,
}

impl DecisionTree {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            root: None,
            n_classes: 0,
        }
    }

    /// Fit with per-sample weights aligned to the dataset rows. Samples
    /// that are unlabeled or carry zero weight are ignored.
    pub fn fit_weighted(&mut self, data: &BowDataset, weights: &[f64]) -> Result<(), ModelError> {
        assert_eq!(weights.len(), data.n_samples());
        if data.n_samples() == 0 {
            return Err(ModelError::EmptyTrainingData);
        }

        let indices: Vec<usize> = (0..data.n_samples())
            .filter(|&i| data.labels[i].is_some() && weights[i] > 0.0)
            .collect();
        if indices.is_empty() {
            return Err(ModelError::NoLabeledSamples);
        }

        self.n_classes = data.n_classes();
        self.root = Some(self.build(data, &indices, weights, 0));
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map(|r| r.depth()).unwrap_or(0)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map(|r| r.n_leaves()).unwrap_or(0)
    }

    fn build(&self, data: &BowDataset, indices: &[usize], weights: &[f64], depth: usize) -> TreeNode {
        let class_weights = self.class_weight_sums(data, indices, weights);
        let impurity = gini(&class_weights);

        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split
            || impurity < 1e-10
        {
            return self.leaf(class_weights);
        }

        match self.find_best_split(data, indices, weights, impurity) {
            Some((feature_idx, threshold, left_idx, right_idx)) => {
                let left = self.build(data, &left_idx, weights, depth + 1);
                let right = self.build(data, &right_idx, weights, depth + 1);
                TreeNode {
                    feature_idx: Some(feature_idx),
                    threshold: Some(threshold),
                    distribution: normalize(class_weights),
                    left: Some(Box::new(left)),
                    right: Some(Box::new(right)),
                }
            }
            None => self.leaf(class_weights),
        }
    }

    fn leaf(&self, class_weights: Vec<f64>) -> TreeNode {
        TreeNode {
            feature_idx: None,
            threshold: None,
            distribution: normalize(class_weights),
            left: None,
            right: None,
        }
    }

    fn class_weight_sums(&self, data: &BowDataset, indices: &[usize], weights: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_classes];
        for &i in indices {
            if let Some(class) = data.labels[i] {
                sums[class] += weights[i];
            }
        }
        sums
    }

    fn find_best_split(
        &self,
        data: &BowDataset,
        indices: &[usize],
        weights: &[f64],
        parent_impurity: f64,
    ) -> Option<(usize, f64, Vec<usize>, Vec<usize>)> {
        let mut best_gain = 1e-12;
        let mut best: Option<(usize, f64, Vec<usize>, Vec<usize>)> = None;

        for feature_idx in 0..data.n_features() {
            let mut values: Vec<f64> = indices
                .iter()
                .map(|&i| data.features[i][feature_idx])
                .collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            values.dedup();

            for window in values.windows(2) {
                let threshold = (window[0] + window[1]) / 2.0;

                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| data.features[i][feature_idx] <= threshold);

                if left_idx.len() < self.params.min_samples_leaf
                    || right_idx.len() < self.params.min_samples_leaf
                {
                    continue;
                }

                let left_weights = self.class_weight_sums(data, &left_idx, weights);
                let right_weights = self.class_weight_sums(data, &right_idx, weights);
                let w_left: f64 = left_weights.iter().sum();
                let w_right: f64 = right_weights.iter().sum();
                let w_total = w_left + w_right;
                if w_total <= 0.0 {
                    continue;
                }

                let weighted_impurity =
                    (w_left * gini(&left_weights) + w_right * gini(&right_weights)) / w_total;
                let gain = parent_impurity - weighted_impurity;

                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature_idx, threshold, left_idx, right_idx));
                }
            }
        }

        best
    }

    fn leaf_for<'a>(node: &'a TreeNode, features: &[f64]) -> &'a TreeNode {
        match (&node.left, &node.right, node.feature_idx, node.threshold) {
            (Some(left), Some(right), Some(f), Some(t)) => {
                if features[f] <= t {
                    Self::leaf_for(left, features)
                } else {
                    Self::leaf_for(right, features)
                }
            }
            _ => node,
        }
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, data: &BowDataset) -> Result<(), ModelError> {
        let weights = vec![1.0; data.n_samples()];
        self.fit_weighted(data, &weights)
    }

    fn predict_one(&self, features: &[f64]) -> Result<usize, ModelError> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(argmax(&Self::leaf_for(root, features).distribution))
    }

    fn predict_proba_one(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        let root = self.root.as_ref().ok_or(ModelError::NotFitted)?;
        Ok(Self::leaf_for(root, features).distribution.clone())
    }
}

/// Gini impurity of a weighted class distribution.
fn gini(class_weights: &[f64]) -> f64 {
    let total: f64 = class_weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - class_weights
        .iter()
        .map(|&w| {
            let p = w / total;
            p * p
        })
        .sum::<f64>()
}

fn normalize(class_weights: Vec<f64>) -> Vec<f64> {
    let total: f64 = class_weights.iter().sum();
    if total <= 0.0 {
        return class_weights;
    }
    class_weights.into_iter().map(|w| w / total).collect()
}

/// Index of the largest value; ties go to the lower index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
