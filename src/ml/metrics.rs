//! Evaluation metrics for the classification pipeline
//!
//! Includes:
//! - Summary: accuracy, Cohen's kappa, correct/incorrect counts
//! - Per class: precision, recall, F1, FP rate, ROC and PRC areas
//! - Weighted aggregates across classes, and the confusion matrix

use crate::data::dataset::BowDataset;
use crate::models::decision_tree::argmax;
use crate::models::{Classifier, ModelError};
use std::cmp::Ordering;

/// Metrics of one class against the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    /// Recall, which is also the true-positive rate
    pub recall: f64,
    pub f1: f64,
    pub fp_rate: f64,
    /// One-vs-rest ROC area, absent without vote distributions
    pub roc_auc: Option<f64>,
    /// One-vs-rest precision-recall area, absent without vote distributions
    pub pr_auc: Option<f64>,
    pub support: usize,
}

/// The outcome of scoring predictions against known labels.
///
/// Built either from vote distributions (predictions are the argmax, and
/// ROC/PRC areas become available) or from bare predicted class ids.
#[derive(Debug, Clone)]
pub struct Evaluation {
    classes: Vec<String>,
    /// confusion[actual][predicted]
    confusion: Vec<Vec<usize>>,
    /// (actual class, per-class votes) per sample, empty without votes
    votes: Vec<(usize, Vec<f64>)>,
}

impl Evaluation {
    /// Score vote distributions; the predicted class of each sample is the
    /// argmax of its distribution, ties toward the lower class id.
    pub fn from_votes(
        classes: Vec<String>,
        actuals: &[usize],
        distributions: &[Vec<f64>],
    ) -> Self {
        assert_eq!(actuals.len(), distributions.len());

        let k = classes.len();
        let mut confusion = vec![vec![0usize; k]; k];
        let mut votes = Vec::with_capacity(actuals.len());

        for (&actual, dist) in actuals.iter().zip(distributions) {
            assert_eq!(dist.len(), k);
            confusion[actual][argmax(dist)] += 1;
            votes.push((actual, dist.clone()));
        }

        Self {
            classes,
            confusion,
            votes,
        }
    }

    /// Score bare predictions. ROC and PRC areas are unavailable.
    pub fn from_predictions(classes: Vec<String>, actuals: &[usize], predicted: &[usize]) -> Self {
        assert_eq!(actuals.len(), predicted.len());

        let k = classes.len();
        let mut confusion = vec![vec![0usize; k]; k];
        for (&actual, &pred) in actuals.iter().zip(predicted) {
            confusion[actual][pred] += 1;
        }

        Self {
            classes,
            confusion,
            votes: Vec::new(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn confusion(&self) -> &[Vec<usize>] {
        &self.confusion
    }

    pub fn n_samples(&self) -> usize {
        self.confusion.iter().map(|row| row.iter().sum::<usize>()).sum()
    }

    pub fn n_correct(&self) -> usize {
        (0..self.classes.len()).map(|c| self.confusion[c][c]).sum()
    }

    /// Number of samples whose actual class is `class`.
    pub fn support(&self, class: usize) -> usize {
        self.confusion[class].iter().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let n = self.n_samples();
        if n == 0 {
            return 0.0;
        }
        self.n_correct() as f64 / n as f64
    }

    /// Cohen's kappa: agreement beyond what the marginals produce by
    /// chance. Zero when chance agreement is total.
    pub fn kappa(&self) -> f64 {
        let n = self.n_samples();
        if n == 0 {
            return 0.0;
        }

        let observed = self.accuracy();
        let expected: f64 = (0..self.classes.len())
            .map(|c| {
                let actual: usize = self.confusion[c].iter().sum();
                let predicted: usize = self.confusion.iter().map(|row| row[c]).sum();
                (actual as f64 / n as f64) * (predicted as f64 / n as f64)
            })
            .sum();

        if (1.0 - expected).abs() < 1e-10 {
            return 0.0;
        }
        (observed - expected) / (1.0 - expected)
    }

    pub fn class_metrics(&self, class: usize) -> ClassMetrics {
        let n = self.n_samples();
        let support = self.support(class);
        let tp = self.confusion[class][class];
        let predicted: usize = self.confusion.iter().map(|row| row[class]).sum();

        let precision = if predicted == 0 {
            0.0
        } else {
            tp as f64 / predicted as f64
        };
        let recall = if support == 0 {
            0.0
        } else {
            tp as f64 / support as f64
        };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        let fp = predicted - tp;
        let negatives = n - support;
        let fp_rate = if negatives == 0 {
            0.0
        } else {
            fp as f64 / negatives as f64
        };

        ClassMetrics {
            precision,
            recall,
            f1,
            fp_rate,
            roc_auc: self.roc_auc(class),
            pr_auc: self.pr_auc(class),
            support,
        }
    }

    pub fn weighted_precision(&self) -> f64 {
        self.weighted(|m| m.precision)
    }

    pub fn weighted_recall(&self) -> f64 {
        self.weighted(|m| m.recall)
    }

    pub fn weighted_f1(&self) -> f64 {
        self.weighted(|m| m.f1)
    }

    fn weighted<F: Fn(&ClassMetrics) -> f64>(&self, metric: F) -> f64 {
        let n = self.n_samples();
        if n == 0 {
            return 0.0;
        }
        (0..self.classes.len())
            .map(|c| self.support(c) as f64 * metric(&self.class_metrics(c)))
            .sum::<f64>()
            / n as f64
    }

    /// One-vs-rest ROC area for a class via the rank-sum statistic, with
    /// midranks for tied scores. `None` without vote distributions or when
    /// the class has no positives or no negatives.
    pub fn roc_auc(&self, class: usize) -> Option<f64> {
        if self.votes.is_empty() {
            return None;
        }

        let scores: Vec<f64> = self.votes.iter().map(|(_, dist)| dist[class]).collect();
        let n_pos = self.votes.iter().filter(|(actual, _)| *actual == class).count();
        let n_neg = scores.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return None;
        }

        let ranks = midranks(&scores);
        let rank_sum: f64 = self
            .votes
            .iter()
            .zip(&ranks)
            .filter(|((actual, _), _)| *actual == class)
            .map(|(_, &rank)| rank)
            .sum();

        let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
        Some(u / (n_pos * n_neg) as f64)
    }

    /// One-vs-rest precision-recall area for a class, computed as average
    /// precision over the score-ranked samples.
    pub fn pr_auc(&self, class: usize) -> Option<f64> {
        if self.votes.is_empty() {
            return None;
        }

        let n_pos = self.votes.iter().filter(|(actual, _)| *actual == class).count();
        if n_pos == 0 {
            return None;
        }

        let mut order: Vec<usize> = (0..self.votes.len()).collect();
        order.sort_by(|&a, &b| {
            self.votes[b].1[class]
                .partial_cmp(&self.votes[a].1[class])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut hits = 0usize;
        let mut precision_sum = 0.0;
        for (seen, &i) in order.iter().enumerate() {
            if self.votes[i].0 == class {
                hits += 1;
                precision_sum += hits as f64 / (seen + 1) as f64;
            }
        }
        Some(precision_sum / n_pos as f64)
    }

    /// Support-weighted ROC area across classes. `None` when any supported
    /// class has no area (no vote distributions, or a single-class set).
    pub fn weighted_roc_auc(&self) -> Option<f64> {
        self.weighted_area(|c| self.roc_auc(c))
    }

    /// Support-weighted PRC area across classes.
    pub fn weighted_pr_auc(&self) -> Option<f64> {
        self.weighted_area(|c| self.pr_auc(c))
    }

    fn weighted_area<F: Fn(usize) -> Option<f64>>(&self, area: F) -> Option<f64> {
        let mut sum = 0.0;
        let mut weight = 0usize;
        for c in 0..self.classes.len() {
            let support = self.support(c);
            if support == 0 {
                continue;
            }
            sum += support as f64 * area(c)?;
            weight += support;
        }
        if weight == 0 {
            None
        } else {
            Some(sum / weight as f64)
        }
    }
}

/// Fit-free scoring: predict every labeled sample of `data` and build an
/// `Evaluation` from the vote distributions.
pub fn evaluate<C: Classifier>(model: &C, data: &BowDataset) -> Result<Evaluation, ModelError> {
    let mut actuals = Vec::new();
    let mut distributions = Vec::new();

    for (i, label) in data.labels.iter().enumerate() {
        if let Some(actual) = label {
            actuals.push(*actual);
            distributions.push(model.predict_proba_one(&data.features[i])?);
        }
    }

    Ok(Evaluation::from_votes(
        data.classes.clone(),
        &actuals,
        &distributions,
    ))
}

/// Ascending ranks with ties sharing their midrank, 1-based.
fn midranks(scores: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = midrank;
        }
        i = j + 1;
    }
    ranks
}

/// Summary statistics over a score list, for fold and multi-seed runs.
#[derive(Debug, Clone)]
pub struct ScoreSummary {
    pub values: Vec<f64>,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ScoreSummary {
    pub fn from_values(values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self {
                values,
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Self {
            values,
            mean,
            std: variance.sqrt(),
            min,
            max,
        }
    }
}

impl std::fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} +/- {:.4}", self.mean, self.std)
    }
}
