//! Seeded stratified resampling
//!
//! Produces named train/dev partitions from a labeled corpus. Per-class
//! quotas interpolate between the empirical class distribution and a
//! uniform one, so minority causes can be over-represented in training.
//! The whole procedure is a pure function of the corpus order and the
//! seed; inverting the selection yields the complementary partition.

use crate::data::record::Record;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("sample percent {0} out of range (0, 100]")]
    InvalidPercent(f64),
    #[error("bias to uniform {0} out of range [0, 1]")]
    InvalidBias(f64),
    #[error("corpus is empty")]
    EmptyCorpus,
    #[error("record {0} has no label, stratified resampling needs labeled data")]
    UnlabeledRecord(usize),
}

/// Sampling parameters for one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleParams {
    pub seed: u64,
    /// Sample size as a percentage of the corpus, in (0, 100]
    pub percent: f64,
    /// 0.0 keeps the empirical class distribution, 1.0 forces uniform
    pub bias_to_uniform: f64,
    /// Draw with replacement (duplicates allowed)
    pub replacement: bool,
    /// Return the complement of the selection instead
    pub invert: bool,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            seed: 1,
            percent: 75.0,
            bias_to_uniform: 0.0,
            replacement: false,
            invert: false,
        }
    }
}

impl ResampleParams {
    pub(crate) fn validate(&self) -> Result<(), ResampleError> {
        if !(self.percent > 0.0 && self.percent <= 100.0) {
            return Err(ResampleError::InvalidPercent(self.percent));
        }
        if !(0.0..=1.0).contains(&self.bias_to_uniform) {
            return Err(ResampleError::InvalidBias(self.bias_to_uniform));
        }
        Ok(())
    }
}

/// A named selection of corpus rows plus the parameters that produced it.
/// Indices refer to the original corpus, so identity is exact even when
/// records repeat under replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub indices: Vec<usize>,
    pub params: ResampleParams,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Materialise the selected records, in selection order.
    pub fn extract(&self, corpus: &[Record]) -> Vec<Record> {
        self.indices.iter().map(|&i| corpus[i].clone()).collect()
    }
}

/// Draw a stratified sample from the corpus.
///
/// Records are bucketed by class in first-seen class order and buckets are
/// drawn from in that order, so two calls with the same corpus, seed and
/// parameters select identical rows in identical order. Without
/// replacement a quota larger than its bucket is capped at the bucket
/// size. With `invert`, the complement of the distinct selected rows is
/// returned in corpus order.
pub fn stratified_resample(
    corpus: &[Record],
    name: &str,
    params: &ResampleParams,
) -> Result<Partition, ResampleError> {
    params.validate()?;
    if corpus.is_empty() {
        return Err(ResampleError::EmptyCorpus);
    }

    // class buckets in first-seen order, corpus order within each bucket
    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut slot_of: HashMap<&str, usize> = HashMap::new();
    for (i, record) in corpus.iter().enumerate() {
        let label = record
            .label
            .as_deref()
            .ok_or(ResampleError::UnlabeledRecord(i))?;
        let slot = match slot_of.get(label) {
            Some(&slot) => slot,
            None => {
                slot_of.insert(label, buckets.len());
                buckets.push(Vec::new());
                buckets.len() - 1
            }
        };
        buckets[slot].push(i);
    }

    let n = corpus.len() as f64;
    let k = buckets.len() as f64;
    let target = (n * params.percent / 100.0).round() as usize;
    let quotas = class_quotas(&buckets, target, params.bias_to_uniform, n, k);

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut selected = Vec::with_capacity(target);
    for (slot, bucket) in buckets.iter().enumerate() {
        if params.replacement {
            for _ in 0..quotas[slot] {
                selected.push(bucket[rng.gen_range(0..bucket.len())]);
            }
        } else {
            let mut shuffled = bucket.clone();
            shuffled.shuffle(&mut rng);
            shuffled.truncate(quotas[slot].min(bucket.len()));
            selected.extend(shuffled);
        }
    }

    let indices = if params.invert {
        let chosen: HashSet<usize> = selected.iter().copied().collect();
        (0..corpus.len()).filter(|i| !chosen.contains(i)).collect()
    } else {
        selected
    };

    Ok(Partition {
        name: name.to_string(),
        indices,
        params: params.clone(),
    })
}

/// Per-class sample counts: interpolate empirical and uniform shares, then
/// round by largest remainder so the counts sum to `target` exactly.
fn class_quotas(buckets: &[Vec<usize>], target: usize, bias: f64, n: f64, k: f64) -> Vec<usize> {
    let shares: Vec<f64> = buckets
        .iter()
        .map(|b| target as f64 * ((1.0 - bias) * b.len() as f64 / n + bias / k))
        .collect();

    let mut quotas: Vec<usize> = shares.iter().map(|s| s.floor() as usize).collect();
    let assigned: usize = quotas.iter().sum();

    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = shares[a] - shares[a].floor();
        let fb = shares[b] - shares[b].floor();
        fb.partial_cmp(&fa).unwrap_or(Ordering::Equal).then(a.cmp(&b))
    });
    for &slot in order.iter().take(target.saturating_sub(assigned)) {
        quotas[slot] += 1;
    }
    quotas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(layout: &[(&str, usize)]) -> Vec<Record> {
        let mut records = Vec::new();
        for (label, count) in layout {
            for i in 0..*count {
                records.push(Record::labeled(&format!("{} narrative {}", label, i), label));
            }
        }
        records
    }

    fn class_counts(partition: &Partition, corpus: &[Record]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for &i in &partition.indices {
            let label = corpus[i].label.clone().unwrap();
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_same_seed_same_selection() {
        let corpus = corpus(&[("A", 50), ("B", 30), ("C", 20)]);
        let params = ResampleParams {
            seed: 7,
            percent: 80.0,
            bias_to_uniform: 0.5,
            replacement: false,
            invert: false,
        };

        let first = stratified_resample(&corpus, "train", &params).unwrap();
        let second = stratified_resample(&corpus, "train", &params).unwrap();
        assert_eq!(first.indices, second.indices);

        let other_seed = ResampleParams { seed: 8, ..params };
        let third = stratified_resample(&corpus, "train", &other_seed).unwrap();
        assert_ne!(first.indices, third.indices);
    }

    #[test]
    fn test_invert_is_exact_complement_without_replacement() {
        let corpus = corpus(&[("A", 40), ("B", 35), ("C", 25)]);
        let params = ResampleParams {
            seed: 5,
            percent: 70.0,
            bias_to_uniform: 0.0,
            replacement: false,
            invert: false,
        };

        let train = stratified_resample(&corpus, "train", &params).unwrap();
        let dev_params = ResampleParams {
            invert: true,
            ..params
        };
        let dev = stratified_resample(&corpus, "dev", &dev_params).unwrap();

        assert_eq!(train.len(), 70);
        assert_eq!(dev.len(), 30);

        let train_set: HashSet<usize> = train.indices.iter().copied().collect();
        let dev_set: HashSet<usize> = dev.indices.iter().copied().collect();
        assert!(train_set.is_disjoint(&dev_set));

        let union: HashSet<usize> = train_set.union(&dev_set).copied().collect();
        assert_eq!(union, (0..corpus.len()).collect::<HashSet<_>>());
    }

    #[test]
    fn test_bias_zero_keeps_empirical_distribution() {
        let corpus = corpus(&[("A", 80), ("B", 20)]);
        let params = ResampleParams {
            seed: 3,
            percent: 50.0,
            bias_to_uniform: 0.0,
            replacement: false,
            invert: false,
        };

        let partition = stratified_resample(&corpus, "train", &params).unwrap();
        let counts = class_counts(&partition, &corpus);
        assert_eq!(counts["A"], 40);
        assert_eq!(counts["B"], 10);
    }

    #[test]
    fn test_bias_one_forces_uniform_with_replacement() {
        let corpus = corpus(&[("A", 80), ("B", 20)]);
        let params = ResampleParams {
            seed: 3,
            percent: 50.0,
            bias_to_uniform: 1.0,
            replacement: true,
            invert: false,
        };

        let partition = stratified_resample(&corpus, "train", &params).unwrap();
        let counts = class_counts(&partition, &corpus);
        assert_eq!(counts["A"], 25);
        assert_eq!(counts["B"], 25);
    }

    #[test]
    fn test_replacement_duplicates_small_classes() {
        let corpus = corpus(&[("A", 95), ("B", 5)]);
        let params = ResampleParams {
            seed: 11,
            percent: 100.0,
            bias_to_uniform: 1.0,
            replacement: true,
            invert: false,
        };

        let partition = stratified_resample(&corpus, "train", &params).unwrap();
        assert_eq!(partition.len(), 100);

        // 50 draws from a 5-row bucket must repeat rows
        let distinct: HashSet<usize> = partition.indices.iter().copied().collect();
        assert!(distinct.len() < partition.len());
    }

    #[test]
    fn test_without_replacement_caps_at_bucket_size() {
        let corpus = corpus(&[("A", 90), ("B", 10)]);
        let params = ResampleParams {
            seed: 2,
            percent: 100.0,
            bias_to_uniform: 1.0,
            replacement: false,
            invert: false,
        };

        let partition = stratified_resample(&corpus, "train", &params).unwrap();
        let counts = class_counts(&partition, &corpus);
        assert_eq!(counts["B"], 10);
        assert_eq!(counts["A"], 50);
    }

    #[test]
    fn test_invalid_params_fail_fast() {
        let corpus = corpus(&[("A", 10)]);
        let bad_percent = ResampleParams {
            percent: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            stratified_resample(&corpus, "t", &bad_percent),
            Err(ResampleError::InvalidPercent(_))
        ));

        let bad_bias = ResampleParams {
            bias_to_uniform: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            stratified_resample(&corpus, "t", &bad_bias),
            Err(ResampleError::InvalidBias(_))
        ));

        assert!(matches!(
            stratified_resample(&[], "t", &ResampleParams::default()),
            Err(ResampleError::EmptyCorpus)
        ));

        let unlabeled = vec![Record::new("text".to_string(), None, Vec::new())];
        assert!(matches!(
            stratified_resample(&unlabeled, "t", &ResampleParams::default()),
            Err(ResampleError::UnlabeledRecord(0))
        ));
    }

    #[test]
    fn test_extract_preserves_selection_order() {
        let corpus = corpus(&[("A", 4), ("B", 4)]);
        let params = ResampleParams {
            seed: 1,
            percent: 50.0,
            ..Default::default()
        };

        let partition = stratified_resample(&corpus, "train", &params).unwrap();
        let records = partition.extract(&corpus);
        assert_eq!(records.len(), partition.len());
        for (record, &i) in records.iter().zip(partition.indices.iter()) {
            assert_eq!(record, &corpus[i]);
        }
    }
}
