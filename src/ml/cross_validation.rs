//! Seeded k-fold cross-validation
//!
//! Index-based folds for the baseline classifier: shuffle once with a
//! seeded RNG, slice into k folds, each fold tests once while the rest
//! train. The same seed always produces the same folds.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// One fold: which corpus indices train and which test.
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// K-fold splits over `n_samples` shuffled indices. The last fold
/// absorbs the remainder when the sample count does not divide evenly.
pub fn k_fold(n_samples: usize, n_folds: usize, seed: u64) -> Vec<CVSplit> {
    assert!(n_folds > 1, "n_folds must be > 1");
    assert!(n_samples >= n_folds, "n_samples must be >= n_folds");

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let fold_size = n_samples / n_folds;
    let mut splits = Vec::with_capacity(n_folds);

    for i in 0..n_folds {
        let test_start = i * fold_size;
        let test_end = if i == n_folds - 1 {
            n_samples
        } else {
            (i + 1) * fold_size
        };

        let test_indices: Vec<usize> = indices[test_start..test_end].to_vec();
        let train_indices: Vec<usize> = indices[..test_start]
            .iter()
            .chain(indices[test_end..].iter())
            .copied()
            .collect();

        splits.push(CVSplit {
            train_indices,
            test_indices,
        });
    }

    splits
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_k_fold_covers_every_index_once() {
        let splits = k_fold(10, 5, 42);

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 2);
            assert_eq!(split.train_indices.len(), 8);

            let train: HashSet<usize> = split.train_indices.iter().copied().collect();
            assert!(split.test_indices.iter().all(|i| !train.contains(i)));
        }

        let all_test: HashSet<usize> = splits
            .iter()
            .flat_map(|s| s.test_indices.iter().copied())
            .collect();
        assert_eq!(all_test, (0..10).collect());
    }

    #[test]
    fn test_last_fold_absorbs_remainder() {
        let splits = k_fold(10, 3, 7);

        assert_eq!(splits[0].test_indices.len(), 3);
        assert_eq!(splits[1].test_indices.len(), 3);
        assert_eq!(splits[2].test_indices.len(), 4);
    }

    #[test]
    fn test_same_seed_same_folds() {
        let a = k_fold(30, 5, 162);
        let b = k_fold(30, 5, 162);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.test_indices, y.test_indices);
            assert_eq!(x.train_indices, y.train_indices);
        }

        let c = k_fold(30, 5, 163);
        let differs = a
            .iter()
            .zip(&c)
            .any(|(x, y)| x.test_indices != y.test_indices);
        assert!(differs);
    }
}
