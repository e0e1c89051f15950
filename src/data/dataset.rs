//! Projected bag-of-words dataset container

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feature matrix produced by projecting records through a vocabulary.
/// Class ids index into `classes`, which is the same ordered list for every
/// dataset in a run; `None` marks an unlabeled sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BowDataset {
    /// Feature matrix (n_samples x n_features), token counts or presence
    pub features: Vec<Vec<f64>>,
    /// Class id per sample, `None` for unknown
    pub labels: Vec<Option<usize>>,
    /// Ordered class names, the shared class-id space
    pub classes: Vec<String>,
    /// Vocabulary tokens in feature order
    pub feature_names: Vec<String>,
}

impl BowDataset {
    pub fn new(classes: Vec<String>, feature_names: Vec<String>) -> Self {
        Self {
            features: Vec::new(),
            labels: Vec::new(),
            classes,
            feature_names,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn add_sample(&mut self, features: Vec<f64>, label: Option<usize>) {
        assert_eq!(features.len(), self.feature_names.len());
        self.features.push(features);
        self.labels.push(label);
    }

    pub fn class_name(&self, id: usize) -> Option<&str> {
        self.classes.get(id).map(String::as_str)
    }

    /// Number of labeled samples per class id.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for label in self.labels.iter().flatten() {
            counts[*label] += 1;
        }
        counts
    }

    /// Create a subset of the dataset by sample indices.
    pub fn subset(&self, indices: &[usize]) -> BowDataset {
        BowDataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            classes: self.classes.clone(),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Append another dataset sharing the same feature and class space.
    pub fn concat(&self, other: &BowDataset) -> Result<BowDataset> {
        if self.feature_names != other.feature_names {
            anyhow::bail!("cannot concat datasets with different feature spaces");
        }
        if self.classes != other.classes {
            anyhow::bail!("cannot concat datasets with different class lists");
        }

        let mut combined = self.clone();
        combined.features.extend(other.features.iter().cloned());
        combined.labels.extend(other.labels.iter().copied());
        Ok(combined)
    }

    /// Save to CSV: one column per token plus a final `class` column,
    /// `?` for unknown labels.
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut header = self.feature_names.clone();
        header.push("class".to_string());
        writer.write_record(&header)?;

        for i in 0..self.n_samples() {
            let mut row: Vec<String> = self.features[i].iter().map(|v| v.to_string()).collect();
            let class = match self.labels[i] {
                Some(id) => self.classes[id].clone(),
                None => "?".to_string(),
            };
            row.push(class);
            writer.write_record(&row)?;
        }

        writer.flush().context("failed to flush dataset")?;
        Ok(())
    }

    /// Load from CSV written by [`save_csv`](Self::save_csv). The ordered
    /// class list is supplied so class ids stay aligned across files.
    pub fn load_csv(path: &Path, classes: &[String]) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if headers.is_empty() {
            anyhow::bail!("{} has no columns", path.display());
        }
        let n_features = headers.len() - 1;
        let feature_names: Vec<String> = headers[..n_features].to_vec();

        let mut dataset = BowDataset::new(classes.to_vec(), feature_names);
        for (i, result) in reader.records().enumerate() {
            let row = result
                .with_context(|| format!("failed to read {} row {}", path.display(), i + 1))?;
            let features: Vec<f64> = row
                .iter()
                .take(n_features)
                .map(|s| s.parse().unwrap_or(0.0))
                .collect();

            let class_cell = row.get(n_features).unwrap_or("?");
            let label = if class_cell == "?" {
                None
            } else {
                let id = classes.iter().position(|c| c == class_cell).with_context(|| {
                    format!("{} row {} has unknown class '{}'", path.display(), i + 1, class_cell)
                })?;
                Some(id)
            };

            dataset.add_sample(features, label);
        }

        Ok(dataset)
    }
}
