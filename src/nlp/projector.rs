//! Deterministic record-to-feature projection
//!
//! Projection is a pure function of a record and a vocabulary. The
//! vocabulary carries its own tokenizer settings and weighting, so there
//! is no separately configured filter that could drift between training
//! and inference.

use crate::data::dataset::BowDataset;
use crate::data::record::Record;
use crate::nlp::vocabulary::{Vocabulary, Weighting};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One projected record: a fixed-width numeric vector plus the class
/// label carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    pub label: Option<String>,
}

/// Project one record onto the vocabulary's feature space.
///
/// Total and deterministic: tokens outside the vocabulary are ignored and
/// an absent label stays absent, never guessed.
pub fn project(record: &Record, vocab: &Vocabulary) -> FeatureVector {
    let mut values = vec![0.0; vocab.len()];
    let tokenizer = vocab.tokenizer();

    for token in tokenizer.tokenize(&record.text) {
        if let Some(i) = vocab.token_index(&token) {
            match vocab.weighting() {
                Weighting::Counts => values[i] += 1.0,
                Weighting::Presence => values[i] = 1.0,
            }
        }
    }

    FeatureVector {
        values,
        label: record.label.clone(),
    }
}

/// Project a batch of records into a dataset against a fixed class list.
///
/// A labeled record whose category is missing from `classes` means the
/// code book and the class list are out of step, which is an error rather
/// than a skippable row.
pub fn project_records(
    records: &[Record],
    vocab: &Vocabulary,
    classes: &[String],
) -> Result<BowDataset> {
    let feature_names = vocab.tokens().map(|t| t.to_string()).collect();
    let mut dataset = BowDataset::new(classes.to_vec(), feature_names);

    for (i, record) in records.iter().enumerate() {
        let vector = project(record, vocab);
        let label = match &vector.label {
            Some(category) => {
                let id = classes.iter().position(|c| c == category).with_context(|| {
                    format!("record {} has category '{}' outside the class list", i, category)
                })?;
                Some(id)
            }
            None => None,
        };
        dataset.add_sample(vector.values, label);
    }

    Ok(dataset)
}
