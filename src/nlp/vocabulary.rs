//! Bag-of-words vocabulary with information-gain pruning
//!
//! A vocabulary is an immutable value: the ordered token list, each
//! token's document count, and the projection parameters (minimum token
//! length, count-vs-presence weighting) that define the feature space.
//! Pruning never mutates a vocabulary in place; it builds a fresh one
//! with densely renumbered indices, and only that pruned vocabulary is
//! ever serialized or projected against, so exactly one feature space
//! exists downstream of the build.

use crate::data::record::Record;
use crate::nlp::tokenizer::Tokenizer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// How token occurrences turn into feature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weighting {
    /// Raw occurrence count per document
    Counts,
    /// 1.0 if the token occurs, else 0.0
    Presence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub token: String,
    /// Number of documents the token occurs in
    pub doc_count: usize,
    /// Information gain against the class, recorded by pruning
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
    index: HashMap<String, usize>,
    n_docs: usize,
    min_token_len: usize,
    weighting: Weighting,
}

impl Vocabulary {
    fn from_entries(
        entries: Vec<VocabEntry>,
        n_docs: usize,
        min_token_len: usize,
        weighting: Weighting,
    ) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.token.clone(), i))
            .collect();
        Self {
            entries,
            index,
            n_docs,
            min_token_len,
            weighting,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn token_index(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }

    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.token.as_str())
    }

    pub fn n_docs(&self) -> usize {
        self.n_docs
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// The tokenizer this vocabulary was built with. Projection derives its
    /// tokenizer from here, so build and inference can never disagree.
    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new().with_min_length(self.min_token_len)
    }

    /// Information gain of each token's presence against the class label.
    /// Unlabeled records are ignored. Gains are non-negative.
    pub fn information_gain(&self, records: &[Record], classes: &[String]) -> Vec<f64> {
        let tokenizer = self.tokenizer();
        let k = classes.len();

        let mut class_totals = vec![0usize; k];
        let mut present_by_class = vec![vec![0usize; k]; self.entries.len()];
        let mut n_labeled = 0usize;

        for record in records {
            let Some(class) = record
                .label
                .as_deref()
                .and_then(|l| classes.iter().position(|c| c == l))
            else {
                continue;
            };
            n_labeled += 1;
            class_totals[class] += 1;

            let mut seen = HashSet::new();
            for token in tokenizer.tokenize(&record.text) {
                if let Some(slot) = self.token_index(&token) {
                    if seen.insert(slot) {
                        present_by_class[slot][class] += 1;
                    }
                }
            }
        }

        if n_labeled == 0 {
            return vec![0.0; self.entries.len()];
        }

        let n = n_labeled as f64;
        let class_entropy = entropy(&class_totals, n_labeled);

        present_by_class
            .iter()
            .map(|present| {
                let n_present: usize = present.iter().sum();
                let n_absent = n_labeled - n_present;
                let absent: Vec<usize> = class_totals
                    .iter()
                    .zip(present.iter())
                    .map(|(total, p)| total - p)
                    .collect();

                let conditional = (n_present as f64 / n) * entropy(present, n_present)
                    + (n_absent as f64 / n) * entropy(&absent, n_absent);
                (class_entropy - conditional).max(0.0)
            })
            .collect()
    }

    /// Drop every token whose information gain is exactly zero and build a
    /// fresh vocabulary with dense renumbered indices. Survivors carry
    /// their gain in `score`.
    pub fn prune_zero_gain(&self, records: &[Record], classes: &[String]) -> Vocabulary {
        let gains = self.information_gain(records, classes);

        let entries: Vec<VocabEntry> = self
            .entries
            .iter()
            .zip(gains)
            .filter(|(_, gain)| *gain > 0.0)
            .map(|(entry, gain)| VocabEntry {
                token: entry.token.clone(),
                doc_count: entry.doc_count,
                score: Some(gain),
            })
            .collect();

        info!(
            "pruned vocabulary from {} to {} tokens",
            self.entries.len(),
            entries.len()
        );
        Vocabulary::from_entries(entries, self.n_docs, self.min_token_len, self.weighting)
    }

    /// Write the `token,index` dictionary file, one entry per line in
    /// index order.
    pub fn write_dictionary(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create dictionary {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(writer, "{},{}", entry.token, i)
                .with_context(|| format!("failed to write dictionary {}", path.display()))?;
        }
        Ok(())
    }

    /// Write the `token,score` file for pruned vocabularies.
    pub fn write_scores(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create scores file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            if let Some(score) = entry.score {
                writeln!(writer, "{},{}", entry.token, score)
                    .with_context(|| format!("failed to write scores file {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// Read a `token,index` dictionary file back into a vocabulary with the
    /// given projection parameters. Indices must be dense from zero.
    /// Document counts are not part of the dictionary format and come back
    /// as zero.
    pub fn read_dictionary(
        path: &Path,
        min_token_len: usize,
        weighting: Weighting,
    ) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open dictionary {}", path.display()))?;

        let mut pairs: Vec<(usize, String)> = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("failed to read dictionary {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let (token, idx) = line.rsplit_once(',').with_context(|| {
                format!("dictionary {} line {} is not token,index", path.display(), line_no + 1)
            })?;
            let idx: usize = idx.trim().parse().with_context(|| {
                format!("dictionary {} line {} has a bad index", path.display(), line_no + 1)
            })?;
            pairs.push((idx, token.to_string()));
        }

        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        for (expected, (idx, _)) in pairs.iter().enumerate() {
            if *idx != expected {
                anyhow::bail!("dictionary {} is not densely indexed", path.display());
            }
        }

        let entries = pairs
            .into_iter()
            .map(|(_, token)| VocabEntry {
                token,
                doc_count: 0,
                score: None,
            })
            .collect();
        Ok(Vocabulary::from_entries(entries, 0, min_token_len, weighting))
    }
}

/// Shannon entropy in bits of a count distribution.
fn entropy(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Builds a vocabulary from a record sequence. Token order is first-seen,
/// so the same records always yield the same indices.
#[derive(Debug, Clone)]
pub struct VocabularyBuilder {
    tokenizer: Tokenizer,
    weighting: Weighting,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            weighting: Weighting::Counts,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn build(&self, records: &[Record]) -> Vocabulary {
        let mut entries: Vec<VocabEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let mut seen = HashSet::new();
            for token in self.tokenizer.tokenize(&record.text) {
                let slot = match index.get(&token) {
                    Some(&slot) => slot,
                    None => {
                        let slot = entries.len();
                        index.insert(token.clone(), slot);
                        entries.push(VocabEntry {
                            token,
                            doc_count: 0,
                            score: None,
                        });
                        slot
                    }
                };
                if seen.insert(slot) {
                    entries[slot].doc_count += 1;
                }
            }
        }

        Vocabulary {
            entries,
            index,
            n_docs: records.len(),
            min_token_len: self.tokenizer.min_token_len(),
            weighting: self.weighting,
        }
    }
}

impl Default for VocabularyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
