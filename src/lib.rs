//! # VA-ML - Verbal Autopsy Cause-of-Death Classification
//!
//! This library turns free-text verbal autopsy narratives into broad
//! cause-of-death categories. It covers the whole pipeline:
//!
//! - Normalization of raw CSV exports and category mapping
//! - Bag-of-words vocabularies with information-gain pruning
//! - Seeded stratified resampling into train/dev partitions
//! - Boosted decision trees (AdaBoost.M1) over word counts
//! - Parallel hyperparameter grid search with deterministic tie-breaking
//! - Evaluation reports and a persisted model artifact

pub mod data;
pub mod ml;
pub mod models;
pub mod nlp;
pub mod pipeline;
pub mod report;

pub use data::{stratified_resample, BowDataset, CategoryMap, Record, RowSchema};
pub use ml::{grid_search, Evaluation, HyperGrid};
pub use models::{AdaBoostM1, Classifier, ModelArtifact};
pub use nlp::{Vocabulary, VocabularyBuilder};
pub use pipeline::{PipelineConfig, Preset};
