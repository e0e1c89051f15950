//! Pipeline configuration and stage orchestration
//!
//! One `PipelineConfig` drives every run; the named presets reproduce
//! the standard sampling setups instead of near-identical copies of the
//! pipeline. The stages compose: resample the corpus into train and dev
//! partitions, build (and optionally prune) the vocabulary on the train
//! side only, project both sides, then grid-search the booster.

use crate::data::dataset::BowDataset;
use crate::data::normalize::RowSchema;
use crate::data::record::Record;
use crate::data::resample::{stratified_resample, Partition, ResampleError, ResampleParams};
use crate::ml::grid::{GridPoint, HyperGrid};
use crate::ml::grid_search::{grid_search, PointResult, SearchError, SearchOutcome};
use crate::ml::metrics::{evaluate, Evaluation};
use crate::models::adaboost::{AdaBoostM1, BoostParams};
use crate::models::artifact::ModelArtifact;
use crate::models::decision_tree::{DecisionTree, TreeParams};
use crate::models::{Classifier, ModelError};
use crate::nlp::projector::{project, project_records};
use crate::nlp::tokenizer::Tokenizer;
use crate::nlp::vocabulary::{Vocabulary, VocabularyBuilder, Weighting};
use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Seeds of the multi-seed experiment harness.
pub const DEFAULT_SEEDS: [u64; 20] = [
    5, 162, 182, 197, 267, 345, 378, 388, 497, 625, 638, 668, 685, 704, 756, 766, 770, 812, 937,
    956,
];

/// The grid the training pipeline searches when none is given: the
/// booster's trimming threshold crossed with its round count.
pub fn default_grid() -> HyperGrid {
    HyperGrid::new()
        .axis_range("weight_threshold", 50, 100, 10)
        .axis_range("iterations", 10, 15, 5)
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub schema: RowSchema,
    pub seed: u64,
    /// Train sample size as a percentage of the corpus
    pub percent: f64,
    /// Class-balance bias of the train sample
    pub bias_to_uniform: f64,
    /// Draw the train sample with replacement
    pub replacement: bool,
    pub min_token_len: usize,
    pub weighting: Weighting,
    /// Drop zero-information-gain tokens after the build
    pub prune: bool,
    pub grid: HyperGrid,
    /// Grid-search worker bound, `None` for the rayon default
    pub parallelism: Option<usize>,
    /// Base learner of the booster
    pub tree: TreeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Preset::Biased.config(1)
    }
}

impl PipelineConfig {
    /// Parameters of the train-side sample.
    pub fn train_params(&self) -> ResampleParams {
        ResampleParams {
            seed: self.seed,
            percent: self.percent,
            bias_to_uniform: self.bias_to_uniform,
            replacement: self.replacement,
            invert: false,
        }
    }

    /// Parameters of the dev-side sample: the inverted, unbiased,
    /// without-replacement complement of the same selection.
    pub fn dev_params(&self) -> ResampleParams {
        ResampleParams {
            seed: self.seed,
            percent: self.percent,
            bias_to_uniform: 0.0,
            replacement: false,
            invert: true,
        }
    }

    pub fn validate(&self) -> Result<(), ResampleError> {
        self.train_params().validate()?;
        self.dev_params().validate()
    }

    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new().with_min_length(self.min_token_len)
    }
}

#[derive(Debug, Error)]
#[error("unknown preset '{0}', expected biased, unbiased or text-only")]
pub struct UnknownPreset(String);

/// Named sampling setups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// 75% train sample, bias 0.3 toward uniform classes, with
    /// replacement; pruning on
    Biased,
    /// 75% train sample at the empirical class distribution, without
    /// replacement; pruning on
    Unbiased,
    /// Unbiased sampling with pruning off, keeping the whole vocabulary
    TextOnly,
}

impl Preset {
    pub fn config(self, seed: u64) -> PipelineConfig {
        let base = PipelineConfig {
            schema: RowSchema::default(),
            seed,
            percent: 75.0,
            bias_to_uniform: 0.3,
            replacement: true,
            min_token_len: 3,
            weighting: Weighting::Counts,
            prune: true,
            grid: default_grid(),
            parallelism: None,
            tree: TreeParams::default(),
        };
        match self {
            Preset::Biased => base,
            Preset::Unbiased => PipelineConfig {
                bias_to_uniform: 0.0,
                replacement: false,
                ..base
            },
            Preset::TextOnly => PipelineConfig {
                bias_to_uniform: 0.0,
                replacement: false,
                prune: false,
                ..base
            },
        }
    }
}

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "biased" => Ok(Preset::Biased),
            "unbiased" => Ok(Preset::Unbiased),
            "text-only" => Ok(Preset::TextOnly),
            other => Err(UnknownPreset(other.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Biased => "biased",
            Preset::Unbiased => "unbiased",
            Preset::TextOnly => "text-only",
        };
        write!(f, "{}", name)
    }
}

/// Everything the training stage consumes: projected train and dev sets,
/// the vocabulary they were projected with, and the index partitions for
/// provenance.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: BowDataset,
    pub dev: BowDataset,
    pub vocabulary: Vocabulary,
    pub train_partition: Partition,
    pub dev_partition: Partition,
}

/// Resample, build the vocabulary on the train side, project both sides.
pub fn prepare(
    corpus: &[Record],
    classes: &[String],
    config: &PipelineConfig,
) -> Result<PreparedData> {
    config.validate()?;

    let train_partition = stratified_resample(corpus, "train", &config.train_params())?;
    let dev_partition = stratified_resample(corpus, "dev", &config.dev_params())?;
    info!(
        "partitioned corpus of {} into train {} / dev {}",
        corpus.len(),
        train_partition.len(),
        dev_partition.len()
    );

    let train_records = train_partition.extract(corpus);
    let dev_records = dev_partition.extract(corpus);

    let full = VocabularyBuilder::new()
        .with_tokenizer(config.tokenizer())
        .with_weighting(config.weighting)
        .build(&train_records);
    let vocabulary = if config.prune {
        full.prune_zero_gain(&train_records, classes)
    } else {
        full
    };

    let train = project_records(&train_records, &vocabulary, classes)?;
    let dev = project_records(&dev_records, &vocabulary, classes)?;

    Ok(PreparedData {
        train,
        dev,
        vocabulary,
        train_partition,
        dev_partition,
    })
}

/// A finished training run: the persisted artifact plus the search
/// record behind it.
#[derive(Debug)]
pub struct TrainedModel {
    pub artifact: ModelArtifact,
    pub winner: GridPoint,
    /// Selection score of the winner on the dev set, before the refit
    pub dev_score: f64,
    pub dev_eval: Evaluation,
    pub results: Vec<PointResult>,
    pub n_failed: usize,
}

/// Grid-search the booster on the prepared data. Accuracy on the dev set
/// selects the winner; the winning configuration is refit on train plus
/// dev for the artifact.
pub fn train_model(
    prepared: PreparedData,
    config: &PipelineConfig,
) -> Result<TrainedModel, SearchError> {
    let tree = config.tree;
    let factory = |point: &GridPoint| {
        AdaBoostM1::new(BoostParams {
            iterations: point.get("iterations").unwrap_or(10).max(1) as usize,
            weight_threshold: point.get("weight_threshold").unwrap_or(100).clamp(0, 100) as u32,
            tree,
        })
    };

    let outcome = grid_search(
        &config.grid,
        &prepared.train,
        &prepared.dev,
        factory,
        |eval| eval.accuracy(),
        config.parallelism,
    )?;

    let SearchOutcome {
        winner,
        dev_score,
        winner_eval,
        final_model,
        results,
        n_failed,
    } = outcome;

    let classes = prepared.train.classes.clone();
    let artifact = ModelArtifact::new(final_model, prepared.vocabulary, classes);

    Ok(TrainedModel {
        artifact,
        winner,
        dev_score,
        dev_eval: winner_eval,
        results,
        n_failed,
    })
}

/// Predict a class id per record through the artifact's vocabulary.
pub fn classify_records(
    artifact: &ModelArtifact,
    records: &[Record],
) -> Result<Vec<usize>, ModelError> {
    records
        .iter()
        .map(|record| {
            let features = project(record, &artifact.vocabulary);
            artifact.classifier.predict_one(&features.values)
        })
        .collect()
}

/// One pipeline run for the experiment harness: prepare, search, report
/// the winner's dev metrics.
#[derive(Debug)]
pub struct SeedRun {
    pub seed: u64,
    pub winner: GridPoint,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: Option<f64>,
    pub pr_auc: Option<f64>,
}

pub fn run_seed(corpus: &[Record], classes: &[String], config: &PipelineConfig) -> Result<SeedRun> {
    let prepared = prepare(corpus, classes, config)?;
    let trained = train_model(prepared, config)?;
    let eval = &trained.dev_eval;

    Ok(SeedRun {
        seed: config.seed,
        winner: trained.winner,
        accuracy: eval.accuracy(),
        precision: eval.weighted_precision(),
        recall: eval.weighted_recall(),
        f1: eval.weighted_f1(),
        roc_auc: eval.weighted_roc_auc(),
        pr_auc: eval.weighted_pr_auc(),
    })
}

/// Per-fold dev evaluations of a lone decision tree, the reference the
/// boosted pipeline is compared against.
pub fn baseline_cv(
    data: &BowDataset,
    n_folds: usize,
    seed: u64,
    tree: TreeParams,
) -> Result<Vec<Evaluation>, ModelError> {
    crate::ml::cross_validation::k_fold(data.n_samples(), n_folds, seed)
        .iter()
        .map(|split| {
            let train = data.subset(&split.train_indices);
            let test = data.subset(&split.test_indices);
            let mut model = DecisionTree::new(tree);
            model.fit(&train)?;
            evaluate(&model, &test)
        })
        .collect()
}
