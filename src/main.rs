//! Verbal autopsy cause-of-death classification CLI
//!
//! Subcommands cover the whole pipeline: cleaning raw exports, corpus
//! statistics, feature preparation, grid-search training, batch
//! classification, the multi-seed experiment harness and a single-tree
//! baseline.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use va_ml::data::{load_labeled, load_unlabeled, CategoryMap, Record, RowSchema};
use va_ml::ml::Evaluation;
use va_ml::models::{ModelArtifact, TreeParams};
use va_ml::nlp::{project_records, Tokenizer, VocabularyBuilder};
use va_ml::pipeline::{
    baseline_cv, classify_records, prepare, run_seed, train_model, Preset, DEFAULT_SEEDS,
};
use va_ml::report;

#[derive(Parser)]
#[command(name = "va_ml")]
#[command(about = "Verbal autopsy cause-of-death classification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Raw export column layout, shared by every subcommand that reads one.
#[derive(Args)]
struct SchemaArgs {
    /// Zero-based index of the narrative column
    #[arg(long, default_value = "5")]
    text_column: usize,

    /// Minimum number of columns a row must have
    #[arg(long, default_value = "7")]
    min_columns: usize,
}

impl SchemaArgs {
    fn schema(&self) -> RowSchema {
        RowSchema {
            min_columns: self.min_columns,
            text_column: self.text_column,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw export into the canonical text,class CSV
    Clean {
        /// Path to the raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the cleaned CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Treat rows as unlabeled inference data
        #[arg(long)]
        unlabeled: bool,

        /// Raw-label mapping CSV (defaults to the built-in PHMRC table)
        #[arg(long)]
        category_map: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Corpus statistics: rejections, class densities and vocabulary
    Analyze {
        /// Path to the raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Raw-label mapping CSV (defaults to the built-in PHMRC table)
        #[arg(long)]
        category_map: Option<PathBuf>,

        /// Minimum token length kept by the tokenizer
        #[arg(long, default_value = "3")]
        min_token_len: usize,

        /// How many tokens to list
        #[arg(long, default_value = "10")]
        top: usize,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Partition, build the vocabulary and write train/dev feature CSVs
    Prepare {
        /// Path to the raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Directory receiving train.csv, dev.csv, dictionary and scores
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Pipeline preset: biased, unbiased or text-only
        #[arg(short, long, default_value = "biased")]
        preset: Preset,

        /// Resampling seed
        #[arg(short, long, default_value = "5")]
        seed: u64,

        /// Raw-label mapping CSV (defaults to the built-in PHMRC table)
        #[arg(long)]
        category_map: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Full training run: grid search, dev evaluation, model artifact
    Train {
        /// Path to the raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Optional path for a dev-evaluation stats file
        #[arg(long)]
        stats: Option<PathBuf>,

        /// Pipeline preset: biased, unbiased or text-only
        #[arg(short, long, default_value = "biased")]
        preset: Preset,

        /// Resampling seed
        #[arg(short, long, default_value = "5")]
        seed: u64,

        /// Worker threads for the grid search (defaults to all cores)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Raw-label mapping CSV (defaults to the built-in PHMRC table)
        #[arg(long)]
        category_map: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Classify unlabeled records with a saved model artifact
    Classify {
        /// Path to the raw CSV to classify
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Output path for the classification results
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Run the full pipeline across many seeds and aggregate metrics
    Experiment {
        /// Path to the raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated seed list (defaults to the standard twenty)
        #[arg(long, value_delimiter = ',')]
        seeds: Option<Vec<u64>>,

        /// Pipeline preset: biased, unbiased or text-only
        #[arg(short, long, default_value = "biased")]
        preset: Preset,

        /// Worker threads for the grid search (defaults to all cores)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Raw-label mapping CSV (defaults to the built-in PHMRC table)
        #[arg(long)]
        category_map: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Single unboosted tree under seeded k-fold cross-validation
    Baseline {
        /// Path to the raw CSV export
        #[arg(short, long)]
        input: PathBuf,

        /// Number of folds
        #[arg(short, long, default_value = "10")]
        folds: usize,

        /// Comma-separated seed list (defaults to the standard twenty)
        #[arg(long, value_delimiter = ',')]
        seeds: Option<Vec<u64>>,

        /// Minimum token length kept by the tokenizer
        #[arg(long, default_value = "3")]
        min_token_len: usize,

        /// Raw-label mapping CSV (defaults to the built-in PHMRC table)
        #[arg(long)]
        category_map: Option<PathBuf>,

        #[command(flatten)]
        schema: SchemaArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("va_ml=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // clap exits 2 on usage errors; the tools this replaces exited 1
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print()?;
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    match cli.command {
        Commands::Clean {
            input,
            output,
            unlabeled,
            category_map,
            schema,
        } => {
            let schema = schema.schema();
            let (records, summary) = if unlabeled {
                load_unlabeled(&input, &schema)?
            } else {
                let map = load_category_map(category_map.as_deref())?;
                load_labeled(&input, &schema, &map)?
            };

            write_clean_csv(&output, &records)?;
            report::load_summary(&summary);
            info!("cleaned CSV written to {}", output.display());
        }

        Commands::Analyze {
            input,
            category_map,
            min_token_len,
            top,
            schema,
        } => {
            let map = load_category_map(category_map.as_deref())?;
            let (records, summary) = load_labeled(&input, &schema.schema(), &map)?;

            let classes = map.categories().to_vec();
            let mut counts = vec![0usize; classes.len()];
            for record in &records {
                let class = record
                    .label
                    .as_deref()
                    .and_then(|l| classes.iter().position(|c| c == l));
                if let Some(class) = class {
                    counts[class] += 1;
                }
            }

            let vocab = VocabularyBuilder::new()
                .with_tokenizer(Tokenizer::new().with_min_length(min_token_len))
                .build(&records);

            report::run_banner("Corpus Analysis");
            report::load_summary(&summary);
            report::class_distribution(&classes, &counts);
            report::vocabulary_summary(&vocab, top);
        }

        Commands::Prepare {
            input,
            out_dir,
            preset,
            seed,
            category_map,
            schema,
        } => {
            let map = load_category_map(category_map.as_deref())?;
            let mut config = preset.config(seed);
            config.schema = schema.schema();

            let (records, summary) = load_labeled(&input, &config.schema, &map)?;
            let classes = map.categories().to_vec();
            let prepared = prepare(&records, &classes, &config)?;

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            prepared.train.save_csv(&out_dir.join("train.csv"))?;
            prepared.dev.save_csv(&out_dir.join("dev.csv"))?;
            prepared
                .vocabulary
                .write_dictionary(&out_dir.join("dictionary.txt"))?;
            if config.prune {
                prepared
                    .vocabulary
                    .write_scores(&out_dir.join("scores.txt"))?;
            }

            report::load_summary(&summary);
            report::dataset_summary("Train", &prepared.train);
            report::dataset_summary("Dev", &prepared.dev);
            info!("feature files written to {}", out_dir.display());
        }

        Commands::Train {
            input,
            model,
            stats,
            preset,
            seed,
            parallelism,
            category_map,
            schema,
        } => {
            let started = report::run_banner("Verbal Autopsy Model Training");

            let map = load_category_map(category_map.as_deref())?;
            let mut config = preset.config(seed);
            config.schema = schema.schema();
            config.parallelism = parallelism;

            let (records, summary) = load_labeled(&input, &config.schema, &map)?;
            let classes = map.categories().to_vec();
            report::load_summary(&summary);

            let prepared = prepare(&records, &classes, &config)?;
            report::dataset_summary("Train", &prepared.train);
            report::dataset_summary("Dev", &prepared.dev);

            let trained = train_model(prepared, &config)?;
            report::grid_results(&trained.results);
            if trained.n_failed > 0 {
                warn!("{} grid points failed", trained.n_failed);
            }
            println!(
                "\nSelected parameters: {} (dev accuracy {:.4})",
                trained.winner, trained.dev_score
            );

            report::evaluation_report(&trained.dev_eval);

            if let Some(stats) = &stats {
                write_stats(stats, &trained.dev_eval, started)?;
                info!("evaluation stats written to {}", stats.display());
            }

            trained.artifact.save(&model)?;
            info!("model artifact saved to {}", model.display());
            report::run_footer(started);
        }

        Commands::Classify {
            input,
            model,
            output,
            schema,
        } => {
            let artifact = ModelArtifact::load(&model)?;
            let (records, summary) = load_unlabeled(&input, &schema.schema())?;
            let predictions = classify_records(&artifact, &records)?;

            write_predictions(&output, &artifact.classes, &predictions)?;
            report::load_summary(&summary);
            report::classification_report(&artifact.classes, &predictions);
            info!("classification results written to {}", output.display());
        }

        Commands::Experiment {
            input,
            seeds,
            preset,
            parallelism,
            category_map,
            schema,
        } => {
            let started = report::run_banner("Multi-Seed Experiment");

            let map = load_category_map(category_map.as_deref())?;
            let schema = schema.schema();
            let (records, summary) = load_labeled(&input, &schema, &map)?;
            let classes = map.categories().to_vec();
            report::load_summary(&summary);

            let seeds = seeds.unwrap_or_else(|| DEFAULT_SEEDS.to_vec());
            let mut runs = Vec::with_capacity(seeds.len());
            for (i, &seed) in seeds.iter().enumerate() {
                info!("seed {} ({}/{})", seed, i + 1, seeds.len());
                let mut config = preset.config(seed);
                config.schema = schema.clone();
                config.parallelism = parallelism;
                runs.push(run_seed(&records, &classes, &config)?);
            }

            report::experiment_report(&runs);
            report::run_footer(started);
        }

        Commands::Baseline {
            input,
            folds,
            seeds,
            min_token_len,
            category_map,
            schema,
        } => {
            let started = report::run_banner("Single-Tree Baseline");

            let map = load_category_map(category_map.as_deref())?;
            let (records, summary) = load_labeled(&input, &schema.schema(), &map)?;
            let classes = map.categories().to_vec();
            report::load_summary(&summary);

            let vocab = VocabularyBuilder::new()
                .with_tokenizer(Tokenizer::new().with_min_length(min_token_len))
                .build(&records);
            let data = project_records(&records, &vocab, &classes)?;
            info!(
                "projected {} records over {} tokens",
                data.n_samples(),
                vocab.len()
            );

            if data.n_samples() < folds {
                anyhow::bail!("{} samples cannot fill {} folds", data.n_samples(), folds);
            }

            let seeds = seeds.unwrap_or_else(|| DEFAULT_SEEDS.to_vec());
            let mut rows = Vec::with_capacity(seeds.len());
            for &seed in &seeds {
                let evals = baseline_cv(&data, folds, seed, TreeParams::default())?;
                rows.push((seed, evals));
            }

            report::baseline_report(&rows);
            report::run_footer(started);
        }
    }

    Ok(())
}

fn load_category_map(path: Option<&Path>) -> Result<CategoryMap> {
    match path {
        Some(path) => CategoryMap::from_csv(path),
        None => Ok(CategoryMap::phmrc()),
    }
}

/// Write the dev evaluation to a quality-stats file, closing with the
/// elapsed training time.
fn write_stats(path: &Path, eval: &Evaluation, started: DateTime<Utc>) -> Result<()> {
    let elapsed = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;
    let mut text = String::from("=== Dev set evaluation ===\n");
    text.push_str(&report::evaluation_text(eval));
    text.push_str(&format!("\nElapsed time (seconds): {:.3}\n", elapsed));
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the canonical two-column CSV, `?` standing in for a missing label.
fn write_clean_csv(path: &Path, records: &[Record]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record(["text", "class"])?;
    for record in records {
        writer.write_record([
            record.text.as_str(),
            record.label.as_deref().unwrap_or("?"),
        ])?;
    }
    writer.flush().context("failed to flush cleaned CSV")?;
    Ok(())
}

/// Write the classification results file: one line per instance, then
/// the counts of every predicted class that occurred.
fn write_predictions(path: &Path, classes: &[String], predictions: &[usize]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut counts = vec![0usize; classes.len()];
    for (i, &class) in predictions.iter().enumerate() {
        let name = classes.get(class).map(String::as_str).unwrap_or("?");
        writeln!(writer, "Instance {} -> Classified as: {}", i, name)?;
        if class < counts.len() {
            counts[class] += 1;
        }
    }

    writeln!(writer, "\nCLASS COUNTS:")?;
    for (name, count) in classes.iter().zip(&counts) {
        if *count > 0 {
            writeln!(writer, "{}: {}", name, count)?;
        }
    }
    Ok(())
}
