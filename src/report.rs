//! Plain-text reports for the CLI
//!
//! Every renderer prints fixed-width columns to stdout so runs can be
//! compared across seeds with a diff. Logging goes to stderr, reports
//! go here.

use crate::data::{BowDataset, RejectionSummary};
use crate::ml::{Evaluation, PointResult, ScoreSummary};
use crate::nlp::Vocabulary;
use crate::pipeline::SeedRun;
use chrono::{DateTime, Utc};

/// Opening banner with the run timestamp. Returns the start time so the
/// closing footer can report elapsed wall time.
pub fn run_banner(title: &str) -> DateTime<Utc> {
    let started = Utc::now();
    println!("\n{}", "=".repeat(60));
    println!("  {}", title);
    println!("  {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("{}", "=".repeat(60));
    started
}

/// Closing line with the finish timestamp and the elapsed wall time.
pub fn run_footer(started: DateTime<Utc>) {
    let finished = Utc::now();
    let elapsed = (finished - started).num_milliseconds() as f64 / 1000.0;
    println!(
        "\nFinished at {} ({:.1} s elapsed)",
        finished.format("%Y-%m-%d %H:%M:%S UTC"),
        elapsed
    );
}

pub fn section(title: &str) {
    println!("\n=== {} ===\n", title);
}

/// Row-level outcome of loading a raw export.
pub fn load_summary(summary: &RejectionSummary) {
    section("Input Summary");
    println!("Rows read        {:>8}", summary.total);
    println!("Records kept     {:>8}", summary.kept);
    println!("Malformed rows   {:>8}", summary.malformed);
    println!("Unmapped labels  {:>8}", summary.unmapped);
}

/// Class densities with percentages, one row per category.
pub fn class_distribution(classes: &[String], counts: &[usize]) {
    let total: usize = counts.iter().sum();

    section("Class Distribution");
    println!("{:<28} {:>6} {:>8}", "Class", "Count", "Share");
    println!("{:-<44}", "");
    for (class, &count) in classes.iter().zip(counts) {
        let share = if total == 0 {
            0.0
        } else {
            100.0 * count as f64 / total as f64
        };
        println!("{:<28} {:>6} {:>7.1}%", class, count, share);
    }
    println!("{:-<44}", "");
    println!("{:<28} {:>6}", "Total", total);
}

/// Vocabulary size and the most frequent tokens by document count.
pub fn vocabulary_summary(vocab: &Vocabulary, top: usize) {
    section("Vocabulary");
    println!("Tokens     {:>8}", vocab.len());
    println!("Documents  {:>8}", vocab.n_docs());

    let mut entries: Vec<_> = vocab.entries().iter().collect();
    entries.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then(a.token.cmp(&b.token)));

    println!("\n{:<24} {:>6} {:>10}", "Token", "Docs", "Info Gain");
    println!("{:-<42}", "");
    for entry in entries.iter().take(top) {
        match entry.score {
            Some(score) => println!("{:<24} {:>6} {:>10.4}", entry.token, entry.doc_count, score),
            None => println!("{:<24} {:>6} {:>10}", entry.token, entry.doc_count, "-"),
        }
    }
}

/// One-line shape summary plus per-class sample counts.
pub fn dataset_summary(name: &str, data: &BowDataset) {
    println!(
        "\n{}: {} samples, {} features",
        name,
        data.n_samples(),
        data.n_features()
    );
    for (class, count) in data.classes.iter().zip(data.class_counts()) {
        println!("  {:<28} {:>6}", class, count);
    }
}

/// Full evaluation block: summary statistics, per-class accuracy table
/// and the labeled confusion matrix.
pub fn evaluation_report(eval: &Evaluation) {
    print!("{}", evaluation_text(eval));
}

/// The evaluation block as one string, shared by stdout reporting and
/// the stats file `train` can write.
pub fn evaluation_text(eval: &Evaluation) -> String {
    let n = eval.n_samples();
    let correct = eval.n_correct();
    let incorrect = n - correct;
    let pct = |count: usize| {
        if n == 0 {
            0.0
        } else {
            100.0 * count as f64 / n as f64
        }
    };

    let mut out = String::from("\n=== Evaluation Summary ===\n\n");
    out.push_str(&format!(
        "Correctly classified    {:>8}    {:>8.4} %\n",
        correct,
        pct(correct)
    ));
    out.push_str(&format!(
        "Incorrectly classified  {:>8}    {:>8.4} %\n",
        incorrect,
        pct(incorrect)
    ));
    out.push_str(&format!("Kappa statistic         {:>8.4}\n", eval.kappa()));
    out.push_str(&format!("Total instances         {:>8}\n", n));

    out.push_str("\n=== Accuracy By Class ===\n\n");
    out.push_str(&format!(
        "{:<14} {:>8} {:>8} {:>10} {:>8} {:>10} {:>9} {:>9}  Class\n",
        "", "TP Rate", "FP Rate", "Precision", "Recall", "F-Measure", "ROC Area", "PRC Area"
    ));
    for (class, name) in eval.classes().iter().enumerate() {
        let m = eval.class_metrics(class);
        out.push_str(&format!(
            "{:<14} {:>8.3} {:>8.3} {:>10.3} {:>8.3} {:>10.3} {:>9} {:>9}  {}\n",
            "",
            m.recall,
            m.fp_rate,
            m.precision,
            m.recall,
            m.f1,
            area(m.roc_auc),
            area(m.pr_auc),
            name
        ));
    }
    out.push_str(&format!(
        "{:<14} {:>8.3} {:>8.3} {:>10.3} {:>8.3} {:>10.3} {:>9} {:>9}\n",
        "Weighted Avg.",
        eval.weighted_recall(),
        weighted_fp_rate(eval),
        eval.weighted_precision(),
        eval.weighted_recall(),
        eval.weighted_f1(),
        area(eval.weighted_roc_auc()),
        area(eval.weighted_pr_auc())
    ));

    out.push_str(&confusion_text(eval));
    out
}

fn weighted_fp_rate(eval: &Evaluation) -> f64 {
    let n = eval.n_samples();
    if n == 0 {
        return 0.0;
    }
    (0..eval.classes().len())
        .map(|class| eval.class_metrics(class).fp_rate * eval.support(class) as f64)
        .sum::<f64>()
        / n as f64
}

/// Letter-keyed confusion matrix, rows are actual classes and columns
/// are predictions.
pub fn confusion_matrix(eval: &Evaluation) {
    print!("{}", confusion_text(eval));
}

fn confusion_text(eval: &Evaluation) -> String {
    let width = eval
        .confusion()
        .iter()
        .flatten()
        .map(|count| count.to_string().len())
        .max()
        .unwrap_or(1)
        .max(3);

    let mut out = String::from("\n=== Confusion Matrix ===\n\n");
    let mut header = String::new();
    for class in 0..eval.classes().len() {
        header.push_str(&format!(" {:>w$}", class_key(class), w = width));
    }
    out.push_str(&format!("{}   <-- classified as\n", header));

    for (actual, row) in eval.confusion().iter().enumerate() {
        let mut line = String::new();
        for &count in row {
            line.push_str(&format!(" {:>w$}", count, w = width));
        }
        out.push_str(&format!(
            "{} | {} = {}\n",
            line,
            class_key(actual),
            eval.classes()[actual]
        ));
    }
    out
}

/// Per-point score table from a finished grid search.
pub fn grid_results(results: &[PointResult]) {
    section("Grid Search Results");
    println!("{:<44} {:>10}", "Parameters", "Accuracy");
    println!("{:-<55}", "");
    for result in results {
        if result.failed {
            println!("{:<44} {:>10}", result.point.to_string(), "failed");
        } else {
            println!("{:<44} {:>10.4}", result.point.to_string(), result.score);
        }
    }
}

/// Per-seed metric table plus mean and standard deviation aggregates.
pub fn experiment_report(runs: &[SeedRun]) {
    section("Per-Seed Results");
    println!(
        "{:>6} {:>10} {:>10} {:>10} {:>10} {:>9} {:>9}  Winner",
        "Seed", "Accuracy", "Precision", "Recall", "F-Measure", "ROC Area", "PRC Area"
    );
    println!("{:-<80}", "");
    for run in runs {
        println!(
            "{:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>9} {:>9}  {}",
            run.seed,
            run.accuracy,
            run.precision,
            run.recall,
            run.f1,
            area(run.roc_auc),
            area(run.pr_auc),
            run.winner
        );
    }

    section("Aggregate");
    metric_row("Accuracy", runs.iter().map(|r| r.accuracy).collect());
    metric_row("Precision", runs.iter().map(|r| r.precision).collect());
    metric_row("Recall", runs.iter().map(|r| r.recall).collect());
    metric_row("F-Measure", runs.iter().map(|r| r.f1).collect());
    metric_row("ROC Area", runs.iter().filter_map(|r| r.roc_auc).collect());
    metric_row("PRC Area", runs.iter().filter_map(|r| r.pr_auc).collect());

    if let Some(best) = runs.iter().max_by(|a, b| a.accuracy.total_cmp(&b.accuracy)) {
        println!(
            "\nBest seed: {} (accuracy {:.4}, {})",
            best.seed, best.accuracy, best.winner
        );
    }
}

fn metric_row(name: &str, values: Vec<f64>) {
    if values.is_empty() {
        println!("{:<12} {:>10}", name, "?");
    } else {
        println!("{:<12} {}", name, ScoreSummary::from_values(values));
    }
}

/// Per-seed cross-validation metric table, fold-averaged, plus the
/// across-seed aggregates.
pub fn baseline_report(seed_evals: &[(u64, Vec<Evaluation>)]) {
    section("Cross-Validation Results");
    println!(
        "{:>6} {:>10} {:>10} {:>10} {:>10}",
        "Seed", "Accuracy", "Precision", "Recall", "F-Measure"
    );
    println!("{:-<50}", "");

    let mut accuracies = Vec::new();
    let mut precisions = Vec::new();
    let mut recalls = Vec::new();
    let mut f1s = Vec::new();
    for (seed, evals) in seed_evals {
        let accuracy = fold_mean(evals, Evaluation::accuracy);
        let precision = fold_mean(evals, Evaluation::weighted_precision);
        let recall = fold_mean(evals, Evaluation::weighted_recall);
        let f1 = fold_mean(evals, Evaluation::weighted_f1);
        println!(
            "{:>6} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            seed, accuracy, precision, recall, f1
        );
        accuracies.push(accuracy);
        precisions.push(precision);
        recalls.push(recall);
        f1s.push(f1);
    }

    if seed_evals.len() > 1 {
        section("Aggregate");
        metric_row("Accuracy", accuracies);
        metric_row("Precision", precisions);
        metric_row("Recall", recalls);
        metric_row("F-Measure", f1s);
    }
}

fn fold_mean(evals: &[Evaluation], metric: impl Fn(&Evaluation) -> f64) -> f64 {
    if evals.is_empty() {
        return 0.0;
    }
    evals.iter().map(metric).sum::<f64>() / evals.len() as f64
}

/// Per-record predictions (first few) and predicted-class counts.
pub fn classification_report(classes: &[String], predictions: &[usize]) {
    const PREVIEW: usize = 20;

    section("Classifications");
    for (i, &class) in predictions.iter().take(PREVIEW).enumerate() {
        let name = classes.get(class).map(String::as_str).unwrap_or("?");
        println!("Instance {:>5} -> Classified as: {}", i, name);
    }
    if predictions.len() > PREVIEW {
        println!("... {} more", predictions.len() - PREVIEW);
    }

    let mut counts = vec![0usize; classes.len()];
    for &class in predictions {
        if class < counts.len() {
            counts[class] += 1;
        }
    }
    class_distribution(classes, &counts);
}

fn area(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.3}", v),
        None => "?".to_string(),
    }
}

// Row keys a..z, then aa, ab, ...
fn class_key(index: usize) -> String {
    if index < 26 {
        ((b'a' + index as u8) as char).to_string()
    } else {
        let first = (b'a' + (index / 26 - 1) as u8) as char;
        let second = (b'a' + (index % 26) as u8) as char;
        format!("{}{}", first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_keys_follow_letter_sequence() {
        assert_eq!(class_key(0), "a");
        assert_eq!(class_key(11), "l");
        assert_eq!(class_key(25), "z");
        assert_eq!(class_key(26), "aa");
        assert_eq!(class_key(27), "ab");
    }

    #[test]
    fn area_formats_missing_as_question_mark() {
        assert_eq!(area(Some(0.75)), "0.750");
        assert_eq!(area(None), "?");
    }

    #[test]
    fn evaluation_text_contains_all_sections() {
        let eval = Evaluation::from_predictions(
            vec!["A".to_string(), "B".to_string()],
            &[0, 1, 1],
            &[0, 1, 0],
        );
        let text = evaluation_text(&eval);

        assert!(text.contains("=== Evaluation Summary ==="));
        assert!(text.contains("Kappa statistic"));
        assert!(text.contains("Weighted Avg."));
        assert!(text.contains("<-- classified as"));
        assert!(text.contains("a = A"));
        assert!(text.contains("b = B"));
    }
}
