//! stacking-cv CLI Module
//!
//! Command-line interface for evaluating stacking ensembles and inspecting
//! their parameter maps.

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::*;
use ndarray::Axis;
use std::path::PathBuf;
use std::time::Instant;

use crate::ensemble::{StackingConfig, StackingCvClassifier};
use crate::training::{
    cross_val_score, Classifier, DecisionTree, GaussianNaiveBayes, KNNClassifier,
    LogisticRegression, RandomForest, StratifiedKFold,
};
use crate::utils::datasets::{load_csv, load_iris, Dataset};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "stacking-cv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stacked cross-validated ensemble classifier")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cross-validated accuracy of a stacking ensemble
    Evaluate(EvaluateArgs),

    /// Print the ensemble's parameter map as JSON
    Params(ParamsArgs),
}

/// Learner selection shared by every command
#[derive(Args, Debug, Clone)]
pub struct EnsembleArgs {
    /// Base classifiers, comma separated (random_forest, naive_bayes, logistic, knn, decision_tree)
    #[arg(short, long, default_value = "random_forest,naive_bayes")]
    pub classifiers: String,

    /// Meta classifier
    #[arg(short, long, default_value = "logistic")]
    pub meta: String,

    /// Ensemble configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seed for randomized learners, and for fold shuffling unless the config sets one
    #[arg(long, default_value = "123")]
    pub seed: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ParamsArgs {
    #[command(flatten)]
    pub ensemble: EnsembleArgs,

    /// List only top-level parameters
    #[arg(long)]
    pub shallow: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub ensemble: EnsembleArgs,

    /// Numeric CSV file; the embedded Iris data is used when omitted
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Label column of the CSV file
    #[arg(short, long, default_value = "target")]
    pub target: String,

    /// Feature column indices to keep, comma separated
    #[arg(long)]
    pub columns: Option<String>,

    /// Folds of the outer evaluation
    #[arg(long, default_value = "5")]
    pub folds: usize,

    /// Use class probabilities as meta-features
    #[arg(long)]
    pub use_probas: bool,

    /// Pass the raw features to the meta classifier too
    #[arg(long)]
    pub features_in_secondary: bool,

    /// Worker threads for fold tasks (0 = all cores)
    #[arg(long)]
    pub n_jobs: Option<usize>,

    /// Progress logging (-v per classifier, -vv per fold)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

// ─── Ensemble construction ─────────────────────────────────────────────────────

/// Classifier for a CLI name
pub fn build_classifier(name: &str, seed: u64) -> anyhow::Result<Box<dyn Classifier>> {
    let clf: Box<dyn Classifier> = match name.trim() {
        "random_forest" | "rf" | "randomforestclassifier" => {
            Box::new(RandomForest::default().with_random_state(seed))
        }
        "naive_bayes" | "gnb" | "gaussiannb" => Box::new(GaussianNaiveBayes::new()),
        "logistic" | "logistic_regression" | "logisticregression" => {
            Box::new(LogisticRegression::new())
        }
        "knn" | "kneighborsclassifier" => Box::new(KNNClassifier::default()),
        "decision_tree" | "tree" | "decisiontreeclassifier" => {
            Box::new(DecisionTree::new_classifier().with_random_state(seed))
        }
        other => anyhow::bail!("Unknown classifier: {}", other),
    };
    Ok(clf)
}

/// Parse `"1,2"` into column indices
pub fn parse_columns(list: &str) -> anyhow::Result<Vec<usize>> {
    list.split(',')
        .map(|c| {
            c.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid column index: {:?}", c))
        })
        .collect()
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StackingConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(StackingConfig::from_json(&json)?)
        }
        None => Ok(StackingConfig::default()),
    }
}

/// Config file settings with the evaluate flags applied on top
fn evaluate_config(args: &EvaluateArgs) -> anyhow::Result<StackingConfig> {
    let mut config = load_config(args.ensemble.config.as_ref())?;
    config.use_probas |= args.use_probas;
    config.use_features_in_secondary |= args.features_in_secondary;
    if args.n_jobs.is_some() {
        config.n_jobs = args.n_jobs;
    }
    if config.random_state.is_none() {
        config.random_state = Some(args.ensemble.seed);
    }
    config.verbose = config.verbose.max(args.verbose);
    Ok(config)
}

pub fn build_ensemble(
    args: &EnsembleArgs,
    config: StackingConfig,
) -> anyhow::Result<StackingCvClassifier> {
    let classifiers = args
        .classifiers
        .split(',')
        .map(|name| build_classifier(name, args.seed))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let meta = build_classifier(&args.meta, args.seed)?;
    Ok(StackingCvClassifier::new(classifiers, meta).with_config(config))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_evaluate(args: &EvaluateArgs) -> anyhow::Result<()> {
    section("Evaluate");

    step_run("Loading data");
    let start = Instant::now();
    let mut dataset: Dataset = match &args.data {
        Some(path) => load_csv(path, &args.target)?,
        None => load_iris()?,
    };
    if let Some(list) = &args.columns {
        let columns = parse_columns(list)?;
        if let Some(&bad) = columns.iter().find(|&&c| c >= dataset.data.ncols()) {
            anyhow::bail!("Column {} out of range ({} features)", bad, dataset.data.ncols());
        }
        dataset.data = dataset.data.select(Axis(1), &columns);
        dataset.feature_names = columns.iter().map(|&c| dataset.feature_names[c].clone()).collect();
    }
    step_done(&format!(
        "{} rows × {} features in {:?}",
        dataset.data.nrows(),
        dataset.data.ncols(),
        start.elapsed()
    ));

    let sclf = build_ensemble(&args.ensemble, evaluate_config(args)?)?;

    kv("Classifiers", &args.ensemble.classifiers);
    kv("Meta classifier", &args.ensemble.meta);
    kv("Inner folds", &sclf.config().cv.n_splits().to_string());
    kv("Outer folds", &args.folds.to_string());

    step_run("Cross-validating");
    let start = Instant::now();
    let results = cross_val_score(
        &sclf,
        &dataset.data,
        &dataset.target,
        &StratifiedKFold::new(args.folds),
    )?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<8} {:>10}", muted("Fold"), muted("Accuracy"));
    println!("  {}", dim(&"─".repeat(20)));
    for (i, score) in results.scores.iter().enumerate() {
        println!("  {:<8} {:>10.4}", i + 1, score);
    }
    println!("  {}", dim(&"─".repeat(20)));
    println!(
        "  {} {} {}",
        ok("mean"),
        format!("{:.4}", results.mean_score).as_str().white().bold(),
        muted(&format!("± {:.4}", results.std_score))
    );
    println!();

    Ok(())
}

pub fn cmd_params(args: &ParamsArgs) -> anyhow::Result<()> {
    let config = load_config(args.ensemble.config.as_ref())?;
    let sclf = build_ensemble(&args.ensemble, config)?;
    let params = sclf.get_params(!args.shallow);
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}
