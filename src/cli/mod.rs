//! Score predictor CLI
//!
//! Command-line interface for the ingest, transform and train stages, batch
//! prediction over CSV files, the prediction service and the end-to-end run.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{ArtifactConfig, RelationalConfig, TrackerConfig};
use crate::data::{read_csv, write_csv, DataIngestion, DataSource, IngestionArtifacts, IngestionConfig};
use crate::inference::PredictionPipeline;
use crate::orchestration::ServiceSupervisor;
use crate::pipeline::{pipeline_status, TrainingPipeline, TrainingSummary};
use crate::preprocessing::{DataTransformation, TransformationConfig};
use crate::server::{run_server, ServerConfig};
use crate::training::ModelReport;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(230, 110, 110) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_missing(msg: &str) {
    println!("  {} {}", bad("✗"), msg);
}

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

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "score-predictor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Student score regression: train, track and serve")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory holding raw/train/test CSVs and the model files
    #[arg(long, global = true, env = "ARTIFACTS_DIR", default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Directory for per-run log files
    #[arg(long, global = true, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where `ingest` and `run-all` read the dataset from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// CSV dataset with a header row
    #[arg(short, long, default_value = "notebook/data/stud.csv")]
    pub data: PathBuf,

    /// Read the `DB_*` configured table instead of a CSV file
    #[arg(long, conflicts_with = "data")]
    pub from_db: bool,

    /// Fraction of rows held out for testing
    #[arg(long, default_value_t = 0.2)]
    pub test_ratio: f64,

    /// Seed of the train/test shuffle
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the dataset and write raw/train/test partitions
    Ingest {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Fit the preprocessing transform on the training partition
    Transform {
        /// Infer the feature schema from column types, predicting this column
        #[arg(long)]
        infer_target: Option<String>,
    },

    /// Transform the partitions, select a model and save it
    Train {
        /// Minimum held-out R² for the winner to be accepted
        #[arg(long, default_value_t = 0.6)]
        threshold: f64,

        /// Infer the feature schema from column types, predicting this column
        #[arg(long)]
        infer_target: Option<String>,
    },

    /// Score every row of a CSV file with the saved model
    Predict {
        /// Input CSV with one column per feature
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV; the input columns plus `prediction`
        #[arg(short, long, default_value = "predictions.csv")]
        output: PathBuf,
    },

    /// Start the prediction API
    Serve {
        /// Host to bind to
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "API_PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Show which pipeline artifacts exist
    Status,

    /// Train, start the API, check it and stop it again
    RunAll {
        #[command(flatten)]
        source: SourceArgs,

        /// Minimum held-out R² for the winner to be accepted
        #[arg(long, default_value_t = 0.6)]
        threshold: f64,

        /// Port for the supervised API
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Seconds to wait for the API to become healthy
        #[arg(long, default_value_t = 30)]
        startup_timeout: u64,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn data_source(args: &SourceArgs) -> anyhow::Result<DataSource> {
    if args.from_db {
        Ok(DataSource::Relational(RelationalConfig::from_env()?))
    } else {
        if !args.data.exists() {
            anyhow::bail!("dataset not found: {}", args.data.display());
        }
        Ok(DataSource::Csv(args.data.clone()))
    }
}

fn describe_source(source: &DataSource) -> String {
    match source {
        DataSource::Csv(path) => path.display().to_string(),
        DataSource::Relational(config) => format!("{}/{}.{}", config.host, config.database, config.table),
    }
}

fn transformation_config(artifacts: &ArtifactConfig, infer_target: Option<&str>) -> TransformationConfig {
    let config = TransformationConfig::new(artifacts.clone());
    match infer_target {
        Some(target) => config.with_inferred_schema(target),
        None => config,
    }
}

/// Partitions written by a previous `ingest`.
fn existing_partitions(artifacts: &ArtifactConfig) -> anyhow::Result<IngestionArtifacts> {
    let partitions = IngestionArtifacts {
        raw_path: artifacts.raw_path(),
        train_path: artifacts.train_path(),
        test_path: artifacts.test_path(),
    };
    if !partitions.train_path.exists() || !partitions.test_path.exists() {
        anyhow::bail!(
            "no train/test partitions under {}; run `score-predictor ingest` first",
            artifacts.dir.display()
        );
    }
    Ok(partitions)
}

fn print_report(report: &ModelReport) {
    section("Model report");
    let best = report.best().map(|e| e.name.clone());
    println!(
        "  {:<24} {:>10} {:>10}  {}",
        muted("model"),
        muted("cv r2"),
        muted("test r2"),
        muted("params")
    );
    for entry in report.entries() {
        let marker = if Some(&entry.name) == best.as_ref() { ok("★") } else { dim(" ") };
        println!(
            "{} {:<24} {:>10.4} {:>10.4}  {}",
            marker,
            entry.name,
            entry.cv_score,
            entry.test_score,
            dim(&entry.params.to_string())
        );
    }
}

fn print_summary(summary: &TrainingSummary) {
    print_report(&summary.report);
    section("Winner");
    kv("Model", &summary.best_model);
    kv("R²", &format!("{:.4}", summary.r2));
    kv("RMSE", &format!("{:.4}", summary.metrics.rmse));
    kv("MAE", &format!("{:.4}", summary.metrics.mae));
    kv("Model file", &summary.model_path.display().to_string());
    kv("Preprocessor", &summary.preprocessor_path.display().to_string());
    if let Some(run_id) = &summary.run_id {
        kv("Tracker run", run_id);
    }
    kv("Time", &format!("{:.2}s", summary.elapsed_secs));
    println!();
}

pub fn cmd_ingest(artifacts: &ArtifactConfig, args: &SourceArgs) -> anyhow::Result<()> {
    section("Ingest");

    let source = data_source(args)?;
    step_run(&format!("Reading {}", describe_source(&source)));
    let start = Instant::now();
    let config = IngestionConfig::new(source, artifacts.clone())
        .with_test_ratio(args.test_ratio)
        .with_random_seed(args.seed);
    let written = DataIngestion::new(config).split()?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Raw", &written.raw_path.display().to_string());
    kv("Train", &written.train_path.display().to_string());
    kv("Test", &written.test_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_transform(artifacts: &ArtifactConfig, infer_target: Option<&str>) -> anyhow::Result<()> {
    section("Transform");

    let partitions = existing_partitions(artifacts)?;
    step_run("Fitting preprocessing transform");
    let start = Instant::now();
    let transformed = DataTransformation::new(transformation_config(artifacts, infer_target))
        .initiate(&partitions.train_path, &partitions.test_path)?;
    step_done(&format!("{:?}", start.elapsed()));

    kv("Train array", &format!("{} × {}", transformed.train.nrows(), transformed.train.ncols()));
    kv("Test array", &format!("{} × {}", transformed.test.nrows(), transformed.test.ncols()));
    kv("Target", &transformed.target);
    kv("Preprocessor", &transformed.preprocessor_path.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_train(artifacts: &ArtifactConfig, threshold: f64, infer_target: Option<&str>) -> anyhow::Result<()> {
    section("Train");

    let partitions = existing_partitions(artifacts)?;
    let pipeline = TrainingPipeline::new(DataSource::Csv(partitions.raw_path.clone()), artifacts.clone())
        .with_transformation(transformation_config(artifacts, infer_target))
        .with_threshold(threshold)
        .with_tracker_config(TrackerConfig::from_env());

    step_run("Transforming partitions");
    let start = Instant::now();
    let transformed = pipeline.transform(&partitions)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run("Searching candidate models");
    let start = Instant::now();
    let outcome = pipeline.train(&transformed)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&outcome.report);
    section("Winner");
    kv("Model", &outcome.best_model);
    kv("R²", &format!("{:.4}", outcome.r2));
    kv("RMSE", &format!("{:.4}", outcome.metrics.rmse));
    kv("MAE", &format!("{:.4}", outcome.metrics.mae));
    kv("Model file", &outcome.model_path.display().to_string());
    if let Some(run) = &outcome.run {
        kv("Tracker run", &run.run_id);
    }
    println!();
    Ok(())
}

pub fn cmd_predict(artifacts: &ArtifactConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model and preprocessor");
    let pipeline = PredictionPipeline::load(artifacts)?;
    step_done(&pipeline.artifact().model_name);

    step_run(&format!("Scoring {}", input.display()));
    let start = Instant::now();
    let mut df = read_csv(input)?;
    let predictions = pipeline.predict(&df)?;
    df.with_column(Series::new("prediction".into(), predictions.to_vec()))?;
    write_csv(&mut df, output)?;
    step_done(&format!("{} rows in {:?}", df.height(), start.elapsed()));

    for (i, value) in predictions.iter().take(5).enumerate() {
        println!("  {:<6} {}", muted(&format!("#{}", i)), format!("{:.2}", value).white());
    }
    if predictions.len() > 5 {
        println!("  {}", dim(&format!("... {} more", predictions.len() - 5)));
    }
    kv("Output", &output.display().to_string());
    println!();
    Ok(())
}

/// Runs the API on its own runtime until ctrl-c.
pub fn cmd_serve(artifacts: &ArtifactConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let config = ServerConfig {
        host: host.to_string(),
        port,
        artifacts: artifacts.clone(),
    };

    section("Server");
    kv("Address", &format!("http://{}:{}", host, port));
    kv("Artifacts", &artifacts.dir.display().to_string());
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run_server(config))
}

pub fn cmd_status(artifacts: &ArtifactConfig) -> anyhow::Result<()> {
    section("Pipeline status");
    kv("Artifacts", &artifacts.dir.display().to_string());

    let status = pipeline_status(artifacts);
    let rows = [
        ("raw data", status.raw_data, artifacts.raw_path()),
        ("train data", status.train_data, artifacts.train_path()),
        ("test data", status.test_data, artifacts.test_path()),
        ("preprocessor", status.preprocessor, artifacts.preprocessor_path()),
        ("model", status.model, artifacts.model_path()),
    ];
    for (label, present, path) in rows {
        let line = format!("{:<14} {}", label, dim(&path.display().to_string()));
        if present {
            step_ok(&line);
        } else {
            step_missing(&line);
        }
    }

    println!();
    if status.ready_for_serving() {
        println!("  {}", ok("ready to serve predictions"));
    } else {
        println!("  {}", muted("not ready to serve; run `score-predictor train`"));
    }
    println!();
    Ok(())
}

pub fn cmd_run_all(
    artifacts: &ArtifactConfig,
    args: &SourceArgs,
    threshold: f64,
    port: u16,
    startup_timeout: u64,
) -> anyhow::Result<()> {
    section("Training pipeline");

    let source = data_source(args)?;
    step_run(&format!("Training on {}", describe_source(&source)));
    let ingestion = IngestionConfig::new(source.clone(), artifacts.clone())
        .with_test_ratio(args.test_ratio)
        .with_random_seed(args.seed);
    let summary = TrainingPipeline::new(source, artifacts.clone())
        .with_ingestion(ingestion)
        .with_threshold(threshold)
        .with_tracker_config(TrackerConfig::from_env())
        .start_training()?;
    step_done(&format!("{:.2}s", summary.elapsed_secs));
    print_summary(&summary);

    section("Prediction service");
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        artifacts: artifacts.clone(),
    };
    let mut supervisor =
        ServiceSupervisor::for_current_exe(&config)?.with_startup_timeout(Duration::from_secs(startup_timeout));

    step_run(&format!("Starting API on {}", supervisor.base_url()));
    let start = Instant::now();
    supervisor.start()?;
    step_done(&format!("{:?}", start.elapsed()));

    let health = supervisor.get_json("/health")?;
    step_ok(&format!("health: {}", health["status"].as_str().unwrap_or("unknown")));

    let info = supervisor.get_json("/model-info")?;
    kv("Model", info["model_name"].as_str().unwrap_or("unknown"));
    kv("Trained at", info["trained_at"].as_str().unwrap_or("unknown"));
    if let Some(features) = info["features"].as_array() {
        kv("Features", &features.len().to_string());
    }

    step_run("Stopping API");
    supervisor.stop()?;
    step_done("");
    println!();
    Ok(())
}
