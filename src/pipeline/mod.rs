//! End-to-end training pipeline: ingest, transform, train

use crate::config::{ArtifactConfig, ArtifactStatus, TrackerConfig};
use crate::data::{DataIngestion, DataSource, IngestionArtifacts, IngestionConfig};
use crate::error::{Result, ResultExt};
use crate::preprocessing::{DataTransformation, TransformationArtifacts, TransformationConfig};
use crate::tracking::ExperimentTracker;
use crate::training::{ModelReport, ModelTrainer, RegressionMetrics, Roster, TrainerConfig, TrainingOutcome};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// What a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub status: String,
    pub best_model: String,
    pub r2: f64,
    pub metrics: RegressionMetrics,
    pub report: ModelReport,
    pub raw_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub preprocessor_path: PathBuf,
    pub model_path: PathBuf,
    pub run_id: Option<String>,
    pub elapsed_secs: f64,
}

pub struct TrainingPipeline {
    ingestion: IngestionConfig,
    transformation: TransformationConfig,
    trainer: TrainerConfig,
    tracker: Option<Box<dyn ExperimentTracker>>,
}

impl TrainingPipeline {
    pub fn new(source: DataSource, artifacts: ArtifactConfig) -> Self {
        Self {
            ingestion: IngestionConfig::new(source, artifacts.clone()),
            transformation: TransformationConfig::new(artifacts.clone()),
            trainer: TrainerConfig::new(artifacts),
            tracker: None,
        }
    }

    pub fn with_ingestion(mut self, config: IngestionConfig) -> Self {
        self.ingestion = config;
        self
    }

    pub fn with_transformation(mut self, config: TransformationConfig) -> Self {
        self.transformation = config;
        self
    }

    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.trainer.roster = roster;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.trainer.threshold = threshold;
        self
    }

    pub fn with_tracker_config(mut self, tracker: TrackerConfig) -> Self {
        self.trainer.tracker = tracker;
        self
    }

    /// Log to `tracker` instead of the one `TrackerConfig` names.
    pub fn with_tracker(mut self, tracker: Box<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn artifacts(&self) -> &ArtifactConfig {
        &self.trainer.artifacts
    }

    pub fn ingest(&self) -> Result<IngestionArtifacts> {
        DataIngestion::new(self.ingestion.clone())
            .split()
            .context("data ingestion")
    }

    pub fn transform(&self, ingested: &IngestionArtifacts) -> Result<TransformationArtifacts> {
        DataTransformation::new(self.transformation.clone())
            .initiate(&ingested.train_path, &ingested.test_path)
            .context("data transformation")
    }

    pub fn train(self, transformed: &TransformationArtifacts) -> Result<TrainingOutcome> {
        let trainer = match self.tracker {
            Some(tracker) => ModelTrainer::new(self.trainer, tracker),
            None => ModelTrainer::from_config(self.trainer)?,
        }
        .with_feature_names(transformed.feature_names.clone(), transformed.target.clone());

        trainer
            .initiate(&transformed.train, &transformed.test)
            .context("model training")
    }

    /// Run every stage in order.
    pub fn start_training(self) -> Result<TrainingSummary> {
        let start = Instant::now();
        info!(artifacts = %self.artifacts().dir.display(), "Starting training pipeline");

        let ingested = self.ingest()?;
        let transformed = self.transform(&ingested)?;
        let preprocessor_path = transformed.preprocessor_path.clone();
        let outcome = self.train(&transformed)?;

        let summary = TrainingSummary {
            status: "completed".to_string(),
            best_model: outcome.best_model,
            r2: outcome.r2,
            metrics: outcome.metrics,
            report: outcome.report,
            raw_path: ingested.raw_path,
            train_path: ingested.train_path,
            test_path: ingested.test_path,
            preprocessor_path,
            model_path: outcome.model_path,
            run_id: outcome.run.map(|r| r.run_id),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            best_model = %summary.best_model,
            r2 = summary.r2,
            elapsed_secs = summary.elapsed_secs,
            "Training pipeline completed"
        );
        Ok(summary)
    }
}

/// Which pipeline artifacts exist under `artifacts`.
pub fn pipeline_status(artifacts: &ArtifactConfig) -> ArtifactStatus {
    artifacts.status()
}
