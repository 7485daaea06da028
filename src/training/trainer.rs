//! Model selection over a roster of candidates
//!
//! Every candidate is tuned by grid search on the training split, refitted,
//! and scored on the held-out split. The best held-out R² wins (earlier
//! candidates win ties); a winner under the acceptance threshold aborts the
//! run before anything is logged or written.

use super::cross_validation::KFold;
use super::estimator::{Estimator, ModelKind, Regressor};
use super::grid_search::GridSearchCV;
use super::metrics::{r2_score, RegressionMetrics};
use super::params::Params;
use super::roster::{default_roster, Roster};
use crate::config::{ArtifactConfig, TrackerConfig};
use crate::error::{Result, ResultExt, ScoreError};
use crate::persistence;
use crate::tracking::{tracker_for, ExperimentTracker, RunInfo, RunRecord};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Artifact kind recorded in the model file envelope.
pub const MODEL_KIND: &str = "Model";

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub roster: Roster,
    pub cv_folds: usize,
    /// Minimum held-out R² for the winner to be accepted
    pub threshold: f64,
    pub random_state: u64,
    pub registered_model_name: String,
    pub artifacts: ArtifactConfig,
    pub tracker: TrackerConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            cv_folds: 3,
            threshold: 0.6,
            random_state: 42,
            registered_model_name: "StudentScorePredictor".to_string(),
            artifacts: ArtifactConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn new(artifacts: ArtifactConfig) -> Self {
        Self {
            artifacts,
            ..Self::default()
        }
    }

    pub fn with_roster(mut self, roster: Roster) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }
}

/// One candidate's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub kind: ModelKind,
    /// Tuned hyperparameters
    pub params: Params,
    /// Mean in-fold R² of the tuned parameters
    pub cv_score: f64,
    /// Held-out R²
    pub test_score: f64,
}

/// Per-candidate results in roster order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    entries: Vec<ReportEntry>,
}

impl ModelReport {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest held-out score; the earliest entry wins ties and NaN never wins.
    pub fn best(&self) -> Option<&ReportEntry> {
        self.best_index().map(|i| &self.entries[i])
    }

    fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.test_score.is_nan() {
                continue;
            }
            if best.map_or(true, |b| entry.test_score > self.entries[b].test_score) {
                best = Some(i);
            }
        }
        best
    }

    fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }
}

/// The persisted winner: fitted model plus the metadata served by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    pub model: Estimator,
    pub model_name: String,
    pub params: Params,
    pub metrics: RegressionMetrics,
    /// RFC 3339 timestamp
    pub trained_at: String,
    /// Names of the transformed model inputs, in column order
    pub feature_names: Vec<String>,
    pub target: String,
}

impl TrainedArtifact {
    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.feature_names.is_empty() && x.ncols() != self.feature_names.len() {
            return Err(ScoreError::ShapeError {
                expected: format!("{} features", self.feature_names.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        self.model.predict(x)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save_object(path, MODEL_KIND, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        persistence::load_object(path, MODEL_KIND)
    }
}

/// Result of an accepted training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub best_model: String,
    pub r2: f64,
    pub metrics: RegressionMetrics,
    pub report: ModelReport,
    pub model_path: PathBuf,
    /// Tracker run, when logging succeeded
    pub run: Option<RunInfo>,
}

pub struct ModelTrainer {
    config: TrainerConfig,
    tracker: Box<dyn ExperimentTracker>,
    feature_names: Vec<String>,
    target: String,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig, tracker: Box<dyn ExperimentTracker>) -> Self {
        Self {
            config,
            tracker,
            feature_names: Vec::new(),
            target: "target".to_string(),
        }
    }

    /// Trainer logging to the tracker named by `config.tracker`.
    pub fn from_config(config: TrainerConfig) -> Result<Self> {
        let tracker = tracker_for(&config.tracker)?;
        Ok(Self::new(config, tracker))
    }

    /// Column names recorded in the artifact for the model inputs and target.
    pub fn with_feature_names(mut self, feature_names: Vec<String>, target: impl Into<String>) -> Self {
        self.feature_names = feature_names;
        self.target = target.into();
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Tune and score every candidate without selecting or persisting.
    pub fn evaluate(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<ModelReport> {
        Ok(self.evaluate_candidates(train, test)?.0)
    }

    /// Select, log and persist the best model. `train` and `test` hold the
    /// transformed features with the target as their final column.
    pub fn initiate(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<TrainingOutcome> {
        let (report, fitted) = self.evaluate_candidates(train, test)?;

        let best_idx = report.best_index().ok_or_else(|| {
            ScoreError::TrainingError("no candidate produced a finite held-out score".to_string())
        })?;
        let best = report.entries[best_idx].clone();

        if best.test_score < self.config.threshold {
            return Err(ScoreError::ModelBelowThreshold {
                model: best.name,
                score: best.test_score,
                threshold: self.config.threshold,
            });
        }
        info!(model = %best.name, r2 = best.test_score, params = %best.params, "Selected best model");

        let (_, y_test) = split_target(test)?;
        let (model, predictions) = fitted
            .into_iter()
            .nth(best_idx)
            .ok_or_else(|| ScoreError::TrainingError("winning model missing".to_string()))?;
        let metrics = RegressionMetrics::compute(&y_test, &predictions)?;

        let artifact = TrainedArtifact {
            model,
            model_name: best.name.clone(),
            params: best.params.clone(),
            metrics,
            trained_at: chrono::Utc::now().to_rfc3339(),
            feature_names: self.feature_names.clone(),
            target: self.target.clone(),
        };

        let run = self.log_to_tracker(&artifact);

        let model_path = self.config.artifacts.model_path();
        artifact.save(&model_path).context("saving trained model")?;
        info!(path = %model_path.display(), "Saved trained model");

        Ok(TrainingOutcome {
            best_model: best.name,
            r2: best.test_score,
            metrics,
            report,
            model_path,
            run,
        })
    }

    fn evaluate_candidates(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
    ) -> Result<(ModelReport, Vec<(Estimator, Array1<f64>)>)> {
        let (x_train, y_train) = split_target(train)?;
        let (x_test, y_test) = split_target(test)?;
        if x_train.ncols() != x_test.ncols() {
            return Err(ScoreError::ShapeError {
                expected: format!("{} test features", x_train.ncols()),
                actual: format!("{} test features", x_test.ncols()),
            });
        }

        let mut report = ModelReport::default();
        let mut fitted = Vec::with_capacity(self.config.roster.len());

        for candidate in self.config.roster.candidates() {
            let start = Instant::now();
            let search = GridSearchCV::new(candidate.kind, candidate.grid.clone())
                .with_cv(KFold::new(self.config.cv_folds))
                .with_random_state(self.config.random_state)
                .fit(&x_train, &y_train)
                .context(format!("grid search for {}", candidate.name))?;

            let predictions = search.best_estimator.predict(&x_test)?;
            let test_score = r2_score(&y_test, &predictions)?;
            info!(
                model = %candidate.name,
                params = %search.best_params,
                cv_score = search.best_score,
                test_score,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Evaluated candidate"
            );

            report.push(ReportEntry {
                name: candidate.name.clone(),
                kind: candidate.kind,
                params: search.best_params,
                cv_score: search.best_score,
                test_score,
            });
            fitted.push((search.best_estimator, predictions));
        }

        Ok((report, fitted))
    }

    fn log_to_tracker(&self, artifact: &TrainedArtifact) -> Option<RunInfo> {
        let model_artifact = match persistence::to_bytes(MODEL_KIND, artifact) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Could not serialize model for the tracker");
                return None;
            }
        };

        let record = RunRecord {
            run_name: artifact.model_name.clone(),
            params: artifact.params.clone(),
            metrics: vec![
                ("rmse".to_string(), artifact.metrics.rmse),
                ("r2".to_string(), artifact.metrics.r2),
                ("mae".to_string(), artifact.metrics.mae),
            ],
            model_artifact,
            registered_model_name: self
                .config
                .tracker
                .supports_registry()
                .then(|| self.config.registered_model_name.clone()),
        };

        match self.tracker.log_run(&record) {
            Ok(run) => Some(run),
            Err(e) => {
                warn!(tracker = %self.tracker.describe(), error = %e, "Experiment tracking failed");
                None
            }
        }
    }
}

/// Split an array whose final column is the target.
pub fn split_target(data: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    if data.ncols() < 2 || data.nrows() == 0 {
        return Err(ScoreError::ShapeError {
            expected: "at least one row, one feature and the target column".to_string(),
            actual: format!("{}x{}", data.nrows(), data.ncols()),
        });
    }
    let last = data.ncols() - 1;
    Ok((data.slice(s![.., ..last]).to_owned(), data.column(last).to_owned()))
}
