//! Experiment tracking
//!
//! A training run is reported to a tracker as one record: the winning
//! model's tuned parameters, its held-out metrics and the serialized model.
//! Networked trackers speak the MLflow REST API ([`MlflowTracker`]); `file:`
//! URIs are handled by [`FileTracker`], which writes local run directories.

mod mlflow;
mod storage;

pub use mlflow::MlflowTracker;
pub use storage::{FileTracker, RunMeta};

use crate::config::TrackerConfig;
use crate::error::{Result, ScoreError};
use crate::training::params::Params;
use std::sync::{Arc, Mutex};

/// File name the model artifact is logged under, inside the run's `model/`
/// artifact directory.
pub const MODEL_ARTIFACT_NAME: &str = "model.pkl";

/// Everything logged for one training invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_name: String,
    pub params: Params,
    /// Metric name and value, logged in order.
    pub metrics: Vec<(String, f64)>,
    pub model_artifact: Vec<u8>,
    /// Registry name; only set when the tracker has a model registry.
    pub registered_model_name: Option<String>,
}

impl RunRecord {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|(k, _)| k == name).map(|(_, v)| *v)
    }
}

/// Where a logged run ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub run_id: String,
    /// Run directory or artifact URI
    pub location: String,
    pub model_version: Option<String>,
}

pub trait ExperimentTracker: Send + Sync {
    fn log_run(&self, run: &RunRecord) -> Result<RunInfo>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// The tracker a URI calls for: a local store for `file:` URIs and bare
/// paths, the REST client for `http(s)`. Other schemes are rejected.
pub fn tracker_for(config: &TrackerConfig) -> Result<Box<dyn ExperimentTracker>> {
    match config.scheme().as_str() {
        "http" | "https" => Ok(Box::new(MlflowTracker::new(config.clone())?)),
        "file" => Ok(Box::new(FileTracker::new(
            config.local_root()?,
            config.experiment_name.clone(),
        ))),
        other => Err(ScoreError::ConfigError(format!(
            "unsupported tracking URI scheme '{}' in '{}'; use file: or http(s)",
            other, config.uri
        ))),
    }
}

/// In-memory tracker that keeps every record it is handed. Clones share the
/// same record list.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracker {
    runs: Arc<Mutex<Vec<RunRecord>>>,
    fail: bool,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose every call fails, leaving the record list empty.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        match self.runs.lock() {
            Ok(runs) => runs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ExperimentTracker for RecordingTracker {
    fn log_run(&self, run: &RunRecord) -> Result<RunInfo> {
        if self.fail {
            return Err(ScoreError::TrackingError("tracking server unavailable".to_string()));
        }
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| ScoreError::TrackingError("run list poisoned".to_string()))?;
        runs.push(run.clone());
        Ok(RunInfo {
            run_id: format!("run-{}", runs.len()),
            location: "memory".to_string(),
            model_version: run.registered_model_name.as_ref().map(|_| runs.len().to_string()),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
