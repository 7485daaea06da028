//! File-backed experiment store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<experiment>/<run_id>/meta.json
//! <root>/<experiment>/<run_id>/artifacts/model/model.pkl
//! ```

use super::{ExperimentTracker, RunInfo, RunRecord, MODEL_ARTIFACT_NAME};
use crate::error::{Result, ScoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_EXPERIMENT: &str = "Default";

/// Contents of a run's `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub run_name: String,
    pub experiment: String,
    pub start_time: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

/// Tracker writing one directory per run. Registry requests are ignored
/// since a file store has no model registry.
#[derive(Debug, Clone)]
pub struct FileTracker {
    base_dir: PathBuf,
    experiment: String,
}

impl FileTracker {
    pub fn new(base_dir: impl Into<PathBuf>, experiment: Option<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            experiment: experiment.unwrap_or_else(|| DEFAULT_EXPERIMENT.to_string()),
        }
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.base_dir.join(&self.experiment)
    }

    /// Metadata of every run in this tracker's experiment, oldest first.
    pub fn list_runs(&self) -> Result<Vec<RunMeta>> {
        let dir = self.experiment_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let meta_path = entry?.path().join("meta.json");
            if meta_path.is_file() {
                let contents = fs::read_to_string(&meta_path)?;
                runs.push(serde_json::from_str::<RunMeta>(&contents)?);
            }
        }
        runs.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(runs)
    }

    fn write_meta(path: &Path, meta: &RunMeta) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, meta)?;
        writer.flush()?;
        Ok(())
    }
}

impl ExperimentTracker for FileTracker {
    fn log_run(&self, run: &RunRecord) -> Result<RunInfo> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let run_dir = self.experiment_dir().join(&run_id);
        let model_dir = run_dir.join("artifacts").join("model");
        fs::create_dir_all(&model_dir).map_err(|e| {
            ScoreError::TrackingError(format!("failed to create run directory {}: {}", run_dir.display(), e))
        })?;

        fs::write(model_dir.join(MODEL_ARTIFACT_NAME), &run.model_artifact)?;

        let meta = RunMeta {
            run_id: run_id.clone(),
            run_name: run.run_name.clone(),
            experiment: self.experiment.clone(),
            start_time: chrono::Utc::now().to_rfc3339(),
            params: run
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metrics: run.metrics.iter().cloned().collect(),
            artifacts: vec![format!("model/{}", MODEL_ARTIFACT_NAME)],
        };
        Self::write_meta(&run_dir.join("meta.json"), &meta)?;

        if let Some(name) = &run.registered_model_name {
            debug!(model = %name, "file store has no registry, model not registered");
        }
        info!(run_id = %run_id, dir = %run_dir.display(), "Logged run to file store");

        Ok(RunInfo {
            run_id,
            location: run_dir.display().to_string(),
            model_version: None,
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.base_dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::params::Params;

    #[test]
    fn test_log_run_writes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::new(dir.path(), Some("scores".to_string()));
        let run = RunRecord {
            run_name: "Random Forest".to_string(),
            params: Params::new().with("n_estimators", 64i64),
            metrics: vec![("rmse".to_string(), 5.2), ("r2".to_string(), 0.85), ("mae".to_string(), 4.1)],
            model_artifact: vec![7; 16],
            registered_model_name: None,
        };

        let info = tracker.log_run(&run).unwrap();
        let run_dir = dir.path().join("scores").join(&info.run_id);
        assert_eq!(
            fs::read(run_dir.join("artifacts/model/model.pkl")).unwrap(),
            vec![7; 16]
        );

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_name, "Random Forest");
        assert_eq!(runs[0].params.get("n_estimators").map(String::as_str), Some("64"));
        assert_eq!(runs[0].metrics.get("mae"), Some(&4.1));
    }

    #[test]
    fn test_list_runs_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::new(dir.path().join("missing"), None);
        assert!(tracker.list_runs().unwrap().is_empty());
        assert!(tracker.experiment_dir().ends_with(DEFAULT_EXPERIMENT));
    }
}
