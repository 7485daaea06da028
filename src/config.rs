//! Shared configuration objects
//!
//! Every component receives its configuration explicitly at construction.
//! The `from_env` constructors are meant for the binary edge only; library
//! code never reads the process environment on its own.

use crate::error::{Result, ScoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Location of every file the pipeline reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactConfig {
    pub dir: PathBuf,
    pub raw_file: String,
    pub train_file: String,
    pub test_file: String,
    pub preprocessor_file: String,
    pub model_file: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self::in_dir("artifacts")
    }
}

impl ArtifactConfig {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            raw_file: "raw.csv".to_string(),
            train_file: "train.csv".to_string(),
            test_file: "test.csv".to_string(),
            preprocessor_file: "preprocessor.pkl".to_string(),
            model_file: "model.pkl".to_string(),
        }
    }

    pub fn from_env() -> Self {
        let dir = std::env::var("ARTIFACTS_DIR").unwrap_or_else(|_| "artifacts".to_string());
        Self::in_dir(dir)
    }

    pub fn raw_path(&self) -> PathBuf {
        self.dir.join(&self.raw_file)
    }

    pub fn train_path(&self) -> PathBuf {
        self.dir.join(&self.train_file)
    }

    pub fn test_path(&self) -> PathBuf {
        self.dir.join(&self.test_file)
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.dir.join(&self.preprocessor_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    /// Existence of each artifact, in pipeline order.
    pub fn status(&self) -> ArtifactStatus {
        let exists = |p: PathBuf| p.exists();
        ArtifactStatus {
            raw_data: exists(self.raw_path()),
            train_data: exists(self.train_path()),
            test_data: exists(self.test_path()),
            preprocessor: exists(self.preprocessor_path()),
            model: exists(self.model_path()),
        }
    }
}

/// Which artifacts are currently on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactStatus {
    pub raw_data: bool,
    pub train_data: bool,
    pub test_data: bool,
    pub preprocessor: bool,
    pub model: bool,
}

impl ArtifactStatus {
    pub fn ready_for_serving(&self) -> bool {
        self.preprocessor && self.model
    }
}

/// Connection settings for the experiment tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// `file:<dir>`, a bare directory, or an `http(s)` tracking server.
    pub uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Experiment to log into; the server default experiment when unset.
    pub experiment_name: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            uri: "file:./mlruns".to_string(),
            username: None,
            password: None,
            experiment_name: None,
        }
    }
}

impl TrackerConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = Some(name.into());
        self
    }

    /// Reads `MLFLOW_TRACKING_URI`, `MLFLOW_TRACKING_USERNAME`,
    /// `MLFLOW_TRACKING_PASSWORD` and `MLFLOW_EXPERIMENT_NAME`.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            uri: non_empty("MLFLOW_TRACKING_URI").unwrap_or_else(|| Self::default().uri),
            username: non_empty("MLFLOW_TRACKING_USERNAME"),
            password: non_empty("MLFLOW_TRACKING_PASSWORD"),
            experiment_name: non_empty("MLFLOW_EXPERIMENT_NAME"),
        }
    }

    /// URI scheme, with a bare filesystem path counting as `file`.
    pub fn scheme(&self) -> String {
        match Url::parse(&self.uri) {
            // Single-letter schemes are Windows drive letters.
            Ok(url) if url.scheme().len() > 1 => url.scheme().to_string(),
            _ => "file".to_string(),
        }
    }

    /// Only tracking servers reached over HTTP own a model registry.
    pub fn supports_registry(&self) -> bool {
        matches!(self.scheme().as_str(), "http" | "https")
    }

    /// Root directory of a file-backed store.
    pub fn local_root(&self) -> Result<PathBuf> {
        if self.scheme() != "file" {
            return Err(ScoreError::ConfigError(format!(
                "tracking URI '{}' is not a file store",
                self.uri
            )));
        }
        let path = self
            .uri
            .strip_prefix("file://")
            .or_else(|| self.uri.strip_prefix("file:"))
            .unwrap_or(&self.uri);
        Ok(Path::new(path).to_path_buf())
    }
}

/// Connection settings for the relational data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationalConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
}

impl RelationalConfig {
    /// Reads `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and optionally `DB_TABLE`.
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| {
            std::env::var(key)
                .map_err(|_| ScoreError::ConfigError(format!("environment variable {} is not set", key)))
        };
        Ok(Self {
            host: required("DB_HOST")?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            database: required("DB_NAME")?,
            table: std::env::var("DB_TABLE").unwrap_or_else(|_| "students".to_string()),
        })
    }

    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}/{}",
            self.user, self.password, self.host, self.database
        )
    }
}
