//! Error types for the score predictor

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for score predictor operations
pub type Result<T> = std::result::Result<T, ScoreError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Missing required feature columns: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{kind} file not found at {}", path.display())]
    ArtifactNotFound { kind: &'static str, path: PathBuf },

    #[error("No acceptable model found: best candidate '{model}' scored {score:.4}, below threshold {threshold}")]
    ModelBelowThreshold {
        model: String,
        score: f64,
        threshold: f64,
    },

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("{message} (at {location}): {source}")]
    Context {
        message: String,
        location: String,
        #[source]
        source: Box<ScoreError>,
    },
}

impl ScoreError {
    /// Innermost error beneath any number of `Context` layers.
    pub fn root_cause(&self) -> &ScoreError {
        let mut current = self;
        while let ScoreError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_artifact_not_found(&self) -> bool {
        matches!(self.root_cause(), ScoreError::ArtifactNotFound { .. })
    }
}

/// Attach a stage description and the caller's source location to an error.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn context(self, message: impl Into<String>) -> Result<T> {
        match self {
            Ok(value) => Ok(value),
            Err(err) => {
                let caller = std::panic::Location::caller();
                Err(ScoreError::Context {
                    message: message.into(),
                    location: format!("{}:{}", caller.file(), caller.line()),
                    source: Box::new(err),
                })
            }
        }
    }
}

impl From<polars::error::PolarsError> for ScoreError {
    fn from(err: polars::error::PolarsError) -> Self {
        ScoreError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ScoreError {
    fn from(err: serde_json::Error) -> Self {
        ScoreError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ScoreError {
    fn from(err: bincode::Error) -> Self {
        ScoreError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScoreError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScoreError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ScoreError {
    fn from(err: reqwest::Error) -> Self {
        ScoreError::TrackingError(err.to_string())
    }
}

impl From<url::ParseError> for ScoreError {
    fn from(err: url::ParseError) -> Self {
        ScoreError::ConfigError(format!("invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoreError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ScoreError = io_err.into();
        assert!(matches!(err, ScoreError::IoError(_)));
    }

    #[test]
    fn test_context_records_location_and_keeps_root() {
        let result: Result<()> = Err(ScoreError::ArtifactNotFound {
            kind: "Model",
            path: PathBuf::from("artifacts/model.pkl"),
        });
        let err = result.context("loading prediction pipeline").unwrap_err();

        let rendered = err.to_string();
        assert!(rendered.starts_with("loading prediction pipeline (at src/error.rs:"));
        assert!(rendered.contains("Model file not found at artifacts/model.pkl"));
        assert!(err.is_artifact_not_found());
    }

    #[test]
    fn test_missing_features_lists_columns() {
        let err = ScoreError::MissingFeatures(vec!["lunch".into(), "gender".into()]);
        assert_eq!(err.to_string(), "Missing required feature columns: lunch, gender");
    }
}
