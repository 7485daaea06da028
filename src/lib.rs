//! Score predictor - student score regression
//!
//! This crate trains and serves a model predicting a student's math score
//! from demographic and other exam features:
//! - Seeded ingestion of a CSV file or relational table into train/test partitions
//! - Preprocessing (imputation, scaling, one-hot encoding) fit on the training partition
//! - Grid-searched model selection over a fixed roster of regressors
//! - Experiment tracking against an MLflow server or a local run store
//! - A JSON prediction API and a CLI driving every stage
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Feature schema, imputers, scalers, encoder
//! - [`training`] - Estimators, grid search and the model trainer
//! - [`inference`] - Prediction over the persisted transform and model
//!
//! ## Data and Artifacts
//! - [`data`] - Dataset ingestion and CSV I/O
//! - [`persistence`] - Versioned binary artifact files
//! - [`config`] - Artifact, tracker and database settings
//!
//! ## Services
//! - [`tracking`] - Experiment tracking
//! - [`pipeline`] - End-to-end training pipeline
//! - [`server`] - HTTP server with REST API
//! - [`orchestration`] - Supervision of the service process
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Configuration and artifacts
pub mod config;
pub mod data;
pub mod persistence;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod inference;

// Experiment tracking
pub mod tracking;

// Pipeline and services
pub mod pipeline;
pub mod server;
pub mod orchestration;
pub mod logging;
pub mod cli;

pub use error::{Result, ScoreError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, ResultExt, ScoreError};

    // Configuration
    pub use crate::config::{ArtifactConfig, ArtifactStatus, RelationalConfig, TrackerConfig};

    // Data
    pub use crate::data::{DataIngestion, DataSource, IngestionConfig};

    // Preprocessing
    pub use crate::preprocessing::{DataTransformation, FeatureSchema, PreprocessingTransform, TransformationConfig};

    // Training
    pub use crate::training::{
        default_roster, Candidate, ModelKind, ModelReport, ModelTrainer, ParamGrid, Params, Regressor,
        Roster, TrainedArtifact, TrainerConfig,
    };

    // Inference
    pub use crate::inference::{ModelInfo, PredictionPipeline};

    // Experiment tracking
    pub use crate::tracking::{ExperimentTracker, FileTracker, MlflowTracker, RecordingTracker};

    // Pipeline and services
    pub use crate::pipeline::{pipeline_status, TrainingPipeline, TrainingSummary};
    pub use crate::server::{create_router, AppState, ServerConfig};
    pub use crate::orchestration::ServiceSupervisor;
}
