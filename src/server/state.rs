//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, ScoreError};
use crate::inference::PredictionPipeline;

use super::ServerConfig;

/// Application state shared across handlers. The pipeline is loaded once
/// and never replaced while the process runs.
pub struct AppState {
    pub config: ServerConfig,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pipeline: Option<Arc<PredictionPipeline>>,
    /// The artifact that was absent at startup
    missing: Option<(&'static str, PathBuf)>,
}

impl AppState {
    pub fn with_pipeline(config: ServerConfig, pipeline: PredictionPipeline) -> Self {
        Self {
            config,
            started_at: chrono::Utc::now(),
            pipeline: Some(Arc::new(pipeline)),
            missing: None,
        }
    }

    /// Load the artifacts named by `config`. Missing files leave the service
    /// up without a model; prediction requests then answer 404. Any other
    /// load failure is returned.
    pub fn load(config: ServerConfig) -> Result<Self> {
        match PredictionPipeline::load(&config.artifacts) {
            Ok(pipeline) => Ok(Self::with_pipeline(config, pipeline)),
            Err(e) => match e.root_cause() {
                ScoreError::ArtifactNotFound { kind, path } => {
                    warn!(kind = *kind, path = %path.display(), "Starting without a model; train one first");
                    let missing = Some((*kind, path.clone()));
                    Ok(Self {
                        config,
                        started_at: chrono::Utc::now(),
                        pipeline: None,
                        missing,
                    })
                }
                _ => Err(e),
            },
        }
    }

    pub fn pipeline(&self) -> Result<Arc<PredictionPipeline>> {
        match (&self.pipeline, &self.missing) {
            (Some(pipeline), _) => Ok(Arc::clone(pipeline)),
            (None, Some((kind, path))) => Err(ScoreError::ArtifactNotFound {
                kind: *kind,
                path: path.clone(),
            }),
            (None, None) => Err(ScoreError::ArtifactNotFound {
                kind: "Model",
                path: self.config.artifacts.model_path(),
            }),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.pipeline.is_some()
    }
}
