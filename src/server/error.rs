//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ScoreError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unprocessable input: {0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ScoreError> for ServerError {
    fn from(err: ScoreError) -> Self {
        match err.root_cause() {
            ScoreError::ArtifactNotFound { .. } => ServerError::NotFound(err.root_cause().to_string()),
            ScoreError::MissingFeatures(_)
            | ScoreError::UnknownCategory { .. }
            | ScoreError::InvalidInput(_) => ServerError::Unprocessable(err.root_cause().to_string()),
            _ => ServerError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Prediction failed: {}", msg))
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultExt;
    use std::path::PathBuf;

    fn status_of(err: ScoreError) -> StatusCode {
        ServerError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        let not_found: crate::error::Result<()> = Err(ScoreError::ArtifactNotFound {
            kind: "Model",
            path: PathBuf::from("artifacts/model.pkl"),
        });
        assert_eq!(status_of(not_found.context("loading model").unwrap_err()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ScoreError::MissingFeatures(vec!["lunch".to_string()])),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ScoreError::UnknownCategory {
                column: "lunch".to_string(),
                value: "brunch".to_string(),
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(ScoreError::ModelNotFitted), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message_names_file() {
        let err = ServerError::from(ScoreError::ArtifactNotFound {
            kind: "Model",
            path: PathBuf::from("artifacts/model.pkl"),
        });
        assert!(err.to_string().contains("Model file not found"));
    }
}
