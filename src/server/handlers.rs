//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::inference::{ModelInfo, Record};

use super::error::{Result, ServerError};
use super::state::AppState;

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction: f64,
    pub confidence: f64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub sample_id: usize,
    pub prediction: f64,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct BatchPredictionResponse {
    pub predictions: Vec<BatchItem>,
    pub total_samples: usize,
    pub message: String,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Student Score Predictor API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "API is running",
    }))
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<ModelInfo>> {
    let pipeline = state.pipeline()?;
    Ok(Json(pipeline.model_info()))
}

/// Score one JSON object keyed by feature name.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let pipeline = state.pipeline()?;
    let Json(body) = body?;
    let Value::Object(record) = body else {
        return Err(ServerError::Unprocessable(
            "request body must be a JSON object keyed by feature name".to_string(),
        ));
    };

    let prediction = pipeline.predict_single(&record)?;
    debug!(prediction, "Served single prediction");

    Ok(Json(PredictionResponse {
        prediction,
        confidence: pipeline.confidence(),
        message: "Prediction successful".to_string(),
    }))
}

/// Score a JSON array of feature objects.
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchPredictionResponse>> {
    let pipeline = state.pipeline()?;
    let Json(body) = body?;
    let Value::Array(items) = body else {
        return Err(ServerError::Unprocessable(
            "request body must be a JSON array of objects".to_string(),
        ));
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(ServerError::Unprocessable(format!("sample {} is not a JSON object", i))),
        })
        .collect::<Result<Vec<Record>>>()?;

    let scores = {
        let pipeline = Arc::clone(&pipeline);
        tokio::task::spawn_blocking(move || pipeline.predict_records(&records))
            .await
            .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??
    };

    let confidence = pipeline.confidence();
    let predictions: Vec<BatchItem> = scores
        .into_iter()
        .enumerate()
        .map(|(sample_id, prediction)| BatchItem {
            sample_id,
            prediction,
            confidence,
        })
        .collect();
    info!(samples = predictions.len(), "Served batch prediction");

    Ok(Json(BatchPredictionResponse {
        total_samples: predictions.len(),
        predictions,
        message: "Batch prediction successful".to_string(),
    }))
}
