//! Prediction pipeline over the persisted transform and model

use crate::config::ArtifactConfig;
use crate::error::{Result, ResultExt, ScoreError};
use crate::preprocessing::{FeatureSchema, PreprocessingTransform};
use crate::training::{RegressionMetrics, TrainedArtifact};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

/// One input row keyed by feature name.
pub type Record = Map<String, Value>;

/// Metadata of the loaded model, as reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_type: String,
    pub features: Vec<String>,
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub target: String,
    pub trained_at: String,
    pub params: Value,
    pub metrics: RegressionMetrics,
    pub n_model_inputs: usize,
}

/// Transform and model loaded once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    transform: PreprocessingTransform,
    artifact: TrainedArtifact,
}

impl PredictionPipeline {
    pub fn new(transform: PreprocessingTransform, artifact: TrainedArtifact) -> Result<Self> {
        if !transform.is_fitted() {
            return Err(ScoreError::ModelNotFitted);
        }
        if !artifact.feature_names.is_empty() && artifact.feature_names.len() != transform.n_output_features() {
            return Err(ScoreError::ShapeError {
                expected: format!("{} model inputs", transform.n_output_features()),
                actual: format!("{} model inputs", artifact.feature_names.len()),
            });
        }
        Ok(Self { transform, artifact })
    }

    /// Reads `model.pkl` and `preprocessor.pkl`; a missing file surfaces as
    /// [`ScoreError::ArtifactNotFound`] beneath the context layer.
    pub fn load(artifacts: &ArtifactConfig) -> Result<Self> {
        let artifact = TrainedArtifact::load(&artifacts.model_path()).context("loading model")?;
        let transform =
            PreprocessingTransform::load(&artifacts.preprocessor_path()).context("loading preprocessor")?;
        info!(
            model = %artifact.model_name,
            trained_at = %artifact.trained_at,
            dir = %artifacts.dir.display(),
            "Loaded prediction pipeline"
        );
        Self::new(transform, artifact)
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.transform.schema()
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    /// Scores for every row of `df`; extra columns are ignored.
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let features = self.transform.apply(df)?;
        self.artifact.predict(&features)
    }

    pub fn predict_records(&self, records: &[Record]) -> Result<Vec<f64>> {
        let df = records_to_frame(self.schema(), records)?;
        Ok(self.predict(&df)?.to_vec())
    }

    pub fn predict_single(&self, record: &Record) -> Result<f64> {
        let scores = self.predict_records(std::slice::from_ref(record))?;
        scores
            .first()
            .copied()
            .ok_or_else(|| ScoreError::ComputationError("model returned no prediction".to_string()))
    }

    /// Held-out R² of the model, clamped to [0, 1].
    pub fn confidence(&self) -> f64 {
        let r2 = self.artifact.metrics.r2;
        if r2.is_nan() {
            0.0
        } else {
            r2.clamp(0.0, 1.0)
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        let schema = self.schema();
        ModelInfo {
            model_name: self.artifact.model_name.clone(),
            model_type: self.artifact.kind().to_string(),
            features: schema.feature_names(),
            numeric_features: schema.numeric.clone(),
            categorical_features: schema.categorical.clone(),
            target: schema.target.clone(),
            trained_at: self.artifact.trained_at.clone(),
            params: self.artifact.params.to_json(),
            metrics: self.artifact.metrics,
            n_model_inputs: self.transform.n_output_features(),
        }
    }
}

/// Build a frame with one typed column per schema feature. Numeric features
/// take JSON numbers, categorical features take strings; `null` is a
/// missing value left to the imputers. Nothing is coerced.
pub fn records_to_frame(schema: &FeatureSchema, records: &[Record]) -> Result<DataFrame> {
    if records.is_empty() {
        return Err(ScoreError::InvalidInput("no records to predict".to_string()));
    }

    let missing: Vec<String> = schema
        .feature_names()
        .into_iter()
        .filter(|name| records.iter().any(|r| !r.contains_key(name)))
        .collect();
    if !missing.is_empty() {
        return Err(ScoreError::MissingFeatures(missing));
    }

    let mut columns = Vec::with_capacity(schema.numeric.len() + schema.categorical.len());
    for name in &schema.numeric {
        let values = records
            .iter()
            .map(|r| match &r[name] {
                Value::Null => Ok(None),
                Value::Number(n) => Ok(n.as_f64()),
                other => Err(wrong_type(name, "a number", other)),
            })
            .collect::<Result<Vec<Option<f64>>>>()?;
        columns.push(Column::new(name.as_str().into(), values));
    }
    for name in &schema.categorical {
        let values = records
            .iter()
            .map(|r| match &r[name] {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(s.clone())),
                other => Err(wrong_type(name, "a string", other)),
            })
            .collect::<Result<Vec<Option<String>>>>()?;
        columns.push(Column::new(name.as_str().into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

fn wrong_type(name: &str, expected: &str, got: &Value) -> ScoreError {
    ScoreError::InvalidInput(format!("feature '{}' must be {}, got {}", name, expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(
            vec!["reading_score".to_string()],
            vec!["lunch".to_string()],
            "math_score",
        )
    }

    #[test]
    fn test_records_to_frame_types() {
        let rows = vec![
            record(json!({"reading_score": 72, "lunch": "standard", "extra": true})),
            record(json!({"reading_score": null, "lunch": null})),
        ];
        let df = records_to_frame(&schema(), &rows).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("reading_score").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("lunch").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("reading_score").unwrap().null_count(), 1);
        assert!(df.column("extra").is_err());
    }

    #[test]
    fn test_missing_features_listed() {
        let rows = vec![
            record(json!({"reading_score": 72})),
            record(json!({"reading_score": 60, "lunch": "standard"})),
        ];
        match records_to_frame(&schema(), &rows) {
            Err(ScoreError::MissingFeatures(cols)) => assert_eq!(cols, vec!["lunch".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wrong_types_rejected() {
        let rows = vec![record(json!({"reading_score": "72", "lunch": "standard"}))];
        assert!(matches!(records_to_frame(&schema(), &rows), Err(ScoreError::InvalidInput(_))));

        let rows = vec![record(json!({"reading_score": 72, "lunch": 1}))];
        assert!(matches!(records_to_frame(&schema(), &rows), Err(ScoreError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_records_rejected() {
        assert!(matches!(records_to_frame(&schema(), &[]), Err(ScoreError::InvalidInput(_))));
    }

    #[test]
    fn test_load_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let err = PredictionPipeline::load(&ArtifactConfig::in_dir(dir.path())).unwrap_err();
        assert!(err.is_artifact_not_found());
    }
}
