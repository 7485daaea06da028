//! Feature schema: which columns are numeric, which categorical, which is the target

use crate::error::{Result, ScoreError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub target: String,
}

impl FeatureSchema {
    pub fn new(numeric: Vec<String>, categorical: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            numeric,
            categorical,
            target: target.into(),
        }
    }

    /// Columns of the student performance dataset.
    pub fn student_performance() -> Self {
        let owned = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect();
        Self {
            numeric: owned(&["reading_score", "writing_score"]),
            categorical: owned(&[
                "gender",
                "race_ethnicity",
                "parental_level_of_education",
                "lunch",
                "test_preparation_course",
            ]),
            target: "math_score".to_string(),
        }
    }

    /// Classify every non-target column by its dtype.
    pub fn infer(df: &DataFrame, target: &str) -> Result<Self> {
        if df.column(target).is_err() {
            return Err(ScoreError::FeatureNotFound(target.to_string()));
        }

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == target {
                continue;
            }
            match col.dtype() {
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
                DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
                DataType::Float32 | DataType::Float64 => numeric.push(name),
                DataType::String | DataType::Boolean => categorical.push(name),
                other => {
                    return Err(ScoreError::PreprocessingError(format!(
                        "column '{}' has unsupported type {}",
                        name, other
                    )))
                }
            }
        }

        Ok(Self::new(numeric, categorical, target))
    }

    /// Input feature names, numeric block first.
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric.iter().chain(self.categorical.iter()).cloned().collect()
    }

    /// Every feature column `df` lacks, in schema order.
    pub fn missing_features(&self, df: &DataFrame) -> Vec<String> {
        self.feature_names()
            .into_iter()
            .filter(|name| df.column(name).is_err())
            .collect()
    }

    pub fn require_features(&self, df: &DataFrame) -> Result<()> {
        let missing = self.missing_features(df);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScoreError::MissingFeatures(missing))
        }
    }

    pub fn validate(&self) -> Result<()> {
        let features = self.feature_names();
        if features.is_empty() {
            return Err(ScoreError::ConfigError("schema has no feature columns".to_string()));
        }
        if features.iter().any(|f| f == &self.target) {
            return Err(ScoreError::ConfigError(format!(
                "target '{}' is also listed as a feature",
                self.target
            )));
        }
        let mut sorted = features.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != features.len() {
            return Err(ScoreError::ConfigError("duplicate feature column in schema".to_string()));
        }
        Ok(())
    }
}

/// Column values as floats; non-numeric cells become missing.
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| ScoreError::FeatureNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

/// Column values as strings.
pub(crate) fn categorical_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| ScoreError::FeatureNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_by_dtype() {
        let df = df! {
            "gender" => ["female", "male"],
            "reading_score" => [72i64, 90],
            "math_score" => [70.0, 88.0],
        }
        .unwrap();

        let schema = FeatureSchema::infer(&df, "math_score").unwrap();
        assert_eq!(schema.numeric, vec!["reading_score"]);
        assert_eq!(schema.categorical, vec!["gender"]);
        assert_eq!(schema.target, "math_score");
    }

    #[test]
    fn test_infer_requires_target() {
        let df = df! { "a" => [1.0] }.unwrap();
        assert!(matches!(
            FeatureSchema::infer(&df, "math_score"),
            Err(ScoreError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_missing_features_reported_together() {
        let df = df! { "gender" => ["female"] }.unwrap();
        let schema = FeatureSchema::student_performance();
        match schema.require_features(&df) {
            Err(ScoreError::MissingFeatures(cols)) => {
                assert_eq!(cols.len(), 6);
                assert_eq!(cols[0], "reading_score");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_target_as_feature() {
        let schema = FeatureSchema::new(vec!["y".into()], vec![], "y");
        assert!(schema.validate().is_err());
        assert!(FeatureSchema::student_performance().validate().is_ok());
    }
}
