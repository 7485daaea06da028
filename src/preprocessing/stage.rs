//! Transformation stage: fit on the training partition, apply to both

use super::schema::FeatureSchema;
use super::transform::PreprocessingTransform;
use crate::config::ArtifactConfig;
use crate::data::read_csv;
use crate::error::Result;
use ndarray::{Array1, Array2, Axis};
use std::path::{Path, PathBuf};
use tracing::info;

/// How the feature schema is obtained.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    Fixed(FeatureSchema),
    /// Infer numeric/categorical columns from the training partition dtypes
    Infer { target: String },
}

#[derive(Debug, Clone)]
pub struct TransformationConfig {
    pub schema: SchemaSource,
    pub artifacts: ArtifactConfig,
}

impl TransformationConfig {
    pub fn new(artifacts: ArtifactConfig) -> Self {
        Self {
            schema: SchemaSource::Fixed(FeatureSchema::student_performance()),
            artifacts,
        }
    }

    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = SchemaSource::Fixed(schema);
        self
    }

    pub fn with_inferred_schema(mut self, target: impl Into<String>) -> Self {
        self.schema = SchemaSource::Infer { target: target.into() };
        self
    }
}

/// Transformed partitions; the target is the last column of each array.
#[derive(Debug, Clone)]
pub struct TransformationArtifacts {
    pub train: Array2<f64>,
    pub test: Array2<f64>,
    pub preprocessor_path: PathBuf,
    /// Names of the transformed feature columns, target excluded
    pub feature_names: Vec<String>,
    pub target: String,
}

pub struct DataTransformation {
    config: TransformationConfig,
}

impl DataTransformation {
    pub fn new(config: TransformationConfig) -> Self {
        Self { config }
    }

    pub fn initiate(&self, train_path: &Path, test_path: &Path) -> Result<TransformationArtifacts> {
        let train_df = read_csv(train_path)?;
        let test_df = read_csv(test_path)?;
        info!(
            train_rows = train_df.height(),
            test_rows = test_df.height(),
            "Read train and test partitions"
        );

        let schema = match &self.config.schema {
            SchemaSource::Fixed(schema) => schema.clone(),
            SchemaSource::Infer { target } => FeatureSchema::infer(&train_df, target)?,
        };
        info!(
            numeric = ?schema.numeric,
            categorical = ?schema.categorical,
            target = %schema.target,
            "Fitting preprocessing transform"
        );

        let mut transform = PreprocessingTransform::new(schema);
        let train_features = transform.fit_transform(&train_df)?;
        let test_features = transform.apply(&test_df)?;

        let train = with_target(train_features, transform.target_values(&train_df)?)?;
        let test = with_target(test_features, transform.target_values(&test_df)?)?;

        let preprocessor_path = self.config.artifacts.preprocessor_path();
        transform.save(&preprocessor_path)?;
        info!(
            path = %preprocessor_path.display(),
            features = transform.n_output_features(),
            "Saved preprocessing transform"
        );

        Ok(TransformationArtifacts {
            train,
            test,
            preprocessor_path,
            feature_names: transform.output_feature_names(),
            target: transform.schema().target.clone(),
        })
    }
}

fn with_target(features: Array2<f64>, target: Vec<f64>) -> Result<Array2<f64>> {
    let target = Array1::from_vec(target).insert_axis(Axis(1));
    Ok(ndarray::concatenate(Axis(1), &[features.view(), target.view()])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::write_csv;
    use polars::prelude::*;

    #[test]
    fn test_initiate_appends_target_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactConfig::in_dir(dir.path());

        let mut train = df! {
            "hours" => [1.0, 2.0, 3.0, 4.0],
            "track" => ["a", "b", "a", "b"],
            "score" => [10.0, 20.0, 30.0, 40.0],
        }
        .unwrap();
        let mut test = df! {
            "hours" => [5.0],
            "track" => ["a"],
            "score" => [50.0],
        }
        .unwrap();
        write_csv(&mut train, &artifacts.train_path()).unwrap();
        write_csv(&mut test, &artifacts.test_path()).unwrap();

        let stage = DataTransformation::new(
            TransformationConfig::new(artifacts.clone()).with_inferred_schema("score"),
        );
        let out = stage
            .initiate(&artifacts.train_path(), &artifacts.test_path())
            .unwrap();

        assert_eq!(out.train.dim(), (4, 4));
        assert_eq!(out.test.dim(), (1, 4));
        assert_eq!(out.train[[3, 3]], 40.0);
        assert_eq!(out.test[[0, 3]], 50.0);
        assert!(out.preprocessor_path.exists());
    }
}
