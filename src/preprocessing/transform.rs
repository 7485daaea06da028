//! Fitted column transform: impute, scale, one-hot encode

use super::encoder::OneHotEncoder;
use super::imputer::{ImputeStrategy, Imputer};
use super::scaler::Scaler;
use super::schema::{numeric_values, FeatureSchema};
use crate::error::{Result, ScoreError};
use crate::persistence;
use ndarray::{concatenate, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ARTIFACT_KIND: &str = "Preprocessor";

/// Preprocessing transform fitted once on training features.
///
/// Numeric columns: median imputation then standard scaling.
/// Categorical columns: most-frequent imputation, one-hot encoding, then
/// scaling without centering. Output columns are the numeric block followed
/// by the encoded block, each in schema order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingTransform {
    schema: FeatureSchema,
    numeric_imputer: Imputer,
    numeric_scaler: Scaler,
    categorical_imputer: Imputer,
    encoder: OneHotEncoder,
    categorical_scaler: Scaler,
    is_fitted: bool,
}

impl PreprocessingTransform {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            numeric_imputer: Imputer::new(ImputeStrategy::Median),
            numeric_scaler: Scaler::standard(),
            categorical_imputer: Imputer::new(ImputeStrategy::MostFrequent),
            encoder: OneHotEncoder::new(),
            categorical_scaler: Scaler::without_mean(),
            is_fitted: false,
        }
    }

    /// Fit every step on the feature columns of `df`; the target is ignored.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.schema.validate()?;
        self.schema.require_features(df)?;

        self.numeric_imputer.fit(df, &self.schema.numeric)?;
        self.categorical_imputer.fit(df, &self.schema.categorical)?;

        let imputed = self.categorical_imputer.transform(&self.numeric_imputer.transform(df)?)?;
        let numeric = numeric_block(&imputed, &self.schema.numeric)?;
        self.numeric_scaler.fit(&numeric)?;

        self.encoder.fit(&imputed, &self.schema.categorical)?;
        let encoded = self.encoder.transform(&imputed)?;
        self.categorical_scaler.fit(&encoded)?;

        self.is_fitted = true;
        Ok(self)
    }

    /// Apply the fitted steps. Never re-fits.
    pub fn apply(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ScoreError::ModelNotFitted);
        }
        self.schema.require_features(df)?;

        let imputed = self.categorical_imputer.transform(&self.numeric_imputer.transform(df)?)?;
        let numeric = self.numeric_scaler.transform(&numeric_block(&imputed, &self.schema.numeric)?)?;
        let encoded = self.categorical_scaler.transform(&self.encoder.transform(&imputed)?)?;

        Ok(concatenate(Axis(1), &[numeric.view(), encoded.view()])?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.apply(df)
    }

    /// Target column of `df` as a vector; missing values are rejected.
    pub fn target_values(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let target = &self.schema.target;
        numeric_values(df, target)?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    ScoreError::DataError(format!("target column '{}' has missing values", target))
                })
            })
            .collect()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn output_feature_names(&self) -> Vec<String> {
        self.schema
            .numeric
            .iter()
            .cloned()
            .chain(self.encoder.feature_names())
            .collect()
    }

    pub fn n_output_features(&self) -> usize {
        self.schema.numeric.len() + self.encoder.n_output_columns()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.is_fitted {
            return Err(ScoreError::ModelNotFitted);
        }
        persistence::save_object(path, ARTIFACT_KIND, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        persistence::load_object(path, ARTIFACT_KIND)
    }
}

fn numeric_block(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut data = Array2::zeros((n_rows, columns.len()));
    for (j, name) in columns.iter().enumerate() {
        for (i, v) in numeric_values(df, name)?.into_iter().enumerate() {
            data[[i, j]] = v.ok_or_else(|| {
                ScoreError::PreprocessingError(format!("column '{}' contains missing values", name))
            })?;
        }
    }
    Ok(data)
}
