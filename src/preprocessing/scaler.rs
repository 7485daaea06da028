//! Standard scaling over the columns of a feature matrix

use crate::error::{Result, ScoreError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

/// Z-score scaler: `(x - mean) / std`, or `x / std` without centering.
///
/// The standard deviation is the population one. Constant columns get a
/// scale of 1 so they pass through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    with_mean: bool,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    pub fn standard() -> Self {
        Self {
            with_mean: true,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Scale only, keeping zeros at zero (used for one-hot blocks).
    pub fn without_mean() -> Self {
        Self {
            with_mean: false,
            ..Self::standard()
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(ScoreError::PreprocessingError("cannot fit scaler on zero rows".to_string()));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let mean = col.sum() / n as f64;
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                let std = var.sqrt();
                ScalerParams {
                    center: if self.with_mean { mean } else { 0.0 },
                    scale: if std > f64::EPSILON * mean.abs().max(1.0) { std } else { 1.0 },
                }
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ScoreError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(ScoreError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}
