//! Missing value imputation

use super::schema::{categorical_values, numeric_values};
use crate::error::{Result, ScoreError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for imputing missing values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Median of the observed values (numeric columns)
    Median,
    /// Most frequent observed value; ties go to the smallest value
    MostFrequent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeValue {
    Numeric(f64),
    Text(String),
}

/// Fitted fill values, one per column, in fit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: Vec<(String, ImputeValue)>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut fill_values = Vec::with_capacity(columns.len());
        for name in columns {
            let value = match self.strategy {
                ImputeStrategy::Median => {
                    let observed: Vec<f64> = numeric_values(df, name)?.into_iter().flatten().collect();
                    ImputeValue::Numeric(median(observed).ok_or_else(|| no_observed(name))?)
                }
                ImputeStrategy::MostFrequent => {
                    let observed = categorical_values(df, name)?.into_iter().flatten();
                    ImputeValue::Text(most_frequent(observed).ok_or_else(|| no_observed(name))?)
                }
            };
            fill_values.push((name.clone(), value));
        }

        self.fill_values = fill_values;
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing cells of the fitted columns. Numeric columns come back
    /// as `Float64`, categorical ones as `String`.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ScoreError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (name, fill) in &self.fill_values {
            let series = match fill {
                ImputeValue::Numeric(v) => {
                    let filled: Vec<f64> = numeric_values(df, name)?
                        .into_iter()
                        .map(|x| x.unwrap_or(*v))
                        .collect();
                    Series::new(name.as_str().into(), filled)
                }
                ImputeValue::Text(v) => {
                    let filled: Vec<String> = categorical_values(df, name)?
                        .into_iter()
                        .map(|x| x.unwrap_or_else(|| v.clone()))
                        .collect();
                    Series::new(name.as_str().into(), filled)
                }
            };
            result.with_column(series)?;
        }

        Ok(result)
    }

    pub fn fill_values(&self) -> &[(String, ImputeValue)] {
        &self.fill_values
    }
}

fn no_observed(column: &str) -> ScoreError {
    ScoreError::PreprocessingError(format!(
        "column '{}' has no observed values to impute from",
        column
    ))
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn most_frequent(values: impl Iterator<Item = String>) -> Option<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(String, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_fill() {
        let df = df! {
            "score" => [Some(1.0), None, Some(3.0), Some(10.0)],
        }
        .unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let out = imputer.fit(&df, &["score".to_string()]).unwrap().transform(&df).unwrap();

        let values: Vec<f64> = out.column("score").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(values, vec![1.0, 3.0, 3.0, 10.0]);
    }

    #[test]
    fn test_most_frequent_tie_takes_smallest() {
        let df = df! {
            "lunch" => [Some("standard"), Some("free/reduced"), None, Some("standard"), Some("free/reduced")],
        }
        .unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        imputer.fit(&df, &["lunch".to_string()]).unwrap();

        assert_eq!(
            imputer.fill_values()[0].1,
            ImputeValue::Text("free/reduced".to_string())
        );
    }

    #[test]
    fn test_all_missing_is_an_error() {
        let df = df! { "score" => [None::<f64>, None] }.unwrap();
        let mut imputer = Imputer::new(ImputeStrategy::Median);
        assert!(imputer.fit(&df, &["score".to_string()]).is_err());
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df! { "score" => [1.0] }.unwrap();
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(matches!(imputer.transform(&df), Err(ScoreError::ModelNotFitted)));
    }
}
