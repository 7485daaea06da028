//! One-hot encoding of categorical columns

use super::schema::categorical_values;
use crate::error::{Result, ScoreError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One indicator column per (column, category); categories sorted per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<(String, Vec<String>)>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn the category set of each column. Missing cells are expected to
    /// be imputed beforehand and are rejected here.
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        let mut categories = Vec::with_capacity(columns.len());
        for name in columns {
            let mut values = Vec::new();
            for v in categorical_values(df, name)? {
                values.push(v.ok_or_else(|| missing_cell(name))?);
            }
            values.sort();
            values.dedup();
            categories.push((name.clone(), values));
        }

        self.categories = categories;
        self.is_fitted = true;
        Ok(self)
    }

    /// Indicator matrix; a category not seen during fit is an error.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ScoreError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut out = Array2::zeros((n_rows, self.n_output_columns()));
        let mut offset = 0;
        for (name, cats) in &self.categories {
            for (row, value) in categorical_values(df, name)?.into_iter().enumerate() {
                let value = value.ok_or_else(|| missing_cell(name))?;
                let pos = cats
                    .binary_search(&value)
                    .map_err(|_| ScoreError::UnknownCategory {
                        column: name.clone(),
                        value: value.clone(),
                    })?;
                out[[row, offset + pos]] = 1.0;
            }
            offset += cats.len();
        }

        Ok(out)
    }

    pub fn n_output_columns(&self) -> usize {
        self.categories.iter().map(|(_, c)| c.len()).sum()
    }

    /// Output names in `column_category` form.
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{}_{}", name, c)))
            .collect()
    }

    pub fn categories(&self) -> &[(String, Vec<String>)] {
        &self.categories
    }
}

fn missing_cell(column: &str) -> ScoreError {
    ScoreError::PreprocessingError(format!("column '{}' contains missing values", column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lunch_frame() -> DataFrame {
        df! {
            "lunch" => ["standard", "free/reduced", "standard"],
            "gender" => ["male", "female", "female"],
        }
        .unwrap()
    }

    #[test]
    fn test_one_hot_layout() {
        let df = lunch_frame();
        let cols = vec!["lunch".to_string(), "gender".to_string()];
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&df, &cols).unwrap();

        assert_eq!(
            encoder.feature_names(),
            vec!["lunch_free/reduced", "lunch_standard", "gender_female", "gender_male"]
        );

        let out = encoder.transform(&df).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&lunch_frame(), &["lunch".to_string()]).unwrap();

        let unseen = df! { "lunch" => ["catered"] }.unwrap();
        match encoder.transform(&unseen) {
            Err(ScoreError::UnknownCategory { column, value }) => {
                assert_eq!(column, "lunch");
                assert_eq!(value, "catered");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
