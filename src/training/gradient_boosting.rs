//! Gradient boosted regression trees
//!
//! Least-squares boosting: every round fits a shallow tree to the current
//! residuals and adds it with shrinkage. With `subsample < 1` each round sees
//! a random subset drawn without replacement (stochastic gradient boosting).

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::{Criterion, DecisionTreeRegressor};
use crate::error::{Result, ScoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to each tree
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row fraction per round, in (0, 1]
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", self.n_estimators.to_string(), "must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", self.learning_rate.to_string(), "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", self.subsample.to_string(), "must lie in (0, 1]"));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: String, reason: &str) -> ScoreError {
    ScoreError::InvalidParameter {
        name: name.to_string(),
        value,
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        let n_samples = x.nrows();
        if n_samples != y.len() || n_samples == 0 {
            return Err(ScoreError::ShapeError {
                expected: format!("y length = {} (non-empty)", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let n_sub = ((self.config.subsample * n_samples as f64) as usize).max(1);

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            let residuals = y - &predictions;

            let sample_indices: Vec<usize> = if n_sub < n_samples {
                let mut idx = rand::seq::index::sample(&mut rng, n_samples, n_sub).into_vec();
                idx.sort_unstable();
                idx
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTreeRegressor::new()
                .with_criterion(Criterion::FriedmanMse)
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_on(x, &residuals, &sample_indices)?;

            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            trees.push(tree);
        }

        self.trees = trees;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ScoreError::ModelNotFitted);
        }
        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            predictions.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(predictions)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::r2_score;

    fn wave(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64 / n as f64 * 6.0);
        let y = x.column(0).mapv(f64::sin);
        (x, y)
    }

    #[test]
    fn test_boosting_reduces_error() {
        let (x, y) = wave(200);
        let mut few = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 2,
            ..Default::default()
        });
        let mut many = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 64,
            ..Default::default()
        });
        few.fit(&x, &y).unwrap();
        many.fit(&x, &y).unwrap();

        let r2_few = r2_score(&y, &few.predict(&x).unwrap()).unwrap();
        let r2_many = r2_score(&y, &many.predict(&x).unwrap()).unwrap();
        assert!(r2_many > r2_few);
        assert!(r2_many > 0.95, "r2 = {}", r2_many);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let (x, y) = wave(100);
        let config = GradientBoostingConfig {
            n_estimators: 10,
            subsample: 0.6,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_rejects_bad_subsample() {
        let (x, y) = wave(10);
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            subsample: 1.5,
            ..Default::default()
        });
        assert!(matches!(model.fit(&x, &y), Err(ScoreError::InvalidParameter { .. })));
    }
}
