//! AdaBoost.R2 regression
//!
//! Each round fits a shallow regression tree on a bootstrap sample drawn
//! according to the current sample weights, then re-weights samples by their
//! normalized (linear) loss. Prediction is the weighted median of the rounds.

use super::decision_tree::DecisionTreeRegressor;
use crate::error::{Result, ScoreError};
use ndarray::{Array1, Array2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each base tree
    pub max_depth: usize,
    pub random_state: u64,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth: 3,
            random_state: 42,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n != y.len() || n == 0 {
            return Err(ScoreError::ShapeError {
                expected: format!("y length = {} (non-empty)", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(ScoreError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut weights = vec![1.0 / n as f64; n];
        let mut estimators = Vec::with_capacity(self.n_estimators);
        let mut estimator_weights = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(&weights)
                .map_err(|e| ScoreError::ComputationError(format!("invalid sample weights: {}", e)))?;
            let bootstrap: Vec<usize> = (0..n).map(|_| sampler.sample(&mut rng)).collect();

            let mut tree = DecisionTreeRegressor::new().with_max_depth(self.max_depth);
            tree.fit_on(x, y, &bootstrap)?;
            let pred = tree.predict(x)?;

            let mut errors: Vec<f64> = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).collect();
            let error_max = errors.iter().cloned().fold(0.0, f64::max);
            if error_max > 0.0 {
                errors.iter_mut().for_each(|e| *e /= error_max);
            }
            let estimator_error: f64 = weights.iter().zip(&errors).map(|(w, e)| w * e).sum();

            if estimator_error <= 0.0 {
                estimators.push(tree);
                estimator_weights.push(1.0);
                break;
            }
            if estimator_error >= 0.5 {
                // A first weak learner is kept so the ensemble can still predict.
                if estimators.is_empty() {
                    estimators.push(tree);
                    estimator_weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            estimators.push(tree);
            estimator_weights.push(self.learning_rate * (1.0 / beta).ln());

            if round + 1 < self.n_estimators {
                for (w, e) in weights.iter_mut().zip(&errors) {
                    *w *= beta.powf((1.0 - e) * self.learning_rate);
                }
                let total: f64 = weights.iter().sum();
                if !(total > 0.0) {
                    break;
                }
                weights.iter_mut().for_each(|w| *w /= total);
            }
        }

        self.estimators = estimators;
        self.estimator_weights = estimator_weights;
        Ok(self)
    }

    /// Weighted median of the per-round predictions.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(ScoreError::ModelNotFitted);
        }

        let per_round: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|e| e.predict(x))
            .collect::<Result<_>>()?;
        let total_weight: f64 = self.estimator_weights.iter().sum();

        Ok((0..x.nrows())
            .map(|i| {
                let mut votes: Vec<(f64, f64)> = per_round
                    .iter()
                    .zip(&self.estimator_weights)
                    .map(|(p, &w)| (p[i], w))
                    .collect();
                votes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let half = 0.5 * total_weight;
                let mut cumulative = 0.0;
                for &(value, w) in &votes {
                    cumulative += w;
                    if cumulative >= half {
                        return value;
                    }
                }
                votes[votes.len() - 1].0
            })
            .collect())
    }

    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }
}
