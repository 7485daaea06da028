//! Exhaustive grid search with k-fold cross-validation

use super::cross_validation::{CVSplit, KFold};
use super::estimator::{Estimator, ModelKind, Regressor};
use super::metrics::r2_score;
use super::params::{ParamGrid, Params};
use crate::error::{Result, ScoreError};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Mean in-fold score of one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboScore {
    pub params: Params,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

/// Outcome of a search: the refitted best estimator plus every scored
/// combination in grid order.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: Params,
    pub best_score: f64,
    pub best_estimator: Estimator,
    pub scores: Vec<ComboScore>,
}

#[derive(Debug, Clone)]
pub struct GridSearchCV {
    pub kind: ModelKind,
    pub grid: ParamGrid,
    pub cv: KFold,
    pub random_state: u64,
}

impl GridSearchCV {
    pub fn new(kind: ModelKind, grid: ParamGrid) -> Self {
        Self {
            kind,
            grid,
            cv: KFold::new(3),
            random_state: 42,
        }
    }

    pub fn with_cv(mut self, cv: KFold) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Scores every combination, keeps the first with the highest mean R²,
    /// and refits it on all of `x`.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if x.nrows() != y.len() {
            return Err(ScoreError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let combinations = self.grid.combinations()?;
        let splits = self.cv.split(x.nrows())?;

        let jobs: Vec<(usize, &CVSplit)> = (0..combinations.len())
            .flat_map(|c| splits.iter().map(move |s| (c, s)))
            .collect();
        let fold_results: Vec<Result<f64>> = jobs
            .par_iter()
            .map(|&(c, split)| self.score_fold(&combinations[c], x, y, split))
            .collect();

        let mut scores = Vec::with_capacity(combinations.len());
        let mut last_error = None;
        let mut fold_results = fold_results.into_iter();
        for params in combinations {
            let folds: Vec<Result<f64>> = fold_results.by_ref().take(splits.len()).collect();
            match folds.into_iter().collect::<Result<Vec<f64>>>() {
                Ok(fold_scores) => {
                    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                    debug!(kind = %self.kind, params = %params, mean_score, "scored combination");
                    scores.push(ComboScore {
                        params,
                        mean_score,
                        fold_scores,
                    });
                }
                Err(e) => {
                    warn!(kind = %self.kind, params = %params, error = %e, "skipping failed combination");
                    last_error = Some(e);
                }
            }
        }

        let best = scores
            .iter()
            .filter(|s| !s.mean_score.is_nan())
            .fold(None, |best: Option<&ComboScore>, s| match best {
                Some(b) if b.mean_score >= s.mean_score => Some(b),
                _ => Some(s),
            })
            .cloned();

        let Some(best) = best else {
            return Err(last_error.unwrap_or_else(|| {
                ScoreError::TrainingError(format!("no combination of {} produced a score", self.kind))
            }));
        };

        let mut best_estimator = self.kind.build(&best.params, self.random_state)?;
        best_estimator.fit(x, y)?;

        Ok(GridSearchResult {
            best_params: best.params,
            best_score: best.mean_score,
            best_estimator,
            scores,
        })
    }

    fn score_fold(&self, params: &Params, x: &Array2<f64>, y: &Array1<f64>, split: &CVSplit) -> Result<f64> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_val = x.select(Axis(0), &split.test_indices);
        let y_val = y.select(Axis(0), &split.test_indices);

        let mut model = self.kind.build(params, self.random_state)?;
        model.fit(&x_train, &y_train)?;
        r2_score(&y_val, &model.predict(&x_val)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::params::ParamValue;

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * (j + 2)) % 19) as f64);
        let y = Array1::from_shape_fn(n, |i| 2.0 * x[[i, 0]] - x[[i, 1]] + 1.0);
        (x, y)
    }

    #[test]
    fn test_empty_grid_runs_once() {
        let (x, y) = linear_data(60);
        let result = GridSearchCV::new(ModelKind::LinearRegression, ParamGrid::new())
            .fit(&x, &y)
            .unwrap();
        assert_eq!(result.scores.len(), 1);
        assert_eq!(result.scores[0].fold_scores.len(), 3);
        assert!(result.best_score > 0.99);
        assert!(result.best_params.is_empty());
    }

    #[test]
    fn test_deeper_tree_wins() {
        let (x, y) = linear_data(90);
        let grid = ParamGrid::new().param("max_depth", [1i64, 6]);
        let result = GridSearchCV::new(ModelKind::DecisionTree, grid).fit(&x, &y).unwrap();
        assert_eq!(result.scores.len(), 2);
        assert_eq!(result.best_params.get("max_depth"), Some(&ParamValue::Int(6)));
    }

    #[test]
    fn test_ties_keep_first_combination() {
        // A constant target is fitted exactly under either criterion.
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(30, 1.0);
        let grid = ParamGrid::new().param("criterion", ["squared_error", "friedman_mse"]);
        let result = GridSearchCV::new(ModelKind::DecisionTree, grid).fit(&x, &y).unwrap();
        assert_eq!(result.scores[0].mean_score, result.scores[1].mean_score);
        assert_eq!(result.best_params.get("criterion"), Some(&ParamValue::from("squared_error")));
    }

    #[test]
    fn test_failed_combinations_are_skipped() {
        let (x, y) = linear_data(60);
        let grid = ParamGrid::new().param("subsample", [1.5, 0.8]).param("n_estimators", [4i64]);
        let result = GridSearchCV::new(ModelKind::GradientBoosting, grid).fit(&x, &y).unwrap();
        assert_eq!(result.scores.len(), 1);
        assert_eq!(result.best_params.get("subsample"), Some(&ParamValue::Float(0.8)));
    }

    #[test]
    fn test_all_failed_combinations_error() {
        let (x, y) = linear_data(60);
        let grid = ParamGrid::new().param("subsample", [1.5, 2.0]);
        let result = GridSearchCV::new(ModelKind::GradientBoosting, grid).fit(&x, &y);
        assert!(matches!(result, Err(ScoreError::InvalidParameter { .. })));
    }
}
