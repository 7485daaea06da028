//! Estimator kinds and the common regressor interface

use super::adaboost::AdaBoostRegressor;
use super::catboost::{CatBoostConfig, CatBoostRegressor};
use super::decision_tree::{Criterion, DecisionTreeRegressor};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::linear_models::LinearRegression;
use super::params::Params;
use super::random_forest::RandomForestRegressor;
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fit/predict contract shared by every estimator.
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    DecisionTree,
    RandomForest,
    GradientBoosting,
    XGBoost,
    CatBoost,
    AdaBoost,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::XGBoost => "xgboost",
            ModelKind::CatBoost => "catboost",
            ModelKind::AdaBoost => "adaboost",
        }
    }

    /// Hyperparameters this kind accepts.
    pub fn allowed_params(&self) -> &'static [&'static str] {
        match self {
            ModelKind::LinearRegression => &[],
            ModelKind::DecisionTree => &["criterion", "max_depth", "min_samples_leaf"],
            ModelKind::RandomForest => &["n_estimators", "criterion", "max_depth", "min_samples_leaf"],
            ModelKind::GradientBoosting => &["n_estimators", "learning_rate", "subsample", "max_depth"],
            ModelKind::XGBoost => &["n_estimators", "learning_rate", "max_depth", "subsample", "reg_lambda"],
            ModelKind::CatBoost => &["iterations", "learning_rate", "depth", "l2_leaf_reg"],
            ModelKind::AdaBoost => &["n_estimators", "learning_rate"],
        }
    }

    /// Unfitted estimator configured from `params`; unset parameters keep
    /// their defaults and unknown names are rejected.
    pub fn build(&self, params: &Params, seed: u64) -> Result<Estimator> {
        params.ensure_known(self.allowed_params())?;

        let estimator = match self {
            ModelKind::LinearRegression => Estimator::Linear(LinearRegression::new()),
            ModelKind::DecisionTree => {
                let mut tree = DecisionTreeRegressor::new()
                    .with_criterion(Criterion::parse(params.str_or("criterion", "squared_error")?)?)
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?);
                if params.get("max_depth").is_some() {
                    tree = tree.with_max_depth(params.usize_or("max_depth", 0)?);
                }
                Estimator::DecisionTree(tree)
            }
            ModelKind::RandomForest => {
                let mut forest = RandomForestRegressor::new()
                    .with_n_estimators(params.usize_or("n_estimators", 100)?)
                    .with_random_state(seed);
                forest.criterion = Criterion::parse(params.str_or("criterion", "squared_error")?)?;
                forest.min_samples_leaf = params.usize_or("min_samples_leaf", 1)?.max(1);
                if params.get("max_depth").is_some() {
                    forest = forest.with_max_depth(params.usize_or("max_depth", 0)?);
                }
                Estimator::RandomForest(forest)
            }
            ModelKind::GradientBoosting => {
                let defaults = GradientBoostingConfig::default();
                Estimator::GradientBoosting(GradientBoostingRegressor::new(GradientBoostingConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelKind::XGBoost => {
                let defaults = XGBoostConfig::default();
                Estimator::XGBoost(XGBoostRegressor::new(XGBoostConfig {
                    n_estimators: params.usize_or("n_estimators", defaults.n_estimators)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    max_depth: params.usize_or("max_depth", defaults.max_depth)?,
                    subsample: params.f64_or("subsample", defaults.subsample)?,
                    reg_lambda: params.f64_or("reg_lambda", defaults.reg_lambda)?,
                    random_state: seed,
                    ..defaults
                }))
            }
            ModelKind::CatBoost => {
                let defaults = CatBoostConfig::default();
                Estimator::CatBoost(CatBoostRegressor::new(CatBoostConfig {
                    iterations: params.usize_or("iterations", defaults.iterations)?,
                    learning_rate: params.f64_or("learning_rate", defaults.learning_rate)?,
                    depth: params.usize_or("depth", defaults.depth)?,
                    l2_leaf_reg: params.f64_or("l2_leaf_reg", defaults.l2_leaf_reg)?,
                    ..defaults
                }))
            }
            ModelKind::AdaBoost => Estimator::AdaBoost(
                AdaBoostRegressor::new(
                    params.usize_or("n_estimators", 50)?,
                    params.f64_or("learning_rate", 1.0)?,
                )
                .with_random_state(seed),
            ),
        };

        Ok(estimator)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any supported estimator, fitted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    Linear(LinearRegression),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    GradientBoosting(GradientBoostingRegressor),
    XGBoost(XGBoostRegressor),
    CatBoost(CatBoostRegressor),
    AdaBoost(AdaBoostRegressor),
}

impl Estimator {
    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::Linear(_) => ModelKind::LinearRegression,
            Estimator::DecisionTree(_) => ModelKind::DecisionTree,
            Estimator::RandomForest(_) => ModelKind::RandomForest,
            Estimator::GradientBoosting(_) => ModelKind::GradientBoosting,
            Estimator::XGBoost(_) => ModelKind::XGBoost,
            Estimator::CatBoost(_) => ModelKind::CatBoost,
            Estimator::AdaBoost(_) => ModelKind::AdaBoost,
        }
    }
}

impl Regressor for Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::Linear(m) => m.fit(x, y).map(|_| ()),
            Estimator::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            Estimator::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Estimator::GradientBoosting(m) => m.fit(x, y),
            Estimator::XGBoost(m) => m.fit(x, y),
            Estimator::CatBoost(m) => m.fit(x, y),
            Estimator::AdaBoost(m) => m.fit(x, y).map(|_| ()),
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::Linear(m) => m.predict(x),
            Estimator::DecisionTree(m) => m.predict(x),
            Estimator::RandomForest(m) => m.predict(x),
            Estimator::GradientBoosting(m) => m.predict(x),
            Estimator::XGBoost(m) => m.predict(x),
            Estimator::CatBoost(m) => m.predict(x),
            Estimator::AdaBoost(m) => m.predict(x),
        }
    }
}
