//! Candidate models and their hyperparameter grids

use super::estimator::ModelKind;
use super::params::ParamGrid;
use crate::error::{Result, ScoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named estimator kind together with the grid it is tuned over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub kind: ModelKind,
    pub grid: ParamGrid,
}

impl Candidate {
    pub fn new(name: impl Into<String>, kind: ModelKind, grid: ParamGrid) -> Self {
        Self {
            name: name.into(),
            kind,
            grid,
        }
    }
}

/// Ordered set of candidates with unique names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    candidates: Vec<Candidate>,
}

impl Roster {
    pub fn new(candidates: Vec<Candidate>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(ScoreError::ConfigError("roster has no candidates".to_string()));
        }

        let mut seen = HashSet::new();
        for candidate in &candidates {
            if !seen.insert(candidate.name.as_str()) {
                return Err(ScoreError::ConfigError(format!(
                    "duplicate candidate name '{}'",
                    candidate.name
                )));
            }
            for params in candidate.grid.combinations()? {
                params.ensure_known(candidate.kind.allowed_params())?;
            }
        }

        Ok(Self { candidates })
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.name == name)
    }
}

const N_ESTIMATORS: [i64; 6] = [8, 16, 32, 64, 128, 256];
const LEARNING_RATES: [f64; 4] = [0.1, 0.01, 0.05, 0.001];

/// The seven regressors compared for student score prediction.
pub fn default_roster() -> Roster {
    let candidates = vec![
        Candidate::new("Linear Regression", ModelKind::LinearRegression, ParamGrid::new()),
        Candidate::new(
            "Decision Tree",
            ModelKind::DecisionTree,
            ParamGrid::new().param(
                "criterion",
                ["squared_error", "friedman_mse", "absolute_error", "poisson"],
            ),
        ),
        Candidate::new(
            "Random Forest",
            ModelKind::RandomForest,
            ParamGrid::new().param("n_estimators", N_ESTIMATORS),
        ),
        Candidate::new(
            "Gradient Boosting",
            ModelKind::GradientBoosting,
            ParamGrid::new()
                .param("learning_rate", LEARNING_RATES)
                .param("subsample", [0.6, 0.7, 0.75, 0.8, 0.85, 0.9])
                .param("n_estimators", N_ESTIMATORS),
        ),
        Candidate::new(
            "XGBRegressor",
            ModelKind::XGBoost,
            ParamGrid::new()
                .param("learning_rate", LEARNING_RATES)
                .param("n_estimators", N_ESTIMATORS),
        ),
        Candidate::new(
            "CatBoosting Regressor",
            ModelKind::CatBoost,
            ParamGrid::new()
                .param("depth", [6i64, 8, 10])
                .param("learning_rate", LEARNING_RATES)
                .param("iterations", [30i64, 50, 100]),
        ),
        Candidate::new(
            "AdaBoost Regressor",
            ModelKind::AdaBoost,
            ParamGrid::new()
                .param("learning_rate", LEARNING_RATES)
                .param("n_estimators", N_ESTIMATORS),
        ),
    ];

    Roster { candidates }
}

impl Default for Roster {
    fn default() -> Self {
        default_roster()
    }
}
