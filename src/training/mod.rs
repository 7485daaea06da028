//! Model training and selection
//!
//! Provides the regressors compared during model selection:
//! - Ordinary least squares
//! - Decision trees and Random Forests
//! - Gradient boosting, XGBoost, CatBoost
//! - AdaBoost.R2
//!
//! plus grid search with k-fold cross-validation and the [`ModelTrainer`]
//! that picks, logs and persists the winner.

pub mod adaboost;
pub mod catboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod estimator;
pub mod gradient_boosting;
pub mod grid_search;
pub mod linear_models;
pub mod metrics;
pub mod params;
pub mod random_forest;
pub mod roster;
pub mod trainer;
pub mod xgboost;

pub use adaboost::AdaBoostRegressor;
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use cross_validation::{CVSplit, KFold};
pub use decision_tree::{Criterion, DecisionTreeRegressor, TreeNode};
pub use estimator::{Estimator, ModelKind, Regressor};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use grid_search::{ComboScore, GridSearchCV, GridSearchResult};
pub use linear_models::LinearRegression;
pub use metrics::{r2_score, RegressionMetrics};
pub use params::{ParamGrid, ParamValue, Params};
pub use random_forest::RandomForestRegressor;
pub use roster::{default_roster, Candidate, Roster};
pub use trainer::{
    split_target, ModelReport, ModelTrainer, ReportEntry, TrainedArtifact, TrainerConfig, TrainingOutcome,
    MODEL_KIND,
};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
