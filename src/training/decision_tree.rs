//! CART regression tree

use crate::error::{Result, ScoreError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

impl TreeNode {
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Split quality criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Variance reduction, mean leaves
    SquaredError,
    /// Variance reduction with Friedman's improvement score
    FriedmanMse,
    /// Absolute deviation from the median, median leaves
    AbsoluteError,
    /// Half Poisson deviance; targets must be non-negative
    Poisson,
}

impl Criterion {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "squared_error" => Ok(Criterion::SquaredError),
            "friedman_mse" => Ok(Criterion::FriedmanMse),
            "absolute_error" => Ok(Criterion::AbsoluteError),
            "poisson" => Ok(Criterion::Poisson),
            other => Err(ScoreError::InvalidParameter {
                name: "criterion".to_string(),
                value: other.to_string(),
                reason: "expected squared_error, friedman_mse, absolute_error or poisson".to_string(),
            }),
        }
    }
}

/// Regression tree grown greedily to `max_depth` (unbounded by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: Criterion,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: Criterion::SquaredError,
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_on(x, y, &indices)
    }

    /// Fit on the rows listed in `indices`; repeats act as sample weights.
    pub fn fit_on(&mut self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(ScoreError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(ScoreError::ValidationError("cannot fit a tree on zero samples".to_string()));
        }
        if self.criterion == Criterion::Poisson {
            if indices.iter().any(|&i| y[i] < 0.0) {
                return Err(ScoreError::ValidationError(
                    "Poisson criterion requires non-negative targets".to_string(),
                ));
            }
            if indices.iter().map(|&i| y[i]).sum::<f64>() <= 0.0 {
                return Err(ScoreError::ValidationError(
                    "Poisson criterion requires a positive target sum".to_string(),
                ));
            }
        }

        self.n_features = x.ncols();
        self.root = Some(self.build(x, y, indices.to_vec(), 0));
        Ok(self)
    }

    fn build(&self, x: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let values: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_constant(&values);

        if !should_stop {
            if let Some(split) = self.find_best_split(x, y, &indices) {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

                let left = Box::new(self.build(x, y, left_idx, depth + 1));
                let right = Box::new(self.build(x, y, right_idx, depth + 1));
                return TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    left,
                    right,
                    n_samples,
                };
            }
        }

        TreeNode::Leaf {
            value: self.leaf_value(values),
            n_samples,
        }
    }

    fn leaf_value(&self, values: Vec<f64>) -> f64 {
        match self.criterion {
            Criterion::AbsoluteError => median(values),
            _ => values.iter().sum::<f64>() / values.len() as f64,
        }
    }

    /// Best split over all features. Features are scanned in parallel and
    /// the winner is the highest score, lowest feature index on ties.
    fn find_best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<SplitCandidate> {
        let candidates: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut sorted: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                self.scan_feature(feature_idx, &sorted)
            })
            .collect();

        candidates.into_iter().flatten().fold(None, |best: Option<SplitCandidate>, c| match best {
            Some(b) if b.score >= c.score => Some(b),
            _ => Some(c),
        })
    }

    /// Sweep the thresholds of one feature. `sorted` pairs (x, y) by x.
    fn scan_feature(&self, feature_idx: usize, sorted: &[(f64, f64)]) -> Option<SplitCandidate> {
        let n = sorted.len();
        let min_leaf = self.min_samples_leaf;
        let total_sum: f64 = sorted.iter().map(|p| p.1).sum();

        let parent_cost = self.cost_of(sorted.iter().map(|p| p.1));
        let mut best: Option<SplitCandidate> = None;

        let mut left_sum = 0.0;
        let mut left_sorted: Vec<f64> = Vec::new();
        let mut right_sorted: Vec<f64> = Vec::new();
        if self.criterion == Criterion::AbsoluteError {
            right_sorted = sorted.iter().map(|p| p.1).collect();
            right_sorted.sort_by(|a, b| a.total_cmp(b));
        }

        for i in 1..n {
            let yi = sorted[i - 1].1;
            left_sum += yi;
            if self.criterion == Criterion::AbsoluteError {
                insert_sorted(&mut left_sorted, yi);
                remove_sorted(&mut right_sorted, yi);
            }

            if i < min_leaf || n - i < min_leaf || sorted[i - 1].0 >= sorted[i].0 {
                continue;
            }

            let (n_l, n_r) = (i as f64, (n - i) as f64);
            let right_sum = total_sum - left_sum;

            let score = match self.criterion {
                Criterion::SquaredError => {
                    left_sum * left_sum / n_l + right_sum * right_sum / n_r - total_sum * total_sum / n as f64
                }
                Criterion::FriedmanMse => {
                    let diff = left_sum / n_l - right_sum / n_r;
                    n_l * n_r * diff * diff / n as f64
                }
                Criterion::Poisson => {
                    if left_sum <= 0.0 || right_sum <= 0.0 {
                        continue;
                    }
                    left_sum * (left_sum / n_l).ln() + right_sum * (right_sum / n_r).ln()
                        - total_sum * (total_sum / n as f64).ln()
                }
                Criterion::AbsoluteError => {
                    parent_cost - abs_deviation(&left_sorted) - abs_deviation(&right_sorted)
                }
            };

            if score > 1e-12 && best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (sorted[i - 1].0 + sorted[i].0) / 2.0,
                    score,
                });
            }
        }

        best
    }

    fn cost_of(&self, values: impl Iterator<Item = f64>) -> f64 {
        match self.criterion {
            Criterion::AbsoluteError => {
                let mut v: Vec<f64> = values.collect();
                v.sort_by(|a, b| a.total_cmp(b));
                abs_deviation(&v)
            }
            _ => 0.0,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(ScoreError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(ScoreError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| root.predict_row(row)).collect())
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    score: f64,
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-12)
}

pub(crate) fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Sum of absolute deviations from the median of an already sorted slice.
fn abs_deviation(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    let med = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    sorted.iter().map(|v| (v - med).abs()).sum()
}

fn insert_sorted(values: &mut Vec<f64>, v: f64) {
    let pos = values.partition_point(|x| x.total_cmp(&v) == Ordering::Less);
    values.insert(pos, v);
}

fn remove_sorted(values: &mut Vec<f64>, v: f64) {
    let pos = values.partition_point(|x| x.total_cmp(&v) == Ordering::Less);
    if pos < values.len() {
        values.remove(pos);
    }
}
