//! CatBoost-style boosting with oblivious (symmetric) trees
//!
//! Every level of a tree applies one (feature, border) split to all nodes, so
//! a tree of depth `d` is `d` splits plus `2^d` leaf values. Features are
//! quantized once into at most `border_count` borders; each level is chosen
//! from per-leaf gradient histograms.

use crate::error::{Result, ScoreError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    pub depth: usize,
    /// L2 regularization of leaf values
    pub l2_leaf_reg: f64,
    pub border_count: usize,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 254,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values[idx]
    }
}

/// Per-feature borders and the bin of every training sample.
struct Quantized {
    borders: Vec<Vec<f64>>,
    bins: Vec<Vec<u16>>,
}

fn quantize(x: &Array2<f64>, border_count: usize) -> Quantized {
    let (borders, bins): (Vec<Vec<f64>>, Vec<Vec<u16>>) = x
        .columns()
        .into_iter()
        .map(|col| {
            let mut values: Vec<f64> = col.to_vec();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();

            let gaps = values.len().saturating_sub(1);
            let mut borders: Vec<f64> = if gaps <= border_count {
                values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
            } else {
                (1..=border_count)
                    .map(|k| {
                        let pos = k * gaps / (border_count + 1);
                        (values[pos] + values[pos + 1]) / 2.0
                    })
                    .collect()
            };
            borders.dedup();

            let bins = col
                .iter()
                .map(|&v| borders.partition_point(|&b| b < v) as u16)
                .collect();
            (borders, bins)
        })
        .unzip();

    Quantized { borders, bins }
}

fn leaf_score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

/// Best border of one feature, summed over all current leaves.
fn best_border(
    bins: &[u16],
    n_borders: usize,
    buckets: &[Vec<usize>],
    grad: &[f64],
    lambda: f64,
) -> Option<(usize, f64)> {
    if n_borders == 0 {
        return None;
    }

    // Gain of a bucket is piecewise constant in the border index; accumulate
    // its changes in a difference array and prefix-sum once.
    let mut diff = vec![0.0f64; n_borders + 1];
    for bucket in buckets.iter().filter(|b| b.len() > 1) {
        let mut entries: Vec<(u16, f64)> = bucket.iter().map(|&i| (bins[i], grad[i])).collect();
        entries.sort_by_key(|e| e.0);

        let g_total: f64 = entries.iter().map(|e| e.1).sum();
        let h_total = entries.len() as f64;
        let parent = leaf_score(g_total, h_total, lambda);

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        let mut previous_gain = 0.0;
        let mut k = 0;
        while k < entries.len() {
            let bin = entries[k].0;
            while k < entries.len() && entries[k].0 == bin {
                g_left += entries[k].1;
                h_left += 1.0;
                k += 1;
            }
            let gain = leaf_score(g_left, h_left, lambda)
                + leaf_score(g_total - g_left, h_total - h_left, lambda)
                - parent;
            let at = bin as usize;
            if at < n_borders {
                diff[at] += gain - previous_gain;
            }
            previous_gain = gain;
        }
    }

    let mut best: Option<(usize, f64)> = None;
    let mut running = 0.0;
    for (t, d) in diff.iter().take(n_borders).enumerate() {
        running += d;
        if running > 1e-12 && best.map_or(true, |(_, g)| running > g) {
            best = Some((t, running));
        }
    }
    best
}

fn build_symmetric_tree(q: &Quantized, grad: &[f64], n_samples: usize, config: &CatBoostConfig) -> SymmetricTree {
    let mut splits = Vec::with_capacity(config.depth);
    let mut buckets: Vec<Vec<usize>> = vec![(0..n_samples).collect()];

    for _ in 0..config.depth {
        let candidates: Vec<Option<(usize, usize, f64)>> = (0..q.borders.len())
            .into_par_iter()
            .map(|f| {
                best_border(&q.bins[f], q.borders[f].len(), &buckets, grad, config.l2_leaf_reg)
                    .map(|(t, gain)| (f, t, gain))
            })
            .collect();
        let best = candidates.into_iter().flatten().fold(None, |best: Option<(usize, usize, f64)>, c| match best {
            Some(b) if b.2 >= c.2 => Some(b),
            _ => Some(c),
        });

        let Some((feature, border_idx, _)) = best else {
            break;
        };
        let bins = &q.bins[feature];
        let mut next = Vec::with_capacity(buckets.len() * 2);
        for bucket in &buckets {
            let (left, right): (Vec<usize>, Vec<usize>) =
                bucket.iter().partition(|&&i| bins[i] as usize <= border_idx);
            next.push(left);
            next.push(right);
        }
        buckets = next;
        splits.push((feature, q.borders[feature][border_idx]));
    }

    let leaf_values = buckets
        .iter()
        .map(|bucket| {
            let g: f64 = bucket.iter().map(|&i| grad[i]).sum();
            -g / (bucket.len() as f64 + config.l2_leaf_reg)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &CatBoostConfig {
        &self.config
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() || n_samples == 0 {
            return Err(ScoreError::ShapeError {
                expected: format!("y length = {} (non-empty)", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.config.iterations == 0 || !(self.config.learning_rate > 0.0) || self.config.depth == 0 {
            return Err(ScoreError::InvalidParameter {
                name: "iterations/learning_rate/depth".to_string(),
                value: format!(
                    "{}/{}/{}",
                    self.config.iterations, self.config.learning_rate, self.config.depth
                ),
                reason: "all must be positive".to_string(),
            });
        }
        if self.config.depth > 16 {
            return Err(ScoreError::InvalidParameter {
                name: "depth".to_string(),
                value: self.config.depth.to_string(),
                reason: "must be at most 16".to_string(),
            });
        }

        self.n_features = x.ncols();
        self.base_prediction = y.mean().unwrap_or(0.0);
        let quantized = quantize(x, self.config.border_count.clamp(1, u16::MAX as usize - 1));
        let mut preds = Array1::from_elem(n_samples, self.base_prediction);

        let mut trees = Vec::with_capacity(self.config.iterations);
        for _ in 0..self.config.iterations {
            let grad: Vec<f64> = preds.iter().zip(y.iter()).map(|(p, t)| p - t).collect();
            let tree = build_symmetric_tree(&quantized, &grad, n_samples, &self.config);
            for (i, row) in x.rows().into_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        self.trees = trees;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ScoreError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ScoreError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self
                        .trees
                        .iter()
                        .map(|t| self.config.learning_rate * t.predict(row))
                        .sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::metrics::r2_score;

    #[test]
    fn test_quantize_small_cardinality() {
        let x = ndarray::array![[1.0], [3.0], [3.0], [5.0]];
        let q = quantize(&x, 254);
        assert_eq!(q.borders[0], vec![2.0, 4.0]);
        assert_eq!(q.bins[0], vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_quantize_caps_borders() {
        let x = Array2::from_shape_fn((1000, 1), |(i, _)| i as f64);
        let q = quantize(&x, 16);
        assert_eq!(q.borders[0].len(), 16);
        assert!(q.borders[0].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_fits_additive_target() {
        let x = Array2::from_shape_fn((200, 3), |(i, j)| ((i * (2 * j + 1)) % 23) as f64);
        let y = Array1::from_shape_fn(200, |i| 3.0 * x[[i, 0]] + (x[[i, 1]] - 10.0).abs());

        let mut model = CatBoostRegressor::new(CatBoostConfig::default());
        model.fit(&x, &y).unwrap();
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.95, "r2 = {}", r2);
    }

    #[test]
    fn test_tree_has_full_leaf_table() {
        let x = Array2::from_shape_fn((64, 2), |(i, j)| (i + j * 7) as f64 % 13.0);
        let y = Array1::from_shape_fn(64, |i| i as f64);
        let mut model = CatBoostRegressor::new(CatBoostConfig {
            iterations: 1,
            depth: 3,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let tree = &model.trees[0];
        assert_eq!(tree.leaf_values.len(), 1 << tree.splits.len());
    }
}
