//! Hyperparameter values, parameter sets and grids

use crate::error::{Result, ScoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Int(v) => serde_json::json!(v),
            ParamValue::Float(v) => serde_json::json!(v),
            ParamValue::Text(v) => serde_json::json!(v),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// One concrete hyperparameter assignment, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: String, value: ParamValue) {
        match self.0.binary_search_by(|(k, _)| k.as_str().cmp(&name)) {
            Ok(pos) => self.0[pos].1 = value,
            Err(pos) => self.0.insert(pos, (name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0
            .binary_search_by(|(k, _)| k.as_str().cmp(name))
            .ok()
            .map(|pos| &self.0[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Float value; integers are widened.
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(invalid(name, other, "expected a number")),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 0 => Ok(*v as usize),
            Some(other) => Err(invalid(name, other, "expected a non-negative integer")),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(invalid(name, other, "expected a string")),
        }
    }

    /// Reject names outside `allowed`.
    pub fn ensure_known(&self, allowed: &[&str]) -> Result<()> {
        for (name, value) in self.iter() {
            if !allowed.contains(&name) {
                return Err(invalid(name, value, "unknown parameter for this estimator"));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> ScoreError {
    ScoreError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Candidate values per hyperparameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid(Vec<(String, Vec<ParamValue>)>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.0
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every assignment, keys in sorted order with the last key varying
    /// fastest. An empty grid yields a single empty assignment.
    pub fn combinations(&self) -> Result<Vec<Params>> {
        let mut axes: Vec<&(String, Vec<ParamValue>)> = self.0.iter().collect();
        axes.sort_by(|a, b| a.0.cmp(&b.0));

        for pair in axes.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ScoreError::ConfigError(format!(
                    "parameter '{}' appears twice in grid",
                    pair[0].0
                )));
            }
        }

        let mut combos = vec![Params::new()];
        for (name, values) in axes {
            if values.is_empty() {
                return Err(ScoreError::ConfigError(format!(
                    "parameter '{}' has no candidate values",
                    name
                )));
            }
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for base in &combos {
                for value in values {
                    next.push(base.clone().with(name.clone(), value.clone()));
                }
            }
            combos = next;
        }

        Ok(combos)
    }

    pub fn n_combinations(&self) -> usize {
        self.0.iter().map(|(_, v)| v.len()).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grid_has_one_combination() {
        let combos = ParamGrid::new().combinations().unwrap();
        assert_eq!(combos, vec![Params::new()]);
    }

    #[test]
    fn test_combination_order() {
        let grid = ParamGrid::new()
            .param("n_estimators", [8i64, 16])
            .param("learning_rate", [0.1, 0.01]);
        let combos = grid.combinations().unwrap();

        assert_eq!(combos.len(), 4);
        assert_eq!(grid.n_combinations(), 4);
        assert_eq!(combos[0].to_string(), "{learning_rate=0.1, n_estimators=8}");
        assert_eq!(combos[1].to_string(), "{learning_rate=0.1, n_estimators=16}");
        assert_eq!(combos[3].to_string(), "{learning_rate=0.01, n_estimators=16}");
    }

    #[test]
    fn test_empty_value_list_rejected() {
        let grid = ParamGrid::new().param("depth", Vec::<i64>::new());
        assert!(grid.combinations().is_err());
    }

    #[test]
    fn test_typed_getters() {
        let params = Params::new()
            .with("criterion", "poisson")
            .with("n_estimators", 32i64)
            .with("learning_rate", 0.05);

        assert_eq!(params.str_or("criterion", "squared_error").unwrap(), "poisson");
        assert_eq!(params.usize_or("n_estimators", 100).unwrap(), 32);
        assert_eq!(params.f64_or("learning_rate", 0.1).unwrap(), 0.05);
        assert_eq!(params.f64_or("subsample", 1.0).unwrap(), 1.0);
        assert!(params.usize_or("criterion", 1).is_err());
        assert!(params.ensure_known(&["criterion"]).is_err());
    }

    #[test]
    fn test_to_json() {
        let params = Params::new().with("depth", 6i64);
        assert_eq!(params.to_json(), serde_json::json!({"depth": 6}));
    }
}
