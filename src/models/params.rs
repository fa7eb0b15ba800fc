//! Hyperparameter values handed to a classifier fit.
//!
//! A `ParamSet` is one point of a family's search space. Families read the
//! keys they understand and fall back to their defaults for absent keys.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicit "no limit" (e.g. unbounded tree depth)
    None,
    Int(i64),
    Float(f64),
    Text(String),
    /// Layer widths for feed-forward nets
    Layers(Vec<usize>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => write!(f, "None"),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::Layers(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Option<i64>> for ParamValue {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Self::None, Self::Int)
    }
}

impl From<Vec<usize>> for ParamValue {
    fn from(v: Vec<usize>) -> Self {
        Self::Layers(v)
    }
}

/// Named parameter values for one candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Positive integer parameter, `default` when absent
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v >= 1 => Ok(*v as usize),
            Some(other) => Err(invalid(name, other, "expected a positive integer")),
        }
    }

    /// Optional positive integer; `ParamValue::None` means unbounded
    pub fn opt_usize_or(&self, name: &str, default: Option<usize>) -> Result<Option<usize>, ModelError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::None) => Ok(None),
            Some(ParamValue::Int(v)) if *v >= 1 => Ok(Some(*v as usize)),
            Some(other) => Err(invalid(name, other, "expected a positive integer or None")),
        }
    }

    /// Finite float parameter, `default` when absent
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        let value = match self.get(name) {
            None => return Ok(default),
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f64,
            Some(other) => return Err(invalid(name, other, "expected a number")),
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(name, &ParamValue::Float(value), "must be finite"))
        }
    }

    /// One of `choices`, `choices[0]` when absent
    pub fn choice_or<'a>(&self, name: &str, choices: &[&'a str]) -> Result<&'a str, ModelError> {
        match self.get(name) {
            None => Ok(choices[0]),
            Some(ParamValue::Text(v)) => choices
                .iter()
                .find(|c| **c == v.as_str())
                .copied()
                .ok_or_else(|| invalid(name, &ParamValue::Text(v.clone()), "unsupported choice")),
            Some(other) => Err(invalid(name, other, "expected a string choice")),
        }
    }

    pub fn layers_or(&self, name: &str, default: &[usize]) -> Result<Vec<usize>, ModelError> {
        match self.get(name) {
            None => Ok(default.to_vec()),
            Some(ParamValue::Layers(v)) if !v.is_empty() && v.iter().all(|&w| w > 0) => Ok(v.clone()),
            Some(other) => Err(invalid(name, other, "expected non-empty layer widths")),
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> ModelError {
    ModelError::InvalidParameter {
        name: name.to_string(),
        reason: format!("{} ({})", reason, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let params = ParamSet::new();
        assert_eq!(params.usize_or("n_neighbors", 5).unwrap(), 5);
        assert_eq!(params.opt_usize_or("max_depth", None).unwrap(), None);
        assert_eq!(params.choice_or("weights", &["uniform", "distance"]).unwrap(), "uniform");
    }

    #[test]
    fn test_typed_reads() {
        let params = ParamSet::new()
            .with("max_depth", None::<i64>)
            .with("C", 0.1)
            .with("activation", "relu")
            .with("hidden_layer_sizes", vec![50, 100, 50]);
        assert_eq!(params.opt_usize_or("max_depth", Some(3)).unwrap(), None);
        assert_eq!(params.f64_or("C", 1.0).unwrap(), 0.1);
        assert_eq!(params.choice_or("activation", &["tanh", "relu"]).unwrap(), "relu");
        assert_eq!(params.layers_or("hidden_layer_sizes", &[100]).unwrap(), vec![50, 100, 50]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let params = ParamSet::new().with("k", 0i64).with("solver", "lbfgs");
        assert!(matches!(
            params.usize_or("k", 3),
            Err(ModelError::InvalidParameter { .. })
        ));
        assert!(params.choice_or("solver", &["sgd", "adam"]).is_err());
    }

    #[test]
    fn test_display_is_sorted() {
        let params = ParamSet::new().with("b", 2i64).with("a", 1.5);
        assert_eq!(params.to_string(), "{a: 1.5, b: 2}");
    }
}
