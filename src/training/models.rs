//! Classifier contract, parameter values and evaluation metrics

use crate::error::{Result, StackingError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value, as exposed to parameter search tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

/// Parameter name -> value, ordered so listings are stable
pub type ParamMap = BTreeMap<String, ParamValue>;

impl ParamValue {
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(other.invalid(name, "expected a number")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(other.invalid(name, "expected a non-negative integer")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(other.invalid(name, "expected a boolean")),
        }
    }

    /// `None` or a non-negative integer
    pub fn as_opt_u64(&self, name: &str) -> Result<Option<u64>> {
        match self {
            ParamValue::None => Ok(None),
            ParamValue::Int(v) if *v >= 0 => Ok(Some(*v as u64)),
            other => Err(other.invalid(name, "expected None or a non-negative integer")),
        }
    }

    pub fn as_opt_usize(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.as_opt_u64(name)?.map(|v| v as usize))
    }

    pub fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Str(s) => Ok(s.as_str()),
            other => Err(other.invalid(name, "expected a string")),
        }
    }

    pub(crate) fn invalid(&self, name: &str, reason: &str) -> StackingError {
        StackingError::InvalidParameter {
            name: name.to_string(),
            value: self.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => write!(f, "None"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{:?}", v),
            ParamValue::List(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::None)
    }
}

/// Capability contract every base or meta learner fulfils.
///
/// Labels are class values stored as `f64`. `predict_proba` returns one column
/// per entry of [`Classifier::classes`], in the same order.
pub trait Classifier: Send + Sync {
    /// Lowercase type name used for parameter addressing, e.g. `gaussiannb`
    fn name(&self) -> String;

    /// Fit on `x`/`y`, optionally weighting samples
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()>;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Predict per-class probabilities
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let _ = x;
        Err(StackingError::ConfigError(format!(
            "{} does not provide class probabilities",
            self.name()
        )))
    }

    /// Sorted class values seen during the last fit
    fn classes(&self) -> Result<Vec<f64>>;

    /// Whether `fit` honours `sample_weight`
    fn supports_sample_weight(&self) -> bool;

    /// Unfitted copy carrying the same hyperparameters
    fn clone_unfitted(&self) -> Box<dyn Classifier>;

    /// Current hyperparameters
    fn params(&self) -> ParamMap;

    /// Set one hyperparameter by name
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()>;

    /// Fraction of correctly predicted labels
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        ModelMetrics::accuracy(y, &y_pred)
    }
}

impl fmt::Debug for dyn Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("name", &self.name())
            .field("params", &self.params())
            .finish()
    }
}

/// Sorted, deduplicated class values of a label vector
pub fn unique_classes(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.iter().copied().collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    classes.dedup();
    classes
}

/// Index of the largest entry of each row mapped to its class value
pub(crate) fn argmax_classes(proba: &Array2<f64>, classes: &[f64]) -> Array1<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            let best = row
                .iter()
                .enumerate()
                .fold((0usize, f64::NEG_INFINITY), |best, (i, &p)| {
                    if p > best.1 {
                        (i, p)
                    } else {
                        best
                    }
                })
                .0;
            classes.get(best).copied().unwrap_or(0.0)
        })
        .collect()
}

/// Resolve optional weights into an explicit per-sample vector
pub(crate) fn resolve_weights(
    n_samples: usize,
    sample_weight: Option<&Array1<f64>>,
) -> Result<Array1<f64>> {
    match sample_weight {
        Some(w) => {
            if w.len() != n_samples {
                return Err(StackingError::length_mismatch("sample_weight", n_samples, w.len()));
            }
            if w.iter().any(|&v| !v.is_finite() || v < 0.0) {
                return Err(StackingError::ValidationError(
                    "sample_weight must be finite and non-negative".to_string(),
                ));
            }
            Ok(w.clone())
        }
        None => Ok(Array1::ones(n_samples)),
    }
}

/// Metrics for model evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: Option<f64>,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Fraction of exact label matches
    pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
        if y_true.len() != y_pred.len() {
            return Err(StackingError::length_mismatch("y_pred", y_true.len(), y_pred.len()));
        }
        if y_true.is_empty() {
            return Err(StackingError::ValidationError(
                "cannot score an empty label vector".to_string(),
            ));
        }
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (*t - *p).abs() < 0.5)
            .count();
        Ok(correct as f64 / y_true.len() as f64)
    }

    /// Compute classification metrics
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        Ok(Self {
            accuracy: Some(Self::accuracy(y_true, y_pred)?),
            n_samples: y_true.len(),
        })
    }
}
