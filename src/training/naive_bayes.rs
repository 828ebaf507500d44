//! Naive Bayes classifiers
//!
//! Implements Gaussian Naive Bayes for continuous features, with optional
//! per-sample weights.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, StackingError};
use crate::training::models::{
    argmax_classes, resolve_weights, unique_classes, Classifier, ParamMap, ParamValue,
};

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Mean of each feature for each class (row per class)
    means: Option<Array2<f64>>,
    /// Variance of each feature for each class (row per class)
    variances: Option<Array2<f64>>,
    /// Prior probability of each class
    priors: Vec<f64>,
    /// Sorted list of classes
    classes: Vec<f64>,
    /// Fraction of the largest feature variance added to every variance
    pub var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: None,
            variances: None,
            priors: Vec::new(),
            classes: Vec::new(),
            var_smoothing: 1e-9,
        }
    }

    /// Set variance smoothing parameter
    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Class priors, in the order of [`Classifier::classes`]
    pub fn class_priors(&self) -> &[f64] {
        &self.priors
    }

    fn fit_weighted(&mut self, x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>) -> Result<()> {
        let n_features = x.ncols();
        let classes = unique_classes(y);
        let n_classes = classes.len();

        let total_weight: f64 = w.sum();
        if total_weight <= 0.0 {
            return Err(StackingError::TrainingError(
                "sum of sample weights must be positive".to_string(),
            ));
        }

        // Smoothing scales with the largest (unweighted) feature variance
        let max_var = x
            .columns()
            .into_iter()
            .map(|col| {
                let mean = col.mean().unwrap_or(0.0);
                col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / col.len().max(1) as f64
            })
            .fold(0.0f64, f64::max);
        let epsilon = self.var_smoothing * max_var.max(f64::MIN_POSITIVE);

        let mut means: Array2<f64> = Array2::zeros((n_classes, n_features));
        let mut variances: Array2<f64> = Array2::zeros((n_classes, n_features));
        let mut priors = vec![0.0; n_classes];

        for (c, &class) in classes.iter().enumerate() {
            let mut class_weight = 0.0;
            for (i, &label) in y.iter().enumerate() {
                if label == class {
                    class_weight += w[i];
                    for j in 0..n_features {
                        means[[c, j]] += w[i] * x[[i, j]];
                    }
                }
            }
            priors[c] = class_weight / total_weight;
            if class_weight <= 0.0 {
                continue;
            }
            for j in 0..n_features {
                means[[c, j]] /= class_weight;
            }
            for (i, &label) in y.iter().enumerate() {
                if label == class {
                    for j in 0..n_features {
                        variances[[c, j]] += w[i] * (x[[i, j]] - means[[c, j]]).powi(2);
                    }
                }
            }
            for j in 0..n_features {
                variances[[c, j]] = variances[[c, j]] / class_weight + epsilon;
            }
        }

        // Classes whose weight is zero keep a flat, negligible likelihood
        for (c, &prior) in priors.iter().enumerate() {
            if prior == 0.0 {
                variances.row_mut(c).fill(1.0);
            }
        }

        self.means = Some(means);
        self.variances = Some(variances);
        self.priors = priors;
        self.classes = classes;
        Ok(())
    }

    /// Predict log probabilities
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, variances) = match (&self.means, &self.variances) {
            (Some(m), Some(v)) => (m, v),
            _ => return Err(StackingError::not_fitted("GaussianNaiveBayes")),
        };
        if x.ncols() != means.ncols() {
            return Err(StackingError::ShapeError {
                expected: format!("{} features", means.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n_classes = self.classes.len();
        let mut log_probs = Array2::zeros((x.nrows(), n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            for c in 0..n_classes {
                let log_prior = if self.priors[c] > 0.0 {
                    self.priors[c].ln()
                } else {
                    f64::NEG_INFINITY
                };
                log_probs[[i, c]] =
                    log_prior + Self::log_likelihood(row, means.row(c), variances.row(c));
            }
        }

        // Normalize (log-sum-exp trick)
        for mut row in log_probs.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum: f64 = row.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            for val in row.iter_mut() {
                *val = *val - max_val - log_sum;
            }
        }

        Ok(log_probs)
    }

    fn log_likelihood(x: ArrayView1<f64>, means: ArrayView1<f64>, vars: ArrayView1<f64>) -> f64 {
        x.iter()
            .zip(means.iter())
            .zip(vars.iter())
            .map(|((&xi, &mean), &var)| -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln()))
            .sum()
    }
}

impl Classifier for GaussianNaiveBayes {
    fn name(&self) -> String {
        "gaussiannb".to_string()
    }

    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(StackingError::length_mismatch("y", x.nrows(), y.len()));
        }
        if x.nrows() == 0 {
            return Err(StackingError::TrainingError("cannot fit on zero samples".to_string()));
        }
        let w = resolve_weights(x.nrows(), sample_weight)?;
        self.fit_weighted(x, y, &w)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_log_proba(x)?;
        Ok(argmax_classes(&proba, &self.classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.predict_log_proba(x)?.mapv(f64::exp))
    }

    fn classes(&self) -> Result<Vec<f64>> {
        if self.means.is_none() {
            return Err(StackingError::not_fitted("GaussianNaiveBayes"));
        }
        Ok(self.classes.clone())
    }

    fn supports_sample_weight(&self) -> bool {
        true
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(Self::new().with_var_smoothing(self.var_smoothing))
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("var_smoothing".to_string(), self.var_smoothing.into());
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "var_smoothing" => self.var_smoothing = value.as_f64(name)?,
            _ => return Err(value.invalid(name, "unknown parameter for gaussiannb")),
        }
        Ok(())
    }
}
