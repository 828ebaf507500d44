//! Linear model implementations

use crate::error::{Result, StackingError};
use crate::training::models::{
    argmax_classes, resolve_weights, unique_classes, Classifier, ParamMap, ParamValue,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Multinomial logistic regression with L2 regularization.
///
/// Features are standardized internally and the softmax cross-entropy is
/// minimized by full-batch gradient descent. `c` is the inverse
/// regularization strength, weighted the same way as the data term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients (features x classes), on standardized features
    coefficients: Option<Array2<f64>>,
    /// Fitted intercepts (one per class)
    intercepts: Option<Array1<f64>>,
    feature_means: Option<Array1<f64>>,
    feature_scales: Option<Array1<f64>>,
    classes: Vec<f64>,
    /// Inverse regularization strength
    pub c: f64,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercepts: None,
            feature_means: None,
            feature_scales: None,
            classes: Vec::new(),
            c: 1.0,
            fit_intercept: true,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.5,
        }
    }

    /// Set inverse regularization strength
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn softmax_rows(z: &mut Array2<f64>) {
        for mut row in z.rows_mut() {
            let max_val = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.mapv_inplace(|v| (v - max_val).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
    }

    fn standardize(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (means, scales) = match (&self.feature_means, &self.feature_scales) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(StackingError::not_fitted("LogisticRegression")),
        };
        if x.ncols() != means.len() {
            return Err(StackingError::ShapeError {
                expected: format!("{} features", means.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x - means) / scales)
    }

    fn fit_weighted(&mut self, x: &Array2<f64>, y: &Array1<f64>, w: &Array1<f64>) -> Result<()> {
        if self.c <= 0.0 {
            return Err(StackingError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let n_features = x.ncols();
        let classes = unique_classes(y);
        let n_classes = classes.len();
        let total_weight = w.sum();
        if total_weight <= 0.0 {
            return Err(StackingError::TrainingError(
                "sum of sample weights must be positive".to_string(),
            ));
        }

        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = (x - &means) / &scales;

        // One-hot targets
        let mut targets = Array2::zeros((x.nrows(), n_classes));
        for (i, &label) in y.iter().enumerate() {
            if let Some(c) = classes.iter().position(|&cls| cls == label) {
                targets[[i, c]] = 1.0;
            }
        }

        let w_col = w.view().insert_axis(Axis(1));
        let mut coef = Array2::<f64>::zeros((n_features, n_classes));
        let mut intercept = Array1::<f64>::zeros(n_classes);
        let reg = 1.0 / (self.c * total_weight);

        for _iter in 0..self.max_iter {
            let mut proba = xs.dot(&coef) + &intercept;
            Self::softmax_rows(&mut proba);

            let errors = (&proba - &targets) * &w_col;
            let grad_w = xs.t().dot(&errors) / total_weight + &coef * reg;
            let grad_b = if self.fit_intercept {
                errors.sum_axis(Axis(0)) / total_weight
            } else {
                Array1::zeros(n_classes)
            };

            let grad_norm = (grad_w.mapv(|v| v * v).sum() + grad_b.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }

            coef.scaled_add(-self.learning_rate, &grad_w);
            intercept.scaled_add(-self.learning_rate, &grad_b);
        }

        self.coefficients = Some(coef);
        self.intercepts = Some(intercept);
        self.feature_means = Some(means);
        self.feature_scales = Some(scales);
        self.classes = classes;
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> String {
        "logisticregression".to_string()
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
        let proba = self.predict_proba(x)?;
        Ok(argmax_classes(&proba, &self.classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let xs = self.standardize(x)?;
        let (coef, intercept) = match (&self.coefficients, &self.intercepts) {
            (Some(c), Some(b)) => (c, b),
            _ => return Err(StackingError::not_fitted("LogisticRegression")),
        };
        let mut proba = xs.dot(coef) + intercept;
        Self::softmax_rows(&mut proba);
        Ok(proba)
    }

    fn classes(&self) -> Result<Vec<f64>> {
        if self.coefficients.is_none() {
            return Err(StackingError::not_fitted("LogisticRegression"));
        }
        Ok(self.classes.clone())
    }

    fn supports_sample_weight(&self) -> bool {
        true
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(Self {
            c: self.c,
            fit_intercept: self.fit_intercept,
            max_iter: self.max_iter,
            tol: self.tol,
            learning_rate: self.learning_rate,
            ..Self::new()
        })
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("C".to_string(), self.c.into());
        params.insert("fit_intercept".to_string(), self.fit_intercept.into());
        params.insert("max_iter".to_string(), self.max_iter.into());
        params.insert("tol".to_string(), self.tol.into());
        params.insert("learning_rate".to_string(), self.learning_rate.into());
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "C" => self.c = value.as_f64(name)?,
            "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "tol" => self.tol = value.as_f64(name)?,
            "learning_rate" => self.learning_rate = value.as_f64(name)?,
            _ => return Err(value.invalid(name, "unknown parameter for logisticregression")),
        }
        Ok(())
    }
}
