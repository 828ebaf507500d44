//! Random Forest classifier

use crate::error::{Result, StackingError};
use super::decision_tree::{encode_classes, Criterion, DecisionTree};
use crate::training::models::{
    argmax_classes, resolve_weights, unique_classes, Classifier, ParamMap, ParamValue,
};
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state; a fresh seed is drawn per fit when unset
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new_classifier(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    fn unfitted_copy(&self) -> Self {
        Self {
            trees: Vec::new(),
            n_features: 0,
            classes: Vec::new(),
            ..self.clone()
        }
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> String {
        "randomforestclassifier".to_string()
    }

    /// Trees are grown in parallel; tree `t` is seeded with `seed + t`, so
    /// the fitted forest does not depend on thread scheduling.
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(StackingError::length_mismatch("y", n_samples, y.len()));
        }
        if n_samples == 0 {
            return Err(StackingError::TrainingError("cannot fit on zero samples".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(StackingError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let weights = resolve_weights(n_samples, sample_weight)?;
        let classes = unique_classes(y);
        let class_idx = encode_classes(y, &classes);
        let max_features = self.compute_max_features(x.ncols());

        let base_seed = self
            .random_state
            .unwrap_or_else(|| ChaCha8Rng::from_entropy().next_u64());

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap as per-sample multiplicities folded into the weights
                let tree_weights = if self.bootstrap {
                    let mut counts = vec![0.0; n_samples];
                    for _ in 0..n_samples {
                        counts[rng.gen_range(0..n_samples)] += 1.0;
                    }
                    Array1::from_vec(counts) * &weights
                } else {
                    weights.clone()
                };

                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_random_state(rng.next_u64());
                tree.max_depth = self.max_depth;
                tree.max_features = Some(max_features);

                tree.fit_with_classes(x, &class_idx, &classes, &tree_weights)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = x.ncols();
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_classes(&proba, &self.classes))
    }

    /// Mean of the trees' leaf class distributions
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(StackingError::not_fitted("RandomForest"));
        }
        if x.ncols() != self.n_features {
            return Err(StackingError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for p in &per_tree {
            proba += p;
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    fn classes(&self) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(StackingError::not_fitted("RandomForest"));
        }
        Ok(self.classes.clone())
    }

    fn supports_sample_weight(&self) -> bool {
        true
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(self.unfitted_copy())
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("n_estimators".to_string(), self.n_estimators.into());
        params.insert("max_depth".to_string(), self.max_depth.into());
        params.insert("min_samples_split".to_string(), self.min_samples_split.into());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.into());
        let max_features = match self.max_features {
            MaxFeatures::Sqrt => ParamValue::Str("sqrt".to_string()),
            MaxFeatures::Log2 => ParamValue::Str("log2".to_string()),
            MaxFeatures::Fixed(n) => n.into(),
            MaxFeatures::All => ParamValue::None,
        };
        params.insert("max_features".to_string(), max_features);
        params.insert("bootstrap".to_string(), self.bootstrap.into());
        params.insert(
            "random_state".to_string(),
            self.random_state.map(|s| s as i64).into(),
        );
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "n_estimators" => self.n_estimators = value.as_usize(name)?,
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "max_features" => {
                self.max_features = match &value {
                    ParamValue::None => MaxFeatures::All,
                    ParamValue::Str(s) if s == "sqrt" => MaxFeatures::Sqrt,
                    ParamValue::Str(s) if s == "log2" => MaxFeatures::Log2,
                    ParamValue::Int(_) => MaxFeatures::Fixed(value.as_usize(name)?),
                    _ => return Err(value.invalid(name, "expected 'sqrt', 'log2', an integer or None")),
                }
            }
            "bootstrap" => self.bootstrap = value.as_bool(name)?,
            "random_state" => self.random_state = value.as_opt_u64(name)?,
            _ => return Err(value.invalid(name, "unknown parameter for randomforestclassifier")),
        }
        Ok(())
    }
}
