//! Decision tree classifier
//!
//! CART-style binary tree with weighted impurity, optional random feature
//! subsets per split (used by the random forest), and leaf class
//! distributions for probability estimates.

use crate::error::{Result, StackingError};
use crate::training::models::{
    argmax_classes, resolve_weights, unique_classes, Classifier, ParamMap, ParamValue,
};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with normalized class distribution
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity
    Gini,
    /// Entropy
    Entropy,
}

impl Criterion {
    fn impurity(self, counts: &[f64], total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 1.0 - counts.iter().map(|&c| (c / total).powi(2)).sum::<f64>(),
            Criterion::Entropy => -counts
                .iter()
                .filter(|&&c| c > 0.0)
                .map(|&c| {
                    let p = c / total;
                    p * p.ln()
                })
                .sum::<f64>(),
        }
    }
}

/// Training data shared by every recursive call
struct TreeData<'a> {
    x: &'a Array2<f64>,
    class_idx: &'a [usize],
    weights: &'a Array1<f64>,
    n_classes: usize,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at random per split (all when `None`)
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for feature subsampling
    pub random_state: Option<u64>,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
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

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn unfitted_copy(&self) -> Self {
        Self {
            root: None,
            n_features: 0,
            classes: Vec::new(),
            ..self.clone()
        }
    }

    /// Fit against an externally fixed class list, so that every tree of a
    /// forest reports distributions over the same columns.
    pub(crate) fn fit_with_classes(
        &mut self,
        x: &Array2<f64>,
        class_idx: &[usize],
        classes: &[f64],
        weights: &Array1<f64>,
    ) -> Result<()> {
        if self.min_samples_leaf == 0 {
            return Err(StackingError::InvalidParameter {
                name: "min_samples_leaf".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let data = TreeData {
            x,
            class_idx,
            weights,
            n_classes: classes.len(),
        };
        let indices: Vec<usize> = (0..x.nrows()).filter(|&i| weights[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(StackingError::TrainingError(
                "no samples with positive weight".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.classes = classes.to_vec();
        self.root = Some(self.build_tree(&data, &indices, 0, &mut rng));
        Ok(())
    }

    fn class_counts(data: &TreeData, indices: &[usize]) -> (Vec<f64>, f64) {
        let mut counts = vec![0.0; data.n_classes];
        for &i in indices {
            counts[data.class_idx[i]] += data.weights[i];
        }
        let total = counts.iter().sum();
        (counts, total)
    }

    fn leaf(counts: Vec<f64>, total: f64, n_samples: usize) -> TreeNode {
        let distribution = if total > 0.0 {
            counts.into_iter().map(|c| c / total).collect()
        } else {
            counts
        };
        TreeNode::Leaf {
            distribution,
            n_samples,
        }
    }

    fn build_tree(
        &self,
        data: &TreeData,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (counts, total) = Self::class_counts(data, indices);
        let impurity = self.criterion.impurity(&counts, total);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;
        if should_stop {
            return Self::leaf(counts, total, n_samples);
        }

        let n_features = data.x.ncols();
        let n_try = self.max_features.unwrap_or(n_features).clamp(1, n_features);
        let mut features: Vec<usize> = if n_try < n_features {
            index::sample(rng, n_features, n_try).into_vec()
        } else {
            (0..n_features).collect()
        };
        features.sort_unstable();

        match self.find_best_split(data, indices, &features, impurity, total) {
            Some((feature_idx, threshold)) => {
                let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| data.x[[i, feature_idx]] <= threshold);

                let left = Box::new(self.build_tree(data, &left_indices, depth + 1, rng));
                let right = Box::new(self.build_tree(data, &right_indices, depth + 1, rng));

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples,
                    impurity,
                }
            }
            None => Self::leaf(counts, total, n_samples),
        }
    }

    /// Best (feature, threshold) by weighted impurity decrease. Candidate
    /// features are scanned in parallel; ties resolve to the earlier feature.
    fn find_best_split(
        &self,
        data: &TreeData,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
        total: f64,
    ) -> Option<(usize, f64)> {
        let min_leaf = self.min_samples_leaf;
        let criterion = self.criterion;

        let per_feature: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    data.x[[a, feature_idx]]
                        .partial_cmp(&data.x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left_counts = vec![0.0; data.n_classes];
                let mut right_counts = vec![0.0; data.n_classes];
                for &i in &order {
                    right_counts[data.class_idx[i]] += data.weights[i];
                }
                let mut left_total = 0.0;
                let mut best: Option<(f64, f64)> = None;

                for pos in 0..order.len() - 1 {
                    let i = order[pos];
                    let w = data.weights[i];
                    left_counts[data.class_idx[i]] += w;
                    right_counts[data.class_idx[i]] -= w;
                    left_total += w;

                    let n_left = pos + 1;
                    if n_left < min_leaf || order.len() - n_left < min_leaf {
                        continue;
                    }
                    let here = data.x[[i, feature_idx]];
                    let next = data.x[[order[pos + 1], feature_idx]];
                    if next <= here {
                        continue;
                    }

                    let right_total = total - left_total;
                    let child = (left_total * criterion.impurity(&left_counts, left_total)
                        + right_total * criterion.impurity(&right_counts, right_total))
                        / total;
                    let gain = parent_impurity - child;
                    if gain > best.map_or(1e-12, |b| b.0) {
                        best = Some((gain, (here + next) / 2.0));
                    }
                }

                best.map(|(gain, threshold)| (feature_idx, threshold, gain))
            })
            .collect();

        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, cand| match best {
                Some(b) if b.2 >= cand.2 => Some(b),
                _ => Some(cand),
            })
            .map(|(feature_idx, threshold, _)| (feature_idx, threshold))
    }

    fn leaf_distribution<'t>(node: &'t TreeNode, sample: ArrayView1<f64>) -> &'t [f64] {
        match node {
            TreeNode::Leaf { distribution, .. } => distribution,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::leaf_distribution(left, sample)
                } else {
                    Self::leaf_distribution(right, sample)
                }
            }
        }
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

/// Map labels onto positions in a sorted class list
pub(crate) fn encode_classes(y: &Array1<f64>, classes: &[f64]) -> Vec<usize> {
    y.iter()
        .map(|&label| classes.iter().position(|&c| c == label).unwrap_or(0))
        .collect()
}

impl Classifier for DecisionTree {
    fn name(&self) -> String {
        "decisiontreeclassifier".to_string()
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
        let weights = resolve_weights(x.nrows(), sample_weight)?;
        let classes = unique_classes(y);
        let class_idx = encode_classes(y, &classes);
        self.fit_with_classes(x, &class_idx, &classes, &weights)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_classes(&proba, &self.classes))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| StackingError::not_fitted("DecisionTree"))?;
        if x.ncols() != self.n_features {
            return Err(StackingError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (j, &p) in Self::leaf_distribution(root, row).iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    fn classes(&self) -> Result<Vec<f64>> {
        if self.root.is_none() {
            return Err(StackingError::not_fitted("DecisionTree"));
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
        params.insert("max_depth".to_string(), self.max_depth.into());
        params.insert("min_samples_split".to_string(), self.min_samples_split.into());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.into());
        params.insert("max_features".to_string(), self.max_features.into());
        let criterion = match self.criterion {
            Criterion::Gini => "gini",
            Criterion::Entropy => "entropy",
        };
        params.insert("criterion".to_string(), criterion.into());
        params.insert(
            "random_state".to_string(),
            self.random_state.map(|s| s as i64).into(),
        );
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?,
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?,
            "max_features" => self.max_features = value.as_opt_usize(name)?,
            "criterion" => {
                self.criterion = match value.as_str(name)? {
                    "gini" => Criterion::Gini,
                    "entropy" => Criterion::Entropy,
                    _ => return Err(value.invalid(name, "expected 'gini' or 'entropy'")),
                }
            }
            "random_state" => self.random_state = value.as_opt_u64(name)?,
            _ => return Err(value.invalid(name, "unknown parameter for decisiontreeclassifier")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[1.0, 1.0], [1.0, 2.0], [2.0, 1.0], [2.0, 2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(3);
        tree.fit(&x, &y, None).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.get_n_leaves(), 2);
    }

    #[test]
    fn test_depth_limited_tree_gives_mixed_proba() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 0.0, 1.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y, None).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(proba.iter().any(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_weights_move_the_split() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut heavy_first = DecisionTree::new_classifier().with_max_depth(1);
        heavy_first.fit(&x, &y, Some(&array![10.0, 1.0, 1.0, 1.0])).unwrap();
        assert_eq!(heavy_first.predict(&array![[0.0]]).unwrap(), array![0.0]);

        let mut heavy_last = DecisionTree::new_classifier().with_max_depth(1);
        heavy_last.fit(&x, &y, Some(&array![1.0, 1.0, 1.0, 10.0])).unwrap();
        assert_eq!(heavy_last.predict(&array![[3.0]]).unwrap(), array![1.0]);
    }

    #[test]
    fn test_clone_unfitted_keeps_params() {
        let tree = DecisionTree::new_classifier().with_max_depth(4).with_random_state(3);
        let clone = tree.clone_unfitted();
        assert_eq!(clone.params()["max_depth"], ParamValue::Int(4));
        assert_eq!(clone.params()["random_state"], ParamValue::Int(3));
        assert!(clone.classes().is_err());
    }
}
