//! K-Nearest Neighbors classifier
//!
//! A lazy learner: `fit` memorizes the training set. It has no notion of
//! per-sample weights and reports so through
//! [`Classifier::supports_sample_weight`].

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Result, StackingError};
use crate::training::models::{argmax_classes, unique_classes, Classifier, ParamMap, ParamValue};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl Default for KNNClassifier {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNClassifier {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
            classes: Vec::new(),
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    fn training_data(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(StackingError::not_fitted("KNNClassifier")),
        }
    }
}

impl Classifier for KNNClassifier {
    fn name(&self) -> String {
        "kneighborsclassifier".to_string()
    }

    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()> {
        if sample_weight.is_some() {
            return Err(StackingError::ConfigError(
                "kneighborsclassifier does not support sample weights".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(StackingError::length_mismatch("y", x.nrows(), y.len()));
        }
        if self.config.n_neighbors == 0 {
            return Err(StackingError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if x.nrows() == 0 {
            return Err(StackingError::TrainingError("cannot fit on zero samples".to_string()));
        }

        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        self.classes = unique_classes(y);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_classes(&proba, &self.classes))
    }

    /// Class probabilities from (weighted) neighbor votes, parallelized over rows
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (x_train, y_train) = self.training_data()?;
        if x.ncols() != x_train.ncols() {
            return Err(StackingError::ShapeError {
                expected: format!("{} features", x_train.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let k = self.config.n_neighbors.min(x_train.nrows());
        let metric = self.config.metric;
        let weights = self.config.weights;
        let classes = &self.classes;
        let n_classes = classes.len();

        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .flat_map_iter(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                class_probs_from(&neighbors, classes, weights)
            })
            .collect();

        Ok(Array2::from_shape_vec((x.nrows(), n_classes), probs)?)
    }

    fn classes(&self) -> Result<Vec<f64>> {
        self.training_data()?;
        Ok(self.classes.clone())
    }

    fn supports_sample_weight(&self) -> bool {
        false
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.config.clone()))
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("n_neighbors".to_string(), self.config.n_neighbors.into());
        let weights = match self.config.weights {
            WeightScheme::Uniform => "uniform",
            WeightScheme::Distance => "distance",
        };
        params.insert("weights".to_string(), weights.into());
        let metric = match self.config.metric {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
        };
        params.insert("metric".to_string(), metric.into());
        params
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        match name {
            "n_neighbors" => self.config.n_neighbors = value.as_usize(name)?,
            "weights" => {
                self.config.weights = match value.as_str(name)? {
                    "uniform" => WeightScheme::Uniform,
                    "distance" => WeightScheme::Distance,
                    _ => return Err(value.invalid(name, "expected 'uniform' or 'distance'")),
                }
            }
            "metric" => {
                self.config.metric = match value.as_str(name)? {
                    "euclidean" => DistanceMetric::Euclidean,
                    "manhattan" => DistanceMetric::Manhattan,
                    _ => return Err(value.invalid(name, "expected 'euclidean' or 'manhattan'")),
                }
            }
            _ => return Err(value.invalid(name, "unknown parameter for kneighborsclassifier")),
        }
        Ok(())
    }
}

/// Max-heap entry for partial sort (keeps k smallest distances).
/// Ties on distance are broken by training index so results do not depend
/// on scan order.
#[derive(PartialEq)]
struct DistLabel(f64, usize, f64);

impl Eq for DistLabel {}
impl PartialOrd for DistLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let entry = DistLabel(compute_distance(point, row, metric), i, y_train[i]);
        if heap.len() < k {
            heap.push(entry);
        } else if let Some(top) = heap.peek() {
            if entry < *top {
                heap.pop();
                heap.push(entry);
            }
        }
    }

    heap.into_iter().map(|dl| (dl.0, dl.2)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
    }
}

fn class_probs_from(neighbors: &[(f64, f64)], classes: &[f64], weights: WeightScheme) -> Vec<f64> {
    let mut counts = vec![0.0; classes.len()];
    let mut total = 0.0;
    for &(dist, label) in neighbors {
        let weight = match weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / (dist + 1e-10),
        };
        if let Some(c) = classes.iter().position(|&cls| cls == label) {
            counts[c] += weight;
            total += weight;
        }
    }
    if total > 0.0 {
        for v in &mut counts {
            *v /= total;
        }
    }
    counts
}
