//! Model training module
//!
//! Provides the classifier contract shared by base and meta learners, the
//! cross-validation splitters, and a set of reference classifiers:
//! - Gaussian Naive Bayes
//! - Logistic Regression
//! - K-Nearest Neighbors
//! - Decision trees and Random Forests

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod naive_bayes;
pub mod random_forest;

pub use cross_validation::{
    cross_val_score, validate_partition, CVResults, CVSplit, KFold, Splitter, StratifiedKFold,
};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use knn::{DistanceMetric, KNNClassifier, KNNConfig, WeightScheme};
pub use linear_models::LogisticRegression;
pub use models::{unique_classes, Classifier, ModelMetrics, ParamMap, ParamValue};
pub use naive_bayes::GaussianNaiveBayes;
pub use random_forest::{MaxFeatures, RandomForest};

pub(crate) use models::{argmax_classes, resolve_weights};
