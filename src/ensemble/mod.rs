//! Ensemble methods module
//!
//! Provides the stacked cross-validated ensemble classifier:
//! - Out-of-fold meta-feature generation
//! - Full-data refit of the base learners for inference
//! - Parameter addressing for hyperparameter search

mod meta_features;
mod params;
mod stacking;

pub use meta_features::DropProbaColumn;
pub use params::learner_names;
pub use stacking::{FittedStack, FoldStrategy, StackingConfig, StackingCvClassifier};
