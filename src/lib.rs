//! stacking-cv - Stacked cross-validated ensemble classification
//!
//! A meta-estimator that trains several base classifiers, turns their
//! out-of-fold predictions into meta-features and fits a second-level
//! classifier on those meta-features. Inference runs base learners refit on
//! the full training set, so no training row is ever predicted by a model
//! that saw it.
//!
//! # Modules
//!
//! - [`ensemble`] - The stacking classifier, its configuration and
//!   parameter addressing
//! - [`training`] - Classifier contract, cross-validation splitters and
//!   reference classifiers
//! - [`utils`] - Datasets, input conversion and parallelism helpers
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use stacking_cv::prelude::*;
//!
//! let iris = load_iris()?;
//! let mut sclf = StackingCvClassifier::new(
//!     vec![
//!         Box::new(RandomForest::default().with_random_state(1)),
//!         Box::new(GaussianNaiveBayes::new()),
//!     ],
//!     Box::new(LogisticRegression::new()),
//! )
//! .with_config(StackingConfig::new().with_shuffle(false));
//!
//! sclf.fit(&iris.data, &iris.target, None)?;
//! let accuracy = sclf.score(&iris.data, &iris.target)?;
//! # Ok::<(), stacking_cv::error::StackingError>(())
//! ```

pub mod error;

pub mod ensemble;
pub mod training;
pub mod utils;

pub mod cli;

pub use error::{Result, StackingError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ensemble::{DropProbaColumn, FoldStrategy, StackingConfig, StackingCvClassifier};
    pub use crate::error::{Result, StackingError};
    pub use crate::training::{
        cross_val_score, Classifier, DecisionTree, GaussianNaiveBayes, KFold, KNNClassifier,
        LogisticRegression, ParamMap, ParamValue, RandomForest, Splitter, StratifiedKFold,
    };
    pub use crate::utils::{load_iris, ArrayLike, LabelLike};
}
