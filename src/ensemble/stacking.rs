//! Stacked cross-validated ensemble classifier
//!
//! Base learners are trained on cross-validation folds and their out-of-fold
//! predictions become the training inputs of a second-level meta classifier.
//! Inference uses one copy of each base learner refit on the full training
//! set; the per-fold models are discarded as soon as they have predicted
//! their holdout rows.

use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::meta_features::{
    out_of_fold, predict_blocks, refit_clones, refit_in_place, DropProbaColumn, FitContext,
    MetaLayout,
};
use crate::error::{Result, StackingError};
use crate::training::{
    resolve_weights, unique_classes, validate_partition, CVSplit, Classifier, KFold,
    ModelMetrics, ParamMap, ParamValue, Splitter, StratifiedKFold,
};
use crate::utils::{ArrayLike, LabelLike, Labels, ParallelConfig};

const ESTIMATOR_NAME: &str = "StackingCvClassifier";

/// How the training set is split into folds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "FoldCount", into = "FoldCount")]
pub enum FoldStrategy {
    /// Number of folds for the built-in splitter
    Folds(usize),
    /// Caller supplied splitter, used as-is
    Splitter(Arc<dyn Splitter>),
}

impl FoldStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            FoldStrategy::Folds(n) => *n,
            FoldStrategy::Splitter(splitter) => splitter.n_splits(),
        }
    }
}

impl Default for FoldStrategy {
    fn default() -> Self {
        FoldStrategy::Folds(5)
    }
}

/// Serialized form of [`FoldStrategy`]; splitter objects are written as
/// their fold count.
#[derive(Serialize, Deserialize)]
struct FoldCount(usize);

impl From<FoldCount> for FoldStrategy {
    fn from(count: FoldCount) -> Self {
        FoldStrategy::Folds(count.0)
    }
}

impl From<FoldStrategy> for FoldCount {
    fn from(strategy: FoldStrategy) -> Self {
        FoldCount(strategy.n_splits())
    }
}

/// Configuration for the stacking ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingConfig {
    /// Fold count or splitter
    pub cv: FoldStrategy,
    /// Use class probabilities instead of labels as meta-features
    pub use_probas: bool,
    /// Drop one probability column per learner
    pub drop_proba_col: Option<DropProbaColumn>,
    /// Prepend the raw features to the meta classifier's input
    pub use_features_in_secondary: bool,
    /// Stratify the built-in splitter by label
    pub stratify: bool,
    /// Shuffle before splitting (built-in splitter only)
    pub shuffle: bool,
    /// Fit clones of the learners instead of the instances themselves
    pub use_clones: bool,
    /// Keep the training meta-feature matrix after `fit`
    pub store_train_meta_features: bool,
    /// Seed for the built-in splitter's shuffling
    pub random_state: Option<u64>,
    /// Worker bound for fold tasks
    pub n_jobs: Option<usize>,
    /// Progress logging level
    pub verbose: u8,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            cv: FoldStrategy::default(),
            use_probas: false,
            drop_proba_col: None,
            use_features_in_secondary: false,
            stratify: true,
            shuffle: true,
            use_clones: true,
            store_train_meta_features: false,
            random_state: None,
            n_jobs: None,
            verbose: 0,
        }
    }
}

impl StackingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cv(mut self, n_splits: usize) -> Self {
        self.cv = FoldStrategy::Folds(n_splits);
        self
    }

    pub fn with_splitter(mut self, splitter: impl Splitter + 'static) -> Self {
        self.cv = FoldStrategy::Splitter(Arc::new(splitter));
        self
    }

    pub fn with_use_probas(mut self, use_probas: bool) -> Self {
        self.use_probas = use_probas;
        self
    }

    pub fn with_drop_proba_col(mut self, drop: DropProbaColumn) -> Self {
        self.drop_proba_col = Some(drop);
        self
    }

    pub fn with_features_in_secondary(mut self, enabled: bool) -> Self {
        self.use_features_in_secondary = enabled;
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_use_clones(mut self, use_clones: bool) -> Self {
        self.use_clones = use_clones;
        self
    }

    pub fn with_store_train_meta_features(mut self, store: bool) -> Self {
        self.store_train_meta_features = store;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Folds for `x`/`y`: the caller's splitter, or the built-in one
    pub(crate) fn make_splits(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        match &self.cv {
            FoldStrategy::Splitter(splitter) => splitter.split(x, y),
            FoldStrategy::Folds(n_splits) if self.stratify => {
                check_class_labels(y)?;
                StratifiedKFold {
                    n_splits: *n_splits,
                    shuffle: self.shuffle,
                    random_state: self.random_state,
                }
                .split(x, y)
            }
            FoldStrategy::Folds(n_splits) => KFold {
                n_splits: *n_splits,
                shuffle: self.shuffle,
                random_state: self.random_state,
            }
            .split(x, y),
        }
    }
}

/// Stratification needs class labels: finite values with no fractional part
fn check_class_labels(y: &Array1<f64>) -> Result<()> {
    match y.iter().find(|v| !v.is_finite() || v.fract() != 0.0) {
        Some(bad) => Err(StackingError::ConfigError(format!(
            "stratified folds need class labels, got the value {}; \
             encode the targets as integer classes or set stratify = false",
            bad
        ))),
        None => Ok(()),
    }
}

/// Models produced by one successful `fit`
#[derive(Debug)]
enum FittedModels {
    /// Refit clones, independent of the configured learners
    Cloned {
        base: Vec<Box<dyn Classifier>>,
        meta: Box<dyn Classifier>,
    },
    /// The configured learners themselves were fitted
    InPlace,
}

/// State of a fitted ensemble
#[derive(Debug)]
pub struct FittedStack {
    models: FittedModels,
    layout: MetaLayout,
    use_features_in_secondary: bool,
    n_features: usize,
    train_meta_features: Option<Array2<f64>>,
}

impl FittedStack {
    /// Sorted class values seen during `fit`
    pub fn classes(&self) -> &[f64] {
        &self.layout.classes
    }

    /// Feature count of the training matrix
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Meta-feature columns produced per sample
    pub fn n_meta_features(&self, n_learners: usize) -> usize {
        self.layout.width() * n_learners
    }
}

/// Stacking classifier whose meta-features are out-of-fold predictions
#[derive(Debug)]
pub struct StackingCvClassifier {
    pub(crate) classifiers: Vec<Box<dyn Classifier>>,
    pub(crate) meta_classifier: Box<dyn Classifier>,
    pub(crate) config: StackingConfig,
    fitted: Option<FittedStack>,
}

impl StackingCvClassifier {
    /// Create an ensemble with the default configuration
    pub fn new(classifiers: Vec<Box<dyn Classifier>>, meta_classifier: Box<dyn Classifier>) -> Self {
        Self {
            classifiers,
            meta_classifier,
            config: StackingConfig::default(),
            fitted: None,
        }
    }

    pub fn with_config(mut self, config: StackingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StackingConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut StackingConfig {
        &mut self.config
    }

    pub fn classifiers(&self) -> &[Box<dyn Classifier>] {
        &self.classifiers
    }

    pub fn meta_classifier(&self) -> &dyn Classifier {
        self.meta_classifier.as_ref()
    }

    /// Replace the base learners. Any fitted state is discarded.
    pub fn set_classifiers(&mut self, classifiers: Vec<Box<dyn Classifier>>) -> &mut Self {
        self.classifiers = classifiers;
        self.fitted = None;
        self
    }

    /// Replace the meta learner. Any fitted state is discarded.
    pub fn set_meta_classifier(&mut self, meta_classifier: Box<dyn Classifier>) -> &mut Self {
        self.meta_classifier = meta_classifier;
        self.fitted = None;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn fitted_state(&self) -> Option<&FittedStack> {
        self.fitted.as_ref()
    }

    /// Checks that need no data and must fail before any learner is trained
    fn check_learners(&self, weighted: bool) -> Result<()> {
        if self.classifiers.is_empty() {
            return Err(StackingError::ConfigError(
                "StackingCvClassifier needs at least one base classifier".to_string(),
            ));
        }
        if weighted {
            if let Some(clf) = self.classifiers.iter().find(|c| !c.supports_sample_weight()) {
                return Err(StackingError::ConfigError(format!(
                    "Underlying estimator {} does not support sample weights.",
                    clf.name()
                )));
            }
            if !self.meta_classifier.supports_sample_weight() {
                return Err(StackingError::ConfigError(format!(
                    "Meta classifier {} does not support sample weights.",
                    self.meta_classifier.name()
                )));
            }
        }
        Ok(())
    }

    /// Fit the ensemble.
    ///
    /// The new fitted state replaces the previous one only on success. With
    /// `use_clones = false` the configured learners are fitted directly, so
    /// the ensemble is left unfitted if that stage fails.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self> {
        self.check_learners(sample_weight.is_some())?;

        let n_samples = x.nrows();
        if y.len() != n_samples {
            return Err(StackingError::length_mismatch("y", n_samples, y.len()));
        }
        if let Some(w) = sample_weight {
            resolve_weights(n_samples, Some(w))?;
        }

        let splits = self.config.make_splits(x, y)?;
        validate_partition(&splits, n_samples)?;

        let layout = MetaLayout::new(
            self.config.use_probas,
            self.config.drop_proba_col,
            unique_classes(y),
        )?;
        let verbose = self.config.verbose;
        if verbose >= 1 {
            info!(
                n_samples,
                n_features = x.ncols(),
                n_classifiers = self.classifiers.len(),
                n_splits = splits.len(),
                use_probas = self.config.use_probas,
                "Fitting stacking ensemble"
            );
        }

        let ctx = FitContext {
            x,
            y,
            sample_weight,
            layout: &layout,
            parallel: ParallelConfig::new(self.config.n_jobs),
            verbose,
        };
        let meta_features = out_of_fold(&self.classifiers, &splits, &ctx)?;

        let stacked;
        let secondary = if self.config.use_features_in_secondary {
            stacked = concatenate(Axis(1), &[x.view(), meta_features.view()])?;
            &stacked
        } else {
            &meta_features
        };

        if verbose >= 1 {
            info!(
                meta_classifier = %self.meta_classifier.name(),
                n_inputs = secondary.ncols(),
                "Fitting meta-classifier"
            );
        }
        let models = if self.config.use_clones {
            let base = refit_clones(&self.classifiers, &ctx)?;
            let mut meta = self.meta_classifier.clone_unfitted();
            meta.fit(secondary, y, sample_weight)?;
            FittedModels::Cloned { base, meta }
        } else {
            self.fitted = None;
            refit_in_place(&mut self.classifiers, &ctx)?;
            self.meta_classifier.fit(secondary, y, sample_weight)?;
            FittedModels::InPlace
        };

        self.fitted = Some(FittedStack {
            models,
            layout,
            use_features_in_secondary: self.config.use_features_in_secondary,
            n_features: x.ncols(),
            train_meta_features: if self.config.store_train_meta_features {
                Some(meta_features)
            } else {
                None
            },
        });
        Ok(self)
    }

    /// Fit from inputs that still need conversion to numeric arrays.
    ///
    /// Nested `Vec`s and polars frames are rejected with `InputTypeError`
    /// before anything else happens.
    pub fn fit_input<X, Y>(
        &mut self,
        x: &X,
        y: &Y,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<&mut Self>
    where
        X: ArrayLike + ?Sized,
        Y: LabelLike + ?Sized,
    {
        let x = x.to_features()?;
        let y = match y.to_labels()? {
            Labels::Flat(y) => y,
            Labels::MultiColumn(y) => {
                let stratified =
                    self.config.stratify && matches!(self.config.cv, FoldStrategy::Folds(_));
                return Err(StackingError::ConfigError(if stratified {
                    format!(
                        "stratified folds need a flat label vector, got {} label columns; \
                         pass a 1-D label array or set stratify = false",
                        y.ncols()
                    )
                } else {
                    format!("expected a flat label vector, got {} label columns", y.ncols())
                }));
            }
        };
        self.fit(&x, &y, sample_weight)
    }

    fn fitted(&self) -> Result<&FittedStack> {
        self.fitted
            .as_ref()
            .ok_or_else(|| StackingError::not_fitted(ESTIMATOR_NAME))
    }

    fn base_models<'a>(&'a self, fitted: &'a FittedStack) -> &'a [Box<dyn Classifier>] {
        match &fitted.models {
            FittedModels::Cloned { base, .. } => base,
            FittedModels::InPlace => &self.classifiers,
        }
    }

    fn meta_model<'a>(&'a self, fitted: &'a FittedStack) -> &'a dyn Classifier {
        match &fitted.models {
            FittedModels::Cloned { meta, .. } => meta.as_ref(),
            FittedModels::InPlace => self.meta_classifier.as_ref(),
        }
    }

    /// Meta-features of `x` from the full-data refit learners
    pub fn predict_meta_features(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        self.meta_features_for(fitted, x)
    }

    fn meta_features_for(&self, fitted: &FittedStack, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != fitted.n_features {
            return Err(StackingError::ShapeError {
                expected: format!("{} features", fitted.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        predict_blocks(
            self.base_models(fitted),
            x,
            &fitted.layout,
            ParallelConfig::new(self.config.n_jobs),
        )
    }

    fn secondary_input(&self, fitted: &FittedStack, x: &Array2<f64>) -> Result<Array2<f64>> {
        let meta_features = self.meta_features_for(fitted, x)?;
        if fitted.use_features_in_secondary {
            Ok(concatenate(Axis(1), &[x.view(), meta_features.view()])?)
        } else {
            Ok(meta_features)
        }
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted()?;
        let input = self.secondary_input(fitted, x)?;
        self.meta_model(fitted).predict(&input)
    }

    /// Predict class probabilities, columns ordered as [`Self::classes`]
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        let input = self.secondary_input(fitted, x)?;
        self.meta_model(fitted).predict_proba(&input)
    }

    /// Mean accuracy on `x`/`y`
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        ModelMetrics::accuracy(y, &y_pred)
    }

    pub fn classes(&self) -> Result<Vec<f64>> {
        Ok(self.fitted()?.classes().to_vec())
    }

    /// Out-of-fold meta-features of the training set, when
    /// `store_train_meta_features` was enabled for the last fit
    pub fn train_meta_features(&self) -> Result<Option<&Array2<f64>>> {
        Ok(self.fitted()?.train_meta_features.as_ref())
    }

    fn unfitted_copy(&self) -> Self {
        Self {
            classifiers: self.classifiers.iter().map(|c| c.clone_unfitted()).collect(),
            meta_classifier: self.meta_classifier.clone_unfitted(),
            config: self.config.clone(),
            fitted: None,
        }
    }
}

impl Classifier for StackingCvClassifier {
    fn name(&self) -> String {
        "stackingcvclassifier".to_string()
    }

    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()> {
        StackingCvClassifier::fit(self, x, y, sample_weight).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        StackingCvClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        StackingCvClassifier::predict_proba(self, x)
    }

    fn classes(&self) -> Result<Vec<f64>> {
        StackingCvClassifier::classes(self)
    }

    fn supports_sample_weight(&self) -> bool {
        self.classifiers.iter().all(|c| c.supports_sample_weight())
            && self.meta_classifier.supports_sample_weight()
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(self.unfitted_copy())
    }

    fn params(&self) -> ParamMap {
        self.get_params(true)
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.set_params(ParamMap::from([(name.to_string(), value)]))
    }
}
