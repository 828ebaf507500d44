//! Out-of-fold meta-feature generation
//!
//! Every (fold, learner) pair is an independent task: clone the unfitted
//! learner, fit it on the fold's training rows, predict the fold's holdout
//! rows. Tasks return their prediction blocks and the blocks are scattered
//! into the meta-feature matrix afterwards, one column chunk per learner, so
//! no two writers ever share a region.

use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StackingError};
use crate::training::{CVSplit, Classifier};
use crate::utils::ParallelConfig;

/// Probability column dropped per learner to avoid collinear meta-features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropProbaColumn {
    First,
    Last,
}

/// Column layout of the meta-feature matrix
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MetaLayout {
    pub use_probas: bool,
    pub drop_proba_col: Option<DropProbaColumn>,
    /// Sorted class list every probability block is aligned to
    pub classes: Vec<f64>,
}

impl MetaLayout {
    pub fn new(
        use_probas: bool,
        drop_proba_col: Option<DropProbaColumn>,
        classes: Vec<f64>,
    ) -> Result<Self> {
        let layout = Self {
            use_probas,
            drop_proba_col,
            classes,
        };
        if layout.width() == 0 {
            return Err(StackingError::ConfigError(format!(
                "drop_proba_col leaves no meta-feature columns for {} class(es)",
                layout.classes.len()
            )));
        }
        Ok(layout)
    }

    /// Columns contributed by one learner
    pub fn width(&self) -> usize {
        if !self.use_probas {
            return 1;
        }
        match self.drop_proba_col {
            Some(_) => self.classes.len().saturating_sub(1),
            None => self.classes.len(),
        }
    }

    /// Predictions of one fitted learner on `x`, shaped `(x.nrows(), width)`
    pub fn learner_block(&self, model: &dyn Classifier, x: &Array2<f64>) -> Result<Array2<f64>> {
        let block = if self.use_probas {
            self.aligned_proba(model, x)?
        } else {
            model.predict(x)?.insert_axis(Axis(1))
        };

        if block.dim() != (x.nrows(), self.width()) {
            return Err(StackingError::ShapeError {
                expected: format!("({}, {}) predictions from {}", x.nrows(), self.width(), model.name()),
                actual: format!("{:?}", block.dim()),
            });
        }
        Ok(block)
    }

    /// Probabilities mapped onto the global class list. A model fitted on a
    /// fold that lacked some class contributes zeros for it.
    fn aligned_proba(&self, model: &dyn Classifier, x: &Array2<f64>) -> Result<Array2<f64>> {
        let proba = model.predict_proba(x)?;
        let model_classes = model.classes()?;
        if proba.ncols() != model_classes.len() {
            return Err(StackingError::ShapeError {
                expected: format!("{} probability columns from {}", model_classes.len(), model.name()),
                actual: format!("{} columns", proba.ncols()),
            });
        }

        let n_classes = self.classes.len();
        let mut aligned = Array2::zeros((proba.nrows(), n_classes));
        for (j, class) in model_classes.iter().enumerate() {
            if let Some(col) = self.classes.iter().position(|c| c == class) {
                aligned.column_mut(col).assign(&proba.column(j));
            }
        }

        Ok(match self.drop_proba_col {
            None => aligned,
            Some(DropProbaColumn::First) => aligned.slice(s![.., 1..]).to_owned(),
            Some(DropProbaColumn::Last) => aligned.slice(s![.., ..n_classes - 1]).to_owned(),
        })
    }
}

/// Training inputs shared by every task of one fit
pub(crate) struct FitContext<'a> {
    pub x: &'a Array2<f64>,
    pub y: &'a Array1<f64>,
    pub sample_weight: Option<&'a Array1<f64>>,
    pub layout: &'a MetaLayout,
    pub parallel: ParallelConfig,
    pub verbose: u8,
}

/// Build the `n x (k * width)` out-of-fold meta-feature matrix.
///
/// Row `i` of learner `k`'s block comes from the clone trained on the split
/// that held `i` out, so no prediction is made by a model that saw its row.
pub(crate) fn out_of_fold(
    learners: &[Box<dyn Classifier>],
    splits: &[CVSplit],
    ctx: &FitContext<'_>,
) -> Result<Array2<f64>> {
    let n_learners = learners.len();
    let mut tasks = Vec::with_capacity(n_learners * splits.len());
    for (k, learner) in learners.iter().enumerate() {
        if ctx.verbose >= 1 {
            info!(
                classifier = %learner.name(),
                index = k + 1,
                total = n_learners,
                "Training and fitting classifier"
            );
        }
        for split in splits {
            tasks.push((k, learner.as_ref(), split));
        }
    }

    let blocks = ctx.parallel.try_map(tasks, |(k, learner, split)| {
        if ctx.verbose >= 2 {
            debug!(
                classifier = k + 1,
                fold = split.fold_idx + 1,
                n_train = split.train_indices.len(),
                n_holdout = split.test_indices.len(),
                "Training and fitting fold"
            );
        }
        let x_train = ctx.x.select(Axis(0), &split.train_indices);
        let y_train = ctx.y.select(Axis(0), &split.train_indices);
        let w_train = ctx
            .sample_weight
            .map(|w| w.select(Axis(0), &split.train_indices));

        let mut model = learner.clone_unfitted();
        model.fit(&x_train, &y_train, w_train.as_ref())?;

        let x_holdout = ctx.x.select(Axis(0), &split.test_indices);
        ctx.layout.learner_block(model.as_ref(), &x_holdout)
    })?;

    let width = ctx.layout.width();
    let mut meta = Array2::zeros((ctx.x.nrows(), n_learners * width));
    if splits.is_empty() {
        return Ok(meta);
    }
    for (mut chunk, learner_blocks) in meta
        .axis_chunks_iter_mut(Axis(1), width)
        .zip(blocks.chunks(splits.len()))
    {
        for (split, block) in splits.iter().zip(learner_blocks) {
            for (r, &row) in split.test_indices.iter().enumerate() {
                chunk.row_mut(row).assign(&block.row(r));
            }
        }
    }
    Ok(meta)
}

/// Fit a fresh clone of every learner on the full training set
pub(crate) fn refit_clones(
    learners: &[Box<dyn Classifier>],
    ctx: &FitContext<'_>,
) -> Result<Vec<Box<dyn Classifier>>> {
    let learners: Vec<&dyn Classifier> = learners.iter().map(|l| l.as_ref()).collect();
    ctx.parallel.try_map(learners, |learner: &dyn Classifier| {
        let mut model = learner.clone_unfitted();
        model.fit(ctx.x, ctx.y, ctx.sample_weight)?;
        Ok(model)
    })
}

/// Fit the caller's learner instances themselves on the full training set
pub(crate) fn refit_in_place(
    learners: &mut [Box<dyn Classifier>],
    ctx: &FitContext<'_>,
) -> Result<()> {
    ctx.parallel
        .try_map(learners.iter_mut().collect(), |learner: &mut Box<dyn Classifier>| {
            learner.fit(ctx.x, ctx.y, ctx.sample_weight)
        })
        .map(|_| ())
}

/// Meta-features of `x` from already fitted learners, same layout as training
pub(crate) fn predict_blocks(
    models: &[Box<dyn Classifier>],
    x: &Array2<f64>,
    layout: &MetaLayout,
    parallel: ParallelConfig,
) -> Result<Array2<f64>> {
    let models: Vec<&dyn Classifier> = models.iter().map(|m| m.as_ref()).collect();
    let blocks = parallel.try_map(models, |model: &dyn Classifier| layout.learner_block(model, x))?;

    let width = layout.width();
    let mut meta = Array2::zeros((x.nrows(), blocks.len() * width));
    for (mut chunk, block) in meta.axis_chunks_iter_mut(Axis(1), width).zip(&blocks) {
        chunk.assign(block);
    }
    Ok(meta)
}
