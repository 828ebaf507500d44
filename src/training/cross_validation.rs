//! Cross-validation splitters and scoring

use crate::error::{Result, StackingError};
use crate::training::models::{unique_classes, Classifier};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Fold generation contract.
///
/// Implementations own their shuffling and stratification semantics; callers
/// use the returned splits as-is.
pub trait Splitter: Send + Sync + Debug {
    /// Generate train/test splits for `x`/`y`
    fn split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<CVSplit>>;

    /// Number of splits this splitter produces
    fn n_splits(&self) -> usize;
}

fn make_rng(random_state: Option<u64>) -> ChaCha8Rng {
    match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn check_n_splits(n_samples: usize, n_splits: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(StackingError::ValidationError(
            "n_splits must be at least 2".to_string(),
        ));
    }
    if n_samples < n_splits {
        return Err(StackingError::ValidationError(format!(
            "n_samples ({}) must be >= n_splits ({})",
            n_samples, n_splits
        )));
    }
    Ok(())
}

fn splits_from_folds(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
    (0..folds.len())
        .map(|fold_idx| {
            let mut train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            train_indices.sort_unstable();
            CVSplit {
                train_indices,
                test_indices: folds[fold_idx].clone(),
                fold_idx,
            }
        })
        .collect()
}

/// K-Fold cross-validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

impl Splitter for KFold {
    fn split(&self, x: &Array2<f64>, _y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = x.nrows();
        check_n_splits(n_samples, self.n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            indices.shuffle(&mut make_rng(self.random_state));
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut current = 0;
        for i in 0..self.n_splits {
            let fold_size = if i < remainder { base + 1 } else { base };
            folds.push(indices[current..current + fold_size].to_vec());
            current += fold_size;
        }

        Ok(splits_from_folds(folds))
    }

    fn n_splits(&self) -> usize {
        self.n_splits
    }
}

/// Stratified K-Fold (keeps class proportions in every fold)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

impl Splitter for StratifiedKFold {
    fn split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = x.nrows();
        if y.len() != n_samples {
            return Err(StackingError::length_mismatch("y", n_samples, y.len()));
        }
        check_n_splits(n_samples, self.n_splits)?;

        if let Some(bad) = y.iter().find(|v| !v.is_finite()) {
            return Err(StackingError::ValidationError(format!(
                "stratified folds need finite class labels, got {}",
                bad
            )));
        }

        // One stratum per exact class value, in sorted class order
        let classes = unique_classes(y);
        let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); classes.len()];
        for (idx, &val) in y.iter().enumerate() {
            if let Some(c) = classes.iter().position(|&class| class == val) {
                class_indices[c].push(idx);
            }
        }

        if self.shuffle {
            let mut rng = make_rng(self.random_state);
            for indices in &mut class_indices {
                indices.shuffle(&mut rng);
            }
        }

        // Deal samples round-robin, continuing the rotation across classes so
        // fold sizes differ by at most one.
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut next = 0usize;
        for indices in &class_indices {
            for &idx in indices {
                folds[next % self.n_splits].push(idx);
                next += 1;
            }
        }
        for fold in &mut folds {
            fold.sort_unstable();
        }

        Ok(splits_from_folds(folds))
    }

    fn n_splits(&self) -> usize {
        self.n_splits
    }
}

/// Check that the holdout sets of `splits` partition `0..n_samples` and that
/// no split trains on its own holdout rows.
pub fn validate_partition(splits: &[CVSplit], n_samples: usize) -> Result<()> {
    let mut seen = vec![0usize; n_samples];
    for split in splits {
        let mut in_test = vec![false; n_samples];
        for &idx in &split.test_indices {
            if idx >= n_samples {
                return Err(StackingError::ValidationError(format!(
                    "fold {} holds out index {} but there are only {} samples",
                    split.fold_idx, idx, n_samples
                )));
            }
            in_test[idx] = true;
            seen[idx] += 1;
        }
        if let Some(&idx) = split
            .train_indices
            .iter()
            .find(|&&i| i >= n_samples || in_test[i])
        {
            return Err(StackingError::ValidationError(format!(
                "fold {} trains on index {} which is out of range or held out",
                split.fold_idx, idx
            )));
        }
    }
    if let Some(idx) = seen.iter().position(|&c| c != 1) {
        return Err(StackingError::ValidationError(format!(
            "cross-validation folds must hold out every sample exactly once; \
             sample {} was held out {} times",
            idx, seen[idx]
        )));
    }
    Ok(())
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores
            .iter()
            .map(|s| (s - mean_score).powi(2))
            .sum::<f64>()
            / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

/// Accuracy of fresh clones of `estimator` on each split of `cv`
pub fn cross_val_score(
    estimator: &dyn Classifier,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &dyn Splitter,
) -> Result<CVResults> {
    if x.nrows() != y.len() {
        return Err(StackingError::length_mismatch("y", x.nrows(), y.len()));
    }

    let splits = cv.split(x, y)?;
    let mut scores = Vec::with_capacity(splits.len());
    for split in &splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = estimator.clone_unfitted();
        model.fit(&x_train, &y_train, None)?;
        scores.push(model.score(&x_test, &y_test)?);
    }

    Ok(CVResults::from_scores(scores))
}
