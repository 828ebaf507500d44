//! Conversion of caller inputs into the numeric arrays the ensemble works on
//!
//! Only homogeneous `ndarray` arrays are accepted. Row-wise nested `Vec`s and
//! polars tables are rejected up front, with a message saying how to convert
//! them, instead of failing somewhere inside a learner.

use crate::error::{Result, StackingError};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::{DataFrame, Series};

const ARRAY_HINT: &str = "StackingCvClassifier requires X and y to be ndarray arrays \
     (Array2<f64> for X, Array1<f64> for y).";

fn nested_vec_error(rows: usize) -> StackingError {
    StackingError::InputTypeError(format!(
        "{} If X and y are nested Vecs ({} rows here), convert them with \
         `Array2::from_shape_vec((n_rows, n_cols), values)` and `Array1::from_vec(labels)`.",
        ARRAY_HINT, rows
    ))
}

fn dataframe_error(shape: (usize, usize)) -> StackingError {
    StackingError::InputTypeError(format!(
        "{} If X and y are polars DataFrames ({} x {} here), convert them with \
         `df.to_ndarray::<Float64Type>(IndexOrder::C)`.",
        ARRAY_HINT, shape.0, shape.1
    ))
}

/// Feature matrix input
pub trait ArrayLike {
    fn to_features(&self) -> Result<Array2<f64>>;
}

impl ArrayLike for Array2<f64> {
    fn to_features(&self) -> Result<Array2<f64>> {
        Ok(self.clone())
    }
}

impl ArrayLike for ArrayView2<'_, f64> {
    fn to_features(&self) -> Result<Array2<f64>> {
        Ok(self.to_owned())
    }
}

impl ArrayLike for Vec<Vec<f64>> {
    fn to_features(&self) -> Result<Array2<f64>> {
        Err(nested_vec_error(self.len()))
    }
}

impl ArrayLike for DataFrame {
    fn to_features(&self) -> Result<Array2<f64>> {
        Err(dataframe_error(self.shape()))
    }
}

/// Label input after conversion
#[derive(Debug, Clone, PartialEq)]
pub enum Labels {
    /// One class value per sample
    Flat(Array1<f64>),
    /// Several label columns per sample
    MultiColumn(Array2<f64>),
}

/// Label vector input. A single-column matrix counts as a flat label vector.
pub trait LabelLike {
    fn to_labels(&self) -> Result<Labels>;
}

impl LabelLike for Array1<f64> {
    fn to_labels(&self) -> Result<Labels> {
        Ok(Labels::Flat(self.clone()))
    }
}

impl LabelLike for ArrayView1<'_, f64> {
    fn to_labels(&self) -> Result<Labels> {
        Ok(Labels::Flat(self.to_owned()))
    }
}

impl LabelLike for Array2<f64> {
    fn to_labels(&self) -> Result<Labels> {
        if self.ncols() == 1 {
            Ok(Labels::Flat(self.index_axis(Axis(1), 0).to_owned()))
        } else {
            Ok(Labels::MultiColumn(self.clone()))
        }
    }
}

impl LabelLike for Vec<f64> {
    fn to_labels(&self) -> Result<Labels> {
        Err(nested_vec_error(self.len()))
    }
}

impl LabelLike for Vec<Vec<f64>> {
    fn to_labels(&self) -> Result<Labels> {
        Err(nested_vec_error(self.len()))
    }
}

impl LabelLike for DataFrame {
    fn to_labels(&self) -> Result<Labels> {
        Err(dataframe_error(self.shape()))
    }
}

impl LabelLike for Series {
    fn to_labels(&self) -> Result<Labels> {
        Err(dataframe_error((self.len(), 1)))
    }
}
