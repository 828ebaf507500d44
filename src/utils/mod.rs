//! Utility functions and types

pub mod datasets;
pub mod input;
mod parallel;

pub use datasets::{load_iris, Dataset};
pub use input::{ArrayLike, LabelLike, Labels};
pub use parallel::ParallelConfig;
