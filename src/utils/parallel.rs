//! Parallel processing utilities

use crate::error::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Worker bound for independent fit/predict tasks.
///
/// `None` and `Some(1)` run tasks one after another on the calling thread,
/// `Some(0)` uses rayon's global pool and `Some(n)` builds a dedicated pool
/// of `n` workers for the duration of the call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelConfig {
    pub n_jobs: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(n_jobs: Option<usize>) -> Self {
        Self { n_jobs }
    }

    /// Set number of workers
    pub fn with_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self.n_jobs, None | Some(1))
    }

    /// Get the number of threads that will run tasks
    pub fn num_threads(&self) -> usize {
        match self.n_jobs {
            None | Some(1) => 1,
            Some(0) => rayon::current_num_threads(),
            Some(n) => n,
        }
    }

    /// Map `f` over `items`, keeping input order in the output.
    ///
    /// The first error aborts the map and is returned unchanged.
    pub fn try_map<T, U, F>(&self, items: Vec<T>, f: F) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Result<U> + Send + Sync,
    {
        match self.n_jobs {
            None | Some(1) => items.into_iter().map(f).collect(),
            Some(0) => items.into_par_iter().map(f).collect(),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                pool.install(|| items.into_par_iter().map(f).collect())
            }
        }
    }
}
