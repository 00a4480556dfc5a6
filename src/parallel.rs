//! Worker pool used for the data-parallel loops (row derivation, band updates, decoding, table
//! scaling).
//!
//! The pool is built from an explicit [ParallelConfig] and handed to whoever needs it. Nothing here
//! touches rayon's global pool.

use crate::error::OkvsError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Size of the worker pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Number of worker threads. Must be at least 1.
    pub num_threads: usize,
}

impl ParallelConfig {
    /// Pool with exactly `num_threads` workers.
    pub fn new(num_threads: usize) -> Self {
        Self { num_threads }
    }

    /// Single worker. Useful in tests and for deterministic profiling.
    pub fn single() -> Self {
        Self { num_threads: 1 }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { num_threads }
    }
}

/// Cheaply clonable handle to a fixed-size rayon pool.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
}

impl WorkerPool {
    /// Build a pool from `config`.
    pub fn new(config: &ParallelConfig) -> Result<Self, OkvsError> {
        if config.num_threads == 0 {
            return Err(OkvsError::ConfigInvalid(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("okvs-worker-{}", i))
            .build()?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Run `op` inside the pool; rayon iterators used by `op` fan out over its workers.
    #[inline]
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_pool_size() {
        let pool = WorkerPool::new(&ParallelConfig::new(3)).unwrap();
        assert_eq!(pool.num_threads(), 3);

        let sum: u64 = pool.install(|| (0..1000u64).into_par_iter().sum());
        assert_eq!(sum, 999 * 1000 / 2);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let res = WorkerPool::new(&ParallelConfig::new(0));
        assert!(matches!(res, Err(OkvsError::ConfigInvalid(_))));
    }
}
