//! Bounded-concurrency fan-out over a dedicated worker pool.
//!
//! Results come back in submission order whatever order the workers finish
//! in, and one item's failure (or panic) never aborts the rest.

use std::convert::Infallible;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::coordinate::Coordinate;

/// Steady-state worker count for geocoding and distance calls.
pub const DEFAULT_WORKERS: usize = 6;

/// Definite result for one submitted item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus<T> {
    Succeeded(T),
    Failed { reason: String },
}

impl<T> ItemStatus<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Succeeded(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct BatchOrchestrator {
    pool: ThreadPool,
    workers: usize,
}

impl BatchOrchestrator {
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("planner-worker-{idx}"))
            .build()?;
        Ok(Self { pool, workers })
    }

    /// Single worker: every call is serialised.
    pub fn legacy() -> Result<Self, ThreadPoolBuildError> {
        Self::new(1)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `f` to every item on the pool, preserving input order.
    pub fn run<I, T, E, F>(&self, items: &[I], f: F) -> Vec<ItemStatus<T>>
    where
        I: Sync,
        T: Send,
        E: Display,
        F: Fn(&I) -> Result<T, E> + Sync,
    {
        debug!(items = items.len(), workers = self.workers, "starting batch");
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .map(|(idx, item)| match panic::catch_unwind(AssertUnwindSafe(|| f(item))) {
                    Ok(Ok(value)) => ItemStatus::Succeeded(value),
                    Ok(Err(err)) => ItemStatus::Failed {
                        reason: err.to_string(),
                    },
                    Err(_) => {
                        warn!(item = idx, "worker panicked");
                        ItemStatus::Failed {
                            reason: "worker panicked".to_string(),
                        }
                    }
                })
                .collect()
        })
    }

    /// Full `n x n` matrix, one work item per ordered pair.
    ///
    /// Self-pairs are zero without calling `distance`; failed items become
    /// infinity.
    pub fn distance_matrix<F>(&self, coords: &[Coordinate], distance: F) -> Vec<Vec<f64>>
    where
        F: Fn(Coordinate, Coordinate) -> f64 + Sync,
    {
        let n = coords.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .collect();

        let results = self.run(&pairs, |&(i, j)| {
            if i == j {
                return Ok::<f64, Infallible>(0.0);
            }
            Ok(distance(coords[i], coords[j]))
        });

        let mut matrix = vec![vec![0.0; n]; n];
        for (&(i, j), status) in pairs.iter().zip(results) {
            matrix[i][j] = status.ok().unwrap_or(f64::INFINITY);
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_output_order_matches_input() {
        let batch = BatchOrchestrator::new(4).unwrap();
        let items: Vec<u64> = (0..40).collect();
        let results = batch.run(&items, |&n| {
            // Earlier items sleep longer so they finish last.
            std::thread::sleep(Duration::from_millis(40 - n));
            Ok::<u64, Infallible>(n * 10)
        });
        let values: Vec<u64> = results.into_iter().filter_map(ItemStatus::ok).collect();
        assert_eq!(values, (0..40).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_failures_stay_in_place() {
        let batch = BatchOrchestrator::new(3).unwrap();
        let items = vec!["1", "x", "3", "", "5"];
        let results = batch.run(&items, |s| s.parse::<u32>());
        assert_eq!(results.len(), items.len());
        assert_eq!(results[0], ItemStatus::Succeeded(1));
        assert!(!results[1].is_success());
        assert_eq!(results[2], ItemStatus::Succeeded(3));
        assert!(!results[3].is_success());
        assert_eq!(results[4], ItemStatus::Succeeded(5));
    }

    #[test]
    fn test_panicking_item_does_not_abort_batch() {
        let batch = BatchOrchestrator::new(2).unwrap();
        let items = vec![1, 2, 3];
        let results = batch.run(&items, |&n| {
            if n == 2 {
                panic!("boom");
            }
            Ok::<i32, Infallible>(n)
        });
        assert_eq!(results[0], ItemStatus::Succeeded(1));
        assert_eq!(
            results[1],
            ItemStatus::Failed {
                reason: "worker panicked".to_string()
            }
        );
        assert_eq!(results[2], ItemStatus::Succeeded(3));
    }

    #[test]
    fn test_legacy_mode_uses_one_worker() {
        let batch = BatchOrchestrator::legacy().unwrap();
        assert_eq!(batch.workers(), 1);
        let results = batch.run(&[1, 2, 3], |&n| Ok::<i32, Infallible>(n + 1));
        assert_eq!(
            results,
            vec![
                ItemStatus::Succeeded(2),
                ItemStatus::Succeeded(3),
                ItemStatus::Succeeded(4)
            ]
        );
    }

    #[test]
    fn test_matrix_skips_self_pairs() {
        let batch = BatchOrchestrator::new(DEFAULT_WORKERS).unwrap();
        let coords = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
        ];
        let calls = AtomicUsize::new(0);
        let matrix = batch.distance_matrix(&coords, |a, b| {
            calls.fetch_add(1, Ordering::SeqCst);
            (a.lat - b.lat).abs() + (a.lon - b.lon).abs()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        for i in 0..3 {
            assert_eq!(matrix[i][i], 0.0);
        }
        assert_eq!(matrix[0][2], 2.0);
        assert_eq!(matrix[2][1], 1.0);
    }
}
