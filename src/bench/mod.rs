//! Benchmark orchestration.
//!
//! [`TrialRunner`] executes one isolated `(algorithm, node count)` trial and
//! returns a raw duration; [`SeriesRunner`] sequences trials across the
//! fixed node counts, derives scaling metrics, and persists every completed
//! trial immediately.

use crate::cluster::{Algorithm, FitError};
use crate::dataset::DatasetError;
use crate::session::SessionError;
use crate::store::{NewBenchmarkRun, StoreError};

mod metrics;
mod runner;
mod series;

pub use metrics::{scaling_metrics, ScalingMetrics};
pub use runner::{TrialOutcome, TrialRunner, NOISE_SEED_MAX};
pub use series::{
    ProgressObserver, ProgressUpdate, SeriesReport, SeriesRunner, SeriesState, TrialExecutor,
    NODE_COUNTS,
};

/// Benchmark-level errors.
///
/// Everything above the trial boundary is fatal to the enclosing series; no
/// node count is ever retried.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("could not create a session for {nodes} workers: {source}")]
    Session { nodes: usize, source: SessionError },

    #[error("benchmark trial failed for {algorithm} on {nodes} nodes: {source}")]
    Trial {
        algorithm: Algorithm,
        nodes: usize,
        source: FitError,
    },

    /// The trial's metrics were computed but could not be durably saved.
    ///
    /// Carries the unsaved record so callers still see the duration;
    /// computation and persistence are separable obligations.
    #[error("failed to persist result for {} on {} nodes: {source}", .run.algorithm, .run.nodes)]
    Persistence {
        run: Box<NewBenchmarkRun>,
        source: StoreError,
    },
}
