//! clusterbench: a scaling benchmark harness for clustering workloads.
//!
//! This crate measures how clustering and topic-model fits scale across an
//! increasing number of parallel compute workers. A series runs one trial per
//! node count in `[1, 2, 4, 8]`, times each fit in isolation, derives speedup
//! and efficiency against the single-worker baseline, and persists every
//! trial to a durable result store.
//!
//! The main entry points are:
//!
//! - [`dataset::Dataset`] and [`dataset::select_features`]: prepare a bounded
//!   feature set from tabular input.
//! - [`session::ComputeSession`]: an isolated execution context sized to
//!   exactly `n` workers, torn down after every trial.
//! - [`bench::SeriesRunner`]: drives a full series and persists each
//!   [`store::BenchmarkRun`] as it completes.

pub mod bench;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod session;
pub mod store;
pub mod testing;

pub use bench::{ScalingMetrics, SeriesReport, SeriesRunner, TrialRunner, NODE_COUNTS};
pub use cluster::Algorithm;
pub use dataset::{select_features, Dataset, DatasetError, FeatureSet, WorkingTable};
pub use session::{ComputeSession, SessionConfig, SessionError};
pub use store::{BenchmarkRun, NewBenchmarkRun, ResultStore, StoreError};
