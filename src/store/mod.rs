//! Durable result storage.
//!
//! The benchmark core only depends on the [`ResultStore`] contract; concrete
//! backends are injected at construction so callers (and tests) choose where
//! records land. Persisted records are immutable: the history log only ever
//! grows.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod jsonl;
mod memory;

pub use jsonl::{JsonlStore, StatsRecord};
pub use memory::MemoryStore;

/// Storage backend errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store at `{path}`: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write record: {source}")]
    Write { source: std::io::Error },

    #[error("failed to read stored records: {source}")]
    Read { source: std::io::Error },

    #[error("failed to encode record: {source}")]
    Encode { source: serde_json::Error },

    #[error("failed to decode stored record: {source}")]
    Decode { source: serde_json::Error },

    #[error("store rejected the write: {reason}")]
    Rejected { reason: String },
}

/// One persisted benchmark trial.
///
/// Immutable once saved; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub algorithm: String,
    pub nodes: u32,
    pub duration_seconds: f64,
    pub speedup: f64,
    pub efficiency_percent: f64,
    pub row_count: u64,
    pub timestamp: DateTime<Utc>,
}

/// A trial record about to be persisted.
///
/// The timestamp is optional: stores assign their own when the caller leaves
/// it unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBenchmarkRun {
    pub algorithm: String,
    pub nodes: u32,
    pub duration_seconds: f64,
    pub speedup: f64,
    pub efficiency_percent: f64,
    pub row_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewBenchmarkRun {
    /// The persisted form of this record, with every field carried over.
    pub fn with_timestamp(&self, timestamp: DateTime<Utc>) -> BenchmarkRun {
        BenchmarkRun {
            algorithm: self.algorithm.clone(),
            nodes: self.nodes,
            duration_seconds: self.duration_seconds,
            speedup: self.speedup,
            efficiency_percent: self.efficiency_percent,
            row_count: self.row_count,
            timestamp,
        }
    }
}

/// Contract consumed by the benchmark core.
pub trait ResultStore {
    /// Persist one run, assigning a timestamp when the record carries none.
    ///
    /// Returns the record as stored.
    fn save(&mut self, run: &NewBenchmarkRun) -> Result<BenchmarkRun, StoreError>;

    /// The `limit` most recent runs, newest first.
    ///
    /// An empty store yields an empty Vec, not an error.
    fn query_recent(&self, limit: usize) -> Result<Vec<BenchmarkRun>, StoreError>;
}

impl<S: ResultStore + ?Sized> ResultStore for &mut S {
    fn save(&mut self, run: &NewBenchmarkRun) -> Result<BenchmarkRun, StoreError> {
        (**self).save(run)
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<BenchmarkRun>, StoreError> {
        (**self).query_recent(limit)
    }
}
