//! In-memory store for tests and embedding.
//!
//! Behaves like the durable backends, including server-assigned timestamps,
//! and can be told to reject upcoming writes to exercise failure paths.

use chrono::Utc;

use super::{BenchmarkRun, NewBenchmarkRun, ResultStore, StoreError};

/// Volatile [`ResultStore`] with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: Vec<BenchmarkRun>,
    fail_next: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` save attempts.
    pub fn fail_next_saves(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// All stored runs in insertion order.
    pub fn runs(&self) -> &[BenchmarkRun] {
        &self.runs
    }
}

impl ResultStore for MemoryStore {
    fn save(&mut self, run: &NewBenchmarkRun) -> Result<BenchmarkRun, StoreError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StoreError::Rejected {
                reason: "injected failure".to_string(),
            });
        }

        let stored = run.with_timestamp(run.timestamp.unwrap_or_else(Utc::now));
        self.runs.push(stored.clone());
        Ok(stored)
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<BenchmarkRun>, StoreError> {
        Ok(self.runs.iter().rev().take(limit).cloned().collect())
    }
}
