//! Append-only JSONL store.
//!
//! One JSON object per line, appended and flushed per save so a failure on a
//! later trial never loses earlier ones. Dataset statistics snapshots go to
//! a sibling `<name>.stats.jsonl` file, keeping the run log homogeneous.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::ColumnStats;

use super::{BenchmarkRun, NewBenchmarkRun, ResultStore, StoreError};

/// A persisted statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub total_rows: u64,
    pub columns: Vec<ColumnStats>,
    pub timestamp: DateTime<Utc>,
}

/// File-backed [`ResultStore`].
pub struct JsonlStore {
    path: PathBuf,
    file: File,
}

impl JsonlStore {
    /// Open (or create) the run log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    /// Path of the run log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a dataset statistics snapshot next to the run log.
    pub fn save_stats(&self, columns: &[ColumnStats], total_rows: u64) -> Result<(), StoreError> {
        let record = StatsRecord {
            total_rows,
            columns: columns.to_vec(),
            timestamp: Utc::now(),
        };
        let line =
            serde_json::to_string(&record).map_err(|source| StoreError::Encode { source })?;

        let stats_path = self.stats_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stats_path)
            .map_err(|source| StoreError::Open {
                path: stats_path,
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| StoreError::Write { source })?;
        file.flush().map_err(|source| StoreError::Write { source })
    }

    fn stats_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "results".to_string());
        name.push_str(".stats.jsonl");
        self.path.with_file_name(name)
    }
}

impl ResultStore for JsonlStore {
    fn save(&mut self, run: &NewBenchmarkRun) -> Result<BenchmarkRun, StoreError> {
        let stored = run.with_timestamp(run.timestamp.unwrap_or_else(Utc::now));
        let line =
            serde_json::to_string(&stored).map_err(|source| StoreError::Encode { source })?;
        writeln!(self.file, "{line}").map_err(|source| StoreError::Write { source })?;
        self.file
            .flush()
            .map_err(|source| StoreError::Write { source })?;
        Ok(stored)
    }

    fn query_recent(&self, limit: usize) -> Result<Vec<BenchmarkRun>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new())
            }
            Err(source) => {
                return Err(StoreError::Open {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut runs = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| StoreError::Read { source })?;
            if line.trim().is_empty() {
                continue;
            }
            let run: BenchmarkRun =
                serde_json::from_str(&line).map_err(|source| StoreError::Decode { source })?;
            runs.push(run);
        }

        // Appended in chronological order, so the tail is the most recent.
        let start = runs.len().saturating_sub(limit);
        let mut recent: Vec<BenchmarkRun> = runs.split_off(start);
        recent.reverse();
        Ok(recent)
    }
}
