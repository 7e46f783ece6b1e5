//! Run configuration.
//!
//! Mirrors the YAML settings file fed to the front ends: where the data
//! lives, how many rows to keep, and where results are persisted. All of
//! these are external inputs; the core receives owned values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default row cap applied at ingest.
pub const DEFAULT_SAMPLE_ROWS: usize = 2_000_000;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {source}")]
    Parse { source: serde_yaml::Error },
}

/// Settings for one benchmark invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// CSV source; `None` means the caller supplies data another way.
    #[serde(default)]
    pub data_path: Option<PathBuf>,

    /// Row cap applied at ingest.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,

    /// Run log location.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_sample_rows() -> usize {
    DEFAULT_SAMPLE_ROWS
}

fn default_store_path() -> PathBuf {
    PathBuf::from("ml_results.jsonl")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            sample_rows: default_sample_rows(),
            store_path: default_store_path(),
        }
    }
}

impl RunConfig {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse { source })
    }
}
