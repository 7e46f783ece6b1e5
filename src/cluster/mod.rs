//! Clustering and topic-model fit kernels.
//!
//! These kernels provide the benchmark's compute load. Each fit consumes a
//! partitioned feature table (one matrix per partition) and parallelizes its
//! per-iteration work across partitions with rayon, so the degree of
//! parallelism is set by the session pool the fit runs inside.
//!
//! Hyperparameters are fixed per algorithm and live in the static
//! [`Algorithm::fit_config`] table; they are not user-tunable.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

mod bisecting;
mod gmm;
mod kmeans;
mod lda;

/// Fit failures.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("no feature rows to fit")]
    NoData,

    #[error("not enough rows: need at least {needed}, got {got}")]
    InsufficientRows { needed: usize, got: usize },
}

/// The supported workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    KMeans,
    BisectingKMeans,
    GaussianMixture,
    Lda,
}

/// Algorithm order used by the unattended batch runner (LDA first).
pub const ALL_ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Lda,
    Algorithm::KMeans,
    Algorithm::BisectingKMeans,
    Algorithm::GaussianMixture,
];

/// Fixed per-algorithm hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    /// Number of clusters or topics.
    pub clusters: usize,
    /// Maximum fit iterations.
    pub max_iter: usize,
    /// Input downsampling fraction applied before the fit, if any.
    pub sample_fraction: Option<f64>,
}

impl Algorithm {
    /// The static hyperparameter table.
    ///
    /// LDA additionally runs the online variational optimizer over its
    /// half-sampled input; the other three iterate over the full table.
    pub const fn fit_config(self) -> FitConfig {
        match self {
            Algorithm::KMeans => FitConfig {
                clusters: 40,
                max_iter: 80,
                sample_fraction: None,
            },
            Algorithm::BisectingKMeans => FitConfig {
                clusters: 30,
                max_iter: 60,
                sample_fraction: None,
            },
            Algorithm::GaussianMixture => FitConfig {
                clusters: 10,
                max_iter: 20,
                sample_fraction: None,
            },
            Algorithm::Lda => FitConfig {
                clusters: 3,
                max_iter: 2,
                sample_fraction: Some(0.5),
            },
        }
    }

    /// Canonical persisted name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::KMeans => "KMeans",
            Algorithm::BisectingKMeans => "BisectingKMeans",
            Algorithm::GaussianMixture => "GMM",
            Algorithm::Lda => "LDA",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    /// Accepts canonical names plus the human labels used by front ends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "KMeans" | "K-Means" => Ok(Algorithm::KMeans),
            "BisectingKMeans" | "Bisecting K-Means" => Ok(Algorithm::BisectingKMeans),
            "GMM" | "Gaussian Mixture" => Ok(Algorithm::GaussianMixture),
            "LDA" => Ok(Algorithm::Lda),
            other => Err(format!("unknown algorithm `{other}`")),
        }
    }
}

/// Outcome of one fit, for logging and diagnostics.
///
/// The benchmark itself only consumes the wall-clock duration measured
/// around the fit call; the summary makes the work inspectable.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub algorithm: Algorithm,
    pub clusters: usize,
    pub iterations: usize,
    /// Algorithm-specific objective: within-cluster SSE for the k-means
    /// family, final log-likelihood for GMM, a held-in log-probability
    /// proxy for LDA.
    pub objective: f64,
}

/// Fit `algorithm` on a partitioned feature table.
///
/// Must be called inside a [`crate::session::ComputeSession`] pool so the
/// per-partition work lands on the session's workers. The same `seed` drives
/// every random choice in the fit.
pub fn fit(
    algorithm: Algorithm,
    partitions: &[Array2<f64>],
    seed: u64,
) -> Result<FitSummary, FitError> {
    let config = algorithm.fit_config();
    match algorithm {
        Algorithm::KMeans => kmeans::fit(partitions, &config, seed),
        Algorithm::BisectingKMeans => bisecting::fit(partitions, &config, seed),
        Algorithm::GaussianMixture => gmm::fit(partitions, &config, seed),
        Algorithm::Lda => lda::fit(partitions, &config, seed),
    }
}

/// Total rows across partitions.
pub(crate) fn total_rows(partitions: &[Array2<f64>]) -> usize {
    partitions.iter().map(Array2::nrows).sum()
}

/// Gather `indices` (global row order) into one matrix.
pub(crate) fn gather_rows(partitions: &[Array2<f64>], indices: &[usize]) -> Array2<f64> {
    let d = partitions.first().map(|p| p.ncols()).unwrap_or(0);
    let mut out = Array2::zeros((indices.len(), d));

    // Partition offsets in global row order.
    let mut offsets = Vec::with_capacity(partitions.len());
    let mut acc = 0usize;
    for p in partitions {
        offsets.push(acc);
        acc += p.nrows();
    }

    for (dst, &global) in indices.iter().enumerate() {
        // Last partition starting at or before `global`; empty partitions
        // share their start with the next one and are never selected.
        let part = offsets.partition_point(|&o| o <= global) - 1;
        let local = global - offsets[part];
        out.row_mut(dst).assign(&partitions[part].row(local));
    }
    out
}
