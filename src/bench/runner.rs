//! Single-trial execution.
//!
//! A trial stages the working table into a fresh compute session, injects a
//! seeded noise column, repartitions to the trial's worker count, assembles
//! the feature matrix, and then times nothing but the fit call itself.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use ndarray::Array2;
use rand::prelude::*;

use crate::cluster::{self, Algorithm, FitSummary};
use crate::dataset::{FeatureSet, WorkingTable};
use crate::session::{ComputeSession, SessionConfig, DEFAULT_MEMORY_LIMIT_BYTES};

use super::series::TrialExecutor;
use super::BenchError;

/// Exclusive upper bound for freshly drawn trial seeds.
///
/// Wide enough that repeated trials within one process will not collide.
pub const NOISE_SEED_MAX: u64 = 20_000_000;

/// Raw result of one trial.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// Wall-clock seconds spent inside the fit call only.
    pub duration_seconds: f64,
    /// Materialized feature rows after invalid rows were skipped.
    pub rows_used: usize,
    /// The seed shared by the noise column and the model.
    pub seed: u64,
    pub summary: FitSummary,
}

/// Executes one `(algorithm, node count)` trial against a staged table.
///
/// Each execution acquires its own [`ComputeSession`] and tears it down
/// before returning, so no state carries over between trials. Production
/// draws a fresh seed per trial; tests can pin one.
pub struct TrialRunner {
    table: Arc<WorkingTable>,
    features: FeatureSet,
    fixed_seed: Option<u64>,
    memory_limit_bytes: usize,
}

impl TrialRunner {
    pub fn new(table: Arc<WorkingTable>, features: FeatureSet) -> Self {
        Self {
            table,
            features,
            fixed_seed: None,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
        }
    }

    /// Pin the per-trial seed instead of drawing a fresh one.
    pub fn with_fixed_seed(mut self, seed: u64) -> Self {
        self.fixed_seed = Some(seed);
        self
    }

    /// Override the session memory budget.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = bytes;
        self
    }

    fn draw_seed(&self) -> u64 {
        match self.fixed_seed {
            Some(seed) => seed,
            None => rand::rng().random_range(1..NOISE_SEED_MAX),
        }
    }
}

impl TrialExecutor for TrialRunner {
    fn execute(&mut self, algorithm: Algorithm, nodes: usize) -> Result<TrialOutcome, BenchError> {
        let mut session = ComputeSession::acquire_with(SessionConfig {
            workers: nodes,
            memory_limit_bytes: self.memory_limit_bytes,
        })
        .map_err(|source| BenchError::Session { nodes, source })?;

        // Everything up to the fit call is untimed staging work. The session
        // is torn down on every path below: explicitly on success, via Drop
        // on the error returns.
        let feature_cols = self.table.gather(&self.features)?;
        let n_rows = self.table.n_rows();
        let staged_bytes = n_rows * (feature_cols.len() + 1) * std::mem::size_of::<f64>();
        session
            .admit(staged_bytes)
            .map_err(|source| BenchError::Session { nodes, source })?;

        // Fresh noise column per trial defeats any result caching across
        // trials; the model reuses the same seed.
        let seed = self.draw_seed();
        let mut rng = StdRng::seed_from_u64(seed);
        let noise: Vec<f64> = (0..n_rows).map(|_| rng.random::<f64>()).collect();

        let raw = repartition(&feature_cols, &noise, nodes);
        let assembled = assemble(&raw);

        // Materialization point: resolves all staging cost before the timer.
        let rows_used: usize = assembled.iter().map(Array2::nrows).sum();

        let fit_input = match algorithm.fit_config().sample_fraction {
            Some(fraction) => downsample(&assembled, fraction, seed),
            None => assembled,
        };

        let started = Instant::now();
        let fit_result = session.run(|| cluster::fit(algorithm, &fit_input, seed));
        let duration_seconds = started.elapsed().as_secs_f64();
        session.release();

        let summary = match fit_result {
            Ok(Ok(summary)) => summary,
            Ok(Err(source)) => {
                return Err(BenchError::Trial {
                    algorithm,
                    nodes,
                    source,
                })
            }
            Err(source) => return Err(BenchError::Session { nodes, source }),
        };

        debug!(
            "{algorithm} on {nodes} nodes: {duration_seconds:.4}s over {rows_used} rows \
             (seed {seed}, {} iterations, objective {:.4})",
            summary.iterations, summary.objective
        );

        Ok(TrialOutcome {
            duration_seconds,
            rows_used,
            seed,
            summary,
        })
    }
}

/// Split rows into exactly `parts` contiguous chunks, noise column last.
fn repartition(feature_cols: &[&[f64]], noise: &[f64], parts: usize) -> Vec<Array2<f64>> {
    let n = noise.len();
    let d = feature_cols.len();
    let chunk = n.div_ceil(parts).max(1);

    let mut out = Vec::with_capacity(parts);
    let mut start = 0;
    while start < n {
        let end = (start + chunk).min(n);
        let mut matrix = Array2::zeros((end - start, d + 1));
        for (r, global) in (start..end).enumerate() {
            for (c, col) in feature_cols.iter().enumerate() {
                matrix[(r, c)] = col[global];
            }
            matrix[(r, d)] = noise[global];
        }
        out.push(matrix);
        start = end;
    }
    while out.len() < parts {
        out.push(Array2::zeros((0, d + 1)));
    }
    out
}

/// Drop the noise column and skip rows with non-finite feature values.
fn assemble(raw: &[Array2<f64>]) -> Vec<Array2<f64>> {
    raw.iter()
        .map(|chunk| {
            let d = chunk.ncols() - 1;
            let kept: Vec<usize> = (0..chunk.nrows())
                .filter(|&r| (0..d).all(|c| chunk[(r, c)].is_finite()))
                .collect();

            let mut matrix = Array2::zeros((kept.len(), d));
            for (dst, &src) in kept.iter().enumerate() {
                for c in 0..d {
                    matrix[(dst, c)] = chunk[(src, c)];
                }
            }
            matrix
        })
        .collect()
}

/// Seeded Bernoulli row sample at `fraction`.
fn downsample(parts: &[Array2<f64>], fraction: f64, seed: u64) -> Vec<Array2<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    parts
        .iter()
        .map(|part| {
            let kept: Vec<usize> = (0..part.nrows())
                .filter(|_| rng.random::<f64>() < fraction)
                .collect();
            let mut matrix = Array2::zeros((kept.len(), part.ncols()));
            for (dst, &src) in kept.iter().enumerate() {
                matrix.row_mut(dst).assign(&part.row(src));
            }
            matrix
        })
        .collect()
}
