//! Gaussian mixture fitting via expectation-maximization.
//!
//! Diagonal covariances. Each EM iteration accumulates responsibilities,
//! weighted sums, and weighted squares per partition in parallel, then
//! reduces them into the next parameter set.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rayon::prelude::*;

use super::{gather_rows, total_rows, Algorithm, FitConfig, FitError, FitSummary};

/// Variance floor keeping components from collapsing onto a point.
const VAR_FLOOR: f64 = 1e-6;
/// Relative log-likelihood improvement below which EM stops.
const LL_TOL: f64 = 1e-6;

const LN_2PI: f64 = 1.837877066409345;

pub(super) fn fit(
    partitions: &[Array2<f64>],
    config: &FitConfig,
    seed: u64,
) -> Result<FitSummary, FitError> {
    let n = total_rows(partitions);
    if n == 0 {
        return Err(FitError::NoData);
    }
    let k = config.clusters;
    if n < k {
        return Err(FitError::InsufficientRows { needed: k, got: n });
    }
    let d = partitions
        .iter()
        .find(|p| p.nrows() > 0)
        .map(|p| p.ncols())
        .unwrap_or(0);

    let mut rng = StdRng::seed_from_u64(seed);
    let init = rand::seq::index::sample(&mut rng, n, k).into_vec();
    let mut means = gather_rows(partitions, &init);

    // All components start from the global per-dimension variance.
    let global_var = global_variance(partitions, n, d);
    let mut vars = Array2::from_shape_fn((k, d), |(_, j)| global_var[j].max(VAR_FLOOR));
    let mut weights = Array1::from_elem(k, 1.0 / k as f64);

    let mut log_likelihood = f64::NEG_INFINITY;
    let mut iterations = 0;

    for iter in 0..config.max_iter {
        let stats = em_pass(partitions, &weights, &means, &vars);
        iterations = iter + 1;

        for c in 0..k {
            let resp = stats.resp_sums[c].max(f64::MIN_POSITIVE);
            weights[c] = resp / n as f64;
            for j in 0..d {
                let mean = stats.weighted_sums[(c, j)] / resp;
                means[(c, j)] = mean;
                vars[(c, j)] = (stats.weighted_sqs[(c, j)] / resp - mean * mean).max(VAR_FLOOR);
            }
        }

        let improved = stats.log_likelihood - log_likelihood;
        let done = improved.abs() < LL_TOL * stats.log_likelihood.abs().max(1.0);
        log_likelihood = stats.log_likelihood;
        if done {
            break;
        }
    }

    Ok(FitSummary {
        algorithm: Algorithm::GaussianMixture,
        clusters: k,
        iterations,
        objective: log_likelihood,
    })
}

struct EmStats {
    resp_sums: Array1<f64>,
    weighted_sums: Array2<f64>,
    weighted_sqs: Array2<f64>,
    log_likelihood: f64,
}

fn em_pass(
    partitions: &[Array2<f64>],
    weights: &Array1<f64>,
    means: &Array2<f64>,
    vars: &Array2<f64>,
) -> EmStats {
    let k = means.nrows();
    let d = means.ncols();

    let log_weights: Vec<f64> = weights.iter().map(|w| w.max(f64::MIN_POSITIVE).ln()).collect();

    partitions
        .par_iter()
        .map(|part| {
            let mut resp_sums = Array1::<f64>::zeros(k);
            let mut weighted_sums = Array2::<f64>::zeros((k, d));
            let mut weighted_sqs = Array2::<f64>::zeros((k, d));
            let mut ll = 0.0;
            let mut log_prob = vec![0.0f64; k];

            for row in part.outer_iter() {
                for c in 0..k {
                    let mut lp = log_weights[c];
                    for j in 0..d {
                        let var = vars[(c, j)];
                        let diff = row[j] - means[(c, j)];
                        lp -= 0.5 * (LN_2PI + var.ln() + diff * diff / var);
                    }
                    log_prob[c] = lp;
                }

                let max_lp = log_prob.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let norm: f64 = log_prob.iter().map(|lp| (lp - max_lp).exp()).sum();
                let lse = max_lp + norm.ln();
                ll += lse;

                for c in 0..k {
                    let resp = (log_prob[c] - lse).exp();
                    resp_sums[c] += resp;
                    for j in 0..d {
                        let v = row[j];
                        weighted_sums[(c, j)] += resp * v;
                        weighted_sqs[(c, j)] += resp * v * v;
                    }
                }
            }

            EmStats {
                resp_sums,
                weighted_sums,
                weighted_sqs,
                log_likelihood: ll,
            }
        })
        .reduce(
            || EmStats {
                resp_sums: Array1::zeros(k),
                weighted_sums: Array2::zeros((k, d)),
                weighted_sqs: Array2::zeros((k, d)),
                log_likelihood: 0.0,
            },
            |a, b| EmStats {
                resp_sums: a.resp_sums + b.resp_sums,
                weighted_sums: a.weighted_sums + b.weighted_sums,
                weighted_sqs: a.weighted_sqs + b.weighted_sqs,
                log_likelihood: a.log_likelihood + b.log_likelihood,
            },
        )
}

fn global_variance(partitions: &[Array2<f64>], n: usize, d: usize) -> Vec<f64> {
    let (sums, sqs) = partitions
        .par_iter()
        .map(|part| {
            let mut sums = vec![0.0f64; d];
            let mut sqs = vec![0.0f64; d];
            for row in part.outer_iter() {
                for j in 0..d {
                    sums[j] += row[j];
                    sqs[j] += row[j] * row[j];
                }
            }
            (sums, sqs)
        })
        .reduce(
            || (vec![0.0; d], vec![0.0; d]),
            |mut a, b| {
                for j in 0..d {
                    a.0[j] += b.0[j];
                    a.1[j] += b.1[j];
                }
                a
            },
        );

    (0..d)
        .map(|j| {
            let mean = sums[j] / n as f64;
            sqs[j] / n as f64 - mean * mean
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Axis;

    fn two_component_data() -> Vec<Array2<f64>> {
        let mut flat = Vec::new();
        for i in 0..30 {
            let jitter = (i % 7) as f64 * 0.03;
            flat.extend_from_slice(&[jitter, jitter * 0.5]);
            flat.extend_from_slice(&[6.0 + jitter, 6.0 - jitter]);
        }
        let all = Array2::from_shape_vec((60, 2), flat).unwrap();
        all.axis_chunks_iter(Axis(0), 15)
            .map(|c| c.to_owned())
            .collect()
    }

    #[test]
    fn likelihood_improves_and_components_separate() {
        let parts = two_component_data();
        let config = FitConfig {
            clusters: 2,
            max_iter: 30,
            sample_fraction: None,
        };
        let summary = fit(&parts, &config, 3).unwrap();
        assert_eq!(summary.clusters, 2);
        assert!(summary.objective.is_finite());
        assert!(summary.iterations >= 2);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        // Single partition keeps the parallel reduction order fixed.
        let merged = ndarray::concatenate(
            Axis(0),
            &two_component_data().iter().map(|p| p.view()).collect::<Vec<_>>(),
        )
        .unwrap();
        let parts = vec![merged];
        let config = FitConfig {
            clusters: 2,
            max_iter: 10,
            sample_fraction: None,
        };
        let a = fit(&parts, &config, 9).unwrap();
        let b = fit(&parts, &config, 9).unwrap();
        assert_eq!(a.objective, b.objective);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn needs_at_least_k_rows() {
        let parts = vec![Array2::zeros((4, 2))];
        let config = FitConfig {
            clusters: 10,
            max_iter: 5,
            sample_fraction: None,
        };
        assert!(matches!(
            fit(&parts, &config, 1),
            Err(FitError::InsufficientRows { .. })
        ));
    }
}
