//! Online variational LDA.
//!
//! Feature vectors are treated as term counts (negative and non-finite
//! entries contribute nothing). Each partition is consumed as one minibatch;
//! topic parameters follow the online update `lambda <- (1-rho)*lambda +
//! rho*(eta + scale * sstats)` with the usual decaying step size.

use ndarray::Array2;
use rand::prelude::*;
use rayon::prelude::*;

use super::{total_rows, Algorithm, FitConfig, FitError, FitSummary};

const TAU0: f64 = 1024.0;
const KAPPA: f64 = 0.51;
const E_STEP_MAX_ITERS: usize = 20;
const MEAN_CHANGE_TOL: f64 = 1e-3;

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
    let d = partitions
        .iter()
        .find(|p| p.nrows() > 0)
        .map(|p| p.ncols())
        .unwrap_or(0);
    if d == 0 {
        return Err(FitError::NoData);
    }

    // Symmetric priors at 1/k, matching the online optimizer defaults.
    let alpha = 1.0 / k as f64;
    let eta = 1.0 / k as f64;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut lambda =
        Array2::from_shape_fn((k, d), |_| 1.0 + 0.1 * (rng.random::<f64>() - 0.5));

    let mut updates = 0usize;
    for _pass in 0..config.max_iter {
        for part in partitions {
            if part.nrows() == 0 {
                continue;
            }
            let elog_beta = dirichlet_expectation(&lambda);
            let exp_elog_beta = elog_beta.mapv(f64::exp);

            let (mut sstats, docs) = e_step(part, &exp_elog_beta, alpha);
            if docs == 0 {
                continue;
            }
            sstats *= &exp_elog_beta;

            let rho = (TAU0 + updates as f64).powf(-KAPPA);
            let scale = n as f64 / docs as f64;
            lambda.zip_mut_with(&sstats, |l, &s| {
                *l = (1.0 - rho) * *l + rho * (eta + scale * s);
            });
            updates += 1;
        }
    }

    Ok(FitSummary {
        algorithm: Algorithm::Lda,
        clusters: k,
        iterations: config.max_iter,
        objective: mean_token_log_prob(partitions, &lambda),
    })
}

/// Per-document variational E-step over one minibatch.
///
/// Returns unscaled sufficient statistics (missing the `exp(Elog beta)`
/// factor, applied by the caller) and the number of usable documents.
fn e_step(part: &Array2<f64>, exp_elog_beta: &Array2<f64>, alpha: f64) -> (Array2<f64>, usize) {
    let k = exp_elog_beta.nrows();
    let d = exp_elog_beta.ncols();

    (0..part.nrows())
        .into_par_iter()
        .fold(
            || (Array2::<f64>::zeros((k, d)), 0usize),
            |(mut acc, mut docs), i| {
                let row = part.row(i);
                let counts: Vec<f64> = row
                    .iter()
                    .map(|&v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
                    .collect();
                if counts.iter().sum::<f64>() <= 0.0 {
                    return (acc, docs);
                }
                docs += 1;

                let mut gamma = vec![1.0f64; k];
                let mut exp_elog_theta = vec![0.0f64; k];
                update_exp_elog_theta(&gamma, &mut exp_elog_theta);
                let mut phinorm = vec![0.0f64; d];

                for _ in 0..E_STEP_MAX_ITERS {
                    for (w, p) in phinorm.iter_mut().enumerate() {
                        let mut dot = 1e-100;
                        for c in 0..k {
                            dot += exp_elog_theta[c] * exp_elog_beta[(c, w)];
                        }
                        *p = dot;
                    }

                    let mut mean_change = 0.0;
                    for c in 0..k {
                        let mut dot = 0.0;
                        for w in 0..d {
                            if counts[w] > 0.0 {
                                dot += counts[w] * exp_elog_beta[(c, w)] / phinorm[w];
                            }
                        }
                        let updated = alpha + exp_elog_theta[c] * dot;
                        mean_change += (updated - gamma[c]).abs();
                        gamma[c] = updated;
                    }
                    update_exp_elog_theta(&gamma, &mut exp_elog_theta);

                    if mean_change / (k as f64) < MEAN_CHANGE_TOL {
                        break;
                    }
                }

                for c in 0..k {
                    for w in 0..d {
                        if counts[w] > 0.0 {
                            acc[(c, w)] += exp_elog_theta[c] * counts[w] / phinorm[w];
                        }
                    }
                }
                (acc, docs)
            },
        )
        .reduce(
            || (Array2::zeros((k, d)), 0),
            |a, b| (a.0 + b.0, a.1 + b.1),
        )
}

fn update_exp_elog_theta(gamma: &[f64], out: &mut [f64]) {
    let dg_sum = digamma(gamma.iter().sum());
    for (o, &g) in out.iter_mut().zip(gamma) {
        *o = (digamma(g) - dg_sum).exp();
    }
}

/// Row-wise `E[log beta]` for a Dirichlet parameter matrix.
fn dirichlet_expectation(lambda: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(lambda.dim());
    for (mut out_row, lam_row) in out.outer_iter_mut().zip(lambda.outer_iter()) {
        let dg_sum = digamma(lam_row.sum());
        for (o, &l) in out_row.iter_mut().zip(lam_row.iter()) {
            *o = digamma(l) - dg_sum;
        }
    }
    out
}

/// Mean per-token log-probability under topic-averaged word weights.
fn mean_token_log_prob(partitions: &[Array2<f64>], lambda: &Array2<f64>) -> f64 {
    let k = lambda.nrows();
    let d = lambda.ncols();

    let mut word_prob = vec![0.0f64; d];
    for topic in lambda.outer_iter() {
        let sum = topic.sum();
        for (w, &l) in topic.iter().enumerate() {
            word_prob[w] += l / sum / k as f64;
        }
    }

    let (score, tokens) = partitions
        .par_iter()
        .map(|part| {
            let mut score = 0.0;
            let mut tokens = 0.0;
            for row in part.outer_iter() {
                for (w, &v) in row.iter().enumerate() {
                    if v.is_finite() && v > 0.0 {
                        score += v * (word_prob[w] + 1e-12).ln();
                        tokens += v;
                    }
                }
            }
            (score, tokens)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

    if tokens > 0.0 {
        score / tokens
    } else {
        f64::NEG_INFINITY
    }
}

/// Asymptotic-series digamma, shifted into the stable region.
fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln()
        - 0.5 * inv
        - inv2 * (1.0 / 12.0 - inv2 * (1.0 / 120.0 - inv2 / 252.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn count_docs() -> Vec<Array2<f64>> {
        // Two word-usage patterns over a 4-term vocabulary.
        let mut flat = Vec::new();
        for i in 0..24 {
            if i % 2 == 0 {
                flat.extend_from_slice(&[5.0, 4.0, 0.0, 1.0]);
            } else {
                flat.extend_from_slice(&[0.0, 1.0, 6.0, 3.0]);
            }
        }
        vec![Array2::from_shape_vec((24, 4), flat).unwrap()]
    }

    #[test]
    fn digamma_matches_known_values() {
        // digamma(1) = -gamma, digamma(0.5) = -gamma - 2 ln 2
        assert_relative_eq!(digamma(1.0), -0.5772156649015329, epsilon = 1e-10);
        assert_relative_eq!(digamma(0.5), -1.9635100260214235, epsilon = 1e-10);
        // Recurrence: digamma(x + 1) = digamma(x) + 1/x
        assert_relative_eq!(digamma(3.25), digamma(2.25) + 1.0 / 2.25, epsilon = 1e-10);
    }

    #[test]
    fn fits_count_data() {
        let config = FitConfig {
            clusters: 3,
            max_iter: 2,
            sample_fraction: Some(0.5),
        };
        let summary = fit(&count_docs(), &config, 17).unwrap();
        assert_eq!(summary.clusters, 3);
        assert_eq!(summary.iterations, 2);
        assert!(summary.objective.is_finite());
        // Better than a uniform model over the vocabulary.
        assert!(summary.objective > (0.25f64).ln() - 1.0);
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let config = FitConfig {
            clusters: 3,
            max_iter: 2,
            sample_fraction: Some(0.5),
        };
        let a = fit(&count_docs(), &config, 23).unwrap();
        let b = fit(&count_docs(), &config, 23).unwrap();
        // Per-document work folds in parallel, so only the summation order
        // may differ between runs.
        assert_relative_eq!(a.objective, b.objective, epsilon = 1e-9);
    }

    #[test]
    fn all_zero_counts_still_fit() {
        let parts = vec![Array2::zeros((5, 3))];
        let config = FitConfig {
            clusters: 3,
            max_iter: 2,
            sample_fraction: Some(0.5),
        };
        let summary = fit(&parts, &config, 1).unwrap();
        assert_eq!(summary.objective, f64::NEG_INFINITY);
    }

    #[test]
    fn empty_input_is_an_error() {
        let parts: Vec<Array2<f64>> = Vec::new();
        let config = Algorithm::Lda.fit_config();
        assert!(matches!(fit(&parts, &config, 1), Err(FitError::NoData)));
    }
}
