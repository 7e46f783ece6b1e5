//! Parallel Lloyd's k-means.
//!
//! Each iteration maps over the partitions in parallel, producing per-cluster
//! running sums and counts, and reduces them into the next centroid set.

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rayon::prelude::*;

use super::{gather_rows, total_rows, Algorithm, FitConfig, FitError, FitSummary};

/// Stop once the largest centroid movement falls below this distance.
const CONVERGENCE_TOL: f64 = 1e-6;

pub(crate) struct KMeansModel {
    pub centroids: Array2<f64>,
    pub inertia: f64,
    pub iterations: usize,
}

pub(super) fn fit(
    partitions: &[Array2<f64>],
    config: &FitConfig,
    seed: u64,
) -> Result<FitSummary, FitError> {
    let model = fit_kmeans(partitions, config.clusters, config.max_iter, seed)?;
    Ok(FitSummary {
        algorithm: Algorithm::KMeans,
        clusters: model.centroids.nrows(),
        iterations: model.iterations,
        objective: model.inertia,
    })
}

/// Lloyd's algorithm with seeded row-sample initialization.
pub(crate) fn fit_kmeans(
    partitions: &[Array2<f64>],
    k: usize,
    max_iter: usize,
    seed: u64,
) -> Result<KMeansModel, FitError> {
    let n = total_rows(partitions);
    if n == 0 {
        return Err(FitError::NoData);
    }
    if n < k {
        return Err(FitError::InsufficientRows { needed: k, got: n });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let init = rand::seq::index::sample(&mut rng, n, k).into_vec();
    let mut centroids = gather_rows(partitions, &init);

    let mut inertia = f64::INFINITY;
    let mut iterations = 0;

    for iter in 0..max_iter {
        let (sums, counts, sse) = assign_and_accumulate(partitions, &centroids);
        iterations = iter + 1;
        inertia = sse;

        // Empty clusters keep their previous centroid.
        let mut max_shift_sq = 0.0f64;
        for c in 0..k {
            if counts[c] == 0.0 {
                continue;
            }
            let mut shift_sq = 0.0;
            for j in 0..centroids.ncols() {
                let updated = sums[(c, j)] / counts[c];
                let delta = updated - centroids[(c, j)];
                shift_sq += delta * delta;
                centroids[(c, j)] = updated;
            }
            max_shift_sq = max_shift_sq.max(shift_sq);
        }

        if max_shift_sq.sqrt() < CONVERGENCE_TOL {
            break;
        }
    }

    Ok(KMeansModel {
        centroids,
        inertia,
        iterations,
    })
}

/// One assignment pass: per-cluster sums, counts, and the total SSE.
fn assign_and_accumulate(
    partitions: &[Array2<f64>],
    centroids: &Array2<f64>,
) -> (Array2<f64>, Array1<f64>, f64) {
    let k = centroids.nrows();
    let d = centroids.ncols();

    partitions
        .par_iter()
        .map(|part| {
            let mut sums = Array2::<f64>::zeros((k, d));
            let mut counts = Array1::<f64>::zeros(k);
            let mut sse = 0.0;

            for row in part.outer_iter() {
                let (best, dist_sq) = nearest_centroid(&row, centroids);
                sse += dist_sq;
                counts[best] += 1.0;
                sums.row_mut(best).zip_mut_with(&row, |s, &v| *s += v);
            }

            (sums, counts, sse)
        })
        .reduce(
            || (Array2::zeros((k, d)), Array1::zeros(k), 0.0),
            |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2),
        )
}

/// Index and squared distance of the closest centroid.
pub(crate) fn nearest_centroid(row: &ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;

    for (i, centroid) in centroids.outer_iter().enumerate() {
        let mut dist = 0.0;
        for (a, b) in row.iter().zip(centroid.iter()) {
            let diff = a - b;
            dist += diff * diff;
        }
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }

    (best, best_dist)
}
