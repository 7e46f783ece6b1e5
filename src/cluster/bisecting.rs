//! Bisecting k-means.
//!
//! Starts from a single cluster and repeatedly splits the largest remaining
//! cluster with a seeded 2-means until the target cluster count is reached.

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use super::kmeans::{fit_kmeans, nearest_centroid};
use super::{gather_rows, total_rows, Algorithm, FitConfig, FitError, FitSummary};

pub(super) fn fit(
    partitions: &[Array2<f64>],
    config: &FitConfig,
    seed: u64,
) -> Result<FitSummary, FitError> {
    let n = total_rows(partitions);
    if n == 0 {
        return Err(FitError::NoData);
    }
    if n < config.clusters {
        return Err(FitError::InsufficientRows {
            needed: config.clusters,
            got: n,
        });
    }

    let all_indices: Vec<usize> = (0..n).collect();
    let all = gather_rows(partitions, &all_indices);

    // Cluster membership as row-index lists into `all`.
    let mut clusters: Vec<Vec<usize>> = vec![all_indices];
    let mut frozen: Vec<Vec<usize>> = Vec::new();
    let mut splits = 0usize;

    while clusters.len() + frozen.len() < config.clusters {
        // Largest splittable cluster; clusters of one row can't be bisected.
        let candidate = clusters
            .iter()
            .enumerate()
            .filter(|(_, members)| members.len() >= 2)
            .max_by_key(|(_, members)| members.len())
            .map(|(i, _)| i);

        let Some(idx) = candidate else {
            break;
        };
        let members = clusters.swap_remove(idx);

        let split_seed = seed.wrapping_add(splits as u64);
        match bisect(&all, &members, config.max_iter, split_seed) {
            Some((left, right)) => {
                clusters.push(left);
                clusters.push(right);
                splits += 1;
            }
            // Degenerate cluster (identical rows): keep whole, stop retrying it.
            None => frozen.push(members),
        }
    }
    clusters.extend(frozen);

    let objective = clusters
        .par_iter()
        .map(|members| within_cluster_sse(&all, members))
        .sum();

    Ok(FitSummary {
        algorithm: Algorithm::BisectingKMeans,
        clusters: clusters.len(),
        iterations: splits,
        objective,
    })
}

/// Split one cluster in two with a seeded 2-means; `None` when the split
/// collapses into a single non-empty side.
fn bisect(
    all: &Array2<f64>,
    members: &[usize],
    max_iter: usize,
    seed: u64,
) -> Option<(Vec<usize>, Vec<usize>)> {
    let sub = select_rows(all, members);
    let chunks = chunk_rows(&sub, rayon::current_num_threads().max(1));
    let model = fit_kmeans(&chunks, 2, max_iter, seed).ok()?;

    let mut left = Vec::new();
    let mut right = Vec::new();
    for (local, &global) in members.iter().enumerate() {
        let (best, _) = nearest_centroid(&sub.row(local), &model.centroids);
        if best == 0 {
            left.push(global);
        } else {
            right.push(global);
        }
    }

    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

fn select_rows(all: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((indices.len(), all.ncols()));
    for (dst, &i) in indices.iter().enumerate() {
        out.row_mut(dst).assign(&all.row(i));
    }
    out
}

/// Split a matrix into up to `parts` row chunks for parallel passes.
fn chunk_rows(matrix: &Array2<f64>, parts: usize) -> Vec<Array2<f64>> {
    let chunk = matrix.nrows().div_ceil(parts).max(1);
    matrix
        .axis_chunks_iter(Axis(0), chunk)
        .map(|c| c.to_owned())
        .collect()
}

fn within_cluster_sse(all: &Array2<f64>, members: &[usize]) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let d = all.ncols();
    let mut mean = vec![0.0f64; d];
    for &i in members {
        for j in 0..d {
            mean[j] += all[(i, j)];
        }
    }
    for m in &mut mean {
        *m /= members.len() as f64;
    }

    let mut sse = 0.0;
    for &i in members {
        for j in 0..d {
            let diff = all[(i, j)] - mean[j];
            sse += diff * diff;
        }
    }
    sse
}
