//! Synthetic data helpers for tests and the batch binary's demo mode.

use rand::prelude::*;

use crate::dataset::{Column, Dataset};

/// Dataset of `cols` uniform numeric columns named `value_0..value_{cols-1}`.
///
/// Values are uniform in `[0, 1)`, so every algorithm (including the
/// count-based topic model) can consume them.
pub fn synthetic_dataset(rows: usize, cols: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns = (0..cols)
        .map(|c| {
            let values = (0..rows).map(|_| rng.random::<f64>()).collect();
            Column::numeric(format!("value_{c}"), values)
        })
        .collect();
    Dataset::new(columns).expect("generated columns are row-aligned")
}

/// Dataset whose rows fall near `centers` well-separated points.
///
/// Useful when a test needs clustering structure rather than noise.
pub fn clustered_dataset(rows: usize, cols: usize, centers: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let offsets: Vec<f64> = (0..centers).map(|c| (c * 10) as f64).collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); cols];
    for r in 0..rows {
        let center = offsets[r % centers];
        for col in columns.iter_mut() {
            col.push(center + rng.random::<f64>() * 0.1);
        }
    }

    let columns = columns
        .into_iter()
        .enumerate()
        .map(|(c, values)| Column::numeric(format!("value_{c}"), values))
        .collect();
    Dataset::new(columns).expect("generated columns are row-aligned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::select_features;

    #[test]
    fn synthetic_dataset_is_seed_stable() {
        let a = synthetic_dataset(10, 2, 5);
        let b = synthetic_dataset(10, 2, 5);
        assert_eq!(a, b);
        assert_eq!(a.n_rows(), 10);
        assert_eq!(a.n_columns(), 2);
    }

    #[test]
    fn synthetic_columns_qualify_as_features() {
        let ds = synthetic_dataset(5, 6, 1);
        let features = select_features(&ds).unwrap();
        assert_eq!(features.len(), 4);
    }

    #[test]
    fn clustered_dataset_spreads_centers() {
        let ds = clustered_dataset(20, 2, 2, 3);
        let values = ds.column("value_0").unwrap().as_numeric().unwrap();
        let near = values.iter().filter(|v| **v < 5.0).count();
        assert_eq!(near, 10);
    }
}
