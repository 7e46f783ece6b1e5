//! Summary statistics for prepared datasets.
//!
//! Computed once per series, after preparation, and carried in progress
//! reports alongside the partial results table.

use serde::{Deserialize, Serialize};

use super::Dataset;

/// Per-column summary statistics over finite values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize every numeric column of a dataset.
///
/// Non-finite values are excluded from the aggregates. The standard
/// deviation is the sample deviation (n - 1 denominator); columns with a
/// single finite value report a deviation of zero.
pub fn summarize(dataset: &Dataset) -> Vec<ColumnStats> {
    dataset
        .columns()
        .iter()
        .filter_map(|col| col.as_numeric().map(|values| (col.name(), values)))
        .map(|(name, values)| column_stats(name, values))
        .collect()
}

fn column_stats(name: &str, values: &[f64]) -> ColumnStats {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();

    if n == 0 {
        return ColumnStats {
            name: name.to_string(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
        };
    }

    let mean = finite.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        finite.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    ColumnStats {
        name: name.to_string(),
        count: n as u64,
        mean,
        std: variance.sqrt(),
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use approx::assert_relative_eq;

    #[test]
    fn stats_cover_numeric_columns_only() {
        let ds = Dataset::new(vec![
            Column::numeric("x", vec![1.0, 2.0, 3.0]),
            Column::text("label", vec!["a".into(), "b".into(), "c".into()]),
        ])
        .unwrap();

        let stats = summarize(&ds);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "x");
        assert_eq!(stats[0].count, 3);
        assert_relative_eq!(stats[0].mean, 2.0);
        assert_relative_eq!(stats[0].std, 1.0);
        assert_relative_eq!(stats[0].min, 1.0);
        assert_relative_eq!(stats[0].max, 3.0);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let ds = Dataset::new(vec![Column::numeric(
            "x",
            vec![1.0, f64::NAN, 3.0, f64::INFINITY],
        )])
        .unwrap();

        let stats = summarize(&ds);
        assert_eq!(stats[0].count, 2);
        assert_relative_eq!(stats[0].mean, 2.0);
        assert_relative_eq!(stats[0].max, 3.0);
    }
}
