//! The staged working table shared by every trial in a series.
//!
//! Staging copies the numeric columns of a prepared dataset into a compact
//! table that is shared read-only (via `Arc`) across all trials. The table
//! is never mutated during a series; each trial copies rows out of it into
//! its own session before any timing starts.

use std::sync::Arc;

use super::{Dataset, DatasetError, FeatureSet};

/// Read-only numeric snapshot of a prepared dataset.
#[derive(Debug)]
pub struct WorkingTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl WorkingTable {
    /// Stage the numeric columns of a dataset.
    ///
    /// Fails with [`DatasetError::EmptyOrMissingDataset`] when the dataset
    /// has no rows or no numeric columns; callers must not acquire any
    /// compute resources in that case.
    pub fn stage(dataset: &Dataset) -> Result<Arc<Self>, DatasetError> {
        if dataset.n_rows() == 0 {
            return Err(DatasetError::EmptyOrMissingDataset {
                reason: "no rows to stage".to_string(),
            });
        }

        let mut names = Vec::new();
        let mut columns = Vec::new();
        for col in dataset.columns() {
            if let Some(values) = col.as_numeric() {
                names.push(col.name().to_string());
                columns.push(values.to_vec());
            }
        }

        if columns.is_empty() {
            return Err(DatasetError::EmptyOrMissingDataset {
                reason: "no numeric columns to stage".to_string(),
            });
        }

        Ok(Arc::new(Self {
            names,
            columns,
            n_rows: dataset.n_rows(),
        }))
    }

    /// Number of staged rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Staged column names, in schema order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Values of a staged column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Columns for the given feature set, in feature order.
    ///
    /// The feature set is derived from the same dataset, so every name is
    /// expected to resolve; a stale name reports the table as unusable.
    pub fn gather(&self, features: &FeatureSet) -> Result<Vec<&[f64]>, DatasetError> {
        features
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| DatasetError::EmptyOrMissingDataset {
                        reason: format!("staged table lacks feature column `{name}`"),
                    })
            })
            .collect()
    }

    /// Approximate in-memory size of the staged values.
    pub fn estimated_bytes(&self) -> usize {
        self.columns.len() * self.n_rows * std::mem::size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    #[test]
    fn staging_keeps_numeric_columns() {
        let ds = Dataset::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::text("t", vec!["x".into(), "y".into()]),
            Column::numeric("b", vec![3.0, 4.0]),
        ])
        .unwrap();

        let table = WorkingTable::stage(&ds).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column_names(), ["a", "b"]);
        assert_eq!(table.column("b"), Some(&[3.0, 4.0][..]));
        assert_eq!(table.column("t"), None);
    }

    #[test]
    fn staging_empty_dataset_fails() {
        let ds = Dataset::new(vec![]).unwrap();
        assert!(matches!(
            WorkingTable::stage(&ds),
            Err(DatasetError::EmptyOrMissingDataset { .. })
        ));
    }

    #[test]
    fn staging_text_only_dataset_fails() {
        let ds = Dataset::new(vec![Column::text("t", vec!["x".into()])]).unwrap();
        assert!(matches!(
            WorkingTable::stage(&ds),
            Err(DatasetError::EmptyOrMissingDataset { .. })
        ));
    }
}
