//! Feature selection for benchmark input.
//!
//! The model input is a bounded, deterministic subset of the dataset's
//! numeric columns, picked in schema order.

use super::{Dataset, DatasetError};

/// Maximum number of columns fed to the model.
pub const MAX_FEATURES: usize = 4;

/// An ordered set of feature column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    names: Vec<String>,
}

impl FeatureSet {
    /// Feature names in selection order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of selected features.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no features were selected.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate over feature names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Returns true for column names that never qualify as features.
///
/// `id`/`_id` are identifiers, and anything containing `noise` is reserved
/// for the engine's own injected randomness column.
fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "id" || lower == "_id" || lower.contains("noise")
}

/// Select the feature columns for a dataset.
///
/// Keeps numeric columns only, skips reserved names, preserves schema order,
/// and truncates to the first [`MAX_FEATURES`] qualifying columns. The result
/// is fully determined by the input schema.
pub fn select_features(dataset: &Dataset) -> Result<FeatureSet, DatasetError> {
    let names: Vec<String> = dataset
        .columns()
        .iter()
        .filter(|col| col.is_numeric() && !is_reserved(col.name()))
        .take(MAX_FEATURES)
        .map(|col| col.name().to_string())
        .collect();

    if names.is_empty() {
        return Err(DatasetError::NoFeaturesDetected);
    }

    Ok(FeatureSet { names })
}
