//! Tabular dataset abstraction and preparation pipeline.
//!
//! A [`Dataset`] is a row-aligned collection of named columns, either numeric
//! or text. Datasets are transient: they live for the duration of one
//! benchmark series and are re-derived on every upload or refresh.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

mod features;
mod staging;
mod stats;

pub use features::{select_features, FeatureSet, MAX_FEATURES};
pub use staging::WorkingTable;
pub use stats::{summarize, ColumnStats};

/// Dataset preparation errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("inconsistent number of rows: column `{column}` expected {expected}, got {got}")]
    InconsistentRows {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("no qualifying numeric feature columns detected")]
    NoFeaturesDetected,

    #[error("dataset is empty or missing: {reason}")]
    EmptyOrMissingDataset { reason: String },

    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed row at line {line}: {message}")]
    MalformedRow { line: usize, message: String },
}

/// Values of a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// Numeric values (one per row).
    Numeric(Vec<f64>),
    /// Free-form text values (one per row).
    Text(Vec<String>),
}

/// A single named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: ColumnValues,
}

impl Column {
    /// Create a numeric column.
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    /// Create a text column.
    pub fn text(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Text(values),
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows in this column.
    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    /// Returns true if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is a numeric column.
    pub fn is_numeric(&self) -> bool {
        matches!(self.values, ColumnValues::Numeric(_))
    }

    /// Numeric values, if this is a numeric column.
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            ColumnValues::Text(_) => None,
        }
    }
}

/// A row-aligned tabular dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Create a dataset from columns, validating row alignment.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);

        for col in &columns {
            if col.len() != n_rows {
                return Err(DatasetError::InconsistentRows {
                    column: col.name().to_string(),
                    expected: n_rows,
                    got: col.len(),
                });
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// All columns in schema order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }
}

/// Normalize a raw header cell into a usable column name.
///
/// Mirrors what the ingest path always did to messy spreadsheet headers:
/// trim, spaces to underscores, parentheses stripped.
fn sanitize_name(raw: &str) -> String {
    raw.trim()
        .replace(' ', "_")
        .replace(['(', ')'], "")
}

/// Read a CSV file into a [`Dataset`], keeping at most `row_cap` data rows.
///
/// Column types are inferred from the values: a column where every non-empty
/// cell parses as a float becomes numeric, everything else stays text. Rows
/// with any empty cell are dropped rather than carried as missing values.
///
/// A missing file or a file that yields zero usable rows is reported as
/// [`DatasetError::EmptyOrMissingDataset`].
pub fn read_csv(path: &Path, row_cap: usize) -> Result<Dataset, DatasetError> {
    let file = std::fs::File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            DatasetError::EmptyOrMissingDataset {
                reason: format!("source file `{}` not found", path.display()),
            }
        } else {
            DatasetError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let reader = BufReader::new(file);
    let mut lines = reader.lines().enumerate();

    let header = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line.map_err(|source| DatasetError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => {
                return Err(DatasetError::EmptyOrMissingDataset {
                    reason: format!("`{}` has no header row", path.display()),
                })
            }
        }
    };

    let names: Vec<String> = header.split(',').map(sanitize_name).collect();
    let n_cols = names.len();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); n_cols];
    let mut kept = 0usize;

    for (line_no, line) in lines {
        if kept >= row_cap {
            break;
        }
        let line = line.map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != n_cols {
            return Err(DatasetError::MalformedRow {
                line: line_no + 1,
                message: format!("expected {} fields, got {}", n_cols, fields.len()),
            });
        }

        // Drop-rows-with-missing-values policy: an empty cell discards the row.
        if fields.iter().any(|f| f.is_empty()) {
            continue;
        }

        for (col, field) in cells.iter_mut().zip(&fields) {
            col.push((*field).to_string());
        }
        kept += 1;
    }

    if kept == 0 {
        return Err(DatasetError::EmptyOrMissingDataset {
            reason: format!("`{}` yielded no usable rows", path.display()),
        });
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();

    Dataset::new(columns)
}

/// Type inference for one column: numeric if every cell parses as f64.
fn infer_column(name: String, raw: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = raw.iter().map(|v| v.parse::<f64>().ok()).collect();
    match parsed {
        Some(values) => Column {
            name,
            values: ColumnValues::Numeric(values),
        },
        None => Column {
            name,
            values: ColumnValues::Text(raw),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn dataset_rejects_misaligned_columns() {
        let err = Dataset::new(vec![
            Column::numeric("a", vec![1.0, 2.0]),
            Column::numeric("b", vec![1.0]),
        ])
        .unwrap_err();
        assert!(matches!(err, DatasetError::InconsistentRows { .. }));
    }

    #[test]
    fn sanitize_strips_spaces_and_parens() {
        assert_eq!(sanitize_name(" order id "), "order_id");
        assert_eq!(sanitize_name("price (usd)"), "price_usd");
    }

    #[test]
    fn read_csv_infers_types_and_drops_incomplete_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,value a,notes").unwrap();
        writeln!(file, "1,0.5,ok").unwrap();
        writeln!(file, "2,,missing").unwrap();
        writeln!(file, "3,1.5,fine").unwrap();
        file.flush().unwrap();

        let ds = read_csv(file.path(), 100).unwrap();
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.column("value_a").unwrap().as_numeric(), Some(&[0.5, 1.5][..]));
        assert!(!ds.column("notes").unwrap().is_numeric());
    }

    #[test]
    fn read_csv_honours_row_cap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x").unwrap();
        for i in 0..50 {
            writeln!(file, "{i}").unwrap();
        }
        file.flush().unwrap();

        let ds = read_csv(file.path(), 10).unwrap();
        assert_eq!(ds.n_rows(), 10);
    }

    #[test]
    fn read_csv_missing_file_is_empty_or_missing() {
        let err = read_csv(Path::new("/nonexistent/input.csv"), 10).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyOrMissingDataset { .. }));
    }

    #[test]
    fn read_csv_header_only_is_empty_or_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        file.flush().unwrap();

        let err = read_csv(file.path(), 10).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyOrMissingDataset { .. }));
    }
}
