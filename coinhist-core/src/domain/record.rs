//! Records flowing through the normalization pipeline.

use super::scalar::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One record as parsed from an API payload: raw field name to untyped value.
pub type RawRecord = BTreeMap<String, Value>;

/// One record after field cleaning: raw field name to typed value.
///
/// The key set is exactly the configured fields of the owning source.
pub type CleanedRecord = BTreeMap<String, Scalar>;

/// The uniform (columns, rows) artifact handed to a load sink.
///
/// Every row has exactly `columns.len()` values, positionally aligned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Panics if the row width differs from the column count,
    /// since a misaligned row would silently corrupt the load.
    pub fn push_row(&mut self, row: Vec<Scalar>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "row width {} does not match {} columns",
            row.len(),
            self.columns.len()
        );
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate the values of one column, top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Scalar> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }
}
