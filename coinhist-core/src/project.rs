//! Row projector — lays cleaned records out in configured column order.

use crate::config::SourceConfig;
use crate::domain::{CleanedRecord, ResultSet, Scalar, SOURCE_COLUMN, TICKER_COLUMN};

/// Identifying values appended to every projected row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIdentity {
    /// The ticker actually queried (after any defaulting).
    pub ticker: String,
    /// The source's canonical name.
    pub source: String,
}

impl RowIdentity {
    pub fn new(ticker: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            source: source.into(),
        }
    }
}

/// Project cleaned records into a `ResultSet`.
///
/// Columns are the configured output names in declaration order followed by
/// `ticker` and `data_source`. An empty input still yields the full column set.
pub fn project(records: &[CleanedRecord], source: &SourceConfig, identity: &RowIdentity) -> ResultSet {
    let mut columns = source.columns();
    columns.push(TICKER_COLUMN.to_string());
    columns.push(SOURCE_COLUMN.to_string());

    let mut result = ResultSet::new(columns);
    for record in records {
        let mut row: Vec<Scalar> = source
            .fields
            .iter()
            .map(|spec| record.get(&spec.raw).cloned().unwrap_or_default())
            .collect();
        row.push(Scalar::Text(identity.ticker.clone()));
        row.push(Scalar::Text(identity.source.clone()));
        result.push_row(row);
    }
    result
}
