//! Load sinks — where a `ResultSet` ends up.
//!
//! The pipeline never loads on its own; callers hand the result of
//! `SourceAdapter::run` to `load_result`, which skips the sink entirely when
//! there is no result.

use crate::domain::{ResultSet, Scalar};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("existing header in {path} is {found:?}, refusing to append {expected:?}")]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("invalid table name '{0}'")]
    InvalidTable(String),
}

// ─── Sink trait ──────────────────────────────────────────────────────

/// Persist rows into a named table.
pub trait LoadSink {
    /// Append `rows` to `table`, returning the number of rows written.
    fn load(&mut self, table: &str, columns: &[String], rows: &[Vec<Scalar>]) -> Result<usize, SinkError>;
}

/// What `load_result` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No result was produced; the sink was not invoked.
    Skipped,
    /// The sink accepted this many rows (possibly zero).
    Loaded(usize),
}

/// Load a pipeline result, or do nothing when there is none.
pub fn load_result<S: LoadSink + ?Sized>(
    sink: &mut S,
    table: &str,
    result: Option<&ResultSet>,
) -> Result<LoadOutcome, SinkError> {
    let Some(result) = result else {
        warn!(table, "nothing to load");
        return Ok(LoadOutcome::Skipped);
    };
    let written = sink.load(table, &result.columns, &result.rows)?;
    info!(table, rows = written, "loaded");
    Ok(LoadOutcome::Loaded(written))
}

// ─── CSV sink ────────────────────────────────────────────────────────

/// Appends each table to `<dir>/<table>.csv`.
///
/// A new file gets a header row. An existing file is only appended to when
/// its header matches the incoming columns exactly.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table: &str) -> Result<PathBuf, SinkError> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !table.starts_with('.');
        if !valid {
            return Err(SinkError::InvalidTable(table.to_string()));
        }
        Ok(self.dir.join(format!("{table}.csv")))
    }
}

fn existing_header(path: &Path) -> Result<Option<Vec<String>>, SinkError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut reader = csv::Reader::from_path(path)?;
    Ok(Some(reader.headers()?.iter().map(str::to_string).collect()))
}

impl LoadSink for CsvSink {
    fn load(&mut self, table: &str, columns: &[String], rows: &[Vec<Scalar>]) -> Result<usize, SinkError> {
        let path = self.table_path(table)?;
        fs::create_dir_all(&self.dir)?;

        let header = existing_header(&path)?;
        if let Some(found) = &header {
            if found.as_slice() != columns {
                return Err(SinkError::HeaderMismatch {
                    path,
                    expected: columns.to_vec(),
                    found: found.clone(),
                });
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if header.is_none() {
            wtr.write_record(columns)?;
        }
        for row in rows {
            wtr.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        wtr.flush()?;

        info!(path = %path.display(), rows = rows.len(), "appended rows");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn columns() -> Vec<String> {
        vec!["snap_time".into(), "close".into(), "ticker".into(), "data_source".into()]
    }

    fn row(ts: &str, close: Scalar) -> Vec<Scalar> {
        vec![ts.into(), close, "USD".into(), "coindesk".into()]
    }

    struct Recording {
        calls: usize,
    }

    impl LoadSink for Recording {
        fn load(&mut self, _: &str, _: &[String], rows: &[Vec<Scalar>]) -> Result<usize, SinkError> {
            self.calls += 1;
            Ok(rows.len())
        }
    }

    #[test]
    fn absent_result_skips_sink() {
        let mut sink = Recording { calls: 0 };
        assert_eq!(load_result(&mut sink, "prices", None).unwrap(), LoadOutcome::Skipped);
        assert_eq!(sink.calls, 0);
    }

    #[test]
    fn empty_result_still_loads() {
        let mut sink = Recording { calls: 0 };
        let rs = ResultSet::new(columns());
        assert_eq!(load_result(&mut sink, "prices", Some(&rs)).unwrap(), LoadOutcome::Loaded(0));
        assert_eq!(sink.calls, 1);
    }

    #[test]
    fn csv_sink_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path());

        sink.load("prices", &columns(), &[row("2017-09-01 00:00", Scalar::Float(4735.06))])
            .unwrap();
        sink.load("prices", &columns(), &[row("2017-09-01 00:30", Scalar::Null)])
            .unwrap();

        let text = fs::read_to_string(dir.path().join("prices.csv")).unwrap();
        assert_eq!(
            text,
            "snap_time,close,ticker,data_source\n\
             2017-09-01 00:00,4735.06,USD,coindesk\n\
             2017-09-01 00:30,,USD,coindesk\n"
        );
    }

    #[test]
    fn csv_sink_creates_empty_table_with_header() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path().join("nested"));
        assert_eq!(sink.load("prices", &columns(), &[]).unwrap(), 0);
        let text = fs::read_to_string(dir.path().join("nested/prices.csv")).unwrap();
        assert_eq!(text, "snap_time,close,ticker,data_source\n");
    }

    #[test]
    fn csv_sink_refuses_mismatched_header() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::new(dir.path());
        sink.load("prices", &columns(), &[]).unwrap();

        let other = vec!["snap_time".to_string(), "open".to_string()];
        let err = sink.load("prices", &other, &[]).unwrap_err();
        assert!(matches!(err, SinkError::HeaderMismatch { .. }));
    }

    #[test]
    fn table_names_cannot_escape_dir() {
        let sink = CsvSink::new("/tmp/out");
        assert!(sink.table_path("../etc/passwd").is_err());
        assert!(sink.table_path("").is_err());
        assert!(sink.table_path(".hidden").is_err());
        assert!(sink.table_path("crypto_prices").is_ok());
    }
}
