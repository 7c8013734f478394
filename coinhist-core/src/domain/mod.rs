//! Domain types for the normalization pipeline

pub mod record;
pub mod scalar;

pub use record::{CleanedRecord, RawRecord, ResultSet};
pub use scalar::Scalar;

/// Column appended to every row carrying the queried ticker.
pub const TICKER_COLUMN: &str = "ticker";

/// Column appended to every row carrying the source's canonical name.
pub const SOURCE_COLUMN: &str = "data_source";
