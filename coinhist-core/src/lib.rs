//! coinhist core — historical crypto price ingestion.
//!
//! This crate holds everything between an exchange API and a load sink:
//! - Declarative source configuration (tickers, field mappings, cleaners)
//! - Shared date and ticker validation
//! - Source adapters that build URLs and parse payloads into raw records
//! - Field cleaning into typed scalars
//! - Projection into a uniform (columns, rows) result set
//! - The load-sink boundary, with a CSV implementation

pub mod clean;
pub mod config;
pub mod dates;
pub mod domain;
pub mod project;
pub mod sink;
pub mod sources;

pub use config::{AppConfig, CleanFn, ConfigError, FieldSpec, SourceConfig, TickerRules};
pub use domain::{CleanedRecord, RawRecord, ResultSet, Scalar};
pub use sink::{load_result, CsvSink, LoadOutcome, LoadSink, SinkError};
pub use sources::{FetchRequest, HttpClient, HttpFetch, SourceAdapter, SourceError, SourceKind};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: config, adapters, clients and results are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<AppConfig>();
        require_sync::<AppConfig>();
        require_send::<ResultSet>();
        require_sync::<ResultSet>();
        require_send::<sources::Coindesk>();
        require_sync::<sources::Coindesk>();
        require_send::<sources::Poloniex>();
        require_sync::<sources::Poloniex>();
        require_send::<HttpClient>();
        require_sync::<HttpClient>();
        require_send::<SourceError>();
        require_sync::<SourceError>();
    }

    #[test]
    fn builtin_config_covers_every_source_kind() {
        let config = AppConfig::builtin().unwrap();
        for kind in SourceKind::ALL {
            assert!(config.source(kind.name()).is_ok(), "missing section for {kind}");
        }
    }
}
