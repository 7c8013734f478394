//! Source adapters — one per exchange API.
//!
//! Each adapter owns one API's quirks: URL construction, ticker and date
//! validation, and parsing of its payload into raw records. The shared
//! pipeline (fetch → parse → clean → project) lives on the `SourceAdapter`
//! trait so every adapter behaves identically once the payload is parsed.

pub mod coindesk;
pub mod fetch;
pub mod poloniex;

pub use coindesk::Coindesk;
pub use fetch::{HttpClient, HttpFetch};
pub use poloniex::Poloniex;

use crate::clean::clean_records;
use crate::config::{AppConfig, ConfigError, SourceConfig, TickerRules};
use crate::domain::{RawRecord, ResultSet};
use crate::project::{project, RowIdentity};
use chrono::NaiveDate;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info, warn};

// ─── Error type ──────────────────────────────────────────────────────

/// Errors raised while building an adapter or running its pipeline.
///
/// Only `InvalidTicker` and `Config` escape adapter construction; everything
/// else is turned into an absent result by `SourceAdapter::run`.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid ticker '{ticker}': {reason}")]
    InvalidTicker { ticker: String, reason: String },

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("api returned an error: {0}")]
    Api(String),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── Request ─────────────────────────────────────────────────────────

/// Caller-supplied parameters for one adapter invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// A single ticker (`USD`) or a pair (`BTC_ETH`), depending on the source.
    pub ticker: String,
    /// Start date, `YYYY-MM-DD`. Defaults to yesterday.
    pub start: Option<String>,
    /// End date, `YYYY-MM-DD`. Defaults to today.
    pub end: Option<String>,
    /// Sampling interval in seconds, for sources that take one.
    pub period: Option<u32>,
}

impl FetchRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn period(mut self, period: u32) -> Self {
        self.period = Some(period);
        self
    }
}

// ─── Adapter trait ───────────────────────────────────────────────────

/// A configured, validated request against one source.
pub trait SourceAdapter {
    /// Canonical source name, written into the `data_source` column.
    fn name(&self) -> &str;

    /// The ticker actually queried, after validation.
    fn ticker(&self) -> &str;

    /// The fully built request URL.
    fn url(&self) -> &str;

    fn config(&self) -> &SourceConfig;

    /// Turn a response body into raw records.
    ///
    /// A well-formed empty payload is `Ok(vec![])`, not an error.
    fn parse_response(&self, body: &str) -> Result<Vec<RawRecord>, SourceError>;

    /// Fetch, parse, clean and project, reporting why nothing was produced.
    fn try_run(&self, fetcher: &dyn HttpFetch) -> Result<ResultSet, SourceError> {
        let body = fetcher.get(self.url())?;
        let records = self.parse_response(&body)?;
        info!(source = self.name(), ticker = self.ticker(), records = records.len(), "parsed response");

        let cleaned = clean_records(&records, self.config());
        let identity = RowIdentity::new(self.ticker(), self.name());
        Ok(project(&cleaned, self.config(), &identity))
    }

    /// Fetch, parse, clean and project.
    ///
    /// Returns `None` when the fetch fails, the payload is malformed, or the
    /// API reports an error. The cause is logged; callers should skip loading.
    fn run(&self, fetcher: &dyn HttpFetch) -> Option<ResultSet> {
        match self.try_run(fetcher) {
            Ok(result) => Some(result),
            Err(e) => {
                error!(source = self.name(), ticker = self.ticker(), error = %e, "no result produced");
                None
            }
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// The sources this crate knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Coindesk,
    Poloniex,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Coindesk, SourceKind::Poloniex];

    /// Canonical name, also the config table key.
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Coindesk => coindesk::NAME,
            SourceKind::Poloniex => poloniex::NAME,
        }
    }

    /// Build the adapter for this source as of `today`.
    pub fn build(
        self,
        config: &AppConfig,
        request: &FetchRequest,
        today: NaiveDate,
    ) -> Result<Box<dyn SourceAdapter>, SourceError> {
        Ok(match self {
            SourceKind::Coindesk => Box::new(Coindesk::new_as_of(config, request, today)?),
            SourceKind::Poloniex => Box::new(Poloniex::new_as_of(config, request, today)?),
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.name() == lowered)
            .ok_or_else(|| SourceError::UnknownSource(s.to_string()))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Validate a single ticker, substituting the configured default on mismatch.
pub fn resolve_single_ticker(
    source: &str,
    ticker: &str,
    rules: &TickerRules,
) -> Result<String, SourceError> {
    match rules {
        TickerRules::Single { allowed, default } => {
            if allowed.iter().any(|t| t == ticker) {
                Ok(ticker.to_string())
            } else {
                warn!(
                    source,
                    ticker,
                    ?allowed,
                    "ticker not in allowable tickers, defaulting to {default}"
                );
                Ok(default.clone())
            }
        }
        TickerRules::Pairs { .. } => Err(SourceError::Config(ConfigError::Invalid {
            source_name: source.to_string(),
            reason: "expected a single-ticker allow-list, found ticker pairs".into(),
        })),
    }
}

/// Validate a `BASE_QUOTE` ticker pair. Any mismatch is fatal.
pub fn validate_ticker_pair(
    source: &str,
    ticker: &str,
    rules: &TickerRules,
) -> Result<(String, String), SourceError> {
    let TickerRules::Pairs { pairs } = rules else {
        return Err(SourceError::Config(ConfigError::Invalid {
            source_name: source.to_string(),
            reason: "expected ticker pairs, found a single-ticker allow-list".into(),
        }));
    };

    let invalid = |reason: String| SourceError::InvalidTicker {
        ticker: ticker.to_string(),
        reason,
    };

    let (base, quote) = ticker
        .split_once('_')
        .ok_or_else(|| invalid("ticker must be in format BASE_QUOTE".into()))?;

    let quotes = pairs.get(base).ok_or_else(|| {
        invalid(format!(
            "base ticker {base} not in {source} supported base tickers: {:?}",
            pairs.keys().collect::<Vec<_>>()
        ))
    })?;

    if !quotes.iter().any(|q| q == quote) {
        return Err(invalid(format!(
            "quote ticker {quote} not in {source} supported tickers for base {base}: {quotes:?}"
        )));
    }

    Ok((base.to_string(), quote.to_string()))
}

/// Map a positional array onto named fields. Extra values are ignored and
/// missing trailing values leave their fields absent.
pub fn positional_record(names: &[&str], values: &[Value]) -> RawRecord {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// Extract an API-level error message from an object payload, if present.
pub fn api_error(payload: &Value) -> Option<String> {
    let err = payload.as_object()?.get("error")?;
    Some(match err {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn pairs() -> TickerRules {
        let mut map = BTreeMap::new();
        map.insert("BTC".to_string(), vec!["ETH".to_string(), "LTC".to_string()]);
        TickerRules::Pairs { pairs: map }
    }

    fn single() -> TickerRules {
        TickerRules::Single {
            allowed: vec!["USD".into(), "ETH".into()],
            default: "USD".into(),
        }
    }

    #[test]
    fn single_ticker_passes_when_allowed() {
        assert_eq!(resolve_single_ticker("coindesk", "ETH", &single()).unwrap(), "ETH");
    }

    #[test]
    fn single_ticker_defaults_when_unknown() {
        assert_eq!(resolve_single_ticker("coindesk", "GBP", &single()).unwrap(), "USD");
    }

    #[test]
    fn pair_ticker_accepts_known_pair() {
        let (base, quote) = validate_ticker_pair("poloniex", "BTC_ETH", &pairs()).unwrap();
        assert_eq!((base.as_str(), quote.as_str()), ("BTC", "ETH"));
    }

    #[test]
    fn pair_ticker_rejects_unknown_quote() {
        let err = validate_ticker_pair("poloniex", "BTC_XYZ", &pairs()).unwrap_err();
        assert!(matches!(err, SourceError::InvalidTicker { ref ticker, .. } if ticker == "BTC_XYZ"));
    }

    #[test]
    fn pair_ticker_rejects_unknown_base_and_missing_separator() {
        assert!(validate_ticker_pair("poloniex", "XMR_ETH", &pairs()).is_err());
        assert!(validate_ticker_pair("poloniex", "BTCETH", &pairs()).is_err());
    }

    #[test]
    fn rule_shape_mismatch_is_a_config_error() {
        assert!(matches!(
            resolve_single_ticker("coindesk", "USD", &pairs()),
            Err(SourceError::Config(_))
        ));
        assert!(matches!(
            validate_ticker_pair("poloniex", "BTC_ETH", &single()),
            Err(SourceError::Config(_))
        ));
    }

    #[test]
    fn positional_record_zips_names() {
        let rec = positional_record(&["timestamp", "price"], &[json!(1), json!(2.5), json!(9)]);
        assert_eq!(rec.len(), 2);
        assert_eq!(rec["price"], json!(2.5));

        let short = positional_record(&["timestamp", "price"], &[json!(1)]);
        assert!(!short.contains_key("price"));
    }

    #[test]
    fn api_error_reads_error_key() {
        assert_eq!(api_error(&json!({"error": "Invalid currency pair."})).as_deref(), Some("Invalid currency pair."));
        assert_eq!(api_error(&json!({"bpi": []})), None);
        assert_eq!(api_error(&json!([])), None);
    }

    #[test]
    fn source_kind_parses_case_insensitively() {
        assert_eq!("Poloniex".parse::<SourceKind>().unwrap(), SourceKind::Poloniex);
        assert_eq!("coindesk".parse::<SourceKind>().unwrap(), SourceKind::Coindesk);
        assert!(matches!("bittrex".parse::<SourceKind>(), Err(SourceError::UnknownSource(_))));
    }
}
