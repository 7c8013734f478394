//! CoinDesk price-index chart API.
//!
//! Takes a single index ticker (`USD` for bitcoin, `ETH` for ethereum) and a
//! calendar date range. The API wraps its JSON body in a callback envelope,
//! `cb({...});`, which is stripped before parsing:
//!
//! ```text
//! cb({"bpi":[[1504224000000,4735.06],[1504225800000,4741.12]]});
//! ```

use super::{api_error, positional_record, resolve_single_ticker, FetchRequest, SourceAdapter, SourceError};
use crate::config::{AppConfig, SourceConfig};
use crate::dates::{self, DateRange};
use crate::domain::RawRecord;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

/// Canonical source name and config key.
pub const NAME: &str = "coindesk";

/// Field names for each `bpi` entry, by position.
pub const BPI_FIELDS: [&str; 2] = ["timestamp", "price"];

const BASE_URL: &str = "https://api.coindesk.com/charts/data";

/// A validated request against the CoinDesk chart API.
#[derive(Debug, Clone)]
pub struct Coindesk {
    config: SourceConfig,
    ticker: String,
    range: DateRange,
    url: String,
}

impl Coindesk {
    /// Build against today's local date.
    pub fn new(config: &AppConfig, request: &FetchRequest) -> Result<Self, SourceError> {
        Self::new_as_of(config, request, dates::today())
    }

    /// Build with an explicit reference date for defaulting and clamping.
    pub fn new_as_of(
        config: &AppConfig,
        request: &FetchRequest,
        today: NaiveDate,
    ) -> Result<Self, SourceError> {
        let config = config.source(NAME)?.clone();
        let range = DateRange::resolve(request.start.as_deref(), request.end.as_deref(), today);
        let ticker = resolve_single_ticker(NAME, &request.ticker, &config.tickers)?;
        let url = chart_url(&ticker, &range);
        info!(source = NAME, %ticker, start = %range.start, end = %range.end, "built request");

        Ok(Self {
            config,
            ticker,
            range,
            url,
        })
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }
}

/// Build the chart API URL for an index ticker and date range.
fn chart_url(ticker: &str, range: &DateRange) -> String {
    format!(
        "{BASE_URL}?output=json&data=close&index={ticker}\
         &startdate={}&enddate={}&exchanges=bpi&dev=1",
        range.start_str(),
        range.end_str()
    )
}

/// Remove a `name(...)` callback envelope, returning the inner JSON text.
///
/// A trailing `;` is tolerated. A body that already starts with `{` or `[`
/// is returned as is, since the API omits the envelope for some parameters.
pub fn strip_callback_envelope(text: &str) -> Result<&str, SourceError> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    let unexpected = || {
        let preview: String = trimmed.chars().take(40).collect();
        SourceError::ResponseFormatChanged(format!("unrecognized callback envelope: {preview:?}"))
    };

    let open = trimmed.find('(').ok_or_else(unexpected)?;
    let callee = &trimmed[..open];
    let is_identifier = !callee.is_empty()
        && callee
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !is_identifier {
        return Err(unexpected());
    }

    let rest = trimmed[open + 1..].trim_end();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    let body = rest.strip_suffix(')').ok_or_else(unexpected)?.trim();
    if !(body.starts_with('{') || body.starts_with('[')) {
        return Err(unexpected());
    }
    Ok(body)
}

/// Parse an unwrapped CoinDesk payload into raw records.
pub fn parse_payload(json: &str) -> Result<Vec<RawRecord>, SourceError> {
    let payload: Value = serde_json::from_str(json)
        .map_err(|e| SourceError::ResponseFormatChanged(format!("invalid JSON: {e}")))?;

    if let Some(message) = api_error(&payload) {
        return Err(SourceError::Api(message));
    }

    let bpi = payload
        .get("bpi")
        .ok_or_else(|| SourceError::ResponseFormatChanged("missing 'bpi' key".into()))?;

    let entries = bpi
        .as_array()
        .ok_or_else(|| SourceError::ResponseFormatChanged("'bpi' is not a list".into()))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry
                .as_array()
                .map(|values| positional_record(&BPI_FIELDS, values))
                .ok_or_else(|| {
                    SourceError::ResponseFormatChanged(format!("bpi entry {i} is not a list"))
                })
        })
        .collect()
}

impl SourceAdapter for Coindesk {
    fn name(&self) -> &str {
        NAME
    }

    fn ticker(&self) -> &str {
        &self.ticker
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn parse_response(&self, body: &str) -> Result<Vec<RawRecord>, SourceError> {
        debug!(source = NAME, bytes = body.len(), "parsing response");
        parse_payload(strip_callback_envelope(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AbsencePolicy, CleanFn, FieldSpec, TickerRules};
    use serde_json::json;

    fn app_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sources.insert(
            NAME.to_string(),
            SourceConfig {
                absence: AbsencePolicy::Missing,
                tickers: TickerRules::Single {
                    allowed: vec!["USD".into(), "ETH".into()],
                    default: "USD".into(),
                },
                fields: vec![
                    FieldSpec::new("timestamp", CleanFn::EpochToTimestamp, "snap_time"),
                    FieldSpec::new("price", CleanFn::ToFloat, "close"),
                ],
            },
        );
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 9, 10).unwrap()
    }

    #[test]
    fn builds_url_from_validated_inputs() {
        let req = FetchRequest::new("ETH").start("2017-09-01").end("2017-09-02");
        let cd = Coindesk::new_as_of(&app_config(), &req, today()).unwrap();
        assert_eq!(
            cd.url(),
            "https://api.coindesk.com/charts/data?output=json&data=close&index=ETH\
             &startdate=2017-09-01&enddate=2017-09-02&exchanges=bpi&dev=1"
        );
    }

    #[test]
    fn unknown_ticker_falls_back_to_default() {
        let req = FetchRequest::new("GBP");
        let cd = Coindesk::new_as_of(&app_config(), &req, today()).unwrap();
        assert_eq!(cd.ticker(), "USD");
    }

    #[test]
    fn future_start_is_clamped() {
        let req = FetchRequest::new("USD").start("2099-01-01");
        let cd = Coindesk::new_as_of(&app_config(), &req, today()).unwrap();
        assert_eq!(cd.range().start_str(), "2017-09-09");
        assert_eq!(cd.range().end_str(), "2017-09-10");
    }

    #[test]
    fn missing_config_section_is_fatal() {
        let err = Coindesk::new_as_of(&AppConfig::default(), &FetchRequest::new("USD"), today())
            .unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn strips_callback_envelope() {
        assert_eq!(strip_callback_envelope("cb({\"bpi\":[]});").unwrap(), "{\"bpi\":[]}");
        assert_eq!(strip_callback_envelope("  cb({\"bpi\":[]})\n").unwrap(), "{\"bpi\":[]}");
        assert_eq!(
            strip_callback_envelope("jQuery1124_150(  {\"a\":1} ) ;").unwrap(),
            "{\"a\":1}"
        );
    }

    #[test]
    fn bare_json_passes_through() {
        assert_eq!(strip_callback_envelope(" {\"bpi\":[]} ").unwrap(), "{\"bpi\":[]}");
    }

    #[test]
    fn rejects_non_envelopes() {
        assert!(strip_callback_envelope("<html>503</html>").is_err());
        assert!(strip_callback_envelope("cb({\"bpi\":[]}").is_err());
        assert!(strip_callback_envelope("alert(1); cb({})").is_err());
        assert!(strip_callback_envelope("").is_err());
    }

    #[test]
    fn parses_bpi_pairs_by_position() {
        let records = parse_payload(r#"{"bpi":[[1504224000000,4735.06],[1504225800000,4741.12]]}"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["timestamp"], json!(1504224000000_i64));
        assert_eq!(records[1]["price"], json!(4741.12));
    }

    #[test]
    fn empty_bpi_is_not_an_error() {
        assert!(parse_payload(r#"{"bpi":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn error_payload_is_an_api_error() {
        let err = parse_payload(r#"{"error":"index not supported"}"#).unwrap_err();
        assert!(matches!(err, SourceError::Api(ref m) if m == "index not supported"));
    }

    #[test]
    fn malformed_payloads_are_format_errors() {
        assert!(matches!(parse_payload("{"), Err(SourceError::ResponseFormatChanged(_))));
        assert!(matches!(parse_payload(r#"{"data":[]}"#), Err(SourceError::ResponseFormatChanged(_))));
        assert!(matches!(parse_payload(r#"{"bpi":{}}"#), Err(SourceError::ResponseFormatChanged(_))));
        assert!(matches!(parse_payload(r#"{"bpi":[1,2]}"#), Err(SourceError::ResponseFormatChanged(_))));
    }
}
