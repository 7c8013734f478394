//! Poloniex public chart-data API.
//!
//! Takes a `BASE_QUOTE` ticker pair, an epoch-second date range and a candle
//! period. The response is a JSON list of candles; an object with an `error`
//! key signals an API-level failure (unknown pair, bad period).

use super::{api_error, positional_record, validate_ticker_pair, FetchRequest, SourceAdapter, SourceError};
use crate::config::{AppConfig, SourceConfig};
use crate::dates::{self, DateRange};
use crate::domain::RawRecord;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Canonical source name and config key.
pub const NAME: &str = "poloniex";

/// Candle periods the API accepts, in seconds.
pub const ALLOWED_PERIODS: [u32; 6] = [300, 900, 1800, 7200, 14400, 86400];

/// Thirty-minute candles.
pub const DEFAULT_PERIOD: u32 = 1800;

/// Field names for candles delivered as positional arrays.
pub const CANDLE_FIELDS: [&str; 8] = [
    "date",
    "open",
    "close",
    "high",
    "low",
    "volume",
    "quoteVolume",
    "weightedAverage",
];

const BASE_URL: &str = "https://poloniex.com/public?command=returnChartData";

/// A validated request against the Poloniex chart API.
#[derive(Debug, Clone)]
pub struct Poloniex {
    config: SourceConfig,
    ticker: String,
    range: DateRange,
    period: u32,
    url: String,
}

impl Poloniex {
    /// Build against today's local date.
    ///
    /// Fails if the ticker pair is malformed or not in the configured pairs.
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
        validate_ticker_pair(NAME, &request.ticker, &config.tickers)?;
        let ticker = request.ticker.clone();
        let period = resolve_period(request.period);
        let url = chart_url(&ticker, &range, period);
        info!(
            source = NAME,
            %ticker,
            start = range.start_epoch(),
            end = range.end_epoch(),
            period,
            "built request"
        );

        Ok(Self {
            config,
            ticker,
            range,
            period,
            url,
        })
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn period(&self) -> u32 {
        self.period
    }
}

/// Keep a supported period, otherwise fall back to `DEFAULT_PERIOD`.
pub fn resolve_period(period: Option<u32>) -> u32 {
    match period {
        None => DEFAULT_PERIOD,
        Some(p) if ALLOWED_PERIODS.contains(&p) => p,
        Some(p) => {
            warn!(
                period = p,
                allowed = ?ALLOWED_PERIODS,
                "unsupported period, defaulting to {DEFAULT_PERIOD}"
            );
            DEFAULT_PERIOD
        }
    }
}

fn chart_url(ticker: &str, range: &DateRange, period: u32) -> String {
    format!(
        "{BASE_URL}&currencyPair={ticker}&start={}&end={}&period={period}",
        range.start_epoch(),
        range.end_epoch()
    )
}

/// Parse a Poloniex chart payload into raw records.
///
/// Candles may be objects keyed by field name or positional arrays laid out
/// as `CANDLE_FIELDS`.
pub fn parse_payload(body: &str) -> Result<Vec<RawRecord>, SourceError> {
    let payload: Value = serde_json::from_str(body.trim())
        .map_err(|e| SourceError::ResponseFormatChanged(format!("invalid JSON: {e}")))?;

    if let Some(message) = api_error(&payload) {
        return Err(SourceError::Api(message));
    }

    let candles = payload.as_array().ok_or_else(|| {
        SourceError::ResponseFormatChanged("expected a list of candles".into())
    })?;

    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match candle {
            Value::Object(fields) => Ok(fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            Value::Array(values) => Ok(positional_record(&CANDLE_FIELDS, values)),
            other => Err(SourceError::ResponseFormatChanged(format!(
                "candle {i} is neither an object nor a list: {other}"
            ))),
        })
        .collect()
}

impl SourceAdapter for Poloniex {
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
        parse_payload(body)
    }
}
