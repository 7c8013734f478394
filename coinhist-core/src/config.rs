//! Source configuration — ticker rules and field mappings per API.
//!
//! The configuration is a TOML document keyed by source name. It is loaded
//! once by the caller and passed by reference into every adapter, so tests can
//! fabricate configs without touching the file system.
//!
//! ```toml
//! [coindesk]
//! tickers = { allowed = ["USD", "ETH"], default = "USD" }
//!
//! [[coindesk.fields]]
//! raw = "timestamp"
//! clean = "epoch_to_timestamp"
//! column = "snap_time"
//! ```
//!
//! Field order in the `fields` array is the output column order.

use crate::domain::{SOURCE_COLUMN, TICKER_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("source '{0}' has not been added to the config")]
    MissingSource(String),

    #[error("invalid config for source '{source_name}': {reason}")]
    Invalid { source_name: String, reason: String },
}

/// Identifier of a field-cleaning function.
///
/// Unknown identifiers fail deserialization, so a bad config is rejected at
/// load time rather than at first use. The legacy `check_*` names are
/// accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanFn {
    #[serde(alias = "check_int")]
    ToInteger,
    #[serde(alias = "check_float")]
    ToFloat,
    #[serde(alias = "check_varchar")]
    BoundedString,
    #[serde(alias = "check_text")]
    Text,
    #[serde(alias = "do_none")]
    Identity,
    #[serde(alias = "check_epoch")]
    EpochToTimestamp,
}

/// How one raw API field becomes one output column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as emitted by the adapter's parser.
    pub raw: String,
    /// Cleaning function applied to present values.
    pub clean: CleanFn,
    /// Output column name.
    pub column: String,
    /// Maximum length for `bounded_string`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl FieldSpec {
    pub fn new(raw: &str, clean: CleanFn, column: &str) -> Self {
        Self {
            raw: raw.to_string(),
            clean,
            column: column.to_string(),
            length: None,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }
}

/// Which tickers a source accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TickerRules {
    /// A flat allow-list with a fallback for unknown tickers.
    Single { allowed: Vec<String>, default: String },
    /// Base ticker to the quote tickers it trades against (`BTC_ETH`).
    Pairs { pairs: BTreeMap<String, Vec<String>> },
}

/// Which raw values count as "no value" before cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    /// Only a missing key or JSON `null`.
    #[default]
    Missing,
    /// Also `false`, `0`, `""`, `[]` and `{}`.
    Falsy,
}

/// Per-source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub absence: AbsencePolicy,
    pub tickers: TickerRules,
    pub fields: Vec<FieldSpec>,
}

impl SourceConfig {
    /// Output column names in declared order.
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.clone()).collect()
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self, source_name: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            source_name: source_name.to_string(),
            reason,
        };

        if self.fields.is_empty() {
            return Err(invalid("no fields configured".into()));
        }

        let mut raws = HashSet::new();
        let mut columns = HashSet::new();
        for field in &self.fields {
            if !raws.insert(field.raw.as_str()) {
                return Err(invalid(format!("raw field '{}' declared twice", field.raw)));
            }
            if !columns.insert(field.column.as_str()) {
                return Err(invalid(format!("column '{}' declared twice", field.column)));
            }
            if field.column == TICKER_COLUMN || field.column == SOURCE_COLUMN {
                return Err(invalid(format!(
                    "column '{}' is reserved for the identifying columns",
                    field.column
                )));
            }
            if field.clean == CleanFn::BoundedString && field.length.unwrap_or(0) == 0 {
                return Err(invalid(format!(
                    "field '{}' uses bounded_string and needs a length > 0",
                    field.raw
                )));
            }
        }

        match &self.tickers {
            TickerRules::Single { allowed, default } => {
                if allowed.is_empty() {
                    return Err(invalid("ticker allow-list is empty".into()));
                }
                if !allowed.contains(default) {
                    return Err(invalid(format!(
                        "default ticker '{default}' is not in the allow-list"
                    )));
                }
            }
            TickerRules::Pairs { pairs } => {
                if pairs.is_empty() || pairs.values().all(|quotes| quotes.is_empty()) {
                    return Err(invalid("ticker pair map is empty".into()));
                }
            }
        }

        Ok(())
    }
}

/// The complete configuration, keyed by source name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppConfig {
    pub sources: BTreeMap<String, SourceConfig>,
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The configuration shipped with the repository (`config/sources.toml`).
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml(include_str!("../../config/sources.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, source) in &self.sources {
            source.validate(name)?;
        }
        Ok(())
    }

    /// Look up a source, failing if it was never configured.
    pub fn source(&self, name: &str) -> Result<&SourceConfig, ConfigError> {
        self.sources
            .get(name)
            .ok_or_else(|| ConfigError::MissingSource(name.to_string()))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.keys().map(|s| s.as_str()).collect()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
