//! Field cleaner — coerces raw API values into typed scalars.
//!
//! Every configured field ends up in the cleaned record. A field that is
//! absent, or whose coercion fails, becomes `Scalar::Null`; one bad field never
//! affects its siblings or aborts the record.

use crate::config::{AbsencePolicy, CleanFn, FieldSpec, SourceConfig};
use crate::domain::{CleanedRecord, RawRecord, Scalar};
use chrono::DateTime;
use serde_json::Value;
use tracing::{debug, info};

/// Output format of `epoch_to_timestamp` (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Apply the cleaning function named by `spec` to a present raw value.
pub fn apply(spec: &FieldSpec, value: &Value) -> Scalar {
    let cleaned = match spec.clean {
        CleanFn::ToInteger => to_integer(value),
        CleanFn::ToFloat => to_float(value),
        CleanFn::BoundedString => bounded_string(value, spec.length.unwrap_or(0)),
        CleanFn::Text => text(value),
        CleanFn::Identity => identity(value),
        CleanFn::EpochToTimestamp => epoch_to_timestamp(value),
    };
    if cleaned.is_null() && !value.is_null() {
        debug!(field = %spec.raw, clean = ?spec.clean, raw = %value, "unable to coerce value");
    }
    cleaned
}

/// Integers pass through, finite floats truncate toward zero, strings are
/// parsed as `i64`. Anything else is no value.
pub fn to_integer(value: &Value) -> Scalar {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Int(i)
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| Scalar::Int(f.trunc() as i64))
                    .unwrap_or(Scalar::Null)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map(Scalar::Int).unwrap_or(Scalar::Null),
        _ => Scalar::Null,
    }
}

/// Numbers pass through as floats, strings are parsed. Non-finite results
/// (`"nan"`, `"inf"`) are no value.
pub fn to_float(value: &Value) -> Scalar {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .map(Scalar::Float)
        .unwrap_or(Scalar::Null)
}

/// Stringify, strip backslashes, then truncate to `length` characters.
pub fn bounded_string(value: &Value, length: usize) -> Scalar {
    let cleaned: String = stringify(value).chars().filter(|c| *c != '\\').take(length).collect();
    Scalar::Text(cleaned)
}

/// Stringify and strip backslashes.
pub fn text(value: &Value) -> Scalar {
    Scalar::Text(stringify(value).replace('\\', ""))
}

/// Pass the value through unchanged.
pub fn identity(value: &Value) -> Scalar {
    Scalar::from_json(value)
}

/// Convert a 10-digit (seconds) or 13-digit (milliseconds) epoch into
/// `YYYY-MM-DD HH:MM` UTC. Other digit counts and negatives are no value.
pub fn epoch_to_timestamp(value: &Value) -> Scalar {
    let Scalar::Int(raw) = to_integer(value) else {
        return Scalar::Null;
    };
    epoch_seconds(raw)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| Scalar::Text(dt.format(TIMESTAMP_FORMAT).to_string()))
        .unwrap_or(Scalar::Null)
}

/// Normalize a 10- or 13-digit epoch to seconds.
pub fn epoch_seconds(raw: i64) -> Option<i64> {
    if raw < 0 {
        return None;
    }
    match digit_count(raw) {
        10 => Some(raw),
        13 => Some(raw / 1000),
        _ => None,
    }
}

fn digit_count(n: i64) -> u32 {
    if n == 0 {
        1
    } else {
        n.unsigned_abs().ilog10() + 1
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whether a raw value counts as "no value" under `policy`.
pub fn is_absent(value: Option<&Value>, policy: AbsencePolicy) -> bool {
    match (value, policy) {
        (None, _) | (Some(Value::Null), _) => true,
        (Some(_), AbsencePolicy::Missing) => false,
        (Some(v), AbsencePolicy::Falsy) => is_falsy(v),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Clean one raw record against a source's field mapping.
///
/// Raw fields without a `FieldSpec` are dropped.
pub fn clean_record(record: &RawRecord, source: &SourceConfig) -> CleanedRecord {
    source
        .fields
        .iter()
        .map(|spec| {
            let raw = record.get(&spec.raw);
            let cleaned = match raw {
                Some(v) if !is_absent(raw, source.absence) => apply(spec, v),
                _ => Scalar::Null,
            };
            (spec.raw.clone(), cleaned)
        })
        .collect()
}

/// Clean every record, preserving order.
pub fn clean_records(records: &[RawRecord], source: &SourceConfig) -> Vec<CleanedRecord> {
    info!(records = records.len(), fields = source.fields.len(), "cleaning records");
    records.iter().map(|r| clean_record(r, source)).collect()
}
