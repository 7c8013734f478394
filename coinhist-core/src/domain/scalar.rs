//! Scalar — the typed cell value carried by cleaned records and result rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single typed cell.
///
/// `Null` is the explicit "no value" marker: a field that was absent from the
/// raw record, or whose coercion failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Map a raw JSON value onto the equivalent scalar without coercion.
    ///
    /// Arrays and objects have no scalar form; they are rendered as compact
    /// JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => n.as_f64().map(Scalar::Float).unwrap_or(Scalar::Null),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

/// Renders the value as it would appear in a CSV cell. `Null` is empty.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_keeps_integers_integral() {
        assert_eq!(Scalar::from_json(&json!(1504224000)), Scalar::Int(1504224000));
        assert_eq!(Scalar::from_json(&json!(14.12)), Scalar::Float(14.12));
    }

    #[test]
    fn from_json_maps_null_and_text() {
        assert_eq!(Scalar::from_json(&Value::Null), Scalar::Null);
        assert_eq!(Scalar::from_json(&json!("BTC")), Scalar::Text("BTC".into()));
        assert_eq!(Scalar::from_json(&json!(true)), Scalar::Bool(true));
    }

    #[test]
    fn from_json_renders_nested_values_as_text() {
        assert_eq!(Scalar::from_json(&json!([1, 2])), Scalar::Text("[1,2]".into()));
    }

    #[test]
    fn null_displays_as_empty_cell() {
        assert_eq!(Scalar::Null.to_string(), "");
        assert_eq!(Scalar::Float(4200.5).to_string(), "4200.5");
    }

    #[test]
    fn serializes_untagged() {
        let row = vec![Scalar::Text("2017-09-01 00:00".into()), Scalar::Float(4.5), Scalar::Null];
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"["2017-09-01 00:00",4.5,null]"#
        );
    }
}
