//! Loosely-typed values as they arrive from (and go back to) request handlers.
//!
//! A parsed query string only ever holds strings and arrays of strings, but
//! handlers routinely pass values that are already typed, or whole decoded
//! JSON bodies. [`QueryValue`] covers all of these so that the coercers in
//! [`crate::query`] stay total over their input.

use std::fmt;

// used for the date variant
use chrono::{DateTime, SecondsFormat, Utc};
// mappings must keep their insertion order through every copy
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

pub type QueryMap = IndexMap<String, QueryValue>;

static UNDEFINED: QueryValue = QueryValue::Undefined;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// No value at all, e.g. the outcome of a failed coercion.
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<QueryValue>),
    Map(QueryMap),
}

impl QueryValue {
    /// Undefined or null.
    pub fn is_nullish(&self) -> bool {
        matches!(self, QueryValue::Undefined | QueryValue::Null)
    }
    pub fn as_map(&self) -> Option<&QueryMap> {
        match self {
            QueryValue::Map(map) => Some(map),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.as_map().and_then(|map| map.get(key))
    }
    /// Collapses a multi-valued field to its first entry. An empty array
    /// collapses to undefined; any other value is returned as is.
    pub fn first(&self) -> &QueryValue {
        match self {
            QueryValue::Array(values) => values.first().unwrap_or(&UNDEFINED),
            other => other,
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0. { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == 0. {
        // also covers negative zero
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        // exponent form with an explicit sign, 1e+21 and 1e-7
        let exp = format!("{:e}", n);
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
            _ => exp,
        }
    } else {
        format!("{}", n)
    }
}

pub(crate) fn format_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The string form every coercer starts from.
impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryValue::Undefined => write!(f, "undefined"),
            QueryValue::Null => write!(f, "null"),
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Number(n) => write!(f, "{}", format_number(*n)),
            QueryValue::String(s) => write!(f, "{}", s),
            QueryValue::Date(d) => write!(f, "{}", format_date(d)),
            QueryValue::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !value.is_nullish() {
                        write!(f, "{}", value)?;
                    }
                }
                Ok(())
            }
            QueryValue::Map(_) => write!(f, "[object Object]"),
        }
    }
}

// ------------- Conversions -------------
impl From<&str> for QueryValue {
    fn from(s: &str) -> Self { QueryValue::String(s.to_string()) }
}
impl From<String> for QueryValue {
    fn from(s: String) -> Self { QueryValue::String(s) }
}
impl From<bool> for QueryValue {
    fn from(b: bool) -> Self { QueryValue::Bool(b) }
}
impl From<f64> for QueryValue {
    fn from(n: f64) -> Self { QueryValue::Number(n) }
}
impl From<i32> for QueryValue {
    fn from(n: i32) -> Self { QueryValue::Number(n.into()) }
}
impl From<DateTime<Utc>> for QueryValue {
    fn from(d: DateTime<Utc>) -> Self { QueryValue::Date(d) }
}
impl From<QueryMap> for QueryValue {
    fn from(map: QueryMap) -> Self { QueryValue::Map(map) }
}
impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::Array(values.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Undefined, Into::into)
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Bool(b),
            Value::Number(n) => QueryValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => QueryValue::String(s),
            Value::Array(values) => QueryValue::Array(values.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                QueryValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

// 2^53 - 1, beyond which integral floats lose precision
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.;

/// Serializes the way a JSON response body would carry the value: undefined
/// map entries are left out, undefined array slots become `null`, dates are
/// RFC 3339 strings.
impl Serialize for QueryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryValue::Undefined | QueryValue::Null => serializer.serialize_unit(),
            QueryValue::Bool(b) => serializer.serialize_bool(*b),
            QueryValue::Number(n) if n.fract() == 0. && n.abs() <= MAX_SAFE_INTEGER => {
                serializer.serialize_i64(*n as i64)
            }
            QueryValue::Number(n) => serializer.serialize_f64(*n),
            QueryValue::String(s) => serializer.serialize_str(s),
            QueryValue::Date(d) => serializer.serialize_str(&format_date(d)),
            QueryValue::Array(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            QueryValue::Map(map) => {
                let defined = map.iter().filter(|(_, v)| **v != QueryValue::Undefined);
                let mut out = serializer.serialize_map(None)?;
                for (key, value) in defined {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}
