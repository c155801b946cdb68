//! Permissive coercion of query-string values into typed values.
//!
//! Every coercer is total: input that cannot be read as the requested type
//! comes back as [`Coerced::Unset`], never as an error. Multi-valued fields
//! (`?flag=true&flag=false`) collapse to their first value for all scalar
//! coercions, and the strings `""`, `"undefined"` and `"null"` (trimmed,
//! any case) always mean "not provided".

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::map::Entry;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::shape::{FieldType, Shape, ShapeEntry};
use crate::value::{QueryMap, QueryValue};

lazy_static! {
    static ref DIGITS: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref DECIMAL: Regex = Regex::new(r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)(e[+-]?[0-9]+)?$").unwrap();
    static ref RADIX: Regex = Regex::new(r"^0(x[0-9a-f]+|o[0-7]+|b[01]+)$").unwrap();
    static ref YEAR_MONTH: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}$").unwrap();
}

const SENTINELS: [&str; 2] = ["undefined", "null"];

// the range of a host Date, +/- 100,000,000 days around the epoch
const MAX_EPOCH_MILLIS: i64 = 8_640_000_000_000_000;

// minute-precision forms with a zone; RFC 3339 needs seconds
const ZONED_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

// local wall-clock forms, tried after the zone-aware ones
const LOCAL_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Outcome of a coercion. `Unset` stands for "no usable value" and is kept
/// apart from successfully read falsy values such as `false` or `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerced<T> {
    Value(T),
    Unset,
}

impl<T> Coerced<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Coerced::Value(_))
    }
    pub fn is_unset(&self) -> bool {
        !self.is_set()
    }
    pub fn value(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Unset => None,
        }
    }
    pub fn as_ref(&self) -> Coerced<&T> {
        match self {
            Coerced::Value(v) => Coerced::Value(v),
            Coerced::Unset => Coerced::Unset,
        }
    }
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Coerced<U> {
        match self {
            Coerced::Value(v) => Coerced::Value(f(v)),
            Coerced::Unset => Coerced::Unset,
        }
    }
    pub fn unwrap_or(self, default: T) -> T {
        self.value().unwrap_or(default)
    }
}

impl<T> From<Option<T>> for Coerced<T> {
    fn from(option: Option<T>) -> Self {
        option.map_or(Coerced::Unset, Coerced::Value)
    }
}

/// Unset becomes [`QueryValue::Undefined`].
impl<T: Into<QueryValue>> From<Coerced<T>> for QueryValue {
    fn from(coerced: Coerced<T>) -> Self {
        match coerced {
            Coerced::Value(v) => v.into(),
            Coerced::Unset => QueryValue::Undefined,
        }
    }
}

// first value, trimmed; None for the sentinel tokens
fn normalize(val: &QueryValue) -> Option<String> {
    let text = val.first().to_string();
    let trimmed = text.trim();
    if trimmed.is_empty() || SENTINELS.iter().any(|s| trimmed.eq_ignore_ascii_case(s)) {
        return None;
    }
    Some(trimmed.to_string())
}

/// `"true"` and `"1"` (any case) are true, every other provided value is false.
pub fn query_to_boolean(val: &QueryValue) -> Coerced<bool> {
    if let QueryValue::Bool(b) = val {
        return Coerced::Value(*b);
    }
    match normalize(val) {
        Some(text) => {
            let text = text.to_lowercase();
            Coerced::Value(text == "true" || text == "1")
        }
        None => Coerced::Unset,
    }
}

fn parse_radix(text: &str) -> f64 {
    let radix = match &text[..2] {
        "0x" => 16,
        "0o" => 8,
        _ => 2,
    };
    text[2..]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0., |acc, d| acc * f64::from(radix) + f64::from(d))
}

/// Reads decimal notation with optional exponent, or a `0x`/`0o`/`0b` integer.
pub fn query_to_number(val: &QueryValue) -> Coerced<f64> {
    if let QueryValue::Number(n) = val {
        return if n.is_nan() { Coerced::Unset } else { Coerced::Value(*n) };
    }
    let Some(text) = normalize(val) else {
        return Coerced::Unset;
    };
    let text = text.to_lowercase();
    if RADIX.is_match(&text) {
        return Coerced::Value(parse_radix(&text));
    }
    if DECIMAL.is_match(&text) {
        if let Ok(n) = text.parse::<f64>() {
            return Coerced::Value(n);
        }
    }
    trace!(input = %text, "not a number");
    Coerced::Unset
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis.abs() > MAX_EPOCH_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

fn within_range(d: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (d.timestamp_millis().abs() <= MAX_EPOCH_MILLIS).then_some(d)
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(text) {
        return Some(d.with_timezone(&Utc));
    }
    // a trailing Z is UTC
    let zoned = text.strip_suffix(['Z', 'z']).map(|t| format!("{}+00:00", t));
    let zoned = zoned.as_deref().unwrap_or(text);
    if let Some(d) = ZONED_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(zoned, format).ok())
    {
        return Some(d.with_timezone(&Utc));
    }
    // date-only forms are UTC midnight
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if YEAR_MONTH.is_match(text) {
        let d = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d").ok()?;
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    // date-time forms without an offset are local time
    LOCAL_DATE_TIME_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(text, format).ok()?;
        Local.from_local_datetime(&naive).earliest().map(|d| d.with_timezone(&Utc))
    })
}

/// All-digit input is taken as epoch milliseconds, anything else is parsed
/// as a calendar date or date-time string.
pub fn query_to_date(val: &QueryValue) -> Coerced<DateTime<Utc>> {
    if let QueryValue::Date(d) = val {
        return within_range(*d).into();
    }
    let Some(text) = normalize(val) else {
        return Coerced::Unset;
    };
    let parsed = if DIGITS.is_match(&text) {
        text.parse::<i64>().ok().and_then(from_epoch_millis)
    } else {
        parse_date_text(&text).and_then(within_range)
    };
    if parsed.is_none() {
        trace!(input = %text, "not a date");
    }
    parsed.into()
}

/// Arrays are returned as they are (their elements are not coerced), any
/// other provided value is wrapped into a one-element array.
pub fn query_to_array(val: &QueryValue) -> Coerced<Vec<QueryValue>> {
    match val {
        QueryValue::Undefined | QueryValue::Null => return Coerced::Unset,
        QueryValue::String(s) if s.is_empty() => return Coerced::Unset,
        _ => {}
    }
    let lowered = val.to_string().to_lowercase();
    if SENTINELS.contains(&lowered.as_str()) {
        return Coerced::Unset;
    }
    match val {
        QueryValue::Array(values) => Coerced::Value(values.clone()),
        other => Coerced::Value(vec![other.clone()]),
    }
}

/// The string form of the value, or of its first element for arrays.
pub fn query_to_string(val: &QueryValue) -> Coerced<String> {
    Coerced::Value(val.first().to_string())
}

/// Applies the coercer for `field_type` and returns the result as a value.
pub fn coerce(val: &QueryValue, field_type: FieldType) -> QueryValue {
    match field_type {
        FieldType::Boolean => query_to_boolean(val).into(),
        FieldType::Number => query_to_number(val).into(),
        FieldType::String => query_to_string(val).into(),
        FieldType::Array => query_to_array(val).into(),
        FieldType::Date => query_to_date(val).into(),
    }
}

/// Copies `query` and coerces every field named by `shape`.
///
/// Fields absent from the input, or null/undefined there, are left alone.
/// Nested shapes recurse into nested mappings; applied to anything that is
/// not a mapping (arrays included) they leave the value untouched. Fields not
/// named by `shape` pass through in their original order. Input that is not
/// a mapping at all is returned unchanged.
pub fn parse_query_object(query: &QueryValue, shape: &Shape) -> QueryValue {
    let Some(map) = query.as_map() else {
        return query.clone();
    };
    QueryValue::Map(parse_query_map(map, shape))
}

pub fn parse_query_map(map: &QueryMap, shape: &Shape) -> QueryMap {
    let mut result = map.clone();
    for (key, entry) in shape.iter() {
        let Some(val) = map.get(key) else { continue };
        if val.is_nullish() {
            continue;
        }
        let coerced = match entry {
            ShapeEntry::Nested(nested) => parse_query_object(val, nested),
            ShapeEntry::Field(field_type) => coerce(val, *field_type),
        };
        if coerced == QueryValue::Undefined {
            trace!(field = %key, to = %entry_name(entry), "field left unset");
        }
        // replacing keeps the key at its original position
        result.insert(key.clone(), coerced);
    }
    result
}

fn entry_name(entry: &ShapeEntry) -> &'static str {
    match entry {
        ShapeEntry::Field(field_type) => field_type.name(),
        ShapeEntry::Nested(_) => "object",
    }
}

/// Decodes a raw `application/x-www-form-urlencoded` query string into a
/// mapping of strings. Repeated keys collect into an array in order of
/// appearance. A leading `?` is ignored.
pub fn parse_query_string(qs: &str) -> QueryValue {
    let qs = qs.strip_prefix('?').unwrap_or(qs);
    let mut map = QueryMap::new();
    for (key, value) in url::form_urlencoded::parse(qs.as_bytes()) {
        let value = QueryValue::String(value.into_owned());
        match map.entry(key.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                QueryValue::Array(values) => values.push(value),
                existing => {
                    let first = std::mem::replace(existing, QueryValue::Undefined);
                    *existing = QueryValue::Array(vec![first, value]);
                }
            },
        }
    }
    QueryValue::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> QueryValue {
        QueryValue::from(text)
    }

    #[test]
    fn booleans() {
        assert_eq!(query_to_boolean(&s("true")), Coerced::Value(true));
        assert_eq!(query_to_boolean(&s(" TRUE ")), Coerced::Value(true));
        assert_eq!(query_to_boolean(&s("1")), Coerced::Value(true));
        assert_eq!(query_to_boolean(&s("0")), Coerced::Value(false));
        assert_eq!(query_to_boolean(&s("yes")), Coerced::Value(false));
        assert_eq!(query_to_boolean(&QueryValue::Bool(false)), Coerced::Value(false));
        assert_eq!(query_to_boolean(&QueryValue::from(1)), Coerced::Value(true));
        assert_eq!(query_to_boolean(&s("")), Coerced::Unset);
        assert_eq!(query_to_boolean(&s("Null")), Coerced::Unset);
        assert_eq!(query_to_boolean(&QueryValue::Undefined), Coerced::Unset);
        assert_eq!(query_to_boolean(&QueryValue::from(vec!["false", "true"])), Coerced::Value(false));
        assert_eq!(query_to_boolean(&QueryValue::Array(vec![])), Coerced::Unset);
    }

    #[test]
    fn numbers() {
        assert_eq!(query_to_number(&s("42")), Coerced::Value(42.));
        assert_eq!(query_to_number(&s(" -1.5e3 ")), Coerced::Value(-1500.));
        assert_eq!(query_to_number(&s(".5")), Coerced::Value(0.5));
        assert_eq!(query_to_number(&s("5.")), Coerced::Value(5.));
        assert_eq!(query_to_number(&s("0x1F")), Coerced::Value(31.));
        assert_eq!(query_to_number(&s("0b101")), Coerced::Value(5.));
        assert_eq!(query_to_number(&s("0o17")), Coerced::Value(15.));
        assert_eq!(query_to_number(&QueryValue::from(7)), Coerced::Value(7.));
        assert_eq!(query_to_number(&QueryValue::from(vec!["3", "4"])), Coerced::Value(3.));
        assert_eq!(query_to_number(&s("abc")), Coerced::Unset);
        assert_eq!(query_to_number(&s("12px")), Coerced::Unset);
        assert_eq!(query_to_number(&s("Infinity")), Coerced::Unset);
        assert_eq!(query_to_number(&s("nan")), Coerced::Unset);
        assert_eq!(query_to_number(&s("-0x10")), Coerced::Unset);
        assert_eq!(query_to_number(&s("")), Coerced::Unset);
        assert_eq!(query_to_number(&QueryValue::Bool(true)), Coerced::Unset);
        assert_eq!(query_to_number(&QueryValue::from(f64::NAN)), Coerced::Unset);
    }

    #[test]
    fn only_ascii_digits_count() {
        // Arabic-Indic and fullwidth digits
        assert_eq!(query_to_number(&s("\u{0661}\u{0662}\u{0663}")), Coerced::Unset);
        assert_eq!(query_to_number(&s("1.\u{FF15}")), Coerced::Unset);
        assert_eq!(query_to_date(&s("\u{0661}\u{0662}\u{0663}")), Coerced::Unset);
        assert_eq!(query_to_date(&s("\u{0662}\u{0660}\u{0662}\u{0664}-03")), Coerced::Unset);
        assert_eq!(query_to_number(&s("123")), Coerced::Value(123.));
    }

    #[test]
    fn dates() {
        let millis = query_to_date(&s("1700000000000")).value().unwrap();
        assert_eq!(millis.timestamp_millis(), 1_700_000_000_000);
        let iso = query_to_date(&s("2024-01-15T10:30:00Z")).value().unwrap();
        assert_eq!(iso.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        let offset = query_to_date(&s("2024-01-15T10:30:00+02:00")).value().unwrap();
        assert_eq!(offset.to_rfc3339(), "2024-01-15T08:30:00+00:00");
        let day = query_to_date(&s("2024-01-15")).value().unwrap();
        assert_eq!(day.to_rfc3339(), "2024-01-15T00:00:00+00:00");
        let month = query_to_date(&s("2024-03")).value().unwrap();
        assert_eq!(month.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        let mail = query_to_date(&s("Tue, 1 Jul 2003 10:52:37 +0200")).value().unwrap();
        assert_eq!(mail.to_rfc3339(), "2003-07-01T08:52:37+00:00");
        assert!(query_to_date(&s("2024-01-15T10:30")).is_set());
        let short_utc = query_to_date(&s("2024-01-15T10:30Z")).value().unwrap();
        assert_eq!(short_utc.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        let short_offset = query_to_date(&s("2024-01-15T10:30+02:00")).value().unwrap();
        assert_eq!(short_offset.to_rfc3339(), "2024-01-15T08:30:00+00:00");
        let short_compact = query_to_date(&s("2024-01-15 10:30-0130")).value().unwrap();
        assert_eq!(short_compact.to_rfc3339(), "2024-01-15T12:00:00+00:00");
        assert_eq!(query_to_date(&s("2024-01-15T25:30Z")), Coerced::Unset);
        assert_eq!(query_to_date(&QueryValue::from(1_000)), Coerced::Value(DateTime::from_timestamp_millis(1_000).unwrap()));
        assert_eq!(query_to_date(&s("not-a-date")), Coerced::Unset);
        assert_eq!(query_to_date(&s("2024-02-30")), Coerced::Unset);
        assert_eq!(query_to_date(&s("null")), Coerced::Unset);
        assert_eq!(query_to_date(&s("99999999999999999999")), Coerced::Unset);
        assert_eq!(query_to_date(&s("8640000000000001")), Coerced::Unset);
    }

    #[test]
    fn arrays() {
        assert_eq!(query_to_array(&QueryValue::Undefined), Coerced::Unset);
        assert_eq!(query_to_array(&QueryValue::Null), Coerced::Unset);
        assert_eq!(query_to_array(&s("")), Coerced::Unset);
        assert_eq!(query_to_array(&s("NULL")), Coerced::Unset);
        assert_eq!(query_to_array(&s("x")), Coerced::Value(vec![s("x")]));
        assert_eq!(query_to_array(&QueryValue::from(vec!["x", "y"])), Coerced::Value(vec![s("x"), s("y")]));
        assert_eq!(query_to_array(&QueryValue::from(vec!["null"])), Coerced::Unset);
        assert_eq!(query_to_array(&QueryValue::Array(vec![])), Coerced::Value(vec![]));
        assert_eq!(query_to_array(&s(" null ")), Coerced::Value(vec![s(" null ")]));
    }

    #[test]
    fn strings() {
        assert_eq!(query_to_string(&QueryValue::from(vec!["a", "b"])), Coerced::Value("a".to_string()));
        assert_eq!(query_to_string(&QueryValue::from(3)), Coerced::Value("3".to_string()));
        assert_eq!(query_to_string(&QueryValue::Array(vec![])), Coerced::Value("undefined".to_string()));
    }

    #[test]
    fn coerced_helpers() {
        let set: Coerced<f64> = Some(2.).into();
        assert!(set.is_set());
        assert_eq!(set.map(|n| n * 2.), Coerced::Value(4.));
        assert_eq!(Coerced::<f64>::Unset.unwrap_or(9.), 9.);
        assert_eq!(QueryValue::from(Coerced::<bool>::Unset), QueryValue::Undefined);
    }

    #[test]
    fn query_strings() {
        let parsed = parse_query_string("?page=2&tag=a&tag=b+c&tag=d%26e&empty=");
        assert_eq!(parsed.get("page"), Some(&s("2")));
        assert_eq!(parsed.get("tag"), Some(&QueryValue::from(vec!["a", "b c", "d&e"])));
        assert_eq!(parsed.get("empty"), Some(&s("")));
        assert_eq!(parse_query_string(""), QueryValue::Map(QueryMap::new()));
    }
}
