//! The loosely-typed value tree shared by the normalizer and records.
//!
//! Feed parse results have no guaranteed shape: a field may hold text,
//! a nested mapping, a list, or a structured timestamp depending on the
//! feed format. `Value` models that untrusted input. The normalizer
//! rewrites every reachable `Map` into a [`Record`] so downstream code
//! only ever sees the uniform form.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::record::Record;

/// A single value in a parsed feed tree.
///
/// `Map` is the raw mapping form handed back by the feed-parse
/// collaborator; `Record` is its normalized counterpart. `Set` carries
/// unordered collections, which normalization deliberately leaves
/// untouched (only list-like sequences are recursed into).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    List(Vec<Value>),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, Value>),
    Record(Record),
}

impl Value {
    /// Shorthand for building a `Text` value.
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// The length concept used by the longest-element selectors.
    ///
    /// Text is measured in characters; collections by element count.
    /// Scalars without a length concept (`Null`, `Bool`, `Int`, `Float`,
    /// `Time`) return `None`.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::Text(text) => Some(text.chars().count()),
            Value::Bytes(bytes) => Some(bytes.len()),
            Value::List(items) => Some(items.len()),
            Value::Set(set) => Some(set.len()),
            Value::Map(map) => Some(map.len()),
            Value::Record(record) => Some(record.len()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Converts to a `serde_json::Value` for printing and interop.
    ///
    /// Timestamps render as RFC 3339 text, bytes lossily as text, sets
    /// as sorted arrays. Records expose their backing mapping only —
    /// derived fields are not materialized.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => (*flag).into(),
            Value::Int(number) => (*number).into(),
            Value::Float(number) => serde_json::Number::from_f64(*number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(text) => text.clone().into(),
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            Value::Time(time) => time.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Set(set) => {
                serde_json::Value::Array(set.iter().map(|item| item.clone().into()).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(key, value)| (key.clone(), value.to_json())).collect(),
            ),
            Value::Record(record) => record.to_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Int(number)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Float(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(time: DateTime<Utc>) -> Self {
        Value::Time(time)
    }
}

/// Re-encodes textual values into the single canonical encoding.
///
/// `Bytes` become `Text` via lossy UTF-8 decoding — unencodable input
/// is substituted with U+FFFD instead of failing. Everything else,
/// including already-canonical text, passes through unchanged, so the
/// helper is idempotent and total.
pub fn escape(value: Value) -> Value {
    match value {
        Value::Bytes(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
        other => other,
    }
}
