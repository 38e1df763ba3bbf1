//! Result types for sqlgate.
//!
//! Defines the backend-agnostic structures a drained cursor is normalized
//! into before it crosses over to the renderer.

use base64::Engine;
use chrono::{NaiveDateTime, SecondsFormat};
use serde::ser::{SerializeMap, SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use std::fmt;

/// Metadata about a column of an open cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Type name as declared by the backend (e.g. `INT8`, `BIGINT UNSIGNED`, `UInt64`).
    pub declared_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and declared type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// A single normalized value.
///
/// This is the only value representation that leaves the gateway.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NormalizedValue {
    /// SQL NULL.
    #[default]
    Null,

    /// Text value.
    Text(String),

    /// Signed integer (up to i64).
    Int(i64),

    /// Unsigned integer (up to u64).
    UInt(u64),

    /// Floating point number.
    Float(f64),

    /// Date/time value, normalized to UTC.
    Timestamp(NaiveDateTime),

    /// Bytes that are not valid UTF-8.
    Opaque(Vec<u8>),
}

impl NormalizedValue {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, NormalizedValue::Null)
    }

    /// Decodes a byte sequence to text, keeping it opaque when it is not UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => NormalizedValue::Text(s),
            Err(e) => NormalizedValue::Opaque(e.into_bytes()),
        }
    }

    /// Returns a display string for the value.
    pub fn to_display_string(&self) -> String {
        match self {
            NormalizedValue::Null => "NULL".to_string(),
            NormalizedValue::Text(s) => s.clone(),
            NormalizedValue::Int(i) => i.to_string(),
            NormalizedValue::UInt(u) => u.to_string(),
            NormalizedValue::Float(f) => f.to_string(),
            NormalizedValue::Timestamp(ts) => format_timestamp(ts),
            NormalizedValue::Opaque(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            NormalizedValue::Null => serializer.serialize_none(),
            NormalizedValue::Text(s) => serializer.serialize_str(s),
            NormalizedValue::Int(i) => serializer.serialize_i64(*i),
            NormalizedValue::UInt(u) => serializer.serialize_u64(*u),
            // JSON has no representation for NaN or infinities.
            NormalizedValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            NormalizedValue::Float(f) => serializer.serialize_str(&f.to_string()),
            NormalizedValue::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
            NormalizedValue::Opaque(b) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl From<i64> for NormalizedValue {
    fn from(v: i64) -> Self {
        NormalizedValue::Int(v)
    }
}

impl From<u64> for NormalizedValue {
    fn from(v: u64) -> Self {
        NormalizedValue::UInt(v)
    }
}

impl From<f64> for NormalizedValue {
    fn from(v: f64) -> Self {
        NormalizedValue::Float(v)
    }
}

impl From<String> for NormalizedValue {
    fn from(v: String) -> Self {
        NormalizedValue::Text(v)
    }
}

impl From<&str> for NormalizedValue {
    fn from(v: &str) -> Self {
        NormalizedValue::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for NormalizedValue {
    fn from(v: NaiveDateTime) -> Self {
        NormalizedValue::Timestamp(v)
    }
}

impl<T> From<Option<T>> for NormalizedValue
where
    T: Into<NormalizedValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => NormalizedValue::Null,
        }
    }
}

/// A row of values, positionally aligned with [`ResultSet::columns`].
pub type Row = Vec<NormalizedValue>;

/// A fully materialized query result.
///
/// Rows are stored positionally and exposed as column-name mappings in
/// column order, so every row mapping has the same key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in cursor order.
    pub columns: Vec<String>,

    /// Rows of data.
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Creates a result set with the given columns and rows.
    pub fn with_data(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns row `index` as `(column, value)` pairs in column order.
    pub fn row_entries(
        &self,
        index: usize,
    ) -> Option<impl Iterator<Item = (&str, &NormalizedValue)> + '_> {
        let row = self.rows.get(index)?;
        Some(self.columns.iter().map(String::as_str).zip(row.iter()))
    }

    /// Returns the value of `column` in row `index`.
    pub fn get(&self, index: usize, column: &str) -> Option<&NormalizedValue> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index)?.get(position)
    }
}

/// Serializes one row as a map keyed by column name.
struct RowMap<'a> {
    columns: &'a [String],
    values: &'a [NormalizedValue],
}

impl Serialize for RowMap<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

struct Rows<'a>(&'a ResultSet);

impl Serialize for Rows<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for values in &self.0.rows {
            seq.serialize_element(&RowMap {
                columns: &self.0.columns,
                values,
            })?;
        }
        seq.end()
    }
}

impl Serialize for ResultSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ResultSet", 2)?;
        state.serialize_field("columns", &self.columns)?;
        state.serialize_field("rows", &Rows(self))?;
        state.end()
    }
}
