//! ClickHouse backend over the HTTP interface.
//!
//! Results are requested as `JSONCompactEachRowWithNamesAndTypes`: two header
//! lines carry column names and types, then every line is one JSON array.
//! The response body ending is reported as [`DriverError::end_of_stream`].

use crate::db::dialect::Credentials;
use crate::db::{Backend, ColumnInfo, DriverError, NormalizedValue, RawRow, RowCursor, ScanKind};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use clickhouse::query::BytesCursor;
use clickhouse::Client;
use serde_json::Value;
use url::Url;

const FORMAT: &str = "JSONCompactEachRowWithNamesAndTypes";

/// Prefix of an exception that ClickHouse writes into an already started body.
const EXCEPTION_PREFIX: &str = "Code: ";

/// ClickHouse database client.
#[derive(Clone)]
pub struct ClickHouseClient {
    client: Client,
}

impl std::fmt::Debug for ClickHouseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseClient").finish_non_exhaustive()
    }
}

impl ClickHouseClient {
    /// Configures a client; no request is made until the first ping.
    pub fn open(endpoint: &Url, credentials: &Credentials, database: &str) -> Self {
        let mut client = Client::default()
            .with_url(endpoint.as_str())
            .with_option("output_format_json_quote_64bit_integers", "1")
            .with_option("output_format_json_quote_decimals", "1")
            .with_option("date_time_output_format", "iso");

        if !credentials.username.is_empty() {
            client = client.with_user(credentials.username.as_str());
        }
        if !credentials.password.is_empty() {
            client = client.with_password(credentials.password.as_str());
        }
        if !database.is_empty() {
            client = client.with_database(database);
        }

        Self { client }
    }
}

/// Prepares raw SQL for the client's bind syntax and the appended FORMAT clause.
fn prepare_statement(sql: &str) -> String {
    sql.trim()
        .trim_end_matches(';')
        .trim_end()
        .replace('?', "??")
}

#[async_trait]
impl Backend for ClickHouseClient {
    async fn ping(&self) -> Result<(), DriverError> {
        self.client.query("SELECT 1").execute().await?;
        Ok(())
    }

    async fn execute<'a>(&'a self, sql: &'a str) -> Result<Box<dyn RowCursor + 'a>, DriverError> {
        let bytes = self
            .client
            .query(&prepare_statement(sql))
            .fetch_bytes(FORMAT)?;
        let cursor = ClickHouseCursor::open(bytes).await?;
        Ok(Box::new(cursor))
    }

    async fn close(&self) {}
}

/// Line-oriented cursor over a ClickHouse response body.
pub struct ClickHouseCursor {
    bytes: BytesCursor,
    buffer: Vec<u8>,
    exhausted: bool,
    columns: Vec<ColumnInfo>,
}

impl ClickHouseCursor {
    async fn open(bytes: BytesCursor) -> Result<Self, DriverError> {
        let mut cursor = Self {
            bytes,
            buffer: Vec::new(),
            exhausted: false,
            columns: Vec::new(),
        };

        let names = parse_header(&cursor.read_line().await?)?;
        let types = parse_header(&cursor.read_line().await?)?;
        if names.len() != types.len() {
            return Err(DriverError::backend(format!(
                "malformed ClickHouse header: {} names, {} types",
                names.len(),
                types.len()
            )));
        }

        cursor.columns = names
            .into_iter()
            .zip(types)
            .map(|(name, declared_type)| ColumnInfo::new(name, declared_type))
            .collect();
        Ok(cursor)
    }

    /// Reads the next non-empty line, or signals the end of the body.
    async fn read_line(&mut self) -> Result<Vec<u8>, DriverError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if line.is_empty() {
                    continue;
                }
                return Ok(line);
            }

            if self.exhausted {
                if self.buffer.is_empty() {
                    return Err(DriverError::end_of_stream());
                }
                return Ok(std::mem::take(&mut self.buffer));
            }

            match self.bytes.next().await? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => self.exhausted = true,
            }
        }
    }
}

fn parse_header(line: &[u8]) -> Result<Vec<String>, DriverError> {
    check_exception(line)?;
    serde_json::from_slice(line)
        .map_err(|e| DriverError::backend(format!("malformed ClickHouse header: {e}")))
}

fn check_exception(line: &[u8]) -> Result<(), DriverError> {
    if line.starts_with(EXCEPTION_PREFIX.as_bytes()) {
        return Err(DriverError::backend(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }
    Ok(())
}

#[async_trait]
impl RowCursor for ClickHouseCursor {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Box<dyn RawRow>>, DriverError> {
        let line = self.read_line().await?;
        check_exception(&line)?;
        let values: Vec<Value> = serde_json::from_slice(&line)
            .map_err(|e| DriverError::backend(format!("malformed ClickHouse row: {e}")))?;
        Ok(Some(Box::new(ClickHouseRow(values))))
    }
}

/// One decoded row of a ClickHouse response.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickHouseRow(pub Vec<Value>);

impl ClickHouseRow {
    fn value(&self, index: usize) -> Result<&Value, DriverError> {
        self.0
            .get(index)
            .ok_or_else(|| DriverError::backend(format!("column index {index} out of range")))
    }
}

fn mismatch(value: &Value, target: &str) -> DriverError {
    DriverError::backend(format!("cannot scan {value} into {target}"))
}

fn scan_u64(value: &Value) -> Result<u64, DriverError> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| mismatch(value, "unsigned integer"))
}

fn scan_i64(value: &Value) -> Result<i64, DriverError> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| mismatch(value, "integer"))
}

fn scan_f64(value: &Value) -> Result<f64, DriverError> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| mismatch(value, "float"))
}

fn scan_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scan_timestamp(value: &Value) -> Result<NaiveDateTime, DriverError> {
    let Value::String(s) = value else {
        return Err(mismatch(value, "timestamp"));
    };
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| mismatch(value, "timestamp"))
}

fn scan_date(value: &Value) -> Result<NaiveDateTime, DriverError> {
    let Value::String(s) = value else {
        return Err(mismatch(value, "date"));
    };
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| mismatch(value, "date"))
}

impl RawRow for ClickHouseRow {
    fn scan(&self, index: usize, kind: ScanKind) -> Result<NormalizedValue, DriverError> {
        let value = self.value(index)?;
        if value.is_null() {
            return Ok(NormalizedValue::Null);
        }

        let normalized = match kind {
            ScanKind::UInt8 | ScanKind::UInt16 | ScanKind::UInt32 | ScanKind::UInt64 => {
                NormalizedValue::UInt(scan_u64(value)?)
            }
            ScanKind::Int8 | ScanKind::Int16 | ScanKind::Int32 | ScanKind::Int64 => {
                NormalizedValue::Int(scan_i64(value)?)
            }
            ScanKind::Float32 | ScanKind::Float64 => NormalizedValue::Float(scan_f64(value)?),
            ScanKind::Date => NormalizedValue::Timestamp(scan_date(value)?),
            ScanKind::Timestamp | ScanKind::TimestampTz => {
                NormalizedValue::Timestamp(scan_timestamp(value)?)
            }
            ScanKind::Decimal
            | ScanKind::Bool
            | ScanKind::Text
            | ScanKind::Json
            | ScanKind::Bytes
            | ScanKind::Time
            | ScanKind::TimeTz
            | ScanKind::Interval
            | ScanKind::Uuid
            | ScanKind::Network
            | ScanKind::Money
            | ScanKind::Array
            | ScanKind::Unknown => NormalizedValue::Text(scan_text(value)),
        };
        Ok(normalized)
    }
}
