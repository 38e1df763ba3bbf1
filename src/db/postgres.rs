//! PostgreSQL backend implementation.
//!
//! Provides the `PostgresClient` struct that implements the `Backend` trait
//! for PostgreSQL databases using sqlx.

use crate::db::cursor::{bytes_value, column_infos};
use crate::db::{
    Backend, DriverError, NormalizedValue, PoolSettings, RawRow, RowCursor, ScanKind, SqlxCursor,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, PgValueFormat};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Connection, Executor, Postgres, Row as SqlxRow, TypeInfo, ValueRef};
use url::Url;

/// PostgreSQL database client over an ephemeral pool.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Creates the pool without connecting; the first ping performs the handshake.
    pub fn open(url: &Url, settings: &PoolSettings) -> Result<Self, DriverError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .max_lifetime(settings.max_lifetime)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy(url.as_str())?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Backend for PostgresClient {
    async fn ping(&self) -> Result<(), DriverError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn execute<'a>(&'a self, sql: &'a str) -> Result<Box<dyn RowCursor + 'a>, DriverError> {
        let stream = sqlx::query(sql).fetch(&self.pool);
        // Only awaited when the statement yields no rows.
        let describe = async move {
            Executor::describe(&self.pool, sql)
                .await
                .map(|d| column_infos(d.columns()))
                .unwrap_or_default()
        };
        let cursor = SqlxCursor::<Postgres>::open(stream, describe).await?;
        Ok(Box::new(cursor))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl RawRow for PgRow {
    fn scan(&self, index: usize, kind: ScanKind) -> Result<NormalizedValue, DriverError> {
        let value: NormalizedValue = match kind {
            ScanKind::Bool => self
                .try_get::<Option<bool>, _>(index)?
                .map(|v| v.to_string())
                .into(),
            ScanKind::Int8 | ScanKind::Int16 => {
                self.try_get::<Option<i16>, _>(index)?.map(i64::from).into()
            }
            ScanKind::Int32 => self.try_get::<Option<i32>, _>(index)?.map(i64::from).into(),
            ScanKind::Int64 => self.try_get::<Option<i64>, _>(index)?.into(),
            // OID is the only unsigned type in the scan table.
            ScanKind::UInt8 | ScanKind::UInt16 | ScanKind::UInt32 | ScanKind::UInt64 => self
                .try_get::<Option<Oid>, _>(index)?
                .map(|oid| u64::from(oid.0))
                .into(),
            ScanKind::Float32 => self.try_get::<Option<f32>, _>(index)?.map(f64::from).into(),
            ScanKind::Float64 => self.try_get::<Option<f64>, _>(index)?.into(),
            ScanKind::Decimal => scan_numeric(self, index)?,
            ScanKind::Money => self
                .try_get::<Option<PgMoney>, _>(index)?
                .map(|m| plain_decimal(&m.to_bigdecimal(2)))
                .into(),
            ScanKind::Text => self.try_get::<Option<String>, _>(index)?.into(),
            ScanKind::Json => self
                .try_get::<Option<serde_json::Value>, _>(index)?
                .map(|j| j.to_string())
                .into(),
            ScanKind::Bytes => bytes_value(self.try_get::<Option<Vec<u8>>, _>(index)?),
            ScanKind::Date => self
                .try_get::<Option<NaiveDate>, _>(index)?
                .map(|d| d.and_time(NaiveTime::MIN))
                .into(),
            ScanKind::Time => self
                .try_get::<Option<NaiveTime>, _>(index)?
                .map(|t| t.to_string())
                .into(),
            ScanKind::TimeTz => self
                .try_get::<Option<PgTimeTz<NaiveTime, FixedOffset>>, _>(index)?
                .map(|t| time_tz_text(&t))
                .into(),
            ScanKind::Timestamp => self.try_get::<Option<NaiveDateTime>, _>(index)?.into(),
            ScanKind::TimestampTz => self
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map(|dt| dt.naive_utc())
                .into(),
            ScanKind::Interval => self
                .try_get::<Option<PgInterval>, _>(index)?
                .map(|i| interval_text(&i))
                .into(),
            ScanKind::Uuid => self
                .try_get::<Option<Uuid>, _>(index)?
                .map(|u| u.to_string())
                .into(),
            ScanKind::Network => {
                let cidr = self.column(index).type_info().name() == "CIDR";
                self.try_get::<Option<IpNetwork>, _>(index)?
                    .map(|net| network_text(net, cidr))
                    .into()
            }
            ScanKind::Array => {
                let declared = self.column(index).type_info().name().to_string();
                scan_array(self, index, declared.trim_end_matches("[]"))?
            }
            // Enums, XML and other text-like types arrive as their text form.
            ScanKind::Unknown => {
                bytes_value(self.try_get_unchecked::<Option<Vec<u8>>, _>(index)?)
            }
        };
        Ok(value)
    }
}

const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POS_INF: u16 = 0xD000;
const NUMERIC_NEG_INF: u16 = 0xF000;

/// Scans a NUMERIC exactly, keeping the column scale and the special values.
fn scan_numeric(row: &PgRow, index: usize) -> Result<NormalizedValue, DriverError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(NormalizedValue::Null);
    }
    if matches!(raw.format(), PgValueFormat::Text) {
        let text = raw.as_str().map_err(sqlx::Error::Decode)?;
        return Ok(text.into());
    }

    // Binary header: ndigits, weight, sign, dscale; each a big-endian u16.
    let header = raw.as_bytes().map_err(sqlx::Error::Decode)?;
    let word = |at: usize| {
        header
            .get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .unwrap_or(0)
    };
    match word(4) {
        NUMERIC_NAN => return Ok("NaN".into()),
        NUMERIC_POS_INF => return Ok("Infinity".into()),
        NUMERIC_NEG_INF => return Ok("-Infinity".into()),
        _ => {}
    }
    let scale = i64::from(word(6));

    let value = row.try_get::<BigDecimal, _>(index)?.with_scale(scale);
    Ok(plain_decimal(&value).into())
}

/// Renders a decimal in positional notation, never in exponent form.
fn plain_decimal(value: &BigDecimal) -> String {
    let (digits, scale) = value.as_bigint_and_exponent();
    let text = digits.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };

    if scale <= 0 {
        let zeros = "0".repeat(usize::try_from(scale.unsigned_abs()).unwrap_or(0));
        return format!("{sign}{digits}{zeros}");
    }
    let scale = usize::try_from(scale).unwrap_or(0);
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (int, frac) = padded.split_at(padded.len() - scale);
    format!("{sign}{int}.{frac}")
}

/// Formats an interval the way PostgreSQL prints it (`1 year 2 mons 3 days 04:05:06`).
fn interval_text(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{n} {}", if n.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years.into(), "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months.into(), "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days.into(), "day", "days"));
    }
    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

fn time_tz_text(value: &PgTimeTz<NaiveTime, FixedOffset>) -> String {
    let offset = value.offset.local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let offset = offset.unsigned_abs();
    let mut text = format!("{}{sign}{:02}", value.time, offset / 3600);
    if offset % 3600 != 0 {
        text.push_str(&format!(":{:02}", offset / 60 % 60));
    }
    text
}

/// INET host addresses print without their prefix; CIDR always keeps it.
fn network_text(net: IpNetwork, cidr: bool) -> String {
    let host_prefix = if net.is_ipv4() { 32 } else { 128 };
    if !cidr && net.prefix() == host_prefix {
        net.ip().to_string()
    } else {
        net.to_string()
    }
}

fn scan_array(row: &PgRow, index: usize, element: &str) -> Result<NormalizedValue, DriverError> {
    fn texts<T: ToString>(items: Option<Vec<Option<T>>>) -> Option<Vec<Option<String>>> {
        items.map(|items| {
            items
                .into_iter()
                .map(|item| item.map(|v| v.to_string()))
                .collect()
        })
    }

    let items = match element {
        "BOOL" => texts(row.try_get::<Option<Vec<Option<bool>>>, _>(index)?),
        "INT2" => texts(row.try_get::<Option<Vec<Option<i16>>>, _>(index)?),
        "INT4" => texts(row.try_get::<Option<Vec<Option<i32>>>, _>(index)?),
        "INT8" => texts(row.try_get::<Option<Vec<Option<i64>>>, _>(index)?),
        "FLOAT4" => texts(row.try_get::<Option<Vec<Option<f32>>>, _>(index)?),
        "FLOAT8" => texts(row.try_get::<Option<Vec<Option<f64>>>, _>(index)?),
        "UUID" => texts(row.try_get::<Option<Vec<Option<Uuid>>>, _>(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<Vec<Option<String>>>, _>(index)?
        }
        _ => return Ok(bytes_value(row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?)),
    };
    Ok(items.map(|items| array_literal(&items)).into())
}

/// Renders array elements as a PostgreSQL array literal (`{1,NULL,"a b"}`).
fn array_literal(items: &[Option<String>]) -> String {
    let needs_quotes = |s: &str| {
        s.is_empty()
            || s.eq_ignore_ascii_case("NULL")
            || s.chars()
                .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace())
    };
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item {
            None => "NULL".to_string(),
            Some(s) if needs_quotes(s.as_str()) => {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Some(s) => s.clone(),
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}
