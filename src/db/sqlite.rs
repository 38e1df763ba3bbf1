//! SQLite backend implementation using sqlx.

use crate::db::cursor::{bytes_value, column_infos};
use crate::db::{
    Backend, DriverError, NormalizedValue, PoolSettings, RawRow, RowCursor, ScanKind, SqlxCursor,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Connection, Executor, Row as SqlxRow, Sqlite, TypeInfo, ValueRef};
use std::path::Path;

/// SQLite database client over an ephemeral pool.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Creates the pool for an existing database file.
    ///
    /// Missing files are rejected instead of being created.
    pub fn open(path: &Path, settings: &PoolSettings) -> Result<Self, DriverError> {
        if !path.is_file() {
            return Err(DriverError::configuration(format!(
                "SQLite database file '{}' does not exist",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .max_lifetime(settings.max_lifetime)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy_with(options);
        Ok(Self { pool })
    }
}

#[async_trait]
impl Backend for SqliteClient {
    async fn ping(&self) -> Result<(), DriverError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    async fn execute<'a>(&'a self, sql: &'a str) -> Result<Box<dyn RowCursor + 'a>, DriverError> {
        let stream = sqlx::query(sql).fetch(&self.pool);
        let describe = async move {
            Executor::describe(&self.pool, sql)
                .await
                .map(|d| column_infos(d.columns()))
                .unwrap_or_default()
        };
        let cursor = SqlxCursor::<Sqlite>::open(stream, describe).await?;
        Ok(Box::new(cursor))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl RawRow for SqliteRow {
    fn scan(&self, index: usize, kind: ScanKind) -> Result<NormalizedValue, DriverError> {
        // SQLite stores every integer as i64 and every float as f64.
        let value: NormalizedValue = match kind {
            ScanKind::Bool => self
                .try_get::<Option<bool>, _>(index)?
                .map(|v| v.to_string())
                .into(),
            ScanKind::UInt8
            | ScanKind::UInt16
            | ScanKind::UInt32
            | ScanKind::UInt64
            | ScanKind::Int8
            | ScanKind::Int16
            | ScanKind::Int32
            | ScanKind::Int64 => self.try_get::<Option<i64>, _>(index)?.into(),
            ScanKind::Float32 | ScanKind::Float64 => {
                self.try_get::<Option<f64>, _>(index)?.into()
            }
            ScanKind::Text | ScanKind::Decimal | ScanKind::Json => {
                self.try_get::<Option<String>, _>(index)?.into()
            }
            ScanKind::Bytes => bytes_value(self.try_get::<Option<Vec<u8>>, _>(index)?),
            ScanKind::Date => self
                .try_get::<Option<NaiveDate>, _>(index)?
                .map(|d| d.and_time(NaiveTime::MIN))
                .into(),
            ScanKind::Time => self
                .try_get::<Option<NaiveTime>, _>(index)?
                .map(|t| t.to_string())
                .into(),
            ScanKind::Timestamp | ScanKind::TimestampTz => {
                self.try_get::<Option<NaiveDateTime>, _>(index)?.into()
            }
            ScanKind::TimeTz
            | ScanKind::Interval
            | ScanKind::Uuid
            | ScanKind::Network
            | ScanKind::Money
            | ScanKind::Array
            | ScanKind::Unknown => scan_storage_class(self, index)?,
        };
        Ok(value)
    }
}

/// Scans a value by the storage class it actually holds.
fn scan_storage_class(row: &SqliteRow, index: usize) -> Result<NormalizedValue, DriverError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(NormalizedValue::Null);
    }
    let class = raw.type_info().name().to_string();

    let value = match class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index)?.into(),
        "REAL" => row.try_get_unchecked::<f64, _>(index)?.into(),
        "TEXT" => row.try_get_unchecked::<String, _>(index)?.into(),
        _ => bytes_value(Some(row.try_get_unchecked::<Vec<u8>, _>(index)?)),
    };
    Ok(value)
}
