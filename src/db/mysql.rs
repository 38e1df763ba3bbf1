//! MySQL backend implementation using sqlx.

use crate::db::cursor::{bytes_value, column_infos};
use crate::db::{
    Backend, DriverError, NormalizedValue, PoolSettings, RawRow, RowCursor, ScanKind, SqlxCursor,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Connection, Executor, MySql, Row as SqlxRow};
use url::Url;

/// MySQL database client over an ephemeral pool.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Creates the pool without connecting; the first ping performs the handshake.
    pub fn open(url: &Url, settings: &PoolSettings) -> Result<Self, DriverError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .max_lifetime(settings.max_lifetime)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.acquire_timeout)
            .connect_lazy(url.as_str())?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Backend for MySqlClient {
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
        let cursor = SqlxCursor::<MySql>::open(stream, describe).await?;
        Ok(Box::new(cursor))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

impl RawRow for MySqlRow {
    fn scan(&self, index: usize, kind: ScanKind) -> Result<NormalizedValue, DriverError> {
        let value: NormalizedValue = match kind {
            ScanKind::Bool => self
                .try_get::<Option<bool>, _>(index)?
                .map(|v| v.to_string())
                .into(),
            ScanKind::UInt8 => self.try_get::<Option<u8>, _>(index)?.map(u64::from).into(),
            // YEAR shares this width but reports its own column type.
            ScanKind::UInt16 => self
                .try_get_unchecked::<Option<u16>, _>(index)?
                .map(u64::from)
                .into(),
            ScanKind::UInt32 => self.try_get::<Option<u32>, _>(index)?.map(u64::from).into(),
            // BIT(n) decodes as a big-endian unsigned integer.
            ScanKind::UInt64 => self.try_get_unchecked::<Option<u64>, _>(index)?.into(),
            ScanKind::Int8 => self.try_get::<Option<i8>, _>(index)?.map(i64::from).into(),
            ScanKind::Int16 => self.try_get::<Option<i16>, _>(index)?.map(i64::from).into(),
            ScanKind::Int32 => self.try_get::<Option<i32>, _>(index)?.map(i64::from).into(),
            ScanKind::Int64 => self.try_get::<Option<i64>, _>(index)?.into(),
            ScanKind::Float32 => self.try_get::<Option<f32>, _>(index)?.map(f64::from).into(),
            ScanKind::Float64 => self.try_get::<Option<f64>, _>(index)?.into(),
            // DECIMAL travels as its exact text form in both protocols.
            ScanKind::Decimal => self.try_get_unchecked::<Option<String>, _>(index)?.into(),
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
            ScanKind::Timestamp => self.try_get::<Option<NaiveDateTime>, _>(index)?.into(),
            ScanKind::TimestampTz => self
                .try_get::<Option<DateTime<Utc>>, _>(index)?
                .map(|dt| dt.naive_utc())
                .into(),
            ScanKind::TimeTz
            | ScanKind::Interval
            | ScanKind::Uuid
            | ScanKind::Network
            | ScanKind::Money
            | ScanKind::Array
            | ScanKind::Unknown => {
                bytes_value(self.try_get_unchecked::<Option<Vec<u8>>, _>(index)?)
            }
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running MySQL server.
    // They are skipped unless MYSQL_URL is set.

    async fn get_test_client() -> Option<MySqlClient> {
        let url = std::env::var("MYSQL_URL").ok()?;
        let url = Url::parse(&url).ok()?;
        let client = MySqlClient::open(&url, &PoolSettings::default()).ok()?;
        client.ping().await.ok()?;
        Some(client)
    }

    #[tokio::test]
    async fn test_scan_unsigned_bigint_without_truncation() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_URL not set");
            return;
        };

        {
            let mut cursor = client
                .execute("SELECT CAST(18446744073709551615 AS UNSIGNED) AS big")
                .await
                .unwrap();
            assert_eq!(cursor.columns()[0].declared_type, "BIGINT UNSIGNED");

            let row = cursor.next_row().await.unwrap().unwrap();
            assert_eq!(
                row.scan(0, ScanKind::UInt64).unwrap(),
                NormalizedValue::UInt(u64::MAX)
            );
        }

        client.close().await;
    }

    #[tokio::test]
    async fn test_scan_wide_decimal_time_and_year() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_URL not set");
            return;
        };

        {
            let mut cursor = client
                .execute(
                    "SELECT CAST('12345678901234567890123456789012345.123456789012345678901234567890' \
                     AS DECIMAL(65,30)) AS wide, CAST('12:34:56' AS TIME) AS at, \
                     CAST(2024 AS YEAR) AS y",
                )
                .await
                .unwrap();
            let kinds: Vec<ScanKind> = cursor
                .columns()
                .iter()
                .map(|c| crate::db::scan::mysql_kind(&c.declared_type))
                .collect();
            let row = cursor.next_row().await.unwrap().unwrap();

            assert_eq!(
                row.scan(0, kinds[0]).unwrap(),
                NormalizedValue::from(
                    "12345678901234567890123456789012345.123456789012345678901234567890"
                )
            );
            assert_eq!(row.scan(1, kinds[1]).unwrap(), NormalizedValue::from("12:34:56"));
            assert_eq!(row.scan(2, kinds[2]).unwrap(), NormalizedValue::UInt(2024));
        }

        client.close().await;
    }

    #[tokio::test]
    async fn test_scan_type_mismatch_is_reported() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: MYSQL_URL not set");
            return;
        };

        {
            let mut cursor = client.execute("SELECT 'abc' AS word").await.unwrap();
            let row = cursor.next_row().await.unwrap().unwrap();
            assert!(row.scan(0, ScanKind::Int64).is_err());
        }

        client.close().await;
    }
}
