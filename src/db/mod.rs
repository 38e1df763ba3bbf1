//! Database abstraction layer for sqlgate.
//!
//! Provides a trait-based interface over the supported engines so the
//! gateway can connect, execute and scan without branching on the driver
//! at each call site.

mod clickhouse;
mod cursor;
pub mod dialect;
pub mod mock;
mod mysql;
mod postgres;
pub mod scan;
mod sqlite;
mod types;

pub use self::clickhouse::ClickHouseClient;
pub use cursor::{EmptyCursor, RawRow, RowCursor, SqlxCursor};
pub use dialect::{resolve, ConnectionDescriptor, Credentials, DialectProfile};
pub use mysql::MySqlClient;
pub use postgres::PostgresClient;
pub use scan::ScanKind;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, NormalizedValue, ResultSet, Row};

use async_trait::async_trait;
use std::time::Duration;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Postgres,
    Mysql,
    ClickHouse,
    Sqlite,
}

impl Driver {
    /// All supported drivers.
    pub const ALL: [Driver; 4] = [
        Driver::Postgres,
        Driver::Mysql,
        Driver::ClickHouse,
        Driver::Sqlite,
    ];

    /// Returns the driver identifier used in requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::ClickHouse => "clickhouse",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a driver from a request identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::Mysql),
            "clickhouse" => Some(Self::ClickHouse),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns true if a stream-ended error from this driver marks normal completion.
    ///
    /// ClickHouse reports the end of its response body through the error
    /// channel; every other driver ends a cursor with an empty fetch.
    pub fn ends_stream_with_error(&self) -> bool {
        matches!(self, Self::ClickHouse)
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for the ephemeral per-request pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 25,
            max_lifetime: Duration::from_secs(5 * 60),
            idle_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Classification of a raw driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The descriptor or options were rejected before any I/O.
    Configuration,
    /// The backend signalled that its result stream has ended.
    EndOfStream,
    /// Any other failure reported by the driver or the server.
    Backend,
}

/// A failure reported by a database driver, before gateway classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
}

impl DriverError {
    /// Creates a backend failure with the given message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self {
            kind: DriverErrorKind::Backend,
            message: msg.into(),
        }
    }

    /// Creates a configuration failure with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self {
            kind: DriverErrorKind::Configuration,
            message: msg.into(),
        }
    }

    /// Creates the end-of-stream signal.
    pub fn end_of_stream() -> Self {
        Self {
            kind: DriverErrorKind::EndOfStream,
            message: "end of stream".to_string(),
        }
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.kind == DriverErrorKind::EndOfStream
    }

    pub fn is_configuration(&self) -> bool {
        self.kind == DriverErrorKind::Configuration
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Configuration(_) => Self::configuration(error.to_string()),
            _ => Self::backend(format_sqlx_error(&error)),
        }
    }
}

impl From<::clickhouse::error::Error> for DriverError {
    fn from(error: ::clickhouse::error::Error) -> Self {
        Self::backend(error.to_string())
    }
}

impl From<std::io::Error> for DriverError {
    fn from(error: std::io::Error) -> Self {
        Self::backend(error.to_string())
    }
}

/// Formats a sqlx error, keeping PostgreSQL detail and hint fields.
fn format_sqlx_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}

/// A live connection (or ephemeral pool) to one backend.
///
/// Implementations are created per request and closed when the request ends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Issues a liveness probe, performing the protocol handshake if needed.
    async fn ping(&self) -> std::result::Result<(), DriverError>;

    /// Runs a statement and returns a cursor over its results.
    ///
    /// Errors reported by the backend for the statement itself surface here.
    async fn execute<'a>(
        &'a self,
        sql: &'a str,
    ) -> std::result::Result<Box<dyn RowCursor + 'a>, DriverError>;

    /// Releases every connection held by this backend.
    async fn close(&self);
}

/// Opens backends for connection descriptors.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Opens a backend without performing the liveness probe.
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        pool: &PoolSettings,
    ) -> std::result::Result<Box<dyn Backend>, DriverError>;
}

/// Factory for the real database drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackends;

#[async_trait]
impl BackendFactory for NativeBackends {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        pool: &PoolSettings,
    ) -> std::result::Result<Box<dyn Backend>, DriverError> {
        let backend: Box<dyn Backend> = match descriptor {
            ConnectionDescriptor::Postgres { url, .. } => {
                Box::new(PostgresClient::open(url, pool)?)
            }
            ConnectionDescriptor::Mysql { url, .. } => Box::new(MySqlClient::open(url, pool)?),
            ConnectionDescriptor::ClickHouse {
                endpoint,
                credentials,
                database,
                ..
            } => Box::new(ClickHouseClient::open(endpoint, credentials, database)),
            ConnectionDescriptor::Sqlite { path } => Box::new(SqliteClient::open(path, pool)?),
        };
        Ok(backend)
    }
}
