//! Error types for sqlgate.
//!
//! Defines the error enum surfaced by the gateway and its mapping onto
//! response categories and HTTP status codes.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The requested driver is not one of the supported engines.
    #[error("Unsupported database driver: {0}")]
    UnsupportedDriver(String),

    /// Malformed address, credentials or database name.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The pre-flight TCP dial to the server failed.
    #[error("Database server is not accessible: {0}")]
    ServerUnreachable(String),

    /// Authentication or protocol failure after all connection attempts.
    #[error("Connection error: {0}")]
    Connection(String),

    /// SQL error reported by the backend.
    #[error("Query error: {0}")]
    Query(String),

    /// A value could not be scanned into its typed target.
    #[error("Row scan error at row {row}, column '{column}': {message}")]
    RowScan {
        row: usize,
        column: String,
        message: String,
    },

    /// The request deadline elapsed or the request was cancelled.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid settings file or command-line options.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Creates an unsupported driver error for the given driver name.
    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::UnsupportedDriver(driver.into())
    }

    /// Creates an invalid configuration error with the given message.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a server unreachable error with the given message.
    pub fn server_unreachable(msg: impl Into<String>) -> Self {
        Self::ServerUnreachable(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a row scan error for the given row index and column.
    pub fn row_scan(row: usize, column: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RowScan {
            row,
            column: column.into(),
            message: msg.into(),
        }
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedDriver(_) => "Unsupported Driver",
            Self::InvalidConfiguration(_) => "Invalid Configuration",
            Self::ServerUnreachable(_) => "Server Unreachable",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::RowScan { .. } => "Row Scan Error",
            Self::Timeout(_) => "Timeout",
            Self::Config(_) => "Configuration Error",
        }
    }

    /// Returns the machine-readable kind carried in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedDriver(_) => "UnsupportedDriverError",
            Self::InvalidConfiguration(_) => "InvalidConfigurationError",
            Self::ServerUnreachable(_) => "ServerUnreachableError",
            Self::Connection(_) => "ConnectionError",
            Self::Query(_) => "QueryError",
            Self::RowScan { .. } => "RowScanError",
            Self::Timeout(_) => "TimeoutError",
            Self::Config(_) => "ConfigError",
        }
    }

    /// Returns the HTTP status code for this error category.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnsupportedDriver(_) | Self::InvalidConfiguration(_) | Self::Query(_) => 400,
            Self::ServerUnreachable(_) | Self::Connection(_) | Self::Timeout(_) => 503,
            Self::RowScan { .. } | Self::Config(_) => 500,
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_driver() {
        let err = GatewayError::unsupported_driver("oracle");
        assert_eq!(err.to_string(), "Unsupported database driver: oracle");
        assert_eq!(err.kind(), "UnsupportedDriverError");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_error_display_unreachable() {
        let err = GatewayError::server_unreachable("db.internal:3306: connection refused");
        assert_eq!(
            err.to_string(),
            "Database server is not accessible: db.internal:3306: connection refused"
        );
        assert_eq!(err.category(), "Server Unreachable");
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn test_error_display_row_scan() {
        let err = GatewayError::row_scan(5, "amount", "invalid digit");
        assert_eq!(
            err.to_string(),
            "Row scan error at row 5, column 'amount': invalid digit"
        );
        assert_eq!(err.kind(), "RowScanError");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GatewayError::invalid_configuration("x").http_status(), 400);
        assert_eq!(GatewayError::connection("x").http_status(), 503);
        assert_eq!(GatewayError::query("x").http_status(), 400);
        assert_eq!(GatewayError::timeout("x").http_status(), 503);
        assert_eq!(GatewayError::config("x").http_status(), 500);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }
}
