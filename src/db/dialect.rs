//! Dialect registry.
//!
//! Maps a driver identifier to its connection conventions: default port,
//! descriptor construction rule and type-scan table. Profiles are static
//! and shared by every request.

use super::scan::{self, ScanKind};
use super::Driver;
use crate::error::{GatewayError, Result};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Connection conventions of one supported driver.
#[derive(Debug)]
pub struct DialectProfile {
    /// The driver this profile describes.
    pub driver: Driver,

    /// Port appended to addresses that do not specify one. `None` for file-based engines.
    pub default_port: Option<u16>,

    /// URI scheme of the descriptor.
    scheme: &'static str,

    /// Query parameters appended to URI descriptors.
    params: &'static [(&'static str, &'static str)],

    /// Maps a declared column type to its scan target.
    scan_table: fn(&str) -> ScanKind,
}

static POSTGRES: DialectProfile = DialectProfile {
    driver: Driver::Postgres,
    default_port: Some(5432),
    scheme: "postgres",
    params: &[("sslmode", "disable"), ("connect_timeout", "30")],
    scan_table: scan::postgres_kind,
};

static MYSQL: DialectProfile = DialectProfile {
    driver: Driver::Mysql,
    default_port: Some(3306),
    scheme: "mysql",
    params: &[],
    scan_table: scan::mysql_kind,
};

static CLICKHOUSE: DialectProfile = DialectProfile {
    driver: Driver::ClickHouse,
    default_port: Some(8123),
    scheme: "http",
    params: &[],
    scan_table: scan::clickhouse_kind,
};

static SQLITE: DialectProfile = DialectProfile {
    driver: Driver::Sqlite,
    default_port: None,
    scheme: "sqlite",
    params: &[],
    scan_table: scan::sqlite_kind,
};

impl Driver {
    /// Returns the static profile for this driver.
    pub fn profile(self) -> &'static DialectProfile {
        match self {
            Driver::Postgres => &POSTGRES,
            Driver::Mysql => &MYSQL,
            Driver::ClickHouse => &CLICKHOUSE,
            Driver::Sqlite => &SQLITE,
        }
    }
}

/// Resolves a driver identifier to its profile.
pub fn resolve(driver_name: &str) -> Result<&'static DialectProfile> {
    Driver::parse(driver_name)
        .map(Driver::profile)
        .ok_or_else(|| GatewayError::unsupported_driver(driver_name.trim()))
}

/// User name and password supplied with a request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Driver-specific description of the connection target.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// PostgreSQL DSN; credentials are embedded percent-encoded.
    Postgres { address: String, url: Url },

    /// MySQL DSN; credentials are embedded percent-encoded.
    Mysql { address: String, url: Url },

    /// ClickHouse HTTP endpoint; credentials travel as client settings.
    ClickHouse {
        address: String,
        endpoint: Url,
        credentials: Credentials,
        database: String,
    },

    /// Path to an existing SQLite database file.
    Sqlite { path: PathBuf },
}

impl ConnectionDescriptor {
    pub fn driver(&self) -> Driver {
        match self {
            Self::Postgres { .. } => Driver::Postgres,
            Self::Mysql { .. } => Driver::Mysql,
            Self::ClickHouse { .. } => Driver::ClickHouse,
            Self::Sqlite { .. } => Driver::Sqlite,
        }
    }

    /// Network address (`host:port`) to probe, if the engine is networked.
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Postgres { address, .. }
            | Self::Mysql { address, .. }
            | Self::ClickHouse { address, .. } => Some(address),
            Self::Sqlite { .. } => None,
        }
    }

    /// Returns a log-safe rendering with the password masked.
    pub fn redacted(&self) -> String {
        match self {
            Self::Postgres { url, .. } | Self::Mysql { url, .. } => {
                let mut url = url.clone();
                if url.password().is_some() {
                    // Cannot fail: the URL already carries a password.
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Self::ClickHouse {
                endpoint,
                credentials,
                database,
                ..
            } => format!(
                "{endpoint} (user={}, database={database})",
                credentials.username
            ),
            Self::Sqlite { path } => format!("sqlite://{}", path.display()),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionDescriptor")
            .field(&self.redacted())
            .finish()
    }
}

impl DialectProfile {
    /// Maps a declared column type to its scan target.
    pub fn scan_kind(&self, declared_type: &str) -> ScanKind {
        (self.scan_table)(declared_type)
    }

    /// Appends the default port to an address that lacks one.
    ///
    /// Addresses that already carry a port are returned unchanged, so the
    /// operation is idempotent. Bare IPv6 literals are bracketed first.
    pub fn normalize_address(&self, address: &str) -> String {
        let address = address.trim();
        let Some(port) = self.default_port else {
            return address.to_string();
        };
        if address.is_empty() || has_explicit_port(address) {
            return address.to_string();
        }
        if address.contains(':') && !address.starts_with('[') {
            return format!("[{address}]:{port}");
        }
        format!("{address}:{port}")
    }

    /// Builds the connection descriptor for this driver.
    ///
    /// `address` is normalized first; for SQLite it is ignored and
    /// `database` is the path of the database file.
    pub fn build_descriptor(
        &self,
        credentials: &Credentials,
        address: &str,
        database: &str,
    ) -> Result<ConnectionDescriptor> {
        if self.driver == Driver::Sqlite {
            let path = database.trim();
            if path.is_empty() {
                return Err(GatewayError::invalid_configuration(
                    "SQLite requires the database file path in the database field",
                ));
            }
            return Ok(ConnectionDescriptor::Sqlite {
                path: PathBuf::from(path),
            });
        }

        let address = self.normalize_address(address);
        validate_address(&address)?;

        let mut url = Url::parse(&format!("{}://{}/", self.scheme, address)).map_err(|e| {
            GatewayError::invalid_configuration(format!("Invalid server address '{address}': {e}"))
        })?;

        if self.driver == Driver::ClickHouse {
            return Ok(ConnectionDescriptor::ClickHouse {
                address,
                endpoint: url,
                credentials: credentials.clone(),
                database: database.trim().to_string(),
            });
        }

        if !credentials.username.is_empty() {
            url.set_username(&credentials.username).map_err(|_| {
                GatewayError::invalid_configuration("Server address cannot carry a user name")
            })?;
        }
        if !credentials.password.is_empty() {
            url.set_password(Some(&credentials.password)).map_err(|_| {
                GatewayError::invalid_configuration("Server address cannot carry a password")
            })?;
        }
        let database = database.trim();
        if !database.is_empty() {
            url.path_segments_mut()
                .map_err(|_| GatewayError::invalid_configuration("Server address has no path"))?
                .pop_if_empty()
                .push(database);
        }
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }

        Ok(match self.driver {
            Driver::Mysql => ConnectionDescriptor::Mysql { address, url },
            _ => ConnectionDescriptor::Postgres { address, url },
        })
    }
}

fn has_explicit_port(address: &str) -> bool {
    if let Some(rest) = address.strip_prefix('[') {
        return rest
            .split_once(']')
            .is_some_and(|(_, tail)| tail.starts_with(':'));
    }
    address.matches(':').count() == 1
}

/// Checks that a normalized address has a host and a numeric port.
fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(GatewayError::invalid_configuration(
            "Server address is required",
        ));
    }

    let (host, port) = match address.strip_prefix('[') {
        Some(rest) => {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                GatewayError::invalid_configuration(format!(
                    "Unterminated IPv6 address '{address}'"
                ))
            })?;
            (host, tail.strip_prefix(':').unwrap_or_default())
        }
        None => address.rsplit_once(':').unwrap_or((address, "")),
    };

    if host.is_empty() {
        return Err(GatewayError::invalid_configuration(format!(
            "Server address '{address}' has no host"
        )));
    }
    port.parse::<u16>().map_err(|_| {
        GatewayError::invalid_configuration(format!(
            "Server address '{address}' has an invalid port '{port}'"
        ))
    })?;

    Ok(())
}
