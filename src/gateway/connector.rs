//! Connection establishment with a reachability probe and bounded retries.

use super::deadline::Deadline;
use crate::db::{Backend, BackendFactory, ConnectionDescriptor, Driver, PoolSettings};
use crate::error::{GatewayError, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Sequential retry schedule for opening a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .checked_mul(attempt)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Settings of the connect phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorSettings {
    pub probe_timeout: Duration,
    pub retry: RetryPolicy,
    pub pool: PoolSettings,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            pool: PoolSettings::default(),
        }
    }
}

/// A verified connection scoped to one request.
pub struct LiveConnection {
    driver: Driver,
    backend: Box<dyn Backend>,
}

impl LiveConnection {
    /// Wraps an already verified backend.
    pub fn new(driver: Driver, backend: Box<dyn Backend>) -> Self {
        Self { driver, backend }
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Releases the connection's pool.
    pub async fn close(self) {
        self.backend.close().await;
    }
}

impl std::fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnection")
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

/// Dials `address` to check that something is listening.
pub async fn probe(address: &str, timeout: Duration, deadline: &Deadline) -> Result<()> {
    let dial = tokio::time::timeout(timeout, TcpStream::connect(address));
    match deadline.run("probe", dial).await? {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(GatewayError::server_unreachable(format!(
            "cannot connect to server {address}: {e}"
        ))),
        Err(_) => Err(GatewayError::server_unreachable(format!(
            "cannot connect to server {address}: timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Opens and verifies a connection for `descriptor`.
///
/// Network engines are probed first. Open-and-ping is then attempted up to
/// `max_attempts` times with a linear backoff, all within `deadline`.
pub async fn connect(
    factory: &dyn BackendFactory,
    descriptor: &ConnectionDescriptor,
    settings: &ConnectorSettings,
    deadline: &Deadline,
) -> Result<LiveConnection> {
    if let Some(address) = descriptor.address() {
        if let Err(e) = probe(address, settings.probe_timeout, deadline).await {
            warn!("Probe failed for {}: {}", address, e);
            return Err(e);
        }
        debug!("Probe succeeded for {}", address);
    }

    let max_attempts = settings.retry.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        debug!(
            "Connecting to {} (attempt {}/{})",
            descriptor.redacted(),
            attempt,
            max_attempts
        );

        let opened = deadline
            .run("connect", factory.open(descriptor, &settings.pool))
            .await?;
        let failure = match opened {
            Ok(backend) => {
                let pinged = deadline.run("connect", backend.ping()).await;
                match pinged {
                    Ok(Ok(())) => {
                        return Ok(LiveConnection {
                            driver: descriptor.driver(),
                            backend,
                        });
                    }
                    Ok(Err(e)) => {
                        backend.close().await;
                        e
                    }
                    Err(timeout) => {
                        backend.close().await;
                        return Err(timeout);
                    }
                }
            }
            Err(e) if e.is_configuration() => {
                return Err(GatewayError::invalid_configuration(e.to_string()));
            }
            Err(e) => e,
        };

        warn!(
            "Connection attempt {}/{} failed: {}",
            attempt, max_attempts, failure
        );
        last_error = failure.to_string();

        if attempt < max_attempts {
            deadline
                .sleep("connect backoff", settings.retry.delay_after(attempt))
                .await?;
        }
    }

    Err(GatewayError::connection(format!(
        "Failed to connect to database after {max_attempts} attempts: {last_error}"
    )))
}
