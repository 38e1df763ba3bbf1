//! Request orchestration.
//!
//! Drives one request through resolution, connection, execution and
//! materialization, then assembles the response. Each request owns its
//! connection; nothing but the static dialect registry and the immutable
//! settings is shared between requests.

pub mod connector;
pub mod deadline;
pub mod executor;
pub mod materializer;
pub mod response;

pub use connector::{ConnectorSettings, LiveConnection, RetryPolicy};
pub use deadline::Deadline;
pub use response::{assemble, GatewayResponse, ResponseBody, Status};

use crate::db::{resolve, BackendFactory, Credentials, NativeBackends, ResultSet};
use crate::error::Result;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Grace period for releasing a connection after the request finished.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// One query request, as submitted by the form.
///
/// Missing fields default to empty strings.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionRequest {
    pub driver: String,
    pub server: String,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(rename = "query")]
    pub sql: String,
}

impl fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("sql", &self.sql)
            .finish()
    }
}

/// Immutable settings shared by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    pub deadline: Duration,
    pub connector: ConnectorSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            connector: ConnectorSettings::default(),
        }
    }
}

/// Lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Resolved,
    Connecting,
    Connected,
    Executing,
    Materializing,
    Completed,
    Failed(&'static str),
}

/// Executes query requests against the supported backends.
#[derive(Clone)]
pub struct Gateway {
    factory: Arc<dyn BackendFactory>,
    settings: GatewaySettings,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a gateway over the real database drivers.
    pub fn new(settings: GatewaySettings) -> Self {
        Self::with_factory(Arc::new(NativeBackends), settings)
    }

    /// Creates a gateway that opens backends through `factory`.
    pub fn with_factory(factory: Arc<dyn BackendFactory>, settings: GatewaySettings) -> Self {
        Self { factory, settings }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Runs a request under a fresh deadline and assembles the response.
    pub async fn run(&self, request: &ConnectionRequest) -> GatewayResponse {
        let deadline = Deadline::after(self.settings.deadline);
        self.run_with_deadline(request, &deadline).await
    }

    /// Runs a request under `deadline`, which callers may cancel.
    pub async fn run_with_deadline(
        &self,
        request: &ConnectionRequest,
        deadline: &Deadline,
    ) -> GatewayResponse {
        let started = Instant::now();
        let outcome = self.process(request, deadline).await;

        match &outcome {
            Ok(result) => info!(
                "{} query returned {} rows in {:?}",
                request.driver,
                result.row_count(),
                started.elapsed()
            ),
            Err(e) => warn!(
                "{} query failed in {:?}: {}: {}",
                request.driver,
                started.elapsed(),
                e.category(),
                e
            ),
        }

        assemble(outcome)
    }

    async fn process(
        &self,
        request: &ConnectionRequest,
        deadline: &Deadline,
    ) -> Result<ResultSet> {
        let mut stage = Stage::Received;
        let outcome = self.pipeline(request, deadline, &mut stage).await;
        match &outcome {
            Ok(_) => transition(&mut stage, Stage::Completed),
            Err(e) => transition(&mut stage, Stage::Failed(e.kind())),
        }
        outcome
    }

    async fn pipeline(
        &self,
        request: &ConnectionRequest,
        deadline: &Deadline,
        stage: &mut Stage,
    ) -> Result<ResultSet> {
        let profile = resolve(&request.driver)?;
        let credentials = Credentials::new(request.username.as_str(), request.password.as_str());
        let descriptor =
            profile.build_descriptor(&credentials, &request.server, &request.database)?;
        transition(stage, Stage::Resolved);
        debug!("Resolved descriptor: {}", descriptor.redacted());

        transition(stage, Stage::Connecting);
        let conn = connector::connect(
            self.factory.as_ref(),
            &descriptor,
            &self.settings.connector,
            deadline,
        )
        .await?;
        transition(stage, Stage::Connected);

        let outcome = async {
            transition(stage, Stage::Executing);
            let mut cursor = executor::execute(&conn, &request.sql, deadline).await?;
            transition(stage, Stage::Materializing);
            materializer::drain(cursor.as_mut(), profile, deadline).await
        }
        .await;

        if tokio::time::timeout(CLOSE_GRACE, conn.close()).await.is_err() {
            warn!("Timed out releasing {} connection", profile.driver);
        }
        outcome
    }
}

fn transition(stage: &mut Stage, next: Stage) {
    debug!("Request stage {:?} -> {:?}", stage, next);
    *stage = next;
}
