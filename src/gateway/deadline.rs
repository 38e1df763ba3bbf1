//! Per-request deadline with explicit cancellation.

use crate::error::{GatewayError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Bounds every blocking step of one request.
///
/// Expiry and cancellation both surface as [`GatewayError::Timeout`].
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
    token: CancellationToken,
}

impl Deadline {
    /// Starts a deadline that expires `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
            token: CancellationToken::new(),
        }
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// Cancels the request; every pending and future step fails with a timeout.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token observed by [`Deadline::run`], for cancelling from elsewhere.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs `fut` to completion unless the deadline fires first.
    ///
    /// `stage` names the interrupted step in the timeout message.
    pub async fn run<F, T>(&self, stage: &str, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                Err(GatewayError::timeout(format!("request cancelled during {stage}")))
            }
            _ = sleep_until(self.expires_at) => Err(GatewayError::timeout(format!(
                "deadline of {}s exceeded during {stage}",
                self.budget.as_secs()
            ))),
            value = fut => Ok(value),
        }
    }

    /// Sleeps for `duration`, cut short with a timeout if the deadline fires.
    pub async fn sleep(&self, stage: &str, duration: Duration) -> Result<()> {
        self.run(stage, tokio::time::sleep(duration)).await
    }
}
