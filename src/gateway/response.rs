//! Response assembly.

use crate::db::ResultSet;
use crate::error::{GatewayError, Result};
use serde::Serialize;

/// Outcome marker carried in every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// JSON payload of a gateway response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success {
        #[serde(flatten)]
        result: ResultSet,
        status: Status,
    },
    Failure {
        error: String,
        kind: String,
        status: Status,
    },
}

impl ResponseBody {
    pub fn failure(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            kind: kind.into(),
            status: Status::Error,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status,
        }
    }
}

/// A response ready to be rendered: HTTP status plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status_code: u16,
    pub body: ResponseBody,
}

impl GatewayResponse {
    pub fn success(result: ResultSet) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody::Success {
                result,
                status: Status::Success,
            },
        }
    }

    pub fn failure(error: &GatewayError) -> Self {
        Self {
            status_code: error.http_status(),
            body: ResponseBody::failure(error.to_string(), error.kind()),
        }
    }
}

/// Packages the outcome of a request.
pub fn assemble(outcome: Result<ResultSet>) -> GatewayResponse {
    match outcome {
        Ok(result) => GatewayResponse::success(result),
        Err(e) => GatewayResponse::failure(&e),
    }
}
