//! HTTP shell over the gateway.
//!
//! Serves the query form and turns form submissions into gateway requests.
//! Every request runs on its own handler task; dropping the task (client
//! disconnect) drops the in-flight work with it.

use crate::gateway::{ConnectionRequest, Gateway, GatewayResponse, ResponseBody};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Builds the application router.
pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/test", post(test_handler))
        .route("/query", post(query_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(gateway))
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(gateway: Gateway, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("sqlgate listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(gateway)).await
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn test_handler() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "test", "status": "error"})),
    )
}

async fn query_handler(
    State(gateway): State<Arc<Gateway>>,
    Form(request): Form<ConnectionRequest>,
) -> GatewayResponse {
    info!(
        "Query request: driver={} server={} database={}",
        request.driver, request.server, request.database
    );
    gateway.run(&request).await
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json::<ResponseBody>(self.body)).into_response()
    }
}
