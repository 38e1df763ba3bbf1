//! HTTP shell tests.
//!
//! Requests are sent straight to the router with `oneshot`; no socket is bound.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlgate::db::mock::MockBackendFactory;
use sqlgate::db::{ColumnInfo, NormalizedValue};
use sqlgate::gateway::{Gateway, GatewaySettings};
use sqlgate::server::router;
use std::sync::Arc;
use tower::ServiceExt;

fn mock_router(factory: MockBackendFactory) -> Router {
    router(Gateway::with_factory(
        Arc::new(factory),
        GatewaySettings::default(),
    ))
}

fn form(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/query")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_index_serves_form() {
    let app = mock_router(MockBackendFactory::new());
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains(r#"<form id="query-form""#));
    assert!(html.contains(r#"name="query""#));
}

#[tokio::test]
async fn test_diagnostic_route() {
    let app = mock_router(MockBackendFactory::new());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "test", "status": "error"})
    );
}

#[tokio::test]
async fn test_query_success() {
    let factory = MockBackendFactory::new().with_result(
        vec![ColumnInfo::new("id", "INTEGER"), ColumnInfo::new("name", "TEXT")],
        vec![vec![Ok(NormalizedValue::Int(1)), Ok(NormalizedValue::from("Alice"))]],
    );
    let app = mock_router(factory.clone());

    let response = app
        .oneshot(form(
            "driver=sqlite&database=app.db&query=SELECT+id%2C+name+FROM+people",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "columns": ["id", "name"],
            "rows": [{"id": 1, "name": "Alice"}],
            "status": "success"
        })
    );
    assert_eq!(
        factory.statements(),
        vec!["SELECT id, name FROM people".to_string()]
    );
}

#[tokio::test]
async fn test_unsupported_driver() {
    let app = mock_router(MockBackendFactory::new());
    let response = app.oneshot(form("driver=oracle&query=SELECT+1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({
            "error": "Unsupported database driver: oracle",
            "kind": "UnsupportedDriverError",
            "status": "error"
        })
    );
}

#[tokio::test]
async fn test_missing_fields_default_to_empty() {
    let app = mock_router(MockBackendFactory::new());
    let response = app.oneshot(form("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "UnsupportedDriverError");
}

#[tokio::test]
async fn test_unreachable_server_is_503() {
    // Bind then drop a listener so the port is known to be closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let factory = MockBackendFactory::new();
    let app = mock_router(factory.clone());
    let response = app
        .oneshot(form(&format!(
            "driver=mysql&server=127.0.0.1%3A{port}&username=u&password=p&database=app&query=SELECT+1"
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "ServerUnreachableError");
    assert_eq!(body["status"], "error");
    assert_eq!(factory.opens(), 0);
}
