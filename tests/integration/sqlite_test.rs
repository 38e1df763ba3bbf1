//! SQLite end-to-end tests.
//!
//! Each test seeds a real database file in a temporary directory and runs
//! requests through the full gateway pipeline.

use super::native_gateway;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlgate::gateway::ConnectionRequest;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates `test.db` in `dir` and runs `statements` against it.
async fn seed(dir: &TempDir, statements: &[&str]) -> PathBuf {
    let path = dir.path().join("test.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();
    for statement in statements {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;
    path
}

fn request(path: &Path, sql: &str) -> ConnectionRequest {
    ConnectionRequest {
        driver: "sqlite".to_string(),
        database: path.display().to_string(),
        sql: sql.to_string(),
        ..Default::default()
    }
}

async fn run(path: &Path, sql: &str) -> (u16, Value) {
    let response = native_gateway().run(&request(path, sql)).await;
    let body = serde_json::to_value(&response.body).unwrap();
    (response.status_code, body)
}

#[tokio::test]
async fn test_select_normalizes_values() {
    let dir = TempDir::new().unwrap();
    let path = seed(
        &dir,
        &[
            "CREATE TABLE items (id INTEGER, label TEXT, price REAL, added DATETIME, \
             active BOOLEAN)",
            "INSERT INTO items VALUES (1, 'widget', 2.5, '2024-01-02 03:04:05', 1)",
            "INSERT INTO items VALUES (2, NULL, NULL, NULL, 0)",
        ],
    )
    .await;

    let (status, body) = run(
        &path,
        "SELECT id, label, price, added, active FROM items ORDER BY id",
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "columns": ["id", "label", "price", "added", "active"],
            "rows": [
                {
                    "id": 1,
                    "label": "widget",
                    "price": 2.5,
                    "added": "2024-01-02T03:04:05Z",
                    "active": "true"
                },
                {
                    "id": 2,
                    "label": null,
                    "price": null,
                    "added": null,
                    "active": "false"
                }
            ],
            "status": "success"
        })
    );
}

#[tokio::test]
async fn test_row_keys_follow_select_order() {
    let dir = TempDir::new().unwrap();
    let path = seed(
        &dir,
        &[
            "CREATE TABLE people (id INTEGER, name TEXT, created_at DATETIME)",
            "INSERT INTO people VALUES (1, 'Alice', '2024-01-01 00:00:00')",
            "INSERT INTO people VALUES (2, 'Bob', '2024-01-02 00:00:00')",
        ],
    )
    .await;

    let response = native_gateway()
        .run(&request(
            &path,
            "SELECT name, created_at, id FROM people ORDER BY id",
        ))
        .await;
    let body = serde_json::to_string(&response.body).unwrap();

    assert_eq!(response.status_code, 200);
    assert!(body.contains(r#"{"name":"Alice","created_at":"2024-01-01T00:00:00Z","id":1}"#));
    assert!(body.contains(r#"{"name":"Bob","created_at":"2024-01-02T00:00:00Z","id":2}"#));
}

#[tokio::test]
async fn test_scan_failure_reports_row_and_column() {
    let dir = TempDir::new().unwrap();
    let mut statements = vec!["CREATE TABLE m (id INTEGER, amount INTEGER)".to_string()];
    for i in 0..10 {
        let amount = if i == 5 {
            "'abc'".to_string()
        } else {
            (i * 10).to_string()
        };
        statements.push(format!("INSERT INTO m VALUES ({i}, {amount})"));
    }
    let statements: Vec<&str> = statements.iter().map(String::as_str).collect();
    let path = seed(&dir, &statements).await;

    let (status, body) = run(&path, "SELECT id, amount FROM m ORDER BY id").await;

    assert_eq!(status, 500);
    assert_eq!(body["kind"], "RowScanError");
    assert_eq!(body["status"], "error");
    assert!(body.get("rows").is_none());
    let message = body["error"].as_str().unwrap();
    assert!(
        message.starts_with("Row scan error at row 5, column 'amount'"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let dir = TempDir::new().unwrap();
    let path = seed(&dir, &["CREATE TABLE t (a INTEGER, b TEXT)"]).await;

    let (status, body) = run(&path, "SELECT a, b FROM t").await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"columns": ["a", "b"], "rows": [], "status": "success"})
    );
}

#[tokio::test]
async fn test_ddl_succeeds_with_empty_result() {
    let dir = TempDir::new().unwrap();
    let path = seed(&dir, &["CREATE TABLE t (a INTEGER)"]).await;

    let (status, body) = run(&path, "CREATE TABLE u (b TEXT)").await;

    assert_eq!(status, 200);
    assert_eq!(body["rows"], json!([]));
}

#[tokio::test]
async fn test_blob_values() {
    let dir = TempDir::new().unwrap();
    let path = seed(
        &dir,
        &[
            "CREATE TABLE b (payload BLOB)",
            "INSERT INTO b VALUES (x'6869'), (x'FF00')",
        ],
    )
    .await;

    let (status, body) = run(&path, "SELECT payload FROM b ORDER BY rowid").await;

    assert_eq!(status, 200);
    assert_eq!(body["rows"], json!([{"payload": "hi"}, {"payload": "/wA="}]));
}

#[tokio::test]
async fn test_expression_columns_keep_numeric_types() {
    let dir = TempDir::new().unwrap();
    let path = seed(
        &dir,
        &[
            "CREATE TABLE t (x INTEGER)",
            "INSERT INTO t VALUES (1), (2)",
        ],
    )
    .await;

    let (status, body) = run(
        &path,
        "SELECT COUNT(*) AS c, SUM(x) AS s, AVG(x) AS a, 1+1 AS e, 'a' || 'b' AS t, \
         NULL AS z FROM t",
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(
        body["rows"],
        json!([{"c": 2, "s": 3, "a": 1.5, "e": 2, "t": "ab", "z": null}])
    );
}

#[tokio::test]
async fn test_numeric_affinity_uses_stored_class() {
    let dir = TempDir::new().unwrap();
    let path = seed(
        &dir,
        &[
            "CREATE TABLE amounts (id INTEGER, n NUMERIC)",
            "INSERT INTO amounts VALUES (1, 3), (2, 2.5), (3, 'n/a')",
        ],
    )
    .await;

    let (status, body) = run(&path, "SELECT n FROM amounts ORDER BY id").await;

    assert_eq!(status, 200);
    assert_eq!(body["rows"], json!([{"n": 3}, {"n": 2.5}, {"n": "n/a"}]));
}

#[tokio::test]
async fn test_syntax_error_is_query_error() {
    let dir = TempDir::new().unwrap();
    let path = seed(&dir, &["CREATE TABLE t (a INTEGER)"]).await;

    let (status, body) = run(&path, "SELEC a FROM t").await;

    assert_eq!(status, 400);
    assert_eq!(body["kind"], "QueryError");
    assert!(body["error"].as_str().unwrap().contains("syntax error"));
}

#[tokio::test]
async fn test_missing_file_is_invalid_configuration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.db");

    let (status, body) = run(&path, "SELECT 1").await;

    assert_eq!(status, 400);
    assert_eq!(body["kind"], "InvalidConfigurationError");
    assert!(!path.exists());
}
