//! ClickHouse end-to-end tests.
//!
//! These tests require a running ClickHouse server with its HTTP interface.
//! Set CLICKHOUSE_URL (e.g. http://default:@localhost:8123/default) to run them.

use super::{native_gateway, request_from_env};
use serde_json::{json, Value};

async fn run(sql: &str) -> Option<(u16, Value)> {
    let request = request_from_env("CLICKHOUSE_URL", "clickhouse", sql)?;
    let response = native_gateway().run(&request).await;
    Some((
        response.status_code,
        serde_json::to_value(&response.body).unwrap(),
    ))
}

#[tokio::test]
async fn test_stream_end_is_normal_completion() {
    let Some((status, body)) = run(
        "SELECT number AS n, toString(number) AS s FROM system.numbers LIMIT 3",
    )
    .await
    else {
        eprintln!("Skipping test: CLICKHOUSE_URL not set");
        return;
    };

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "columns": ["n", "s"],
            "rows": [
                {"n": 0, "s": "0"},
                {"n": 1, "s": "1"},
                {"n": 2, "s": "2"}
            ],
            "status": "success"
        })
    );
}

#[tokio::test]
async fn test_empty_result() {
    let Some((status, body)) = run("SELECT 1 AS one WHERE 0").await else {
        eprintln!("Skipping test: CLICKHOUSE_URL not set");
        return;
    };

    assert_eq!(status, 200);
    assert_eq!(body["columns"], json!(["one"]));
    assert_eq!(body["rows"], json!([]));
}

#[tokio::test]
async fn test_wide_integers_keep_precision() {
    let Some((status, body)) = run(
        "SELECT toUInt64(18446744073709551615) AS u, toInt64(-9223372036854775808) AS i",
    )
    .await
    else {
        eprintln!("Skipping test: CLICKHOUSE_URL not set");
        return;
    };

    assert_eq!(status, 200);
    assert_eq!(
        body["rows"],
        json!([{"u": 18446744073709551615u64, "i": -9223372036854775808i64}])
    );
}

#[tokio::test]
async fn test_unknown_table_is_query_error() {
    let Some((status, body)) = run("SELECT * FROM nonexistent_table_xyz").await else {
        eprintln!("Skipping test: CLICKHOUSE_URL not set");
        return;
    };

    assert_eq!(status, 400);
    assert_eq!(body["kind"], "QueryError");
}
