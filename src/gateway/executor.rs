//! Statement execution against a live connection.

use super::connector::LiveConnection;
use super::deadline::Deadline;
use crate::db::{EmptyCursor, RowCursor};
use crate::error::{GatewayError, Result};
use tracing::debug;

/// Runs `sql` verbatim and returns a cursor over its results.
///
/// For drivers that end streams through the error channel, an end-of-stream
/// at execution time means the statement produced no result set.
pub async fn execute<'a>(
    conn: &'a LiveConnection,
    sql: &'a str,
    deadline: &Deadline,
) -> Result<Box<dyn RowCursor + 'a>> {
    match deadline.run("execute", conn.backend().execute(sql)).await? {
        Ok(cursor) => Ok(cursor),
        Err(e) if e.is_end_of_stream() && conn.driver().ends_stream_with_error() => {
            debug!("Statement returned no result set");
            Ok(Box::new(EmptyCursor))
        }
        Err(e) => Err(GatewayError::query(e.to_string())),
    }
}
