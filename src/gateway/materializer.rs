//! Drains a cursor into a normalized result set.

use super::deadline::Deadline;
use crate::db::{DialectProfile, ResultSet, RowCursor, ScanKind};
use crate::error::{GatewayError, Result};
use tracing::debug;

/// Reads every row of `cursor`, scanning each column with the dialect's typed target.
///
/// The first scan failure aborts the drain; no partial result is returned.
pub async fn drain(
    cursor: &mut (dyn RowCursor + '_),
    profile: &DialectProfile,
    deadline: &Deadline,
) -> Result<ResultSet> {
    let columns: Vec<String> = cursor.columns().iter().map(|c| c.name.clone()).collect();
    let plan: Vec<ScanKind> = cursor
        .columns()
        .iter()
        .map(|c| profile.scan_kind(&c.declared_type))
        .collect();
    debug!("Scan plan: {:?}", plan);

    let mut rows = Vec::new();
    loop {
        let raw = match deadline.run("fetch", cursor.next_row()).await? {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) if e.is_end_of_stream() && profile.driver.ends_stream_with_error() => break,
            Err(e) => return Err(GatewayError::query(e.to_string())),
        };

        let index = rows.len();
        let mut row = Vec::with_capacity(plan.len());
        for (position, kind) in plan.iter().enumerate() {
            let value = raw
                .scan(position, *kind)
                .map_err(|e| GatewayError::row_scan(index, &columns[position], e.to_string()))?;
            row.push(value);
        }
        rows.push(row);
    }

    Ok(ResultSet::with_data(columns, rows))
}
