//! Streaming cursors over backend results.

use super::{ColumnInfo, DriverError, NormalizedValue, ScanKind};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::{Column as SqlxColumn, Database, Row as SqlxRow, TypeInfo};
use std::future::Future;

/// A single backend row awaiting normalization.
pub trait RawRow: Send + Sync {
    /// Scans the value at `index` into the typed target selected by `kind`.
    fn scan(&self, index: usize, kind: ScanKind) -> Result<NormalizedValue, DriverError>;
}

/// A streaming handle over the rows of one statement.
///
/// Column metadata is fixed when the cursor is opened.
#[async_trait]
pub trait RowCursor: Send {
    /// Returns the columns of the result, in order.
    fn columns(&self) -> &[ColumnInfo];

    /// Fetches the next row, or `None` once the stream is exhausted.
    async fn next_row(&mut self) -> Result<Option<Box<dyn RawRow>>, DriverError>;
}

/// Cursor for statements that produce no result set.
#[derive(Debug, Default)]
pub struct EmptyCursor;

#[async_trait]
impl RowCursor for EmptyCursor {
    fn columns(&self) -> &[ColumnInfo] {
        &[]
    }

    async fn next_row(&mut self) -> Result<Option<Box<dyn RawRow>>, DriverError> {
        Ok(None)
    }
}

/// Cursor over a sqlx row stream.
///
/// The first row is fetched when the cursor is opened so statement errors
/// surface at execution time and column metadata is known up front.
pub struct SqlxCursor<'a, DB: Database> {
    columns: Vec<ColumnInfo>,
    peeked: Option<DB::Row>,
    stream: BoxStream<'a, Result<DB::Row, sqlx::Error>>,
}

impl<'a, DB: Database> SqlxCursor<'a, DB> {
    /// Opens the cursor, falling back to `describe` for column metadata
    /// when the statement returns no rows.
    pub async fn open<F>(
        mut stream: BoxStream<'a, Result<DB::Row, sqlx::Error>>,
        describe: F,
    ) -> Result<Self, DriverError>
    where
        F: Future<Output = Vec<ColumnInfo>> + Send,
    {
        let first = stream.try_next().await?;
        let columns = match &first {
            Some(row) => column_infos(row.columns()),
            None => describe.await,
        };

        Ok(Self {
            columns,
            peeked: first,
            stream,
        })
    }
}

#[async_trait]
impl<'a, DB> RowCursor for SqlxCursor<'a, DB>
where
    DB: Database,
    DB::Row: RawRow,
{
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Box<dyn RawRow>>, DriverError> {
        if let Some(row) = self.peeked.take() {
            return Ok(Some(Box::new(row)));
        }

        match self.stream.try_next().await? {
            Some(row) => Ok(Some(Box::new(row))),
            None => Ok(None),
        }
    }
}

/// Converts sqlx column metadata into column infos.
pub(crate) fn column_infos<C: SqlxColumn>(columns: &[C]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Normalizes an optional byte sequence, decoding UTF-8 to text.
pub(crate) fn bytes_value(bytes: Option<Vec<u8>>) -> NormalizedValue {
    bytes
        .map(NormalizedValue::from_bytes)
        .unwrap_or(NormalizedValue::Null)
}
