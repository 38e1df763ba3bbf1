//! Mock backends for testing.
//!
//! Provides a scripted in-memory backend so the gateway can be exercised
//! without a database server. Every backend opened by one factory shares
//! the factory's counters.

use super::{
    Backend, BackendFactory, ColumnInfo, ConnectionDescriptor, DriverError, NormalizedValue,
    PoolSettings, RawRow, RowCursor, ScanKind,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A scripted cell: a value, or the message of a scan failure.
pub type MockCell = std::result::Result<NormalizedValue, String>;

#[derive(Debug, Default)]
struct Counters {
    failing_pings: AtomicUsize,
    opens: Mutex<Vec<Instant>>,
    statements: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
struct Script {
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<MockCell>>,
    stream_end: Option<DriverError>,
    open_error: Option<DriverError>,
    execute_error: Option<DriverError>,
    execute_delay: Option<Duration>,
}

/// Factory of scripted backends.
#[derive(Debug, Clone, Default)]
pub struct MockBackendFactory {
    script: Script,
    counters: Arc<Counters>,
}

impl MockBackendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `count` pings across all opened backends.
    pub fn with_failing_pings(self, count: usize) -> Self {
        self.counters.failing_pings.store(count, Ordering::SeqCst);
        self
    }

    /// Sets the columns and rows every statement returns.
    pub fn with_result(mut self, columns: Vec<ColumnInfo>, rows: Vec<Vec<MockCell>>) -> Self {
        self.script.columns = columns;
        self.script.rows = rows;
        self
    }

    /// Ends the row stream with `error` instead of an empty fetch.
    pub fn with_stream_end(mut self, error: DriverError) -> Self {
        self.script.stream_end = Some(error);
        self
    }

    /// Fails every open with `error`.
    pub fn with_open_error(mut self, error: DriverError) -> Self {
        self.script.open_error = Some(error);
        self
    }

    /// Fails every statement with `error`.
    pub fn with_execute_error(mut self, error: DriverError) -> Self {
        self.script.execute_error = Some(error);
        self
    }

    /// Delays every statement by `delay` before it returns.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.script.execute_delay = Some(delay);
        self
    }

    /// Number of backends opened so far.
    pub fn opens(&self) -> usize {
        self.open_instants().len()
    }

    /// Instants at which each backend was opened.
    pub fn open_instants(&self) -> Vec<Instant> {
        self.counters
            .opens
            .lock()
            .map(|opens| opens.clone())
            .unwrap_or_default()
    }

    /// Statements executed so far.
    pub fn statements(&self) -> Vec<String> {
        self.counters
            .statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Number of backends closed so far.
    pub fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendFactory for MockBackendFactory {
    async fn open(
        &self,
        _descriptor: &ConnectionDescriptor,
        _pool: &PoolSettings,
    ) -> std::result::Result<Box<dyn Backend>, DriverError> {
        if let Ok(mut opens) = self.counters.opens.lock() {
            opens.push(Instant::now());
        }
        if let Some(error) = &self.script.open_error {
            return Err(error.clone());
        }
        Ok(Box::new(MockBackend {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// A scripted backend.
#[derive(Debug)]
pub struct MockBackend {
    script: Script,
    counters: Arc<Counters>,
}

#[async_trait]
impl Backend for MockBackend {
    async fn ping(&self) -> std::result::Result<(), DriverError> {
        let failed = self
            .counters
            .failing_pings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DriverError::backend("connection refused"));
        }
        Ok(())
    }

    async fn execute<'a>(
        &'a self,
        sql: &'a str,
    ) -> std::result::Result<Box<dyn RowCursor + 'a>, DriverError> {
        if let Ok(mut statements) = self.counters.statements.lock() {
            statements.push(sql.to_string());
        }
        if let Some(delay) = self.script.execute_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.script.execute_error {
            return Err(error.clone());
        }
        Ok(Box::new(MockCursor {
            columns: self.script.columns.clone(),
            rows: self.script.rows.clone().into_iter(),
            stream_end: self.script.stream_end.clone(),
        }))
    }

    async fn close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockCursor {
    columns: Vec<ColumnInfo>,
    rows: std::vec::IntoIter<Vec<MockCell>>,
    stream_end: Option<DriverError>,
}

#[async_trait]
impl RowCursor for MockCursor {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn next_row(&mut self) -> std::result::Result<Option<Box<dyn RawRow>>, DriverError> {
        match self.rows.next() {
            Some(cells) => Ok(Some(Box::new(MockRow(cells)))),
            None => match &self.stream_end {
                Some(error) => Err(error.clone()),
                None => Ok(None),
            },
        }
    }
}

struct MockRow(Vec<MockCell>);

impl RawRow for MockRow {
    fn scan(
        &self,
        index: usize,
        _kind: ScanKind,
    ) -> std::result::Result<NormalizedValue, DriverError> {
        match self.0.get(index) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(DriverError::backend(message.clone())),
            None => Err(DriverError::backend(format!(
                "column index {index} out of range"
            ))),
        }
    }
}
