//! In-memory query execution, used by tests and as a reference
//! implementation of the cursor contract.

use crate::{
    connector::{QueryEngine, QueryExecution},
    cursor::{ColumnInfo, RowCursor},
    error::{ConnectorError, CursorError},
};
use async_trait::async_trait;
use model::{core::value::Value, query::StreamQuery, wire::ProgressPacket};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, mpsc};

/// One scripted logical result set.
#[derive(Debug, Clone)]
pub struct MemoryResultSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl MemoryResultSet {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Option<Value>>>) -> Self {
        MemoryResultSet { columns, rows }
    }
}

/// Cursor over scripted result sets, with optional per-row latency and
/// fault injection. The close flag is shared so callers can assert the
/// cursor was released.
pub struct MemoryCursor {
    sets: Vec<MemoryResultSet>,
    set_idx: usize,
    row_idx: Option<usize>,
    row_delay: Duration,
    fail_after_rows: Option<usize>,
    rows_served: usize,
    closed: Arc<AtomicBool>,
}

impl MemoryCursor {
    pub fn new(sets: Vec<MemoryResultSet>) -> Self {
        MemoryCursor {
            sets,
            set_idx: 0,
            row_idx: None,
            row_delay: Duration::ZERO,
            fail_after_rows: None,
            rows_served: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn single(set: MemoryResultSet) -> Self {
        MemoryCursor::new(vec![set])
    }

    /// Simulate a slow-arriving row stream.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = delay;
        self
    }

    /// Fail with a database error once `rows` rows have been served.
    pub fn with_failure_after(mut self, rows: usize) -> Self {
        self.fail_after_rows = Some(rows);
        self
    }

    /// Handle for asserting release after the session ends.
    pub fn close_handle(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn next_row(&mut self) -> Result<bool, CursorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CursorError::Closed);
        }
        let Some(set) = self.sets.get(self.set_idx) else {
            return Ok(false);
        };
        let next = self.row_idx.map_or(0, |i| i + 1);
        if next >= set.rows.len() {
            return Ok(false);
        }
        if !self.row_delay.is_zero() {
            tokio::time::sleep(self.row_delay).await;
        }
        if let Some(limit) = self.fail_after_rows
            && self.rows_served >= limit
        {
            return Err(CursorError::Database(
                "simulated database failure".to_string(),
            ));
        }
        self.row_idx = Some(next);
        self.rows_served += 1;
        Ok(true)
    }

    async fn next_result_set(&mut self) -> Result<bool, CursorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CursorError::Closed);
        }
        if self.set_idx + 1 < self.sets.len() {
            self.set_idx += 1;
            self.row_idx = None;
            Ok(true)
        } else {
            self.set_idx = self.sets.len();
            Ok(false)
        }
    }

    fn columns(&self) -> &[ColumnInfo] {
        self.sets
            .get(self.set_idx)
            .map_or(&[], |set| set.columns.as_slice())
    }

    fn scan_row(&self) -> Result<Vec<Option<Value>>, CursorError> {
        let set = self
            .sets
            .get(self.set_idx)
            .ok_or_else(|| CursorError::Scan("no active result set".to_string()))?;
        let idx = self
            .row_idx
            .ok_or_else(|| CursorError::Scan("no current row".to_string()))?;
        Ok(set.rows[idx].clone())
    }

    async fn close(&mut self) -> Result<(), CursorError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Query engine serving one prebuilt cursor and a scripted progress
/// stream. `start` can only be called once per instance.
pub struct MemoryQueryEngine {
    cursor: Mutex<Option<Box<dyn RowCursor>>>,
    progress: Vec<ProgressPacket>,
}

impl MemoryQueryEngine {
    pub fn new(cursor: MemoryCursor) -> Self {
        MemoryQueryEngine {
            cursor: Mutex::new(Some(Box::new(cursor))),
            progress: Vec::new(),
        }
    }

    pub fn with_progress(mut self, packets: Vec<ProgressPacket>) -> Self {
        self.progress = packets;
        self
    }
}

#[async_trait]
impl QueryEngine for MemoryQueryEngine {
    async fn start(&self, _query: &StreamQuery) -> Result<QueryExecution, ConnectorError> {
        let cursor = self
            .cursor
            .lock()
            .await
            .take()
            .ok_or_else(|| ConnectorError::Connection("query already started".to_string()))?;

        let (tx, rx) = mpsc::channel(self.progress.len().max(1));
        for packet in &self.progress {
            // Bounded to the packet count, so try_send cannot fail here.
            let _ = tx.try_send(packet.clone());
        }
        drop(tx);

        Ok(QueryExecution {
            cursor,
            progress: rx,
        })
    }
}
