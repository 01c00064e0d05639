use connectors::{
    convert::{Converter, ConverterRegistry},
    cursor::RowCursor,
};
use model::frame::Frame;
use stream_core::{error::BatchError, settings::BatchBudget};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of one batching invocation.
#[derive(Debug)]
pub enum BatchOutcome {
    /// A (possibly partial) batch. More rows may remain; call again.
    Batch(Frame),
    /// The wait budget elapsed before any row arrived. Not terminal.
    TimedOut,
    /// All result sets are drained and this invocation scanned no rows.
    Exhausted,
    /// Cancellation observed mid-scan; carries whatever was scanned.
    Cancelled(Option<Frame>),
}

struct ResultSetSchema {
    fields: Vec<model::frame::field::Field>,
    converters: Vec<Converter>,
}

/// Pulls rows from a cursor under a rows/time budget, one columnar batch
/// per invocation, advancing across logical result sets between
/// invocations. The column schema is rebuilt from the first row of each
/// result set.
pub struct RowBatcher {
    cursor: Box<dyn RowCursor>,
    budget: BatchBudget,
    converters: ConverterRegistry,
    cancel: CancellationToken,
    schema: Option<ResultSetSchema>,
    closed: bool,
}

impl RowBatcher {
    pub fn new(
        cursor: Box<dyn RowCursor>,
        budget: BatchBudget,
        converters: ConverterRegistry,
        cancel: CancellationToken,
    ) -> Self {
        RowBatcher {
            cursor,
            budget,
            converters,
            cancel,
            schema: None,
            closed: false,
        }
    }

    /// Scan the next batch. Returns when the row budget is met, the wait
    /// budget elapses, the current result set ends, or cancellation is
    /// observed, whichever comes first. Never auto-advances result sets
    /// mid-batch; that happens on the next invocation.
    pub async fn next_batch(&mut self) -> Result<BatchOutcome, BatchError> {
        let deadline = tokio::time::Instant::now() + self.budget.max_wait;
        let mut frame: Option<Frame> = None;
        let mut rows = 0usize;

        loop {
            let advanced = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(rows, "cancellation observed mid-scan");
                    return Ok(BatchOutcome::Cancelled(frame));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Ok(match frame {
                        Some(f) => BatchOutcome::Batch(f),
                        None => BatchOutcome::TimedOut,
                    });
                }
                res = self.cursor.next_row() => res?,
            };

            if !advanced {
                // Current result set drained. A partial batch is returned
                // as-is; the next invocation decides whether to advance.
                if let Some(f) = frame {
                    return Ok(BatchOutcome::Batch(f));
                }
                // Capture the drained set's columns before advancing; an
                // exhausted cursor reports none, and zero-row delivery
                // still needs a schema.
                if self.schema.is_none() {
                    let (fields, converters) =
                        self.converters.make_schema(self.cursor.columns());
                    self.schema = Some(ResultSetSchema { fields, converters });
                }
                if !self.cursor.next_result_set().await? {
                    return Ok(BatchOutcome::Exhausted);
                }
                debug!("advanced to next result set");
                self.schema = None;
                continue;
            }

            if self.schema.is_none() {
                let (fields, converters) = self.converters.make_schema(self.cursor.columns());
                self.schema = Some(ResultSetSchema { fields, converters });
            }
            let Some(schema) = self.schema.as_ref() else {
                unreachable!("schema is built before scanning");
            };

            let cells = self.cursor.scan_row()?;
            if cells.len() != schema.fields.len() {
                return Err(BatchError::ColumnCountMismatch {
                    got: cells.len(),
                    want: schema.fields.len(),
                });
            }

            let batch = frame.get_or_insert_with(|| {
                Frame::new(schema.fields.iter().map(|f| f.empty_like()).collect())
            });
            for ((field, converter), cell) in batch
                .fields
                .iter_mut()
                .zip(&schema.converters)
                .zip(cells)
            {
                let converted =
                    converter
                        .convert(&field.name, cell)
                        .map_err(|source| BatchError::Scan {
                            column: field.name.clone(),
                            source,
                        })?;
                field.values.push(converted);
            }

            rows += 1;
            if rows >= self.budget.max_rows
                && let Some(f) = frame.take()
            {
                return Ok(BatchOutcome::Batch(f));
            }
        }
    }

    /// Empty frame carrying the schema of the current result set, for
    /// formats that deliver zero-row results. May have no fields when no
    /// result set was ever observed.
    pub fn empty_frame(&self) -> Frame {
        match &self.schema {
            Some(schema) => Frame::new(schema.fields.iter().map(|f| f.empty_like()).collect()),
            None => {
                let (fields, _) = self.converters.make_schema(self.cursor.columns());
                Frame::new(fields)
            }
        }
    }

    /// Release the cursor. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.cursor.close().await {
            warn!(error = %e, "failed to close cursor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{
        cursor::ColumnInfo,
        memory::{MemoryCursor, MemoryResultSet},
    };
    use model::core::value::Value;
    use std::time::Duration;

    fn int_rows(values: &[i64]) -> Vec<Vec<Option<Value>>> {
        values.iter().map(|v| vec![Some(Value::Int(*v))]).collect()
    }

    fn batcher_for(cursor: MemoryCursor, budget: BatchBudget) -> RowBatcher {
        RowBatcher::new(
            Box::new(cursor),
            budget,
            ConverterRegistry::with_defaults(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn row_budget_caps_batch_size() {
        let cursor = MemoryCursor::single(MemoryResultSet::new(
            vec![ColumnInfo::new("v", "int")],
            int_rows(&[1, 2, 3, 4, 5]),
        ));
        let mut batcher = batcher_for(
            cursor,
            BatchBudget::new(2, Duration::from_secs(5)),
        );

        let mut sizes = Vec::new();
        loop {
            match batcher.next_batch().await.unwrap() {
                BatchOutcome::Batch(f) => sizes.push(f.row_len().unwrap()),
                BatchOutcome::Exhausted => break,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn wait_budget_returns_partial_batch() {
        let cursor = MemoryCursor::single(MemoryResultSet::new(
            vec![ColumnInfo::new("v", "int")],
            int_rows(&[1, 2, 3, 4]),
        ))
        .with_row_delay(Duration::from_millis(30));
        let mut batcher = batcher_for(
            cursor,
            BatchBudget::new(1000, Duration::from_millis(100)),
        );

        let started = std::time::Instant::now();
        let outcome = batcher.next_batch().await.unwrap();
        let elapsed = started.elapsed();

        let BatchOutcome::Batch(frame) = outcome else {
            panic!("expected partial batch");
        };
        let rows = frame.row_len().unwrap();
        assert!(rows >= 1 && rows < 4, "got {rows} rows");
        // Bounded by the budget plus at most one slow row fetch.
        assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn result_sets_are_not_merged() {
        let columns = vec![ColumnInfo::new("v", "int")];
        let cursor = MemoryCursor::new(vec![
            MemoryResultSet::new(columns.clone(), int_rows(&[1, 2, 3, 4, 5])),
            MemoryResultSet::new(columns, int_rows(&[6, 7, 8])),
        ]);
        let mut batcher = batcher_for(
            cursor,
            BatchBudget::new(100, Duration::from_secs(5)),
        );

        let BatchOutcome::Batch(first) = batcher.next_batch().await.unwrap() else {
            panic!("expected first batch");
        };
        assert_eq!(first.row_len().unwrap(), 5);

        let BatchOutcome::Batch(second) = batcher.next_batch().await.unwrap() else {
            panic!("expected second batch");
        };
        assert_eq!(second.row_len().unwrap(), 3);

        assert!(matches!(
            batcher.next_batch().await.unwrap(),
            BatchOutcome::Exhausted
        ));
    }

    #[tokio::test]
    async fn empty_cursor_is_exhausted_not_an_error() {
        let cursor = MemoryCursor::single(MemoryResultSet::new(
            vec![ColumnInfo::new("v", "int")],
            Vec::new(),
        ));
        let mut batcher = batcher_for(cursor, BatchBudget::default());
        assert!(matches!(
            batcher.next_batch().await.unwrap(),
            BatchOutcome::Exhausted
        ));
        // Schema is still recoverable for zero-row delivery, even though
        // the cursor itself is past its last result set.
        let empty = batcher.empty_frame();
        assert_eq!(empty.fields.len(), 1);
        assert_eq!(empty.fields[0].name, "v");
        assert_eq!(empty.row_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_slow_fetch() {
        let cursor = MemoryCursor::single(MemoryResultSet::new(
            vec![ColumnInfo::new("v", "int")],
            int_rows(&[1, 2, 3]),
        ))
        .with_row_delay(Duration::from_millis(200));

        let cancel = CancellationToken::new();
        let mut batcher = RowBatcher::new(
            Box::new(cursor),
            BatchBudget::new(1000, Duration::from_secs(10)),
            ConverterRegistry::with_defaults(),
            cancel.clone(),
        );

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            canceller.cancel();
        });

        match batcher.next_batch().await.unwrap() {
            BatchOutcome::Cancelled(partial) => {
                let rows = partial.map_or(0, |f| f.row_len().unwrap());
                assert!(rows <= 1, "got {rows} rows");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cursor_failure_propagates() {
        let cursor = MemoryCursor::single(MemoryResultSet::new(
            vec![ColumnInfo::new("v", "int")],
            int_rows(&[1, 2, 3]),
        ))
        .with_failure_after(2);
        let mut batcher = batcher_for(cursor, BatchBudget::default());
        assert!(matches!(
            batcher.next_batch().await,
            Err(BatchError::Cursor { .. })
        ));
    }
}
