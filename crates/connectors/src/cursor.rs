use crate::error::CursorError;
use async_trait::async_trait;
use model::core::value::Value;

/// Metadata for one column of the current result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Driver-native type name, matched against the converter registry.
    pub native_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        ColumnInfo {
            name: name.into(),
            native_type: native_type.into(),
        }
    }
}

/// Forward-only handle over one or more logical result sets of a running
/// query. Owned exclusively by the batching side for the duration of one
/// streaming session; must be closed on every exit path.
#[async_trait]
pub trait RowCursor: Send {
    /// Advance to the next row of the current result set. `Ok(false)`
    /// means the current result set is drained, not that the cursor is
    /// exhausted; callers decide when to advance result sets.
    ///
    /// Must be cancel-safe: the caller races this future against a wait
    /// budget and a cancellation token, so it may be dropped before
    /// completion. A dropped call must not consume a row.
    async fn next_row(&mut self) -> Result<bool, CursorError>;

    /// Advance to the next logical result set. `Ok(false)` means no
    /// result sets remain.
    async fn next_result_set(&mut self) -> Result<bool, CursorError>;

    /// Columns of the current result set. May be consulted before the
    /// first row to build a schema for empty results.
    fn columns(&self) -> &[ColumnInfo];

    /// Copy the current row's cells in column order. Only valid after
    /// `next_row` returned `Ok(true)`.
    fn scan_row(&self) -> Result<Vec<Option<Value>>, CursorError>;

    /// Release the cursor. Idempotent; called exactly once per session on
    /// every exit path.
    async fn close(&mut self) -> Result<(), CursorError>;
}
