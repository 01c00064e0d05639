use connectors::error::{ConnectorError, ConvertError, CursorError};
use model::frame::FrameError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failures while scanning rows into a columnar batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cursor error: {source}")]
    Cursor {
        #[from]
        source: CursorError,
    },

    #[error("failed to scan row into column '{column}': {source}")]
    Scan {
        column: String,
        #[source]
        source: ConvertError,
    },

    #[error("row has {got} cells, result set has {want} columns")]
    ColumnCountMismatch { got: usize, want: usize },

    #[error("malformed batch: {source}")]
    Frame {
        #[from]
        source: FrameError,
    },
}

/// Failures while reshaping a batch for the requested format.
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Zero rows for a format that needs at least one. Checked before any
    /// other failure and treated as quiet termination, never as a hard
    /// error.
    #[error("query returned no results")]
    NoResults,

    #[error("cannot convert to wide series, input is missing a time field")]
    MissingTimeField,

    #[error("cannot convert to wide series, input has null time values")]
    NullTimeValue,

    #[error("time field '{field}' holds a non-time value")]
    InvalidTimeValue { field: String },

    #[error("malformed frame: {source}")]
    Frame {
        #[from]
        source: FrameError,
    },
}

/// Transport failure reported by the stream sender.
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("failed to serialize packet: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
}

/// Terminal outcome of a streaming session. Single-flight: the first
/// error ends the session, no batch is retried.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session cancelled")]
    Cancelled,

    /// Clean, quiet termination; not user-visible as a failure.
    #[error("query returned no results")]
    NoResults,

    #[error("downstream error: {source}")]
    Downstream {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("could not process SQL results: {source}")]
    Batch {
        #[source]
        source: BatchError,
    },

    #[error("could not reshape results: {source}")]
    Reshape {
        #[source]
        source: NormalizeError,
    },

    #[error("stream sender failed: {source}")]
    Transport {
        #[from]
        source: SenderError,
    },
}

impl SessionError {
    /// Classify a query-layer failure: cancellation-induced failures are
    /// surfaced as cancellation, everything else as a downstream error.
    pub fn downstream(source: ConnectorError, cancel: &CancellationToken) -> Self {
        if cancel.is_cancelled() {
            SessionError::Cancelled
        } else {
            SessionError::Downstream {
                source: Box::new(source),
            }
        }
    }

    pub fn is_no_results(&self) -> bool {
        matches!(self, SessionError::NoResults)
    }
}

impl From<BatchError> for SessionError {
    fn from(source: BatchError) -> Self {
        SessionError::Batch { source }
    }
}

impl From<NormalizeError> for SessionError {
    fn from(source: NormalizeError) -> Self {
        // No-results is its own session outcome, not a reshape failure.
        match source {
            NormalizeError::NoResults => SessionError::NoResults,
            other => SessionError::Reshape { source: other },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_results_maps_to_its_own_variant() {
        let err: SessionError = NormalizeError::NoResults.into();
        assert!(err.is_no_results());

        let err: SessionError = NormalizeError::MissingTimeField.into();
        assert!(matches!(err, SessionError::Reshape { .. }));
    }

    #[test]
    fn frame_errors_ride_the_batch_variant() {
        let frame_err = FrameError::MismatchedFieldLengths {
            field: "value".to_string(),
            len: 2,
            expected: 3,
        };
        let err: SessionError = BatchError::from(frame_err).into();
        assert!(matches!(
            err,
            SessionError::Batch {
                source: BatchError::Frame { .. }
            }
        ));
    }

    #[test]
    fn downstream_classification_prefers_cancellation() {
        let token = CancellationToken::new();
        let err = SessionError::downstream(
            ConnectorError::Connection("refused".to_string()),
            &token,
        );
        assert!(matches!(err, SessionError::Downstream { .. }));

        token.cancel();
        let err = SessionError::downstream(
            ConnectorError::Connection("refused".to_string()),
            &token,
        );
        assert!(matches!(err, SessionError::Cancelled));
    }
}
