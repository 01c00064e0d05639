use crate::{
    batcher::{BatchOutcome, RowBatcher},
    normalize::normalize,
};
use connectors::{convert::ConverterRegistry, cursor::RowCursor};
use model::{
    frame::Frame,
    query::{FillPolicy, StreamQuery},
};
use stream_core::{
    error::{BatchError, SessionError},
    metrics::Metrics,
    settings::BatchBudget,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receive-only ends of a streaming session. Both channels are closed
/// exactly once, by the producer, when it terminates for any reason.
pub struct SessionChannels {
    pub frames: mpsc::Receiver<Frame>,
    pub errors: mpsc::Receiver<SessionError>,
}

/// Spawn the producer task: a scan/normalize/publish loop over the cursor
/// on a dedicated execution context. The cursor is owned by the task and
/// released on every exit path.
#[allow(clippy::too_many_arguments)]
pub fn start_session(
    cursor: Box<dyn RowCursor>,
    budget: BatchBudget,
    converters: ConverterRegistry,
    query: StreamQuery,
    fill: Option<FillPolicy>,
    cancel: CancellationToken,
    metrics: Metrics,
    frame_capacity: usize,
) -> SessionChannels {
    let (frame_tx, frame_rx) = mpsc::channel(frame_capacity);
    let (err_tx, err_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut batcher = RowBatcher::new(cursor, budget, converters, cancel.clone());
        let result = drive(&mut batcher, &frame_tx, &query, fill, &cancel, &metrics).await;

        // Single release point for the cursor, regardless of how the
        // loop ended.
        batcher.close().await;

        match result {
            Ok(()) => {
                debug!(ref_id = %query.ref_id, "streaming session finished");
            }
            Err(SessionError::Cancelled) => {
                // Cancellation publishes nothing; the consumer observes
                // its own token.
                info!(ref_id = %query.ref_id, "streaming session cancelled");
            }
            Err(e) => {
                // No-results rides the error channel but is not a failure.
                if !e.is_no_results() {
                    metrics.increment_failures(1);
                }
                if err_tx.send(e).await.is_err() {
                    warn!(ref_id = %query.ref_id, "consumer gone before error delivery");
                }
            }
        }
        // Dropping the senders closes both channels exactly once.
    });

    SessionChannels {
        frames: frame_rx,
        errors: err_rx,
    }
}

async fn drive(
    batcher: &mut RowBatcher,
    frame_tx: &mpsc::Sender<Frame>,
    query: &StreamQuery,
    fill: Option<FillPolicy>,
    cancel: &CancellationToken,
    metrics: &Metrics,
) -> Result<(), SessionError> {
    let mut published = 0u64;

    loop {
        match batcher.next_batch().await? {
            BatchOutcome::TimedOut => continue,
            BatchOutcome::Cancelled(_) => return Err(SessionError::Cancelled),
            BatchOutcome::Exhausted => {
                if published == 0 {
                    // Zero rows over the whole session: series formats
                    // report no-results, tabular formats still deliver
                    // one empty schema frame.
                    let frames = normalize(batcher.empty_frame(), query, fill)?;
                    publish(frames, frame_tx, cancel, metrics, &mut published).await?;
                }
                return Ok(());
            }
            BatchOutcome::Batch(frame) => {
                if frame.is_empty() {
                    continue;
                }
                metrics.increment_rows(frame.row_len().map_err(BatchError::from)? as u64);
                metrics.increment_bytes(frame.size_bytes() as u64);

                let frames = normalize(frame, query, fill)?;
                publish(frames, frame_tx, cancel, metrics, &mut published).await?;
            }
        }
    }
}

/// Push deliverable frames onto the bounded channel. Blocks when the
/// consumer is slow, which throttles the cursor scan rate; cancellation
/// aborts an in-flight send.
async fn publish(
    frames: Vec<Frame>,
    frame_tx: &mpsc::Sender<Frame>,
    cancel: &CancellationToken,
    metrics: &Metrics,
    published: &mut u64,
) -> Result<(), SessionError> {
    for frame in frames {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            sent = frame_tx.send(frame) => {
                if sent.is_err() {
                    // Consumer hung up; nothing left to do.
                    debug!("frame channel closed by consumer");
                    return Err(SessionError::Cancelled);
                }
            }
        }
        *published += 1;
        metrics.increment_frames(1);
    }
    Ok(())
}
