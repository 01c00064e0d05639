use model::wire::ProgressPacket;
use tokio::{sync::mpsc, time::Instant};
use tracing::debug;

/// Bounded side-channel for progress packets. The producing side (a query
/// engine) drops the sender when no more progress is forthcoming; the
/// consumer treats closure as a no-op.
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressPacket>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ProgressSender { tx }, rx)
}

/// Non-blocking sender wrapper: a slow consumer drops packets rather than
/// stalling query execution.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressPacket>,
}

impl ProgressSender {
    pub fn send(&self, packet: ProgressPacket) {
        if let Err(e) = self.tx.try_send(packet) {
            debug!(error = %e, "dropped progress packet for slow consumer");
        }
    }
}

/// Per-query bookkeeping for engines that emit progress. Counters only
/// grow; snapshots are safe to forward in any order.
pub struct ProgressTracker {
    query_id: String,
    started: Instant,
    rows: u64,
    bytes: u64,
}

impl ProgressTracker {
    pub fn new(query_id: impl Into<String>) -> Self {
        ProgressTracker {
            query_id: query_id.into(),
            started: Instant::now(),
            rows: 0,
            bytes: 0,
        }
    }

    pub fn record_rows(&mut self, rows: u64) {
        self.rows += rows;
    }

    pub fn record_bytes(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    pub fn snapshot(&self) -> ProgressPacket {
        ProgressPacket {
            query_id: self.query_id.clone(),
            rows: self.rows,
            bytes: self.bytes,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
