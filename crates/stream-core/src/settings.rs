use model::query::FillPolicy;
use std::time::Duration;

/// Budget for one batching invocation: a batch is returned when either
/// threshold is reached, whichever comes first. Both must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBudget {
    pub max_rows: usize,
    pub max_wait: Duration,
}

impl BatchBudget {
    pub fn new(max_rows: usize, max_wait: Duration) -> Self {
        debug_assert!(max_rows > 0, "batch budget requires max_rows > 0");
        debug_assert!(!max_wait.is_zero(), "batch budget requires max_wait > 0");
        BatchBudget { max_rows, max_wait }
    }
}

impl Default for BatchBudget {
    fn default() -> Self {
        BatchBudget {
            max_rows: 1000,
            max_wait: Duration::from_millis(50),
        }
    }
}

/// Datasource-level streaming settings.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub batch: BatchBudget,

    /// Execution timeout for a whole session. Indistinguishable from
    /// external cancellation once triggered. `None` disables it.
    pub timeout: Option<Duration>,

    /// Fill policy used when the query carries none.
    pub default_fill: Option<FillPolicy>,

    /// Depth of the frame channel; bounds how far the producer can run
    /// ahead of a slow consumer.
    pub frame_channel_capacity: usize,

    /// Depth of the progress side-channel handed to query engines.
    pub progress_channel_capacity: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            batch: BatchBudget::default(),
            timeout: None,
            default_fill: None,
            frame_channel_capacity: 10,
            progress_channel_capacity: 32,
        }
    }
}

impl DriverSettings {
    pub fn with_batch(mut self, batch: BatchBudget) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_default_fill(mut self, fill: FillPolicy) -> Self {
        self.default_fill = Some(fill);
        self
    }
}
