#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use connectors::{
    convert::ConverterRegistry,
    cursor::ColumnInfo,
    memory::{MemoryCursor, MemoryQueryEngine},
};
use model::{core::value::Value, frame::Frame, query::StreamQuery, wire::ProgressPacket};
use std::sync::Mutex;
use stream_core::{
    error::{SenderError, SessionError},
    settings::DriverSettings,
};
use stream_runtime::{
    sender::{FrameInclusion, StreamSender},
    session::StreamSession,
};
use tokio_util::sync::CancellationToken;

/// Stream sender that records everything it is asked to deliver, with
/// optional transport fault injection.
pub struct CollectingSender {
    frames: Mutex<Vec<Frame>>,
    json: Mutex<Vec<serde_json::Value>>,
    fail_after_frames: Option<usize>,
}

impl CollectingSender {
    pub fn new() -> Self {
        CollectingSender {
            frames: Mutex::new(Vec::new()),
            json: Mutex::new(Vec::new()),
            fail_after_frames: None,
        }
    }

    /// Reject frame delivery once `count` frames have been accepted.
    pub fn failing_after_frames(count: usize) -> Self {
        CollectingSender {
            fail_after_frames: Some(count),
            ..CollectingSender::new()
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().expect("sender lock").clone()
    }

    pub fn json(&self) -> Vec<serde_json::Value> {
        self.json.lock().expect("sender lock").clone()
    }

    /// Number of end-of-stream markers delivered. Always exactly one for
    /// a well-behaved session.
    pub fn completion_count(&self) -> usize {
        self.json()
            .iter()
            .filter(|v| v.get("completed") == Some(&serde_json::Value::Bool(true)))
            .count()
    }

    pub fn progress_packets(&self) -> Vec<ProgressPacket> {
        self.json()
            .into_iter()
            .filter(|v| v.get("query_id").is_some())
            .map(|v| serde_json::from_value(v).expect("progress packet shape"))
            .collect()
    }
}

impl Default for CollectingSender {
    fn default() -> Self {
        CollectingSender::new()
    }
}

#[async_trait]
impl StreamSender for CollectingSender {
    async fn send_frame(
        &self,
        frame: &Frame,
        _inclusion: FrameInclusion,
    ) -> Result<(), SenderError> {
        let mut frames = self.frames.lock().expect("sender lock");
        if let Some(limit) = self.fail_after_frames
            && frames.len() >= limit
        {
            return Err(SenderError::Transport(
                "simulated transport failure".to_string(),
            ));
        }
        frames.push(frame.clone());
        Ok(())
    }

    async fn send_json(&self, payload: &[u8]) -> Result<(), SenderError> {
        let value = serde_json::from_slice(payload)?;
        self.json.lock().expect("sender lock").push(value);
        Ok(())
    }
}

pub fn time_cell(secs: i64) -> Option<Value> {
    Some(Value::Time(Utc.timestamp_opt(secs, 0).unwrap()))
}

pub fn int_columns() -> Vec<ColumnInfo> {
    vec![ColumnInfo::new("v", "bigint")]
}

pub fn int_rows(values: &[i64]) -> Vec<Vec<Option<Value>>> {
    values.iter().map(|v| vec![Some(Value::Int(*v))]).collect()
}

/// Long-form metric columns: (time, host, value).
pub fn metric_columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::new("time", "timestamp"),
        ColumnInfo::new("host", "varchar"),
        ColumnInfo::new("value", "float64"),
    ]
}

pub fn metric_rows(points: &[(i64, &str, f64)]) -> Vec<Vec<Option<Value>>> {
    points
        .iter()
        .map(|(secs, host, value)| {
            vec![
                time_cell(*secs),
                Some(Value::String(host.to_string())),
                Some(Value::Float(*value)),
            ]
        })
        .collect()
}

/// Run a full session over an in-memory cursor, collecting everything the
/// sender sees.
pub async fn run_collected(
    cursor: MemoryCursor,
    query: StreamQuery,
    settings: DriverSettings,
) -> (Result<(), SessionError>, CollectingSender) {
    let engine = MemoryQueryEngine::new(cursor);
    let sender = CollectingSender::new();
    let session = StreamSession::new(settings, ConverterRegistry::with_defaults());
    let result = session
        .run(&engine, &sender, query, CancellationToken::new())
        .await;
    (result, sender)
}
