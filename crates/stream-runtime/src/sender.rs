use async_trait::async_trait;
use model::frame::Frame;
use stream_core::error::SenderError;

/// What of a frame to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameInclusion {
    /// Schema and data.
    #[default]
    All,
    /// Data only; the client already holds the schema.
    DataOnly,
}

/// Transport capability for delivering results to the client. Calls are
/// synchronous from the session's point of view and report transport
/// failures as errors; any failure aborts the session.
#[async_trait]
pub trait StreamSender: Send + Sync {
    async fn send_frame(&self, frame: &Frame, inclusion: FrameInclusion)
    -> Result<(), SenderError>;

    /// Deliver a pre-serialized out-of-band JSON message.
    async fn send_json(&self, payload: &[u8]) -> Result<(), SenderError>;
}
