use crate::{cursor::RowCursor, error::ConnectorError};
use async_trait::async_trait;
use model::{query::StreamQuery, wire::ProgressPacket};
use tokio::sync::mpsc;

/// A running query: the result cursor plus the progress side-channel. The
/// progress stream is fed by the engine during execution and closed when
/// no more progress is forthcoming; it has no ordering relationship to
/// row delivery.
pub struct QueryExecution {
    pub cursor: Box<dyn RowCursor>,
    pub progress: mpsc::Receiver<ProgressPacket>,
}

/// Query execution layer. Implementations own connection resolution,
/// driver selection, and SQL interpolation; the streaming core only needs
/// a live cursor and the progress stream back.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn start(&self, query: &StreamQuery) -> Result<QueryExecution, ConnectorError>;
}

/// Resolves a live, cursor-yielding handle for a query. The raw execution
/// handle is a typed capability of the trait; implementations must never
/// require callers to dig it out of a wrapper.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: QueryHandle;

    async fn connect(&self, query: &StreamQuery) -> Result<Self::Handle, ConnectorError>;
}

/// A live database handle capable of executing SQL into a row cursor.
#[async_trait]
pub trait QueryHandle: Send {
    async fn query(&mut self, sql: &str) -> Result<Box<dyn RowCursor>, ConnectorError>;
}
