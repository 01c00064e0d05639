use thiserror::Error;

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("database error: {0}")]
    Database(String),

    #[error("failed to scan row: {0}")]
    Scan(String),

    #[error("cursor is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("column '{column}': cannot convert {found} value to {expected}")]
    TypeMismatch {
        column: String,
        found: &'static str,
        expected: &'static str,
    },

    #[error("column '{column}' is not nullable but the row carries a null")]
    UnexpectedNull { column: String },
}

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("failed to resolve connection: {0}")]
    Connection(String),

    #[error("query execution failed: {source}")]
    Query {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
