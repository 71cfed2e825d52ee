//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure, tagged with the operation that issued it.
    #[error("{op} failed: {source}")]
    Query {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A JSON column could not be decoded.
    #[error("corrupt {column} in {table} row {id}: {source}")]
    Corrupt {
        table: &'static str,
        column: &'static str,
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization of a JSON column failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attach an operation name to rusqlite results.
pub(crate) trait QueryContext<T> {
    fn op(self, op: &'static str) -> StoreResult<T>;
}

impl<T> QueryContext<T> for Result<T, rusqlite::Error> {
    fn op(self, op: &'static str) -> StoreResult<T> {
        self.map_err(|source| StoreError::Query { op, source })
    }
}
