/// Errors reported by a key-value store or one of its batches.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The source key of a rename does not exist.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// The batch was already executed or discarded and accepts no more commands.
    #[error("batch is closed")]
    BatchClosed,

    /// The connection to the backend was lost or refused.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the command.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
