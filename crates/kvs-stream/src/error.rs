use std::fmt;
use std::sync::Arc;

use kvs_store::StoreError;

use crate::state::SessionState;

/// The store call a failure originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// `set(staging, "")` issued when the session opens.
    Truncate,
    /// `append(staging, chunk)`.
    Append,
    /// `rename(staging, public)` executed directly against the store.
    Rename,
    /// `rename(staging, public)` enqueued into a caller batch.
    EnqueueRename,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::Truncate => "truncate",
            StoreOp::Append => "append",
            StoreOp::Rename => "rename",
            StoreOp::EnqueueRename => "enqueue rename",
        };
        f.write_str(name)
    }
}

/// Errors from an append-stream session.
///
/// `Clone` so that a failure can be both returned to the producer and
/// broadcast to event subscribers.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StreamError {
    /// Construction-time misuse or an unencodable chunk.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying store call failed.
    #[error("{op} of `{key}` failed: {source}")]
    StoreOperationFailed {
        op: StoreOp,
        key: String,
        #[source]
        source: StoreError,
    },

    /// The session is closed, errored, or already finishing.
    #[error("operation rejected: session is {state}")]
    InvalidState { state: SessionState },

    /// The producer abandoned the session.
    #[error("session aborted: {0}")]
    Aborted(String),

    /// Invalid writer configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading from a source stream failed.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl StreamError {
    pub(crate) fn store(op: StoreOp, key: &str, source: StoreError) -> Self {
        StreamError::StoreOperationFailed {
            op,
            key: key.to_string(),
            source,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(Arc::new(err))
    }
}

/// Result alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failure_message_names_op_and_key() {
        let err = StreamError::store(
            StoreOp::Append,
            "foo.tmp",
            StoreError::Connection("reset".into()),
        );
        assert_eq!(
            err.to_string(),
            "append of `foo.tmp` failed: connection error: reset"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn invalid_state_message() {
        let err = StreamError::InvalidState {
            state: SessionState::Closed,
        };
        assert_eq!(err.to_string(), "operation rejected: session is closed");
    }

    #[test]
    fn io_errors_convert() {
        let err: StreamError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, StreamError::Io(_)));
        assert!(err.to_string().contains("disk gone"));
    }
}
