//! Error types for connection operations.

use std::io;
use thiserror::Error;

/// Result type for connection operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the backing store.
///
/// Every variant is a transport-level failure. "Key does not exist" is never
/// an error at this layer; reads return `Option` instead.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store could not be reached or rejected the command.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store replied with something the client did not expect
    /// (for example, a hash command against a string key).
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The pool has been closed.
    #[error("connection pool is closed")]
    Closed,
}

impl StorageError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates an unexpected reply error.
    pub fn unexpected_reply(message: impl Into<String>) -> Self {
        Self::UnexpectedReply(message.into())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::Connection(err.to_string())
        } else {
            Self::UnexpectedReply(err.to_string())
        }
    }
}
