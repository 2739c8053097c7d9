//! Error types for flagstore core.

use flagstore_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in flagstore core operations.
///
/// "Not found" and "stale write" are deliberately absent: they are normal
/// results ([`ItemDescriptor::not_found`](crate::ItemDescriptor::not_found),
/// [`UpsertOutcome::Stale`](crate::UpsertOutcome::Stale)), not failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The backing store could not be reached or failed the command.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    /// A stored value could not be parsed.
    #[error("malformed data at {location}: {message}")]
    MalformedData {
        /// Where the value was read from (`kind/key`, or a physical key).
        location: String,
        /// Description of the parse failure.
        message: String,
    },

    /// An upsert gave up after its retry policy was exhausted.
    #[error("gave up upserting {kind}/{key} after {attempts} conflicting attempts")]
    TooMuchContention {
        /// Name of the data kind.
        kind: String,
        /// Item key.
        key: String,
        /// Number of attempts that were made.
        attempts: u32,
    },

    /// The store configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed data error.
    pub fn malformed_data(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedData {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Creates a too-much-contention error.
    pub fn too_much_contention(kind: impl Into<String>, key: impl Into<String>, attempts: u32) -> Self {
        Self::TooMuchContention {
            kind: kind.into(),
            key: key.into(),
            attempts,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error is a transport-level failure.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}
