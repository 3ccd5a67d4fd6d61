use std::{error::Error, time::Duration};
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
///
/// Every variant is transient from the caller's point of view: the previously
/// persisted snapshot stays authoritative and the request may be retried.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("storage operation `{operation}` timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a timeout error for the named repository operation.
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        StorageError::Timeout { operation, after }
    }

    /// Whether the caller may retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. } | StorageError::Timeout { .. }
        )
    }
}
