//! Error types for upstream lookups.

use docket_storage::StorageError;

/// Errors surfaced by lookup and session operations.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Login failed or no usable credential could be obtained.
    #[error("Authorization failed: {message}")]
    Unauthorized {
        /// Why authorization could not be established.
        message: String,
    },

    /// The upstream call failed: transport error, timeout, undecodable
    /// body, or a non-success envelope code.
    #[error("Upstream call failed: {message}")]
    Upstream {
        /// Short diagnostic string; never the raw response body.
        message: String,
    },

    /// The cache or credential store failed.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl LookupError {
    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Upstream` error.
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}

/// Result type alias for lookup operations.
pub type LookupResult<T> = Result<T, LookupError>;
