//! Error types shared by all storage backends.

/// Errors that can occur inside a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to reach or stay connected to the backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// A storage-layer constraint rejected the write.
    #[error("Constraint violation: {message}")]
    Constraint {
        /// Description of the violated constraint.
        message: String,
    },

    /// An error occurred while running or completing a transaction.
    #[error("Transaction error: {message}")]
    Transaction {
        /// Description of the transaction failure.
        message: String,
    },

    /// Any other backend failure.
    #[error("Internal storage error: {message}")]
    Internal {
        /// Short diagnostic string. Never carries raw driver dumps.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Constraint` error.
    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Creates a new `Transaction` error.
    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by case repository operations.
///
/// Every variant carries a human-readable message; [`CaseError::code`]
/// exposes a stable machine-readable code for callers that need to
/// disambiguate without parsing text.
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// The submitted draft is invalid. Raised before any write.
    #[error("Validation failed: {message}")]
    Validation {
        /// What is wrong with the draft.
        message: String,
    },

    /// The receipt number is already owned by another active case.
    #[error("Receipt number \"{receipt_number}\" is already in use by an active case")]
    DuplicateReceipt {
        /// The colliding receipt number.
        receipt_number: String,
    },

    /// The targeted case does not exist or is no longer active.
    #[error("Case not found: {message}")]
    NotFound {
        /// Which lookup failed.
        message: String,
    },

    /// The storage backend failed; the transaction was rolled back.
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl CaseError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `DuplicateReceipt` error.
    #[must_use]
    pub fn duplicate_receipt(receipt_number: impl Into<String>) -> Self {
        Self::DuplicateReceipt {
            receipt_number: receipt_number.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::DuplicateReceipt { .. } => "DUPLICATE_RECEIPT_NUMBER",
            Self::NotFound { .. } => "CASE_NOT_FOUND",
            Self::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            CaseError::duplicate_receipt("R1").code(),
            "DUPLICATE_RECEIPT_NUMBER"
        );
        assert_eq!(CaseError::validation("x").code(), "VALIDATION_FAILED");
        assert_eq!(CaseError::not_found("x").code(), "CASE_NOT_FOUND");
        assert_eq!(
            CaseError::Storage(StorageError::internal("x")).code(),
            "STORAGE_FAILURE"
        );
    }

    #[test]
    fn duplicate_receipt_names_the_number() {
        let err = CaseError::duplicate_receipt("R-2025-001");
        assert!(err.to_string().contains("R-2025-001"));
    }
}
