//! Credential storage trait.
//!
//! Persists the upstream auth/session token pair so a fresh process (or a
//! sibling instance) can reuse a live session instead of logging in again.
//! The latest row per subject is authoritative; saving replaces any older
//! rows for that subject. There is no cross-process coordination — under
//! concurrent saves the last writer wins, which is the intended convergence
//! point.

use async_trait::async_trait;

use docket_core::Credential;

use crate::StorageResult;

/// Storage trait for persisted upstream credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the persisted credential for `subject` if one exists and has
    /// not expired. Expired rows are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_valid(&self, subject: &str) -> StorageResult<Option<Credential>>;

    /// Persists `credential`, superseding any previous rows for the same
    /// subject (including expired ones).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Callers performing a
    /// login may deliberately swallow this error: a credential obtained from
    /// a successful login stays usable in memory even if it could not be
    /// durably stored.
    async fn save(&self, credential: &Credential) -> StorageResult<()>;
}
