//! Storage abstraction layer for the docket case intake service.
//!
//! This crate defines the storage interfaces the rest of the system is
//! written against:
//!
//! - [`TtlCache`] — durable key/value store with expiry and hit counting
//! - [`CredentialStore`] — persisted upstream credentials
//! - [`CaseRepository`] — transactional composite-case persistence
//!
//! plus the error taxonomies ([`StorageError`], [`CaseError`]) shared by
//! every backend. PostgreSQL implementations live in `docket-db-postgres`;
//! in-memory implementations of the cache and credential store are provided
//! here for tests and database-less deployments.

pub mod cache;
pub mod cases;
pub mod credential;
pub mod error;
pub mod memory;

pub use cache::{CacheNamespace, TtlCache};
pub use cases::{CaseRepository, validate_draft};
pub use credential::CredentialStore;
pub use error::{CaseError, StorageError, StorageResult};
pub use memory::{InMemoryCredentialStore, InMemoryTtlCache};
