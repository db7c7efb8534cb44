//! TTL cache storage trait.
//!
//! A durable key/value store with per-entry expiry and a hit counter. Two
//! independent namespaces exist — company lookups and idcard lookups — with
//! identical contracts but disjoint storage.
//!
//! # Implementation Notes
//!
//! Implementations must:
//!
//! - keep at most one live entry per key (`put` is an upsert, never a
//!   duplicate insert)
//! - sweep expired entries on `get` before answering; the sweep is
//!   best-effort and may remove unrelated expired entries
//! - never return an expired entry, regardless of sweep timing

use async_trait::async_trait;
use serde_json::Value;
use time::Duration;

use crate::StorageResult;

/// The two cache namespaces. Each maps to disjoint storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Company lookup results, keyed by company name.
    Company,
    /// Idcard lookup results, keyed by id number.
    IdCard,
}

impl CacheNamespace {
    /// Backing table (or store) name for this namespace.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::Company => "company_cache",
            Self::IdCard => "idcard_cache",
        }
    }
}

/// Storage trait for a single cache namespace.
///
/// Payloads are opaque serialized values; callers own their shape.
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Returns the live entry for `key`, if any.
    ///
    /// Expired entries are swept first; an entry whose expiry has elapsed is
    /// never returned even if the sweep has not physically removed it yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Upserts `value` under `key` with a fresh expiry of now + `ttl`.
    ///
    /// On conflict the existing entry's payload is overwritten, its creation
    /// timestamp reset, its expiry recomputed, and its hit counter
    /// incremented. Duplicate rows for the same key are never created.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put(&self, key: &str, value: &Value, ttl: Duration) -> StorageResult<()>;

    /// Removes every expired entry, returning how many were deleted.
    ///
    /// `get` already does this opportunistically; this is exposed for
    /// explicit maintenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn purge_expired(&self) -> StorageResult<u64>;
}
