//! In-memory storage backends.
//!
//! Used by tests and by deployments that run without a database. Semantics
//! match the PostgreSQL backends in `docket-db-postgres`: upsert-only cache
//! writes, best-effort expired-entry sweeps on read, last-writer-wins
//! credential saves.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;

use docket_core::{Clock, Credential};

use crate::cache::TtlCache;
use crate::credential::CredentialStore;
use crate::error::StorageResult;

#[derive(Debug, Clone)]
struct CacheSlot {
    payload: Value,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    hit_count: u64,
}

/// In-memory [`TtlCache`]. One instance per namespace.
pub struct InMemoryTtlCache {
    entries: RwLock<HashMap<String, CacheSlot>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTtlCache {
    /// Creates an empty cache driven by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Hit count of the live entry for `key`, for inspection in tests and
    /// maintenance tooling.
    pub async fn hit_count(&self, key: &str) -> Option<u64> {
        self.entries.read().await.get(key).map(|slot| slot.hit_count)
    }

    /// Creation timestamp of the live entry for `key`.
    pub async fn created_at(&self, key: &str) -> Option<OffsetDateTime> {
        self.entries.read().await.get(key).map(|slot| slot.created_at)
    }

    async fn sweep(&self, now: OffsetDateTime) -> u64 {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, slot| slot.expires_at > now);
        (before - entries.len()) as u64
    }
}

#[async_trait]
impl TtlCache for InMemoryTtlCache {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let now = self.clock.now();
        let removed = self.sweep(now).await;
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }

        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.payload.clone()))
    }

    async fn put(&self, key: &str, value: &Value, ttl: Duration) -> StorageResult<()> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let hit_count = entries.get(key).map_or(1, |slot| slot.hit_count + 1);
        entries.insert(
            key.to_string(),
            CacheSlot {
                payload: value.clone(),
                created_at: now,
                expires_at: now + ttl,
                hit_count,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        Ok(self.sweep(self.clock.now()).await)
    }
}

/// In-memory [`CredentialStore`]. Last writer per subject wins.
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCredentialStore {
    /// Creates an empty store driven by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored credentials, expired rows included.
    pub async fn len(&self) -> usize {
        self.credentials.read().await.len()
    }

    /// Whether the store holds no credentials at all.
    pub async fn is_empty(&self) -> bool {
        self.credentials.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_valid(&self, subject: &str) -> StorageResult<Option<Credential>> {
        let now = self.clock.now();
        let credentials = self.credentials.read().await;
        Ok(credentials
            .get(subject)
            .filter(|cred| cred.is_valid_at(now))
            .cloned())
    }

    async fn save(&self, credential: &Credential) -> StorageResult<()> {
        let mut credentials = self.credentials.write().await;
        credentials.insert(credential.subject.clone(), credential.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::ManualClock;
    use serde_json::json;
    use time::macros::datetime;

    fn fixture() -> (Arc<ManualClock>, InMemoryTtlCache) {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 0:00 UTC)));
        let cache = InMemoryTtlCache::new(clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn get_after_expiry_returns_absent() {
        let (clock, cache) = fixture();
        cache
            .put("Acme Co", &json!([{"name": "Acme Co"}]), Duration::days(30))
            .await
            .unwrap();
        assert!(cache.get("Acme Co").await.unwrap().is_some());

        clock.advance(Duration::days(30) + Duration::seconds(1));
        assert!(cache.get("Acme Co").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expiry_holds_regardless_of_preceding_puts() {
        let (clock, cache) = fixture();
        for _ in 0..5 {
            cache
                .put("k", &json!({"v": 1}), Duration::hours(1))
                .await
                .unwrap();
        }
        clock.advance(Duration::hours(2));
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_instead_of_duplicating() {
        let (clock, cache) = fixture();
        cache.put("k", &json!({"v": 1}), Duration::hours(1)).await.unwrap();
        let first_created = cache.created_at("k").await.unwrap();

        clock.advance(Duration::minutes(30));
        cache.put("k", &json!({"v": 2}), Duration::hours(1)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(json!({"v": 2})));
        // created_at resets and expiry extends on replace
        assert!(cache.created_at("k").await.unwrap() > first_created);
        clock.advance(Duration::minutes(45));
        assert!(cache.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn hit_count_increases_monotonically() {
        let (_clock, cache) = fixture();
        for expected in 1..=4 {
            cache.put("k", &json!({"v": 1}), Duration::hours(1)).await.unwrap();
            assert_eq!(cache.hit_count("k").await, Some(expected));
        }
    }

    #[tokio::test]
    async fn get_sweeps_unrelated_expired_entries() {
        let (clock, cache) = fixture();
        cache.put("short", &json!(1), Duration::minutes(5)).await.unwrap();
        cache.put("long", &json!(2), Duration::days(1)).await.unwrap();

        clock.advance(Duration::hours(1));
        // Reading an unrelated key still removes the expired one.
        assert_eq!(cache.get("long").await.unwrap(), Some(json!(2)));
        assert_eq!(cache.hit_count("short").await, None);
    }

    #[tokio::test]
    async fn purge_expired_reports_removed_rows() {
        let (clock, cache) = fixture();
        cache.put("a", &json!(1), Duration::minutes(1)).await.unwrap();
        cache.put("b", &json!(2), Duration::minutes(1)).await.unwrap();
        cache.put("c", &json!(3), Duration::days(1)).await.unwrap();

        clock.advance(Duration::hours(1));
        assert_eq!(cache.purge_expired().await.unwrap(), 2);
        assert_eq!(cache.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn credential_store_treats_expired_rows_as_absent() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 0:00 UTC)));
        let store = InMemoryCredentialStore::new(clock.clone());

        let cred = Credential {
            subject: "worker".into(),
            secret: "pw".into(),
            auth_key: "ak".into(),
            session_id: "sid".into(),
            expires_at: clock.now() + Duration::hours(10),
        };
        store.save(&cred).await.unwrap();
        assert_eq!(store.find_valid("worker").await.unwrap(), Some(cred));

        clock.advance(Duration::hours(11));
        assert_eq!(store.find_valid("worker").await.unwrap(), None);
        // The row itself is still there until superseded.
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn credential_save_supersedes_previous_row() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-06-01 0:00 UTC)));
        let store = InMemoryCredentialStore::new(clock.clone());

        let old = Credential {
            subject: "worker".into(),
            secret: "pw".into(),
            auth_key: "old".into(),
            session_id: "old-sid".into(),
            expires_at: clock.now() + Duration::hours(1),
        };
        let new = Credential {
            auth_key: "new".into(),
            session_id: "new-sid".into(),
            expires_at: clock.now() + Duration::hours(10),
            ..old.clone()
        };
        store.save(&old).await.unwrap();
        store.save(&new).await.unwrap();

        assert_eq!(store.len().await, 1);
        let found = store.find_valid("worker").await.unwrap().unwrap();
        assert_eq!(found.auth_key, "new");
    }
}
