//! TTL cache backed by PostgreSQL.
//!
//! One [`PgTtlCache`] per namespace; the namespace picks the backing table
//! (`company_cache` or `idcard_cache`), the contract is identical. Writes
//! are `ON CONFLICT` upserts so concurrent writers can only race on which
//! payload wins last, never duplicate a key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::Duration;
use tracing::debug;

use docket_core::Clock;
use docket_storage::{CacheNamespace, StorageResult, TtlCache};

use crate::error::map_sqlx_error;

/// PostgreSQL-backed TTL cache for one namespace.
pub struct PgTtlCache {
    pool: PgPool,
    namespace: CacheNamespace,
    clock: Arc<dyn Clock>,
    sweep_sql: String,
    get_sql: String,
    put_sql: String,
    hit_count_sql: String,
}

impl PgTtlCache {
    /// Creates a cache over `pool` for the given namespace.
    #[must_use]
    pub fn new(pool: PgPool, namespace: CacheNamespace, clock: Arc<dyn Clock>) -> Self {
        let table = namespace.table();
        Self {
            pool,
            namespace,
            clock,
            sweep_sql: format!("DELETE FROM {table} WHERE expires_at <= $1"),
            get_sql: format!(
                "SELECT payload FROM {table} WHERE cache_key = $1 AND expires_at > $2"
            ),
            put_sql: format!(
                r"
                INSERT INTO {table} (cache_key, payload, created_at, expires_at, hit_count)
                VALUES ($1, $2, $3, $4, 1)
                ON CONFLICT (cache_key) DO UPDATE SET
                    payload = EXCLUDED.payload,
                    created_at = EXCLUDED.created_at,
                    expires_at = EXCLUDED.expires_at,
                    hit_count = {table}.hit_count + 1
                "
            ),
            hit_count_sql: format!("SELECT hit_count FROM {table} WHERE cache_key = $1"),
        }
    }

    /// The namespace this cache serves.
    #[must_use]
    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    /// Hit count of the entry for `key`, expired or not. For inspection in
    /// tests and maintenance tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn hit_count(&self, key: &str) -> StorageResult<Option<i64>> {
        let row: Option<(i64,)> = query_as(&self.hit_count_sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(|(count,)| count))
    }
}

#[async_trait]
impl TtlCache for PgTtlCache {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let now = self.clock.now();

        // Opportunistic sweep; removes expired rows for any key.
        let swept = query(&self.sweep_sql)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        if swept > 0 {
            debug!(table = self.namespace.table(), swept, "swept expired cache rows");
        }

        let row: Option<(Value,)> = query_as(&self.get_sql)
            .bind(key)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|(payload,)| payload))
    }

    async fn put(&self, key: &str, value: &Value, ttl: Duration) -> StorageResult<()> {
        let now = self.clock.now();
        query(&self.put_sql)
            .bind(key)
            .bind(value)
            .bind(now)
            .bind(now + ttl)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!(table = self.namespace.table(), key, "cached payload");
        Ok(())
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        let removed = query(&self.sweep_sql)
            .bind(self.clock.now())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();
        Ok(removed)
    }
}
