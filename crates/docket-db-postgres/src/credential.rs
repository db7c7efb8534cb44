//! Credential storage backed by PostgreSQL.
//!
//! Saves are delete-then-insert in one transaction so the latest row per
//! subject is the only one left; expired rows for the subject disappear at
//! the same time. Reads only ever return a non-expired credential.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use tracing::debug;

use docket_core::{Clock, Credential};
use docket_storage::{CredentialStore, StorageResult};

use crate::error::map_sqlx_error;

/// PostgreSQL-backed [`CredentialStore`] over the `login` table.
pub struct PgCredentialStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgCredentialStore {
    /// Creates a store over `pool`.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_valid(&self, subject: &str) -> StorageResult<Option<Credential>> {
        let row: Option<(String, String, String, String, OffsetDateTime)> = query_as(
            r"
            SELECT subject, secret, auth_key, session_id, expires_at
            FROM login
            WHERE subject = $1 AND expires_at > $2
            ORDER BY expires_at DESC
            LIMIT 1
            ",
        )
        .bind(subject)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(
            |(subject, secret, auth_key, session_id, expires_at)| Credential {
                subject,
                secret,
                auth_key,
                session_id,
                expires_at,
            },
        ))
    }

    async fn save(&self, credential: &Credential) -> StorageResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        query("DELETE FROM login WHERE subject = $1")
            .bind(&credential.subject)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        query(
            r"
            INSERT INTO login (subject, secret, auth_key, session_id, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&credential.subject)
        .bind(&credential.secret)
        .bind(&credential.auth_key)
        .bind(&credential.session_id)
        .bind(credential.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(subject = %credential.subject, "persisted credential");
        Ok(())
    }
}
