//! Embedded schema migrations.
//!
//! Migration SQL is compiled into the binary with `include_str!`, so no
//! filesystem or CLI access is needed at runtime. Applied versions are
//! tracked in `_sqlx_migrations` and run in order inside transactions.

use sqlx_core::migrate::{Migration, MigrationType};
use sqlx_postgres::PgPool;
use std::borrow::Cow;
use tracing::{info, instrument};

use crate::error::Result;

/// The full migration list, in version order. New migrations get a SQL file
/// under `migrations/` and an entry here.
macro_rules! embedded_migrations {
    () => {
        &[(
            20250801000001i64,
            "initial_schema",
            include_str!("../../migrations/20250801000001_initial_schema.sql"),
        )]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            // Embedded migrations carry no checksum.
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Applies all pending migrations to the database behind `pool`.
///
/// # Errors
///
/// Returns [`crate::error::PostgresError::Migration`] when a migration fails
/// to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "running embedded migrations");

    let migrator = sqlx_core::migrate::Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| crate::error::PostgresError::Migration(format!("migration failed: {e}")))?;

    info!("database migrations completed");
    Ok(())
}
