//! PostgreSQL storage backend for the docket case intake service.
//!
//! Implements the `docket-storage` traits against PostgreSQL:
//!
//! - [`PgTtlCache`] — `company_cache` / `idcard_cache` tables with upsert
//!   writes and opportunistic expired-row sweeps
//! - [`PgCredentialStore`] — `login` table, latest row per subject wins
//! - [`PgCaseRepository`] — composite-case persistence in one transaction
//!
//! Schema management uses embedded sqlx migrations; see [`migrations`].

pub mod cache;
pub mod cases;
pub mod config;
pub mod credential;
pub mod error;
pub mod migrations;
pub mod pool;

pub use cache::PgTtlCache;
pub use cases::PgCaseRepository;
pub use config::PostgresConfig;
pub use credential::PgCredentialStore;
pub use error::{PostgresError, Result};
pub use pool::create_pool;

/// Re-exported connection pool type used across this crate.
pub use sqlx_postgres::PgPool;
