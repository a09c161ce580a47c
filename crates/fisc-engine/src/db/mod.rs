//! # Database Persistence Layer
//!
//! Optional PostgreSQL persistence via SQLx.
//!
//! When `DATABASE_URL` is set, the engine writes configurations, documents,
//! attempts and receipts through to PostgreSQL and allocates sequence
//! numbers under a PostgreSQL advisory lock. When absent, everything lives
//! in memory (suitable for development and testing).
//!
//! Every table is written through from the in-memory stores and loaded
//! back on startup with the `load_all` functions.

pub mod attempts;
pub mod configs;
pub mod documents;
pub mod receipts;
pub mod sequences;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. \
                 Documents, receipts and sequence numbers will not survive restarts."
            );
            return Ok(None);
        }
    };
    connect(&url).await.map(Some)
}

/// Connect to `url` and apply migrations.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Convert a stored `BIGINT` to `u64`, treating negatives as corrupt.
pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|_| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("negative value {value}").into(),
    })
}

/// Convert a `u64` for a `BIGINT` column.
pub(crate) fn to_i64(value: u64, column: &str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|_| sqlx::Error::Encode(format!("{column}: {value} exceeds BIGINT").into()))
}
