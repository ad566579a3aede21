use anyhow::{Context, Result};
use pulse_trade_core::{DatabaseConfig, StoreError};
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Connects to `PostgreSQL` and applies pending migrations.
///
/// # Errors
/// Returns an error if the connection cannot be established or a migration fails.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .context("connecting to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running migrations")?;

    tracing::info!("Database ready ({} max connections)", config.max_connections);
    Ok(pool)
}

/// Classifies a driver error. Connectivity problems are fatal.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::Conflict(err.to_string())
        }
        sqlx::Error::Database(ref db) if db.is_check_violation() => {
            StoreError::Conflict(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}

pub(crate) fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {detail}"))
}
