//! Users and their externally validated exchange keys.

use async_trait::async_trait;
use pulse_trade_core::{
    ExchangeKeyValidation, KeyStatus, KeyValidator, ServiceError, StoreError, User, UserDirectory,
    UserId,
};
use sqlx::PgPool;

use crate::database::store_error;
use crate::models::{KeyValidationRow, UserRow};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, active, exchange, environment, credentials_ref FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn active_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, active, exchange, environment, credentials_ref
            FROM users
            WHERE active
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(User::try_from).collect()
    }
}

/// Reads key status written by the external validator. A user with no row
/// is reported as `PENDING`.
#[derive(Debug, Clone)]
pub struct KeyValidationRepository {
    pool: PgPool,
}

impl KeyValidationRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValidator for KeyValidationRepository {
    async fn validate(
        &self,
        user_id: UserId,
        exchange: &str,
    ) -> Result<ExchangeKeyValidation, ServiceError> {
        let row = sqlx::query_as::<_, KeyValidationRow>(
            r"
            SELECT user_id, exchange, status, validated_at
            FROM exchange_key_validations
            WHERE user_id = $1 AND exchange = $2
            ",
        )
        .bind(user_id)
        .bind(exchange)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServiceError::Unavailable(store_error(e).to_string()))?;

        match row {
            Some(row) => ExchangeKeyValidation::try_from(row)
                .map_err(|e| ServiceError::Serialization(e.to_string())),
            None => Ok(ExchangeKeyValidation {
                user_id,
                exchange: exchange.to_string(),
                status: KeyStatus::Pending,
                validated_at: None,
            }),
        }
    }
}
