//! Order execution audit log.

use async_trait::async_trait;
use pulse_trade_core::{AuditLog, OrderExecutionRecord, StoreError};
use sqlx::PgPool;

use crate::database::store_error;

#[derive(Debug, Clone)]
pub struct ExecutionRepository {
    pool: PgPool,
}

impl ExecutionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of records written for a signal.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count_for_signal(&self, correlation_id: &str) -> Result<i64, StoreError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM order_executions WHERE correlation_id = $1")
                .bind(correlation_id)
                .fetch_one(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(row.0)
    }
}

#[async_trait]
impl AuditLog for ExecutionRepository {
    async fn record_execution(&self, record: &OrderExecutionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO order_executions
                (id, correlation_id, decision_id, user_id, symbol, side, quantity, price,
                 exchange, environment, status, exchange_order_id, attempts, latency_ms,
                 error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ",
        )
        .bind(record.id)
        .bind(&record.correlation_id)
        .bind(record.decision_id)
        .bind(record.user_id)
        .bind(&record.symbol)
        .bind(record.side.as_str())
        .bind(record.quantity)
        .bind(record.price)
        .bind(&record.exchange)
        .bind(record.environment.as_str())
        .bind(record.status.as_str())
        .bind(&record.exchange_order_id)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(i64::try_from(record.latency_ms).unwrap_or(i64::MAX))
        .bind(&record.error)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}
