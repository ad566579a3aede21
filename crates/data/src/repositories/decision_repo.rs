//! Decision log repository.
//!
//! Rows are inserted as `PENDING` by `claim` and completed exactly once to
//! `DECIDED`. A `PENDING` row whose cycle failed is deleted by `release`.
//! A `PENDING` row older than the claim timeout belongs to a cycle that never
//! finished and is taken over by the next claim.

use async_trait::async_trait;
use pulse_trade_core::{Claim, DecisionLog, DirectionDecision, StoreError, TradingSignal};
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Duration;

use crate::database::store_error;
use crate::DEFAULT_CLAIM_TIMEOUT;

#[derive(Debug, Clone)]
pub struct DecisionRepository {
    pool: PgPool,
    claim_timeout: Duration,
}

impl DecisionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    /// Most recent decisions, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<DirectionDecision>, StoreError> {
        let rows: Vec<(Json<DirectionDecision>,)> = sqlx::query_as(
            r"
            SELECT decision
            FROM decision_log
            WHERE status = 'DECIDED'
            ORDER BY decided_at DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(|(d,)| d.0).collect())
    }
}

#[async_trait]
impl DecisionLog for DecisionRepository {
    async fn claim(&self, correlation_id: &str) -> Result<Claim, StoreError> {
        // Inserts a fresh claim, or refreshes a PENDING one past its timeout
        let inserted = sqlx::query(
            r"
            INSERT INTO decision_log (correlation_id, status, claimed_at)
            VALUES ($1, 'PENDING', now())
            ON CONFLICT (correlation_id) DO UPDATE
                SET claimed_at = now()
                WHERE decision_log.status = 'PENDING'
                  AND decision_log.claimed_at < now() - make_interval(secs => $2)
            ",
        )
        .bind(correlation_id)
        .bind(self.claim_timeout.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if inserted.rows_affected() == 1 {
            return Ok(Claim::Claimed);
        }

        let existing: Option<(String, Option<Json<DirectionDecision>>)> = sqlx::query_as(
            "SELECT status, decision FROM decision_log WHERE correlation_id = $1",
        )
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(match existing {
            Some((_, Some(decision))) => Claim::Existing(Box::new(decision.0)),
            Some((_, None)) => Claim::InFlight,
            // Released between our insert and select
            None => Claim::InFlight,
        })
    }

    async fn complete(
        &self,
        signal: &TradingSignal,
        decision: &DirectionDecision,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r"
            UPDATE decision_log
            SET status = 'DECIDED', decision_id = $2, symbol = $3, direction = $4,
                confidence = $5, decided_by = $6, reasoning = $7, signal = $8,
                decision = $9, decided_at = $10
            WHERE correlation_id = $1 AND status = 'PENDING'
            ",
        )
        .bind(decision.correlation_id())
        .bind(decision.id())
        .bind(decision.symbol())
        .bind(decision.direction().as_str())
        .bind(decision.confidence())
        .bind(decision.decided_by().as_str())
        .bind(decision.reasoning())
        .bind(Json(signal))
        .bind(Json(decision))
        .bind(decision.decided_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "no pending claim for {}",
                decision.correlation_id()
            )));
        }
        Ok(())
    }

    async fn release(&self, correlation_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM decision_log WHERE correlation_id = $1 AND status = 'PENDING'")
            .bind(correlation_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, correlation_id: &str) -> Result<Option<DirectionDecision>, StoreError> {
        let row: Option<(Option<Json<DirectionDecision>>,)> =
            sqlx::query_as("SELECT decision FROM decision_log WHERE correlation_id = $1")
                .bind(correlation_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

        Ok(row.and_then(|(d,)| d).map(|d| d.0))
    }
}
