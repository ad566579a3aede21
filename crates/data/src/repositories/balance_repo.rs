//! Balance accounts and their ledger.

use async_trait::async_trait;
use pulse_trade_core::{BalanceAccount, BalanceStore, LedgerEntry, StoreError, UserId};
use sqlx::PgPool;

use crate::database::store_error;
use crate::models::BalanceRow;

#[derive(Debug, Clone)]
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceStore for BalanceRepository {
    async fn load(&self, user_id: UserId) -> Result<Option<BalanceAccount>, StoreError> {
        let row = sqlx::query_as::<_, BalanceRow>(
            r"
            SELECT user_id, real_brl, real_usd, admin_brl, admin_usd,
                   commission_brl, commission_usd, updated_at
            FROM balance_accounts
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(BalanceAccount::from))
    }

    async fn commit(
        &self,
        account: &BalanceAccount,
        entries: &[LedgerEntry],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query(
            r"
            INSERT INTO balance_accounts
                (user_id, real_brl, real_usd, admin_brl, admin_usd,
                 commission_brl, commission_usd, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id) DO UPDATE SET
                real_brl = excluded.real_brl,
                real_usd = excluded.real_usd,
                admin_brl = excluded.admin_brl,
                admin_usd = excluded.admin_usd,
                commission_brl = excluded.commission_brl,
                commission_usd = excluded.commission_usd,
                updated_at = excluded.updated_at
            ",
        )
        .bind(account.user_id)
        .bind(account.real_brl)
        .bind(account.real_usd)
        .bind(account.admin_brl)
        .bind(account.admin_usd)
        .bind(account.commission_brl)
        .bind(account.commission_usd)
        .bind(account.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO balance_ledger
                    (user_id, balance_type, op, amount, before_amount, after_amount,
                     reference, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(entry.user_id)
            .bind(entry.balance_type.as_str())
            .bind(entry.op.as_str())
            .bind(entry.amount)
            .bind(entry.before)
            .bind(entry.after)
            .bind(&entry.reference)
            .bind(entry.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        Ok(())
    }
}
