//! Multi-user fan-out executor.
//!
//! Turns one directional decision into an independent order attempt per
//! active user. Users are processed concurrently up to `max_concurrency`;
//! a failure for one user is recorded in the report and never stops the
//! others. Only an unreachable store aborts the batch.

use chrono::Utc;
use futures_util::future::join_all;
use pulse_trade_core::{
    calculate_order_quantity, AuditLog, DirectionDecision, ExchangeClient, ExecutionStatus,
    ExecutorConfig, KeyValidator, OrderExecutionRecord, OrderRequest, OrderSide, ServiceError,
    SizingParams, StoreError, TradingSignal, User, UserDirectory,
};
use pulse_trade_ledger::{BalanceError, BalanceManager};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::locks::ExecutionLocks;
use crate::report::{BatchReport, OutcomeStatus, SkipReason, UserOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// A NEUTRAL decision reached the executor. Internal invariant breach.
    #[error("NEUTRAL decision {correlation_id} must not be executed")]
    NeutralDecision { correlation_id: String },

    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),

    /// A store became unreachable mid-batch. `partial` holds the outcomes of
    /// every user that finished before or alongside the failure.
    #[error("batch aborted after {} outcomes: {source}", partial.outcomes.len())]
    Aborted {
        source: StoreError,
        partial: Box<BatchReport>,
    },

    #[error("executor is shut down")]
    Closed,
}

impl ExecutorError {
    /// Outcomes recorded before the batch aborted, if any were.
    #[must_use]
    pub fn partial_report(&self) -> Option<&BatchReport> {
        match self {
            Self::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Collaborators the executor is wired to.
pub struct ExecutorDeps {
    pub users: Arc<dyn UserDirectory>,
    pub keys: Arc<dyn KeyValidator>,
    pub balances: Arc<BalanceManager>,
    pub exchange: Arc<dyn ExchangeClient>,
    pub audit: Arc<dyn AuditLog>,
}

pub struct FanoutExecutor {
    deps: ExecutorDeps,
    config: ExecutorConfig,
    sizing: SizingParams,
    locks: ExecutionLocks,
    permits: Semaphore,
}

/// Per-batch values shared by every user's attempt.
struct BatchContext<'a> {
    decision: &'a DirectionDecision,
    signal: &'a TradingSignal,
    side: OrderSide,
}

impl FanoutExecutor {
    #[must_use]
    pub fn new(deps: ExecutorDeps, config: ExecutorConfig) -> Self {
        let sizing = config.sizing();
        let permits = Semaphore::new(config.max_concurrency.max(1));
        Self {
            deps,
            config,
            sizing,
            locks: ExecutionLocks::new(),
            permits,
        }
    }

    #[must_use]
    pub const fn locks(&self) -> &ExecutionLocks {
        &self.locks
    }

    /// Executes a directional decision for every active user.
    ///
    /// # Errors
    /// - `NeutralDecision` if `decision` is NEUTRAL (nothing is attempted)
    /// - `Store` if the user directory cannot be read
    /// - `Aborted` if the balance store or audit log becomes unreachable
    ///   mid-batch; the error carries the outcomes gathered so far
    pub async fn execute(
        &self,
        decision: &DirectionDecision,
        signal: &TradingSignal,
    ) -> Result<BatchReport, ExecutorError> {
        let Some(side) = decision.direction().order_side() else {
            tracing::error!(
                "Refusing to execute NEUTRAL decision {}",
                decision.correlation_id()
            );
            return Err(ExecutorError::NeutralDecision {
                correlation_id: decision.correlation_id().to_string(),
            });
        };

        let started_at = Utc::now();
        let users = self.deps.users.active_users().await?;
        tracing::info!(
            "Fanning out {} {} for {} to {} users (max {} concurrent)",
            decision.direction(),
            decision.symbol(),
            decision.correlation_id(),
            users.len(),
            self.config.max_concurrency
        );

        let ctx = BatchContext {
            decision,
            signal,
            side,
        };
        let results = join_all(users.iter().map(|user| self.process_user(user, &ctx))).await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut fatal = None;
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    fatal.get_or_insert(e);
                }
            }
        }
        let report = BatchReport::new(
            decision.correlation_id(),
            decision.symbol(),
            decision.direction(),
            outcomes,
            started_at,
        );
        if let Some(e) = fatal {
            tracing::error!(
                "Batch {} aborted: {} ({})",
                decision.correlation_id(),
                e,
                report.summary()
            );
            let source = match e {
                ExecutorError::Store(source) | ExecutorError::Aborted { source, .. } => source,
                other => return Err(other),
            };
            return Err(ExecutorError::Aborted {
                source,
                partial: Box::new(report),
            });
        }
        tracing::info!("Batch complete: {}", report.summary());
        Ok(report)
    }

    async fn process_user(
        &self,
        user: &User,
        ctx: &BatchContext<'_>,
    ) -> Result<UserOutcome, ExecutorError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ExecutorError::Closed)?;

        // 1. Credentials
        match self.deps.keys.validate(user.id, &user.exchange).await {
            Ok(validation) if validation.is_valid() => {}
            Ok(validation) => {
                tracing::info!(
                    "Skipping user {}: {} key is {}",
                    user.id,
                    user.exchange,
                    validation.status.as_str()
                );
                return Ok(UserOutcome::skipped(
                    user.id,
                    &user.exchange,
                    SkipReason::KeyInvalid,
                    format!("key status {}", validation.status.as_str()),
                ));
            }
            Err(e) => {
                tracing::warn!("Key validation failed for user {}: {}", user.id, e);
                return Ok(UserOutcome::skipped(
                    user.id,
                    &user.exchange,
                    SkipReason::KeyInvalid,
                    format!("key validation failed: {e}"),
                ));
            }
        }

        // 2. Per-(user, symbol) lock, held until this function returns
        let symbol = ctx.decision.symbol();
        let Some(_guard) = self.locks.try_acquire(user.id, symbol) else {
            tracing::info!("Skipping user {}: {} order already in flight", user.id, symbol);
            return Ok(UserOutcome::skipped(
                user.id,
                &user.exchange,
                SkipReason::InFlight,
                format!("{symbol} order already in flight"),
            ));
        };

        // 3. Sizing
        let account = match self.deps.balances.get_balance(user.id).await {
            Ok(account) => account,
            Err(BalanceError::Store(e)) if e.is_fatal() => return Err(ExecutorError::Store(e)),
            Err(e) => {
                return Ok(UserOutcome::skipped(
                    user.id,
                    &user.exchange,
                    SkipReason::InsufficientBalance,
                    e.to_string(),
                ))
            }
        };
        let available = account.available_for_trading(self.config.quote_currency);

        let started = Instant::now();
        let price = match self.reference_price(user, ctx).await {
            Ok(price) => price,
            Err((e, attempts)) => {
                let error = format!("price lookup failed: {e}");
                return self
                    .finish(user, ctx, Decimal::ZERO, None, Err((error, attempts)), started)
                    .await;
            }
        };

        let quantity = match calculate_order_quantity(available, price, &self.sizing) {
            Ok(quantity) => quantity,
            Err(rejection) => {
                tracing::info!("Skipping user {}: {}", user.id, rejection);
                return Ok(UserOutcome::skipped(
                    user.id,
                    &user.exchange,
                    SkipReason::InsufficientBalance,
                    rejection.to_string(),
                ));
            }
        };

        // 4. Submission
        let order = OrderRequest {
            user_id: user.id,
            exchange: user.exchange.clone(),
            environment: user.environment,
            symbol: symbol.to_string(),
            side: ctx.side,
            quantity,
            price: ctx.signal.reference_price,
            client_order_id: format!("{}-{}", ctx.decision.correlation_id(), user.id),
        };
        let exchange = &self.deps.exchange;
        let outcome = self
            .config
            .retry
            .run(
                "order submit",
                |_| exchange.submit_order(&order),
                ServiceError::is_retryable,
            )
            .await;

        let submitted = match outcome.result {
            Ok(ack) => Ok((ack.order_id, outcome.attempts)),
            Err(e) => Err((e.to_string(), outcome.attempts)),
        };
        self.finish(user, ctx, quantity, Some(price), submitted, started)
            .await
    }

    /// Signal price if present, otherwise the venue's last price.
    async fn reference_price(
        &self,
        user: &User,
        ctx: &BatchContext<'_>,
    ) -> Result<Decimal, (ServiceError, u32)> {
        if let Some(price) = ctx.signal.reference_price {
            return Ok(price);
        }
        let exchange = &self.deps.exchange;
        let outcome = self
            .config
            .retry
            .run(
                "price lookup",
                |_| exchange.last_price(&user.exchange, user.environment, ctx.decision.symbol()),
                ServiceError::is_retryable,
            )
            .await;
        outcome.result.map_err(|e| (e, outcome.attempts))
    }

    /// Records an EXECUTED or FAILED attempt in the audit log.
    async fn finish(
        &self,
        user: &User,
        ctx: &BatchContext<'_>,
        quantity: Decimal,
        price: Option<Decimal>,
        submitted: Result<(String, u32), (String, u32)>,
        started: Instant,
    ) -> Result<UserOutcome, ExecutorError> {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (status, exchange_order_id, error, attempts) = match &submitted {
            Ok((order_id, attempts)) => {
                (ExecutionStatus::Executed, Some(order_id.clone()), None, *attempts)
            }
            Err((error, attempts)) => (ExecutionStatus::Failed, None, Some(error.clone()), *attempts),
        };

        let record = OrderExecutionRecord {
            id: Uuid::new_v4(),
            correlation_id: ctx.decision.correlation_id().to_string(),
            decision_id: ctx.decision.id(),
            user_id: user.id,
            symbol: ctx.decision.symbol().to_string(),
            side: ctx.side,
            quantity,
            price,
            exchange: user.exchange.clone(),
            environment: user.environment,
            status,
            exchange_order_id,
            attempts,
            latency_ms,
            error,
            created_at: Utc::now(),
        };

        match self.deps.audit.record_execution(&record).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(ExecutorError::Store(e)),
            Err(e) => tracing::warn!(
                "Execution record for user {} on {} not written: {}",
                user.id,
                record.correlation_id,
                e
            ),
        }

        let status = match submitted {
            Ok((order_id, attempts)) => {
                tracing::info!(
                    "User {} {} {} {} executed as {} in {}ms",
                    user.id,
                    ctx.side,
                    quantity,
                    record.symbol,
                    order_id,
                    latency_ms
                );
                OutcomeStatus::Executed {
                    order_id,
                    quantity,
                    attempts,
                    latency_ms,
                }
            }
            Err((error, attempts)) => {
                tracing::warn!(
                    "User {} order on {} failed after {} attempt(s): {}",
                    user.id,
                    record.symbol,
                    attempts,
                    error
                );
                OutcomeStatus::Failed { error, attempts }
            }
        };

        Ok(UserOutcome {
            user_id: user.id,
            exchange: user.exchange.clone(),
            status,
        })
    }
}
