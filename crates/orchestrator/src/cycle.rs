//! One signal's decision cycle.
//!
//! claim correlation id -> fetch inputs -> select direction -> log decision
//! -> fan out (directional only). The decide phase runs under a deadline and
//! never fails; only an unreachable store ends a cycle with an error.

use pulse_trade_core::{
    Claim, DecidedBy, DecisionDraft, DecisionLog, DirectionDecision, StoreError, TradingSignal,
};
use pulse_trade_execution::{BatchReport, ExecutorError, FanoutExecutor};
use pulse_trade_signals::MarketSentimentAggregator;
use pulse_trade_strategy::DualStrategySelector;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The correlation id was already decided (or is being decided right now).
    Duplicate { existing: Option<DirectionDecision> },
    /// NEUTRAL: logged, nothing executed.
    Suppressed { decision: DirectionDecision },
    Executed {
        decision: DirectionDecision,
        report: BatchReport,
    },
}

impl CycleOutcome {
    #[must_use]
    pub const fn decision(&self) -> Option<&DirectionDecision> {
        match self {
            Self::Duplicate { existing } => existing.as_ref(),
            Self::Suppressed { decision } | Self::Executed { decision, .. } => Some(decision),
        }
    }

    #[must_use]
    pub const fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Executed { report, .. } => Some(report),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("decision log unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("fan-out failed: {0}")]
    Execution(#[from] ExecutorError),
}

pub struct DecisionCycle {
    aggregator: Arc<MarketSentimentAggregator>,
    selector: Arc<DualStrategySelector>,
    decisions: Arc<dyn DecisionLog>,
    executor: Arc<FanoutExecutor>,
    deadline: Duration,
}

impl DecisionCycle {
    #[must_use]
    pub fn new(
        aggregator: Arc<MarketSentimentAggregator>,
        selector: Arc<DualStrategySelector>,
        decisions: Arc<dyn DecisionLog>,
        executor: Arc<FanoutExecutor>,
        deadline: Duration,
    ) -> Self {
        Self {
            aggregator,
            selector,
            decisions,
            executor,
            deadline,
        }
    }

    /// Runs the full cycle for `signal`.
    ///
    /// # Errors
    /// `Store` if the decision log cannot be written, `Execution` if the
    /// fan-out hits an unreachable store.
    pub async fn process(&self, signal: &TradingSignal) -> Result<CycleOutcome, CycleError> {
        let cid = signal.correlation_id.as_str();

        match self.decisions.claim(cid).await? {
            Claim::Claimed => {}
            Claim::Existing(decision) => {
                tracing::info!("[{}] duplicate delivery, already decided {}", cid, decision.direction());
                return Ok(CycleOutcome::Duplicate {
                    existing: Some(*decision),
                });
            }
            Claim::InFlight => {
                tracing::info!("[{}] duplicate delivery, decision in progress", cid);
                return Ok(CycleOutcome::Duplicate { existing: None });
            }
        }

        let decision = self.decide(signal).await;

        if let Err(e) = self.decisions.complete(signal, &decision).await {
            tracing::error!("[{}] could not log decision: {}", cid, e);
            if let Err(release_err) = self.decisions.release(cid).await {
                tracing::warn!("[{}] claim not released: {}", cid, release_err);
            }
            return Err(CycleError::Store(e));
        }

        if !decision.is_actionable() {
            tracing::info!(
                "[{}] {} NEUTRAL ({}), signal not executed: {}",
                cid,
                decision.symbol(),
                decision.decided_by(),
                decision.reasoning()
            );
            return Ok(CycleOutcome::Suppressed { decision });
        }

        let report = self.executor.execute(&decision, signal).await?;
        Ok(CycleOutcome::Executed { decision, report })
    }

    /// Decides a direction without claiming, logging or executing.
    ///
    /// Bounded by the cycle deadline. On timeout, cached inputs are used if
    /// any exist; cached inputs are always stale, which keeps the AI arbiter
    /// from being called again.
    pub async fn decide(&self, signal: &TradingSignal) -> DirectionDecision {
        match tokio::time::timeout(self.deadline, self.decide_fresh(signal)).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(
                    "[{}] decision deadline of {}ms exceeded, falling back to cache",
                    signal.correlation_id,
                    self.deadline.as_millis()
                );
                self.decide_from_cache(signal).await
            }
        }
    }

    async fn decide_fresh(&self, signal: &TradingSignal) -> DirectionDecision {
        let (sentiment, pulse) =
            tokio::join!(self.aggregator.get_sentiment(), self.aggregator.get_pulse());

        let sentiment = match sentiment {
            Ok(sentiment) => sentiment,
            Err(e) => {
                tracing::error!("[{}] {}, resolving NEUTRAL", signal.correlation_id, e);
                return DecisionDraft::neutral(
                    signal.correlation_id.clone(),
                    signal.symbol.clone(),
                    DecidedBy::Sentiment,
                    e.to_string(),
                )
                .with_inputs(None, pulse.ok())
                .seal();
            }
        };
        if let Err(e) = &pulse {
            tracing::warn!("[{}] {}", signal.correlation_id, e);
        }

        let outcome = self.selector.select(signal, sentiment, pulse.ok()).await;
        tracing::info!(
            "[{}] {} decided {} by {} ({:.0}%): {}",
            signal.correlation_id,
            signal.symbol,
            outcome.decision.direction(),
            outcome.decision.decided_by(),
            outcome.decision.confidence(),
            outcome.trace_string()
        );
        outcome.decision
    }

    async fn decide_from_cache(&self, signal: &TradingSignal) -> DirectionDecision {
        let pulse = self.aggregator.cached_pulse();
        match self.aggregator.cached_sentiment() {
            Some(sentiment) => self.selector.select(signal, sentiment, pulse).await.decision,
            None => DecisionDraft::neutral(
                signal.correlation_id.clone(),
                signal.symbol.clone(),
                DecidedBy::Sentiment,
                "deadline exceeded",
            )
            .with_inputs(None, pulse)
            .seal(),
        }
    }
}
