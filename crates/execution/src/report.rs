//! Per-user outcomes and the batch report.

use chrono::{DateTime, Utc};
use pulse_trade_core::{Direction, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a user was not sent an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    KeyInvalid,
    InFlight,
    InsufficientBalance,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeyInvalid => "key_invalid",
            Self::InFlight => "in_flight",
            Self::InsufficientBalance => "insufficient_balance",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Executed {
        order_id: String,
        quantity: Decimal,
        attempts: u32,
        latency_ms: u64,
    },
    Failed {
        error: String,
        attempts: u32,
    },
    Skipped {
        reason: SkipReason,
        detail: String,
    },
}

/// What happened for one user in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOutcome {
    pub user_id: UserId,
    pub exchange: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl UserOutcome {
    #[must_use]
    pub fn skipped(
        user_id: UserId,
        exchange: impl Into<String>,
        reason: SkipReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            exchange: exchange.into(),
            status: OutcomeStatus::Skipped {
                reason,
                detail: detail.into(),
            },
        }
    }

    #[must_use]
    pub const fn is_executed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Executed { .. })
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    #[must_use]
    pub const fn skip_reason(&self) -> Option<SkipReason> {
        match self.status {
            OutcomeStatus::Skipped { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Every active user's outcome for one directional decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub correlation_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub outcomes: Vec<UserOutcome>,
    pub counts: BatchCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Sorts outcomes by user id and tallies them.
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        symbol: impl Into<String>,
        direction: Direction,
        mut outcomes: Vec<UserOutcome>,
        started_at: DateTime<Utc>,
    ) -> Self {
        outcomes.sort_by_key(|o| o.user_id);
        let mut counts = BatchCounts {
            total: outcomes.len(),
            ..BatchCounts::default()
        };
        for outcome in &outcomes {
            match outcome.status {
                OutcomeStatus::Executed { .. } => counts.executed += 1,
                OutcomeStatus::Failed { .. } => counts.failed += 1,
                OutcomeStatus::Skipped { .. } => counts.skipped += 1,
            }
        }

        Self {
            correlation_id: correlation_id.into(),
            symbol: symbol.into(),
            direction,
            outcomes,
            counts,
            started_at,
            finished_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn executed(&self) -> usize {
        self.counts.executed
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.counts.failed
    }

    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.counts.skipped
    }

    #[must_use]
    pub fn outcome_for(&self, user_id: UserId) -> Option<&UserOutcome> {
        self.outcomes.iter().find(|o| o.user_id == user_id)
    }

    /// One-line summary for logs.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {} {}: {} users, {} executed, {} failed, {} skipped",
            self.correlation_id,
            self.symbol,
            self.direction,
            self.counts.total,
            self.counts.executed,
            self.counts.failed,
            self.counts.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn executed(user_id: UserId) -> UserOutcome {
        UserOutcome {
            user_id,
            exchange: "binance".to_string(),
            status: OutcomeStatus::Executed {
                order_id: format!("o-{user_id}"),
                quantity: dec!(0.01),
                attempts: 1,
                latency_ms: 12,
            },
        }
    }

    #[test]
    fn test_report_sorts_and_counts() {
        let report = BatchReport::new(
            "sig-1",
            "BTCUSDT",
            Direction::Long,
            vec![
                executed(3),
                UserOutcome::skipped(2, "binance", SkipReason::KeyInvalid, "INVALID"),
                executed(1),
            ],
            Utc::now(),
        );

        let ids: Vec<_> = report.outcomes.iter().map(|o| o.user_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(report.executed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(
            report.outcome_for(2).and_then(UserOutcome::skip_reason),
            Some(SkipReason::KeyInvalid)
        );
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = UserOutcome::skipped(9, "bybit", SkipReason::InFlight, "busy");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "SKIPPED");
        assert_eq!(json["reason"], "in_flight");
        assert_eq!(json["user_id"], 9);
    }
}
