//! Health report built from the aggregator's cached snapshots.
//!
//! A source is `healthy` while its last reading is younger than the allowed
//! age, `degraded` once it is older, and `unhealthy` when nothing has been
//! fetched yet. The service keeps answering in every state, so the endpoint
//! itself always returns 200.

use chrono::{DateTime, Utc};
use pulse_trade_signals::MarketSentimentAggregator;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Maximum reading age per source before it counts as degraded.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    /// The Fear & Greed index is published once a day
    pub sentiment_max_age: Duration,
    pub pulse_max_age: Duration,
}

impl HealthPolicy {
    /// Pulse readings may miss three refreshes before degrading.
    #[must_use]
    pub fn for_refresh_interval(interval: Duration) -> Self {
        Self {
            pulse_max_age: interval * 3,
            ..Self::default()
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            sentiment_max_age: Duration::from_secs(36 * 3600),
            pulse_max_age: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub name: &'static str,
    pub status: HealthStatus,
    pub last_collected_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<i64>,
}

impl SourceHealth {
    fn assess(
        name: &'static str,
        collected_at: Option<DateTime<Utc>>,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(collected_at) = collected_at else {
            return Self {
                name,
                status: HealthStatus::Unhealthy,
                last_collected_at: None,
                age_seconds: None,
            };
        };

        let age = (now - collected_at).num_seconds().max(0);
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        Self {
            name,
            status: if age <= max_age {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            last_collected_at: Some(collected_at),
            age_seconds: Some(age),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub sources: Vec<SourceHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthResponse {
    /// Overall status is the worst source status.
    #[must_use]
    pub fn collect(aggregator: &MarketSentimentAggregator, policy: &HealthPolicy) -> Self {
        let now = Utc::now();
        let sources = vec![
            SourceHealth::assess(
                "sentiment",
                aggregator.cached_sentiment().map(|s| s.collected_at),
                policy.sentiment_max_age,
                now,
            ),
            SourceHealth::assess(
                "market_pulse",
                aggregator.cached_pulse().map(|p| p.collected_at),
                policy.pulse_max_age,
                now,
            ),
        ];
        let status = sources
            .iter()
            .map(|s| s.status)
            .max()
            .unwrap_or(HealthStatus::Unhealthy);

        Self {
            status,
            sources,
            checked_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reading_is_unhealthy() {
        let health = SourceHealth::assess("pulse", None, Duration::from_secs(60), Utc::now());
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(health.age_seconds.is_none());
    }

    #[test]
    fn test_old_reading_is_degraded() {
        let now = Utc::now();
        let fresh = SourceHealth::assess(
            "pulse",
            Some(now - chrono::Duration::seconds(30)),
            Duration::from_secs(60),
            now,
        );
        let old = SourceHealth::assess(
            "pulse",
            Some(now - chrono::Duration::seconds(300)),
            Duration::from_secs(60),
            now,
        );
        assert_eq!(fresh.status, HealthStatus::Healthy);
        assert_eq!(old.status, HealthStatus::Degraded);
        assert_eq!(old.age_seconds, Some(300));
    }
}
