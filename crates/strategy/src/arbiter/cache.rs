//! TTL cache of arbitration results keyed by a bucketed market fingerprint.

use super::Arbitration;
use parking_lot::Mutex;
use pulse_trade_core::{ArbiterConfig, ClassificationContext};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Coarse identity of a market situation. Nearby readings share a bucket so
/// a repeat of "roughly the same market" reuses the earlier answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub symbol: String,
    pub sentiment_bucket: i64,
    pub imbalance_bucket: i64,
    pub vw_bucket: i64,
}

impl Fingerprint {
    #[must_use]
    pub fn of(context: &ClassificationContext, config: &ArbiterConfig) -> Self {
        Self {
            symbol: context.symbol.clone(),
            sentiment_bucket: bucket(context.sentiment.score, config.sentiment_bucket),
            imbalance_bucket: bucket(context.pulse.imbalance(), config.pulse_bucket),
            vw_bucket: bucket(context.pulse.vw_delta_pct, config.vw_bucket),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bucket(value: f64, width: f64) -> i64 {
    if !value.is_finite() || width <= 0.0 {
        return 0;
    }
    (value / width).floor() as i64
}

pub struct DecisionCache {
    ttl: Duration,
    entries: Mutex<HashMap<Fingerprint, (Arbitration, Instant)>>,
}

impl DecisionCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn get(&self, key: &Fingerprint) -> Option<Arbitration> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, stored_at)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: Fingerprint, value: Arbitration) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock();
        let ttl = self.ttl;
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
        entries.insert(key, (value, Instant::now()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::Resolution;
    use pulse_trade_core::Direction;

    fn fingerprint(sentiment_bucket: i64) -> Fingerprint {
        Fingerprint {
            symbol: "BTCUSDT".to_string(),
            sentiment_bucket,
            imbalance_bucket: 0,
            vw_bucket: 0,
        }
    }

    fn arbitration() -> Arbitration {
        Arbitration {
            direction: Direction::Long,
            confidence: 80.0,
            reasoning: "cached".to_string(),
            resolution: Resolution::Classified,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_pruned_on_insert() {
        let cache = DecisionCache::new(Duration::from_secs(60));
        for b in 0..10 {
            cache.insert(fingerprint(b), arbitration());
        }
        assert_eq!(cache.len(), 10);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.insert(fingerprint(99), arbitration());
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fingerprint(0)).is_none());
        assert!(cache.get(&fingerprint(99)).is_some());
    }

    #[test]
    fn test_bucketing() {
        assert_eq!(bucket(52.0, 5.0), 10);
        assert_eq!(bucket(54.9, 5.0), 10);
        assert_eq!(bucket(55.0, 5.0), 11);
        assert_eq!(bucket(-0.2, 0.5), -1);
        assert_eq!(bucket(f64::NAN, 5.0), 0);
    }
}
