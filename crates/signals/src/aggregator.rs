//! Market Sentiment Aggregator: fresh readings with stale-cache fallback.

use parking_lot::RwLock;
use pulse_trade_core::{
    MarketPulseSnapshot, PulseSource, SentimentReading, SentimentSource, ServiceError,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    /// Upstream failed and nothing is cached to fall back on.
    #[error("{input} data unavailable: {reason}")]
    DataUnavailable { input: &'static str, reason: String },
}

/// Serves the latest sentiment and pulse readings.
///
/// A successful fetch replaces the cache. A failed or timed-out fetch
/// returns the cached value flagged `stale`, or `DataUnavailable` when no
/// value has ever been fetched.
pub struct MarketSentimentAggregator {
    sentiment_source: Arc<dyn SentimentSource>,
    pulse_source: Arc<dyn PulseSource>,
    fetch_timeout: Duration,
    last_sentiment: RwLock<Option<SentimentReading>>,
    last_pulse: RwLock<Option<MarketPulseSnapshot>>,
}

impl MarketSentimentAggregator {
    #[must_use]
    pub fn new(
        sentiment_source: Arc<dyn SentimentSource>,
        pulse_source: Arc<dyn PulseSource>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            sentiment_source,
            pulse_source,
            fetch_timeout,
            last_sentiment: RwLock::new(None),
            last_pulse: RwLock::new(None),
        }
    }

    /// # Errors
    /// `DataUnavailable` if the fetch fails and no reading is cached.
    pub async fn get_sentiment(&self) -> Result<SentimentReading, AggregatorError> {
        let fetched = bounded(self.fetch_timeout, self.sentiment_source.fetch_sentiment()).await;
        resolve(
            "sentiment",
            self.sentiment_source.name(),
            fetched,
            &self.last_sentiment,
            SentimentReading::into_stale,
        )
    }

    /// # Errors
    /// `DataUnavailable` if the fetch fails and no snapshot is cached.
    pub async fn get_pulse(&self) -> Result<MarketPulseSnapshot, AggregatorError> {
        let fetched = bounded(self.fetch_timeout, self.pulse_source.fetch_pulse()).await;
        resolve(
            "pulse",
            self.pulse_source.name(),
            fetched,
            &self.last_pulse,
            MarketPulseSnapshot::into_stale,
        )
    }

    /// Last sentiment reading, flagged stale, without fetching.
    #[must_use]
    pub fn cached_sentiment(&self) -> Option<SentimentReading> {
        self.last_sentiment
            .read()
            .clone()
            .map(SentimentReading::into_stale)
    }

    /// Last pulse snapshot, flagged stale, without fetching.
    #[must_use]
    pub fn cached_pulse(&self) -> Option<MarketPulseSnapshot> {
        self.last_pulse
            .read()
            .clone()
            .map(MarketPulseSnapshot::into_stale)
    }

    /// Fetches both readings, logging rather than returning failures.
    pub async fn refresh(&self) {
        let (sentiment, pulse) = tokio::join!(self.get_sentiment(), self.get_pulse());
        match (&sentiment, &pulse) {
            (Ok(s), Ok(p)) => tracing::debug!(
                "Refreshed market inputs: sentiment={:.0} ({}) stale={} pm+={:.1} pm-={:.1} vw={:.2} stale={}",
                s.score,
                s.classification,
                s.stale,
                p.advancing_pct,
                p.declining_pct,
                p.vw_delta_pct,
                p.stale
            ),
            _ => {
                if let Err(e) = sentiment {
                    tracing::warn!("Sentiment refresh failed: {}", e);
                }
                if let Err(e) = pulse {
                    tracing::warn!("Pulse refresh failed: {}", e);
                }
            }
        }
    }
}

async fn bounded<T>(
    timeout: Duration,
    fetch: impl Future<Output = Result<T, ServiceError>>,
) -> Result<T, ServiceError> {
    match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(format!(
            "no response within {}ms",
            timeout.as_millis()
        ))),
    }
}

fn resolve<T: Clone>(
    input: &'static str,
    source: &str,
    fetched: Result<T, ServiceError>,
    cache: &RwLock<Option<T>>,
    mark_stale: fn(T) -> T,
) -> Result<T, AggregatorError> {
    match fetched {
        Ok(value) => {
            *cache.write() = Some(value.clone());
            Ok(value)
        }
        Err(e) => {
            let cached = cache.read().clone();
            if let Some(value) = cached {
                tracing::warn!("{} fetch from {} failed, serving stale cache: {}", input, source, e);
                Ok(mark_stale(value))
            } else {
                tracing::error!("{} fetch from {} failed with no cache: {}", input, source, e);
                Err(AggregatorError::DataUnavailable {
                    input,
                    reason: e.to_string(),
                })
            }
        }
    }
}
