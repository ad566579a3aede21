//! Market sentiment inputs: upstream sources, the caching aggregator, and
//! its background refresher.

pub mod aggregator;
pub mod breadth;
pub mod common;
pub mod fear_greed;
pub mod refresher;

pub use aggregator::{AggregatorError, MarketSentimentAggregator};
pub use breadth::{compute_pulse, BreadthSource, MarketRow};
pub use common::JsonFetcher;
pub use fear_greed::{classify_score, FearGreedSource};
pub use refresher::SnapshotRefresher;

use pulse_trade_core::{SentimentConfig, ServiceError};
use std::sync::Arc;

/// Builds the HTTP-backed aggregator described by `config`.
///
/// # Errors
/// Returns an error if an HTTP client cannot be built.
pub fn aggregator_from_config(
    config: &SentimentConfig,
) -> Result<MarketSentimentAggregator, ServiceError> {
    let fetcher = JsonFetcher::new(config.requests_per_minute, config.fetch_timeout())?;
    let fear_greed = FearGreedSource::new(
        config.fear_greed_url.clone(),
        fetcher.clone(),
        config.retry.clone(),
    );
    let breadth = BreadthSource::new(
        config.breadth_url.clone(),
        config.basket_size,
        fetcher,
        config.retry.clone(),
    );
    Ok(MarketSentimentAggregator::new(
        Arc::new(fear_greed),
        Arc::new(breadth),
        config.fetch_timeout(),
    ))
}
