//! Background refresh of the aggregator cache.

use crate::aggregator::MarketSentimentAggregator;
use pulse_trade_core::ScheduledTask;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Keeps sentiment and pulse warm so decision cycles rarely wait on upstreams.
pub struct SnapshotRefresher {
    aggregator: Arc<MarketSentimentAggregator>,
    task: ScheduledTask,
}

impl SnapshotRefresher {
    #[must_use]
    pub fn new(aggregator: Arc<MarketSentimentAggregator>, interval: Duration) -> Self {
        Self {
            aggregator,
            task: ScheduledTask::new("sentiment-refresh", interval),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.task = self.task.with_token(token);
        self
    }

    pub fn start(&mut self) {
        let aggregator = Arc::clone(&self.aggregator);
        self.task.start(move || {
            let aggregator = Arc::clone(&aggregator);
            async move { aggregator.refresh().await }
        });
    }

    pub async fn stop(&mut self) {
        self.task.stop().await;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}
