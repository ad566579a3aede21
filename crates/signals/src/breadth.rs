//! Market breadth (pulse) over the top-N assets by market cap.

use crate::common::JsonFetcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_trade_core::{MarketPulseSnapshot, PulseSource, RetryPolicy, ServiceError};
use serde::Deserialize;

pub const SOURCE_NAME: &str = "breadth";

/// One row of a CoinGecko-style `/coins/markets` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarketRow {
    pub symbol: String,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
}

/// Computes PM+, PM- and VWΔ over `rows`.
///
/// Rows missing a 24h change or volume are left out of the basket. An empty
/// basket yields a zeroed snapshot with `basket_size == 0`.
#[must_use]
pub fn compute_pulse(rows: &[MarketRow], collected_at: DateTime<Utc>) -> MarketPulseSnapshot {
    let basket: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|r| match (r.price_change_percentage_24h, r.total_volume) {
            (Some(change), Some(volume))
                if change.is_finite() && volume.is_finite() && volume >= 0.0 =>
            {
                Some((change, volume))
            }
            _ => None,
        })
        .collect();

    let n = basket.len();
    if n == 0 {
        return MarketPulseSnapshot {
            advancing_pct: 0.0,
            declining_pct: 0.0,
            vw_delta_pct: 0.0,
            basket_size: 0,
            collected_at,
            stale: false,
        };
    }

    let advancing = basket.iter().filter(|(c, _)| *c > 0.0).count();
    let declining = basket.iter().filter(|(c, _)| *c < 0.0).count();

    let total_volume: f64 = basket.iter().map(|(_, v)| v).sum();
    let vw_delta_pct = if total_volume > 0.0 {
        basket.iter().map(|(c, v)| c * v).sum::<f64>() / total_volume
    } else {
        0.0
    };

    #[allow(clippy::cast_precision_loss)]
    let pct = |count: usize| count as f64 / n as f64 * 100.0;

    MarketPulseSnapshot {
        advancing_pct: pct(advancing),
        declining_pct: pct(declining),
        vw_delta_pct,
        basket_size: n,
        collected_at,
        stale: false,
    }
}

/// Pulls the top-N basket from a markets endpoint and reduces it to a pulse.
#[derive(Debug, Clone)]
pub struct BreadthSource {
    base_url: String,
    basket_size: u32,
    fetcher: JsonFetcher,
    retry: RetryPolicy,
}

impl BreadthSource {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        basket_size: u32,
        fetcher: JsonFetcher,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            basket_size: basket_size.clamp(1, 250),
            fetcher,
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<MarketPulseSnapshot, ServiceError> {
        let url = format!("{}/coins/markets", self.base_url);
        let rows: Vec<MarketRow> = self
            .fetcher
            .get_json(
                &url,
                &[
                    ("vs_currency", "usd".to_string()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", self.basket_size.to_string()),
                    ("page", "1".to_string()),
                    ("price_change_percentage", "24h".to_string()),
                ],
            )
            .await?;

        let snapshot = compute_pulse(&rows, Utc::now());
        if snapshot.basket_size < rows.len() {
            tracing::debug!(
                "Breadth basket excluded {} of {} assets with missing data",
                rows.len() - snapshot.basket_size,
                rows.len()
            );
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl PulseSource for BreadthSource {
    async fn fetch_pulse(&self) -> Result<MarketPulseSnapshot, ServiceError> {
        self.retry
            .retry("breadth fetch", |_| self.fetch_once(), ServiceError::is_retryable)
            .await
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(symbol: &str, change: Option<f64>, volume: Option<f64>) -> MarketRow {
        MarketRow {
            symbol: symbol.to_string(),
            price_change_percentage_24h: change,
            total_volume: volume,
        }
    }

    #[test]
    fn test_compute_pulse_counts_and_weights() {
        let rows = vec![
            row("btc", Some(2.0), Some(300.0)),
            row("eth", Some(-1.0), Some(100.0)),
            row("sol", Some(4.0), Some(100.0)),
            row("xrp", Some(0.0), Some(500.0)),
        ];
        let pulse = compute_pulse(&rows, Utc::now());

        assert_eq!(pulse.basket_size, 4);
        assert!((pulse.advancing_pct - 50.0).abs() < 1e-9);
        assert!((pulse.declining_pct - 25.0).abs() < 1e-9);
        // (600 - 100 + 400 + 0) / 1000
        assert!((pulse.vw_delta_pct - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_missing_data_is_excluded() {
        let rows = vec![
            row("btc", Some(1.0), Some(10.0)),
            row("new", None, Some(10.0)),
            row("dead", Some(-3.0), None),
        ];
        let pulse = compute_pulse(&rows, Utc::now());
        assert_eq!(pulse.basket_size, 1);
        assert!((pulse.advancing_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_basket() {
        let pulse = compute_pulse(&[], Utc::now());
        assert_eq!(pulse.basket_size, 0);
        assert!(pulse.imbalance().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_fetch_pulse_from_markets_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/markets"))
            .and(query_param("per_page", "3"))
            .and(query_param("order", "market_cap_desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "bitcoin", "symbol": "btc", "price_change_percentage_24h": 3.0, "total_volume": 100.0 },
                { "id": "ethereum", "symbol": "eth", "price_change_percentage_24h": 1.0, "total_volume": 100.0 },
                { "id": "tether", "symbol": "usdt", "price_change_percentage_24h": null, "total_volume": 100.0 }
            ])))
            .mount(&server)
            .await;

        let fetcher = JsonFetcher::new(600, Duration::from_secs(5)).unwrap();
        let source = BreadthSource::new(format!("{}/", server.uri()), 3, fetcher, RetryPolicy::none());
        let pulse = source.fetch_pulse().await.unwrap();

        assert_eq!(pulse.basket_size, 2);
        assert!((pulse.advancing_pct - 100.0).abs() < 1e-9);
        assert!((pulse.vw_delta_pct - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = JsonFetcher::new(600, Duration::from_secs(5)).unwrap();
        let retry = RetryPolicy::new(3, Duration::from_millis(1));
        let source = BreadthSource::new(server.uri(), 10, fetcher, retry);

        let err = source.fetch_pulse().await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
    }
}
