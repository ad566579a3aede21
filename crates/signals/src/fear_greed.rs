//! Fear & Greed index source (alternative.me `fng` format).

use crate::common::JsonFetcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulse_trade_core::{
    RetryPolicy, SentimentClass, SentimentReading, SentimentSource, ServiceError,
};
use serde::Deserialize;

pub const SOURCE_NAME: &str = "fear_greed";

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: Option<String>,
    /// Unix seconds, as a string
    timestamp: Option<String>,
}

/// Standard label for a 0-100 sentiment score.
#[must_use]
pub fn classify_score(score: f64) -> &'static str {
    SentimentClass::from_score(score).label()
}

/// Polls a Fear & Greed endpoint for the latest index value.
#[derive(Debug, Clone)]
pub struct FearGreedSource {
    url: String,
    fetcher: JsonFetcher,
    retry: RetryPolicy,
}

impl FearGreedSource {
    #[must_use]
    pub fn new(url: impl Into<String>, fetcher: JsonFetcher, retry: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            fetcher,
            retry,
        }
    }

    async fn fetch_once(&self) -> Result<SentimentReading, ServiceError> {
        let response: FngResponse = self
            .fetcher
            .get_json(&self.url, &[("limit", "1".to_string())])
            .await?;

        let entry = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Serialization("empty fng data".to_string()))?;

        parse_entry(entry, Utc::now())
    }
}

fn parse_entry(entry: FngEntry, now: DateTime<Utc>) -> Result<SentimentReading, ServiceError> {
    let score: f64 = entry
        .value
        .trim()
        .parse()
        .map_err(|_| ServiceError::Serialization(format!("bad fng value: {}", entry.value)))?;

    let collected_at = entry
        .timestamp
        .and_then(|t| t.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(now);

    Ok(SentimentReading::new(
        score,
        entry.value_classification,
        collected_at,
        SOURCE_NAME,
    ))
}

#[async_trait]
impl SentimentSource for FearGreedSource {
    async fn fetch_sentiment(&self) -> Result<SentimentReading, ServiceError> {
        self.retry
            .retry("fear_greed fetch", |_| self.fetch_once(), ServiceError::is_retryable)
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

    fn source(server: &MockServer, retry: RetryPolicy) -> FearGreedSource {
        let fetcher = JsonFetcher::new(600, Duration::from_secs(5)).unwrap();
        FearGreedSource::new(format!("{}/fng/", server.uri()), fetcher, retry)
    }

    #[test]
    fn test_classify_score_labels() {
        assert_eq!(classify_score(10.0), "Extreme Fear");
        assert_eq!(classify_score(30.0), "Fear");
        assert_eq!(classify_score(50.0), "Neutral");
        assert_eq!(classify_score(70.0), "Greed");
        assert_eq!(classify_score(90.0), "Extreme Greed");
    }

    #[tokio::test]
    async fn test_fetch_parses_latest_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fng/"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Fear and Greed Index",
                "data": [{
                    "value": "15",
                    "value_classification": "Extreme Fear",
                    "timestamp": "1700000000"
                }]
            })))
            .mount(&server)
            .await;

        let reading = source(&server, RetryPolicy::none())
            .fetch_sentiment()
            .await
            .unwrap();

        assert!((reading.score - 15.0).abs() < f64::EPSILON);
        assert_eq!(reading.classification, "Extreme Fear");
        assert_eq!(reading.collected_at.timestamp(), 1_700_000_000);
        assert_eq!(reading.source, SOURCE_NAME);
        assert!(!reading.stale);
    }

    #[tokio::test]
    async fn test_missing_label_is_derived() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [{ "value": "62" }] })),
            )
            .mount(&server)
            .await;

        let reading = source(&server, RetryPolicy::none())
            .fetch_sentiment()
            .await
            .unwrap();
        assert_eq!(reading.classification, "Greed");
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [{ "value": "48" }] })),
            )
            .mount(&server)
            .await;

        let retry = RetryPolicy::new(2, Duration::from_millis(1));
        let reading = source(&server, retry).fetch_sentiment().await.unwrap();
        assert!((reading.score - 48.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_data_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = source(&server, RetryPolicy::none())
            .fetch_sentiment()
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Serialization(_)));
    }
}
