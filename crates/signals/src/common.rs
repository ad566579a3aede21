//! Rate-limited JSON fetching shared by the HTTP sentiment sources.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use pulse_trade_core::ServiceError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("pulse-trade/", env!("CARGO_PKG_VERSION"));

/// HTTP client plus a per-source request quota.
#[derive(Clone)]
pub struct JsonFetcher {
    http: Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for JsonFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFetcher").finish_non_exhaustive()
    }
}

impl JsonFetcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(requests_per_minute: u32, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ServiceError::Network(format!("failed to build HTTP client: {e}")))?;

        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self { http, rate_limiter })
    }

    /// Waits for quota, then GETs `url` and decodes the JSON body.
    ///
    /// # Errors
    /// Network failures, non-success statuses and undecodable bodies.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ServiceError::rate_limit(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status(status.as_u16(), text));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
