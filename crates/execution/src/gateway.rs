//! HTTP order gateway client.
//!
//! The gateway holds user credentials and talks to the venues; this client
//! only forwards order intents and price lookups.

use async_trait::async_trait;
use pulse_trade_core::{
    Environment, ExchangeClient, OrderAck, OrderRequest, OrderSide, ServiceError, UserId,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("pulse-trade/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    user_id: UserId,
    exchange: &'a str,
    environment: Environment,
    symbol: &'a str,
    side: OrderSide,
    quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<Decimal>,
    client_order_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    order_id: String,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "ACCEPTED".to_string()
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[derive(Debug, Clone)]
pub struct HttpOrderGateway {
    http: Client,
    base_url: String,
}

impl HttpOrderGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ServiceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
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

#[async_trait]
impl ExchangeClient for HttpOrderGateway {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ServiceError> {
        let body = SubmitBody {
            user_id: order.user_id,
            exchange: &order.exchange,
            environment: order.environment,
            symbol: &order.symbol,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            client_order_id: &order.client_order_id,
        };

        tracing::debug!(
            "POST {}/orders {} {} {} for user {}",
            self.base_url,
            order.side,
            order.quantity,
            order.symbol,
            order.user_id
        );

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .json(&body)
            .send()
            .await?;

        let ack: SubmitResponse = Self::handle_response(response).await?;
        Ok(OrderAck {
            order_id: ack.order_id,
            status: ack.status,
        })
    }

    async fn last_price(
        &self,
        exchange: &str,
        environment: Environment,
        symbol: &str,
    ) -> Result<Decimal, ServiceError> {
        let response = self
            .http
            .get(format!("{}/prices", self.base_url))
            .query(&[
                ("exchange", exchange),
                ("environment", environment.as_str()),
                ("symbol", symbol),
            ])
            .send()
            .await?;

        let price: PriceResponse = Self::handle_response(response).await?;
        Ok(price.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> OrderRequest {
        OrderRequest {
            user_id: 4,
            exchange: "binance".to_string(),
            environment: Environment::Mainnet,
            symbol: "ETHUSDT".to_string(),
            side: OrderSide::Sell,
            quantity: dec!(0.25),
            price: Some(dec!(3000)),
            client_order_id: "sig-9-4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_posts_order_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_partial_json(json!({
                "user_id": 4,
                "exchange": "binance",
                "environment": "mainnet",
                "symbol": "ETHUSDT",
                "side": "SELL"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "order_id": "ex-77", "status": "NEW" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpOrderGateway::new(server.uri(), Duration::from_secs(5)).unwrap();
        let ack = gateway.submit_order(&order()).await.unwrap();
        assert_eq!(ack.order_id, "ex-77");
        assert_eq!(ack.status, "NEW");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("lot size"))
            .mount(&server)
            .await;

        let gateway = HttpOrderGateway::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = gateway.submit_order(&order()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_errors_are_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let gateway = HttpOrderGateway::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(gateway.submit_order(&order()).await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_last_price_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/prices"))
            .and(query_param("symbol", "ETHUSDT"))
            .and(query_param("environment", "mainnet"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "price": "3012.5" })))
            .mount(&server)
            .await;

        let gateway = HttpOrderGateway::new(server.uri(), Duration::from_secs(5)).unwrap();
        let price = gateway
            .last_price("binance", Environment::Mainnet, "ETHUSDT")
            .await
            .unwrap();
        assert_eq!(price, dec!(3012.5));
    }
}
