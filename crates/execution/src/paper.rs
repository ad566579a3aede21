//! Simulated exchange used when no order gateway is configured.
//!
//! Makes no network calls. Orders are acknowledged immediately (after an
//! optional artificial latency) and kept for inspection.

use async_trait::async_trait;
use parking_lot::RwLock;
use pulse_trade_core::{Environment, ExchangeClient, OrderAck, OrderRequest, ServiceError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct PaperExchange {
    prices: RwLock<HashMap<String, Decimal>>,
    orders: RwLock<Vec<OrderRequest>>,
    latency: Duration,
}

impl PaperExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated last price for `symbol`.
    #[must_use]
    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.prices.write().insert(symbol.to_ascii_uppercase(), price);
        self
    }

    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Orders accepted so far, in submission order.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.read().clone()
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ServiceError> {
        if order.quantity <= Decimal::ZERO {
            return Err(ServiceError::Rejected(format!(
                "quantity must be positive, got {}",
                order.quantity
            )));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.orders.write().push(order.clone());
        let ack = OrderAck {
            order_id: format!("paper-{}", Uuid::new_v4()),
            status: "FILLED".to_string(),
        };
        tracing::info!(
            "Paper fill {} {} {} for user {} on {} ({})",
            order.side,
            order.quantity,
            order.symbol,
            order.user_id,
            order.exchange,
            ack.order_id
        );
        Ok(ack)
    }

    async fn last_price(
        &self,
        _exchange: &str,
        _environment: Environment,
        symbol: &str,
    ) -> Result<Decimal, ServiceError> {
        self.prices
            .read()
            .get(&symbol.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| ServiceError::Unavailable(format!("no paper price for {symbol}")))
    }
}
