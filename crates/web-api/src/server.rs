use crate::handlers;
use crate::health::HealthPolicy;
use axum::{
    routing::{get, post},
    Router,
};
use pulse_trade_ledger::BalanceManager;
use pulse_trade_orchestrator::PipelineHandle;
use pulse_trade_signals::MarketSentimentAggregator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineHandle,
    pub balances: Arc<BalanceManager>,
    pub aggregator: Arc<MarketSentimentAggregator>,
    pub health: HealthPolicy,
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/signals", post(handlers::submit_signal))
            .route("/api/users/:user_id/balances", get(handlers::get_balances))
            .route(
                "/api/users/:user_id/balances/adjust",
                post(handlers::adjust_balance),
            )
            .route(
                "/api/users/:user_id/balances/convert",
                post(handlers::convert_commission),
            )
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serves until `shutdown` is cancelled.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("Web API stopped");
        Ok(())
    }
}
