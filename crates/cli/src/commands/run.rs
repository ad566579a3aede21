//! Long-running service: snapshot refresher, signal pipeline and web API.

use anyhow::Result;
use clap::Args;
use pulse_trade_orchestrator::{Services, SignalPipeline};
use pulse_trade_signals::SnapshotRefresher;
use pulse_trade_web_api::{ApiServer, AppState, HealthPolicy};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Profile overlay (`config/Config.<profile>.toml`)
    #[arg(long, env = "PULSE_PROFILE")]
    pub profile: Option<String>,
}

/// Runs until Ctrl+C, then drains in-flight cycles.
///
/// # Errors
/// Returns an error if configuration, stores or the listener cannot be set up.
pub async fn run_service(args: RunArgs) -> Result<()> {
    let config = super::load_config(&args.config, args.profile.as_deref())?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let refresh_interval = Duration::from_secs(config.sentiment.refresh_interval_secs.max(1));

    let services = Services::build(config).await?;
    let token = CancellationToken::new();

    let mut refresher = SnapshotRefresher::new(services.aggregator.clone(), refresh_interval)
        .with_token(token.child_token());
    refresher.start();

    let pipeline = SignalPipeline::spawn(
        services.cycle.clone(),
        &services.config.cycle,
        token.child_token(),
    );

    let server = ApiServer::new(AppState {
        pipeline: pipeline.handle(),
        balances: services.balances.clone(),
        aggregator: services.aggregator.clone(),
        health: HealthPolicy::for_refresh_interval(refresh_interval),
    });

    let shutdown = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    });

    tracing::info!("Press Ctrl+C to stop");
    let served = server.serve(&addr, token.clone()).await;

    token.cancel();
    pipeline.shutdown().await;
    refresher.stop().await;

    served
}
