//! One-off direction decision for a symbol.
//!
//! Runs the same decide phase as the pipeline but never claims, logs or
//! executes, so it is safe against a production database.

use anyhow::{Context, Result};
use clap::Args;
use pulse_trade_core::SignalPayload;
use pulse_trade_orchestrator::Services;

/// Arguments for the decide command.
#[derive(Args, Debug, Clone)]
pub struct DecideArgs {
    /// Symbol to decide for (e.g., "BTCUSDT")
    #[arg(long)]
    pub symbol: String,

    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    #[arg(long, env = "PULSE_PROFILE")]
    pub profile: Option<String>,
}

/// Prints the decision as JSON on stdout.
///
/// # Errors
/// Returns an error if configuration or services cannot be built, or the
/// symbol is invalid.
pub async fn run_decide(args: DecideArgs) -> Result<()> {
    let config = super::load_config(&args.config, args.profile.as_deref())?;
    let services = Services::build(config).await?;

    let signal = SignalPayload {
        symbol: args.symbol,
        action: "CHECK".to_string(),
        source: "cli".to_string(),
        correlation_id: format!("cli-{}", uuid::Uuid::new_v4()),
        ..SignalPayload::default()
    }
    .validate()
    .context("invalid symbol")?;

    let decision = services.cycle.decide(&signal).await;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
