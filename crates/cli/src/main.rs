use clap::{Parser, Subcommand};

mod commands;

use commands::{BalanceArgs, DecideArgs, RunArgs};

#[derive(Parser)]
#[command(name = "pulse-trade")]
#[command(about = "Sentiment-driven trading signal executor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signal pipeline with web API
    Run(RunArgs),
    /// Decide a direction for a symbol once, without executing
    Decide(DecideArgs),
    /// Inspect or adjust user balances
    Balance(BalanceArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run(args) => commands::run_service(args).await?,
        Commands::Decide(args) => commands::run_decide(args).await?,
        Commands::Balance(args) => commands::run_balance(args).await?,
    }

    Ok(())
}
