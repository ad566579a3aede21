//! Balance inspection and manual adjustments.

use anyhow::Result;
use clap::{Args, Subcommand};
use pulse_trade_core::{Currency, UserId};
use pulse_trade_ledger::BalanceOp;
use pulse_trade_orchestrator::Services;
use rust_decimal::Decimal;

/// Arguments for the balance command.
#[derive(Args, Debug, Clone)]
pub struct BalanceArgs {
    #[command(subcommand)]
    pub action: BalanceAction,

    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    pub config: String,

    #[arg(long, global = true, env = "PULSE_PROFILE")]
    pub profile: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BalanceAction {
    /// Show all six balances for a user
    Show {
        #[arg(long)]
        user: UserId,
    },
    /// Add to or subtract from one balance
    Adjust {
        #[arg(long)]
        user: UserId,
        /// Balance name, e.g. "real_USD" or "admin_BRL"
        #[arg(long)]
        balance_type: String,
        #[arg(long)]
        amount: Decimal,
        /// ADD or SUBTRACT
        #[arg(long)]
        op: BalanceOp,
    },
    /// Convert commission into real balance (+10%)
    Convert {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        amount: Decimal,
        /// BRL or USD
        #[arg(long)]
        currency: Currency,
    },
}

/// Prints the resulting account or receipt as JSON on stdout.
///
/// # Errors
/// Returns an error if services cannot be built or the balance operation
/// is rejected.
pub async fn run_balance(args: BalanceArgs) -> Result<()> {
    let config = super::load_config(&args.config, args.profile.as_deref())?;
    if config.database.is_none() {
        tracing::warn!("No database configured, balances are in-memory and start empty");
    }
    let services = Services::build(config).await?;
    let balances = &services.balances;

    let output = match args.action {
        BalanceAction::Show { user } => {
            serde_json::to_string_pretty(&balances.get_balance(user).await?)?
        }
        BalanceAction::Adjust {
            user,
            balance_type,
            amount,
            op,
        } => {
            let account = balances
                .update_balance(user, &balance_type, amount, op)
                .await?;
            serde_json::to_string_pretty(&account)?
        }
        BalanceAction::Convert {
            user,
            amount,
            currency,
        } => {
            let receipt = balances.convert_commission(user, amount, currency).await?;
            serde_json::to_string_pretty(&receipt)?
        }
    };

    println!("{output}");
    Ok(())
}
