//! # CLI Interface
//!
//! Defines the command-line argument structure for `staypay` using `clap`
//! derive. Global options select the provider, vault and local data
//! directory; each subcommand is one dashboard view or vault operation.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use staypay_protocol::config::{DEFAULT_CONFIRMATIONS, KAIROS_RPC_URL};

/// StayPay vault client.
///
/// Deposit KRWS into the StayPay vault for spvKRWS shares, borrow against
/// the pool and repay, and keep a local log of loan activity. Transactions
/// are signed by the wallet behind `--rpc-url`.
#[derive(Parser, Debug)]
#[command(
    name = "staypay",
    about = "StayPay vault client",
    version,
    propagate_version = true
)]
pub struct StayPayCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Wallet provider JSON-RPC endpoint.
    ///
    /// Must be able to sign for the account it reports (a wallet daemon or
    /// a node with unlocked accounts). Read-only commands work against any
    /// Kairos node.
    #[arg(long, global = true, env = "STAYPAY_RPC_URL", default_value = KAIROS_RPC_URL)]
    pub rpc_url: String,

    /// Address of the StayPay vault contract.
    #[arg(long, global = true, env = "STAYPAY_VAULT")]
    pub vault: Option<String>,

    /// Directory holding the local loan activity database.
    #[arg(long, short = 'd', global = true, env = "STAYPAY_DATA_DIR", default_value = ".staypay")]
    pub data_dir: PathBuf,

    /// Blocks to wait for before a transaction counts as confirmed.
    #[arg(long, global = true, env = "STAYPAY_CONFIRMATIONS", default_value_t = DEFAULT_CONFIRMATIONS)]
    pub confirmations: u64,

    /// Log output format: pretty or json.
    #[arg(long, global = true, env = "STAYPAY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the wallet and report account and network.
    Status,
    /// Show vault statistics, exchange rate and your position.
    Dashboard(OutputArgs),
    /// Show your KAIA, KRWS and spvKRWS balances.
    Balances(OutputArgs),
    /// Approve the vault to spend KRWS.
    Approve(AmountArgs),
    /// Deposit KRWS into the vault, approving first if needed.
    Deposit(AmountArgs),
    /// Withdraw KRWS from the vault.
    Withdraw(AmountArgs),
    /// Redeem spvKRWS shares for KRWS.
    Redeem(AmountArgs),
    /// Borrow KRWS from the vault.
    Lend(AmountArgs),
    /// Repay your outstanding debt in full.
    Repay(RepayArgs),
    /// Mint test KRWS to your account (test network only).
    Mint(AmountArgs),
    /// Ask the wallet to switch to the vault's network.
    SwitchNetwork,
    /// Follow wallet chain and account changes until interrupted.
    Watch(WatchArgs),
    /// Inspect or clear the local loan activity log.
    Activity {
        #[command(subcommand)]
        command: ActivityCommand,
    },
    /// Print version information and exit.
    Version,
}

/// A token amount typed by the user.
#[derive(Args, Debug)]
pub struct AmountArgs {
    /// Amount in whole tokens, e.g. `1500` or `0.25`.
    pub amount: String,
}

/// Arguments for `repay`.
#[derive(Args, Debug)]
pub struct RepayArgs {
    /// Principal of the loan being repaid, in KRWS.
    ///
    /// Defaults to your most recent open loan in the activity log.
    #[arg(long, value_parser = parse_principal)]
    pub principal: Option<f64>,
}

fn parse_principal(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.trim().parse().map_err(|_| format!("`{raw}` is not a number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("`{raw}` must be a finite amount greater than zero"))
    }
}

/// Output selection for read commands.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between wallet polls.
    #[arg(long, default_value_t = 4)]
    pub interval: u64,
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
    /// List recorded loan activity, newest first.
    List(OutputArgs),
    /// Delete the whole activity log.
    Clear,
}
