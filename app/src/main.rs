// Copyright (c) 2026 StayPay. MIT License.
// See LICENSE for details.

//! # StayPay Client
//!
//! Entry point for the `staypay` binary. Parses CLI arguments, initializes
//! logging, opens the local activity log, connects to the wallet provider
//! and runs one subcommand:
//!
//! - `status`, `dashboard`, `balances` read the vault and the account
//! - `approve`, `deposit`, `withdraw`, `redeem`, `lend`, `repay`, `mint`
//!   send transactions through the wallet
//! - `switch-network`, `watch` manage the wallet's network
//! - `activity` lists or clears the local loan log
//! - `version` prints build information

mod cli;
mod display;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use ethereum_types::Address;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use staypay_contracts::dashboard::UserBalances;
use staypay_contracts::{parse_amount, FlowError, FlowReport, VaultService};
use staypay_protocol::abi::{address_hex, parse_address};
use staypay_protocol::config::{ClientConfig, KAIROS_CHAIN_ID, KAIROS_CHAIN_NAME};
use staypay_protocol::ledger::{ActivityLedger, SledActivityStore};
use staypay_protocol::rpc::RpcClient;
use staypay_protocol::wallet::{
    format_address, ChainEvent, NetworkStatus, WalletError, WalletSession,
};

use cli::{ActivityCommand, Commands, GlobalArgs, StayPayCli};
use logging::LogFormat;

/// Name of the sled database inside the data directory.
const LEDGER_DB_DIR: &str = "activity";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StayPayCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(
        "staypay=info,staypay_protocol=info,staypay_contracts=info",
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    match cli.command {
        Commands::Activity { command } => run_activity(&cli.global, command),
        command => run_vault_command(&cli.global, command).await,
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Opens (creating if needed) the on-disk activity log.
fn open_ledger(data_dir: &Path) -> Result<ActivityLedger> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let db_path = data_dir.join(LEDGER_DB_DIR);
    let store = SledActivityStore::open(&db_path)
        .with_context(|| format!("failed to open activity database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "activity database opened");
    Ok(ActivityLedger::new(Arc::new(store)))
}

fn client_config(global: &GlobalArgs) -> Result<ClientConfig> {
    let vault = global
        .vault
        .as_deref()
        .context("no vault address; pass --vault or set STAYPAY_VAULT")?;
    let vault: Address =
        parse_address(vault).with_context(|| format!("invalid vault address {vault:?}"))?;

    Ok(ClientConfig::new(vault)
        .with_provider_url(global.rpc_url.clone())
        .with_confirmations(global.confirmations))
}

// ---------------------------------------------------------------------------
// Vault commands
// ---------------------------------------------------------------------------

async fn run_vault_command(global: &GlobalArgs, command: Commands) -> Result<()> {
    let config = client_config(global)?;
    let rpc = RpcClient::http(config.provider_url.clone())
        .with_context(|| format!("failed to create provider for {}", config.provider_url))?;
    let session = Arc::new(WalletSession::new(rpc, config.chain.clone()));
    let ledger = open_ledger(&global.data_dir)?;
    let service = VaultService::new(Arc::clone(&session), ledger, &config);

    tracing::info!(
        provider = %config.provider_url,
        vault = %address_hex(&config.vault_address),
        chain_id = config.chain.id,
        "staypay client starting"
    );

    match command {
        Commands::Status => status(&session).await,
        Commands::Dashboard(out) => {
            // The vault half of the dashboard needs no account.
            if let Err(err) = session.connect().await {
                tracing::warn!(error = %err, "wallet not connected, showing vault data only");
            }
            let dashboard = service.dashboard().await;
            if out.json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                display::print_dashboard(&dashboard);
            }
            Ok(())
        }
        Commands::Balances(out) => {
            let account = session.connect().await.context("failed to connect wallet")?;
            let balances = UserBalances::load(service.vault(), account).await;
            if out.json {
                println!("{}", serde_json::to_string_pretty(&balances)?);
            } else {
                display::print_balances(&balances);
            }
            Ok(())
        }
        Commands::SwitchNetwork => switch_network(&session).await,
        Commands::Watch(args) => watch(&session, Duration::from_secs(args.interval.max(1))).await,
        Commands::Approve(args) => {
            let amount = parse_amount(&args.amount)?;
            run_flow(&service, service.approve(amount)).await
        }
        Commands::Deposit(args) => {
            let amount = parse_amount(&args.amount)?;
            run_flow(&service, service.deposit(amount)).await
        }
        Commands::Withdraw(args) => {
            let amount = parse_amount(&args.amount)?;
            run_flow(&service, service.withdraw(amount)).await
        }
        Commands::Redeem(args) => {
            let shares = parse_amount(&args.amount)?;
            run_flow(&service, service.redeem(shares)).await
        }
        Commands::Lend(args) => {
            let amount = parse_amount(&args.amount)?;
            run_flow(&service, service.lend(amount)).await
        }
        Commands::Repay(args) => run_flow(&service, service.repay(args.principal)).await,
        Commands::Mint(args) => {
            let amount = parse_amount(&args.amount)?;
            run_flow(&service, service.mint(amount)).await
        }
        Commands::Activity { .. } | Commands::Version => unreachable!("handled in main"),
    }
}

/// Connects, then awaits `flow`. A user cancelling in the wallet is not an
/// error: nothing is printed and the exit status is success.
async fn run_flow<F>(service: &VaultService, flow: F) -> Result<()>
where
    F: std::future::Future<Output = Result<FlowReport, FlowError>>,
{
    let session = service.session();
    session.connect().await.context("failed to connect wallet")?;
    if let NetworkStatus::WrongNetwork { actual, expected } = session.network_status() {
        anyhow::bail!(
            "wallet is on chain {actual}, the vault is on chain {expected}; run `staypay switch-network` first"
        );
    }

    match flow.await {
        Ok(report) => {
            display::print_report(&report, session.chain());
            Ok(())
        }
        Err(err) if err.is_cancelled() => {
            tracing::info!("cancelled in wallet");
            Ok(())
        }
        Err(err) => {
            tracing::debug!(error = ?err, "flow failed");
            Err(err.into())
        }
    }
}

async fn status(session: &WalletSession) -> Result<()> {
    let account = session.connect().await.context("failed to connect wallet")?;
    let chain = session.chain();

    println!("Account  {}", format_address(&account));
    match session.network_status() {
        NetworkStatus::Correct => println!("Network  {} ({})", chain.name, chain.id),
        NetworkStatus::WrongNetwork { actual, expected } => {
            println!("Network  chain {actual} (wrong network, vault is on {expected})");
            println!("Run `staypay switch-network` to switch.");
        }
        NetworkStatus::Disconnected => println!("Network  unknown"),
    }
    Ok(())
}

async fn switch_network(session: &WalletSession) -> Result<()> {
    session.connect().await.context("failed to connect wallet")?;
    if session.network_status() == NetworkStatus::Correct {
        println!("Already on {}.", session.chain().name);
        return Ok(());
    }

    match session.switch_network().await {
        Ok(()) => {
            println!("Switched to {}.", session.chain().name);
            Ok(())
        }
        Err(WalletError::Provider(err)) if err.is_user_rejection() => {
            tracing::info!("network switch cancelled in wallet");
            Ok(())
        }
        Err(err) => Err(err).context("failed to switch network"),
    }
}

/// Prints wallet chain and account changes until Ctrl+C.
async fn watch(session: &Arc<WalletSession>, interval: Duration) -> Result<()> {
    session.connect().await.context("failed to connect wallet")?;
    println!("Watching wallet (Ctrl+C to stop)");

    let (handle, mut events) = session.watch_chain(interval);
    let expected = session.chain().id;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChainEvent::ChainChanged { current, .. }) if current == expected => {
                    println!("Network changed to {} ({current})", session.chain().name);
                }
                Ok(ChainEvent::ChainChanged { current, .. }) => {
                    println!("Network changed to chain {current}: wrong network, vault is on {expected}");
                }
                Ok(ChainEvent::AccountChanged { current: Some(account), .. }) => {
                    println!("Account changed to {}", format_address(&account));
                }
                Ok(ChainEvent::AccountChanged { current: None, .. }) => {
                    println!("Wallet disconnected");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watcher fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

fn run_activity(global: &GlobalArgs, command: ActivityCommand) -> Result<()> {
    let ledger = open_ledger(&global.data_dir)?;
    match command {
        ActivityCommand::List(out) => {
            let activities = ledger.get_loan_activities();
            if out.json {
                println!("{}", serde_json::to_string_pretty(&activities)?);
            } else {
                display::print_activities(&activities);
            }
        }
        ActivityCommand::Clear => {
            ledger.clear_loan_activities();
            println!("Loan activity cleared.");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

/// Prints version information to stdout.
fn print_version() {
    println!("staypay {}", env!("CARGO_PKG_VERSION"));
    println!("network {} ({})", KAIROS_CHAIN_NAME, KAIROS_CHAIN_ID);
    println!("rustc   {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
