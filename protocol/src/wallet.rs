//! # Wallet Session
//!
//! The connection between this client and the user's wallet: which account
//! is authorized and which chain the wallet is pointed at. A
//! [`WalletSession`] is created once per run and handed explicitly to
//! everything that needs it, so there is no global "current wallet".
//!
//! ## Network detection
//!
//! The vault lives on a single chain. A session connected to any other
//! chain reports [`NetworkStatus::WrongNetwork`] and refuses to send
//! transactions until [`WalletSession::switch_network`] succeeds.
//!
//! ```text
//! Disconnected ──connect()──► Correct ◄──switch_network()── WrongNetwork
//!       ▲                        │                               ▲
//!       └──────disconnect()──────┴────── chain changed ──────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use ethereum_types::{Address, H256};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::abi::address_hex;
use crate::config::{ChainDefinition, UNRECOGNIZED_CHAIN_CODE};
use crate::rpc::{ProviderError, RpcClient, TxRequest};

/// Capacity of the chain event channel. Chain switches are rare; a slow
/// subscriber only needs room for a handful.
const CHAIN_EVENT_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet returned no accounts")]
    NoAccounts,

    #[error("wallet not connected")]
    NotConnected,

    #[error("wrong network: wallet is on chain {actual}, vault is on chain {expected}")]
    WrongNetwork { actual: u64, expected: u64 },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Snapshot of what the wallet has told us.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

/// Where the session stands relative to the target chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Disconnected,
    Correct,
    WrongNetwork { actual: u64, expected: u64 },
}

/// Pushed to [`WalletSession::watch_chain`] subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    ChainChanged { previous: Option<u64>, current: u64 },
    AccountChanged { previous: Option<Address>, current: Option<Address> },
}

/// `0x1234...abcd`, the way wallets show an address in a header.
pub fn format_address(address: &Address) -> String {
    let full = address_hex(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

// ---------------------------------------------------------------------------
// WalletSession
// ---------------------------------------------------------------------------

pub struct WalletSession {
    rpc: RpcClient,
    chain: ChainDefinition,
    state: RwLock<ConnectionState>,
}

impl WalletSession {
    pub fn new(rpc: RpcClient, chain: ChainDefinition) -> Self {
        Self {
            rpc,
            chain,
            state: RwLock::new(ConnectionState::default()),
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn chain(&self) -> &ChainDefinition {
        &self.chain
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn account(&self) -> Option<Address> {
        self.state.read().account
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().account.is_some()
    }

    /// Requests account access and records the first account and the
    /// wallet's current chain.
    pub async fn connect(&self) -> Result<Address, WalletError> {
        let accounts = self.rpc.request_accounts().await?;
        let account = *accounts.first().ok_or(WalletError::NoAccounts)?;
        let chain_id = self.rpc.chain_id().await?;

        *self.state.write() = ConnectionState {
            account: Some(account),
            chain_id: Some(chain_id),
        };

        tracing::info!(
            account = %address_hex(&account),
            chain_id,
            expected_chain = self.chain.id,
            "wallet connected"
        );
        Ok(account)
    }

    /// Forgets the account. The wallet itself keeps its authorization.
    pub fn disconnect(&self) {
        *self.state.write() = ConnectionState::default();
        tracing::info!("wallet disconnected");
    }

    /// Re-reads the wallet's chain id.
    pub async fn refresh_chain(&self) -> Result<u64, WalletError> {
        let chain_id = self.rpc.chain_id().await?;
        self.state.write().chain_id = Some(chain_id);
        Ok(chain_id)
    }

    pub fn network_status(&self) -> NetworkStatus {
        let state = self.state.read();
        match (state.account, state.chain_id) {
            (None, _) | (_, None) => NetworkStatus::Disconnected,
            (Some(_), Some(id)) if id == self.chain.id => NetworkStatus::Correct,
            (Some(_), Some(actual)) => NetworkStatus::WrongNetwork {
                actual,
                expected: self.chain.id,
            },
        }
    }

    /// The connected account, provided the wallet is on the vault's chain.
    pub fn require_ready(&self) -> Result<Address, WalletError> {
        match self.network_status() {
            NetworkStatus::Disconnected => Err(WalletError::NotConnected),
            NetworkStatus::WrongNetwork { actual, expected } => {
                Err(WalletError::WrongNetwork { actual, expected })
            }
            NetworkStatus::Correct => self.account().ok_or(WalletError::NotConnected),
        }
    }

    /// Asks the wallet to sign and send a call from the connected account.
    /// Refuses without contacting the wallet unless the session is ready.
    pub async fn send_transaction(&self, to: Address, calldata: &[u8]) -> Result<H256, WalletError> {
        let from = self.require_ready()?;
        let request = TxRequest::call(from, to, calldata);
        Ok(self.rpc.send_transaction(&request).await?)
    }

    /// Asks the wallet to move to the vault's chain, registering the chain
    /// first if the wallet has never seen it.
    pub async fn switch_network(&self) -> Result<(), WalletError> {
        match self.rpc.switch_chain(self.chain.id).await {
            Ok(()) => {}
            Err(err) if err.code() == Some(UNRECOGNIZED_CHAIN_CODE) => {
                tracing::info!(chain_id = self.chain.id, "wallet does not know chain, adding it");
                self.rpc.add_chain(&self.chain).await?;
                self.rpc.switch_chain(self.chain.id).await?;
            }
            Err(err) => return Err(err.into()),
        }

        let chain_id = self.refresh_chain().await?;
        if chain_id != self.chain.id {
            return Err(WalletError::WrongNetwork {
                actual: chain_id,
                expected: self.chain.id,
            });
        }
        tracing::info!(chain_id, "switched network");
        Ok(())
    }

    /// One watcher pass: re-read chain id and accounts, returning whatever
    /// changed.
    pub async fn poll_changes(&self) -> Result<Vec<ChainEvent>, WalletError> {
        let chain_id = self.rpc.chain_id().await?;
        let accounts = self.rpc.accounts().await?;
        let current_account = accounts.first().copied();

        let mut events = Vec::new();
        let mut state = self.state.write();
        if state.chain_id != Some(chain_id) {
            events.push(ChainEvent::ChainChanged {
                previous: state.chain_id,
                current: chain_id,
            });
            state.chain_id = Some(chain_id);
        }
        if state.account != current_account {
            events.push(ChainEvent::AccountChanged {
                previous: state.account,
                current: current_account,
            });
            state.account = current_account;
        }
        Ok(events)
    }

    /// Spawns a task that polls the wallet every `interval` and broadcasts
    /// chain and account changes. Abort the handle to stop it.
    pub fn watch_chain(
        self: &Arc<Self>,
        interval: Duration,
    ) -> (JoinHandle<()>, broadcast::Receiver<ChainEvent>) {
        let (tx, rx) = broadcast::channel(CHAIN_EVENT_CAPACITY);
        let session = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match session.poll_changes().await {
                    Ok(events) => {
                        for event in events {
                            tracing::info!(?event, "wallet state changed");
                            // No subscribers is fine.
                            let _ = tx.send(event);
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "chain watcher poll failed"),
                }
            }
        });

        (handle, rx)
    }
}
