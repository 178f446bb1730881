//! # Transaction Submission & Confirmation
//!
//! Every write the client makes follows the same shape: hand calldata to
//! the wallet, get a hash back, then poll for the receipt until it has
//! enough confirmations. This module owns that shape and the error
//! taxonomy around it.
//!
//! ## Error classes
//!
//! - **Cancelled**: the user declined in the wallet. Not a failure; callers
//!   reset and say nothing.
//! - **Failed**: anything else the provider threw. Shown to users only as
//!   "`<Action>` failed, please try again"; the cause goes to the log.
//! - **Reverted** / **Timeout**: the transaction was sent but did not land
//!   cleanly.

use std::fmt;
use std::time::Duration;

use ethereum_types::{Address, H256};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::rpc::{tx_hash_hex, ProviderError, RpcClient, TransactionReceipt};
use crate::wallet::{WalletError, WalletSession};

// ---------------------------------------------------------------------------
// TxAction
// ---------------------------------------------------------------------------

/// The user-facing operation a transaction belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxAction {
    Approve,
    Deposit,
    Withdraw,
    Redeem,
    Lend,
    Repay,
    Mint,
}

impl TxAction {
    pub fn label(&self) -> &'static str {
        match self {
            TxAction::Approve => "Approve",
            TxAction::Deposit => "Deposit",
            TxAction::Withdraw => "Withdraw",
            TxAction::Redeem => "Redeem",
            TxAction::Lend => "Lend",
            TxAction::Repay => "Repay",
            TxAction::Mint => "Mint",
        }
    }
}

impl fmt::Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TxError {
    /// User said no in the wallet.
    #[error("{action} cancelled")]
    Cancelled { action: TxAction },

    /// Generic failure. The display string is what users see.
    #[error("{action} failed, please try again")]
    Failed {
        action: TxAction,
        #[source]
        source: ProviderError,
    },

    #[error("{action} transaction {hash} reverted")]
    Reverted { action: TxAction, hash: String },

    #[error("{action} transaction {hash} not confirmed after {waited_secs}s")]
    Timeout {
        action: TxAction,
        hash: String,
        waited_secs: u64,
    },

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl TxError {
    /// Sorts a provider error into cancelled vs failed.
    pub fn classify(action: TxAction, err: ProviderError) -> Self {
        if err.is_user_rejection() {
            TxError::Cancelled { action }
        } else {
            TxError::Failed {
                action,
                source: err,
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            TxError::Cancelled { .. } => true,
            TxError::Wallet(WalletError::Provider(err)) => err.is_user_rejection(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Sends `calldata` to `to` from the session's account.
///
/// Fails fast without touching the wallet if the session is disconnected or
/// on the wrong chain.
pub async fn submit(
    session: &WalletSession,
    action: TxAction,
    to: Address,
    calldata: &[u8],
) -> Result<H256, TxError> {
    tracing::debug!(%action, ?to, "requesting signature");
    match session.send_transaction(to, calldata).await {
        Ok(hash) => {
            tracing::info!(%action, hash = %tx_hash_hex(&hash), "transaction submitted");
            Ok(hash)
        }
        Err(WalletError::Provider(err)) => {
            let classified = TxError::classify(action, err);
            match &classified {
                TxError::Cancelled { .. } => tracing::info!(%action, "user rejected transaction"),
                other => tracing::error!(%action, error = ?other, "transaction submission failed"),
            }
            Err(classified)
        }
        Err(err) => Err(err.into()),
    }
}

// ---------------------------------------------------------------------------
// ReceiptWaiter
// ---------------------------------------------------------------------------

/// Polls for a receipt until it is confirmed deeply enough.
#[derive(Clone, Copy, Debug)]
pub struct ReceiptWaiter {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub confirmations: u64,
}

impl ReceiptWaiter {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.receipt_poll_interval,
            timeout: config.receipt_timeout,
            confirmations: config.confirmations.max(1),
        }
    }

    /// Waits for `hash` to be mined with `confirmations` blocks on top
    /// (counting its own).
    ///
    /// Transient provider errors while polling are logged and retried until
    /// the timeout; a reverted receipt ends the wait immediately.
    pub async fn wait(
        &self,
        rpc: &RpcClient,
        action: TxAction,
        hash: H256,
    ) -> Result<TransactionReceipt, TxError> {
        let started = Instant::now();
        let hash_hex = tx_hash_hex(&hash);

        loop {
            match self.poll_once(rpc, hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.succeeded() {
                        tracing::warn!(%action, hash = %hash_hex, "transaction reverted");
                        return Err(TxError::Reverted {
                            action,
                            hash: hash_hex,
                        });
                    }
                    tracing::info!(
                        %action,
                        hash = %hash_hex,
                        block = ?receipt.block(),
                        "transaction confirmed"
                    );
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(%action, error = %err, "receipt poll failed"),
            }

            if started.elapsed() >= self.timeout {
                return Err(TxError::Timeout {
                    action,
                    hash: hash_hex,
                    waited_secs: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// `Some` once the receipt exists and is deep enough.
    async fn poll_once(
        &self,
        rpc: &RpcClient,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let Some(receipt) = rpc.transaction_receipt(hash).await? else {
            return Ok(None);
        };
        // A revert is final however many blocks sit on top of it.
        if !receipt.succeeded() || self.confirmations <= 1 {
            return Ok(Some(receipt));
        }
        let Some(mined_at) = receipt.block() else {
            return Ok(None);
        };
        let head = rpc.block_number().await?;
        let depth = head.saturating_sub(mined_at) + 1;
        Ok((depth >= self.confirmations).then_some(receipt))
    }
}
