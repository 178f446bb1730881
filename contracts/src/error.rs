//! Error types for contract bindings and vault flows.

use ethereum_types::U256;
use thiserror::Error;

use staypay_protocol::abi::AbiError;
use staypay_protocol::rpc::ProviderError;
use staypay_protocol::tx::TxError;
use staypay_protocol::units::UnitsError;
use staypay_protocol::wallet::WalletError;

/// A contract read went wrong.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("could not decode {function} result: {source}")]
    Decode {
        function: &'static str,
        #[source]
        source: AbiError,
    },
}

/// Errors from a multi-step vault flow.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("invalid amount: {0}")]
    Units(#[from] UnitsError),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Tx(#[from] TxError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    /// `asset()` could not be read, so there is no token to approve.
    #[error("{symbol} token address not available, please try again")]
    AssetUnavailable {
        symbol: &'static str,
        #[source]
        source: ContractError,
    },

    #[error("amount exceeds maximum withdrawable ({max} base units)")]
    ExceedsMaxWithdraw { requested: U256, max: U256 },

    /// The approval was mined but the allowance never caught up.
    #[error("allowance still {seen} after approval, needed {needed}")]
    AllowanceNotVisible { seen: U256, needed: U256 },

    #[error("principal must be a finite amount greater than zero, got {0}")]
    InvalidPrincipal(f64),

    #[error("no open loan recorded for this account; pass the principal explicitly")]
    NoOpenLoan,

    #[error("account has no outstanding debt")]
    NoOutstandingDebt,
}

impl FlowError {
    /// The user backed out in their wallet. Callers stay quiet about it.
    pub fn is_cancelled(&self) -> bool {
        match self {
            FlowError::Tx(err) => err.is_cancelled(),
            FlowError::Wallet(WalletError::Provider(err)) => err.is_user_rejection(),
            _ => false,
        }
    }
}
