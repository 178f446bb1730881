//! # Client Configuration & Constants
//!
//! Every magic number in the StayPay client lives here. The chain definition,
//! token precision, storage key, polling cadence and the relative-time
//! buckets used by the activity feed all come from this module.
//!
//! [`ClientConfig`] is the runtime counterpart: the handful of values a user
//! can override from the command line or the environment.

use std::time::Duration;

use ethereum_types::Address;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Target Network
// ---------------------------------------------------------------------------

/// Chain id of the Kaia Kairos test network. The only network the vault is
/// deployed on.
pub const KAIROS_CHAIN_ID: u64 = 1001;

/// Human-readable network name, as shown by wallets.
pub const KAIROS_CHAIN_NAME: &str = "Kaia Kairos Testnet";

/// Public RPC endpoint for Kairos.
pub const KAIROS_RPC_URL: &str = "https://public-en-kairos.node.kaia.io";

/// Block explorer for Kairos.
pub const KAIROS_EXPLORER_NAME: &str = "KaiaScan";
pub const KAIROS_EXPLORER_URL: &str = "https://kairos.kaiascan.io";

/// Native gas token of the network.
pub const NATIVE_CURRENCY_NAME: &str = "KAIA";
pub const NATIVE_CURRENCY_SYMBOL: &str = "KAIA";

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Decimals of KAIA, KRWS and spvKRWS alike.
pub const TOKEN_DECIMALS: u32 = 18;

/// Symbol of the vault's base asset.
pub const ASSET_SYMBOL: &str = "KRWS";

/// Symbol of the vault share token.
pub const SHARE_SYMBOL: &str = "spvKRWS";

// ---------------------------------------------------------------------------
// Activity Ledger
// ---------------------------------------------------------------------------

/// The single namespaced key that holds the serialized activity list.
pub const LOAN_ACTIVITY_STORAGE_KEY: &str = "staypay_loan_activities";

/// Two principals closer than this are considered the same loan.
pub const PRINCIPAL_MATCH_TOLERANCE: f64 = 0.01;

/// Prefix of locally generated activity ids.
pub const ACTIVITY_ID_PREFIX: &str = "loan";

/// Number of random base-36 characters appended to activity ids.
pub const ACTIVITY_ID_SUFFIX_LEN: usize = 9;

/// Milliseconds per day, for loan durations.
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

// Relative-time buckets, in seconds.
pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 604_800;
pub const SECONDS_PER_MONTH: i64 = 2_592_000;

// ---------------------------------------------------------------------------
// Provider & Transactions
// ---------------------------------------------------------------------------

/// HTTP timeout for a single JSON-RPC round trip.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// EIP-1193 code for a request the user rejected in their wallet.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-3326 code returned by `wallet_switchEthereumChain` when the wallet
/// has never heard of the chain.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// How often to ask the provider for a pending receipt.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up on a receipt after this long. Kairos blocks are ~1s, so this is
/// a lot of blocks.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Confirmations required before a transaction counts as settled.
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// Interval between allowance re-reads after an approval lands.
pub const DEFAULT_ALLOWANCE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Allowance re-reads before declaring the approval lost.
pub const DEFAULT_ALLOWANCE_POLL_ATTEMPTS: u32 = 10;

/// How often the chain watcher polls `eth_chainId`.
pub const DEFAULT_CHAIN_POLL_INTERVAL: Duration = Duration::from_secs(4);

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Lower edge of the utilization band the vault aims for, in percent.
pub const UTILIZATION_OPTIMAL_LOW: f64 = 60.0;

/// Upper edge of the utilization band, in percent.
pub const UTILIZATION_OPTIMAL_HIGH: f64 = 80.0;

// ---------------------------------------------------------------------------
// Chain Definition
// ---------------------------------------------------------------------------

/// Native currency metadata, in the shape wallets expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

/// A block explorer endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockExplorer {
    pub name: String,
    pub url: String,
}

/// Everything a wallet needs to know to talk to a network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_url: String,
    pub explorer: BlockExplorer,
    pub testnet: bool,
}

impl ChainDefinition {
    /// The Kaia Kairos test network.
    pub fn kairos() -> Self {
        Self {
            id: KAIROS_CHAIN_ID,
            name: KAIROS_CHAIN_NAME.to_string(),
            native_currency: NativeCurrency {
                name: NATIVE_CURRENCY_NAME.to_string(),
                symbol: NATIVE_CURRENCY_SYMBOL.to_string(),
                decimals: TOKEN_DECIMALS,
            },
            rpc_url: KAIROS_RPC_URL.to_string(),
            explorer: BlockExplorer {
                name: KAIROS_EXPLORER_NAME.to_string(),
                url: KAIROS_EXPLORER_URL.to_string(),
            },
            testnet: true,
        }
    }

    /// Chain id as the `0x`-prefixed quantity wallets use on the wire.
    pub fn hex_id(&self) -> String {
        format!("0x{:x}", self.id)
    }

    /// Explorer link for a transaction hash.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer.url.trim_end_matches('/'), tx_hash)
    }

    /// Parameters for `wallet_addEthereumChain` (EIP-3085).
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!([{
            "chainId": self.hex_id(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": [self.rpc_url],
            "blockExplorerUrls": [self.explorer.url],
        }])
    }
}

impl Default for ChainDefinition {
    fn default() -> Self {
        Self::kairos()
    }
}

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Runtime settings for a client session.
///
/// The binary fills this from CLI flags and `STAYPAY_*` environment
/// variables; tests build it directly.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// The network the vault lives on.
    pub chain: ChainDefinition,
    /// Wallet provider endpoint. Defaults to the chain's public RPC.
    pub provider_url: String,
    /// Address of the StayPay vault contract.
    pub vault_address: Address,
    /// Confirmations to wait for on every write.
    pub confirmations: u64,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
    pub allowance_poll_interval: Duration,
    pub allowance_poll_attempts: u32,
}

impl ClientConfig {
    /// Builds a config for `vault_address` on Kairos with default timings.
    pub fn new(vault_address: Address) -> Self {
        let chain = ChainDefinition::kairos();
        Self {
            provider_url: chain.rpc_url.clone(),
            chain,
            vault_address,
            confirmations: DEFAULT_CONFIRMATIONS,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            allowance_poll_interval: DEFAULT_ALLOWANCE_POLL_INTERVAL,
            allowance_poll_attempts: DEFAULT_ALLOWANCE_POLL_ATTEMPTS,
        }
    }

    /// Overrides the provider endpoint.
    pub fn with_provider_url(mut self, url: impl Into<String>) -> Self {
        self.provider_url = url.into();
        self
    }

    /// Overrides the confirmation depth. Zero is bumped to one: a receipt
    /// is itself the first confirmation.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }
}
