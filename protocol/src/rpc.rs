//! # Wallet Provider & JSON-RPC Client
//!
//! Everything the client knows about the chain comes through a single
//! [`Provider`]: an object that accepts a JSON-RPC method name and params
//! and returns the raw JSON result. In a browser this is the injected
//! wallet; here it is any endpoint that speaks the same methods (a signing
//! wallet daemon, or a dev node with unlocked accounts).
//!
//! [`RpcClient`] layers typed wrappers over the handful of methods we use.
//!
//! ## Method Index
//!
//! | Method                        | Wrapper                      |
//! |-------------------------------|------------------------------|
//! | `eth_chainId`                 | [`RpcClient::chain_id`]      |
//! | `eth_accounts`                | [`RpcClient::accounts`]      |
//! | `eth_requestAccounts`         | [`RpcClient::request_accounts`] |
//! | `eth_blockNumber`             | [`RpcClient::block_number`]  |
//! | `eth_getBalance`              | [`RpcClient::get_balance`]   |
//! | `eth_call`                    | [`RpcClient::call`]          |
//! | `eth_sendTransaction`         | [`RpcClient::send_transaction`] |
//! | `eth_getTransactionReceipt`   | [`RpcClient::transaction_receipt`] |
//! | `wallet_switchEthereumChain`  | [`RpcClient::switch_chain`]  |
//! | `wallet_addEthereumChain`     | [`RpcClient::add_chain`]     |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::abi::{address_hex, from_hex_data, parse_address, to_hex_data};
use crate::config::{ChainDefinition, RPC_TIMEOUT, USER_REJECTED_CODE};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a provider round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never got a JSON-RPC answer (connection refused,
    /// timeout, non-JSON body).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The provider answered, but not with what the method promises.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Message fragments wallets use when the user says no.
const REJECTION_MARKERS: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected the request",
    "denied transaction",
];

impl ProviderError {
    /// The JSON-RPC error code, if the provider sent one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// `true` when the user declined the request in their wallet.
    ///
    /// Wallets disagree on codes, so besides EIP-1193's 4001 this falls
    /// back to matching the message text.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            ProviderError::Rpc { code, message } => {
                if *code == USER_REJECTED_CODE {
                    return true;
                }
                let message = message.to_lowercase();
                REJECTION_MARKERS.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }
}

pub type RpcResult<T> = Result<T, ProviderError>;

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A JSON-RPC speaking wallet provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Sends one request and returns its `result` (which may be `null`).
    async fn request(&self, method: &str, params: Value) -> RpcResult<Value>;
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope.
///
/// `result: null` and a missing `result` both deserialize to `None`; only
/// the presence of `error` decides failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Collapses the envelope into the provider result.
    pub fn into_result(self) -> RpcResult<Value> {
        match self.error {
            Some(err) => Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Provider backed by an HTTP JSON-RPC endpoint.
pub struct HttpProvider {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> RpcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> RpcResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = JsonRpcRequest::new(id, method, params);
        tracing::trace!(id, method, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("malformed response body: {e}")))?;

        envelope.into_result()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Parameters for `eth_sendTransaction`. The wallet fills in gas and nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: String,
    pub to: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl TxRequest {
    /// A contract call carrying `calldata` and no value.
    pub fn call(from: Address, to: Address, calldata: &[u8]) -> Self {
        Self {
            from: address_hex(&from),
            to: address_hex(&to),
            data: to_hex_data(calldata),
            value: None,
        }
    }
}

/// The subset of `eth_getTransactionReceipt` we care about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    /// `0x1` success, `0x0` revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
}

impl TransactionReceipt {
    pub fn block(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(|b| parse_quantity(b).ok())
    }

    pub fn succeeded(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => parse_quantity(status).map(|s| s == 1).unwrap_or(false),
            None => true,
        }
    }
}

/// Parses a `0x`-prefixed hex quantity into a `u64`.
pub fn parse_quantity(text: &str) -> RpcResult<u64> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad quantity {text:?}: {e}")))
}

/// Parses a `0x`-prefixed hex quantity into a `U256`.
pub fn parse_quantity_u256(text: &str) -> RpcResult<U256> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad quantity {text:?}: {e:?}")))
}

/// Parses a 32-byte transaction hash.
pub fn parse_tx_hash(text: &str) -> RpcResult<H256> {
    let bytes = from_hex_data(text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(ProviderError::InvalidResponse(format!(
            "transaction hash {text:?} is {} bytes",
            bytes.len()
        )));
    }
    Ok(H256::from_slice(&bytes))
}

/// Full lowercase `0x` form of a transaction hash.
pub fn tx_hash_hex(hash: &H256) -> String {
    to_hex_data(hash.as_bytes())
}

fn expect_str<'a>(value: &'a Value, method: &str) -> RpcResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("{method} returned {value}")))
}

fn parse_account_list(value: &Value, method: &str) -> RpcResult<Vec<Address>> {
    let list = value
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse(format!("{method} returned {value}")))?;
    list.iter()
        .map(|entry| {
            let text = expect_str(entry, method)?;
            parse_address(text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// RpcClient
// ---------------------------------------------------------------------------

/// Typed access to the provider. Cheap to clone.
#[derive(Clone)]
pub struct RpcClient {
    provider: Arc<dyn Provider>,
}

impl RpcClient {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Connects to an HTTP endpoint.
    pub fn http(url: impl Into<String>) -> RpcResult<Self> {
        Ok(Self::new(Arc::new(HttpProvider::new(url)?)))
    }

    /// Escape hatch for methods without a typed wrapper.
    pub async fn raw(&self, method: &str, params: Value) -> RpcResult<Value> {
        self.provider.request(method, params).await
    }

    pub async fn chain_id(&self) -> RpcResult<u64> {
        let value = self.raw("eth_chainId", json!([])).await?;
        parse_quantity(expect_str(&value, "eth_chainId")?)
    }

    /// Accounts already authorized, without prompting.
    pub async fn accounts(&self) -> RpcResult<Vec<Address>> {
        let value = self.raw("eth_accounts", json!([])).await?;
        parse_account_list(&value, "eth_accounts")
    }

    /// Asks the wallet to authorize this client. May prompt the user.
    pub async fn request_accounts(&self) -> RpcResult<Vec<Address>> {
        let value = self.raw("eth_requestAccounts", json!([])).await?;
        parse_account_list(&value, "eth_requestAccounts")
    }

    pub async fn block_number(&self) -> RpcResult<u64> {
        let value = self.raw("eth_blockNumber", json!([])).await?;
        parse_quantity(expect_str(&value, "eth_blockNumber")?)
    }

    /// Native (gas token) balance in base units.
    pub async fn get_balance(&self, account: Address) -> RpcResult<U256> {
        let value = self
            .raw("eth_getBalance", json!([address_hex(&account), "latest"]))
            .await?;
        parse_quantity_u256(expect_str(&value, "eth_getBalance")?)
    }

    /// Read-only contract call against the latest block.
    pub async fn call(&self, to: Address, calldata: &[u8]) -> RpcResult<Vec<u8>> {
        let params = json!([{ "to": address_hex(&to), "data": to_hex_data(calldata) }, "latest"]);
        let value = self.raw("eth_call", params).await?;
        from_hex_data(expect_str(&value, "eth_call")?)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    /// Hands a transaction to the wallet for signing and broadcast.
    pub async fn send_transaction(&self, tx: &TxRequest) -> RpcResult<H256> {
        let params = serde_json::to_value(tx)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let value = self.raw("eth_sendTransaction", json!([params])).await?;
        parse_tx_hash(expect_str(&value, "eth_sendTransaction")?)
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, hash: H256) -> RpcResult<Option<TransactionReceipt>> {
        let value = self
            .raw("eth_getTransactionReceipt", json!([tx_hash_hex(&hash)]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad receipt: {e}")))
    }

    pub async fn switch_chain(&self, chain_id: u64) -> RpcResult<()> {
        self.raw(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("0x{chain_id:x}") }]),
        )
        .await
        .map(|_| ())
    }

    pub async fn add_chain(&self, chain: &ChainDefinition) -> RpcResult<()> {
        self.raw("wallet_addEthereumChain", chain.add_chain_params())
            .await
            .map(|_| ())
    }
}
