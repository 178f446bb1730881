//! A simulated Kairos node hosting the vault and its base asset.
//!
//! `FakeChain` answers the JSON-RPC methods the client uses and applies
//! token and vault writes to in-memory balances, so flows can be driven end
//! to end. Shares price 1:1 against assets; every write mines its own block.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use parking_lot::Mutex;
use serde_json::{json, Value};

use staypay_contracts::{token, vault, VaultService};
use staypay_protocol::abi::{address_hex, from_hex_data, parse_address, selector, to_hex_data};
use staypay_protocol::config::ClientConfig;
use staypay_protocol::ledger::ActivityLedger;
use staypay_protocol::rpc::{Provider, ProviderError, RpcClient, RpcResult};
use staypay_protocol::wallet::WalletSession;

pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const VAULT: Address = Address::repeat_byte(0xee);
pub const KRWS: Address = Address::repeat_byte(0xcc);

/// `n` whole tokens in base units.
pub fn krws(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

#[derive(Default)]
pub struct ChainState {
    pub chain_id: u64,
    pub block: u64,
    pub native: U256,
    pub tokens: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    pub shares: HashMap<Address, U256>,
    pub total_assets: U256,
    pub loaned: U256,
    pub debt: HashMap<Address, U256>,
    /// Fee added to each loan, in basis points of principal.
    pub fee_bps: u64,
    /// Allowance reads that still return the pre-approval value.
    pub allowance_lag: u32,
    stale_allowance: Option<U256>,
    /// Functions (by signature) the user will refuse to sign.
    pub rejected: HashSet<&'static str>,
    /// Functions (by signature) whose `eth_call` errors.
    pub broken_reads: HashSet<&'static str>,
    receipts: HashMap<H256, Value>,
    /// Signatures of every transaction sent, in order.
    pub sent: Vec<&'static str>,
}

pub struct FakeChain {
    pub state: Mutex<ChainState>,
}

const KNOWN: &[&str] = &[
    token::BALANCE_OF,
    token::ALLOWANCE,
    token::APPROVE,
    token::MINT,
    vault::TOTAL_ASSETS,
    vault::LOANED_PRINCIPAL,
    vault::ASSET,
    vault::CONVERT_TO_ASSETS,
    vault::CONVERT_TO_SHARES,
    vault::MAX_WITHDRAW,
    vault::DEBT_OF,
    vault::DEPOSIT,
    vault::WITHDRAW,
    vault::REDEEM,
    vault::LEND,
    vault::REPAY,
];

fn signature_of(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }
    // balanceOf has the same selector on both contracts.
    KNOWN.iter().copied().find(|sig| selector(sig)[..] == data[..4])
}

fn word(data: &[u8], index: usize) -> &[u8] {
    let start = 4 + index * 32;
    &data[start..start + 32]
}

fn uint_arg(data: &[u8], index: usize) -> U256 {
    U256::from_big_endian(word(data, index))
}

fn address_arg(data: &[u8], index: usize) -> Address {
    Address::from_slice(&word(data, index)[12..])
}

fn encode_word(value: U256) -> Value {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    json!(to_hex_data(&out))
}

fn quantity(value: u64) -> Value {
    json!(format!("0x{value:x}"))
}

fn invalid(message: &str) -> ProviderError {
    ProviderError::InvalidResponse(message.to_string())
}

/// Pulls `amount` of the asset from `from` into the vault.
fn spend(s: &mut ChainState, from: Address, amount: U256) -> bool {
    let allowance = s.allowances.get(&(from, VAULT)).copied().unwrap_or_default();
    let balance = s.tokens.get(&from).copied().unwrap_or_default();
    if allowance < amount || balance < amount {
        return false;
    }
    s.allowances.insert((from, VAULT), allowance - amount);
    s.tokens.insert(from, balance - amount);
    true
}

impl FakeChain {
    /// Kairos, Alice holding 10M KRWS and 5 KAIA, an empty vault.
    pub fn new() -> Arc<Self> {
        let mut state = ChainState {
            chain_id: 1001,
            block: 100,
            native: U256::exp10(18) * 5,
            fee_bps: 250,
            ..Default::default()
        };
        state.tokens.insert(ALICE, krws(10_000_000));
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn token_balance(&self, owner: Address) -> U256 {
        self.state.lock().tokens.get(&owner).copied().unwrap_or_default()
    }

    pub fn shares_of(&self, owner: Address) -> U256 {
        self.state.lock().shares.get(&owner).copied().unwrap_or_default()
    }

    pub fn debt_of(&self, owner: Address) -> U256 {
        self.state.lock().debt.get(&owner).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<&'static str> {
        self.state.lock().sent.clone()
    }

    fn call(&self, to: Address, data: &[u8]) -> RpcResult<Value> {
        let sig = signature_of(data).ok_or_else(|| invalid("unknown selector"))?;
        let mut s = self.state.lock();
        if s.broken_reads.contains(sig) {
            return Err(ProviderError::Rpc {
                code: -32000,
                message: format!("execution reverted: {sig}"),
            });
        }

        let value = match (to, sig) {
            (t, token::BALANCE_OF) if t == KRWS => {
                s.tokens.get(&address_arg(data, 0)).copied().unwrap_or_default()
            }
            (t, vault::BALANCE_OF) if t == VAULT => {
                s.shares.get(&address_arg(data, 0)).copied().unwrap_or_default()
            }
            (_, token::ALLOWANCE) => {
                let key = (address_arg(data, 0), address_arg(data, 1));
                let current = s.allowances.get(&key).copied().unwrap_or_default();
                let stale = s.stale_allowance;
                match stale {
                    Some(old) if s.allowance_lag > 0 => {
                        s.allowance_lag -= 1;
                        old
                    }
                    _ => current,
                }
            }
            (_, vault::TOTAL_ASSETS) => s.total_assets,
            (_, vault::LOANED_PRINCIPAL) => s.loaned,
            (_, vault::ASSET) => {
                let mut out = [0u8; 32];
                out[12..].copy_from_slice(KRWS.as_bytes());
                return Ok(json!(to_hex_data(&out)));
            }
            (_, vault::CONVERT_TO_ASSETS) | (_, vault::CONVERT_TO_SHARES) => uint_arg(data, 0),
            (_, vault::MAX_WITHDRAW) => {
                let owned = s.shares.get(&address_arg(data, 0)).copied().unwrap_or_default();
                owned.min(s.total_assets.saturating_sub(s.loaned))
            }
            (_, vault::DEBT_OF) => s.debt.get(&address_arg(data, 0)).copied().unwrap_or_default(),
            _ => return Err(invalid("not a read")),
        };
        Ok(encode_word(value))
    }

    /// Applies a write. `false` means the transaction reverts.
    fn apply(s: &mut ChainState, from: Address, sig: &'static str, data: &[u8]) -> bool {
        match sig {
            token::APPROVE => {
                let key = (from, address_arg(data, 0));
                let previous = s.allowances.get(&key).copied().unwrap_or_default();
                s.stale_allowance = Some(previous);
                s.allowances.insert(key, uint_arg(data, 1));
                true
            }
            token::MINT => {
                let to = address_arg(data, 0);
                *s.tokens.entry(to).or_default() += uint_arg(data, 1);
                true
            }
            vault::DEPOSIT => {
                let assets = uint_arg(data, 0);
                if !spend(s, from, assets) {
                    return false;
                }
                *s.shares.entry(address_arg(data, 1)).or_default() += assets;
                s.total_assets += assets;
                true
            }
            vault::WITHDRAW | vault::REDEEM => {
                let amount = uint_arg(data, 0);
                let owner = address_arg(data, 2);
                let owned = s.shares.get(&owner).copied().unwrap_or_default();
                if owned < amount || s.total_assets.saturating_sub(s.loaned) < amount {
                    return false;
                }
                s.shares.insert(owner, owned - amount);
                s.total_assets -= amount;
                *s.tokens.entry(address_arg(data, 1)).or_default() += amount;
                true
            }
            vault::LEND => {
                let amount = uint_arg(data, 0);
                if s.total_assets.saturating_sub(s.loaned) < amount {
                    return false;
                }
                let fee = amount * U256::from(s.fee_bps) / U256::from(10_000u64);
                s.loaned += amount;
                *s.tokens.entry(from).or_default() += amount;
                *s.debt.entry(from).or_default() += amount + fee;
                true
            }
            vault::REPAY => {
                let amount = uint_arg(data, 0);
                let owed = s.debt.get(&from).copied().unwrap_or_default();
                if amount > owed || !spend(s, from, amount) {
                    return false;
                }
                s.debt.insert(from, owed - amount);
                let principal_part = s.loaned.min(amount);
                s.loaned -= principal_part;
                s.total_assets += amount - principal_part;
                true
            }
            _ => false,
        }
    }

    fn send(&self, tx: &Value) -> RpcResult<Value> {
        let field = |name: &str| tx[name].as_str().ok_or_else(|| invalid(name));
        let from = parse_address(field("from")?).map_err(|e| invalid(&e.to_string()))?;
        let to = parse_address(field("to")?).map_err(|e| invalid(&e.to_string()))?;
        let data = from_hex_data(field("data")?).map_err(|e| invalid(&e.to_string()))?;
        let sig = signature_of(&data).ok_or_else(|| invalid("unknown selector"))?;

        let mut s = self.state.lock();
        if s.rejected.contains(sig) {
            return Err(ProviderError::Rpc {
                code: 4001,
                message: "User rejected the request.".into(),
            });
        }

        let ok = match (to, sig) {
            (t, token::APPROVE | token::MINT) if t == KRWS => Self::apply(&mut s, from, sig, &data),
            (t, _) if t == VAULT => Self::apply(&mut s, from, sig, &data),
            _ => false,
        };

        s.block += 1;
        s.sent.push(sig);
        let hash = H256::from_low_u64_be(s.block);
        let hash_hex = to_hex_data(hash.as_bytes());
        let receipt = json!({
            "transactionHash": hash_hex,
            "blockNumber": format!("0x{:x}", s.block),
            "status": if ok { "0x1" } else { "0x0" },
        });
        s.receipts.insert(hash, receipt);
        Ok(json!(hash_hex))
    }
}

#[async_trait]
impl Provider for FakeChain {
    async fn request(&self, method: &str, params: Value) -> RpcResult<Value> {
        match method {
            "eth_chainId" => Ok(quantity(self.state.lock().chain_id)),
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([address_hex(&ALICE)])),
            "eth_blockNumber" => Ok(quantity(self.state.lock().block)),
            "eth_getBalance" => Ok(json!(format!("0x{:x}", self.state.lock().native))),
            "eth_call" => {
                let to = params[0]["to"].as_str().ok_or_else(|| invalid("to"))?;
                let to = parse_address(to).map_err(|e| invalid(&e.to_string()))?;
                let data = params[0]["data"].as_str().ok_or_else(|| invalid("data"))?;
                let data = from_hex_data(data).map_err(|e| invalid(&e.to_string()))?;
                self.call(to, &data)
            }
            "eth_sendTransaction" => self.send(&params[0]),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().ok_or_else(|| invalid("hash"))?;
                let bytes = from_hex_data(hash).map_err(|e| invalid(&e.to_string()))?;
                let hash = H256::from_slice(&bytes);
                Ok(self.state.lock().receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            other => Err(ProviderError::Rpc {
                code: -32601,
                message: format!("method {other} not found"),
            }),
        }
    }
}

/// A connected service over `chain` with an in-memory ledger.
pub async fn connected_service(chain: &Arc<FakeChain>) -> VaultService {
    let rpc = RpcClient::new(chain.clone());
    let config = ClientConfig::new(VAULT);
    let session = Arc::new(WalletSession::new(rpc, config.chain.clone()));
    session.connect().await.expect("connect");
    VaultService::new(session, ActivityLedger::in_memory(), &config)
}
