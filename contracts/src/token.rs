//! # ERC-20 Token Binding
//!
//! The vault's base asset (KRWS) is a plain ERC-20 with a faucet-style
//! `mint` on the test network. We read balances and allowances and build
//! calldata for `approve` and `mint`; sending is the flow layer's job.

use ethereum_types::{Address, U256};

use staypay_protocol::abi::{decode_uint, encode_call, Token};
use staypay_protocol::rpc::RpcClient;

use crate::error::ContractError;

pub const BALANCE_OF: &str = "balanceOf(address)";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const MINT: &str = "mint(address,uint256)";

/// An ERC-20 token at a fixed address.
#[derive(Clone)]
pub struct Erc20Token {
    rpc: RpcClient,
    address: Address,
}

impl Erc20Token {
    pub fn new(rpc: RpcClient, address: Address) -> Self {
        Self { rpc, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn read_uint(&self, function: &'static str, args: &[Token]) -> Result<U256, ContractError> {
        let data = self.rpc.call(self.address, &encode_call(function, args)).await?;
        decode_uint(&data).map_err(|source| ContractError::Decode { function, source })
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256, ContractError> {
        self.read_uint(BALANCE_OF, &[Token::Address(owner)]).await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, ContractError> {
        self.read_uint(ALLOWANCE, &[Token::Address(owner), Token::Address(spender)])
            .await
    }

    pub fn approve_calldata(spender: Address, amount: U256) -> Vec<u8> {
        encode_call(APPROVE, &[Token::Address(spender), Token::Uint(amount)])
    }

    /// Test-network faucet.
    pub fn mint_calldata(to: Address, amount: U256) -> Vec<u8> {
        encode_call(MINT, &[Token::Address(to), Token::Uint(amount)])
    }
}
