//! # StayPay Vault Binding
//!
//! The vault is an ERC-4626 tokenized vault (shares: spvKRWS, asset: KRWS)
//! extended with a simple lending book: `lend` draws assets out of the pool
//! against the caller, `repay` returns principal plus fee, and `debtOf`
//! reports what an account currently owes.
//!
//! ## Functions used
//!
//! | Kind  | Signature                                   |
//! |-------|---------------------------------------------|
//! | read  | `totalAssets()`                             |
//! | read  | `loanedPrincipal()`                         |
//! | read  | `asset()`                                   |
//! | read  | `balanceOf(address)`                        |
//! | read  | `convertToAssets(uint256)`                  |
//! | read  | `convertToShares(uint256)`                  |
//! | read  | `maxWithdraw(address)`                      |
//! | read  | `debtOf(address)`                           |
//! | write | `deposit(uint256,address)`                  |
//! | write | `withdraw(uint256,address,address)`         |
//! | write | `redeem(uint256,address,address)`           |
//! | write | `lend(uint256)`                             |
//! | write | `repay(uint256)`                            |

use ethereum_types::{Address, U256};

use staypay_protocol::abi::{decode_address, decode_uint, encode_call, Token};
use staypay_protocol::rpc::RpcClient;

use crate::error::ContractError;
use crate::token::Erc20Token;

pub const TOTAL_ASSETS: &str = "totalAssets()";
pub const LOANED_PRINCIPAL: &str = "loanedPrincipal()";
pub const ASSET: &str = "asset()";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const CONVERT_TO_ASSETS: &str = "convertToAssets(uint256)";
pub const CONVERT_TO_SHARES: &str = "convertToShares(uint256)";
pub const MAX_WITHDRAW: &str = "maxWithdraw(address)";
pub const DEBT_OF: &str = "debtOf(address)";
pub const DEPOSIT: &str = "deposit(uint256,address)";
pub const WITHDRAW: &str = "withdraw(uint256,address,address)";
pub const REDEEM: &str = "redeem(uint256,address,address)";
pub const LEND: &str = "lend(uint256)";
pub const REPAY: &str = "repay(uint256)";

/// Read access and calldata builders for the vault.
#[derive(Clone)]
pub struct VaultContract {
    rpc: RpcClient,
    address: Address,
}

impl VaultContract {
    pub fn new(rpc: RpcClient, address: Address) -> Self {
        Self { rpc, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    async fn read(&self, function: &'static str, args: &[Token]) -> Result<Vec<u8>, ContractError> {
        Ok(self.rpc.call(self.address, &encode_call(function, args)).await?)
    }

    async fn read_uint(&self, function: &'static str, args: &[Token]) -> Result<U256, ContractError> {
        let data = self.read(function, args).await?;
        decode_uint(&data).map_err(|source| ContractError::Decode { function, source })
    }

    // -- Reads --------------------------------------------------------------

    /// Assets under management, loans included.
    pub async fn total_assets(&self) -> Result<U256, ContractError> {
        self.read_uint(TOTAL_ASSETS, &[]).await
    }

    /// Principal currently lent out.
    pub async fn loaned_principal(&self) -> Result<U256, ContractError> {
        self.read_uint(LOANED_PRINCIPAL, &[]).await
    }

    /// Address of the underlying asset token.
    pub async fn asset(&self) -> Result<Address, ContractError> {
        let data = self.read(ASSET, &[]).await?;
        decode_address(&data).map_err(|source| ContractError::Decode {
            function: ASSET,
            source,
        })
    }

    /// Binding for the underlying asset token.
    pub async fn asset_token(&self) -> Result<Erc20Token, ContractError> {
        Ok(Erc20Token::new(self.rpc.clone(), self.asset().await?))
    }

    /// Share balance.
    pub async fn balance_of(&self, owner: Address) -> Result<U256, ContractError> {
        self.read_uint(BALANCE_OF, &[Token::Address(owner)]).await
    }

    pub async fn convert_to_assets(&self, shares: U256) -> Result<U256, ContractError> {
        self.read_uint(CONVERT_TO_ASSETS, &[Token::Uint(shares)]).await
    }

    pub async fn convert_to_shares(&self, assets: U256) -> Result<U256, ContractError> {
        self.read_uint(CONVERT_TO_SHARES, &[Token::Uint(assets)]).await
    }

    /// Assets `owner` can withdraw right now, bounded by idle liquidity.
    pub async fn max_withdraw(&self, owner: Address) -> Result<U256, ContractError> {
        self.read_uint(MAX_WITHDRAW, &[Token::Address(owner)]).await
    }

    /// Principal plus accrued fee owed by `borrower`.
    pub async fn debt_of(&self, borrower: Address) -> Result<U256, ContractError> {
        self.read_uint(DEBT_OF, &[Token::Address(borrower)]).await
    }

    // -- Calldata -----------------------------------------------------------

    pub fn deposit_calldata(assets: U256, receiver: Address) -> Vec<u8> {
        encode_call(DEPOSIT, &[Token::Uint(assets), Token::Address(receiver)])
    }

    pub fn withdraw_calldata(assets: U256, receiver: Address, owner: Address) -> Vec<u8> {
        encode_call(
            WITHDRAW,
            &[Token::Uint(assets), Token::Address(receiver), Token::Address(owner)],
        )
    }

    pub fn redeem_calldata(shares: U256, receiver: Address, owner: Address) -> Vec<u8> {
        encode_call(
            REDEEM,
            &[Token::Uint(shares), Token::Address(receiver), Token::Address(owner)],
        )
    }

    pub fn lend_calldata(amount: U256) -> Vec<u8> {
        encode_call(LEND, &[Token::Uint(amount)])
    }

    pub fn repay_calldata(amount: U256) -> Vec<u8> {
        encode_call(REPAY, &[Token::Uint(amount)])
    }
}
