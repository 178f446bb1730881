//! # StayPay Contract Bindings
//!
//! Typed access to the two contracts the client talks to, and the flows
//! built on top of them:
//!
//! - **Token**: the ERC-20 base asset (KRWS). Balances, allowances, and
//!   calldata for `approve` and the test-network `mint`.
//! - **Vault**: the ERC-4626 vault (spvKRWS shares) with its lending book.
//! - **Dashboard**: vault statistics, user balances and exchange rates,
//!   degraded rather than failing when a read goes wrong.
//! - **Flows**: [`VaultService`], which sequences approvals, writes and
//!   receipt waits and keeps the loan activity ledger in step.
//!
//! ## Design Principles
//!
//! 1. Amounts sent to a contract are `U256` base units end to end. Floats
//!    appear only in display values and the ledger.
//! 2. Reads return errors; only the dashboard turns them into defaults.
//! 3. Every write goes through the wallet session, so a disconnected or
//!    wrong-network session fails before anything reaches the wallet.

pub mod dashboard;
pub mod error;
pub mod flows;
pub mod token;
pub mod vault;

pub use dashboard::{Dashboard, ExchangeRate, UserBalances, UtilizationBand, VaultData};
pub use error::{ContractError, FlowError};
pub use flows::{parse_amount, FlowReport, FlowStep, VaultService};
pub use token::Erc20Token;
pub use vault::VaultContract;
