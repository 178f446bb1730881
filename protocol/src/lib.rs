// Copyright (c) 2026 StayPay. MIT License.
// See LICENSE for details.

//! # StayPay Protocol: Client Core
//!
//! Everything the StayPay client needs to talk to the lending vault
//! without knowing anything about the vault itself: the wire codec, the
//! wallet connection, transaction confirmation and the local activity log.
//! The contract-specific bindings live one crate up, in `staypay-contracts`.
//!
//! ## Modules
//!
//! - **config**: Chain definition, token precision, timings. Every constant.
//! - **units**: Exact decimal ↔ base-unit conversion.
//! - **abi**: Selectors and static-word encoding for contract calls.
//! - **rpc**: The wallet provider seam and a typed JSON-RPC client.
//! - **wallet**: Explicit session state: account, chain, network switching.
//! - **tx**: Submission, receipt polling and the cancel/fail taxonomy.
//! - **ledger**: The locally persisted lend/repay activity feed.
//!
//! ## Ground Rules
//!
//! 1. Amounts sent to a contract are `U256` base units, end to end. Floats
//!    are for display and the ledger only.
//! 2. The session is passed around, never global.
//! 3. The ledger logs its own storage errors and never fails its caller.

pub mod abi;
pub mod config;
pub mod ledger;
pub mod rpc;
pub mod tx;
pub mod units;
pub mod wallet;
