//! # Vault Flows
//!
//! The user-level operations: approve, deposit, withdraw, redeem, lend,
//! repay and the test-network mint. Each flow checks the wallet session,
//! sends one or more transactions, waits for each receipt and reports the
//! steps it took.
//!
//! ## Approve-then-act
//!
//! Deposit and repay move base asset out of the user's wallet, so the vault
//! needs an allowance first. When the current allowance is short the flow
//! sends `approve`, waits for its receipt, then re-reads the allowance until
//! it covers the amount before sending the dependent transaction:
//!
//! ```text
//! allowance ≥ amount? ──yes──────────────────────────────┐
//!        │ no                                            ▼
//!        └─► approve ─► receipt ─► poll allowance ─► deposit/repay ─► receipt
//! ```
//!
//! Lend and repay also write to the local activity ledger once their
//! transaction is confirmed.

use std::sync::Arc;
use std::time::Duration;

use ethereum_types::{Address, U256};

use staypay_protocol::abi::address_hex;
use staypay_protocol::config::{ClientConfig, ASSET_SYMBOL, TOKEN_DECIMALS};
use staypay_protocol::ledger::{ActivityLedger, LoanActivity, NewActivity};
use staypay_protocol::rpc::tx_hash_hex;
use staypay_protocol::tx::{submit, ReceiptWaiter, TxAction};
use staypay_protocol::units::{parse_units, to_decimal};
use staypay_protocol::wallet::WalletSession;

use crate::dashboard::Dashboard;
use crate::error::FlowError;
use crate::token::Erc20Token;
use crate::vault::VaultContract;

/// Parses a user-entered token amount into base units, rejecting zero.
pub fn parse_amount(text: &str) -> Result<U256, FlowError> {
    let amount = parse_units(text, TOKEN_DECIMALS)?;
    ensure_positive(amount)?;
    Ok(amount)
}

fn ensure_positive(amount: U256) -> Result<(), FlowError> {
    if amount.is_zero() {
        return Err(FlowError::ZeroAmount);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One confirmed transaction within a flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStep {
    pub action: TxAction,
    pub tx_hash: String,
    pub block: Option<u64>,
}

/// What a flow did.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowReport {
    pub action: TxAction,
    /// Base units moved by the final step.
    pub amount: U256,
    /// Confirmed transactions in the order they were sent.
    pub steps: Vec<FlowStep>,
    /// Ledger entry written by lend and repay.
    pub activity: Option<LoanActivity>,
}

impl FlowReport {
    fn new(action: TxAction, amount: U256) -> Self {
        Self {
            action,
            amount,
            steps: Vec::new(),
            activity: None,
        }
    }

    /// Hash of the transaction that did the work (the last one sent).
    pub fn final_tx_hash(&self) -> Option<&str> {
        self.steps.last().map(|s| s.tx_hash.as_str())
    }

    /// `true` if an approval had to be sent first.
    pub fn approved_first(&self) -> bool {
        self.action != TxAction::Approve && self.steps.iter().any(|s| s.action == TxAction::Approve)
    }
}

// ---------------------------------------------------------------------------
// VaultService
// ---------------------------------------------------------------------------

/// Runs vault flows on behalf of the connected account.
pub struct VaultService {
    session: Arc<WalletSession>,
    vault: VaultContract,
    ledger: ActivityLedger,
    waiter: ReceiptWaiter,
    allowance_poll_interval: Duration,
    allowance_poll_attempts: u32,
}

impl VaultService {
    pub fn new(session: Arc<WalletSession>, ledger: ActivityLedger, config: &ClientConfig) -> Self {
        let vault = VaultContract::new(session.rpc().clone(), config.vault_address);
        Self {
            session,
            vault,
            ledger,
            waiter: ReceiptWaiter::from_config(config),
            allowance_poll_interval: config.allowance_poll_interval,
            allowance_poll_attempts: config.allowance_poll_attempts.max(1),
        }
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn vault(&self) -> &VaultContract {
        &self.vault
    }

    pub fn ledger(&self) -> &ActivityLedger {
        &self.ledger
    }

    /// Dashboard snapshot for the connected account (vault-only when
    /// disconnected).
    pub async fn dashboard(&self) -> Dashboard {
        Dashboard::load(&self.vault, self.session.account()).await
    }

    async fn asset_token(&self) -> Result<Erc20Token, FlowError> {
        self.vault
            .asset_token()
            .await
            .map_err(|source| FlowError::AssetUnavailable {
                symbol: ASSET_SYMBOL,
                source,
            })
    }

    /// Submits one transaction and waits for it to confirm.
    async fn send(&self, action: TxAction, to: Address, calldata: Vec<u8>) -> Result<FlowStep, FlowError> {
        let hash = submit(&self.session, action, to, &calldata).await?;
        let receipt = self.waiter.wait(self.session.rpc(), action, hash).await?;
        Ok(FlowStep {
            action,
            tx_hash: tx_hash_hex(&hash),
            block: receipt.block(),
        })
    }

    /// Makes sure the vault may pull `needed` from `owner`, approving and
    /// waiting for the new allowance to show up when it is short.
    async fn ensure_allowance(
        &self,
        token: &Erc20Token,
        owner: Address,
        needed: U256,
        report: &mut FlowReport,
    ) -> Result<(), FlowError> {
        let spender = self.vault.address();
        let current = token.allowance(owner, spender).await?;
        if current >= needed {
            tracing::debug!(%current, %needed, "allowance sufficient, skipping approve");
            return Ok(());
        }

        tracing::info!(%current, %needed, "allowance short, approving");
        let step = self
            .send(
                TxAction::Approve,
                token.address(),
                Erc20Token::approve_calldata(spender, needed),
            )
            .await?;
        report.steps.push(step);

        let mut seen = current;
        for attempt in 1..=self.allowance_poll_attempts {
            match token.allowance(owner, spender).await {
                Ok(allowance) if allowance >= needed => return Ok(()),
                Ok(allowance) => seen = allowance,
                Err(err) => tracing::warn!(attempt, error = %err, "allowance re-read failed"),
            }
            if attempt < self.allowance_poll_attempts {
                tokio::time::sleep(self.allowance_poll_interval).await;
            }
        }
        Err(FlowError::AllowanceNotVisible { seen, needed })
    }

    // -- Flows --------------------------------------------------------------

    /// Approves the vault to spend `amount` of the base asset.
    pub async fn approve(&self, amount: U256) -> Result<FlowReport, FlowError> {
        ensure_positive(amount)?;
        self.session.require_ready()?;
        let token = self.asset_token().await?;

        let mut report = FlowReport::new(TxAction::Approve, amount);
        let step = self
            .send(
                TxAction::Approve,
                token.address(),
                Erc20Token::approve_calldata(self.vault.address(), amount),
            )
            .await?;
        report.steps.push(step);
        Ok(report)
    }

    /// Deposits `assets` and mints shares to the connected account.
    pub async fn deposit(&self, assets: U256) -> Result<FlowReport, FlowError> {
        ensure_positive(assets)?;
        let owner = self.session.require_ready()?;
        let token = self.asset_token().await?;

        let mut report = FlowReport::new(TxAction::Deposit, assets);
        self.ensure_allowance(&token, owner, assets, &mut report).await?;

        let step = self
            .send(
                TxAction::Deposit,
                self.vault.address(),
                VaultContract::deposit_calldata(assets, owner),
            )
            .await?;
        report.steps.push(step);
        tracing::info!(assets = %assets, "deposit complete");
        Ok(report)
    }

    /// Withdraws `assets`, refusing amounts above `maxWithdraw`.
    pub async fn withdraw(&self, assets: U256) -> Result<FlowReport, FlowError> {
        ensure_positive(assets)?;
        let owner = self.session.require_ready()?;

        match self.vault.max_withdraw(owner).await {
            Ok(max) if assets > max => {
                return Err(FlowError::ExceedsMaxWithdraw {
                    requested: assets,
                    max,
                })
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "maxWithdraw unavailable, sending anyway"),
        }

        let mut report = FlowReport::new(TxAction::Withdraw, assets);
        let step = self
            .send(
                TxAction::Withdraw,
                self.vault.address(),
                VaultContract::withdraw_calldata(assets, owner, owner),
            )
            .await?;
        report.steps.push(step);
        Ok(report)
    }

    /// Burns `shares` for their asset value.
    pub async fn redeem(&self, shares: U256) -> Result<FlowReport, FlowError> {
        ensure_positive(shares)?;
        let owner = self.session.require_ready()?;

        let mut report = FlowReport::new(TxAction::Redeem, shares);
        let step = self
            .send(
                TxAction::Redeem,
                self.vault.address(),
                VaultContract::redeem_calldata(shares, owner, owner),
            )
            .await?;
        report.steps.push(step);
        Ok(report)
    }

    /// Borrows `amount` from the vault and records the loan.
    pub async fn lend(&self, amount: U256) -> Result<FlowReport, FlowError> {
        ensure_positive(amount)?;
        let owner = self.session.require_ready()?;

        let mut report = FlowReport::new(TxAction::Lend, amount);
        let step = self
            .send(TxAction::Lend, self.vault.address(), VaultContract::lend_calldata(amount))
            .await?;

        let activity = self.ledger.add_loan_activity(
            NewActivity::issued(to_decimal(amount, TOKEN_DECIMALS))
                .with_address(address_hex(&owner))
                .with_tx_hash(step.tx_hash.clone()),
        );
        tracing::info!(id = %activity.id, principal = activity.amount, "loan recorded");

        report.steps.push(step);
        report.activity = Some(activity);
        Ok(report)
    }

    /// Repays the connected account's full debt.
    ///
    /// `principal` is what the loan was taken out for, in decimal units; it
    /// only feeds the ledger and the fee split. Without it the most recent
    /// open loan recorded for this account is used.
    pub async fn repay(&self, principal: Option<f64>) -> Result<FlowReport, FlowError> {
        if let Some(p) = principal {
            if !p.is_finite() || p <= 0.0 {
                return Err(FlowError::InvalidPrincipal(p));
            }
        }
        let owner = self.session.require_ready()?;
        let owner_hex = address_hex(&owner);

        let principal = match principal {
            Some(p) => p,
            None => self.latest_open_principal(&owner_hex).ok_or(FlowError::NoOpenLoan)?,
        };

        let debt = self.vault.debt_of(owner).await?;
        if debt.is_zero() {
            return Err(FlowError::NoOutstandingDebt);
        }
        let fee = (to_decimal(debt, TOKEN_DECIMALS) - principal).max(0.0);
        tracing::info!(principal, fee, debt = %debt, "repaying loan");

        let token = self.asset_token().await?;
        let mut report = FlowReport::new(TxAction::Repay, debt);
        self.ensure_allowance(&token, owner, debt, &mut report).await?;

        let step = self
            .send(TxAction::Repay, self.vault.address(), VaultContract::repay_calldata(debt))
            .await?;
        report.steps.push(step);

        report.activity = Some(self.ledger.update_loan_to_repaid(principal, fee, Some(&owner_hex)));
        Ok(report)
    }

    /// Test-network faucet: mints `amount` of the base asset to the
    /// connected account.
    pub async fn mint(&self, amount: U256) -> Result<FlowReport, FlowError> {
        ensure_positive(amount)?;
        let owner = self.session.require_ready()?;
        let token = self.asset_token().await?;

        let mut report = FlowReport::new(TxAction::Mint, amount);
        let step = self
            .send(TxAction::Mint, token.address(), Erc20Token::mint_calldata(owner, amount))
            .await?;
        report.steps.push(step);
        Ok(report)
    }

    fn latest_open_principal(&self, owner_hex: &str) -> Option<f64> {
        self.ledger
            .active_loans()
            .into_iter()
            .find(|loan| match loan.address.as_deref() {
                Some(recorded) if !recorded.is_empty() => recorded.eq_ignore_ascii_case(owner_hex),
                _ => true,
            })
            .map(|loan| loan.effective_principal())
    }
}
