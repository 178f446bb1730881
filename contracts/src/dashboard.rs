//! # Dashboard Reads
//!
//! The numbers on the dashboard: vault statistics, the user's balances,
//! the share exchange rate and outstanding debt. Each is a handful of
//! contract reads converted to decimal units.
//!
//! A failed read does not fail the dashboard. The value falls back to zero
//! (one, for exchange rates), a warning is logged, and the snapshot is
//! flagged `degraded` so the caller can tell an empty vault from an
//! unreachable one.

use ethereum_types::{Address, U256};
use serde::Serialize;

use staypay_protocol::config::{TOKEN_DECIMALS, UTILIZATION_OPTIMAL_HIGH, UTILIZATION_OPTIMAL_LOW};
use staypay_protocol::units::to_decimal;

use crate::error::ContractError;
use crate::vault::VaultContract;

fn or_fallback(result: Result<U256, ContractError>, what: &str, fallback: U256, degraded: &mut bool) -> U256 {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(read = what, error = %err, "contract read failed, using fallback");
            *degraded = true;
            fallback
        }
    }
}

fn dec(value: U256) -> f64 {
    to_decimal(value, TOKEN_DECIMALS)
}

// ---------------------------------------------------------------------------
// Vault statistics
// ---------------------------------------------------------------------------

/// Where utilization sits relative to the target band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum UtilizationBand {
    Low,
    Optimal,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VaultData {
    /// Total value locked, in asset units.
    pub tvl: f64,
    pub available_liquidity: f64,
    /// Principal currently lent out.
    pub active_loans: f64,
    /// Percent of TVL lent out.
    pub utilization_rate: f64,
    pub degraded: bool,
}

impl VaultData {
    pub fn from_raw(total_assets: U256, loaned_principal: U256) -> Self {
        let tvl = dec(total_assets);
        let loaned = dec(loaned_principal);
        let utilization_rate = if tvl > 0.0 { loaned / tvl * 100.0 } else { 0.0 };
        Self {
            tvl,
            available_liquidity: tvl - loaned,
            active_loans: loaned,
            utilization_rate,
            degraded: false,
        }
    }

    pub async fn load(vault: &VaultContract) -> Self {
        let mut degraded = false;
        let total = or_fallback(vault.total_assets().await, "totalAssets", U256::zero(), &mut degraded);
        let loaned = or_fallback(
            vault.loaned_principal().await,
            "loanedPrincipal",
            U256::zero(),
            &mut degraded,
        );
        Self {
            degraded,
            ..Self::from_raw(total, loaned)
        }
    }

    /// One decimal place, as shown next to the bar.
    pub fn utilization_display(&self) -> String {
        format!("{:.1}", self.utilization_rate)
    }

    pub fn utilization_band(&self) -> UtilizationBand {
        if self.utilization_rate > UTILIZATION_OPTIMAL_HIGH {
            UtilizationBand::High
        } else if self.utilization_rate > UTILIZATION_OPTIMAL_LOW {
            UtilizationBand::Optimal
        } else {
            UtilizationBand::Low
        }
    }
}

// ---------------------------------------------------------------------------
// User balances
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserBalances {
    /// Native gas token (KAIA).
    pub native: f64,
    /// Base asset (KRWS).
    pub krws: f64,
    /// Vault shares (spvKRWS).
    pub spv_krws: f64,
    /// Shares valued in the base asset.
    pub spv_krws_in_krws: f64,
    pub degraded: bool,
}

impl UserBalances {
    pub async fn load(vault: &VaultContract, account: Address) -> Self {
        let mut degraded = false;

        let native = or_fallback(
            vault.rpc().get_balance(account).await.map_err(ContractError::from),
            "nativeBalance",
            U256::zero(),
            &mut degraded,
        );

        let krws = match vault.asset_token().await {
            Ok(token) => or_fallback(
                token.balance_of(account).await,
                "asset.balanceOf",
                U256::zero(),
                &mut degraded,
            ),
            Err(err) => or_fallback(Err(err), "asset", U256::zero(), &mut degraded),
        };

        let shares = or_fallback(vault.balance_of(account).await, "balanceOf", U256::zero(), &mut degraded);
        let shares_in_assets = if shares.is_zero() {
            U256::zero()
        } else {
            or_fallback(
                vault.convert_to_assets(shares).await,
                "convertToAssets",
                U256::zero(),
                &mut degraded,
            )
        };

        Self {
            native: dec(native),
            krws: dec(krws),
            spv_krws: dec(shares),
            spv_krws_in_krws: dec(shares_in_assets),
            degraded,
        }
    }
}

// ---------------------------------------------------------------------------
// Exchange rate
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExchangeRate {
    pub krws_per_spv_krws: f64,
    pub spv_krws_per_krws: f64,
    pub degraded: bool,
}

impl ExchangeRate {
    pub async fn load(vault: &VaultContract) -> Self {
        let one = U256::exp10(TOKEN_DECIMALS as usize);
        let mut degraded = false;
        let assets_per_share = or_fallback(
            vault.convert_to_assets(one).await,
            "convertToAssets(1)",
            one,
            &mut degraded,
        );
        let shares_per_asset = or_fallback(
            vault.convert_to_shares(one).await,
            "convertToShares(1)",
            one,
            &mut degraded,
        );
        Self {
            krws_per_spv_krws: dec(assets_per_share),
            spv_krws_per_krws: dec(shares_per_asset),
            degraded,
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Everything the dashboard shows, read in one go.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub vault: VaultData,
    pub rate: ExchangeRate,
    /// `None` when no account is connected.
    pub balances: Option<UserBalances>,
    pub debt: Option<f64>,
}

impl Dashboard {
    pub async fn load(vault: &VaultContract, account: Option<Address>) -> Self {
        let data = VaultData::load(vault).await;
        let rate = ExchangeRate::load(vault).await;

        let (balances, debt) = match account {
            Some(account) => {
                let balances = UserBalances::load(vault, account).await;
                let debt = match vault.debt_of(account).await {
                    Ok(debt) => Some(dec(debt)),
                    Err(err) => {
                        tracing::warn!(error = %err, "debtOf read failed");
                        None
                    }
                };
                (Some(balances), debt)
            }
            None => (None, None),
        };

        Self {
            vault: data,
            rate,
            balances,
            debt,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.vault.degraded
            || self.rate.degraded
            || self.balances.as_ref().map(|b| b.degraded).unwrap_or(false)
    }
}
