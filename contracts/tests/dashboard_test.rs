//! Integration tests for dashboard reads against the simulated chain.

mod common;

use common::{connected_service, krws, FakeChain, ALICE};

use staypay_contracts::dashboard::{Dashboard, UserBalances, VaultData};
use staypay_contracts::vault;

#[tokio::test(start_paused = true)]
async fn dashboard_reflects_vault_state() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(1_000_000)).await.unwrap();
    service.lend(krws(700_000)).await.unwrap();

    let dashboard = service.dashboard().await;

    assert!(!dashboard.is_degraded());
    assert_eq!(dashboard.vault.tvl, 1_000_000.0);
    assert_eq!(dashboard.vault.active_loans, 700_000.0);
    assert_eq!(dashboard.vault.available_liquidity, 300_000.0);
    assert_eq!(dashboard.vault.utilization_display(), "70.0");
    assert_eq!(dashboard.rate.krws_per_spv_krws, 1.0);

    let balances = dashboard.balances.expect("connected");
    assert_eq!(balances.native, 5.0);
    assert_eq!(balances.krws, 9_700_000.0);
    assert_eq!(balances.spv_krws, 1_000_000.0);
    assert_eq!(balances.spv_krws_in_krws, 1_000_000.0);
    assert_eq!(dashboard.debt, Some(717_500.0));
}

#[tokio::test]
async fn failed_reads_fall_back_and_flag() {
    let chain = FakeChain::new();
    {
        let mut state = chain.state.lock();
        state.broken_reads.insert(vault::TOTAL_ASSETS);
        state.broken_reads.insert(vault::CONVERT_TO_ASSETS);
    }
    let service = connected_service(&chain).await;

    let data = VaultData::load(service.vault()).await;
    assert!(data.degraded);
    assert_eq!(data.tvl, 0.0);
    assert_eq!(data.utilization_rate, 0.0);

    let dashboard = service.dashboard().await;
    assert!(dashboard.is_degraded());
    assert_eq!(dashboard.rate.krws_per_spv_krws, 1.0);
    assert!(dashboard.rate.degraded);
}

#[tokio::test]
async fn broken_asset_read_only_zeroes_asset_balance() {
    let chain = FakeChain::new();
    chain.state.lock().broken_reads.insert(vault::ASSET);
    let service = connected_service(&chain).await;

    let balances = UserBalances::load(service.vault(), ALICE).await;

    assert!(balances.degraded);
    assert_eq!(balances.krws, 0.0);
    assert_eq!(balances.native, 5.0);
}

#[tokio::test]
async fn disconnected_dashboard_has_no_user_section() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.session().disconnect();

    let dashboard = Dashboard::load(service.vault(), service.session().account()).await;

    assert!(dashboard.balances.is_none());
    assert!(dashboard.debt.is_none());
}
