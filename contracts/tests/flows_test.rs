//! Integration tests for vault flows.
//!
//! Each test drives a `VaultService` against the simulated chain in
//! `common`, then checks on-chain balances, the transactions sent and the
//! activity ledger.

mod common;

use common::{connected_service, krws, FakeChain, ALICE, VAULT};
use ethereum_types::U256;

use staypay_contracts::{token, vault, FlowError};
use staypay_protocol::abi::address_hex;
use staypay_protocol::ledger::{ActivityKind, LoanStatus};
use staypay_protocol::tx::{TxAction, TxError};
use staypay_protocol::wallet::WalletError;

// ---------------------------------------------------------------------------
// Deposit
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn deposit_approves_then_deposits() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;

    let report = service.deposit(krws(1_000_000)).await.unwrap();

    assert_eq!(chain.sent(), vec![token::APPROVE, vault::DEPOSIT]);
    assert!(report.approved_first());
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.steps[1].action, TxAction::Deposit);
    assert_eq!(chain.shares_of(ALICE), krws(1_000_000));
    assert_eq!(chain.token_balance(ALICE), krws(9_000_000));
    assert_eq!(chain.allowance(ALICE, VAULT), U256::zero());
}

#[tokio::test(start_paused = true)]
async fn deposit_skips_approve_when_allowance_covers() {
    let chain = FakeChain::new();
    chain
        .state
        .lock()
        .allowances
        .insert((ALICE, VAULT), krws(5_000_000));
    let service = connected_service(&chain).await;

    let report = service.deposit(krws(2_000_000)).await.unwrap();

    assert_eq!(chain.sent(), vec![vault::DEPOSIT]);
    assert!(!report.approved_first());
    assert_eq!(chain.allowance(ALICE, VAULT), krws(3_000_000));
}

#[tokio::test(start_paused = true)]
async fn deposit_waits_for_allowance_to_appear() {
    let chain = FakeChain::new();
    chain.state.lock().allowance_lag = 3;
    let service = connected_service(&chain).await;

    service.deposit(krws(10)).await.unwrap();

    assert_eq!(chain.state.lock().allowance_lag, 0);
    assert_eq!(chain.shares_of(ALICE), krws(10));
}

#[tokio::test(start_paused = true)]
async fn deposit_gives_up_when_allowance_never_shows() {
    let chain = FakeChain::new();
    chain.state.lock().allowance_lag = 100;
    let service = connected_service(&chain).await;

    let err = service.deposit(krws(10)).await.unwrap_err();

    assert!(matches!(err, FlowError::AllowanceNotVisible { .. }));
    assert_eq!(chain.sent(), vec![token::APPROVE]);
}

#[tokio::test(start_paused = true)]
async fn rejected_approval_is_a_silent_cancel() {
    let chain = FakeChain::new();
    chain.state.lock().rejected.insert(token::APPROVE);
    let service = connected_service(&chain).await;

    let err = service.deposit(krws(10)).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(chain.sent().is_empty());
    assert_eq!(chain.shares_of(ALICE), U256::zero());
}

#[tokio::test(start_paused = true)]
async fn reverted_deposit_is_reported() {
    let chain = FakeChain::new();
    // More than Alice holds: approve succeeds, deposit reverts.
    let service = connected_service(&chain).await;

    let err = service.deposit(krws(20_000_000)).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Tx(TxError::Reverted {
            action: TxAction::Deposit,
            ..
        })
    ));
    assert!(!err.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn missing_asset_address_blocks_approval() {
    let chain = FakeChain::new();
    chain.state.lock().broken_reads.insert(vault::ASSET);
    let service = connected_service(&chain).await;

    let err = service.approve(krws(1)).await.unwrap_err();

    assert!(matches!(err, FlowError::AssetUnavailable { symbol: "KRWS", .. }));
    assert!(chain.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_amounts_never_reach_the_wallet() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;

    assert!(matches!(service.deposit(U256::zero()).await, Err(FlowError::ZeroAmount)));
    assert!(matches!(service.lend(U256::zero()).await, Err(FlowError::ZeroAmount)));
    assert!(chain.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn wrong_network_blocks_writes() {
    let chain = FakeChain::new();
    chain.state.lock().chain_id = 1;
    let service = connected_service(&chain).await;

    let err = service.mint(krws(1)).await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Wallet(WalletError::WrongNetwork {
            actual: 1,
            expected: 1001
        })
    ));
    assert!(chain.sent().is_empty());
}

// ---------------------------------------------------------------------------
// Withdraw / redeem / mint
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn withdraw_respects_max_withdraw() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(100)).await.unwrap();

    let err = service.withdraw(krws(101)).await.unwrap_err();
    assert!(matches!(err, FlowError::ExceedsMaxWithdraw { .. }));

    service.withdraw(krws(40)).await.unwrap();
    assert_eq!(chain.shares_of(ALICE), krws(60));
    assert_eq!(chain.token_balance(ALICE), krws(9_999_940));
}

#[tokio::test(start_paused = true)]
async fn redeem_burns_shares() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(50)).await.unwrap();

    let report = service.redeem(krws(50)).await.unwrap();

    assert_eq!(report.action, TxAction::Redeem);
    assert_eq!(chain.shares_of(ALICE), U256::zero());
    assert_eq!(chain.token_balance(ALICE), krws(10_000_000));
}

#[tokio::test(start_paused = true)]
async fn mint_credits_connected_account() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;

    service.mint(krws(1_000)).await.unwrap();

    assert_eq!(chain.sent(), vec![token::MINT]);
    assert_eq!(chain.token_balance(ALICE), krws(10_001_000));
}

// ---------------------------------------------------------------------------
// Lend / repay
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn lend_records_issued_loan() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(5_000_000)).await.unwrap();

    let report = service.lend(krws(1_000_000)).await.unwrap();

    let activity = report.activity.clone().expect("ledger entry");
    assert_eq!(activity.kind, ActivityKind::Issued);
    assert_eq!(activity.status, Some(LoanStatus::Active));
    assert_eq!(activity.principal, Some(1_000_000.0));
    assert_eq!(activity.address.as_deref(), Some(address_hex(&ALICE).as_str()));
    assert_eq!(activity.tx_hash.as_deref(), report.final_tx_hash());
    assert_eq!(service.ledger().active_loans().len(), 1);
    assert_eq!(chain.debt_of(ALICE), krws(1_025_000));
}

#[tokio::test(start_paused = true)]
async fn repay_closes_the_recorded_loan() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(5_000_000)).await.unwrap();
    let loan = service.lend(krws(1_000_000)).await.unwrap().activity.unwrap();

    let report = service.repay(None).await.unwrap();

    assert_eq!(report.amount, krws(1_025_000));
    assert!(report.approved_first());
    let repaid = report.activity.expect("ledger entry");
    assert_eq!(repaid.id, loan.id);
    assert_eq!(repaid.kind, ActivityKind::Repaid);
    assert_eq!(repaid.fee, Some(25_000.0));
    assert_eq!(repaid.repaid_amount, Some(1_025_000.0));

    assert_eq!(chain.debt_of(ALICE), U256::zero());
    assert!(service.ledger().active_loans().is_empty());
    assert_eq!(service.ledger().get_loan_activities().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repay_with_explicit_principal_and_no_record() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(1_000)).await.unwrap();
    service.lend(krws(400)).await.unwrap();
    service.ledger().clear_loan_activities();

    let report = service.repay(Some(400.0)).await.unwrap();

    let repaid = report.activity.unwrap();
    assert_eq!(repaid.kind, ActivityKind::Repaid);
    assert_eq!(repaid.duration, Some(1));
    assert_eq!(repaid.fee, Some(10.0));
    assert_eq!(service.ledger().get_loan_activities().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repay_without_loan_or_debt_fails_early() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;

    assert!(matches!(service.repay(None).await, Err(FlowError::NoOpenLoan)));
    assert!(matches!(
        service.repay(Some(10.0)).await,
        Err(FlowError::NoOutstandingDebt)
    ));
    assert!(chain.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_repay_leaves_ledger_untouched() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(1_000)).await.unwrap();
    service.lend(krws(100)).await.unwrap();
    chain.state.lock().rejected.insert(vault::REPAY);

    let err = service.repay(None).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(service.ledger().active_loans().len(), 1);
    assert_eq!(chain.debt_of(ALICE), krws(100) + krws(100) / 40);
    assert_eq!(
        chain.sent(),
        vec![token::APPROVE, vault::DEPOSIT, vault::LEND, token::APPROVE]
    );
}

#[tokio::test(start_paused = true)]
async fn repay_rejects_unusable_principal_before_sending() {
    let chain = FakeChain::new();
    let service = connected_service(&chain).await;
    service.deposit(krws(1_000)).await.unwrap();
    service.lend(krws(100)).await.unwrap();
    let sent_before = chain.sent();

    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, -50.0] {
        let err = service.repay(Some(bad)).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidPrincipal(_)), "accepted {bad}");
    }

    assert_eq!(chain.sent(), sent_before);
    assert_eq!(chain.debt_of(ALICE), krws(100) + krws(100) / 40);
    let activities = service.ledger().get_loan_activities();
    assert_eq!(activities.len(), 1);
    assert!(activities[0].is_open_loan());
}
