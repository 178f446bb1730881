//! Terminal rendering for dashboards, balances, flow reports and the
//! activity log.

use staypay_contracts::dashboard::{Dashboard, UserBalances, UtilizationBand, VaultData};
use staypay_contracts::FlowReport;
use staypay_protocol::config::{
    ChainDefinition, ASSET_SYMBOL, SHARE_SYMBOL, TOKEN_DECIMALS, UTILIZATION_OPTIMAL_HIGH,
    UTILIZATION_OPTIMAL_LOW,
};
use staypay_protocol::ledger::{get_time_ago, ActivityKind, LoanActivity};
use staypay_protocol::units::format_units;

// ---------------------------------------------------------------------------
// Number formatting
// ---------------------------------------------------------------------------

/// Won amounts for stat cards: `₩1.2B`, `₩35M`, `₩12K`, or the plain value
/// below a thousand.
pub fn format_krw_compact(value: f64) -> String {
    if value >= 1e9 {
        format!("₩{:.1}B", value / 1e9)
    } else if value >= 1e6 {
        format!("₩{:.0}M", value / 1e6)
    } else if value >= 1e3 {
        format!("₩{:.0}K", value / 1e3)
    } else {
        format!("₩{}", format_number(value))
    }
}

/// Thousands separators and at most three fractional digits, trailing
/// zeros dropped: `1234567.5` → `1,234,567.5`.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{:.3}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let frac = frac.trim_end_matches('0');
    let sign = if value < 0.0 && (whole != "0" || !frac.is_empty()) { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

fn band_label(band: UtilizationBand) -> &'static str {
    match band {
        UtilizationBand::Low => "below optimal",
        UtilizationBand::Optimal => "optimal",
        UtilizationBand::High => "above optimal",
    }
}

/// `[#####-----]`-style bar, `width` cells wide.
fn utilization_bar(rate: f64, width: usize) -> String {
    let filled = ((rate.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

pub fn print_vault(data: &VaultData) {
    println!("Vault");
    println!("  Total value locked   {}", format_krw_compact(data.tvl));
    println!("  Available liquidity  {}", format_krw_compact(data.available_liquidity));
    println!("  Active loans         {}", format_krw_compact(data.active_loans));
    println!(
        "  Utilization          {} {}% ({}, target {:.0}-{:.0}%)",
        utilization_bar(data.utilization_rate, 20),
        data.utilization_display(),
        band_label(data.utilization_band()),
        UTILIZATION_OPTIMAL_LOW,
        UTILIZATION_OPTIMAL_HIGH,
    );
}

pub fn print_balances(balances: &UserBalances) {
    println!("Balances");
    println!("  KAIA                 {}", format_number(balances.native));
    println!("  {ASSET_SYMBOL:<20} {}", format_number(balances.krws));
    println!(
        "  {SHARE_SYMBOL:<20} {} (≈ {} {ASSET_SYMBOL})",
        format_number(balances.spv_krws),
        format_number(balances.spv_krws_in_krws),
    );
    if balances.degraded {
        println!("  (some balances could not be read and show as zero)");
    }
}

pub fn print_dashboard(dashboard: &Dashboard) {
    print_vault(&dashboard.vault);
    println!();
    println!("Exchange rate");
    println!(
        "  1 {SHARE_SYMBOL} = {} {ASSET_SYMBOL}",
        format_number(dashboard.rate.krws_per_spv_krws)
    );
    println!(
        "  1 {ASSET_SYMBOL} = {} {SHARE_SYMBOL}",
        format_number(dashboard.rate.spv_krws_per_krws)
    );

    match &dashboard.balances {
        Some(balances) => {
            println!();
            print_balances(balances);
            if let Some(debt) = dashboard.debt {
                println!("  Outstanding debt     {} {ASSET_SYMBOL}", format_number(debt));
            }
        }
        None => {
            println!();
            println!("Wallet not connected; showing vault data only.");
        }
    }

    if dashboard.is_degraded() {
        println!();
        println!("Warning: some contract reads failed; affected values show as defaults.");
    }
}

pub fn print_report(report: &FlowReport, chain: &ChainDefinition) {
    println!(
        "{} of {} confirmed.",
        report.action,
        format_units(report.amount, TOKEN_DECIMALS)
    );
    for step in &report.steps {
        let block = step
            .block
            .map(|b| format!(" in block {b}"))
            .unwrap_or_default();
        println!("  {:<8} {}{}", step.action.label(), step.tx_hash, block);
        println!("           {}", chain.explorer_tx_url(&step.tx_hash));
    }
    if let Some(activity) = &report.activity {
        println!("  Recorded activity {}", activity.id);
    }
}

fn kind_label(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Issued => "Loan issued",
        ActivityKind::Repaid => "Loan repaid",
        ActivityKind::Overdue => "Loan overdue",
    }
}

/// One line of the activity feed.
pub fn activity_line(activity: &LoanActivity) -> String {
    let mut line = format!(
        "{:<14} {:<13} {:>18} {ASSET_SYMBOL}",
        get_time_ago(activity.timestamp),
        kind_label(activity.kind),
        format_number(activity.effective_principal()),
    );
    if let Some(fee) = activity.fee {
        line.push_str(&format!("  fee {}", format_number(fee)));
    }
    if let Some(days) = activity.duration {
        line.push_str(&format!("  {days}d"));
    }
    if let Some(days) = activity.days_overdue {
        line.push_str(&format!("  {days}d overdue"));
    }
    if let Some(hash) = &activity.tx_hash {
        line.push_str(&format!("  {hash}"));
    }
    line
}

pub fn print_activities(activities: &[LoanActivity]) {
    if activities.is_empty() {
        println!("No loan activity recorded.");
        return;
    }
    for activity in activities {
        println!("{}", activity_line(activity));
    }
}
