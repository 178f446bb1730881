//! # Loan Activity Ledger
//!
//! The vault contract does not expose a history this client can read, so
//! the client keeps its own: a best-effort log of the user's lend and repay
//! actions, newest first, stored as one JSON array under a single key.
//!
//! ## Storage
//!
//! The ledger talks to an [`ActivityStore`], which stores opaque strings by
//! key. [`SledActivityStore`] persists to an embedded sled database;
//! [`MemoryActivityStore`] lives and dies with the process.
//!
//! ## Failure semantics
//!
//! Nothing here returns an error. A document that cannot be read or parsed
//! reads as an empty ledger; a write that fails is logged and skipped. The
//! ledger is a convenience for display, not a source of truth.
//!
//! ## Repay matching
//!
//! The chain gives no loan id to correlate a repay with the lend it closes,
//! so [`ActivityLedger::update_loan_to_repaid`] matches on principal (within
//! [`PRINCIPAL_MATCH_TOLERANCE`]) and, when both sides know it, the borrower
//! address. Two open loans with the same principal are indistinguishable:
//! the most recent one wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{
    ACTIVITY_ID_PREFIX, ACTIVITY_ID_SUFFIX_LEN, LOAN_ACTIVITY_STORAGE_KEY, MILLIS_PER_DAY,
    PRINCIPAL_MATCH_TOLERANCE, SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE,
    SECONDS_PER_MONTH, SECONDS_PER_WEEK,
};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// What happened to a loan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Issued,
    Repaid,
    Overdue,
}

/// Whether a loan is still outstanding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Repaid,
}

/// One entry in the activity feed.
///
/// Amounts are decimal token units. `timestamp` is Unix milliseconds.
/// Field names match the JSON the browser build wrote, so an exported
/// document loads unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanActivity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repaid_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    /// Days between issue and repay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LoanStatus>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl LoanActivity {
    /// Issued and not yet repaid.
    pub fn is_open_loan(&self) -> bool {
        self.kind == ActivityKind::Issued && self.status == Some(LoanStatus::Active)
    }

    /// The principal this entry was lent with, falling back to the legacy
    /// `amount` field.
    pub fn effective_principal(&self) -> f64 {
        match self.principal {
            Some(p) if p != 0.0 => p,
            _ => self.amount,
        }
    }

    /// JSON has no NaN or infinity; such a value would serialize as `null`
    /// and make the whole document unreadable.
    fn has_finite_amounts(&self) -> bool {
        [Some(self.amount), self.principal, self.repaid_amount, self.fee]
            .into_iter()
            .flatten()
            .all(f64::is_finite)
    }

    fn matches_principal(&self, principal: f64) -> bool {
        let close = |v: f64| v != 0.0 && (v - principal).abs() < PRINCIPAL_MATCH_TOLERANCE;
        self.principal.map(close).unwrap_or(false) || close(self.amount)
    }

    fn matches_address(&self, address: Option<&str>) -> bool {
        match (address, self.address.as_deref()) {
            (Some(wanted), Some(recorded)) if !wanted.is_empty() && !recorded.is_empty() => {
                wanted.eq_ignore_ascii_case(recorded)
            }
            _ => true,
        }
    }
}

/// Everything about an activity except the fields the ledger assigns
/// (`id` and `timestamp`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewActivity {
    pub kind: Option<ActivityKind>,
    pub amount: f64,
    pub principal: Option<f64>,
    pub repaid_amount: Option<f64>,
    pub fee: Option<f64>,
    pub duration: Option<u64>,
    pub days_overdue: Option<u64>,
    pub status: Option<LoanStatus>,
    pub address: Option<String>,
    pub tx_hash: Option<String>,
}

impl NewActivity {
    /// A freshly issued, still active loan.
    pub fn issued(principal: f64) -> Self {
        Self {
            kind: Some(ActivityKind::Issued),
            amount: principal,
            principal: Some(principal),
            status: Some(LoanStatus::Active),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    fn into_activity(self, id: String, timestamp: i64) -> LoanActivity {
        LoanActivity {
            id,
            kind: self.kind.unwrap_or(ActivityKind::Issued),
            amount: self.amount,
            principal: self.principal,
            repaid_amount: self.repaid_amount,
            fee: self.fee,
            duration: self.duration,
            days_overdue: self.days_overdue,
            status: self.status,
            timestamp,
            address: self.address,
            tx_hash: self.tx_hash,
        }
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Errors from a storage backend. Only ever logged by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("stored value is not UTF-8")]
    NotUtf8,
}

/// String-valued key-value storage.
pub trait ActivityStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn store(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Name of the sled tree holding ledger documents.
const ACTIVITY_TREE: &str = "activities";

/// Persistent store on an embedded sled database.
#[derive(Debug, Clone)]
pub struct SledActivityStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledActivityStore {
    /// Opens or creates the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A throwaway database, deleted on drop.
    pub fn open_temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(ACTIVITY_TREE)?;
        Ok(Self { db, tree })
    }
}

impl ActivityStore for SledActivityStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StoreError::NotUtf8),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tree.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.tree.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActivityLedger
// ---------------------------------------------------------------------------

/// The activity log, newest entry first.
#[derive(Clone)]
pub struct ActivityLedger {
    store: Arc<dyn ActivityStore>,
}

impl ActivityLedger {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// A ledger that forgets everything on exit.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryActivityStore::new()))
    }

    /// All recorded activities, newest first. Empty on any read failure.
    pub fn get_loan_activities(&self) -> Vec<LoanActivity> {
        let raw = match self.store.load(LOAN_ACTIVITY_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::error!(error = %err, "error reading loan activities");
                return Vec::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::error!(error = %err, "stored loan activities are not valid JSON");
            Vec::new()
        })
    }

    /// Replaces the stored list. Failures are logged and swallowed.
    pub fn save_loan_activities(&self, activities: &[LoanActivity]) {
        let json = match serde_json::to_string(activities) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(error = %err, "error serializing loan activities");
                return;
            }
        };
        if let Err(err) = self.store.store(LOAN_ACTIVITY_STORAGE_KEY, &json) {
            tracing::error!(error = %err, "error saving loan activities");
        }
    }

    /// Prepends a new activity stamped with the current time. An entry with
    /// a NaN or infinite amount is logged and returned without being stored.
    pub fn add_loan_activity(&self, activity: NewActivity) -> LoanActivity {
        self.add_loan_activity_at(activity, now_millis())
    }

    /// [`add_loan_activity`](Self::add_loan_activity) with an explicit clock.
    pub fn add_loan_activity_at(&self, activity: NewActivity, now_ms: i64) -> LoanActivity {
        let mut activities = self.get_loan_activities();
        let entry = activity.into_activity(generate_activity_id(now_ms), now_ms);
        if !entry.has_finite_amounts() {
            tracing::error!(
                id = %entry.id,
                amount = entry.amount,
                "refusing to store non-finite loan amount"
            );
            return entry;
        }
        activities.insert(0, entry.clone());
        self.save_loan_activities(&activities);

        tracing::debug!(id = %entry.id, kind = ?entry.kind, amount = entry.amount, "loan activity added");
        entry
    }

    /// Marks the most recent matching open loan as repaid, or records a
    /// standalone repaid entry when nothing matches.
    pub fn update_loan_to_repaid(
        &self,
        principal: f64,
        fee: f64,
        address: Option<&str>,
    ) -> LoanActivity {
        self.update_loan_to_repaid_at(principal, fee, address, now_millis())
    }

    /// [`update_loan_to_repaid`](Self::update_loan_to_repaid) with an
    /// explicit clock.
    pub fn update_loan_to_repaid_at(
        &self,
        principal: f64,
        fee: f64,
        address: Option<&str>,
        now_ms: i64,
    ) -> LoanActivity {
        let mut activities = self.get_loan_activities();
        tracing::debug!(principal, fee, ?address, candidates = activities.len(), "matching repay");

        // A non-finite principal falls through to the standalone path, which
        // refuses to persist it.
        let position = if principal.is_finite() && fee.is_finite() {
            activities.iter().position(|a| {
                a.is_open_loan() && a.matches_principal(principal) && a.matches_address(address)
            })
        } else {
            None
        };

        let Some(index) = position else {
            tracing::info!(principal, "no matching open loan, recording standalone repay");
            return self.add_loan_activity_at(
                NewActivity {
                    kind: Some(ActivityKind::Repaid),
                    amount: principal,
                    principal: Some(principal),
                    repaid_amount: Some(principal + fee),
                    fee: Some(fee),
                    duration: Some(1),
                    status: Some(LoanStatus::Repaid),
                    address: address.filter(|a| !a.is_empty()).map(str::to_string),
                    ..Default::default()
                },
                now_ms,
            );
        };

        let entry = &mut activities[index];
        let elapsed_days = now_ms.saturating_sub(entry.timestamp).div_euclid(MILLIS_PER_DAY);
        entry.kind = ActivityKind::Repaid;
        entry.status = Some(LoanStatus::Repaid);
        if entry.amount == 0.0 {
            entry.amount = principal;
        }
        entry.principal = Some(principal);
        entry.repaid_amount = Some(principal + fee);
        entry.fee = Some(fee);
        entry.duration = Some(elapsed_days.max(1) as u64);
        let updated = entry.clone();

        self.save_loan_activities(&activities);
        tracing::info!(id = %updated.id, duration = ?updated.duration, "loan marked repaid");
        updated
    }

    /// Open loans, newest first.
    pub fn active_loans(&self) -> Vec<LoanActivity> {
        self.get_loan_activities()
            .into_iter()
            .filter(LoanActivity::is_open_loan)
            .collect()
    }

    /// Deletes the whole log.
    pub fn clear_loan_activities(&self) {
        if let Err(err) = self.store.remove(LOAN_ACTIVITY_STORAGE_KEY) {
            tracing::error!(error = %err, "error clearing loan activities");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `loan_<millis>_<9 random base-36 chars>`.
fn generate_activity_id(now_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ACTIVITY_ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{ACTIVITY_ID_PREFIX}_{now_ms}_{suffix}")
}

/// Coarse relative time for the activity feed ("3 hours ago").
pub fn get_time_ago(timestamp_ms: i64) -> String {
    time_ago_at(timestamp_ms, now_millis())
}

/// [`get_time_ago`] with an explicit clock.
pub fn time_ago_at(timestamp_ms: i64, now_ms: i64) -> String {
    let seconds = now_ms.saturating_sub(timestamp_ms).div_euclid(1000);

    if seconds < SECONDS_PER_MINUTE {
        "just now".to_string()
    } else if seconds < SECONDS_PER_HOUR {
        format!("{} minutes ago", seconds / SECONDS_PER_MINUTE)
    } else if seconds < SECONDS_PER_DAY {
        format!("{} hours ago", seconds / SECONDS_PER_HOUR)
    } else if seconds < SECONDS_PER_WEEK {
        format!("{} days ago", seconds / SECONDS_PER_DAY)
    } else if seconds < SECONDS_PER_MONTH {
        format!("{} weeks ago", seconds / SECONDS_PER_WEEK)
    } else {
        format!("{} months ago", seconds / SECONDS_PER_MONTH)
    }
}
