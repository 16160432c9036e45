//! Doctor service - ledger consistency checks
//!
//! Every invariant the ledger maintains gets a matching check here, so
//! damage from bugs or hand-edited databases shows up instead of
//! compounding.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbStore;

/// Doctor service for health checks
pub struct DoctorService {
    store: Arc<DuckDbStore>,
}

impl DoctorService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = std::collections::HashMap::new();

        // Balance vs entry-sum agreement, the core ledger invariant
        let mismatches = self.store.check_balance_mismatches()?;
        let mismatch_details: Vec<serde_json::Value> = mismatches
            .iter()
            .map(|m| {
                // Parse "referral_code|balance|entry_sum" format
                let parts: Vec<&str> = m.split('|').collect();
                if parts.len() >= 3 {
                    json!({
                        "referral_code": parts[0],
                        "balance": parts[1],
                        "entry_sum": parts[2]
                    })
                } else {
                    json!({ "info": m })
                }
            })
            .collect();
        checks.insert(
            "balance_mismatches".to_string(),
            CheckResult {
                status: if mismatches.is_empty() { "pass" } else { "error" }.to_string(),
                message: if mismatches.is_empty() {
                    "All balances match their entry sums".to_string()
                } else {
                    format!("{} account(s) disagree with their entries", mismatches.len())
                },
                details: if mismatches.is_empty() {
                    None
                } else {
                    Some(mismatch_details)
                },
            },
        );

        // Negative balances, impossible unless the schema CHECK was bypassed
        let negatives = self.store.check_negative_balances()?;
        checks.insert(
            "negative_balances".to_string(),
            CheckResult {
                status: if negatives.is_empty() { "pass" } else { "error" }.to_string(),
                message: if negatives.is_empty() {
                    "No account is overdrawn".to_string()
                } else {
                    format!("{} account(s) hold a negative balance", negatives.len())
                },
                details: if negatives.is_empty() {
                    None
                } else {
                    Some(
                        negatives
                            .iter()
                            .map(|c| json!({ "referral_code": c }))
                            .collect(),
                    )
                },
            },
        );

        // Transfer pairing: every transfer_id must have exactly one in and
        // one out leg of equal amount
        let unpaired = self.store.check_unpaired_transfers()?;
        checks.insert(
            "unpaired_transfers".to_string(),
            CheckResult {
                status: if unpaired.is_empty() { "pass" } else { "error" }.to_string(),
                message: if unpaired.is_empty() {
                    "All transfers have matching paired entries".to_string()
                } else {
                    format!("{} transfer(s) have broken pairing", unpaired.len())
                },
                details: if unpaired.is_empty() {
                    None
                } else {
                    Some(unpaired.iter().map(|t| json!({ "transfer_id": t })).collect())
                },
            },
        );

        // Orphaned entries
        let orphaned_entries = self.store.check_orphaned_entries()?;
        checks.insert(
            "orphaned_entries".to_string(),
            CheckResult {
                status: if orphaned_entries.is_empty() { "pass" } else { "error" }.to_string(),
                message: if orphaned_entries.is_empty() {
                    "No orphaned entries found".to_string()
                } else {
                    format!(
                        "{} entry(ies) reference missing accounts",
                        orphaned_entries.len()
                    )
                },
                details: if orphaned_entries.is_empty() {
                    None
                } else {
                    Some(
                        orphaned_entries
                            .iter()
                            .map(|e| json!({ "entry_id": e }))
                            .collect(),
                    )
                },
            },
        );

        // Orphaned accounts
        let orphaned_accounts = self.store.check_orphaned_accounts()?;
        checks.insert(
            "orphaned_accounts".to_string(),
            CheckResult {
                status: if orphaned_accounts.is_empty() { "pass" } else { "error" }.to_string(),
                message: if orphaned_accounts.is_empty() {
                    "No orphaned accounts found".to_string()
                } else {
                    format!(
                        "{} account(s) reference missing identities",
                        orphaned_accounts.len()
                    )
                },
                details: if orphaned_accounts.is_empty() {
                    None
                } else {
                    Some(
                        orphaned_accounts
                            .iter()
                            .map(|a| json!({ "account_id": a }))
                            .collect(),
                    )
                },
            },
        );

        // Orphaned item rows
        let orphaned_items = self.store.check_orphaned_items()?;
        checks.insert(
            "orphaned_items".to_string(),
            CheckResult {
                status: if orphaned_items.is_empty() { "pass" } else { "warning" }.to_string(),
                message: if orphaned_items.is_empty() {
                    "No orphaned item rows found".to_string()
                } else {
                    format!(
                        "{} item row(s) reference missing accounts",
                        orphaned_items.len()
                    )
                },
                details: if orphaned_items.is_empty() {
                    None
                } else {
                    Some(
                        orphaned_items
                            .iter()
                            .map(|i| json!({ "item_id": i }))
                            .collect(),
                    )
                },
            },
        );

        // Duplicate handles, impossible under the UNIQUE constraints
        let duplicates = self.store.check_duplicate_handles()?;
        checks.insert(
            "duplicate_handles".to_string(),
            CheckResult {
                status: if duplicates.is_empty() { "pass" } else { "error" }.to_string(),
                message: if duplicates.is_empty() {
                    "All handles are unique".to_string()
                } else {
                    format!("{} duplicated handle(s) found", duplicates.len())
                },
                details: if duplicates.is_empty() {
                    None
                } else {
                    Some(duplicates.iter().map(|h| json!({ "handle": h })).collect())
                },
            },
        );

        // Entries stamped in the future
        let future_entries = self.store.check_future_entries()?;
        checks.insert(
            "future_entries".to_string(),
            CheckResult {
                status: if future_entries == 0 { "pass" } else { "warning" }.to_string(),
                message: if future_entries == 0 {
                    "All entry timestamps are plausible".to_string()
                } else {
                    format!("{} entry(ies) are dated in the future", future_entries)
                },
                details: if future_entries == 0 {
                    None
                } else {
                    Some(vec![json!({ "future_count": future_entries })])
                },
            },
        );

        // Calculate summary
        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: std::collections::HashMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
