//! Status service - ledger and account summaries

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbStore;

/// Status service for ledger summaries
pub struct StatusService {
    store: Arc<DuckDbStore>,
}

impl StatusService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let accounts = self.store.get_accounts()?;
        let total_identities = self.store.count_identities()?;
        let total_entries = self.store.count_entries()?;
        let total_supply = self.store.total_supply()?;
        let date_range = self.store.get_entry_date_range()?;
        let db_size_bytes = self.store.get_db_size()?;

        Ok(StatusSummary {
            total_accounts: accounts.len() as i64,
            total_identities,
            total_entries,
            total_supply,
            accounts: accounts
                .into_iter()
                .map(|a| AccountSummary {
                    display_name: a.display_name,
                    referral_code: a.referral_code,
                    balance: a.balance,
                })
                .collect(),
            date_range,
            db_size_bytes,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub total_identities: i64,
    pub total_entries: i64,
    /// Sum of all balances, the circulating KTC supply
    pub total_supply: Decimal,
    pub accounts: Vec<AccountSummary>,
    pub date_range: DateRange,
    pub db_size_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub display_name: String,
    pub referral_code: String,
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}
