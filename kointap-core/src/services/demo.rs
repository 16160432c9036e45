//! Demo service - manage demo mode
//!
//! Demo mode runs the whole app against a sandbox database seeded with
//! funded accounts, so transfers and purchases can be tried without
//! touching the real wallet.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::adapters::duckdb::DuckDbStore;
use crate::adapters::local_identity::LocalIdentityProvider;
use crate::config::Config;
use crate::domain::Account;
use crate::ports::IdentityProvider;

/// Password for every seeded demo identity
pub const DEMO_PASSWORD: &str = "kointap-demo";

/// Seeded personas: email, display name, referral code, starting balance.
/// Codes stick to the referral alphabet (no 0/O/1/I/L).
const DEMO_ACCOUNTS: &[(&str, &str, &str, i64)] = &[
    ("faucet@demo.kointap", "Faucet", "KTC-FAUCET", 100_000),
    ("nakamoto@demo.kointap", "Nakamoto", "KTC-SATS42", 5_000),
    ("tapqueen@demo.kointap", "Tap Queen", "KTC-TAPPER", 1_250),
];

/// Demo service for managing demo mode
pub struct DemoService {
    data_dir: PathBuf,
}

impl DemoService {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Check if demo mode is currently enabled
    pub fn is_enabled(&self) -> Result<bool> {
        let config = Config::load(&self.data_dir)?;
        Ok(config.demo_mode)
    }

    /// Enable demo mode
    ///
    /// This will:
    /// 1. Delete any existing demo database (fresh start)
    /// 2. Enable demo mode in config
    /// 3. Create the demo database and seed the demo accounts
    pub fn enable(&self) -> Result<()> {
        // Delete existing demo database for a fresh start
        let demo_db = self.data_dir.join("demo.duckdb");
        let demo_wal = self.data_dir.join("demo.duckdb.wal");
        if demo_db.exists() {
            std::fs::remove_file(&demo_db)?;
        }
        if demo_wal.exists() {
            std::fs::remove_file(&demo_wal)?;
        }

        // Enable demo mode in config
        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.enable_demo_mode();
        config.save(&self.data_dir)?;

        // Create demo database and seed it
        let store = Arc::new(DuckDbStore::new(&demo_db)?);
        store.ensure_schema()?;
        let identity = LocalIdentityProvider::new(Arc::clone(&store));

        for (email, name, code, balance) in DEMO_ACCOUNTS {
            let created = identity.create_identity(email, DEMO_PASSWORD)?;
            let mut account = Account::new(created.id, *name);
            account.referral_code = (*code).to_string();
            store.create_account_with_bonuses(&account, None, Decimal::ZERO, Decimal::ZERO)?;
            // Funded through the ledger so balances agree with entries
            store.credit(&account.id, Decimal::from(*balance), Some("Demo grant"))?;
        }

        Ok(())
    }

    /// Disable demo mode
    ///
    /// This will:
    /// 1. Disable demo mode in config
    /// 2. Optionally delete the demo database (if clean = true)
    pub fn disable(&self, clean: bool) -> Result<()> {
        let mut config = Config::load(&self.data_dir).unwrap_or_default();
        config.disable_demo_mode();
        config.save(&self.data_dir)?;

        if clean {
            let demo_db = self.data_dir.join("demo.duckdb");
            let demo_wal = self.data_dir.join("demo.duckdb.wal");
            if demo_db.exists() {
                std::fs::remove_file(&demo_db)?;
            }
            if demo_wal.exists() {
                std::fs::remove_file(&demo_wal)?;
            }
        }

        Ok(())
    }
}
