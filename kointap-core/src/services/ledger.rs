//! Ledger service - transfers, deposits, withdrawals, history
//!
//! Thin orchestration over the store: local validation runs first so the
//! cheap failures never open a transaction, then the store applies the
//! whole mutation atomically.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, EntryKind, Transaction};

/// Ledger service for balance-affecting operations
pub struct LedgerService {
    store: Arc<DuckDbStore>,
}

impl LedgerService {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    /// Send KTC to another account addressed by referral code or wallet
    /// address.
    ///
    /// The sender's own handles are checked before storage is touched;
    /// the store repeats the self-check against resolved ids inside the
    /// transaction, so a handle that resolves back to the sender can
    /// never pass.
    ///
    /// There is no idempotency key. Each call mints a fresh transfer id,
    /// and retrying after an ambiguous failure sends the money again.
    pub fn transfer(
        &self,
        sender: &Account,
        recipient_handle: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<TransferReceipt> {
        Transaction::validate_amount(amount).map_err(Error::validation)?;
        if sender.matches_handle(recipient_handle) {
            return Err(Error::SelfTransfer);
        }

        let outcome = self
            .store
            .transfer(&sender.id, recipient_handle, amount, description)?;

        Ok(TransferReceipt {
            transfer_id: outcome.transfer_id,
            amount,
            sender_balance: outcome.sender.balance,
            recipient_name: outcome.recipient.display_name,
            recipient_code: outcome.recipient.referral_code,
        })
    }

    /// Credit an account from outside the ledger (faucet deposits, round
    /// payouts run through GameService instead)
    pub fn deposit(
        &self,
        account_id: &Uuid,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Account> {
        Transaction::validate_amount(amount).map_err(Error::validation)?;
        self.store.credit(account_id, amount, description)
    }

    /// Funds-checked withdrawal
    pub fn withdraw(
        &self,
        account_id: &Uuid,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Account> {
        Transaction::validate_amount(amount).map_err(Error::validation)?;
        self.store
            .debit(account_id, amount, EntryKind::Withdrawal, description)
    }

    /// Current account state, balance included
    pub fn balance(&self, account_id: &Uuid) -> Result<Account> {
        self.store
            .get_account_by_id(account_id)?
            .ok_or_else(|| Error::not_found(format!("account {}", account_id)))
    }

    /// Entries for an account, most recent first
    pub fn history(&self, account_id: &Uuid, limit: Option<i64>) -> Result<Vec<Transaction>> {
        self.store.get_entries_by_account(account_id, limit)
    }

    /// Resolve a handle to matching accounts without mutating anything
    pub fn lookup(&self, handle: &str) -> Result<Vec<Account>> {
        self.store.find_accounts_by_handle(handle)
    }
}

/// What the caller gets back from a committed transfer
#[derive(Debug, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub amount: Decimal,
    pub sender_balance: Decimal,
    pub recipient_name: String,
    pub recipient_code: String,
}
