//! DuckDB store implementation
//!
//! All balance-affecting operations run inside an explicit transaction:
//! balances are re-read under isolation, checked, mutated, and the ledger
//! entries appended, then everything commits or nothing does. A bounded
//! retry loop absorbs transient write conflicts.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, EntryKind, Identity, OwnedItem, Transaction};
use crate::migrations::MIGRATIONS;
use crate::services::{DateRange, MigrationResult, MigrationService};

/// Maximum number of retries for opening a locked database file and for
/// conflicted write transactions
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_lock_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock")
}

/// Check if an error message indicates a write-write conflict between
/// transactions
fn is_conflict_message(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("write-write conflict")
        || lower.contains("conflict on tuple")
        || lower.contains("conflict on update")
        || lower.contains("transaction conflict")
}

/// Check if an error came from a UNIQUE constraint violation
pub(crate) fn is_duplicate_key(err: &Error) -> bool {
    match err {
        Error::Database(msg) => {
            let lower = msg.to_lowercase();
            lower.contains("duplicate key") || lower.contains("unique constraint")
        }
        _ => false,
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        let msg = e.to_string();
        if is_conflict_message(&msg) {
            Error::ConcurrencyConflict
        } else {
            Error::Database(msg)
        }
    }
}

/// Validate that a query string is a single read-only SELECT
fn ensure_select_only(sql: &str) -> Result<()> {
    let dialect = DuckDbDialect {};
    let statements = Parser::parse_sql(&dialect, sql).map_err(|e| {
        let msg = e.to_string();
        Error::validation(msg.trim_start_matches("sql parser error: ").to_string())
    })?;
    if statements.len() != 1 {
        return Err(Error::validation("expected exactly one SQL statement"));
    }
    match statements.first() {
        Some(Statement::Query(_)) => Ok(()),
        _ => Err(Error::validation("only SELECT queries are allowed")),
    }
}

const ACCOUNT_COLUMNS: &str = "account_id, identity_id, display_name, balance::VARCHAR, \
     referral_code, wallet_address, email_verified, kyc_verified, \
     created_at::VARCHAR, updated_at::VARCHAR";

const ENTRY_COLUMNS: &str = "entry_id, account_id, kind, amount::VARCHAR, \
     counterparty_account_id, counterparty_handle, transfer_id, description, \
     created_at::VARCHAR";

/// Result of an atomic transfer, read back inside the same transaction
#[derive(Debug)]
pub struct TransferOutcome {
    pub transfer_id: Uuid,
    pub sender: Account,
    pub recipient: Account,
}

/// Result of account creation with referral bonuses
#[derive(Debug)]
pub struct SignupOutcome {
    pub account: Account,
    /// Referrer account after its bonus, when the supplied code matched
    pub referrer: Option<Account>,
}

/// DuckDB store implementation
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbStore {
    /// Open the store, retrying with exponential backoff when the file is
    /// locked by another process. Exhausted retries surface
    /// `Error::BackendUnavailable` so callers can classify the failure as
    /// retryable.
    pub fn new(db_path: &Path) -> Result<Self> {
        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_lock_error(&err_msg) {
                        if attempt + 1 < MAX_RETRIES {
                            // Exponential backoff: 50ms, 100ms, 200ms, 400ms
                            let delay =
                                Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                            eprintln!(
                                "[kointap] Database busy, retrying in {}ms (attempt {}/{}): {}",
                                delay.as_millis(),
                                attempt + 1,
                                MAX_RETRIES,
                                err_msg
                            );
                            thread::sleep(delay);
                            continue;
                        }
                        return Err(Error::BackendUnavailable(err_msg));
                    }
                    return Err(e);
                }
            }
        }

        Err(Error::BackendUnavailable(format!(
            "failed to open database after {} retries",
            MAX_RETRIES
        )))
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Disable extension autoloading: everything needed is statically
        // linked via the "json" Cargo feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;
        Ok(conn)
    }

    /// Run ledger database migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn.lock().unwrap();
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Run a write transaction, retrying on write-write conflicts with the
    /// same backoff schedule as connection open. Anything the closure did
    /// before a conflict is rolled back, so a retry starts clean.
    fn with_write_retry<T>(&self, op: impl Fn(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let mut attempt = 0;
        loop {
            match op(&mut conn) {
                Err(Error::ConcurrencyConflict) if attempt + 1 < MAX_RETRIES => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    // === Identity operations ===

    pub fn insert_identity(&self, identity: &Identity) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO identities (identity_id, email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                identity.id.to_string(),
                identity.email,
                identity.password_hash,
                format_timestamp(&identity.created_at),
                format_timestamp(&identity.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT identity_id, email, password_hash, created_at::VARCHAR, updated_at::VARCHAR
             FROM identities WHERE email = ?",
        )?;
        let identity = stmt
            .query_row(params![email], |row| Self::row_to_identity(row))
            .ok();
        Ok(identity)
    }

    pub fn get_identity_by_id(&self, id: &Uuid) -> Result<Option<Identity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT identity_id, email, password_hash, created_at::VARCHAR, updated_at::VARCHAR
             FROM identities WHERE identity_id = ?",
        )?;
        let identity = stmt
            .query_row(params![id.to_string()], |row| Self::row_to_identity(row))
            .ok();
        Ok(identity)
    }

    pub fn count_identities(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(count)
    }

    fn row_to_identity(row: &duckdb::Row) -> duckdb::Result<Identity> {
        let id: String = row.get(0)?;
        let created: String = row.get(3)?;
        let updated: String = row.get(4)?;
        Ok(Identity {
            id: parse_uuid(&id),
            email: row.get(1)?,
            password_hash: row.get(2)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    // === Account operations ===

    pub fn get_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts ORDER BY created_at",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([], |row| Self::row_to_account(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    pub fn get_account_by_id(&self, id: &Uuid) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE account_id = ?",
            ACCOUNT_COLUMNS
        ))?;
        let account = stmt
            .query_row(params![id.to_string()], |row| Self::row_to_account(row))
            .ok();
        Ok(account)
    }

    pub fn get_account_by_identity(&self, identity_id: &Uuid) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE identity_id = ?",
            ACCOUNT_COLUMNS
        ))?;
        let account = stmt
            .query_row(params![identity_id.to_string()], |row| {
                Self::row_to_account(row)
            })
            .ok();
        Ok(account)
    }

    /// Resolve a recipient handle against referral codes and wallet
    /// addresses in one disjunctive query. The handle is normalized first.
    pub fn find_accounts_by_handle(&self, handle: &str) -> Result<Vec<Account>> {
        let normalized = Account::normalize_handle(handle);
        let conn = self.conn.lock().unwrap();
        Self::accounts_by_handle_on(&conn, &normalized)
    }

    fn accounts_by_handle_on(conn: &Connection, normalized: &str) -> Result<Vec<Account>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE referral_code = ? OR wallet_address = ?",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(params![normalized, normalized], |row| {
                Self::row_to_account(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn account_by_referral_code_on(conn: &Connection, code: &str) -> Result<Option<Account>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE referral_code = ?",
            ACCOUNT_COLUMNS
        ))?;
        let account = stmt
            .query_row(params![code], |row| Self::row_to_account(row))
            .ok();
        Ok(account)
    }

    /// Read an account inside a transaction; the returned balance is the
    /// authoritative value for funds checks.
    fn account_on(conn: &Connection, id: &Uuid) -> Result<Account> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE account_id = ?",
            ACCOUNT_COLUMNS
        ))?;
        match stmt.query_row(params![id.to_string()], |row| Self::row_to_account(row)) {
            Ok(account) => Ok(account),
            Err(duckdb::Error::QueryReturnedNoRows) => {
                Err(Error::not_found(format!("account {}", id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn insert_account_on(conn: &Connection, account: &Account) -> Result<()> {
        conn.execute(
            "INSERT INTO accounts (account_id, identity_id, display_name, balance,
                                   referral_code, wallet_address, email_verified, kyc_verified,
                                   created_at, updated_at)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(28, 6)), ?, ?, ?, ?, ?, ?)",
            params![
                account.id.to_string(),
                account.identity_id.to_string(),
                account.display_name,
                account.balance.to_string(),
                account.referral_code,
                account.wallet_address,
                account.email_verified,
                account.kyc_verified,
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    fn apply_balance_delta(
        conn: &Connection,
        account_id: &Uuid,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE accounts
             SET balance = balance + CAST(? AS DECIMAL(28, 6)), updated_at = ?
             WHERE account_id = ?",
            params![
                delta.to_string(),
                format_timestamp(&now),
                account_id.to_string()
            ],
        )?;
        Ok(())
    }

    fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
        let id: String = row.get(0)?;
        let identity_id: String = row.get(1)?;
        let balance: String = row.get(3)?;
        let created: String = row.get(8)?;
        let updated: String = row.get(9)?;
        Ok(Account {
            id: parse_uuid(&id),
            identity_id: parse_uuid(&identity_id),
            display_name: row.get(2)?,
            balance: Decimal::from_str(&balance).unwrap_or_default(),
            referral_code: row.get(4)?,
            wallet_address: row.get(5)?,
            email_verified: row.get(6)?,
            kyc_verified: row.get(7)?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    // === Ledger mutations ===

    /// Atomic two-account transfer
    ///
    /// Resolution, funds check, both balance updates, and both paired
    /// entries happen inside one transaction. On any failure nothing is
    /// applied: local validation errors surface before the first write and
    /// storage errors roll the transaction back.
    pub fn transfer(
        &self,
        sender_id: &Uuid,
        recipient_handle: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<TransferOutcome> {
        let normalized = Account::normalize_handle(recipient_handle);
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;

            let mut matches = Self::accounts_by_handle_on(&tx, &normalized)?;
            if matches.len() > 1 {
                return Err(Error::AmbiguousRecipient(normalized.clone()));
            }
            let recipient = matches
                .pop()
                .ok_or_else(|| Error::RecipientNotFound(normalized.clone()))?;
            if recipient.id == *sender_id {
                return Err(Error::SelfTransfer);
            }

            let sender = Self::account_on(&tx, sender_id)?;
            if sender.balance < amount {
                return Err(Error::InsufficientFunds {
                    balance: sender.balance,
                    requested: amount,
                });
            }

            let now = Utc::now();
            Self::apply_balance_delta(&tx, &sender.id, -amount, now)?;
            Self::apply_balance_delta(&tx, &recipient.id, amount, now)?;

            let transfer_id = Uuid::new_v4();
            let mut out_entry = Transaction::new(sender.id, EntryKind::TransferOut, amount)
                .with_counterparty(recipient.id, normalized.clone())
                .with_transfer_id(transfer_id);
            let mut in_entry = Transaction::new(recipient.id, EntryKind::TransferIn, amount)
                .with_counterparty(sender.id, sender.referral_code.clone())
                .with_transfer_id(transfer_id);
            if let Some(d) = description {
                out_entry = out_entry.with_description(d);
                in_entry = in_entry.with_description(d);
            }
            Self::insert_entry_on(&tx, &out_entry)?;
            Self::insert_entry_on(&tx, &in_entry)?;

            // Committed balances are what callers update local state from
            let sender_after = Self::account_on(&tx, &sender.id)?;
            let recipient_after = Self::account_on(&tx, &recipient.id)?;
            tx.commit()?;

            Ok(TransferOutcome {
                transfer_id,
                sender: sender_after,
                recipient: recipient_after,
            })
        })
    }

    /// Credit an account: balance increase plus a deposit entry, one
    /// transaction.
    pub fn credit(
        &self,
        account_id: &Uuid,
        amount: Decimal,
        description: Option<&str>,
    ) -> Result<Account> {
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;
            let account = Self::account_on(&tx, account_id)?;

            Self::apply_balance_delta(&tx, &account.id, amount, Utc::now())?;
            let mut entry = Transaction::new(account.id, EntryKind::Deposit, amount);
            if let Some(d) = description {
                entry = entry.with_description(d);
            }
            Self::insert_entry_on(&tx, &entry)?;

            let after = Self::account_on(&tx, &account.id)?;
            tx.commit()?;
            Ok(after)
        })
    }

    /// Debit an account with a funds check. `kind` must be a debit kind
    /// (withdrawal or purchase).
    pub fn debit(
        &self,
        account_id: &Uuid,
        amount: Decimal,
        kind: EntryKind,
        description: Option<&str>,
    ) -> Result<Account> {
        if !kind.is_debit() {
            return Err(Error::validation(format!(
                "{} is not a debit entry kind",
                kind.as_str()
            )));
        }
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;
            let account = Self::account_on(&tx, account_id)?;
            if account.balance < amount {
                return Err(Error::InsufficientFunds {
                    balance: account.balance,
                    requested: amount,
                });
            }

            Self::apply_balance_delta(&tx, &account.id, -amount, Utc::now())?;
            let mut entry = Transaction::new(account.id, kind, amount);
            if let Some(d) = description {
                entry = entry.with_description(d);
            }
            Self::insert_entry_on(&tx, &entry)?;

            let after = Self::account_on(&tx, &account.id)?;
            tx.commit()?;
            Ok(after)
        })
    }

    /// Funds-checked purchase debit plus item grant, one transaction
    pub fn purchase_item(
        &self,
        account_id: &Uuid,
        item_id: &str,
        price: Decimal,
        item_name: &str,
    ) -> Result<Account> {
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;
            let account = Self::account_on(&tx, account_id)?;
            if account.balance < price {
                return Err(Error::InsufficientFunds {
                    balance: account.balance,
                    requested: price,
                });
            }

            let now = Utc::now();
            Self::apply_balance_delta(&tx, &account.id, -price, now)?;
            let entry = Transaction::new(account.id, EntryKind::Purchase, price)
                .with_description(item_name);
            Self::insert_entry_on(&tx, &entry)?;

            tx.execute(
                "INSERT INTO account_items (account_id, item_id, quantity, acquired_at)
                 VALUES (?, ?, 1, ?)
                 ON CONFLICT (account_id, item_id) DO UPDATE SET
                    quantity = account_items.quantity + 1,
                    acquired_at = EXCLUDED.acquired_at",
                params![
                    account.id.to_string(),
                    item_id,
                    format_timestamp(&now)
                ],
            )?;

            let after = Self::account_on(&tx, &account.id)?;
            tx.commit()?;
            Ok(after)
        })
    }

    /// Create an account and apply referral bonuses in one transaction
    ///
    /// When `referral_code` resolves to an existing account, the welcome
    /// bonus is credited to the new account and the referrer bonus to the
    /// referrer, each with its own deposit entry. An unknown code applies
    /// no bonuses and is not an error.
    pub fn create_account_with_bonuses(
        &self,
        account: &Account,
        referral_code: Option<&str>,
        welcome_bonus: Decimal,
        referrer_bonus: Decimal,
    ) -> Result<SignupOutcome> {
        self.with_write_retry(|conn| {
            let tx = conn.transaction()?;
            Self::insert_account_on(&tx, account)?;

            let mut referrer_after = None;
            if let Some(code) = referral_code {
                let normalized = Account::normalize_referral_code(code);
                if let Some(referrer) = Self::account_by_referral_code_on(&tx, &normalized)? {
                    let now = Utc::now();
                    if welcome_bonus > Decimal::ZERO {
                        Self::apply_balance_delta(&tx, &account.id, welcome_bonus, now)?;
                        let entry =
                            Transaction::new(account.id, EntryKind::Deposit, welcome_bonus)
                                .with_description("Welcome bonus");
                        Self::insert_entry_on(&tx, &entry)?;
                    }
                    if referrer_bonus > Decimal::ZERO {
                        Self::apply_balance_delta(&tx, &referrer.id, referrer_bonus, now)?;
                        let entry =
                            Transaction::new(referrer.id, EntryKind::Deposit, referrer_bonus)
                                .with_description("Referral bonus");
                        Self::insert_entry_on(&tx, &entry)?;
                    }
                    referrer_after = Some(Self::account_on(&tx, &referrer.id)?);
                }
            }

            let created = Self::account_on(&tx, &account.id)?;
            tx.commit()?;
            Ok(SignupOutcome {
                account: created,
                referrer: referrer_after,
            })
        })
    }

    // === Entry operations ===

    fn insert_entry_on(conn: &Connection, entry: &Transaction) -> Result<()> {
        conn.execute(
            "INSERT INTO entries (entry_id, account_id, kind, amount, counterparty_account_id,
                                  counterparty_handle, transfer_id, description, created_at)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(28, 6)), ?, ?, ?, ?, ?)",
            params![
                entry.id.to_string(),
                entry.account_id.to_string(),
                entry.kind.as_str(),
                entry.amount.to_string(),
                entry.counterparty_account_id.map(|id| id.to_string()),
                entry.counterparty_handle,
                entry.transfer_id.map(|id| id.to_string()),
                entry.description,
                format_timestamp(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    /// Entries for one account, most recent first
    pub fn get_entries_by_account(
        &self,
        account_id: &Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE account_id = ?
             ORDER BY created_at DESC, entry_id LIMIT ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(
                params![account_id.to_string(), limit.unwrap_or(i64::MAX)],
                |row| Self::row_to_entry(row),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Both legs of a transfer
    pub fn get_entries_by_transfer(&self, transfer_id: &Uuid) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE transfer_id = ? ORDER BY kind",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![transfer_id.to_string()], |row| {
                Self::row_to_entry(row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count_entries(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_accounts(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Sum of all account balances
    pub fn total_supply(&self) -> Result<Decimal> {
        let conn = self.conn.lock().unwrap();
        let total: String = conn.query_row(
            "SELECT COALESCE(SUM(balance), 0)::VARCHAR FROM accounts",
            [],
            |row| row.get(0),
        )?;
        Ok(Decimal::from_str(&total).unwrap_or_default())
    }

    pub fn get_entry_date_range(&self) -> Result<DateRange> {
        let conn = self.conn.lock().unwrap();
        let result: (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(created_at)::VARCHAR, MAX(created_at)::VARCHAR FROM entries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DateRange {
            earliest: result.0,
            latest: result.1,
        })
    }

    fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<Transaction> {
        let id: String = row.get(0)?;
        let account_id: String = row.get(1)?;
        let kind: String = row.get(2)?;
        let amount: String = row.get(3)?;
        let counterparty: Option<String> = row.get(4)?;
        let transfer_id: Option<String> = row.get(6)?;
        let created: String = row.get(8)?;
        Ok(Transaction {
            id: parse_uuid(&id),
            account_id: parse_uuid(&account_id),
            kind: EntryKind::from_str(&kind).unwrap_or(EntryKind::Deposit),
            amount: Decimal::from_str(&amount).unwrap_or_default(),
            counterparty_account_id: counterparty.map(|s| parse_uuid(&s)),
            counterparty_handle: row.get(5)?,
            transfer_id: transfer_id.map(|s| parse_uuid(&s)),
            description: row.get(7)?,
            created_at: parse_timestamp(&created),
        })
    }

    // === Item operations ===

    pub fn get_owned_items(&self, account_id: &Uuid) -> Result<Vec<OwnedItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, item_id, quantity, acquired_at::VARCHAR
             FROM account_items WHERE account_id = ? AND quantity > 0
             ORDER BY item_id",
        )?;
        let items = stmt
            .query_map(params![account_id.to_string()], |row| {
                let account: String = row.get(0)?;
                let acquired: String = row.get(3)?;
                Ok(OwnedItem {
                    account_id: parse_uuid(&account),
                    item_id: row.get(1)?,
                    quantity: row.get(2)?,
                    acquired_at: parse_timestamp(&acquired),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Consume one unit of an owned item. Returns false when the account
    /// owns none; the single conditional UPDATE cannot go below zero.
    pub fn consume_item(&self, account_id: &Uuid, item_id: &str) -> Result<bool> {
        self.with_write_retry(|conn| {
            let changed = conn.execute(
                "UPDATE account_items SET quantity = quantity - 1
                 WHERE account_id = ? AND item_id = ? AND quantity > 0",
                params![account_id.to_string(), item_id],
            )?;
            Ok(changed > 0)
        })
    }

    // === Query surface ===

    /// Execute a read-only query. Anything but a single SELECT statement is
    /// rejected before it reaches the engine.
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        ensure_select_only(sql)?;

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;

        let mut result_rows = stmt.query([])?;
        let mut rows: Vec<Vec<serde_json::Value>> = Vec::new();
        let mut column_count = 0;

        while let Some(row) = result_rows.next()? {
            if rows.is_empty() {
                column_count = row.as_ref().column_count();
            }
            let mut row_values: Vec<serde_json::Value> = Vec::new();
            for i in 0..column_count {
                row_values.push(column_value(row, i));
            }
            rows.push(row_values);
        }

        // Drop result_rows to release borrow on stmt
        drop(result_rows);

        let count = if column_count > 0 {
            column_count
        } else {
            stmt.column_count()
        };
        let columns: Vec<String> = (0..count)
            .map(|i| {
                stmt.column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();

        let row_count = rows.len();
        Ok(QueryResult {
            columns,
            rows,
            row_count,
        })
    }

    // === Maintenance operations ===

    /// Rewrite the database file to reclaim space
    ///
    /// VACUUM does not reclaim space in DuckDB; COPY FROM DATABASE into a
    /// fresh file does. The connection is swapped to the new file once the
    /// copy lands.
    pub fn compact(&self) -> Result<()> {
        use std::fs;

        let temp_db = self.db_path.with_extension("duckdb.tmp");
        // Remove temp file if it exists from a previous failed run
        let _ = fs::remove_file(&temp_db);

        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let compact_conn = Connection::open_in_memory_with_flags(config)?;
        compact_conn.execute(
            &format!("ATTACH '{}' AS source_db", self.db_path.display()),
            [],
        )?;
        compact_conn.execute(&format!("ATTACH '{}' AS target_db", temp_db.display()), [])?;
        compact_conn.execute("COPY FROM DATABASE source_db TO target_db", [])?;
        compact_conn.execute("DETACH source_db", [])?;
        compact_conn.execute("DETACH target_db", [])?;
        drop(compact_conn);

        // Close the main connection while files are swapped
        let mut conn = self.conn.lock().unwrap();

        let backup_db = self.db_path.with_extension("duckdb.old");
        let _ = fs::remove_file(&backup_db);
        fs::rename(&self.db_path, &backup_db)?;
        fs::rename(&temp_db, &self.db_path)?;

        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        *conn = Connection::open_with_flags(&self.db_path, config)?;

        let _ = fs::remove_file(&backup_db);
        Ok(())
    }

    pub fn get_db_size(&self) -> Result<u64> {
        let metadata = std::fs::metadata(&self.db_path)?;
        Ok(metadata.len())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Check if a table exists
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // === Doctor checks ===

    /// Accounts whose balance disagrees with the signed sum of their
    /// entries. Returns "referral_code|balance|entry_sum" per mismatch.
    pub fn check_balance_mismatches(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.referral_code, a.balance::VARCHAR,
                    COALESCE(SUM(CASE WHEN e.kind IN ('deposit', 'transfer_in')
                                      THEN e.amount ELSE -e.amount END), 0)::VARCHAR
             FROM accounts a
             LEFT JOIN entries e ON e.account_id = a.account_id
             GROUP BY a.account_id, a.referral_code, a.balance
             HAVING a.balance != COALESCE(SUM(CASE WHEN e.kind IN ('deposit', 'transfer_in')
                                               THEN e.amount ELSE -e.amount END), 0)",
        )?;
        let mismatches = stmt
            .query_map([], |row| {
                let code: String = row.get(0)?;
                let balance: String = row.get(1)?;
                let entry_sum: String = row.get(2)?;
                Ok(format!("{}|{}|{}", code, balance, entry_sum))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(mismatches)
    }

    pub fn check_negative_balances(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT referral_code FROM accounts WHERE balance < 0",
        )?;
        let codes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    pub fn check_orphaned_entries(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT e.entry_id FROM entries e
             LEFT JOIN accounts a ON e.account_id = a.account_id
             WHERE a.account_id IS NULL",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orphans)
    }

    pub fn check_orphaned_accounts(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.account_id FROM accounts a
             LEFT JOIN identities i ON a.identity_id = i.identity_id
             WHERE i.identity_id IS NULL",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orphans)
    }

    pub fn check_orphaned_items(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ai.item_id FROM account_items ai
             LEFT JOIN accounts a ON ai.account_id = a.account_id
             WHERE a.account_id IS NULL",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orphans)
    }

    /// Transfer ids whose legs are not exactly one transfer_in plus one
    /// transfer_out of equal amounts
    pub fn check_unpaired_transfers(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT transfer_id FROM entries
             WHERE transfer_id IS NOT NULL
             GROUP BY transfer_id
             HAVING COUNT(*) != 2
                 OR MIN(amount) != MAX(amount)
                 OR SUM(CASE WHEN kind = 'transfer_in' THEN 1 ELSE 0 END) != 1
                 OR SUM(CASE WHEN kind = 'transfer_out' THEN 1 ELSE 0 END) != 1",
        )?;
        let unpaired = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(unpaired)
    }

    /// Duplicate handles that should be impossible under the schema's
    /// UNIQUE constraints
    pub fn check_duplicate_handles(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT referral_code FROM accounts GROUP BY referral_code HAVING COUNT(*) > 1
             UNION ALL
             SELECT wallet_address FROM accounts GROUP BY wallet_address HAVING COUNT(*) > 1
             UNION ALL
             SELECT email FROM identities GROUP BY email HAVING COUNT(*) > 1",
        )?;
        let duplicates = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(duplicates)
    }

    /// Entries stamped more than a day into the future
    pub fn check_future_entries(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let tomorrow = format_timestamp(&(Utc::now() + chrono::Duration::days(1)));
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE created_at > ?",
            params![tomorrow],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Query result structure
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

// Helper functions

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

/// Timestamps are stored as UTC without an offset suffix
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .or_else(|_| {
            DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
        })
        .unwrap_or_else(|_| Utc::now())
}

fn column_value(row: &duckdb::Row, idx: usize) -> serde_json::Value {
    use duckdb::types::ValueRef;

    match row.get_ref(idx) {
        Ok(ValueRef::Null) => serde_json::Value::Null,
        Ok(ValueRef::Boolean(b)) => serde_json::Value::Bool(b),
        Ok(ValueRef::TinyInt(i)) => serde_json::json!(i),
        Ok(ValueRef::SmallInt(i)) => serde_json::json!(i),
        Ok(ValueRef::Int(i)) => serde_json::json!(i),
        Ok(ValueRef::BigInt(i)) => serde_json::json!(i),
        Ok(ValueRef::HugeInt(i)) => serde_json::json!(i.to_string()),
        Ok(ValueRef::UTinyInt(i)) => serde_json::json!(i),
        Ok(ValueRef::USmallInt(i)) => serde_json::json!(i),
        Ok(ValueRef::UInt(i)) => serde_json::json!(i),
        Ok(ValueRef::UBigInt(i)) => serde_json::json!(i),
        Ok(ValueRef::Float(f)) => serde_json::json!(f),
        Ok(ValueRef::Double(f)) => serde_json::json!(f),
        Ok(ValueRef::Decimal(d)) => {
            // Render decimals as strings so amounts survive JSON exactly
            serde_json::Value::String(d.to_string())
        }
        Ok(ValueRef::Text(bytes)) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).to_string())
        }
        Ok(ValueRef::Blob(bytes)) => {
            serde_json::Value::String(format!("<blob {} bytes>", bytes.len()))
        }
        Ok(ValueRef::Date32(d)) => {
            // Days since epoch
            let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
            let date = epoch + chrono::Duration::days(d as i64);
            serde_json::Value::String(date.to_string())
        }
        Ok(ValueRef::Timestamp(_, ts)) => {
            // Microseconds since epoch
            let dt = chrono::DateTime::from_timestamp_micros(ts)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| ts.to_string());
            serde_json::Value::String(dt)
        }
        _ => serde_json::Value::Null,
    }
}
