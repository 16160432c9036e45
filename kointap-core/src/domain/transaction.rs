//! Ledger entry domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of decimal places accepted for KTC amounts
pub const AMOUNT_SCALE: u32 = 6;

/// What a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Credit from outside the ledger (bonus, game payout, top-up)
    Deposit,
    /// Debit leaving the ledger
    Withdrawal,
    /// Receiving leg of a transfer
    TransferIn,
    /// Sending leg of a transfer
    TransferOut,
    /// Debit spent in the item shop
    Purchase,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdrawal => "withdrawal",
            EntryKind::TransferIn => "transfer_in",
            EntryKind::TransferOut => "transfer_out",
            EntryKind::Purchase => "purchase",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(EntryKind::Deposit),
            "withdrawal" => Some(EntryKind::Withdrawal),
            "transfer_in" => Some(EntryKind::TransferIn),
            "transfer_out" => Some(EntryKind::TransferOut),
            "purchase" => Some(EntryKind::Purchase),
            _ => None,
        }
    }

    /// Entries that increase the account balance
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryKind::Deposit | EntryKind::TransferIn)
    }

    /// Entries that decrease the account balance
    pub fn is_debit(&self) -> bool {
        !self.is_credit()
    }
}

/// An append-only ledger entry
///
/// Amounts are stored positive; the kind determines the sign. A transfer
/// produces two entries sharing one `transfer_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: EntryKind,
    /// Always positive, at most 6 decimal places
    pub amount: Decimal,
    /// Other account in a transfer, if any
    pub counterparty_account_id: Option<Uuid>,
    /// Handle the counterparty was addressed by at transfer time
    pub counterparty_handle: Option<String>,
    /// Shared id pairing the two legs of a transfer
    pub transfer_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(account_id: Uuid, kind: EntryKind, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount,
            counterparty_account_id: None,
            counterparty_handle: None,
            transfer_id: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_counterparty(mut self, account_id: Uuid, handle: impl Into<String>) -> Self {
        self.counterparty_account_id = Some(account_id);
        self.counterparty_handle = Some(handle.into());
        self
    }

    pub fn with_transfer_id(mut self, transfer_id: Uuid) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Amount with the sign implied by the entry kind
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }

    /// Validate a user-supplied KTC amount: strictly positive, at most
    /// 6 decimal places
    pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
        if amount <= Decimal::ZERO {
            return Err("amount must be positive");
        }
        if amount.normalize().scale() > AMOUNT_SCALE {
            return Err("amount has more than 6 decimal places");
        }
        Ok(())
    }

    /// Validate entry data
    pub fn validate(&self) -> Result<(), &'static str> {
        Self::validate_amount(self.amount)?;
        let is_transfer = matches!(self.kind, EntryKind::TransferIn | EntryKind::TransferOut);
        if is_transfer && self.transfer_id.is_none() {
            return Err("transfer entries require a transfer id");
        }
        if is_transfer && self.counterparty_account_id.is_none() {
            return Err("transfer entries require a counterparty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            EntryKind::Deposit,
            EntryKind::Withdrawal,
            EntryKind::TransferIn,
            EntryKind::TransferOut,
            EntryKind::Purchase,
        ] {
            assert_eq!(EntryKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EntryKind::from_str("refund"), None);
    }

    #[test]
    fn test_signed_amount_follows_kind() {
        let account_id = Uuid::new_v4();
        let credit = Transaction::new(account_id, EntryKind::Deposit, Decimal::from(100));
        let debit = Transaction::new(account_id, EntryKind::Purchase, Decimal::from(40));
        assert_eq!(credit.signed_amount(), Decimal::from(100));
        assert_eq!(debit.signed_amount(), Decimal::from(-40));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Transaction::validate_amount(Decimal::new(1, 6)).is_ok()); // 0.000001
        assert!(Transaction::validate_amount(Decimal::from(300)).is_ok());
        assert!(Transaction::validate_amount(Decimal::ZERO).is_err());
        assert!(Transaction::validate_amount(Decimal::from(-5)).is_err());
        assert!(Transaction::validate_amount(Decimal::new(1, 7)).is_err()); // 0.0000001
    }

    #[test]
    fn test_transfer_entries_require_pairing_fields() {
        let entry = Transaction::new(Uuid::new_v4(), EntryKind::TransferOut, Decimal::from(10));
        assert!(entry.validate().is_err());

        let paired = entry
            .with_counterparty(Uuid::new_v4(), "KTC-ABC234")
            .with_transfer_id(Uuid::new_v4());
        assert!(paired.validate().is_ok());
    }
}
