//! Account domain model

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Alphabet for referral codes: no 0/O, 1/I/L to keep codes easy to
/// read aloud and retype.
const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Number of random characters after the `KTC-` prefix
const REFERRAL_CODE_LEN: usize = 6;

/// A KTC account linked to one identity
///
/// The balance column in the database is authoritative; the value carried
/// here is a snapshot from the last read and must never be used for
/// funds-sufficiency decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Identity that owns this account (one account per identity)
    pub identity_id: Uuid,
    pub display_name: String,
    /// Balance in KTC, non-negative
    pub balance: Decimal,
    /// Unique human-shareable code, e.g. "KTC-7F3K9Q"
    pub referral_code: String,
    /// Unique wallet-style identifier, "0x" + 40 hex chars
    pub wallet_address: String,
    pub email_verified: bool,
    pub kyc_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance and freshly generated
    /// referral code and wallet address
    pub fn new(identity_id: Uuid, display_name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            identity_id,
            display_name: display_name.into(),
            balance: Decimal::ZERO,
            referral_code: Self::generate_referral_code(),
            wallet_address: Self::generate_wallet_address(id),
            email_verified: false,
            kyc_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate a referral code: "KTC-" followed by 6 characters from an
    /// unambiguous alphabet (~9e8 combinations; uniqueness is enforced by
    /// the schema, collisions retried at creation)
    pub fn generate_referral_code() -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..REFERRAL_CODE_LEN)
            .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
            .collect();
        format!("KTC-{}", suffix)
    }

    /// Derive a wallet address from the account id plus a random nonce:
    /// "0x" + first 20 bytes of SHA-256, hex encoded
    pub fn generate_wallet_address(account_id: Uuid) -> String {
        let nonce: [u8; 8] = rand::thread_rng().gen();
        let mut hasher = Sha256::new();
        hasher.update(account_id.as_bytes());
        hasher.update(nonce);
        let digest = hasher.finalize();
        format!("0x{}", hex::encode(&digest[..20]))
    }

    /// Normalize a referral code for comparison: trim and uppercase
    pub fn normalize_referral_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Normalize a wallet address for comparison: trim and lowercase
    pub fn normalize_wallet_address(address: &str) -> String {
        address.trim().to_lowercase()
    }

    /// Normalize a recipient handle (referral code or wallet address)
    ///
    /// Addresses start with "0x"; anything else is treated as a code.
    /// Handles arrive straight from the command line, so the prefix check
    /// must not assume the input slices cleanly at byte 2.
    pub fn normalize_handle(handle: &str) -> String {
        let trimmed = handle.trim();
        let has_address_prefix = trimmed
            .get(..2)
            .is_some_and(|p| p.eq_ignore_ascii_case("0x"));
        if has_address_prefix {
            Self::normalize_wallet_address(trimmed)
        } else {
            Self::normalize_referral_code(trimmed)
        }
    }

    /// Check a string against the referral code shape
    pub fn is_valid_referral_code(code: &str) -> bool {
        let re = Regex::new(r"^KTC-[A-HJ-NP-Z2-9]{6}$").unwrap();
        re.is_match(code)
    }

    /// Check a string against the wallet address shape
    pub fn is_valid_wallet_address(address: &str) -> bool {
        let re = Regex::new(r"^0x[0-9a-f]{40}$").unwrap();
        re.is_match(address)
    }

    /// Whether a normalized handle refers to this account
    pub fn matches_handle(&self, handle: &str) -> bool {
        let normalized = Self::normalize_handle(handle);
        normalized == self.referral_code || normalized == self.wallet_address
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.display_name.trim().is_empty() {
            return Err("display name cannot be empty");
        }
        if self.balance < Decimal::ZERO {
            return Err("balance cannot be negative");
        }
        if !Self::is_valid_referral_code(&self.referral_code) {
            return Err("malformed referral code");
        }
        if !Self::is_valid_wallet_address(&self.wallet_address) {
            return Err("malformed wallet address");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_well_formed() {
        let account = Account::new(Uuid::new_v4(), "Tester");
        assert!(account.validate().is_ok());
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(!account.email_verified);
        assert!(!account.kyc_verified);
    }

    #[test]
    fn test_referral_code_shape() {
        let code = Account::generate_referral_code();
        assert!(Account::is_valid_referral_code(&code), "bad code: {}", code);
        assert!(!Account::is_valid_referral_code("KTC-0OIL11"));
        assert!(!Account::is_valid_referral_code("ktc-ABCDEF"));
    }

    #[test]
    fn test_wallet_address_shape() {
        let address = Account::generate_wallet_address(Uuid::new_v4());
        assert!(Account::is_valid_wallet_address(&address));
        assert_eq!(address.len(), 42);
    }

    #[test]
    fn test_handle_normalization() {
        assert_eq!(Account::normalize_handle(" ktc-abc234 "), "KTC-ABC234");
        assert_eq!(
            Account::normalize_handle(" 0xAbC0000000000000000000000000000000000001 "),
            "0xabc0000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_handle_normalization_accepts_multibyte_input() {
        // Byte 2 of "a€" sits inside the euro sign; normalization must
        // treat it as a (bad) referral code, not panic.
        assert_eq!(Account::normalize_handle("a€"), "A€");
        assert_eq!(Account::normalize_handle(" 0€xabc "), "0€XABC");
        assert_eq!(Account::normalize_handle("€"), "€");
        assert_eq!(Account::normalize_handle(""), "");

        let account = Account::new(Uuid::new_v4(), "Tester");
        assert!(!account.matches_handle("a€"));
    }

    #[test]
    fn test_matches_handle() {
        let account = Account::new(Uuid::new_v4(), "Tester");
        assert!(account.matches_handle(&account.referral_code.to_lowercase()));
        assert!(account.matches_handle(&account.wallet_address.to_uppercase()));
        assert!(!account.matches_handle("KTC-ZZZZZZ"));
    }

    #[test]
    fn test_validation_rejects_empty_name() {
        let mut account = Account::new(Uuid::new_v4(), "Tester");
        account.display_name = "  ".to_string();
        assert!(account.validate().is_err());
    }
}
