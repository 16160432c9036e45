//! Auth service - signup, login, and the local session file
//!
//! Identity verification is delegated to the configured provider; this
//! service owns account creation around it and the session.json file that
//! marks who is logged in on this machine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::{is_duplicate_key, DuckDbStore};
use crate::domain::result::{Error, Result};
use crate::domain::Account;
use crate::ports::IdentityProvider;

/// Attempts to find non-colliding generated handles before giving up.
/// The referral code space is ~890M, so a second attempt is already rare.
const SIGNUP_HANDLE_ATTEMPTS: u32 = 4;

/// Auth service for signup, login and session state
pub struct AuthService {
    store: Arc<DuckDbStore>,
    identity: Arc<dyn IdentityProvider>,
    data_dir: PathBuf,
    welcome_bonus: Decimal,
    referrer_bonus: Decimal,
}

impl AuthService {
    pub fn new(
        store: Arc<DuckDbStore>,
        identity: Arc<dyn IdentityProvider>,
        data_dir: &Path,
        welcome_bonus: Decimal,
        referrer_bonus: Decimal,
    ) -> Self {
        Self {
            store,
            identity,
            data_dir: data_dir.to_path_buf(),
            welcome_bonus,
            referrer_bonus,
        }
    }

    /// Create an identity and its account, applying referral bonuses when
    /// the supplied code resolves.
    ///
    /// A malformed code fails fast, before the identity exists. A
    /// well-formed code that matches nobody is accepted and simply earns
    /// nothing.
    pub fn signup(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        referral_code: Option<&str>,
    ) -> Result<SignupReceipt> {
        if let Some(code) = referral_code {
            let normalized = Account::normalize_referral_code(code);
            if !Account::is_valid_referral_code(&normalized) {
                return Err(Error::validation(format!(
                    "'{}' is not a valid referral code",
                    code
                )));
            }
        }

        let identity = self.identity.create_identity(email, password)?;
        let name = match display_name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => default_display_name(&identity.email),
        };

        for _ in 0..SIGNUP_HANDLE_ATTEMPTS {
            let account = Account::new(identity.id, &name);
            match self.store.create_account_with_bonuses(
                &account,
                referral_code,
                self.welcome_bonus,
                self.referrer_bonus,
            ) {
                Ok(outcome) => {
                    let welcome_bonus = if outcome.referrer.is_some() {
                        self.welcome_bonus
                    } else {
                        Decimal::ZERO
                    };
                    return Ok(SignupReceipt {
                        account: outcome.account,
                        welcome_bonus,
                        referrer_code: outcome.referrer.map(|r| r.referral_code),
                    });
                }
                // A freshly generated code or address collided; new
                // account, new handles
                Err(ref e) if is_duplicate_key(e) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::database(format!(
            "could not allocate unique account handles after {} attempts",
            SIGNUP_HANDLE_ATTEMPTS
        )))
    }

    /// Verify credentials and open a session
    pub fn login(&self, email: &str, password: &str) -> Result<Account> {
        let identity = self.identity.authenticate(email, password)?;
        let account = self
            .store
            .get_account_by_identity(&identity.id)?
            .ok_or_else(|| Error::auth("no account exists for this identity"))?;

        let session = Session {
            identity_id: identity.id,
            token: generate_token(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&session)?;
        fs::write(self.session_path(), json)?;

        Ok(account)
    }

    /// Drop the session. Returns false when nobody was logged in.
    pub fn logout(&self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn current_session(&self) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        // A stale or hand-edited session file counts as logged out
        Ok(serde_json::from_str(&content).ok())
    }

    pub fn current_account(&self) -> Result<Option<Account>> {
        match self.current_session()? {
            Some(session) => self.store.get_account_by_identity(&session.identity_id),
            None => Ok(None),
        }
    }

    /// Session-holder's account, or an auth error telling the user to log in
    pub fn require_account(&self) -> Result<Account> {
        self.current_account()?
            .ok_or_else(|| Error::auth("not logged in, run 'ktc login' first"))
    }

    fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

fn default_display_name(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("tapper")
        .to_string()
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Local session state stored in session.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub identity_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// What the caller gets back from a completed signup
#[derive(Debug, Serialize)]
pub struct SignupReceipt {
    pub account: Account,
    /// Welcome bonus actually credited; zero unless a referral resolved
    pub welcome_bonus: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_code: Option<String>,
}
