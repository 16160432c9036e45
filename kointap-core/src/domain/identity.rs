//! Identity domain model

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A login identity, separate from the account that holds funds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    /// Normalized (trimmed, lowercased) email, unique across identities
    pub email: String,
    /// Argon2 PHC-format hash, never the raw password
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: Self::normalize_email(&email.into()),
            password_hash: password_hash.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize an email for storage and lookup: trim and lowercase
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Shape check only; deliverability is out of scope
    pub fn is_valid_email(email: &str) -> bool {
        let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
        re.is_match(email)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if !Self::is_valid_email(&self.email) {
            return Err("malformed email address");
        }
        if self.password_hash.is_empty() {
            return Err("missing password hash");
        }
        Ok(())
    }
}
