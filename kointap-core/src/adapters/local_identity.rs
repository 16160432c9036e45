//! Local identity provider
//!
//! Backs the `IdentityProvider` port with rows in the local database.
//! Passwords are stored as Argon2id PHC strings and never leave this module
//! in any other form.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::adapters::duckdb::{is_duplicate_key, DuckDbStore};
use crate::domain::result::{Error, Result};
use crate::domain::Identity;
use crate::ports::IdentityProvider;

const MIN_PASSWORD_LEN: usize = 8;

/// One message for unknown email and wrong password, so the two cases
/// cannot be told apart by probing
const BAD_CREDENTIALS: &str = "invalid email or password";

pub struct LocalIdentityProvider {
    store: Arc<DuckDbStore>,
}

impl LocalIdentityProvider {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn create_identity(&self, email: &str, password: &str) -> Result<Identity> {
        let normalized = Identity::normalize_email(email);
        if !Identity::is_valid_email(&normalized) {
            return Err(Error::auth("invalid email address"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::auth(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.store.get_identity_by_email(&normalized)?.is_some() {
            return Err(Error::auth("email already registered"));
        }

        let identity = Identity::new(&normalized, hash_password(password)?);
        match self.store.insert_identity(&identity) {
            Ok(()) => Ok(identity),
            // Lost a race with another signup for the same email
            Err(ref e) if is_duplicate_key(e) => Err(Error::auth("email already registered")),
            Err(e) => Err(e),
        }
    }

    fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        let normalized = Identity::normalize_email(email);
        let identity = self
            .store
            .get_identity_by_email(&normalized)?
            .ok_or_else(|| Error::auth(BAD_CREDENTIALS))?;

        if verify_password(&identity.password_hash, password) {
            Ok(identity)
        } else {
            Err(Error::auth(BAD_CREDENTIALS))
        }
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::database(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify_round_trip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "hunter2hunter2"));
        assert!(!verify_password(&hash, "hunter2hunter3"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("not a phc string", "anything"));
        assert!(!verify_password("", "anything"));
    }
}
