//! Identity provider port
//!
//! Defines the interface for creating and authenticating login identities.
//! The core depends only on this trait; the local credential store is one
//! implementation, a hosted auth backend would be another.

use crate::domain::result::Result;
use crate::domain::Identity;

/// Identity provider trait
///
/// Implementations own credential storage and verification. Callers pass
/// raw passwords in; nothing but the PHC hash ever comes back out.
pub trait IdentityProvider: Send + Sync {
    /// Provider name (e.g., "local")
    fn name(&self) -> &str;

    /// Create a new identity
    ///
    /// Fails with `Error::Auth` when the email is already registered or the
    /// password does not meet the minimum length.
    fn create_identity(&self, email: &str, password: &str) -> Result<Identity>;

    /// Verify credentials and return the matching identity
    ///
    /// Fails with `Error::Auth` on unknown email or wrong password; the two
    /// cases are deliberately indistinguishable to the caller.
    fn authenticate(&self, email: &str, password: &str) -> Result<Identity>;
}
