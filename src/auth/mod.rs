//! Authentication module
//!
//! Password file parsing and password verification. The hash scheme sits
//! behind [`SecretVerifier`] so the store never compares secrets itself.

mod credentials;

pub use credentials::{authenticate, hash_password, parse_passwords, BcryptVerifier, ParsedPasswords};

/// Password verification capability
pub trait SecretVerifier: Send + Sync {
    /// Check `plain` against a stored `hash`
    fn verify(&self, plain: &str, hash: &str) -> bool;

    /// Verifier name for logging
    fn name(&self) -> &str;
}
