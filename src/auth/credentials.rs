//! File-based username/password authentication

use super::SecretVerifier;
use crate::acl::is_comment_or_empty;
use crate::config::HashConfig;
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome of parsing a password source
#[derive(Clone, Default)]
pub struct ParsedPasswords {
    /// Map of username to stored hash
    pub users: HashMap<String, String>,
    /// Number of lines skipped as malformed
    pub malformed: usize,
}

impl fmt::Debug for ParsedPasswords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedPasswords")
            .field("users", &self.users.len())
            .field("malformed", &self.malformed)
            .finish()
    }
}

/// Parse a password source of `identity:hash` lines
///
/// Lines that do not split into exactly two colon-separated fields are
/// logged and skipped. A repeated identity keeps its last hash.
pub fn parse_passwords(source: &str) -> ParsedPasswords {
    let mut parsed = ParsedPasswords::default();

    for (idx, line) in source.lines().enumerate() {
        if is_comment_or_empty(line) {
            continue;
        }

        let fields: Vec<&str> = line.split(':').collect();
        match fields.as_slice() {
            [username, hash] => {
                if parsed
                    .users
                    .insert(username.to_string(), hash.to_string())
                    .is_some()
                {
                    debug!(username = %username, "Duplicate user in password file, keeping last entry");
                }
            }
            _ => {
                warn!(line = idx + 1, "Password file line is not well formatted, skipped");
                parsed.malformed += 1;
            }
        }
    }

    info!(users = parsed.users.len(), "Read users from password file");
    parsed
}

/// Check a username/password pair against a user map
pub fn authenticate(
    users: &HashMap<String, String>,
    verifier: &dyn SecretVerifier,
    username: &str,
    password: &str,
) -> bool {
    let hash = match users.get(username) {
        Some(h) => h,
        None => {
            debug!(username = %username, "User not found");
            return false;
        }
    };

    if verifier.verify(password, hash) {
        true
    } else {
        info!(username = %username, verifier = verifier.name(), "Wrong password");
        false
    }
}

/// bcrypt password verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptVerifier {
    config: HashConfig,
}

impl BcryptVerifier {
    pub fn new(config: HashConfig) -> Self {
        Self { config }
    }

    /// Hash a password with the configured cost
    pub fn hash(&self, password: &str) -> Result<String> {
        hash_password(password, self.config.cost)
    }
}

impl SecretVerifier for BcryptVerifier {
    fn verify(&self, plain: &str, hash: &str) -> bool {
        match bcrypt::verify(plain, hash) {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Password verification error");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "bcrypt"
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> BcryptVerifier {
        BcryptVerifier::new(HashConfig { cost: 4 })
    }

    #[test]
    fn test_parse_passwords() {
        let parsed = parse_passwords(
            "# users\n\
             alice:$2b$04$abc\n\
             \n\
             bob:$2b$04$def\n",
        );

        assert_eq!(parsed.users.len(), 2);
        assert_eq!(parsed.users["alice"], "$2b$04$abc");
        assert_eq!(parsed.users["bob"], "$2b$04$def");
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let parsed = parse_passwords("nocolon\nalice:hash\ntoo:many:colons\nbob:other\n");

        assert_eq!(parsed.malformed, 2);
        assert_eq!(parsed.users.len(), 2);
        assert!(parsed.users.contains_key("alice"));
        assert!(parsed.users.contains_key("bob"));
    }

    #[test]
    fn test_debug_hides_hashes() {
        let parsed = parse_passwords("alice:$2b$04$secrethash\n");
        let printed = format!("{:?}", parsed);
        assert!(printed.contains("users: 1"));
        assert!(!printed.contains("secrethash"));
    }

    #[test]
    fn test_duplicate_user_last_wins() {
        let parsed = parse_passwords("alice:first\nalice:second\n");
        assert_eq!(parsed.users.len(), 1);
        assert_eq!(parsed.users["alice"], "second");
    }

    #[test]
    fn test_successful_auth() {
        let verifier = verifier();
        let hash = verifier.hash("password123").unwrap();
        let parsed = parse_passwords(&format!("testuser:{}\n", hash));

        assert!(authenticate(&parsed.users, &verifier, "testuser", "password123"));
    }

    #[test]
    fn test_wrong_password() {
        let verifier = verifier();
        let hash = verifier.hash("password123").unwrap();
        let parsed = parse_passwords(&format!("testuser:{}\n", hash));

        assert!(!authenticate(&parsed.users, &verifier, "testuser", "wrongpassword"));
    }

    #[test]
    fn test_unknown_user() {
        let parsed = parse_passwords("testuser:whatever\n");
        assert!(!authenticate(&parsed.users, &verifier(), "nobody", "password123"));
    }

    #[test]
    fn test_garbage_hash_fails_closed() {
        let parsed = parse_passwords("testuser:not-a-bcrypt-hash\n");
        assert!(!authenticate(&parsed.users, &verifier(), "testuser", "not-a-bcrypt-hash"));
    }
}
