//! Credential and rule store
//!
//! A [`Store`] is one immutable snapshot of the password and ACL files.
//! It is built in full before anyone can see it and never changes afterwards;
//! reloading means building a new one.

use crate::acl::{parse_acl, AclEvaluator, RuleSet};
use crate::auth::{authenticate, parse_passwords, SecretVerifier};
use crate::config::FilesConfig;
use crate::error::{Error, Result, SourceKind};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Counters gathered while loading a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Users read from the password file
    pub users: usize,
    /// ACL lines turned into rules
    pub acl_rules: usize,
    /// Lines skipped as malformed, both files together
    pub malformed_lines: usize,
}

/// Immutable snapshot of users and ACL rules
#[derive(Clone, Default)]
pub struct Store {
    users: HashMap<String, String>,
    acl: AclEvaluator,
    stats: LoadStats,
}

impl Store {
    /// Load a snapshot from the files named in `config`
    pub fn load(config: &FilesConfig) -> Result<Self> {
        config.validate()?;
        let password_path = config
            .password_path
            .as_deref()
            .ok_or(Error::MissingPasswordPath)?;

        let passwords = read_source(password_path, SourceKind::Passwords)?;
        let acl = match config.acl_path {
            Some(ref path) => Some(read_source(path, SourceKind::Acl)?),
            None => {
                info!("No ACL file configured, ACLs won't be checked");
                None
            }
        };

        let mut store = Self::from_sources(
            &passwords.text,
            acl.as_ref().map(|source| source.text.as_str()),
            config,
        )?;
        store.stats.malformed_lines +=
            passwords.undecodable + acl.map_or(0, |source| source.undecodable);
        Ok(store)
    }

    /// Build a snapshot from in-memory sources
    ///
    /// Passing `None` for `acl` disables ACL checks. Only `unknown_acl_user`
    /// and `subscribe_policy` are read from `config`.
    pub fn from_sources(passwords: &str, acl: Option<&str>, config: &FilesConfig) -> Result<Self> {
        let parsed_passwords = parse_passwords(passwords);
        let mut stats = LoadStats {
            users: parsed_passwords.users.len(),
            acl_rules: 0,
            malformed_lines: parsed_passwords.malformed,
        };

        let evaluator = match acl {
            Some(source) => {
                let users = &parsed_passwords.users;
                let parsed = parse_acl(source, config.unknown_acl_user, |name| users.contains_key(name))?;
                stats.acl_rules = parsed.accepted;
                stats.malformed_lines += parsed.malformed;
                info!(rules = parsed.accepted, "Got rules from ACL file");
                AclEvaluator::new(parsed.rules, config.subscribe_policy)
            }
            None => AclEvaluator::disabled(),
        };

        Ok(Self {
            users: parsed_passwords.users,
            acl: evaluator,
            stats,
        })
    }

    /// Check a username/password pair
    pub fn authenticate(&self, verifier: &dyn SecretVerifier, username: &str, password: &str) -> bool {
        authenticate(&self.users, verifier, username, password)
    }

    /// The ACL evaluator for this snapshot
    pub fn acl(&self) -> &AclEvaluator {
        &self.acl
    }

    /// Rule partitions, `None` when ACLs are disabled
    pub fn rules(&self) -> Option<&RuleSet> {
        self.acl.rules()
    }

    pub fn contains_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("users", &self.users.len())
            .field("acl", &self.acl)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Source file contents with undecodable lines blanked out
struct SourceText {
    text: String,
    /// Lines dropped because they were not valid UTF-8
    undecodable: usize,
}

fn read_source(path: &Path, kind: SourceKind) -> Result<SourceText> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_lines(&bytes, kind))
}

/// Decode a source line by line. A line that is not valid UTF-8 is replaced by
/// an empty one so later line numbers stay put; unless it is a comment it
/// counts as malformed.
fn decode_lines(bytes: &[u8], kind: SourceKind) -> SourceText {
    let mut text = String::with_capacity(bytes.len());
    let mut undecodable = 0;

    for (idx, line) in bytes.split(|&b| b == b'\n').enumerate() {
        if idx > 0 {
            text.push('\n');
        }
        match std::str::from_utf8(line) {
            Ok(line) => text.push_str(line),
            Err(_) if is_comment(line) => {}
            Err(e) => {
                warn!(source = %kind, line = idx + 1, error = %e, "Line is not valid UTF-8, skipped");
                undecodable += 1;
            }
        }
    }

    SourceText { text, undecodable }
}

fn is_comment(line: &[u8]) -> bool {
    line.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AccessLevel;
    use crate::config::UnknownUserPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_files() {
        let passwords = temp_file("alice:HASHVALUE\nbob:OTHER\n");
        let acls = temp_file("user alice\ntopic read a/b/#\nbroken\n");
        let config = FilesConfig::new(passwords.path(), Some(acls.path().to_path_buf()));

        let store = Store::load(&config).unwrap();
        assert_eq!(store.user_count(), 2);
        assert!(store.contains_user("alice"));
        assert_eq!(
            store.stats(),
            LoadStats {
                users: 2,
                acl_rules: 1,
                malformed_lines: 1,
            }
        );
        assert!(store.acl().check("alice", "cid1", "a/b/c", AccessLevel::Read));
    }

    #[test]
    fn test_missing_password_path() {
        let err = Store::load(&FilesConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingPasswordPath));
    }

    #[test]
    fn test_unreadable_sources() {
        let err = Store::load(&FilesConfig::new("/nonexistent/passwords", None)).unwrap_err();
        assert!(matches!(err, Error::Io { kind: SourceKind::Passwords, .. }));

        let passwords = temp_file("alice:hash\n");
        let config = FilesConfig::new(passwords.path(), Some("/nonexistent/acls".into()));
        let err = Store::load(&config).unwrap_err();
        assert!(matches!(err, Error::Io { kind: SourceKind::Acl, .. }));
    }

    #[test]
    fn test_no_acl_source_allows_everything() {
        let store = Store::from_sources("alice:hash\n", None, &FilesConfig::default()).unwrap();
        assert!(store.rules().is_none());
        assert!(store.acl().check("nobody", "c", "any/topic", AccessLevel::ReadWrite));
    }

    #[test]
    fn test_strict_unknown_user_fails_load() {
        let config = FilesConfig {
            unknown_acl_user: UnknownUserPolicy::Strict,
            ..Default::default()
        };

        let err = Store::from_sources("alice:hash\n", Some("user bob\ntopic a\n"), &config).unwrap_err();
        assert!(matches!(err, Error::UnknownAclUser { line: 1, .. }));

        let store = Store::from_sources("alice:hash\n", Some("user alice\ntopic a\n"), &config).unwrap();
        assert_eq!(store.stats().acl_rules, 1);
    }

    #[test]
    fn test_non_utf8_lines() {
        let passwords = temp_file("alice:h\n");
        let mut acls = NamedTempFile::new().unwrap();
        acls.write_all(b"# M\xfcller's rules\ntopic read a/#\nuser m\xfcller\ntopic read b/#\n")
            .unwrap();
        let config = FilesConfig::new(passwords.path(), Some(acls.path().to_path_buf()));

        let store = Store::load(&config).unwrap();
        assert_eq!(store.stats().acl_rules, 2);
        assert_eq!(store.stats().malformed_lines, 1);
        assert!(store.acl().check("alice", "c", "a/x", AccessLevel::Read));
        // the rule after the undecodable user line is common
        assert!(store.acl().check("alice", "c", "b/x", AccessLevel::Read));
    }

    #[test]
    fn test_decode_keeps_line_numbers() {
        let decoded = decode_lines(b"a\n\xff\n  # \xff\nb\r\n", SourceKind::Passwords);
        assert_eq!(decoded.text, "a\n\n\nb\r\n");
        assert_eq!(decoded.undecodable, 1);
    }

    #[test]
    fn test_debug_hides_hashes() {
        let store = Store::from_sources("alice:$2b$04$secrethash\n", None, &FilesConfig::default()).unwrap();
        let printed = format!("{:?}", store);
        assert!(printed.contains("users: 1"));
        assert!(!printed.contains("secrethash"));
    }

    #[test]
    fn test_same_sources_same_snapshot() {
        let config = FilesConfig::default();
        let acl = "topic read public/#\nuser alice\ntopic write a/#\npattern %u/#\n";
        let first = Store::from_sources("alice:h\n", Some(acl), &config).unwrap();
        let second = Store::from_sources("alice:h\n", Some(acl), &config).unwrap();

        assert_eq!(first.rules(), second.rules());
        assert_eq!(first.stats(), second.stats());
    }
}
