//! Files backend
//!
//! Serves authentication and ACL checks from the current [`Store`] snapshot
//! and swaps in a freshly built snapshot on reload.

use crate::acl::{AccessLevel, AclDecision, AclRequest};
use crate::auth::{BcryptVerifier, SecretVerifier};
use crate::config::FilesConfig;
use crate::error::Result;
use crate::store::Store;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authentication/authorization backend as called by the broker plugin layer
pub trait AuthBackend: Send + Sync {
    /// Check a username/password pair
    fn authenticate(&self, username: &str, password: &str) -> bool;

    /// Check whether `username` on `client_id` may access `topic`
    fn authorize(&self, username: &str, client_id: &str, topic: &str, access: AccessLevel) -> bool;

    /// Whether `username` bypasses ACL checks
    fn is_superuser(&self, username: &str) -> bool;

    /// Rebuild state from the configured sources
    fn reload(&self) -> Result<()>;

    /// Release resources
    fn close(&self);

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Backend reading users and ACLs from a password file and an ACL file
pub struct FilesBackend {
    /// Configuration the snapshots are built from
    config: FilesConfig,
    /// Current snapshot
    store: RwLock<Arc<Store>>,
    /// Password verifier
    verifier: Arc<dyn SecretVerifier>,
}

impl FilesBackend {
    /// Create the backend with the bcrypt verifier, loading both files
    pub fn new(config: FilesConfig) -> Result<Self> {
        let verifier = Arc::new(BcryptVerifier::new(config.hash));
        Self::with_verifier(config, verifier)
    }

    /// Create the backend with a custom password verifier
    pub fn with_verifier(config: FilesConfig, verifier: Arc<dyn SecretVerifier>) -> Result<Self> {
        let store = Store::load(&config)?;
        log_loaded(&store);

        Ok(Self {
            config,
            store: RwLock::new(Arc::new(store)),
            verifier,
        })
    }

    /// The snapshot requests are currently served from
    pub fn snapshot(&self) -> Arc<Store> {
        self.store.read().clone()
    }

    /// Evaluate an ACL request with the full decision
    pub fn evaluate(&self, request: &AclRequest<'_>) -> AclDecision {
        self.snapshot().acl().evaluate(request)
    }

    pub fn config(&self) -> &FilesConfig {
        &self.config
    }
}

impl AuthBackend for FilesBackend {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        self.snapshot()
            .authenticate(self.verifier.as_ref(), username, password)
    }

    fn authorize(&self, username: &str, client_id: &str, topic: &str, access: AccessLevel) -> bool {
        self.evaluate(&AclRequest {
            username,
            client_id,
            topic,
            access,
        })
        .allowed
    }

    fn is_superuser(&self, _username: &str) -> bool {
        false
    }

    fn reload(&self) -> Result<()> {
        info!("Reloading password and ACL files");
        match Store::load(&self.config) {
            Ok(store) => {
                log_loaded(&store);
                *self.store.write() = Arc::new(store);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Reload failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Files are read in full at load time, so there is nothing to release
    fn close(&self) {
        debug!("Files backend closed");
    }

    fn name(&self) -> &str {
        "files"
    }
}

fn log_loaded(store: &Store) {
    let stats = store.stats();
    info!(
        users = stats.users,
        acl_rules = stats.acl_rules,
        malformed_lines = stats.malformed_lines,
        acl_enabled = store.acl().is_enabled(),
        "Loaded password and ACL files"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Plaintext verifier so tests need no hashing
    struct PlainVerifier;

    impl SecretVerifier for PlainVerifier {
        fn verify(&self, plain: &str, hash: &str) -> bool {
            plain == hash
        }

        fn name(&self) -> &str {
            "plain"
        }
    }

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn rewrite(file: &NamedTempFile, contents: &str) {
        std::fs::write(file.path(), contents).unwrap();
    }

    fn backend(passwords: &NamedTempFile, acls: Option<&NamedTempFile>) -> FilesBackend {
        let config = FilesConfig::new(passwords.path(), acls.map(|f| f.path().to_path_buf()));
        FilesBackend::with_verifier(config, Arc::new(PlainVerifier)).unwrap()
    }

    #[test]
    fn test_authenticate() {
        let passwords = temp_file("alice:secret\n");
        let backend = backend(&passwords, None);

        assert!(backend.authenticate("alice", "secret"));
        assert!(!backend.authenticate("alice", "guess"));
        assert!(!backend.authenticate("bob", "secret"));
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let passwords = temp_file("alice:secret\n");
        let acls = temp_file("user alice\ntopic read a/#\n");
        let backend = backend(&passwords, Some(&acls));

        let before = backend.snapshot();
        assert!(backend.authorize("alice", "c", "a/b", AccessLevel::Read));
        assert!(!backend.authorize("alice", "c", "b/c", AccessLevel::Read));

        rewrite(&passwords, "alice:changed\n");
        rewrite(&acls, "user alice\ntopic read b/#\n");
        backend.reload().unwrap();

        assert!(backend.authenticate("alice", "changed"));
        assert!(!backend.authorize("alice", "c", "a/b", AccessLevel::Read));
        assert!(backend.authorize("alice", "c", "b/c", AccessLevel::Read));

        // a snapshot taken earlier is untouched
        assert!(before.acl().check("alice", "c", "a/b", AccessLevel::Read));
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let passwords = temp_file("alice:secret\n");
        let acls = temp_file("user alice\ntopic read a/#\n");
        let config = FilesConfig {
            unknown_acl_user: crate::config::UnknownUserPolicy::Strict,
            ..FilesConfig::new(passwords.path(), Some(acls.path().to_path_buf()))
        };
        let backend = FilesBackend::with_verifier(config, Arc::new(PlainVerifier)).unwrap();

        rewrite(&acls, "user mallory\ntopic #\n");
        let err = backend.reload().unwrap_err();
        assert!(matches!(err, Error::UnknownAclUser { .. }));

        assert!(backend.authorize("alice", "c", "a/b", AccessLevel::Read));
        assert!(!backend.authorize("mallory", "c", "a/b", AccessLevel::Read));
    }

    #[test]
    fn test_reload_with_missing_file_keeps_snapshot() {
        let passwords = temp_file("alice:secret\n");
        let path = passwords.path().to_path_buf();
        let backend = backend(&passwords, None);

        drop(passwords);
        assert!(!path.exists());
        assert!(matches!(backend.reload(), Err(Error::Io { .. })));
        assert!(backend.authenticate("alice", "secret"));
    }

    #[test]
    fn test_backend_identity() {
        let passwords = temp_file("alice:secret\n");
        let backend = backend(&passwords, None);

        assert_eq!(backend.name(), "files");
        assert!(!backend.is_superuser("alice"));
    }

    #[test]
    fn test_close_holds_no_state() {
        let passwords = temp_file("alice:secret\n");
        let backend = backend(&passwords, None);

        backend.close();
        backend.close();
        assert!(backend.authenticate("alice", "secret"));
        backend.reload().unwrap();
    }
}
