//! Error types for the files backend.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for the files backend.
pub type Result<T> = std::result::Result<T, Error>;

/// Which source file an I/O error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Passwords,
    Acl,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passwords => f.write_str("passwords"),
            Self::Acl => f.write_str("acl"),
        }
    }
}

/// Error type for loading and configuring the files backend.
///
/// Malformed lines in either source are not errors: they are logged and
/// skipped while the load carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No password file configured.
    #[error("no password path given")]
    MissingPasswordPath,

    /// A source file could not be read.
    #[error("couldn't open {kind} file {path}: {source}", path = .path.display())]
    Io {
        kind: SourceKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `user` line naming an identity with no password entry (strict mode only).
    #[error("acl line {line}: user {user:?} is not in the password file")]
    UnknownAclUser { line: usize, user: String },

    /// Option value that could not be understood.
    #[error("invalid value {value:?} for option {key}")]
    InvalidOption { key: String, value: String },

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}
