//! File-backed MQTT authentication and ACL engine for Sentinel
//!
//! Decides whether an MQTT client may log in, and whether it may read, write
//! or subscribe to a topic, from two flat files:
//!
//! - **Password file**: `username:bcrypt-hash` per line
//! - **ACL file**: `user`, `topic` and `pattern` lines, in the mosquitto style
//!
//! # Architecture
//!
//! Both files are parsed into an immutable [`Store`] snapshot. The
//! [`FilesBackend`] serves every check from the current snapshot and replaces
//! it wholesale on reload, so a check sees either the old files or the new
//! ones, never a mix. A failed reload keeps the previous snapshot.
//!
//! ACL rules are tried in a fixed order: the requesting user's own rules, then
//! rules declared before any `user` line, then `pattern` rules. The last two
//! have `%c` (client id) and `%u` (username) substituted, and are skipped when
//! the inserted value contains `+` or `#`. The first granting rule wins;
//! without an ACL file everything is allowed.
//!
//! # Example ACL file
//!
//! ```text
//! topic read public/#
//!
//! user alice
//! topic readwrite alice/#
//!
//! pattern write devices/%u/%c/status
//! ```

pub mod acl;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod mqtt;
pub mod store;

// Re-export main types
pub use acl::AccessLevel;
pub use backend::{AuthBackend, FilesBackend};
pub use config::FilesConfig;
pub use error::{Error, Result};
pub use store::Store;
