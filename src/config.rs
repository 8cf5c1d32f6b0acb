//! Configuration types for the files backend
//!
//! Provides JSON-serializable configuration for the password and ACL sources,
//! plus conversion from broker plugin key/value options.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Files backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilesConfig {
    /// Password file (`identity:hash` per line). Required.
    pub password_path: Option<PathBuf>,

    /// ACL file. When absent, ACLs are not checked and every request is allowed.
    pub acl_path: Option<PathBuf>,

    /// How `user` lines naming unknown identities are handled
    pub unknown_acl_user: UnknownUserPolicy,

    /// Which rules grant a subscribe request
    pub subscribe_policy: SubscribePolicy,

    /// Password hashing parameters
    pub hash: HashConfig,
}

impl FilesConfig {
    /// Create a configuration from a password file and an optional ACL file
    pub fn new(password_path: impl Into<PathBuf>, acl_path: Option<PathBuf>) -> Self {
        Self {
            password_path: Some(password_path.into()),
            acl_path,
            ..Default::default()
        }
    }

    /// Build a configuration from broker plugin options
    ///
    /// Recognised keys: `password_path`, `acl_path`, `files_unknown_acl_user`,
    /// `files_subscribe_policy` and `files_hash_cost`. Other keys belong to
    /// other backends and are ignored.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self {
            password_path: options.get("password_path").map(PathBuf::from),
            acl_path: options.get("acl_path").map(PathBuf::from),
            ..Default::default()
        };

        if let Some(value) = options.get("files_unknown_acl_user") {
            config.unknown_acl_user = parse_option("files_unknown_acl_user", value)?;
        }
        if let Some(value) = options.get("files_subscribe_policy") {
            config.subscribe_policy = parse_option("files_subscribe_policy", value)?;
        }
        if let Some(value) = options.get("files_hash_cost") {
            config.hash.cost = parse_option("files_hash_cost", value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the required settings are present
    pub fn validate(&self) -> Result<()> {
        match self.password_path {
            Some(ref path) if !path.as_os_str().is_empty() => Ok(()),
            _ => Err(Error::MissingPasswordPath),
        }
    }
}

fn parse_option<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Handling of ACL `user` lines whose identity has no password entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnknownUserPolicy {
    /// Accept the identity as the current user anyway
    #[default]
    Permissive,
    /// Fail the load
    Strict,
}

impl FromStr for UnknownUserPolicy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            _ => Err(()),
        }
    }
}

/// Which rule levels grant a subscribe request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscribePolicy {
    /// Subscribe, read and readwrite rules grant subscribe, except that a
    /// bare `#` rule only grants it when the rule itself is a subscribe rule
    #[default]
    Strict,
    /// Any matching rule grants subscribe
    Permissive,
}

impl FromStr for SubscribePolicy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(()),
        }
    }
}

/// Password hashing parameters handed to the secret verifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct HashConfig {
    /// bcrypt cost for newly generated hashes
    pub cost: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            cost: default_hash_cost(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_hash_cost() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = FilesConfig::default();
        assert!(config.password_path.is_none());
        assert!(config.acl_path.is_none());
        assert_eq!(config.unknown_acl_user, UnknownUserPolicy::Permissive);
        assert_eq!(config.subscribe_policy, SubscribePolicy::Strict);
        assert_eq!(config.hash.cost, 10);
        assert!(matches!(config.validate(), Err(Error::MissingPasswordPath)));
    }

    #[test]
    fn test_deserialize_config() {
        let json = r#"{
            "password-path": "/etc/mosquitto/passwords",
            "acl-path": "/etc/mosquitto/acls",
            "unknown-acl-user": "strict",
            "subscribe-policy": "permissive",
            "hash": {"cost": 12}
        }"#;

        let config: FilesConfig = serde_json::from_str(json).expect("Failed to parse");
        assert_eq!(
            config.password_path,
            Some(PathBuf::from("/etc/mosquitto/passwords"))
        );
        assert_eq!(config.acl_path, Some(PathBuf::from("/etc/mosquitto/acls")));
        assert_eq!(config.unknown_acl_user, UnknownUserPolicy::Strict);
        assert_eq!(config.subscribe_policy, SubscribePolicy::Permissive);
        assert_eq!(config.hash.cost, 12);
    }

    #[test]
    fn test_from_options() {
        let config = FilesConfig::from_options(&options(&[
            ("backends", "files"),
            ("password_path", "/etc/mosquitto/passwords"),
            ("acl_path", "/etc/mosquitto/acls"),
            ("files_unknown_acl_user", "strict"),
            ("files_hash_cost", "8"),
        ]))
        .unwrap();

        assert_eq!(config.acl_path, Some(PathBuf::from("/etc/mosquitto/acls")));
        assert_eq!(config.unknown_acl_user, UnknownUserPolicy::Strict);
        assert_eq!(config.subscribe_policy, SubscribePolicy::Strict);
        assert_eq!(config.hash.cost, 8);
    }

    #[test]
    fn test_from_options_requires_password_path() {
        let err = FilesConfig::from_options(&options(&[("acl_path", "/etc/acls")])).unwrap_err();
        assert!(matches!(err, Error::MissingPasswordPath));
    }

    #[test]
    fn test_from_options_rejects_bad_values() {
        let err = FilesConfig::from_options(&options(&[
            ("password_path", "/etc/passwords"),
            ("files_subscribe_policy", "sometimes"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOption { ref key, .. } if key == "files_subscribe_policy"));
    }
}
