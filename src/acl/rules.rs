//! ACL rule types and access compatibility

use crate::config::SubscribePolicy;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Access level granted by a rule or asked for by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    None,
    Read,
    Write,
    ReadWrite,
    Subscribe,
}

impl AccessLevel {
    /// Convert a broker access code (0 none, 1 read, 2 write, 3 readwrite, 4 subscribe)
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::ReadWrite),
            4 => Some(Self::Subscribe),
            _ => None,
        }
    }

    /// Broker access code for this level
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Read => 1,
            Self::Write => 2,
            Self::ReadWrite => 3,
            Self::Subscribe => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "readwrite",
            Self::Subscribe => "subscribe",
        }
    }

    /// Whether a rule of this level grants `requested` on a topic it matched
    ///
    /// `bare_wildcard` is true when the rule's pattern, after substitution,
    /// is exactly `#`.
    pub fn grants(self, requested: AccessLevel, policy: SubscribePolicy, bare_wildcard: bool) -> bool {
        use AccessLevel::*;

        match (requested, self) {
            (None, _) | (_, None) => false,
            (Read, Read | ReadWrite) => true,
            (Write, Write | ReadWrite) => true,
            (ReadWrite, ReadWrite) => true,
            (Subscribe, Subscribe) => true,
            (Subscribe, _) => match policy {
                SubscribePolicy::Permissive => true,
                SubscribePolicy::Strict => !bare_wildcard && matches!(self, Read | ReadWrite),
            },
            _ => false,
        }
    }
}

impl FromStr for AccessLevel {
    type Err = ();

    /// Parse an ACL file access token. `none` is not a valid token.
    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "readwrite" => Ok(Self::ReadWrite),
            "subscribe" => Ok(Self::Subscribe),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single topic rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    /// Topic pattern, possibly containing `%c` / `%u` placeholders
    pub topic: String,
    pub access: AccessLevel,
}

impl AclRule {
    pub fn new(topic: impl Into<String>, access: AccessLevel) -> Self {
        Self {
            topic: topic.into(),
            access,
        }
    }

    /// Whether the pattern carries a `%c` or `%u` placeholder
    pub fn has_placeholders(&self) -> bool {
        self.topic.contains("%c") || self.topic.contains("%u")
    }

    /// Pattern with `%c` replaced by the client id and `%u` by the username
    ///
    /// Substituted text is never rescanned, so a client id containing `%u`
    /// stays literal. Returns `None` when a value that would be inserted
    /// contains `+` or `#`, so client-chosen ids can't widen a rule.
    pub fn substituted(&self, client_id: &str, username: &str) -> Option<String> {
        if !self.has_placeholders() {
            return Some(self.topic.clone());
        }

        let mut out = String::with_capacity(self.topic.len());
        let mut rest = self.topic.as_str();

        while let Some(idx) = rest.find('%') {
            out.push_str(&rest[..idx]);
            let tail = &rest[idx..];
            if let Some(after) = tail.strip_prefix("%c") {
                if has_wildcard(client_id) {
                    return None;
                }
                out.push_str(client_id);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("%u") {
                if has_wildcard(username) {
                    return None;
                }
                out.push_str(username);
                rest = after;
            } else {
                out.push('%');
                rest = &tail[1..];
            }
        }

        out.push_str(rest);
        Some(out)
    }
}

fn has_wildcard(value: &str) -> bool {
    value.contains(['+', '#'])
}

/// Partition a rule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    /// Declared under a `user` line
    User,
    /// Declared with `topic` before any `user` line
    Common,
    /// Declared with `pattern`
    Pattern,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Common => "common",
            Self::Pattern => "pattern",
        }
    }
}

/// The three disjoint rule partitions built from an ACL file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    /// Rules per identity, in file order
    pub user_rules: HashMap<String, Vec<AclRule>>,
    /// Rules applied to everyone after placeholder substitution
    pub pattern_rules: Vec<AclRule>,
    /// `topic` rules before any `user` line, applied to everyone after
    /// placeholder substitution
    pub common_rules: Vec<AclRule>,
}

impl RuleSet {
    /// Rules declared for `username`, empty if none
    pub fn rules_for(&self, username: &str) -> &[AclRule] {
        self.user_rules
            .get(username)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of rules across all partitions
    pub fn len(&self) -> usize {
        self.user_rules.values().map(Vec::len).sum::<usize>()
            + self.pattern_rules.len()
            + self.common_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
