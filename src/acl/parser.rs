//! ACL file parsing
//!
//! The format is line oriented and stateful:
//!
//! ```text
//! # rules before any user line apply to everyone
//! topic read public/#
//!
//! user alice
//! topic write alice/inbox
//! # no level means readwrite
//! topic sensors/#
//!
//! # pattern rules apply to everyone, whatever user line precedes them
//! pattern write devices/%u/%c/status
//! ```

use super::rules::{AccessLevel, AclRule, RuleSet};
use crate::config::UnknownUserPolicy;
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of parsing an ACL source
#[derive(Debug, Clone, Default)]
pub struct ParsedAcl {
    pub rules: RuleSet,
    /// Number of `topic`/`pattern` lines turned into rules
    pub accepted: usize,
    /// Number of lines skipped as malformed
    pub malformed: usize,
}

/// Fold state threaded through the lines of one ACL source
#[derive(Default)]
struct ParseState<'a> {
    current_user: Option<&'a str>,
    parsed: ParsedAcl,
}

/// Whether a line carries nothing: blank, or a `#` comment
pub(crate) fn is_comment_or_empty(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Split `line` into at most `max` whitespace-separated fields. The last field
/// keeps any inner whitespace, so topics containing spaces survive.
fn fields(line: &str, max: usize) -> Vec<&str> {
    let mut out = Vec::with_capacity(max);
    let mut rest = line.trim();

    while !rest.is_empty() {
        if out.len() + 1 == max {
            out.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(idx) => {
                out.push(&rest[..idx]);
                rest = rest[idx..].trim_start();
            }
            None => {
                out.push(rest);
                break;
            }
        }
    }

    out
}

/// Parse the `<pattern>` / `<level> <pattern>` tail shared by topic and pattern lines
fn parse_rule(fields: &[&str]) -> Option<AclRule> {
    match fields {
        [_, topic] => Some(AclRule::new(*topic, AccessLevel::ReadWrite)),
        [_, level, topic] => level.parse().ok().map(|access| AclRule::new(*topic, access)),
        _ => None,
    }
}

/// Parse an ACL source into rule partitions
///
/// `known_user` is consulted for `user` lines when `policy` is strict; in
/// permissive mode any identity is accepted as the current user.
pub fn parse_acl<F>(source: &str, policy: UnknownUserPolicy, known_user: F) -> Result<ParsedAcl>
where
    F: Fn(&str) -> bool,
{
    let state = source
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(_, line)| !is_comment_or_empty(line))
        .try_fold(ParseState::default(), |state, (line_no, line)| {
            apply_line(state, line_no, line, policy, &known_user)
        })?;

    Ok(state.parsed)
}

fn apply_line<'a, F>(
    mut state: ParseState<'a>,
    line_no: usize,
    line: &'a str,
    policy: UnknownUserPolicy,
    known_user: &F,
) -> Result<ParseState<'a>>
where
    F: Fn(&str) -> bool,
{
    let keyword = fields(line, 2).first().copied().unwrap_or_default();

    match keyword {
        "user" => {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                ["user", name] => {
                    let name = *name;
                    if policy == UnknownUserPolicy::Strict && !known_user(name) {
                        return Err(Error::UnknownAclUser {
                            line: line_no,
                            user: name.to_string(),
                        });
                    }
                    state.current_user = Some(name);
                }
                _ => malformed(&mut state, line_no, "user line needs exactly one name"),
            }
        }
        "topic" => match parse_rule(&fields(line, 3)) {
            Some(rule) => {
                match state.current_user {
                    Some(user) => {
                        debug!(topic = %rule.topic, access = %rule.access, user, "ACL user rule added");
                        push_user_rule(&mut state.parsed.rules.user_rules, user, rule);
                    }
                    None => {
                        debug!(topic = %rule.topic, access = %rule.access, "ACL common rule added");
                        state.parsed.rules.common_rules.push(rule);
                    }
                }
                state.parsed.accepted += 1;
            }
            None => malformed(&mut state, line_no, "expected topic [read|write|readwrite|subscribe] <topic>"),
        },
        "pattern" => match parse_rule(&fields(line, 3)) {
            Some(rule) => {
                debug!(topic = %rule.topic, access = %rule.access, "ACL pattern rule added");
                state.parsed.rules.pattern_rules.push(rule);
                state.parsed.accepted += 1;
            }
            None => malformed(&mut state, line_no, "expected pattern [read|write|readwrite|subscribe] <topic>"),
        },
        _ => malformed(&mut state, line_no, "unknown directive"),
    }

    Ok(state)
}

fn push_user_rule(user_rules: &mut HashMap<String, Vec<AclRule>>, user: &str, rule: AclRule) {
    match user_rules.get_mut(user) {
        Some(rules) => rules.push(rule),
        None => {
            user_rules.insert(user.to_string(), vec![rule]);
        }
    }
}

fn malformed(state: &mut ParseState<'_>, line_no: usize, reason: &str) {
    warn!(line = line_no, reason, "Wrong ACL format, line skipped");
    state.parsed.malformed += 1;
}
