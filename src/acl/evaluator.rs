//! ACL rule evaluation engine

use crate::config::SubscribePolicy;
use crate::mqtt::TopicMatcher;
use tracing::debug;

use super::rules::{AccessLevel, AclRule, RuleSet, RuleSource};

/// ACL evaluation request
#[derive(Debug, Clone, Copy)]
pub struct AclRequest<'a> {
    /// Authenticated username
    pub username: &'a str,
    /// MQTT client identifier
    pub client_id: &'a str,
    /// Topic being accessed
    pub topic: &'a str,
    /// Access being asked for
    pub access: AccessLevel,
}

/// Result of ACL evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclDecision {
    /// Whether access is allowed
    pub allowed: bool,
    /// Partition and pattern of the granting rule (if any)
    pub rule: Option<(RuleSource, String)>,
    /// Reason for the decision
    pub reason: String,
}

impl AclDecision {
    pub fn allow(source: RuleSource, pattern: &str) -> Self {
        Self {
            allowed: true,
            rule: Some((source, pattern.to_string())),
            reason: format!("Allowed by {} rule: {}", source.as_str(), pattern),
        }
    }

    pub fn acl_disabled() -> Self {
        Self {
            allowed: true,
            rule: None,
            reason: "ACL disabled".to_string(),
        }
    }

    pub fn default_deny() -> Self {
        Self {
            allowed: false,
            rule: None,
            reason: "No matching rule, default deny".to_string(),
        }
    }
}

/// ACL Evaluator - evaluates one rule set against requests
///
/// Holds no mutable state; a new evaluator is built with every store snapshot.
#[derive(Debug, Clone)]
pub struct AclEvaluator {
    /// Rule partitions, or `None` when no ACL source is configured
    rules: Option<RuleSet>,
    /// Subscribe compatibility variant
    subscribe_policy: SubscribePolicy,
    /// Topic matcher for wildcard patterns
    topic_matcher: TopicMatcher,
}

impl AclEvaluator {
    /// Create an evaluator over parsed rules
    pub fn new(rules: RuleSet, subscribe_policy: SubscribePolicy) -> Self {
        Self {
            rules: Some(rules),
            subscribe_policy,
            topic_matcher: TopicMatcher::new(),
        }
    }

    /// Create an evaluator that allows everything
    pub fn disabled() -> Self {
        Self {
            rules: None,
            subscribe_policy: SubscribePolicy::default(),
            topic_matcher: TopicMatcher::new(),
        }
    }

    /// Whether ACLs are checked at all
    pub fn is_enabled(&self) -> bool {
        self.rules.is_some()
    }

    /// The rule partitions, if ACLs are enabled
    pub fn rules(&self) -> Option<&RuleSet> {
        self.rules.as_ref()
    }

    /// Evaluate an ACL request
    ///
    /// User rules are tried first, literally. Then common rules and pattern
    /// rules, both with `%c`/`%u` substituted. The first granting rule wins.
    /// A rule whose placeholder would take a value containing `+` or `#` is
    /// skipped.
    pub fn evaluate(&self, request: &AclRequest<'_>) -> AclDecision {
        // If ACL is disabled, allow everything
        let rules = match self.rules {
            Some(ref rules) => rules,
            None => return AclDecision::acl_disabled(),
        };

        if request.access == AccessLevel::None {
            debug!(topic = %request.topic, "ACL request for no access denied");
            return AclDecision::default_deny();
        }

        let user_rules = rules.rules_for(request.username);
        if user_rules.is_empty() {
            debug!(username = %request.username, "No ACL user rules");
        }

        for rule in user_rules {
            if self.grants(&rule.topic, rule, request) {
                return self.matched(RuleSource::User, &rule.topic, request);
            }
        }

        let shared = rules
            .common_rules
            .iter()
            .map(|rule| (RuleSource::Common, rule))
            .chain(rules.pattern_rules.iter().map(|rule| (RuleSource::Pattern, rule)));

        for (source, rule) in shared {
            let Some(pattern) = rule.substituted(request.client_id, request.username) else {
                debug!(
                    source = source.as_str(),
                    pattern = %rule.topic,
                    username = %request.username,
                    client_id = %request.client_id,
                    "Wildcard in substituted value, ACL rule skipped"
                );
                continue;
            };
            if self.grants(&pattern, rule, request) {
                return self.matched(source, &pattern, request);
            }
        }

        debug!(
            username = %request.username,
            topic = %request.topic,
            access = %request.access,
            "No ACL rule matched, denying"
        );
        AclDecision::default_deny()
    }

    /// Check if `username` on `client_id` may access `topic` at `access`
    pub fn check(&self, username: &str, client_id: &str, topic: &str, access: AccessLevel) -> bool {
        self.evaluate(&AclRequest {
            username,
            client_id,
            topic,
            access,
        })
        .allowed
    }

    fn grants(&self, pattern: &str, rule: &AclRule, request: &AclRequest<'_>) -> bool {
        self.topic_matcher.matches(pattern, request.topic)
            && rule
                .access
                .grants(request.access, self.subscribe_policy, pattern == "#")
    }

    fn matched(&self, source: RuleSource, pattern: &str, request: &AclRequest<'_>) -> AclDecision {
        debug!(
            source = source.as_str(),
            pattern,
            topic = %request.topic,
            access = %request.access,
            "ACL rule matched"
        );
        AclDecision::allow(source, pattern)
    }
}

impl Default for AclEvaluator {
    fn default() -> Self {
        Self::disabled()
    }
}
