//! MQTT topic matching with wildcards
//!
//! Matches ACL topic patterns against requested topics. Supports single-level
//! (+) and multi-level (#) wildcards.

/// Topic matcher for ACL topic patterns
#[derive(Debug, Clone, Copy)]
pub struct TopicMatcher;

impl TopicMatcher {
    /// Create a new topic matcher
    pub fn new() -> Self {
        Self
    }

    /// Check if a topic matches an ACL pattern
    ///
    /// # Arguments
    /// * `pattern` - The pattern from an ACL rule (may contain + and # wildcards)
    /// * `topic` - The topic the client asked for
    ///
    /// # Wildcard Rules
    /// * `+` matches exactly one topic level
    /// * `#` matches zero or more remaining levels, wherever it appears
    /// * Identical strings always match, wildcards or not
    ///
    /// # Examples
    /// ```
    /// use sentinel_agent_mqtt_acl::mqtt::TopicMatcher;
    ///
    /// let matcher = TopicMatcher::new();
    /// assert!(matcher.matches("sensors/+/living-room", "sensors/temp/living-room"));
    /// assert!(matcher.matches("sensors/#", "sensors/temp/living-room"));
    /// assert!(!matcher.matches("sensors/+/living-room", "sensors/temp/bedroom"));
    /// ```
    pub fn matches(&self, pattern: &str, topic: &str) -> bool {
        pattern == topic || self.match_levels(pattern.split('/'), topic.split('/'))
    }

    fn match_levels<'a>(
        &self,
        mut pattern: impl Iterator<Item = &'a str>,
        mut topic: impl Iterator<Item = &'a str>,
    ) -> bool {
        loop {
            match (pattern.next(), topic.next()) {
                (None, None) => return true,
                // # absorbs everything left, including nothing at all
                (Some("#"), _) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(p), Some(t)) => {
                    if p != "+" && p != t {
                        return false;
                    }
                }
            }
        }
    }
}

impl Default for TopicMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for [`TopicMatcher::matches`]
pub fn topics_match(pattern: &str, topic: &str) -> bool {
    TopicMatcher.matches(pattern, topic)
}
