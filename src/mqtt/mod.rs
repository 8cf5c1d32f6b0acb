//! MQTT topic handling module
//!
//! Provides the topic matching used by ACL evaluation.

mod topic;

pub use topic::{topics_match, TopicMatcher};
