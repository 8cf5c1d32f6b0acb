//! Access Control List (ACL) module
//!
//! Parses ACL files into user, common and pattern rules, and evaluates
//! topic access against them.

mod evaluator;
mod parser;
mod rules;

pub use evaluator::{AclDecision, AclEvaluator, AclRequest};
pub(crate) use parser::is_comment_or_empty;
pub use parser::{parse_acl, ParsedAcl};
pub use rules::{AccessLevel, AclRule, RuleSet, RuleSource};
