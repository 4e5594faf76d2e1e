//! Label matchers
//!
//! A matcher is a predicate over a single label name: equality, inequality,
//! or a fully-anchored pattern match against that label's value. Matchers on
//! the reserved [`SHARD_LABEL`](crate::shard::SHARD_LABEL) name carry a shard
//! descriptor instead of a literal value and are evaluated by the engine
//! through shard assignment.

use std::fmt;

use regex::Regex;

use crate::error::Result;
use crate::shard::{ShardSelector, SHARD_LABEL};

/// The kind of comparison a matcher performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// Value equals the matcher's value
    Equal,
    /// Value differs from the matcher's value
    NotEqual,
    /// Value matches the matcher's pattern
    Regex,
    /// Value does not match the matcher's pattern
    NotRegex,
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::Regex => write!(f, "=~"),
            Self::NotRegex => write!(f, "!~"),
        }
    }
}

/// A predicate over one label's value
///
/// Pattern matchers compile their pattern once at construction, anchored at
/// both ends; a malformed pattern is a query compilation error, never a
/// per-stream fault.
#[derive(Debug, Clone)]
pub struct Matcher {
    op: MatchOp,
    name: String,
    value: String,
    pattern: Option<Regex>,
}

impl Matcher {
    /// Create a matcher, compiling the pattern for regex operations
    pub fn new(op: MatchOp, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        let pattern = match op {
            MatchOp::Regex | MatchOp::NotRegex => {
                Some(Regex::new(&format!("^(?:{})$", value))?)
            }
            MatchOp::Equal | MatchOp::NotEqual => None,
        };

        Ok(Self {
            op,
            name,
            value,
            pattern,
        })
    }

    /// Create an equality matcher
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: MatchOp::Equal,
            name: name.into(),
            value: value.into(),
            pattern: None,
        }
    }

    /// Create an inequality matcher
    pub fn not_equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: MatchOp::NotEqual,
            name: name.into(),
            value: value.into(),
            pattern: None,
        }
    }

    /// Create a pattern matcher
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Self::new(MatchOp::Regex, name, pattern)
    }

    /// Create a negated pattern matcher
    pub fn not_regex(name: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Self::new(MatchOp::NotRegex, name, pattern)
    }

    /// Create a shard-target matcher from a descriptor
    pub fn shard(selector: ShardSelector) -> Self {
        Self::equal(SHARD_LABEL, selector.to_string())
    }

    /// The label name this matcher applies to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal value or pattern text
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The comparison kind
    pub fn op(&self) -> MatchOp {
        self.op
    }

    /// Check if this matcher targets the reserved shard label
    pub fn is_shard_matcher(&self) -> bool {
        self.name == SHARD_LABEL
    }

    /// Evaluate the matcher against a label value
    pub fn matches(&self, value: &str) -> bool {
        match self.op {
            MatchOp::Equal => value == self.value,
            MatchOp::NotEqual => value != self.value,
            // The pattern is always present for regex ops by construction.
            MatchOp::Regex => self.pattern.as_ref().is_some_and(|re| re.is_match(value)),
            MatchOp::NotRegex => !self.pattern.as_ref().is_some_and(|re| re.is_match(value)),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.op, self.value)
    }
}
