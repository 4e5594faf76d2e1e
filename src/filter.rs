//! Content predicates over log lines
//!
//! A line filter either passes every line through untouched or applies a
//! predicate to each line. The pass-through case is an explicit variant so
//! the engine can skip per-entry work entirely; callers never compare
//! predicate identities.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::Result;

/// Shared predicate over a raw text line
pub type LinePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A content predicate applied to individual entries
#[derive(Clone)]
pub enum LineFilter {
    /// Keep every line; the engine skips filtering work for this variant
    PassThrough,
    /// Keep lines satisfying the predicate
    Matching(LinePredicate),
}

impl LineFilter {
    /// Keep lines containing the given substring
    pub fn contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::Matching(Arc::new(move |line| line.contains(&needle)))
    }

    /// Keep lines not containing the given substring
    pub fn not_contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self::Matching(Arc::new(move |line| !line.contains(&needle)))
    }

    /// Keep lines matching the given pattern
    ///
    /// The pattern is compiled once here; a malformed pattern is a query
    /// compilation error, never a per-entry fault.
    pub fn regex(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)?;
        Ok(Self::Matching(Arc::new(move |line| re.is_match(line))))
    }

    /// Keep lines not matching the given pattern
    pub fn not_regex(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)?;
        Ok(Self::Matching(Arc::new(move |line| !re.is_match(line))))
    }

    /// Keep lines satisfying an arbitrary predicate
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Matching(Arc::new(f))
    }

    /// Check if this is the pass-through variant
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }

    /// Evaluate the filter against a line
    pub fn applies_to(&self, line: &str) -> bool {
        match self {
            Self::PassThrough => true,
            Self::Matching(pred) => pred(line),
        }
    }
}

impl fmt::Debug for LineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => f.write_str("LineFilter::PassThrough"),
            Self::Matching(_) => f.write_str("LineFilter::Matching(..)"),
        }
    }
}
