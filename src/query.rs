//! Query requests and the compiler boundary
//!
//! A selection request bundles a selector (the external query-compiler
//! boundary), a time window, and a read direction. Deriving matchers or the
//! line filter from the selector may fail; the engine surfaces that as a
//! query compilation error before scanning any stream.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WindowMode;
use crate::error::Result;
use crate::filter::LineFilter;
use crate::matcher::Matcher;

/// Read direction for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending timestamp order (oldest first)
    Forward,
    /// Descending timestamp order (newest first)
    Backward,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Forward
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Where a timestamp falls relative to a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Earlier than the window's lower bound
    Before,
    /// Within the window
    Inside,
    /// Later than the window's upper bound
    After,
}

/// Time window for querying entries
///
/// Bound semantics depend on the querier's [`WindowMode`]; the default is
/// closed-open, including `start` and excluding `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower bound
    pub start: DateTime<Utc>,
    /// Upper bound
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The widest representable range
    pub fn all() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Check whether the window can contain any timestamp at all
    pub fn is_empty(&self, mode: WindowMode) -> bool {
        match mode {
            WindowMode::ClosedOpen | WindowMode::OpenClosed => self.start >= self.end,
            WindowMode::Closed => self.start > self.end,
        }
    }

    /// Classify a timestamp against the window bounds
    pub fn position(&self, timestamp: DateTime<Utc>, mode: WindowMode) -> WindowPosition {
        let (below, above) = match mode {
            WindowMode::ClosedOpen => (timestamp < self.start, timestamp >= self.end),
            WindowMode::OpenClosed => (timestamp <= self.start, timestamp > self.end),
            WindowMode::Closed => (timestamp < self.start, timestamp > self.end),
        };

        if below {
            WindowPosition::Before
        } else if above {
            WindowPosition::After
        } else {
            WindowPosition::Inside
        }
    }

    /// Check whether a timestamp lies within the window
    pub fn contains(&self, timestamp: DateTime<Utc>, mode: WindowMode) -> bool {
        self.position(timestamp, mode) == WindowPosition::Inside
    }
}

/// The consumed query-compiler interface
///
/// Implementations turn a logical query into matchers and a content
/// predicate. Either derivation may fail with a query compilation error,
/// which the engine propagates unchanged.
pub trait LogSelector: fmt::Debug + Send + Sync {
    /// Derive the ordered list of label matchers
    fn matchers(&self) -> Result<Vec<Matcher>>;

    /// Derive the content predicate
    fn line_filter(&self) -> Result<LineFilter>;
}

/// A selector holding prebuilt matchers and a filter
///
/// The in-crate implementation of [`LogSelector`], used by fixtures and
/// tests in place of a real query-language parser.
#[derive(Debug, Clone)]
pub struct StaticSelector {
    matchers: Vec<Matcher>,
    filter: LineFilter,
}

impl StaticSelector {
    /// Create a selector from matchers and a filter
    pub fn new(matchers: Vec<Matcher>, filter: LineFilter) -> Self {
        Self { matchers, filter }
    }

    /// A selector matching every stream and keeping every line
    pub fn match_all() -> Self {
        Self::new(Vec::new(), LineFilter::PassThrough)
    }
}

impl LogSelector for StaticSelector {
    fn matchers(&self) -> Result<Vec<Matcher>> {
        Ok(self.matchers.clone())
    }

    fn line_filter(&self) -> Result<LineFilter> {
        Ok(self.filter.clone())
    }
}

/// A logical query: selector, time window, and direction
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    /// The query-compiler boundary producing matchers and the line filter
    pub selector: Arc<dyn LogSelector>,
    /// Time window constraining result timestamps
    pub range: TimeRange,
    /// Result ordering
    pub direction: Direction,
}

impl SelectionRequest {
    /// Create a new request
    pub fn new(
        selector: impl LogSelector + 'static,
        range: TimeRange,
        direction: Direction,
    ) -> Self {
        Self {
            selector: Arc::new(selector),
            range,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;

    fn ts(nanos: i64) -> DateTime<Utc> {
        Utc.timestamp_nanos(nanos)
    }

    #[test]
    fn test_closed_open_bounds() {
        let range = TimeRange::new(ts(10), ts(20));
        let mode = WindowMode::ClosedOpen;

        assert!(range.contains(ts(10), mode));
        assert!(range.contains(ts(19), mode));
        assert!(!range.contains(ts(20), mode));
        assert!(!range.contains(ts(9), mode));
    }

    #[test]
    fn test_open_closed_bounds() {
        let range = TimeRange::new(ts(10), ts(20));
        let mode = WindowMode::OpenClosed;

        assert!(!range.contains(ts(10), mode));
        assert!(range.contains(ts(11), mode));
        assert!(range.contains(ts(20), mode));
        assert!(!range.contains(ts(21), mode));
    }

    #[test]
    fn test_closed_bounds() {
        let range = TimeRange::new(ts(10), ts(20));
        let mode = WindowMode::Closed;

        assert!(range.contains(ts(10), mode));
        assert!(range.contains(ts(20), mode));
        assert!(!range.contains(ts(9), mode));
        assert!(!range.contains(ts(21), mode));
    }

    #[test]
    fn test_empty_and_inverted_windows() {
        let empty = TimeRange::new(ts(10), ts(10));
        assert!(empty.is_empty(WindowMode::ClosedOpen));
        assert!(!empty.is_empty(WindowMode::Closed));

        let inverted = TimeRange::new(ts(20), ts(10));
        assert!(inverted.is_empty(WindowMode::ClosedOpen));
        assert!(inverted.is_empty(WindowMode::Closed));
    }

    #[test]
    fn test_position_classification() {
        let range = TimeRange::new(ts(10), ts(20));
        let mode = WindowMode::ClosedOpen;

        assert_eq!(range.position(ts(5), mode), WindowPosition::Before);
        assert_eq!(range.position(ts(15), mode), WindowPosition::Inside);
        assert_eq!(range.position(ts(25), mode), WindowPosition::After);
    }

    #[test]
    fn test_static_selector_derivation() {
        let selector = StaticSelector::new(
            vec![Matcher::equal("region", "0")],
            LineFilter::contains("error"),
        );

        let matchers = selector.matchers().unwrap();
        assert_eq!(matchers.len(), 1);
        assert_eq!(matchers[0].name(), "region");
        assert!(!selector.line_filter().unwrap().is_pass_through());
    }

    #[test]
    fn test_failing_selector_propagates() {
        #[derive(Debug)]
        struct Broken;

        impl LogSelector for Broken {
            fn matchers(&self) -> Result<Vec<Matcher>> {
                Err(Error::query_compilation("parse error at 1:1"))
            }

            fn line_filter(&self) -> Result<LineFilter> {
                Ok(LineFilter::PassThrough)
            }
        }

        let request = SelectionRequest::new(Broken, TimeRange::all(), Direction::Forward);
        let err = request.selector.matchers().unwrap_err();
        assert!(err.is_query_compilation());
    }
}
