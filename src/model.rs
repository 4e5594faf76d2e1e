//! Core data types for the simulator
//!
//! This module defines the stream and entry structures the query engine
//! operates on. Both are immutable once constructed; filtering produces new
//! derived collections rather than editing in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::labels::LabelSet;

/// A single timestamped log line
///
/// Timestamps carry nanosecond precision and are not required to be unique
/// across entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// When the line was produced
    pub timestamp: DateTime<Utc>,
    /// The raw text line
    pub line: String,
}

impl Entry {
    /// Create a new entry
    pub fn new(timestamp: DateTime<Utc>, line: impl Into<String>) -> Self {
        Self {
            timestamp,
            line: line.into(),
        }
    }
}

/// A log stream: a label set plus its ordered entries
///
/// A stream's identity is its rendered label string. Keeping entries ordered
/// by timestamp is the producer's responsibility; the engine's merge assumes
/// ascending order within each stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Rendered label string, e.g. `{index="0", region="1"}`
    pub labels: String,
    /// Entries in producer order
    pub entries: Vec<Entry>,
}

impl Stream {
    /// Create a stream from a label set and entries
    pub fn new(labels: &LabelSet, entries: Vec<Entry>) -> Self {
        Self {
            labels: labels.render(),
            entries,
        }
    }

    /// Create a stream from an already-rendered label string
    pub fn from_rendered(labels: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            labels: labels.into(),
            entries,
        }
    }

    /// Number of entries in the stream
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the stream has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
