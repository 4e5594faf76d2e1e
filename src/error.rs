//! Error handling for shardsim
//!
//! This module provides error types and result aliases for simulator operations.

use thiserror::Error;

use crate::labels::LabelParseError;

/// Errors that can occur in simulator operations
#[derive(Error, Debug)]
pub enum Error {
    /// Structurally invalid setup, detected before any work begins
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The request's matchers or content predicate could not be derived
    #[error("Query compilation failed: {0}")]
    QueryCompilation(String),

    /// A stream's stored label string does not parse back into a label set.
    /// Indicates a bug in fixture production, not a query-time condition.
    #[error("Corrupt fixture: stream {stream_index} labels {labels:?}: {source}")]
    CorruptFixture {
        stream_index: usize,
        labels: String,
        #[source]
        source: LabelParseError,
    },
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new invalid configuration error
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a new query compilation error
    pub fn query_compilation(message: impl Into<String>) -> Self {
        Self::QueryCompilation(message.into())
    }

    /// Create a new corrupt fixture error
    pub fn corrupt_fixture(
        stream_index: usize,
        labels: impl Into<String>,
        source: LabelParseError,
    ) -> Self {
        Self::CorruptFixture {
            stream_index,
            labels: labels.into(),
            source,
        }
    }

    /// Check if this is a configuration error
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }

    /// Check if this is a query compilation error
    pub fn is_query_compilation(&self) -> bool {
        matches!(self, Self::QueryCompilation(_))
    }

    /// Check if this is a corrupt fixture error
    pub fn is_corrupt_fixture(&self) -> bool {
        matches!(self, Self::CorruptFixture { .. })
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::QueryCompilation(format!("invalid pattern: {}", err))
    }
}
