//! Configuration for the query simulator
//!
//! This module provides configuration options for the sharded querier.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Window bound semantics applied when time-bounding a result sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WindowMode {
    /// Start included, end excluded: `[start, end)`
    ClosedOpen,
    /// Start excluded, end included: `(start, end]`
    OpenClosed,
    /// Both bounds included: `[start, end]`
    Closed,
}

impl Default for WindowMode {
    fn default() -> Self {
        Self::ClosedOpen
    }
}

impl std::fmt::Display for WindowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClosedOpen => write!(f, "closed_open"),
            Self::OpenClosed => write!(f, "open_closed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl WindowMode {
    /// Parse a window mode from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "closed_open" => Ok(Self::ClosedOpen),
            "open_closed" => Ok(Self::OpenClosed),
            "closed" => Ok(Self::Closed),
            _ => Err(Error::invalid_configuration(format!(
                "Unknown window mode: {}",
                s
            ))),
        }
    }

    /// Get the name of the window mode
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClosedOpen => "closed_open",
            Self::OpenClosed => "open_closed",
            Self::Closed => "closed",
        }
    }
}

/// Configuration options for a sharded querier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct QuerierConfig {
    /// Declared shard count; every stream maps into `[0, shard_count)`
    pub shard_count: u32,
    /// Window bound semantics for result time-bounding
    pub window_mode: WindowMode,
    /// Enable metrics collection
    pub collect_metrics: bool,
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            shard_count: 1,
            window_mode: WindowMode::default(),
            collect_metrics: true,
        }
    }
}

impl QuerierConfig {
    /// Create a configuration with the given shard count
    pub fn new(shard_count: u32) -> Self {
        Self {
            shard_count,
            ..Self::default()
        }
    }

    /// Set the window mode
    pub fn with_window_mode(mut self, mode: WindowMode) -> Self {
        self.window_mode = mode;
        self
    }

    /// Disable metrics collection
    pub fn without_metrics(mut self) -> Self {
        self.collect_metrics = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(Error::invalid_configuration(
                "shard count must be positive",
            ));
        }
        Ok(())
    }
}
