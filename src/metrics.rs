use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Performance metrics collector for the query simulator
#[derive(Debug)]
pub struct MetricsCollector {
    // Operation counts
    /// Number of select operations
    select_count: AtomicUsize,
    /// Number of select operations that failed
    select_error_count: AtomicUsize,

    // Stream metrics
    /// Streams examined during filtering
    streams_considered: AtomicUsize,
    /// Streams surviving label matching
    streams_matched: AtomicUsize,
    /// Matched streams dropped because content filtering left them empty
    streams_dropped: AtomicUsize,

    // Timing metrics
    /// Total select duration in nanoseconds
    select_duration_ns: AtomicU64,
    /// Last select duration
    last_select_duration: Mutex<Duration>,

    // Internal state
    /// Start time of the metrics collector
    start_time: Instant,
}

/// Point-in-time view of collected metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of select operations
    pub select_count: usize,
    /// Number of select operations that failed
    pub select_error_count: usize,
    /// Streams examined during filtering
    pub streams_considered: usize,
    /// Streams surviving label matching
    pub streams_matched: usize,
    /// Matched streams dropped by content filtering
    pub streams_dropped: usize,
    /// Total select duration
    pub select_duration: Duration,
    /// Last select duration
    pub last_select_duration: Duration,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            select_count: AtomicUsize::new(0),
            select_error_count: AtomicUsize::new(0),
            streams_considered: AtomicUsize::new(0),
            streams_matched: AtomicUsize::new(0),
            streams_dropped: AtomicUsize::new(0),
            select_duration_ns: AtomicU64::new(0),
            last_select_duration: Mutex::new(Duration::from_secs(0)),
            start_time: Instant::now(),
        }
    }

    /// Increment select count
    pub fn increment_selects(&self) {
        self.select_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed select count
    pub fn increment_select_errors(&self) {
        self.select_error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Add streams examined by a select operation
    pub fn add_streams_considered(&self, count: usize) {
        self.streams_considered.fetch_add(count, Ordering::Relaxed);
    }

    /// Add streams surviving label matching
    pub fn add_streams_matched(&self, count: usize) {
        self.streams_matched.fetch_add(count, Ordering::Relaxed);
    }

    /// Add streams dropped by content filtering
    pub fn add_streams_dropped(&self, count: usize) {
        self.streams_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a select operation duration
    pub fn record_select_duration(&self, duration: Duration) {
        self.select_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        *self.last_select_duration.lock() = duration;
    }

    /// Time elapsed since the collector was created
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a point-in-time snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            select_count: self.select_count.load(Ordering::Relaxed),
            select_error_count: self.select_error_count.load(Ordering::Relaxed),
            streams_considered: self.streams_considered.load(Ordering::Relaxed),
            streams_matched: self.streams_matched.load(Ordering::Relaxed),
            streams_dropped: self.streams_dropped.load(Ordering::Relaxed),
            select_duration: Duration::from_nanos(
                self.select_duration_ns.load(Ordering::Relaxed),
            ),
            last_select_duration: *self.last_select_duration.lock(),
        }
    }
}
