//! Deterministic shard-aware query-execution simulator for log streams.
//!
//! This crate validates shard-partitioning and filtering semantics of a log
//! query engine against a fixed, in-memory stream collection, with no
//! network, no cluster, and no persistence. Every stream is assigned to exactly one shard
//! by a stable hash of its label set; a select operation evaluates label
//! matchers (including a synthetic shard-target predicate), applies a
//! content predicate per entry, and yields a time-bounded, direction-ordered
//! lazy sequence merged across the surviving streams.
//!
//! ## Key invariants
//! - Shard assignment is a pure function of (label set, shard count):
//!   identical inputs yield identical output across processes and runs.
//! - Streams and entries are never mutated; filtering builds derived
//!   collections.
//! - Errors are returned as structured values; a corrupt fixture aborts the
//!   operation with context, never the process.
//! - Cancellation is cooperative and not an error; sequences stop cleanly
//!   between entries.
//!
//! ## Flow
//! `generate -> streams -> ShardedQuerier::select -> EntryIter`
//!
//! ## Example
//!
//! ```
//! use shardsim::{
//!     generate, CancelToken, Direction, LineFilter, Matcher, SelectionRequest,
//!     ShardSelector, ShardedQuerier, StaticSelector, TimeRange,
//! };
//!
//! # fn main() -> shardsim::Result<()> {
//! let streams = generate(2, 3, 2, &["region"])?;
//! let querier = ShardedQuerier::new(2, streams)?;
//!
//! let selector = StaticSelector::new(
//!     vec![Matcher::shard(ShardSelector::new(0, 2)?)],
//!     LineFilter::PassThrough,
//! );
//! let request = SelectionRequest::new(selector, TimeRange::all(), Direction::Forward);
//!
//! for entry in querier.select(&CancelToken::new(), &request)? {
//!     println!("{} {}", entry.timestamp, entry.line);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod iter;
pub mod labels;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod querier;
pub mod query;
pub mod shard;

pub use config::{QuerierConfig, WindowMode};
pub use error::{Error, Result};
pub use filter::{LineFilter, LinePredicate};
pub use fixture::generate;
pub use iter::{CancelToken, EntryIter, MergeIter};
pub use labels::{Label, LabelParseError, LabelSet};
pub use matcher::{MatchOp, Matcher};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use model::{Entry, Stream};
pub use querier::ShardedQuerier;
pub use query::{Direction, LogSelector, SelectionRequest, StaticSelector, TimeRange, WindowPosition};
pub use shard::{hash_labels, shard_of, ShardIndex, ShardSelector, SHARD_LABEL};
