//! Deterministic stream fixtures
//!
//! Generates synthetic stream collections whose shard placement is derivable
//! and reproducible. Label values are themselves shard-hash-derived, giving
//! a non-trivial but byte-stable distribution across shards for any input
//! parameters: the same call always produces the same streams, across runs
//! and processes.

use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::labels::LabelSet;
use crate::model::{Entry, Stream};
use crate::shard::hash_labels;

/// Synthetic epoch all generated timestamps count from
pub const EPOCH_NANOS: i64 = 0;

/// Spacing between consecutive entries of a generated stream
pub const ENTRY_STEP_NANOS: i64 = 1_000_000;

/// Generate a deterministic collection of streams
///
/// Each stream carries a distinguishing `index` label so its identity is
/// unique regardless of the other labels. For every requested label name,
/// the value is derived by hashing the labels accumulated so far plus a
/// trial label, reduced modulo the shard count; the derivation chains, so
/// later labels depend on earlier ones. Entries get strictly increasing
/// timestamps at a fixed one-millisecond step and lines identifying their
/// ordinal position.
pub fn generate<S: AsRef<str>>(
    stream_count: usize,
    entries_per_stream: usize,
    shard_count: u32,
    label_names: &[S],
) -> Result<Vec<Stream>> {
    if shard_count == 0 {
        return Err(Error::invalid_configuration(
            "shard count must be positive",
        ));
    }

    let mut streams = Vec::with_capacity(stream_count);

    for i in 0..stream_count {
        let mut labels = LabelSet::new()
            .with("index", i.to_string())
            .map_err(|err| Error::invalid_configuration(err.to_string()))?;

        for name in label_names {
            let name = name.as_ref();

            // Hash a snapshot holding a trial value, then keep the derived one.
            let trial = labels
                .with(name, i.to_string())
                .map_err(|err| Error::invalid_configuration(err.to_string()))?;
            let derived = hash_labels(&trial) % u64::from(shard_count);

            labels = labels
                .with(name, derived.to_string())
                .map_err(|err| Error::invalid_configuration(err.to_string()))?;
        }

        let entries = (0..entries_per_stream)
            .map(|j| {
                Entry::new(
                    entry_timestamp(j),
                    format!("line number: {}", j),
                )
            })
            .collect();

        streams.push(Stream::new(&labels, entries));
    }

    debug!(
        streams = stream_count,
        entries_per_stream,
        shard_count,
        labels = label_names.len(),
        "generated fixture streams"
    );

    Ok(streams)
}

/// Timestamp of the `j`-th generated entry
pub fn entry_timestamp(j: usize) -> DateTime<Utc> {
    Utc.timestamp_nanos(EPOCH_NANOS + (j as i64) * ENTRY_STEP_NANOS)
}
