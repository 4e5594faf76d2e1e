//! Lazy merged iteration over stream entries
//!
//! The engine composes two pieces here: a k-way merge across per-stream
//! entry batches keyed on timestamp, and a window bound applied on top. Both
//! are pull-based; advancing does bounded work on the merge frontier and
//! never blocks. A cancellation handle stops production between entries.
//!
//! Each input batch must already be in ascending timestamp order; the merge
//! reads batches front-to-back for forward iteration and back-to-front for
//! backward iteration.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::WindowMode;
use crate::model::Entry;
use crate::query::{Direction, TimeRange, WindowPosition};

/// Cooperative cancellation handle
///
/// Clones share one flag; firing it stops any sequence holding a clone at
/// its next advance. Cancellation is not an error; consumers simply see the
/// sequence end.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, unfired token
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token
    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::Release);
    }

    /// Check whether the token has fired
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::Acquire)
    }
}

/// Next candidate from one source batch on the merge frontier
///
/// Heap order pops the smallest timestamp first when iterating forward and
/// the largest first when iterating backward; ties always go to the lowest
/// source ordinal, keeping the merge stable with respect to input order.
#[derive(Debug)]
struct Frontier {
    timestamp: DateTime<Utc>,
    source: usize,
    backward: bool,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_time = if self.backward {
            self.timestamp.cmp(&other.timestamp)
        } else {
            other.timestamp.cmp(&self.timestamp)
        };
        by_time.then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

/// K-way merge over per-stream entry batches
///
/// Batches are borrowed when the engine passed streams through unfiltered
/// and owned when content filtering produced new collections.
#[derive(Debug)]
pub struct MergeIter<'a> {
    batches: Vec<Cow<'a, [Entry]>>,
    /// Per-batch count of entries already consumed, in direction order
    consumed: Vec<usize>,
    heap: BinaryHeap<Frontier>,
    direction: Direction,
}

impl<'a> MergeIter<'a> {
    /// Create a merge over the given batches
    pub fn new(batches: Vec<Cow<'a, [Entry]>>, direction: Direction) -> Self {
        let consumed = vec![0; batches.len()];
        let mut heap = BinaryHeap::with_capacity(batches.len());

        let backward = direction == Direction::Backward;
        for (source, batch) in batches.iter().enumerate() {
            if let Some(entry) = entry_at(batch, direction, 0) {
                heap.push(Frontier {
                    timestamp: entry.timestamp,
                    source,
                    backward,
                });
            }
        }

        Self {
            batches,
            consumed,
            heap,
            direction,
        }
    }
}

/// Look up the `offset`-th entry of a batch in direction order
fn entry_at<'b>(batch: &'b [Entry], direction: Direction, offset: usize) -> Option<&'b Entry> {
    match direction {
        Direction::Forward => batch.get(offset),
        Direction::Backward => batch
            .len()
            .checked_sub(offset + 1)
            .map(|index| &batch[index]),
    }
}

impl Iterator for MergeIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let top = self.heap.pop()?;
        let source = top.source;

        let offset = self.consumed[source];
        let entry = entry_at(&self.batches[source], self.direction, offset)
            .cloned()?;
        self.consumed[source] = offset + 1;

        if let Some(next) = entry_at(&self.batches[source], self.direction, offset + 1) {
            self.heap.push(Frontier {
                timestamp: next.timestamp,
                source,
                backward: top.backward,
            });
        }

        Some(entry)
    }
}

/// The lazy result sequence returned by a select operation
///
/// Single-pass, non-restartable, finite. Entries outside the window are
/// skipped; once iteration passes the window's far edge the sequence ends
/// without touching remaining entries. Cancellation is checked between
/// entries.
#[derive(Debug)]
pub struct EntryIter<'a> {
    merge: MergeIter<'a>,
    range: TimeRange,
    mode: WindowMode,
    direction: Direction,
    cancel: CancelToken,
    done: bool,
}

impl<'a> EntryIter<'a> {
    /// Compose a merge with a window bound and a cancellation handle
    pub fn new(
        batches: Vec<Cow<'a, [Entry]>>,
        direction: Direction,
        range: TimeRange,
        mode: WindowMode,
        cancel: CancelToken,
    ) -> Self {
        Self {
            merge: MergeIter::new(batches, direction),
            range,
            mode,
            direction,
            cancel,
            done: false,
        }
    }

    /// An already-exhausted sequence
    pub fn empty() -> Self {
        Self::new(
            Vec::new(),
            Direction::Forward,
            TimeRange::all(),
            WindowMode::default(),
            CancelToken::new(),
        )
    }
}

impl Iterator for EntryIter<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        if self.done {
            return None;
        }

        loop {
            if self.cancel.is_cancelled() {
                self.done = true;
                return None;
            }

            let entry = match self.merge.next() {
                Some(entry) => entry,
                None => {
                    self.done = true;
                    return None;
                }
            };

            match (self.range.position(entry.timestamp, self.mode), self.direction) {
                (WindowPosition::Inside, _) => return Some(entry),
                // Not yet inside the window; keep advancing toward it.
                (WindowPosition::Before, Direction::Forward)
                | (WindowPosition::After, Direction::Backward) => continue,
                // Walked past the window's far edge; nothing further can match.
                (WindowPosition::After, Direction::Forward)
                | (WindowPosition::Before, Direction::Backward) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
