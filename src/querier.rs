//! Shard-aware query execution over in-memory streams
//!
//! The querier holds an immutable stream collection and a declared shard
//! count. A select operation compiles the request's matchers, filters
//! streams conjunctively (with the synthetic shard-target predicate resolved
//! through shard assignment), applies the content predicate, and returns a
//! lazy merged, time-bounded sequence of the surviving entries.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::config::QuerierConfig;
use crate::error::{Error, Result};
use crate::filter::LineFilter;
use crate::iter::{CancelToken, EntryIter};
use crate::labels::LabelSet;
use crate::matcher::Matcher;
use crate::metrics::MetricsCollector;
use crate::model::{Entry, Stream};
use crate::query::SelectionRequest;
use crate::shard::{shard_of, ShardSelector};

/// A matcher with its shard descriptor parsed up front
///
/// Descriptor parsing happens once per select, before any stream is
/// scanned, so a malformed descriptor aborts the operation as a compilation
/// error rather than surfacing mid-scan.
enum CompiledMatcher {
    Shard(ShardSelector),
    Label(Matcher),
}

fn compile_matchers(matchers: Vec<Matcher>) -> Result<Vec<CompiledMatcher>> {
    matchers
        .into_iter()
        .map(|matcher| {
            if matcher.is_shard_matcher() {
                matcher
                    .value()
                    .parse::<ShardSelector>()
                    .map(CompiledMatcher::Shard)
            } else {
                Ok(CompiledMatcher::Label(matcher))
            }
        })
        .collect()
}

/// Shard-aware querier over a fixed stream collection
///
/// Each select call is independent; the collection is never mutated, so
/// concurrent calls over the same querier are safe.
#[derive(Debug)]
pub struct ShardedQuerier {
    config: QuerierConfig,
    streams: Vec<Stream>,
    metrics: Arc<MetricsCollector>,
}

impl ShardedQuerier {
    /// Create a querier with the given shard count and streams
    pub fn new(shard_count: u32, streams: Vec<Stream>) -> Result<Self> {
        Self::with_config(QuerierConfig::new(shard_count), streams)
    }

    /// Create a querier with a full configuration
    pub fn with_config(config: QuerierConfig, streams: Vec<Stream>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            streams,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// The declared shard count
    pub fn shard_count(&self) -> u32 {
        self.config.shard_count
    }

    /// The stream collection this querier serves
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// The querier's metrics collector
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Execute a selection request
    ///
    /// Returns a lazy, single-pass sequence of entries within the request's
    /// window, ordered by its direction and merged across all surviving
    /// streams. The token cancels the returned sequence between entries.
    pub fn select<'q>(
        &'q self,
        cancel: &CancelToken,
        request: &SelectionRequest,
    ) -> Result<EntryIter<'q>> {
        let started = Instant::now();
        let result = self.select_inner(cancel, request);

        if self.config.collect_metrics {
            self.metrics.increment_selects();
            self.metrics.record_select_duration(started.elapsed());
            if result.is_err() {
                self.metrics.increment_select_errors();
            }
        }

        result
    }

    fn select_inner<'q>(
        &'q self,
        cancel: &CancelToken,
        request: &SelectionRequest,
    ) -> Result<EntryIter<'q>> {
        let matchers = compile_matchers(request.selector.matchers()?)?;
        let filter = request.selector.line_filter()?;

        let mut matched: Vec<&Stream> = Vec::new();
        'streams: for (index, stream) in self.streams.iter().enumerate() {
            let labels = LabelSet::parse(&stream.labels)
                .map_err(|source| Error::corrupt_fixture(index, &stream.labels, source))?;

            for matcher in &matchers {
                let holds = match matcher {
                    CompiledMatcher::Shard(selector) => self.shard_matches(&labels, selector)?,
                    CompiledMatcher::Label(matcher) => {
                        matcher.matches(labels.get(matcher.name()).unwrap_or(""))
                    }
                };
                if !holds {
                    continue 'streams;
                }
            }

            matched.push(stream);
        }

        let matched_count = matched.len();
        let mut dropped = 0usize;
        let mut batches: Vec<Cow<'q, [Entry]>> = Vec::with_capacity(matched_count);

        match &filter {
            LineFilter::PassThrough => {
                for stream in matched {
                    batches.push(Cow::Borrowed(stream.entries.as_slice()));
                }
            }
            LineFilter::Matching(predicate) => {
                for stream in matched {
                    let kept: Vec<Entry> = stream
                        .entries
                        .iter()
                        .filter(|entry| predicate(&entry.line))
                        .cloned()
                        .collect();

                    if kept.is_empty() {
                        dropped += 1;
                    } else {
                        batches.push(Cow::Owned(kept));
                    }
                }
            }
        }

        if self.config.collect_metrics {
            self.metrics.add_streams_considered(self.streams.len());
            self.metrics.add_streams_matched(matched_count);
            self.metrics.add_streams_dropped(dropped);
        }

        debug!(
            streams = self.streams.len(),
            matched = matched_count,
            dropped,
            direction = %request.direction,
            "stream filtering complete"
        );

        Ok(EntryIter::new(
            batches,
            request.direction,
            request.range,
            self.config.window_mode,
            cancel.clone(),
        ))
    }

    /// Evaluate a shard-target predicate against a stream's labels
    ///
    /// A single-shard querier satisfies any target, whatever index the
    /// descriptor names.
    fn shard_matches(&self, labels: &LabelSet, selector: &ShardSelector) -> Result<bool> {
        if self.config.shard_count <= 1 {
            return Ok(true);
        }
        Ok(shard_of(labels, self.config.shard_count)? == selector.shard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowMode;
    use crate::query::{Direction, SelectionRequest, StaticSelector, TimeRange};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(nanos: i64) -> DateTime<Utc> {
        Utc.timestamp_nanos(nanos)
    }

    fn stream(pairs: &[(&str, &str)], stamps: &[i64]) -> Stream {
        let labels = LabelSet::from_pairs(pairs.iter().copied()).unwrap();
        let entries = stamps
            .iter()
            .map(|&n| Entry::new(ts(n), format!("line number: {}", n)))
            .collect();
        Stream::new(&labels, entries)
    }

    fn request(selector: StaticSelector, direction: Direction) -> SelectionRequest {
        SelectionRequest::new(selector, TimeRange::all(), direction)
    }

    fn lines(iter: EntryIter<'_>) -> Vec<String> {
        iter.map(|entry| entry.line).collect()
    }

    #[test_log::test]
    fn test_match_all_returns_every_entry_merged() {
        let querier = ShardedQuerier::new(
            2,
            vec![
                stream(&[("index", "0")], &[1, 3]),
                stream(&[("index", "1")], &[2, 4]),
            ],
        )
        .unwrap();

        let result = querier
            .select(
                &CancelToken::new(),
                &request(StaticSelector::match_all(), Direction::Forward),
            )
            .unwrap();

        assert_eq!(
            lines(result),
            vec![
                "line number: 1",
                "line number: 2",
                "line number: 3",
                "line number: 4",
            ]
        );
    }

    #[test]
    fn test_backward_direction_reverses_order() {
        let querier = ShardedQuerier::new(
            1,
            vec![
                stream(&[("index", "0")], &[1, 3]),
                stream(&[("index", "1")], &[2, 4]),
            ],
        )
        .unwrap();

        let result = querier
            .select(
                &CancelToken::new(),
                &request(StaticSelector::match_all(), Direction::Backward),
            )
            .unwrap();

        assert_eq!(
            lines(result),
            vec![
                "line number: 4",
                "line number: 3",
                "line number: 2",
                "line number: 1",
            ]
        );
    }

    #[test]
    fn test_label_matchers_are_conjunctive() {
        let querier = ShardedQuerier::new(
            1,
            vec![
                stream(&[("index", "0"), ("region", "a")], &[1]),
                stream(&[("index", "1"), ("region", "a")], &[2]),
                stream(&[("index", "1"), ("region", "b")], &[3]),
            ],
        )
        .unwrap();

        let selector = StaticSelector::new(
            vec![
                Matcher::equal("index", "1"),
                Matcher::equal("region", "a"),
            ],
            LineFilter::PassThrough,
        );
        let result = querier
            .select(&CancelToken::new(), &request(selector, Direction::Forward))
            .unwrap();

        assert_eq!(lines(result), vec!["line number: 2"]);
    }

    #[test]
    fn test_adding_a_matcher_never_grows_selection() {
        let streams: Vec<Stream> = (0..8)
            .map(|i| stream(&[("index", &i.to_string()), ("parity", if i % 2 == 0 { "even" } else { "odd" })], &[i]))
            .collect();
        let querier = ShardedQuerier::new(1, streams).unwrap();

        let base = StaticSelector::new(
            vec![Matcher::equal("parity", "even")],
            LineFilter::PassThrough,
        );
        let narrowed = StaticSelector::new(
            vec![
                Matcher::equal("parity", "even"),
                Matcher::equal("index", "2"),
            ],
            LineFilter::PassThrough,
        );

        let base_lines = lines(
            querier
                .select(&CancelToken::new(), &request(base, Direction::Forward))
                .unwrap(),
        );
        let narrowed_lines = lines(
            querier
                .select(&CancelToken::new(), &request(narrowed, Direction::Forward))
                .unwrap(),
        );

        assert!(narrowed_lines.len() <= base_lines.len());
        assert!(narrowed_lines.iter().all(|line| base_lines.contains(line)));
    }

    #[test]
    fn test_absent_label_matches_as_empty_string() {
        let querier = ShardedQuerier::new(
            1,
            vec![stream(&[("index", "0")], &[1])],
        )
        .unwrap();

        let matches_empty = StaticSelector::new(
            vec![Matcher::equal("region", "")],
            LineFilter::PassThrough,
        );
        let result = querier
            .select(&CancelToken::new(), &request(matches_empty, Direction::Forward))
            .unwrap();
        assert_eq!(lines(result).len(), 1);

        let wants_value = StaticSelector::new(
            vec![Matcher::equal("region", "a")],
            LineFilter::PassThrough,
        );
        let result = querier
            .select(&CancelToken::new(), &request(wants_value, Direction::Forward))
            .unwrap();
        assert_eq!(lines(result).len(), 0);
    }

    #[test]
    fn test_shard_matcher_partitions_streams() {
        let shard_count = 2u32;
        let streams: Vec<Stream> = (0..6)
            .map(|i| stream(&[("index", &i.to_string())], &[i]))
            .collect();
        let querier = ShardedQuerier::new(shard_count, streams.clone()).unwrap();

        let mut total = 0usize;
        for shard in 0..shard_count {
            let selector = StaticSelector::new(
                vec![Matcher::shard(ShardSelector::new(shard, shard_count).unwrap())],
                LineFilter::PassThrough,
            );
            let result = querier
                .select(&CancelToken::new(), &request(selector, Direction::Forward))
                .unwrap();
            let entries: Vec<String> = lines(result);

            // Every stream the shard returned must actually hash there.
            for stream in &streams {
                let labels = LabelSet::parse(&stream.labels).unwrap();
                let assigned = shard_of(&labels, shard_count).unwrap();
                let line = &stream.entries[0].line;
                assert_eq!(entries.contains(line), assigned == shard);
            }

            total += entries.len();
        }

        // Shards partition the collection: nothing lost, nothing duplicated.
        assert_eq!(total, streams.len());
    }

    #[test]
    fn test_single_shard_matches_any_target() {
        let querier = ShardedQuerier::new(
            1,
            vec![
                stream(&[("index", "0")], &[1]),
                stream(&[("index", "1")], &[2]),
            ],
        )
        .unwrap();

        // Target index 3 against a descriptor of 4: still everything.
        let selector = StaticSelector::new(
            vec![Matcher::shard(ShardSelector::new(3, 4).unwrap())],
            LineFilter::PassThrough,
        );
        let result = querier
            .select(&CancelToken::new(), &request(selector, Direction::Forward))
            .unwrap();

        assert_eq!(lines(result).len(), 2);
    }

    #[test]
    fn test_malformed_shard_descriptor_fails_before_scan() {
        let querier = ShardedQuerier::new(
            2,
            vec![stream(&[("index", "0")], &[1])],
        )
        .unwrap();

        let selector = StaticSelector::new(
            vec![Matcher::equal(crate::shard::SHARD_LABEL, "not_a_descriptor")],
            LineFilter::PassThrough,
        );
        let err = querier
            .select(&CancelToken::new(), &request(selector, Direction::Forward))
            .unwrap_err();

        assert!(err.is_query_compilation());
    }

    #[test]
    fn test_content_filter_drops_emptied_streams() {
        let querier = ShardedQuerier::new(
            1,
            vec![
                stream(&[("index", "0")], &[1, 2]),
                stream(&[("index", "1")], &[3]),
            ],
        )
        .unwrap();

        let selector = StaticSelector::new(
            Vec::new(),
            // Keeps only entries from the first stream.
            LineFilter::predicate(|line| line == "line number: 1" || line == "line number: 2"),
        );
        let result = querier
            .select(&CancelToken::new(), &request(selector, Direction::Forward))
            .unwrap();

        assert_eq!(lines(result), vec!["line number: 1", "line number: 2"]);
        assert_eq!(querier.metrics().snapshot().streams_dropped, 1);
    }

    #[test]
    fn test_rejecting_filter_yields_empty_sequence() {
        let querier = ShardedQuerier::new(
            1,
            vec![
                stream(&[("index", "0")], &[1, 2]),
                stream(&[("index", "1")], &[3]),
            ],
        )
        .unwrap();

        let selector = StaticSelector::new(Vec::new(), LineFilter::predicate(|_| false));
        let result = querier
            .select(&CancelToken::new(), &request(selector, Direction::Forward))
            .unwrap();

        assert_eq!(result.count(), 0);
    }

    #[test]
    fn test_empty_stream_collection_is_not_an_error() {
        let querier = ShardedQuerier::new(4, Vec::new()).unwrap();
        let result = querier
            .select(
                &CancelToken::new(),
                &request(StaticSelector::match_all(), Direction::Forward),
            )
            .unwrap();
        assert_eq!(result.count(), 0);
    }

    #[test]
    fn test_corrupt_labels_abort_with_context() {
        let querier = ShardedQuerier::new(
            1,
            vec![
                stream(&[("index", "0")], &[1]),
                Stream::from_rendered("definitely not labels", Vec::new()),
            ],
        )
        .unwrap();

        let err = querier
            .select(
                &CancelToken::new(),
                &request(StaticSelector::match_all(), Direction::Forward),
            )
            .unwrap_err();

        assert!(err.is_corrupt_fixture());
        let message = err.to_string();
        assert!(message.contains("stream 1"));
        assert!(message.contains("definitely not labels"));
    }

    #[test]
    fn test_window_bounds_applied() {
        let querier = ShardedQuerier::new(
            1,
            vec![stream(&[("index", "0")], &[10, 20, 30])],
        )
        .unwrap();

        let request = SelectionRequest::new(
            StaticSelector::match_all(),
            TimeRange::new(ts(10), ts(30)),
            Direction::Forward,
        );
        let result = querier.select(&CancelToken::new(), &request).unwrap();

        // start is included, end is excluded
        assert_eq!(lines(result), vec!["line number: 10", "line number: 20"]);
    }

    #[test]
    fn test_window_mode_is_configurable() {
        let config = QuerierConfig::new(1).with_window_mode(WindowMode::OpenClosed);
        let querier = ShardedQuerier::with_config(
            config,
            vec![stream(&[("index", "0")], &[10, 20, 30])],
        )
        .unwrap();

        let request = SelectionRequest::new(
            StaticSelector::match_all(),
            TimeRange::new(ts(10), ts(30)),
            Direction::Forward,
        );
        let result = querier.select(&CancelToken::new(), &request).unwrap();

        assert_eq!(lines(result), vec!["line number: 20", "line number: 30"]);
    }

    #[test]
    fn test_zero_shard_count_rejected_at_construction() {
        let err = ShardedQuerier::new(0, Vec::new()).unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_metrics_track_selects_and_errors() {
        let querier = ShardedQuerier::new(
            1,
            vec![stream(&[("index", "0")], &[1])],
        )
        .unwrap();

        querier
            .select(
                &CancelToken::new(),
                &request(StaticSelector::match_all(), Direction::Forward),
            )
            .unwrap();

        let bad = StaticSelector::new(
            vec![Matcher::equal(crate::shard::SHARD_LABEL, "junk")],
            LineFilter::PassThrough,
        );
        let _ = querier.select(&CancelToken::new(), &request(bad, Direction::Forward));

        let snapshot = querier.metrics().snapshot();
        assert_eq!(snapshot.select_count, 2);
        assert_eq!(snapshot.select_error_count, 1);
        assert_eq!(snapshot.streams_matched, 1);
    }
}
