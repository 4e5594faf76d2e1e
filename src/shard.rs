//! Hash-based shard assignment for label sets
//!
//! Every stream belongs to exactly one shard, derived from a stable 64-bit
//! hash of its canonical label rendering reduced modulo the shard count.
//! Assignment is pure and recomputed on demand, so changing the shard count
//! at query time changes assignment without touching stored data.

use std::fmt;
use std::str::FromStr;

use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};
use crate::labels::LabelSet;

/// Reserved label name carrying a shard-target descriptor in a query
pub const SHARD_LABEL: &str = "__shard__";

/// Index of a shard, in `[0, shard_count)`
pub type ShardIndex = u32;

/// Compute the stable 64-bit hash of a label set
///
/// The hash input is the canonical (name-sorted) rendering, so insertion
/// order never affects the result. xxh64 with seed 0 guarantees the same
/// value for the same input across processes, runs, and platforms for a
/// given crate version.
pub fn hash_labels(labels: &LabelSet) -> u64 {
    xxh64(labels.canonical().as_bytes(), 0)
}

/// Assign a label set to a shard
///
/// Pure and referentially transparent; safe to call concurrently. A zero
/// shard count is a caller error and fails fast instead of dividing by zero.
pub fn shard_of(labels: &LabelSet, shard_count: u32) -> Result<ShardIndex> {
    if shard_count == 0 {
        return Err(Error::invalid_configuration(
            "shard count must be positive",
        ));
    }
    Ok((hash_labels(labels) % u64::from(shard_count)) as ShardIndex)
}

/// A parsed shard-target descriptor, rendered as `<shard>_of_<count>`
///
/// This is the value carried by a matcher on [`SHARD_LABEL`]. The `of`
/// component records the shard count the descriptor was written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSelector {
    /// Target shard index
    pub shard: ShardIndex,
    /// Total shard count the target was expressed against
    pub of: u32,
}

impl ShardSelector {
    /// Create a new selector, validating the index against the count
    pub fn new(shard: ShardIndex, of: u32) -> Result<Self> {
        if of == 0 {
            return Err(Error::query_compilation(
                "shard descriptor count must be positive",
            ));
        }
        if shard >= of {
            return Err(Error::query_compilation(format!(
                "shard {} out of range for {} shards",
                shard, of
            )));
        }
        Ok(Self { shard, of })
    }
}

impl fmt::Display for ShardSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_of_{}", self.shard, self.of)
    }
}

impl FromStr for ShardSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (shard, of) = s
            .split_once("_of_")
            .ok_or_else(|| {
                Error::query_compilation(format!("malformed shard descriptor: {:?}", s))
            })?;

        let shard = shard.parse::<u32>().map_err(|_| {
            Error::query_compilation(format!("invalid shard index in descriptor: {:?}", s))
        })?;
        let of = of.parse::<u32>().map_err(|_| {
            Error::query_compilation(format!("invalid shard count in descriptor: {:?}", s))
        })?;

        Self::new(shard, of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        LabelSet::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_hash_is_deterministic() {
        let set = labels(&[("index", "0"), ("region", "1")]);
        assert_eq!(hash_labels(&set), hash_labels(&set));
        assert_eq!(hash_labels(&set), hash_labels(&set.clone()));
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let a = labels(&[("index", "0"), ("region", "1")]);
        let b = labels(&[("region", "1"), ("index", "0")]);
        assert_eq!(hash_labels(&a), hash_labels(&b));
    }

    #[test]
    fn test_hash_differs_across_values() {
        let a = labels(&[("index", "0")]);
        let b = labels(&[("index", "1")]);
        assert_ne!(hash_labels(&a), hash_labels(&b));
    }

    #[test]
    fn test_shard_of_in_range() {
        for count in [1u32, 2, 3, 16, 1000] {
            for i in 0..50 {
                let set = labels(&[("index", &i.to_string())]);
                let shard = shard_of(&set, count).unwrap();
                assert!(shard < count);
            }
        }
    }

    #[test]
    fn test_shard_of_zero_count_fails_fast() {
        let set = labels(&[("index", "0")]);
        let err = shard_of(&set, 0).unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn test_shard_distribution_not_starved() {
        // With far more label sets than shards every index should be hit.
        let count = 8u32;
        let mut seen = vec![0usize; count as usize];
        for i in 0..512 {
            let set = labels(&[("index", &i.to_string())]);
            seen[shard_of(&set, count).unwrap() as usize] += 1;
        }
        assert!(seen.iter().all(|&hits| hits > 0), "starved shard: {:?}", seen);
    }

    #[test]
    fn test_shard_distribution_over_random_label_sets() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let count = 16u32;
        let samples = 2048usize;
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = vec![0usize; count as usize];

        for _ in 0..samples {
            let app: u32 = rng.gen();
            let zone: u32 = rng.gen();
            let set = labels(&[("app", &app.to_string()), ("zone", &zone.to_string())]);
            seen[shard_of(&set, count).unwrap() as usize] += 1;
        }

        // Roughly uniform: no shard starved, none grossly overloaded.
        let expected = samples / count as usize;
        for (shard, &hits) in seen.iter().enumerate() {
            assert!(hits > 0, "shard {} starved", shard);
            assert!(hits < expected * 3, "shard {} overloaded with {} hits", shard, hits);
        }
    }

    proptest! {
        #[test]
        fn prop_shard_in_range_and_deterministic(
            values in proptest::collection::vec("[ -~]{0,12}", 1..5),
            count in 1u32..64,
        ) {
            let pairs: Vec<(String, String)> = values
                .iter()
                .enumerate()
                .map(|(i, value)| (format!("l{}", i), value.clone()))
                .collect();
            let set = LabelSet::from_pairs(pairs).unwrap();

            let first = shard_of(&set, count).unwrap();
            let second = shard_of(&set, count).unwrap();
            prop_assert_eq!(first, second);
            prop_assert!(first < count);
        }
    }

    #[test]
    fn test_selector_round_trip() {
        let selector = ShardSelector::new(3, 16).unwrap();
        assert_eq!(selector.to_string(), "3_of_16");
        assert_eq!("3_of_16".parse::<ShardSelector>().unwrap(), selector);
    }

    #[test]
    fn test_selector_rejects_malformed() {
        for input in ["", "3", "3_of_", "_of_16", "x_of_y", "3-of-16"] {
            let err = input.parse::<ShardSelector>().unwrap_err();
            assert!(err.is_query_compilation(), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_selector_rejects_out_of_range() {
        assert!("16_of_16".parse::<ShardSelector>().unwrap_err().is_query_compilation());
        assert!("0_of_0".parse::<ShardSelector>().unwrap_err().is_query_compilation());
    }
}
