// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Custom total orders over composite keys.
//!
//! These must be registered on the relevant column families at open time --
//! if they are not, the database is unreadable. The registered name string
//! is part of the on-disk compatibility contract: changing it breaks
//! existing data, so these constants must never change independently of a
//! data-format migration.

use std::cmp::Ordering;

use crate::codec::key::{parse_list_data_key, parse_zset_score_key};

pub const LIST_DATA_COMPARATOR_NAME: &str = "nitrokv.ListDataComparator";
pub const ZSET_SCORE_COMPARATOR_NAME: &str = "nitrokv.ZsetScoreComparator";

/// Orders list data keys by `(user_key, version as signed i32, index as
/// unsigned u64)`. The unsigned index comparison, combined with the split
/// of the int32 range in `ListBounds::default`, yields a dense total order
/// in which `LRange` is a contiguous seek.
pub fn compare_list_data_keys(a: &[u8], b: &[u8]) -> Ordering {
    let (pa, pb) = match (parse_list_data_key(a), parse_list_data_key(b)) {
        (Some(pa), Some(pb)) => (pa, pb),
        // Malformed keys only ever occur for truncated bounds passed to
        // `Iterator::seek`; fall back to raw lexicographic order so a seek
        // to a key prefix still lands in the right neighborhood.
        _ => return a.cmp(b),
    };
    pa.user_key
        .cmp(pb.user_key)
        .then_with(|| pa.version.cmp(&pb.version))
        .then_with(|| pa.index.cmp(&pb.index))
}

/// Orders zset score keys by `(user_key, version, score as f64, member)`.
/// Scores compare numerically via `f64::partial_cmp`, never lexicographically
/// on their raw bits. `+0.0` and `-0.0` compare equal; `NaN` is rejected at
/// the write path so `partial_cmp` returning `None` here would
/// indicate a write-path bug, not a condition this comparator must recover
/// from -- it degrades to `Equal` rather than panicking mid-compaction.
pub fn compare_zset_score_keys(a: &[u8], b: &[u8]) -> Ordering {
    let (pa, pb) = match (parse_zset_score_key(a), parse_zset_score_key(b)) {
        (Some(pa), Some(pb)) => (pa, pb),
        _ => return a.cmp(b),
    };
    pa.user_key
        .cmp(pb.user_key)
        .then_with(|| pa.version.cmp(&pb.version))
        .then_with(|| pa.score.partial_cmp(&pb.score).unwrap_or(Ordering::Equal))
        .then_with(|| pa.member.cmp(pb.member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::key::{list_data_key, zset_score_key};

    #[test]
    fn list_comparator_orders_by_key_then_version_then_index() {
        let a = list_data_key(b"k", 1, 5);
        let b = list_data_key(b"k", 1, 6);
        assert_eq!(compare_list_data_keys(&a, &b), Ordering::Less);

        let a = list_data_key(b"k", 1, u64::MAX);
        let b = list_data_key(b"k", 2, 0);
        assert_eq!(compare_list_data_keys(&a, &b), Ordering::Less);

        let a = list_data_key(b"a", 5, 0);
        let b = list_data_key(b"b", 1, 0);
        assert_eq!(compare_list_data_keys(&a, &b), Ordering::Less);
    }

    #[test]
    fn list_comparator_treats_index_as_unsigned() {
        // left_idx side lives just under 2^31, right_idx side starts at
        // 2^31; as unsigned 64-bit values the order must stay ascending.
        let left_region = list_data_key(b"k", 0, (i32::MAX as u64) - 1);
        let right_region = list_data_key(b"k", 0, i32::MAX as u64 + 1);
        assert_eq!(
            compare_list_data_keys(&left_region, &right_region),
            Ordering::Less
        );
    }

    #[test]
    fn zset_comparator_orders_numerically_not_lexically() {
        let a = zset_score_key(b"z", 0, 2.0, b"m");
        let b = zset_score_key(b"z", 0, 10.0, b"m");
        // Lexicographic comparison of "2" vs "10" would disagree; the
        // comparator must still say 2.0 < 10.0.
        assert_eq!(compare_zset_score_keys(&a, &b), Ordering::Less);
    }

    #[test]
    fn zset_comparator_treats_signed_zero_as_equal() {
        let a = zset_score_key(b"z", 0, 0.0, b"m");
        let b = zset_score_key(b"z", 0, -0.0, b"m");
        assert_eq!(compare_zset_score_keys(&a, &b), Ordering::Equal);
    }

    #[test]
    fn zset_comparator_breaks_ties_on_member() {
        let a = zset_score_key(b"z", 0, 1.0, b"alice");
        let b = zset_score_key(b"z", 0, 1.0, b"bob");
        assert_eq!(compare_zset_score_keys(&a, &b), Ordering::Less);
    }
}
