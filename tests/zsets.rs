// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Integration coverage for the sorted-set engine (spec §4.4.5).

use std::time::Duration;

use nitrokv::engine::zsets::{Aggregate, ZsetEngine};
use nitrokv::engine::KeyOps;
use tempfile::TempDir;

fn open() -> (TempDir, ZsetEngine) {
    let dir = TempDir::new().unwrap();
    let engine = ZsetEngine::open(dir.path(), true, Duration::from_millis(500), 5000).unwrap();
    (dir, engine)
}

#[test]
fn zadd_is_idempotent_on_repeated_members() {
    let (_d, e) = open();
    let added = e.zadd(b"z", &[(1.0, b"m".to_vec())]).unwrap();
    assert_eq!(added, 1);
    let added_again = e.zadd(b"z", &[(2.0, b"m".to_vec())]).unwrap();
    assert_eq!(added_again, 0);
    assert_eq!(e.zscore(b"z", b"m").unwrap(), Some(2.0));
    assert_eq!(e.zcard(b"z").unwrap(), 1);
}

#[test]
fn zrangebyscore_honors_open_and_closed_bounds() {
    let (_d, e) = open();
    e.zadd(
        b"z",
        &[(1.0, b"a".to_vec()), (2.0, b"b".to_vec()), (3.0, b"c".to_vec())],
    )
    .unwrap();
    let closed = e.zrangebyscore(b"z", 1.0, 3.0, true, true).unwrap();
    assert_eq!(closed.len(), 3);
    let open = e.zrangebyscore(b"z", 1.0, 3.0, false, false).unwrap();
    assert_eq!(open.iter().map(|(m, _)| m.clone()).collect::<Vec<_>>(), vec![b"b".to_vec()]);
}

#[test]
fn zrangebylex_requires_equal_scores() {
    let (_d, e) = open();
    e.zadd(
        b"z",
        &[(0.0, b"a".to_vec()), (0.0, b"b".to_vec()), (0.0, b"c".to_vec())],
    )
    .unwrap();
    let members = e.zrangebylex(b"z", b"a", b"b").unwrap();
    assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn zinterstore_requires_membership_in_every_source() {
    let (_d, e) = open();
    e.zadd(b"a", &[(1.0, b"m".to_vec()), (1.0, b"only_a".to_vec())]).unwrap();
    e.zadd(b"b", &[(2.0, b"m".to_vec())]).unwrap();
    let n = e
        .zinterstore(b"dest", &[(b"a".to_vec(), 1.0), (b"b".to_vec(), 1.0)], Aggregate::Max)
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(e.zscore(b"dest", b"m").unwrap(), Some(2.0));
}

#[test]
fn zremrangebyrank_removes_the_requested_window() {
    let (_d, e) = open();
    e.zadd(
        b"z",
        &[(1.0, b"a".to_vec()), (2.0, b"b".to_vec()), (3.0, b"c".to_vec())],
    )
    .unwrap();
    let removed = e.zremrangebyrank(b"z", 0, 0).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(e.zcard(b"z").unwrap(), 2);
    assert_eq!(e.zscore(b"z", b"a").unwrap(), None);
}

#[test]
fn zrem_is_a_no_op_for_missing_members() {
    let (_d, e) = open();
    e.zadd(b"z", &[(1.0, b"a".to_vec())]).unwrap();
    assert_eq!(e.zrem(b"z", &[b"missing".to_vec()]).unwrap(), 0);
    assert_eq!(e.zrem(b"z", &[b"a".to_vec()]).unwrap(), 1);
    assert_eq!(e.zcard(b"z").unwrap(), 0);
}

#[test]
fn delete_then_zadd_starts_a_fresh_zset() {
    let (_d, e) = open();
    e.zadd(b"z", &[(1.0, b"a".to_vec())]).unwrap();
    assert!(e.delete(b"z").unwrap());
    assert_eq!(e.zcard(b"z").unwrap(), 0);
    e.zadd(b"z", &[(9.0, b"b".to_vec())]).unwrap();
    assert_eq!(e.zrange(b"z", 0, -1).unwrap(), vec![(b"b".to_vec(), 9.0)]);
}
