// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Integration coverage for the set engine (spec §4.4.3).

use std::time::Duration;

use nitrokv::engine::sets::SetEngine;
use nitrokv::engine::KeyOps;
use tempfile::TempDir;

fn open() -> (TempDir, SetEngine) {
    let dir = TempDir::new().unwrap();
    let engine = SetEngine::open(dir.path(), true, Duration::from_millis(500), 5000).unwrap();
    (dir, engine)
}

fn vecs(items: &[&str]) -> Vec<Vec<u8>> {
    items.iter().map(|s| s.as_bytes().to_vec()).collect()
}

#[test]
fn sadd_dedups_and_srem_reports_removed_count() {
    let (_d, e) = open();
    assert_eq!(e.sadd(b"s", &vecs(&["a", "b", "a"])).unwrap(), 2);
    assert_eq!(e.scard(b"s").unwrap(), 2);
    assert_eq!(e.srem(b"s", &vecs(&["a", "missing"])).unwrap(), 1);
    assert_eq!(e.scard(b"s").unwrap(), 1);
}

#[test]
fn sismember_and_smembers() {
    let (_d, e) = open();
    e.sadd(b"s", &vecs(&["a", "b"])).unwrap();
    assert!(e.sismember(b"s", b"a").unwrap());
    assert!(!e.sismember(b"s", b"z").unwrap());
    let mut members = e.smembers(b"s").unwrap();
    members.sort();
    assert_eq!(members, vecs(&["a", "b"]));
}

#[test]
fn sdiff_sinter_sunion_across_multiple_sets() {
    let (_d, e) = open();
    e.sadd(b"a", &vecs(&["x", "y", "z"])).unwrap();
    e.sadd(b"b", &vecs(&["y"])).unwrap();

    let mut diff = e.sdiff(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
    diff.sort();
    assert_eq!(diff, vecs(&["x", "z"]));

    let inter = e.sinter(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
    assert_eq!(inter, vecs(&["y"]));

    let mut union = e.sunion(&[b"a".to_vec(), b"b".to_vec()]).unwrap();
    union.sort();
    assert_eq!(union, vecs(&["x", "y", "z"]));
}

#[test]
fn sinterstore_writes_the_result_to_dest() {
    let (_d, e) = open();
    e.sadd(b"a", &vecs(&["x", "y"])).unwrap();
    e.sadd(b"b", &vecs(&["y", "z"])).unwrap();
    let n = e.sinterstore(b"dest", &[b"a".to_vec(), b"b".to_vec()]).unwrap();
    assert_eq!(n, 1);
    assert_eq!(e.smembers(b"dest").unwrap(), vecs(&["y"]));
}

#[test]
fn smove_moves_a_member_between_sets() {
    let (_d, e) = open();
    e.sadd(b"src", &vecs(&["m"])).unwrap();
    assert!(e.smove(b"src", b"dst", b"m").unwrap());
    assert!(!e.sismember(b"src", b"m").unwrap());
    assert!(e.sismember(b"dst", b"m").unwrap());
    assert!(!e.smove(b"src", b"dst", b"missing").unwrap());
}

#[test]
fn spop_removes_and_returns_a_member() {
    let (_d, e) = open();
    e.sadd(b"s", &vecs(&["only"])).unwrap();
    let popped = e.spop(b"s").unwrap();
    assert_eq!(popped, Some(b"only".to_vec()));
    assert_eq!(e.scard(b"s").unwrap(), 0);
    assert_eq!(e.spop(b"s").unwrap(), None);
}

#[test]
fn srandmember_with_negative_count_may_repeat_members() {
    let (_d, e) = open();
    e.sadd(b"s", &vecs(&["a"])).unwrap();
    let sample = e.srandmember(b"s", -5).unwrap();
    assert_eq!(sample.len(), 5);
    assert!(sample.iter().all(|m| m == b"a"));
}

#[test]
fn delete_clears_all_members() {
    let (_d, e) = open();
    e.sadd(b"s", &vecs(&["a", "b"])).unwrap();
    assert!(e.delete(b"s").unwrap());
    assert_eq!(e.scard(b"s").unwrap(), 0);
    assert!(!e.delete(b"s").unwrap());
}
