// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Integration coverage for the string engine (spec §4.4.1), exercised
//! through a fresh on-disk database per test.

use std::time::Duration;

use nitrokv::engine::strings::{BitOp, StringEngine};
use nitrokv::engine::KeyOps;
use tempfile::TempDir;

fn open() -> (TempDir, StringEngine) {
    let dir = TempDir::new().unwrap();
    let engine = StringEngine::open(dir.path(), true, Duration::from_millis(500)).unwrap();
    (dir, engine)
}

#[test]
fn set_ex_expires_after_ttl_but_is_readable_before_it() {
    let (_d, e) = open();
    e.set_ex(b"k", b"v", 100).unwrap();
    assert_eq!(e.get(b"k").unwrap(), Some(b"v".to_vec()));
    assert!(e.ttl(b"k").unwrap() > 0);
}

#[test]
fn getset_returns_the_previous_value() {
    let (_d, e) = open();
    e.set(b"k", b"old").unwrap();
    let prev = e.getset(b"k", b"new").unwrap();
    assert_eq!(prev, Some(b"old".to_vec()));
    assert_eq!(e.get(b"k").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn incrby_float_accumulates() {
    let (_d, e) = open();
    e.set(b"k", b"10.5").unwrap();
    let v = e.incrby_float(b"k", 0.1).unwrap();
    assert!((v - 10.6).abs() < 1e-9);
}

#[test]
fn mset_and_msetnx_across_multiple_keys() {
    let (_d, e) = open();
    let pairs = vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())];
    e.mset(&pairs).unwrap();
    assert_eq!(e.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(e.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert!(!e.msetnx(&pairs).unwrap());
}

#[test]
fn bitcount_and_bitpos_respect_byte_ranges() {
    let (_d, e) = open();
    e.set(b"k", &[0xff, 0x00, 0x0f]).unwrap();
    assert_eq!(e.bitcount(b"k", None).unwrap(), 12);
    assert_eq!(e.bitcount(b"k", Some((1, 2))).unwrap(), 4);
    assert_eq!(e.bitpos(b"k", false, None).unwrap(), 8);
}

#[test]
fn bitop_xor_combines_sources() {
    let (_d, e) = open();
    e.set(b"a", &[0b1111_0000]).unwrap();
    e.set(b"b", &[0b1010_1010]).unwrap();
    e.bitop(BitOp::Xor, b"dest", &[b"a", b"b"]).unwrap();
    assert_eq!(e.get(b"dest").unwrap(), Some(vec![0b0101_1010]));
}

#[test]
fn delete_and_expire_and_persist_via_keyops() {
    let (_d, e) = open();
    e.set(b"k", b"v").unwrap();
    assert!(e.expire(b"k", 1000).unwrap());
    assert!(e.persist(b"k").unwrap());
    assert_eq!(e.ttl(b"k").unwrap(), -1);
    assert!(e.delete(b"k").unwrap());
    assert_eq!(e.ttl(b"k").unwrap(), -2);
}

#[test]
fn scan_pages_through_results_and_filters_by_pattern() {
    let (_d, e) = open();
    for i in 0..5 {
        e.set(format!("P_{}", i).as_bytes(), b"v").unwrap();
    }
    e.set(b"Q_other", b"v").unwrap();

    let mut start = Vec::new();
    let mut seen = Vec::new();
    loop {
        let (batch, next_start, done) = e.scan(&start, "P_*", 2).unwrap();
        seen.extend(batch);
        if done {
            break;
        }
        start = next_start;
    }
    assert_eq!(seen.len(), 5);
    assert_eq!(e.scan_key_num().unwrap(), 6);
}
