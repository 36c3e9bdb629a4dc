// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Composite key builders and parsers for the data/score column families.
//!
//! Layouts:
//! ```text
//! hash/set/zset data key  : u32 key_len | key | i32 version | member_or_field
//! list data key           : u32 key_len | key | i32 version | u64 index
//! zset score key          : u32 key_len | key | i32 version | f64_bits score | member
//! meta key                : key                       (plain)
//! ```

use super::{
    get_f64_bits_le, get_i32_le, get_u32_le, get_u64_le, put_f64_bits_le, put_i32_le, put_u32_le,
    put_u64_le, KeyBuf,
};

/// Meta keys are the plain user key; no encoding needed, but named for
/// symmetry with the data-key builders and to keep call sites uniform.
#[inline]
pub fn meta_key(user_key: &[u8]) -> &[u8] {
    user_key
}

/// Builds the `(key_len|key)` prefix shared by every record of a user-key
/// across *all* its versions -- used to scope a per-key background
/// compaction (`compact-key`) without first reading the meta.
pub fn key_prefix(user_key: &[u8]) -> KeyBuf {
    let mut buf = KeyBuf::with_capacity(4 + user_key.len());
    put_u32_le(&mut buf, user_key.len() as u32);
    buf.extend_from_slice(user_key);
    buf
}

fn push_prefix(buf: &mut KeyBuf, user_key: &[u8], version: i32) {
    put_u32_le(buf, user_key.len() as u32);
    buf.extend_from_slice(user_key);
    put_i32_le(buf, version);
}

/// Builds a hash/set/zset data key: `u32 key_len | key | i32 version | member`.
pub fn data_key(user_key: &[u8], version: i32, member: &[u8]) -> KeyBuf {
    let mut buf = KeyBuf::with_capacity(8 + user_key.len() + member.len());
    push_prefix(&mut buf, user_key, version);
    buf.extend_from_slice(member);
    buf
}

/// Builds the `(key_len|key|version|)` prefix shared by every data record of
/// one (key, version) pair -- used as a scan lower bound.
pub fn data_key_prefix(user_key: &[u8], version: i32) -> KeyBuf {
    let mut buf = KeyBuf::with_capacity(8 + user_key.len());
    push_prefix(&mut buf, user_key, version);
    buf
}

pub struct ParsedDataKey<'a> {
    pub user_key: &'a [u8],
    pub version: i32,
    pub member: &'a [u8],
}

pub fn parse_data_key(buf: &[u8]) -> Option<ParsedDataKey<'_>> {
    let key_len = get_u32_le(buf)? as usize;
    let mut off = 4;
    if buf.len() < off + key_len + 4 {
        return None;
    }
    let user_key = &buf[off..off + key_len];
    off += key_len;
    let version = get_i32_le(&buf[off..off + 4])?;
    off += 4;
    let member = &buf[off..];
    Some(ParsedDataKey {
        user_key,
        version,
        member,
    })
}

/// Builds a list data key: `u32 key_len | key | i32 version | u64 index`.
pub fn list_data_key(user_key: &[u8], version: i32, index: u64) -> KeyBuf {
    let mut buf = KeyBuf::with_capacity(16 + user_key.len());
    push_prefix(&mut buf, user_key, version);
    put_u64_le(&mut buf, index);
    buf
}

pub struct ParsedListDataKey<'a> {
    pub user_key: &'a [u8],
    pub version: i32,
    pub index: u64,
}

pub fn parse_list_data_key(buf: &[u8]) -> Option<ParsedListDataKey<'_>> {
    let key_len = get_u32_le(buf)? as usize;
    let mut off = 4;
    if buf.len() < off + key_len + 4 + 8 {
        return None;
    }
    let user_key = &buf[off..off + key_len];
    off += key_len;
    let version = get_i32_le(&buf[off..off + 4])?;
    off += 4;
    let index = get_u64_le(&buf[off..off + 8])?;
    Some(ParsedListDataKey {
        user_key,
        version,
        index,
    })
}

/// Builds a zset score key: `u32 key_len | key | i32 version | f64_bits score | member`.
pub fn zset_score_key(user_key: &[u8], version: i32, score: f64, member: &[u8]) -> KeyBuf {
    let mut buf = KeyBuf::with_capacity(16 + user_key.len() + member.len());
    push_prefix(&mut buf, user_key, version);
    put_f64_bits_le(&mut buf, score);
    buf.extend_from_slice(member);
    buf
}

/// Lower bound for a score-range scan: `(key_len|key|version|f64_bits score)`,
/// with no member suffix -- any member at that score sorts at or after it.
pub fn zset_score_key_bound(user_key: &[u8], version: i32, score: f64) -> KeyBuf {
    let mut buf = KeyBuf::with_capacity(16 + user_key.len());
    push_prefix(&mut buf, user_key, version);
    put_f64_bits_le(&mut buf, score);
    buf
}

pub struct ParsedZsetScoreKey<'a> {
    pub user_key: &'a [u8],
    pub version: i32,
    pub score: f64,
    pub member: &'a [u8],
}

pub fn parse_zset_score_key(buf: &[u8]) -> Option<ParsedZsetScoreKey<'_>> {
    let key_len = get_u32_le(buf)? as usize;
    let mut off = 4;
    if buf.len() < off + key_len + 4 + 8 {
        return None;
    }
    let user_key = &buf[off..off + key_len];
    off += key_len;
    let version = get_i32_le(&buf[off..off + 4])?;
    off += 4;
    let score = get_f64_bits_le(&buf[off..off + 8])?;
    off += 8;
    let member = &buf[off..];
    Some(ParsedZsetScoreKey {
        user_key,
        version,
        score,
        member,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_key_roundtrip() {
        let k = data_key(b"myhash", 7, b"field1");
        let parsed = parse_data_key(&k).unwrap();
        assert_eq!(parsed.user_key, b"myhash");
        assert_eq!(parsed.version, 7);
        assert_eq!(parsed.member, b"field1");
    }

    #[test]
    fn list_data_key_roundtrip() {
        let k = list_data_key(b"mylist", -3, 0x8000_0001);
        let parsed = parse_list_data_key(&k).unwrap();
        assert_eq!(parsed.user_key, b"mylist");
        assert_eq!(parsed.version, -3);
        assert_eq!(parsed.index, 0x8000_0001);
    }

    #[test]
    fn zset_score_key_roundtrip() {
        let k = zset_score_key(b"z", 1, -100.000000002, b"m4");
        let parsed = parse_zset_score_key(&k).unwrap();
        assert_eq!(parsed.user_key, b"z");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.score, -100.000000002);
        assert_eq!(parsed.member, b"m4");
    }

    #[test]
    fn key_prefix_is_shared_across_versions() {
        let prefix = key_prefix(b"k");
        let v1 = data_key(b"k", 1, b"m");
        let v2 = data_key(b"k", 2, b"m");
        assert!(v1.starts_with(&prefix[..]));
        assert!(v2.starts_with(&prefix[..]));
    }

    #[test]
    fn data_key_prefix_is_a_scan_lower_bound() {
        let prefix = data_key_prefix(b"k", 2);
        let full = data_key(b"k", 2, b"member");
        assert!(full.starts_with(&prefix[..]));
    }
}
