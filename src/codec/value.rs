// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Value codecs for string values, meta records and zset data records.

use super::{get_f64_bits_le, get_i32_le, put_f64_bits_le, put_i32_le, KeyBuf};

/// `string value: user_bytes | i32 expire_ts`.
pub fn encode_string_value(user_value: &[u8], expire_ts: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(user_value.len() + 4);
    buf.extend_from_slice(user_value);
    buf.extend_from_slice(&expire_ts.to_le_bytes());
    buf
}

pub struct ParsedStringValue<'a> {
    pub user_value: &'a [u8],
    pub expire_ts: i32,
}

pub fn parse_string_value(buf: &[u8]) -> Option<ParsedStringValue<'_>> {
    if buf.len() < 4 {
        return None;
    }
    let split = buf.len() - 4;
    let expire_ts = get_i32_le(&buf[split..])?;
    Some(ParsedStringValue {
        user_value: &buf[..split],
        expire_ts,
    })
}

/// `zset/hash data: payload bytes` -- hash carries the raw field value, zset
/// carries the score's raw bit pattern.
pub fn encode_zset_data_value(score: f64) -> [u8; 8] {
    score.to_bits().to_le_bytes()
}

pub fn parse_zset_data_value(buf: &[u8]) -> Option<f64> {
    get_f64_bits_le(buf)
}

/// List-only bounds appended to the meta value. Stored as raw little-endian
/// `u32` (not `i32`): `right_idx`'s initial value `2^31` does not fit in a
/// signed 32-bit integer, matching the unsigned index space the list
/// comparator orders over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListBounds {
    pub left_idx: u32,
    pub right_idx: u32,
}

impl Default for ListBounds {
    fn default() -> ListBounds {
        ListBounds {
            left_idx: i32::MAX as u32,       // 2^31 - 1
            right_idx: (i32::MAX as u32) + 1, // 2^31
        }
    }
}

impl ListBounds {
    pub fn is_empty(&self) -> bool {
        self.right_idx - self.left_idx == 1
    }

    pub fn len(&self) -> u64 {
        (self.right_idx as u64) - (self.left_idx as u64) - 1
    }
}

/// `meta value: i32 count | i32 version | i32 expire_ts [ list only: u32 left_idx | u32 right_idx ]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaValue {
    pub count: i32,
    pub version: i32,
    pub expire_ts: i32,
    pub list_bounds: Option<ListBounds>,
}

impl MetaValue {
    pub fn new(count: i32, version: i32, expire_ts: i32) -> MetaValue {
        MetaValue {
            count,
            version,
            expire_ts,
            list_bounds: None,
        }
    }

    pub fn new_list(count: i32, version: i32, expire_ts: i32, bounds: ListBounds) -> MetaValue {
        MetaValue {
            count,
            version,
            expire_ts,
            list_bounds: Some(bounds),
        }
    }

    pub fn is_stale(&self, now: i32) -> bool {
        (self.expire_ts != 0 && self.expire_ts < now) || self.count == 0
    }

    pub fn encode(&self) -> KeyBuf {
        let mut buf = KeyBuf::new();
        put_i32_le(&mut buf, self.count);
        put_i32_le(&mut buf, self.version);
        put_i32_le(&mut buf, self.expire_ts);
        if let Some(b) = self.list_bounds {
            buf.extend_from_slice(&b.left_idx.to_le_bytes());
            buf.extend_from_slice(&b.right_idx.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8], is_list: bool) -> Option<MetaValue> {
        let expected = if is_list { 20 } else { 12 };
        if buf.len() != expected {
            return None;
        }
        let count = get_i32_le(&buf[0..4])?;
        let version = get_i32_le(&buf[4..8])?;
        let expire_ts = get_i32_le(&buf[8..12])?;
        let list_bounds = if is_list {
            let mut l = [0u8; 4];
            l.copy_from_slice(&buf[12..16]);
            let mut r = [0u8; 4];
            r.copy_from_slice(&buf[16..20]);
            Some(ListBounds {
                left_idx: u32::from_le_bytes(l),
                right_idx: u32::from_le_bytes(r),
            })
        } else {
            None
        };
        Some(MetaValue {
            count,
            version,
            expire_ts,
            list_bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_value_roundtrip() {
        let v = encode_string_value(b"hello", 42);
        let parsed = parse_string_value(&v).unwrap();
        assert_eq!(parsed.user_value, b"hello");
        assert_eq!(parsed.expire_ts, 42);
    }

    #[test]
    fn meta_value_roundtrip_non_list() {
        let meta = MetaValue::new(3, 100, 0);
        let encoded = meta.encode();
        let decoded = MetaValue::decode(&encoded, false).unwrap();
        assert_eq!(meta, decoded);
    }

    #[test]
    fn meta_value_roundtrip_list() {
        let meta = MetaValue::new_list(3, 100, 0, ListBounds::default());
        let encoded = meta.encode();
        let decoded = MetaValue::decode(&encoded, true).unwrap();
        assert_eq!(meta, decoded);
        assert!(decoded.list_bounds.unwrap().is_empty());
    }

    #[test]
    fn list_bounds_length_tracks_pushes() {
        let mut b = ListBounds::default();
        assert!(b.is_empty());
        b.left_idx -= 1;
        b.right_idx += 1;
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn stale_detection() {
        let expired = MetaValue::new(1, 100, 50);
        assert!(expired.is_stale(60));
        assert!(!expired.is_stale(10));
        let empty = MetaValue::new(0, 100, 0);
        assert!(empty.is_stale(10));
    }
}
