// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! String engine. Single column family: no meta/data split
//! is needed because a string has no element collection to version --
//! the value record itself carries the trailing expire timestamp.

use std::path::Path;
use std::time::Duration;

use rocksdb::{Options, WriteBatch};

use super::{now_secs, open_type_db, EngineBase, KeyOps};
use crate::codec::value::{encode_string_value, parse_string_value};
use crate::engine::DataType;
use crate::error::{Error, Result};

const MAX_SETRANGE_END: i64 = 1 << 29;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

pub struct StringEngine {
    base: EngineBase,
}

impl StringEngine {
    pub fn open(data_dir: &Path, create_if_missing: bool, lock_timeout: Duration) -> Result<StringEngine> {
        let db = open_type_db(data_dir, "strings", create_if_missing, Options::default(), vec![])?;
        Ok(StringEngine {
            base: EngineBase::new(db, lock_timeout, 0),
        })
    }

    /// Reads the live value, or `None` if absent or expired. Never takes a
    /// lock: a snapshot read may run concurrently with writers.
    fn read_live(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let now = now_secs();
        let snap = self.base.db.snapshot();
        match snap.get(key)? {
            None => Ok(None),
            Some(raw) => {
                let parsed = parse_string_value(&raw)
                    .ok_or_else(|| Error::corruption("malformed string value"))?;
                if parsed.expire_ts != 0 && parsed.expire_ts < now {
                    Ok(None)
                } else {
                    Ok(Some(parsed.user_value.to_vec()))
                }
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.read_live(key)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _g = self.base.locks.acquire(key)?;
        self.base.db.put(key, encode_string_value(value, 0))?;
        Ok(())
    }

    pub fn set_ex(&self, key: &[u8], value: &[u8], ttl: i64) -> Result<()> {
        if ttl <= 0 {
            return Err(Error::invalid_argument("SETEX requires a positive ttl"));
        }
        let _g = self.base.locks.acquire(key)?;
        let expire_ts = now_secs().saturating_add(ttl as i32);
        self.base.db.put(key, encode_string_value(value, expire_ts))?;
        Ok(())
    }

    pub fn getset(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>> {
        let _g = self.base.locks.acquire(key)?;
        let old = self.read_live(key)?;
        self.base.db.put(key, encode_string_value(value, 0))?;
        Ok(old)
    }

    pub fn append(&self, key: &[u8], value: &[u8]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut buf = self.read_live(key)?.unwrap_or_default();
        buf.extend_from_slice(value);
        let len = buf.len() as i64;
        self.base.db.put(key, encode_string_value(&buf, 0))?;
        Ok(len)
    }

    pub fn strlen(&self, key: &[u8]) -> Result<i64> {
        Ok(self.read_live(key)?.map(|v| v.len() as i64).unwrap_or(0))
    }

    /// Redis-style `GETRANGE`: negative offsets count from the end, results
    /// are clamped into range, out-of-range yields an empty slice.
    pub fn get_range(&self, key: &[u8], start: i64, end: i64) -> Result<Vec<u8>> {
        let buf = self.read_live(key)?.unwrap_or_default();
        let len = buf.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let (s, e) = normalize_range(start, end, len);
        if s > e {
            return Ok(Vec::new());
        }
        Ok(buf[s as usize..=e as usize].to_vec())
    }

    pub fn set_range(&self, key: &[u8], offset: i64, value: &[u8]) -> Result<i64> {
        if offset < 0 {
            return Err(Error::invalid_argument("SETRANGE offset must be non-negative"));
        }
        if offset.saturating_add(value.len() as i64) > MAX_SETRANGE_END {
            return Err(Error::invalid_argument("SETRANGE result would exceed the size limit"));
        }
        let _g = self.base.locks.acquire(key)?;
        let mut buf = self.read_live(key)?.unwrap_or_default();
        let needed = offset as usize + value.len();
        if buf.len() < needed {
            buf.resize(needed, 0);
        }
        buf[offset as usize..offset as usize + value.len()].copy_from_slice(value);
        let len = buf.len() as i64;
        self.base.db.put(key, encode_string_value(&buf, 0))?;
        Ok(len)
    }

    pub fn incrby(&self, key: &[u8], by: i64) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let current = self.parse_integer(key)?;
        let result = current
            .checked_add(by)
            .ok_or_else(|| Error::invalid_argument("increment would overflow i64"))?;
        self.base.db.put(key, encode_string_value(result.to_string().as_bytes(), 0))?;
        Ok(result)
    }

    pub fn decrby(&self, key: &[u8], by: i64) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let current = self.parse_integer(key)?;
        let result = current
            .checked_sub(by)
            .ok_or_else(|| Error::invalid_argument("decrement would overflow i64"))?;
        self.base.db.put(key, encode_string_value(result.to_string().as_bytes(), 0))?;
        Ok(result)
    }

    pub fn incrby_float(&self, key: &[u8], by: f64) -> Result<f64> {
        if by.is_nan() {
            return Err(Error::invalid_argument("increment must not be NaN"));
        }
        let _g = self.base.locks.acquire(key)?;
        let raw = self.read_live(key)?;
        let current = match raw {
            None => 0.0,
            Some(v) => std::str::from_utf8(&v)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| Error::invalid_argument("value is not a valid float"))?,
        };
        let result = current + by;
        if result.is_nan() || result.is_infinite() {
            return Err(Error::invalid_argument("increment would produce a non-finite result"));
        }
        self.base.db.put(key, encode_string_value(result.to_string().as_bytes(), 0))?;
        Ok(result)
    }

    fn parse_integer(&self, key: &[u8]) -> Result<i64> {
        match self.read_live(key)? {
            None => Ok(0),
            Some(v) => std::str::from_utf8(&v)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| Error::invalid_argument("value is not an integer")),
        }
    }

    pub fn bitcount(&self, key: &[u8], range: Option<(i64, i64)>) -> Result<i64> {
        let buf = self.read_live(key)?.unwrap_or_default();
        let slice = match range {
            None => &buf[..],
            Some((start, end)) => {
                if buf.is_empty() {
                    &buf[..]
                } else {
                    let (s, e) = normalize_range(start, end, buf.len() as i64);
                    if s > e {
                        &buf[0..0]
                    } else {
                        &buf[s as usize..=e as usize]
                    }
                }
            }
        };
        Ok(slice.iter().map(|b| b.count_ones() as i64).sum())
    }

    pub fn bitpos(&self, key: &[u8], bit: bool, range: Option<(i64, i64)>) -> Result<i64> {
        let buf = self.read_live(key)?.unwrap_or_default();
        if buf.is_empty() {
            return Ok(if bit { -1 } else { 0 });
        }
        let (s, e) = match range {
            None => (0, buf.len() as i64 - 1),
            Some((start, end)) => normalize_range(start, end, buf.len() as i64),
        };
        if s > e {
            return Ok(-1);
        }
        for byte_idx in s..=e {
            let byte = buf[byte_idx as usize];
            for bit_idx in 0..8u32 {
                let set = (byte >> (7 - bit_idx)) & 1 == 1;
                if set == bit {
                    return Ok(byte_idx * 8 + bit_idx as i64);
                }
            }
        }
        Ok(-1)
    }

    pub fn bitop(&self, op: BitOp, dest: &[u8], sources: &[&[u8]]) -> Result<i64> {
        if op == BitOp::Not && sources.len() != 1 {
            return Err(Error::invalid_argument("BITOP NOT accepts exactly one source key"));
        }
        if sources.is_empty() {
            return Err(Error::invalid_argument("BITOP requires at least one source key"));
        }
        let mut keys: Vec<Vec<u8>> = sources.iter().map(|s| s.to_vec()).collect();
        keys.push(dest.to_vec());
        let _g = self.base.locks.acquire_all(&keys)?;

        let buffers: Vec<Vec<u8>> = sources
            .iter()
            .map(|k| self.read_live(k).map(|v| v.unwrap_or_default()))
            .collect::<Result<_>>()?;
        let max_len = buffers.iter().map(Vec::len).max().unwrap_or(0);

        let mut result = vec![0u8; max_len];
        match op {
            BitOp::Not => {
                for (i, b) in buffers[0].iter().enumerate() {
                    result[i] = !b;
                }
                for byte in result.iter_mut().skip(buffers[0].len()) {
                    *byte = 0xff;
                }
            }
            BitOp::And => {
                for byte in result.iter_mut() {
                    *byte = 0xff;
                }
                for buf in &buffers {
                    for i in 0..max_len {
                        let b = *buf.get(i).unwrap_or(&0);
                        result[i] &= b;
                    }
                }
            }
            BitOp::Or => {
                for buf in &buffers {
                    for i in 0..max_len {
                        let b = *buf.get(i).unwrap_or(&0);
                        result[i] |= b;
                    }
                }
            }
            BitOp::Xor => {
                for buf in &buffers {
                    for i in 0..max_len {
                        let b = *buf.get(i).unwrap_or(&0);
                        result[i] ^= b;
                    }
                }
            }
        }
        let len = result.len() as i64;
        self.base.db.put(dest, encode_string_value(&result, 0))?;
        Ok(len)
    }

    pub fn mset(&self, pairs: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        if pairs.is_empty() {
            return Err(Error::invalid_argument("MSET requires at least one pair"));
        }
        let keys: Vec<Vec<u8>> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let _g = self.base.locks.acquire_all(&keys)?;
        let mut batch = WriteBatch::default();
        for (k, v) in pairs {
            batch.put(k, encode_string_value(v, 0));
        }
        self.base.db.write(batch)?;
        Ok(())
    }

    pub fn msetnx(&self, pairs: &[(Vec<u8>, Vec<u8>)]) -> Result<bool> {
        if pairs.is_empty() {
            return Err(Error::invalid_argument("MSETNX requires at least one pair"));
        }
        let keys: Vec<Vec<u8>> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let _g = self.base.locks.acquire_all(&keys)?;
        for k in &keys {
            if self.read_live(k)?.is_some() {
                return Ok(false);
            }
        }
        let mut batch = WriteBatch::default();
        for (k, v) in pairs {
            batch.put(k, encode_string_value(v, 0));
        }
        self.base.db.write(batch)?;
        Ok(true)
    }
}

/// Translates Redis-style signed start/stop (negative = from end) into an
/// inclusive, clamped `[s, e]` pair over a buffer of length `len`. Returns
/// `s > e` for an empty result.
fn normalize_range(start: i64, end: i64, len: i64) -> (i64, i64) {
    let norm = |v: i64| -> i64 {
        if v < 0 {
            (len + v).max(0)
        } else {
            v
        }
    };
    let s = norm(start).min(len - 1).max(0);
    let e = norm(end).min(len - 1);
    (s, e)
}

impl KeyOps for StringEngine {
    fn data_type(&self) -> DataType {
        DataType::String
    }

    fn expire(&self, key: &[u8], ttl: i32) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        if ttl <= 0 {
            return self.delete(key);
        }
        match self.base.db.get(key)? {
            None => Ok(false),
            Some(raw) => {
                let parsed = parse_string_value(&raw)
                    .ok_or_else(|| Error::corruption("malformed string value"))?;
                let now = now_secs();
                if parsed.expire_ts != 0 && parsed.expire_ts < now {
                    return Ok(false);
                }
                let value = parsed.user_value.to_vec();
                let expire_ts = now.saturating_add(ttl);
                self.base.db.put(key, encode_string_value(&value, expire_ts))?;
                Ok(true)
            }
        }
    }

    fn expire_at(&self, key: &[u8], at: i32) -> Result<bool> {
        let now = now_secs();
        self.expire(key, (at - now).max(0))
    }

    fn persist(&self, key: &[u8]) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        match self.read_live(key)? {
            None => Ok(false),
            Some(v) => {
                self.base.db.put(key, encode_string_value(&v, 0))?;
                Ok(true)
            }
        }
    }

    fn ttl(&self, key: &[u8]) -> Result<i64> {
        let now = now_secs();
        match self.base.db.get(key)? {
            None => Ok(-2),
            Some(raw) => {
                let parsed = parse_string_value(&raw)
                    .ok_or_else(|| Error::corruption("malformed string value"))?;
                if parsed.expire_ts == 0 {
                    Ok(-1)
                } else if parsed.expire_ts < now {
                    Ok(-2)
                } else {
                    Ok((parsed.expire_ts - now) as i64)
                }
            }
        }
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        let existed = self.read_live(key)?.is_some();
        if existed {
            self.base.db.delete(key)?;
        }
        Ok(existed)
    }

    fn scan(&self, start: &[u8], pattern: &str, count: usize) -> Result<(Vec<Vec<u8>>, Vec<u8>, bool)> {
        use rocksdb::{Direction, IteratorMode};
        let now = now_secs();
        let mode = if start.is_empty() {
            IteratorMode::Start
        } else {
            IteratorMode::From(start, Direction::Forward)
        };
        let mut out = Vec::new();
        let mut next_start = Vec::new();
        let mut done = true;
        for item in self.base.db.iterator(mode) {
            let (k, v) = item?;
            if out.len() >= count {
                next_start = k.to_vec();
                done = false;
                break;
            }
            if let Some(parsed) = parse_string_value(&v) {
                if parsed.expire_ts == 0 || parsed.expire_ts >= now {
                    if super::glob_match(pattern, &k) {
                        out.push(k.to_vec());
                    }
                }
            }
        }
        Ok((out, next_start, done))
    }

    fn compact_range(&self) -> Result<()> {
        self.base.db.compact_range::<&[u8], &[u8]>(None, None);
        Ok(())
    }

    fn compact_key(&self, key: &[u8]) -> Result<()> {
        self.base.db.compact_range(Some(key), None::<&[u8]>);
        Ok(())
    }

    fn scan_key_num(&self) -> Result<u64> {
        let now = now_secs();
        let mut n = 0u64;
        for item in self.base.db.iterator(rocksdb::IteratorMode::Start) {
            let (_, v) = item?;
            if let Some(parsed) = parse_string_value(&v) {
                if parsed.expire_ts == 0 || parsed.expire_ts >= now {
                    n += 1;
                }
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, StringEngine) {
        let dir = TempDir::new().unwrap();
        let engine = StringEngine::open(dir.path(), true, Duration::from_millis(500)).unwrap();
        (dir, engine)
    }

    #[test]
    fn set_and_get() {
        let (_d, e) = open();
        e.set(b"k", b"hello world").unwrap();
        assert_eq!(e.get(b"k").unwrap(), Some(b"hello world".to_vec()));
    }

    #[test]
    fn setrange_pads_and_overwrites() {
        let (_d, e) = open();
        e.set(b"K", b"hello world").unwrap();
        let len = e.set_range(b"K", 6, b"REDIS").unwrap();
        assert_eq!(len, 11);
        assert_eq!(e.get(b"K").unwrap(), Some(b"hello REDIS".to_vec()));
    }

    #[test]
    fn incrby_and_decrby_reject_non_integers() {
        let (_d, e) = open();
        e.set(b"K", b"hello world").unwrap();
        assert!(e.decrby(b"K", 1).is_err());
        assert_eq!(e.incrby(b"N", 5).unwrap(), 5);
        assert_eq!(e.get(b"N").unwrap(), Some(b"5".to_vec()));
    }

    #[test]
    fn append_and_strlen() {
        let (_d, e) = open();
        assert_eq!(e.append(b"k", b"hi").unwrap(), 2);
        assert_eq!(e.append(b"k", b"!").unwrap(), 3);
        assert_eq!(e.strlen(b"k").unwrap(), 3);
    }

    #[test]
    fn bitop_and_or_xor_not() {
        let (_d, e) = open();
        e.set(b"a", &[0b1100_0000]).unwrap();
        e.set(b"b", &[0b1010_0000]).unwrap();
        e.bitop(BitOp::And, b"dest", &[b"a", b"b"]).unwrap();
        assert_eq!(e.get(b"dest").unwrap(), Some(vec![0b1000_0000]));
        e.bitop(BitOp::Or, b"dest", &[b"a", b"b"]).unwrap();
        assert_eq!(e.get(b"dest").unwrap(), Some(vec![0b1110_0000]));
        e.bitop(BitOp::Not, b"dest", &[b"a"]).unwrap();
        assert_eq!(e.get(b"dest").unwrap(), Some(vec![0b0011_1111]));
        assert!(e.bitop(BitOp::Not, b"dest", &[b"a", b"b"]).is_err());
    }

    #[test]
    fn expire_with_nonpositive_ttl_deletes() {
        let (_d, e) = open();
        e.set(b"k", b"v").unwrap();
        assert!(e.expire(b"k", 0).unwrap());
        assert_eq!(e.get(b"k").unwrap(), None);
    }

    #[test]
    fn ttl_reports_minus_two_for_missing_key() {
        let (_d, e) = open();
        assert_eq!(e.ttl(b"missing").unwrap(), -2);
    }

    #[test]
    fn msetnx_is_all_or_nothing() {
        let (_d, e) = open();
        e.set(b"a", b"1").unwrap();
        let pairs = vec![(b"a".to_vec(), b"2".to_vec()), (b"b".to_vec(), b"3".to_vec())];
        assert!(!e.msetnx(&pairs).unwrap());
        assert_eq!(e.get(b"b").unwrap(), None);
    }
}
