// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! List engine. Two column families: `default` (meta),
//! `data_cf` (index -> element), the latter ordered by the list comparator
//! so that `LRange` is a contiguous seek rather than a point-lookup loop.

use std::path::Path;
use std::time::Duration;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch};

use super::{classify_meta, now_secs, open_type_db, EngineBase, KeyOps, MetaState, CF_DATA};
use crate::comparator::{compare_list_data_keys, LIST_DATA_COMPARATOR_NAME};
use crate::codec::key::{data_key_prefix, key_prefix, list_data_key, meta_key, parse_list_data_key};
use crate::codec::value::{ListBounds, MetaValue};
use crate::engine::DataType;
use crate::error::{Error, Result};
use crate::filter::{new_db_cell, DataFilterFactory, MetaFilterFactory, RecordKind};

pub struct ListEngine {
    base: EngineBase,
}

fn next_version(old: i32) -> i32 {
    (old.saturating_add(1)).max(now_secs())
}

impl ListEngine {
    pub fn open(
        data_dir: &Path,
        create_if_missing: bool,
        lock_timeout: Duration,
        small_compaction_threshold: u64,
    ) -> Result<ListEngine> {
        let db_cell = new_db_cell();
        let mut meta_opts = Options::default();
        meta_opts.set_compaction_filter_factory(MetaFilterFactory {
            data_type: DataType::List,
            is_list: true,
        });
        let mut data_opts = Options::default();
        data_opts.set_comparator(LIST_DATA_COMPARATOR_NAME, compare_list_data_keys);
        data_opts.set_compaction_filter_factory(DataFilterFactory {
            db_cell: db_cell.clone(),
            data_type: DataType::List,
            kind: RecordKind::ListIndex,
            is_list: true,
        });
        let data_cf = ColumnFamilyDescriptor::new(CF_DATA, data_opts);
        let db = open_type_db(data_dir, "lists", create_if_missing, meta_opts, vec![data_cf])?;
        let base = EngineBase::new(db, lock_timeout, small_compaction_threshold);
        *db_cell.lock() = Some(base.db.clone());
        Ok(ListEngine { base })
    }

    fn data_cf(&self) -> &rocksdb::ColumnFamily {
        self.base.db.cf_handle(CF_DATA).expect("data_cf registered at open")
    }

    fn live_meta(&self, key: &[u8]) -> Result<Option<MetaValue>> {
        let snap = self.base.db.snapshot();
        self.live_meta_at(&snap, key)
    }

    fn live_meta_at(&self, snap: &rocksdb::Snapshot<'_>, key: &[u8]) -> Result<Option<MetaValue>> {
        let now = now_secs();
        let raw = snap.get(meta_key(key))?;
        match classify_meta(raw, true, now)? {
            MetaState::Live(m) => Ok(Some(m)),
            MetaState::Absent | MetaState::Stale(_) => Ok(None),
        }
    }

    fn live_or_fresh_meta(&self, key: &[u8]) -> Result<MetaValue> {
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        Ok(match classify_meta(raw, true, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new_list(0, next_version(0), 0, ListBounds::default()),
            MetaState::Stale(m) => MetaValue::new_list(0, next_version(m.version), 0, ListBounds::default()),
        })
    }

    /// Ascending scan of every live element, in list order.
    fn full_list(&self, key: &[u8], meta: &MetaValue) -> Result<Vec<Vec<u8>>> {
        let prefix = data_key_prefix(key, meta.version);
        let mut out = Vec::new();
        for item in self
            .base
            .db
            .iterator_cf(self.data_cf(), IteratorMode::From(&prefix, Direction::Forward))
        {
            let (k, v) = item?;
            if !k.starts_with(&prefix[..]) {
                break;
            }
            let _ = parse_list_data_key(&k).ok_or_else(|| Error::corruption("malformed list data key"))?;
            out.push(v.to_vec());
        }
        Ok(out)
    }

    /// Deletes the live element range and rewrites `elements` contiguously
    /// starting at `left_idx + 1`, updating bounds/count in place. Used by
    /// the middle-mutating ops (`LInsert`, `LTrim`, `LRem`) that cannot
    /// preserve index contiguity with a point edit.
    fn rewrite(&self, key: &[u8], meta: &mut MetaValue, elements: &[Vec<u8>]) -> Result<()> {
        let bounds = meta.list_bounds.unwrap_or_default();
        let mut batch = WriteBatch::default();
        let prefix = data_key_prefix(key, meta.version);
        for item in self
            .base
            .db
            .iterator_cf(self.data_cf(), IteratorMode::From(&prefix, Direction::Forward))
        {
            let (k, _) = item?;
            if !k.starts_with(&prefix[..]) {
                break;
            }
            batch.delete_cf(self.data_cf(), &k);
        }
        let left = bounds.left_idx as u64;
        for (i, e) in elements.iter().enumerate() {
            let idx = left + 1 + i as u64;
            batch.put_cf(self.data_cf(), list_data_key(key, meta.version, idx), e);
        }
        meta.count = elements.len() as i32;
        meta.list_bounds = Some(ListBounds {
            left_idx: bounds.left_idx,
            right_idx: bounds.left_idx + 1 + elements.len() as u32,
        });
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(())
    }

    pub fn lpush(&self, key: &[u8], values: &[Vec<u8>]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = self.live_or_fresh_meta(key)?;
        let mut bounds = meta.list_bounds.unwrap_or_default();
        let version = meta.version;
        let mut batch = WriteBatch::default();
        for v in values {
            bounds.left_idx -= 1;
            batch.put_cf(self.data_cf(), list_data_key(key, version, bounds.left_idx as u64), v);
        }
        meta.count += values.len() as i32;
        meta.list_bounds = Some(bounds);
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(meta.count as i64)
    }

    pub fn rpush(&self, key: &[u8], values: &[Vec<u8>]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = self.live_or_fresh_meta(key)?;
        let mut bounds = meta.list_bounds.unwrap_or_default();
        let version = meta.version;
        let mut batch = WriteBatch::default();
        for v in values {
            let idx = bounds.right_idx;
            batch.put_cf(self.data_cf(), list_data_key(key, version, idx as u64), v);
            bounds.right_idx += 1;
        }
        meta.count += values.len() as i32;
        meta.list_bounds = Some(bounds);
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(meta.count as i64)
    }

    pub fn llen(&self, key: &[u8]) -> Result<i64> {
        Ok(self.live_meta(key)?.map(|m| m.count as i64).unwrap_or(0))
    }

    pub fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let len = meta.count as i64;
        let logical = if index < 0 { index + len } else { index };
        if logical < 0 || logical >= len {
            return Ok(None);
        }
        let bounds = meta.list_bounds.unwrap_or_default();
        let real_idx = bounds.left_idx as u64 + 1 + logical as u64;
        let dkey = list_data_key(key, meta.version, real_idx);
        Ok(snap.get_cf(self.data_cf(), &dkey)?)
    }

    pub fn lset(&self, key: &[u8], index: i64, value: &[u8]) -> Result<()> {
        let _g = self.base.locks.acquire(key)?;
        let meta = match self.live_meta(key)? {
            None => return Err(Error::not_found()),
            Some(m) => m,
        };
        let len = meta.count as i64;
        let logical = if index < 0 { index + len } else { index };
        if logical < 0 || logical >= len {
            return Err(Error::invalid_argument("index out of range"));
        }
        let bounds = meta.list_bounds.unwrap_or_default();
        let real_idx = bounds.left_idx as u64 + 1 + logical as u64;
        let dkey = list_data_key(key, meta.version, real_idx);
        self.base.db.put_cf(self.data_cf(), &dkey, value)?;
        Ok(())
    }

    /// Translates signed `(start, stop)` into a clamped logical `[s, e]`
    /// range over a list of length `len`; returns `s > e` for empty.
    fn translate_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
        let norm = |v: i64| if v < 0 { (len + v).max(0) } else { v };
        let s = norm(start).max(0);
        let e = norm(stop).min(len - 1);
        (s, e)
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(Vec::new()),
            Some(m) => m,
        };
        let len = meta.count as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let (s, e) = Self::translate_range(start, stop, len);
        if s > e {
            return Ok(Vec::new());
        }
        let bounds = meta.list_bounds.unwrap_or_default();
        let mut out = Vec::with_capacity((e - s + 1) as usize);
        for logical in s..=e {
            let real_idx = bounds.left_idx as u64 + 1 + logical as u64;
            let dkey = list_data_key(key, meta.version, real_idx);
            if let Some(v) = snap.get_cf(self.data_cf(), &dkey)? {
                out.push(v);
            }
        }
        Ok(out)
    }

    pub fn ltrim(&self, key: &[u8], start: i64, stop: i64) -> Result<()> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(()),
            Some(m) => m,
        };
        let len = meta.count as i64;
        let (s, e) = Self::translate_range(start, stop, len);
        let elements = if s > e {
            Vec::new()
        } else {
            let all = self.full_list(key, &meta)?;
            all[s as usize..=e as usize].to_vec()
        };
        self.rewrite(key, &mut meta, &elements)
    }

    pub fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let mut bounds = meta.list_bounds.unwrap_or_default();
        if bounds.is_empty() {
            return Ok(None);
        }
        let head_idx = bounds.left_idx as u64 + 1;
        let dkey = list_data_key(key, meta.version, head_idx);
        let value = self.base.db.get_cf(self.data_cf(), &dkey)?;
        if value.is_none() {
            return Ok(None);
        }
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.data_cf(), &dkey);
        bounds.left_idx += 1;
        meta.count -= 1;
        meta.list_bounds = Some(bounds);
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(value)
    }

    pub fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let mut bounds = meta.list_bounds.unwrap_or_default();
        if bounds.is_empty() {
            return Ok(None);
        }
        let tail_idx = bounds.right_idx as u64 - 1;
        let dkey = list_data_key(key, meta.version, tail_idx);
        let value = self.base.db.get_cf(self.data_cf(), &dkey)?;
        if value.is_none() {
            return Ok(None);
        }
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.data_cf(), &dkey);
        bounds.right_idx -= 1;
        meta.count -= 1;
        meta.list_bounds = Some(bounds);
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(value)
    }

    /// Inserts `value` immediately before/after the first occurrence of
    /// `pivot`. Returns the new length, or `-1` if the pivot is not found.
    pub fn linsert(&self, key: &[u8], before: bool, pivot: &[u8], value: &[u8]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(-1),
            Some(m) => m,
        };
        let all = self.full_list(key, &meta)?;
        let pos = match all.iter().position(|e| e == pivot) {
            None => return Ok(-1),
            Some(p) => p,
        };
        let insert_at = if before { pos } else { pos + 1 };
        let mut elements = all;
        elements.insert(insert_at, value.to_vec());
        self.rewrite(key, &mut meta, &elements)?;
        Ok(meta.count as i64)
    }

    /// `count > 0`: delete from head, up to `count` matches. `count < 0`:
    /// from tail. `count == 0`: delete all matches.
    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(0),
            Some(m) => m,
        };
        let all = self.full_list(key, &meta)?;
        let mut removed = 0i64;
        let kept: Vec<Vec<u8>> = if count == 0 {
            all.into_iter()
                .filter(|e| {
                    if e == value {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                })
                .collect()
        } else if count > 0 {
            let mut budget = count;
            all.into_iter()
                .filter(|e| {
                    if budget > 0 && e == value {
                        budget -= 1;
                        removed += 1;
                        false
                    } else {
                        true
                    }
                })
                .collect()
        } else {
            let mut budget = -count;
            let mut rev: Vec<Vec<u8>> = all.into_iter().rev().collect();
            rev.retain(|e| {
                if budget > 0 && e == value {
                    budget -= 1;
                    removed += 1;
                    false
                } else {
                    true
                }
            });
            rev.into_iter().rev().collect()
        };
        if removed > 0 {
            self.rewrite(key, &mut meta, &kept)?;
        }
        Ok(removed)
    }
}

impl KeyOps for ListEngine {
    fn data_type(&self) -> DataType {
        DataType::List
    }

    fn expire(&self, key: &[u8], ttl: i32) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        if ttl <= 0 {
            return self.delete(key);
        }
        let mut meta = match self.live_meta(key)? {
            None => return Ok(false),
            Some(m) => m,
        };
        meta.expire_ts = now_secs().saturating_add(ttl);
        self.base.db.put(meta_key(key), meta.encode())?;
        Ok(true)
    }

    fn expire_at(&self, key: &[u8], at: i32) -> Result<bool> {
        let now = now_secs();
        self.expire(key, (at - now).max(0))
    }

    fn persist(&self, key: &[u8]) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(false),
            Some(m) => m,
        };
        meta.expire_ts = 0;
        self.base.db.put(meta_key(key), meta.encode())?;
        Ok(true)
    }

    fn ttl(&self, key: &[u8]) -> Result<i64> {
        let now = now_secs();
        match self.live_meta(key)? {
            None => Ok(-2),
            Some(m) if m.expire_ts == 0 => Ok(-1),
            Some(m) => Ok((m.expire_ts - now) as i64),
        }
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        let meta = match self.live_meta(key)? {
            None => return Ok(false),
            Some(m) => m,
        };
        let bumped = MetaValue::new_list(0, next_version(meta.version), 0, ListBounds::default());
        self.base.db.put(meta_key(key), bumped.encode())?;
        Ok(true)
    }

    fn scan(&self, start: &[u8], pattern: &str, count: usize) -> Result<(Vec<Vec<u8>>, Vec<u8>, bool)> {
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
            if let Some(meta) = MetaValue::decode(&v, true) {
                if !meta.is_stale(now) && super::glob_match(pattern, &k) {
                    out.push(k.to_vec());
                }
            }
        }
        Ok((out, next_start, done))
    }

    fn compact_range(&self) -> Result<()> {
        self.base.db.compact_range::<&[u8], &[u8]>(None, None);
        self.base
            .db
            .compact_range_cf::<&[u8], &[u8]>(self.data_cf(), None, None);
        Ok(())
    }

    fn compact_key(&self, key: &[u8]) -> Result<()> {
        let prefix = key_prefix(key);
        self.base.db.compact_range(Some(&prefix[..]), None::<&[u8]>);
        self.base
            .db
            .compact_range_cf(self.data_cf(), Some(&prefix[..]), None::<&[u8]>);
        Ok(())
    }

    fn scan_key_num(&self) -> Result<u64> {
        let now = now_secs();
        let mut n = 0u64;
        for item in self.base.db.iterator(IteratorMode::Start) {
            let (_, v) = item?;
            if let Some(meta) = MetaValue::decode(&v, true) {
                if !meta.is_stale(now) {
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

    fn open() -> (TempDir, ListEngine) {
        let dir = TempDir::new().unwrap();
        let engine = ListEngine::open(dir.path(), true, Duration::from_millis(500), 5000).unwrap();
        (dir, engine)
    }

    fn vv(items: &[&str]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn rpush_and_lrange_roundtrip() {
        let (_d, e) = open();
        e.rpush(b"L", &vv(&["a", "b", "c", "d"])).unwrap();
        assert_eq!(e.lrange(b"L", 0, -1).unwrap(), vv(&["a", "b", "c", "d"]));
        assert_eq!(e.lpop(b"L").unwrap(), Some(b"a".to_vec()));
        assert_eq!(e.lrange(b"L", -100, 100).unwrap(), vv(&["b", "c", "d"]));
    }

    #[test]
    fn lpush_reverses_supplied_order() {
        let (_d, e) = open();
        e.lpush(b"L", &vv(&["a", "b", "c"])).unwrap();
        assert_eq!(e.lrange(b"L", 0, -1).unwrap(), vv(&["c", "b", "a"]));
    }

    #[test]
    fn lrem_positive_negative_and_zero() {
        let (_d, e) = open();
        e.rpush(b"L", &vv(&["a", "b", "a", "c", "a"])).unwrap();
        assert_eq!(e.lrem(b"L", 2, b"a").unwrap(), 2);
        assert_eq!(e.lrange(b"L", 0, -1).unwrap(), vv(&["b", "c", "a"]));
    }

    #[test]
    fn linsert_before_and_after() {
        let (_d, e) = open();
        e.rpush(b"L", &vv(&["a", "c"])).unwrap();
        assert_eq!(e.linsert(b"L", true, b"c", b"b").unwrap(), 3);
        assert_eq!(e.lrange(b"L", 0, -1).unwrap(), vv(&["a", "b", "c"]));
    }

    #[test]
    fn ltrim_shrinks_to_range() {
        let (_d, e) = open();
        e.rpush(b"L", &vv(&["a", "b", "c", "d"])).unwrap();
        e.ltrim(b"L", 1, 2).unwrap();
        assert_eq!(e.lrange(b"L", 0, -1).unwrap(), vv(&["b", "c"]));
    }

    #[test]
    fn lset_overwrites_by_index() {
        let (_d, e) = open();
        e.rpush(b"L", &vv(&["a", "b", "c"])).unwrap();
        e.lset(b"L", -1, b"z").unwrap();
        assert_eq!(e.lrange(b"L", 0, -1).unwrap(), vv(&["a", "b", "z"]));
    }
}
