// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Hash engine. Two column families: `default` (meta),
//! `data_cf` (field -> value, keyed by `key_len|key|version|field`).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch};

use super::{classify_meta, now_secs, open_type_db, EngineBase, KeyOps, MetaState, CF_DATA};
use crate::codec::key::{data_key, data_key_prefix, key_prefix, meta_key, parse_data_key};
use crate::codec::value::MetaValue;
use crate::engine::DataType;
use crate::error::{Error, Result};
use crate::filter::{new_db_cell, DataFilterFactory, MetaFilterFactory, RecordKind};

pub struct HashEngine {
    base: EngineBase,
}

fn next_version(old: i32) -> i32 {
    (old.saturating_add(1)).max(now_secs())
}

impl HashEngine {
    pub fn open(
        data_dir: &Path,
        create_if_missing: bool,
        lock_timeout: Duration,
        small_compaction_threshold: u64,
    ) -> Result<HashEngine> {
        let db_cell = new_db_cell();
        let mut meta_opts = Options::default();
        meta_opts.set_compaction_filter_factory(MetaFilterFactory {
            data_type: DataType::Hash,
            is_list: false,
        });
        let mut data_opts = Options::default();
        data_opts.set_compaction_filter_factory(DataFilterFactory {
            db_cell: db_cell.clone(),
            data_type: DataType::Hash,
            kind: RecordKind::MemberOrField,
            is_list: false,
        });
        let data_cf = ColumnFamilyDescriptor::new(CF_DATA, data_opts);
        let db = open_type_db(data_dir, "hashes", create_if_missing, meta_opts, vec![data_cf])?;
        let base = EngineBase::new(db, lock_timeout, small_compaction_threshold);
        *db_cell.lock() = Some(base.db.clone());
        Ok(HashEngine { base })
    }

    fn data_cf(&self) -> &rocksdb::ColumnFamily {
        self.base.db.cf_handle(CF_DATA).expect("data_cf registered at open")
    }

    /// Reads the live meta, or `None` for absent/stale (spec's stale-on-read
    /// policy -- no cleanup write here; that is the compaction filter's job).
    fn live_meta(&self, key: &[u8]) -> Result<Option<MetaValue>> {
        let snap = self.base.db.snapshot();
        self.live_meta_at(&snap, key)
    }

    fn live_meta_at(&self, snap: &rocksdb::Snapshot<'_>, key: &[u8]) -> Result<Option<MetaValue>> {
        let now = now_secs();
        let raw = snap.get(meta_key(key))?;
        match classify_meta(raw, false, now)? {
            MetaState::Live(m) => Ok(Some(m)),
            MetaState::Absent | MetaState::Stale(_) => Ok(None),
        }
    }

    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        let mut meta = match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        };
        let dkey = data_key(key, meta.version, field);
        let is_new = self.base.db.get_cf(self.data_cf(), &dkey)?.is_none();
        if is_new {
            meta.count += 1;
        }
        let mut batch = WriteBatch::default();
        batch.put(meta_key(key), meta.encode());
        batch.put_cf(self.data_cf(), &dkey, value);
        self.base.db.write(batch)?;
        Ok(if is_new { 1 } else { 0 })
    }

    pub fn hsetnx(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        let _g = self.base.locks.acquire(key)?;
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        let mut meta = match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        };
        let dkey = data_key(key, meta.version, field);
        if self.base.db.get_cf(self.data_cf(), &dkey)?.is_some() {
            return Ok(false);
        }
        meta.count += 1;
        let mut batch = WriteBatch::default();
        batch.put(meta_key(key), meta.encode());
        batch.put_cf(self.data_cf(), &dkey, value);
        self.base.db.write(batch)?;
        Ok(true)
    }

    /// Deduplicates keeping the *last* occurrence of each field.
    pub fn hmset(&self, key: &[u8], fields: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        let _g = self.base.locks.acquire(key)?;
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        let mut meta = match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        };
        let mut deduped: HashMap<&[u8], &[u8]> = HashMap::new();
        for (f, v) in fields {
            deduped.insert(f.as_slice(), v.as_slice());
        }
        let mut batch = WriteBatch::default();
        for (f, v) in &deduped {
            let dkey = data_key(key, meta.version, f);
            if self.base.db.get_cf(self.data_cf(), &dkey)?.is_none() {
                meta.count += 1;
            }
            batch.put_cf(self.data_cf(), &dkey, v);
        }
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(())
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let dkey = data_key(key, meta.version, field);
        Ok(snap.get_cf(self.data_cf(), &dkey)?)
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        Ok(self.hget(key, field)?.is_some())
    }

    pub fn hstrlen(&self, key: &[u8], field: &[u8]) -> Result<i64> {
        Ok(self.hget(key, field)?.map(|v| v.len() as i64).unwrap_or(0))
    }

    fn iter_fields(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(Vec::new()),
            Some(m) => m,
        };
        let prefix = data_key_prefix(key, meta.version);
        let mut out = Vec::new();
        for item in snap.iterator_cf(self.data_cf(), IteratorMode::From(&prefix, Direction::Forward)) {
            let (k, v) = item?;
            if !k.starts_with(&prefix[..]) {
                break;
            }
            let parsed = parse_data_key(&k).ok_or_else(|| Error::corruption("malformed hash data key"))?;
            out.push((parsed.member.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    pub fn hgetall(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.iter_fields(key)
    }

    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self.iter_fields(key)?.into_iter().map(|(f, _)| f).collect())
    }

    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self.iter_fields(key)?.into_iter().map(|(_, v)| v).collect())
    }

    pub fn hlen(&self, key: &[u8]) -> Result<i64> {
        Ok(self.live_meta(key)?.map(|m| m.count as i64).unwrap_or(0))
    }

    pub fn hincrby(&self, key: &[u8], field: &[u8], by: i64) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        let mut meta = match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        };
        let dkey = data_key(key, meta.version, field);
        let existing = self.base.db.get_cf(self.data_cf(), &dkey)?;
        let current = match &existing {
            None => 0,
            Some(v) => std::str::from_utf8(v)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| Error::invalid_argument("hash field value is not an integer"))?,
        };
        let result = current
            .checked_add(by)
            .ok_or_else(|| Error::invalid_argument("increment would overflow i64"))?;
        if existing.is_none() {
            meta.count += 1;
        }
        let mut batch = WriteBatch::default();
        batch.put(meta_key(key), meta.encode());
        batch.put_cf(self.data_cf(), &dkey, result.to_string().as_bytes());
        self.base.db.write(batch)?;
        Ok(result)
    }

    /// Removes the requested fields, adjusting `count`. If `count` reaches
    /// zero the meta is *not* eagerly deleted -- the
    /// compaction filter reclaims it once `version < now`.
    pub fn hdel(&self, key: &[u8], fields: &[Vec<u8>]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(0),
            Some(m) => m,
        };
        let mut batch = WriteBatch::default();
        let mut removed = 0i64;
        for f in fields {
            let dkey = data_key(key, meta.version, f);
            if self.base.db.get_cf(self.data_cf(), &dkey)?.is_some() {
                batch.delete_cf(self.data_cf(), &dkey);
                removed += 1;
            }
        }
        if removed > 0 {
            meta.count -= removed as i32;
            batch.put(meta_key(key), meta.encode());
            self.base.db.write(batch)?;
        }
        Ok(removed)
    }
}

impl KeyOps for HashEngine {
    fn data_type(&self) -> DataType {
        DataType::Hash
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
        let bumped = MetaValue::new(0, next_version(meta.version), 0);
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
            if let Some(meta) = MetaValue::decode(&v, false) {
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
            if let Some(meta) = MetaValue::decode(&v, false) {
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

    fn open() -> (TempDir, HashEngine) {
        let dir = TempDir::new().unwrap();
        let engine = HashEngine::open(dir.path(), true, Duration::from_millis(500), 5000).unwrap();
        (dir, engine)
    }

    #[test]
    fn hset_returns_whether_field_was_new() {
        let (_d, e) = open();
        assert_eq!(e.hset(b"k", b"f1", b"v1").unwrap(), 1);
        assert_eq!(e.hset(b"k", b"f1", b"v2").unwrap(), 0);
        assert_eq!(e.hget(b"k", b"f1").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(e.hlen(b"k").unwrap(), 1);
    }

    #[test]
    fn hdel_does_not_eagerly_drop_meta() {
        let (_d, e) = open();
        e.hset(b"k", b"f1", b"v1").unwrap();
        assert_eq!(e.hdel(b"k", &[b"f1".to_vec()]).unwrap(), 1);
        assert_eq!(e.hlen(b"k").unwrap(), 0);
        assert_eq!(e.hget(b"k", b"f1").unwrap(), None);
    }

    #[test]
    fn hmset_dedupes_keeping_last() {
        let (_d, e) = open();
        e.hmset(
            b"k",
            &[(b"f".to_vec(), b"a".to_vec()), (b"f".to_vec(), b"b".to_vec())],
        )
        .unwrap();
        assert_eq!(e.hget(b"k", b"f").unwrap(), Some(b"b".to_vec()));
        assert_eq!(e.hlen(b"k").unwrap(), 1);
    }

    #[test]
    fn hincrby_rejects_non_integer_payload() {
        let (_d, e) = open();
        e.hset(b"k", b"f", b"not-a-number").unwrap();
        assert!(e.hincrby(b"k", b"f", 1).is_err());
    }

    #[test]
    fn hsetnx_only_inserts_when_absent() {
        let (_d, e) = open();
        assert!(e.hsetnx(b"k", b"f", b"v1").unwrap());
        assert!(!e.hsetnx(b"k", b"f", b"v2").unwrap());
        assert_eq!(e.hget(b"k", b"f").unwrap(), Some(b"v1".to_vec()));
    }
}
