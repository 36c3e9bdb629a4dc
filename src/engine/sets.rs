// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Set engine. Two column families: `default` (meta),
//! `member_cf` (member -> empty, keyed by `key_len|key|version|member`).

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch};

use super::{classify_meta, now_secs, open_type_db, EngineBase, KeyOps, MetaState, CF_MEMBER};
use crate::codec::key::{data_key, data_key_prefix, key_prefix, meta_key, parse_data_key};
use crate::codec::value::MetaValue;
use crate::engine::DataType;
use crate::error::{Error, Result};
use crate::filter::{new_db_cell, DataFilterFactory, MetaFilterFactory, RecordKind};

pub struct SetEngine {
    base: EngineBase,
}

fn next_version(old: i32) -> i32 {
    (old.saturating_add(1)).max(now_secs())
}

impl SetEngine {
    pub fn open(
        data_dir: &Path,
        create_if_missing: bool,
        lock_timeout: Duration,
        small_compaction_threshold: u64,
    ) -> Result<SetEngine> {
        let db_cell = new_db_cell();
        let mut meta_opts = Options::default();
        meta_opts.set_compaction_filter_factory(MetaFilterFactory {
            data_type: DataType::Set,
            is_list: false,
        });
        let mut member_opts = Options::default();
        member_opts.set_compaction_filter_factory(DataFilterFactory {
            db_cell: db_cell.clone(),
            data_type: DataType::Set,
            kind: RecordKind::MemberOrField,
            is_list: false,
        });
        let member_cf = ColumnFamilyDescriptor::new(CF_MEMBER, member_opts);
        let db = open_type_db(data_dir, "sets", create_if_missing, meta_opts, vec![member_cf])?;
        let base = EngineBase::new(db, lock_timeout, small_compaction_threshold);
        *db_cell.lock() = Some(base.db.clone());
        Ok(SetEngine { base })
    }

    fn member_cf(&self) -> &rocksdb::ColumnFamily {
        self.base.db.cf_handle(CF_MEMBER).expect("member_cf registered at open")
    }

    /// Wires the background worker's task queue so `SPop` can enqueue a
    /// `compact-key` task once its access counter crosses the configured
    /// threshold.
    pub fn set_compaction_sender(&self, tx: crossbeam::channel::Sender<super::CompactionTask>) {
        self.base.set_compaction_sender(tx);
    }

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

    fn members_of(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let snap = self.base.db.snapshot();
        self.members_of_at(&snap, key)
    }

    /// Reads meta and members through one pinned snapshot so the two probes
    /// can't straddle a concurrent write.
    fn members_of_at(&self, snap: &rocksdb::Snapshot<'_>, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let meta = match self.live_meta_at(snap, key)? {
            None => return Ok(Vec::new()),
            Some(m) => m,
        };
        let prefix = data_key_prefix(key, meta.version);
        let mut out = Vec::new();
        for item in snap.iterator_cf(self.member_cf(), IteratorMode::From(&prefix, Direction::Forward)) {
            let (k, _) = item?;
            if !k.starts_with(&prefix[..]) {
                break;
            }
            let parsed = parse_data_key(&k).ok_or_else(|| Error::corruption("malformed set member key"))?;
            out.push(parsed.member.to_vec());
        }
        Ok(out)
    }

    pub fn sadd(&self, key: &[u8], members: &[Vec<u8>]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        let mut meta = match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        };
        let mut batch = WriteBatch::default();
        let mut added = 0i64;
        let mut seen = HashSet::new();
        for m in members {
            if !seen.insert(m.clone()) {
                continue;
            }
            let dkey = data_key(key, meta.version, m);
            if self.base.db.get_cf(self.member_cf(), &dkey)?.is_none() {
                batch.put_cf(self.member_cf(), &dkey, []);
                added += 1;
            }
        }
        if added > 0 {
            meta.count += added as i32;
            batch.put(meta_key(key), meta.encode());
            self.base.db.write(batch)?;
        }
        Ok(added)
    }

    pub fn srem(&self, key: &[u8], members: &[Vec<u8>]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(0),
            Some(m) => m,
        };
        let mut batch = WriteBatch::default();
        let mut removed = 0i64;
        for m in members {
            let dkey = data_key(key, meta.version, m);
            if self.base.db.get_cf(self.member_cf(), &dkey)?.is_some() {
                batch.delete_cf(self.member_cf(), &dkey);
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

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let meta = match self.live_meta(key)? {
            None => return Ok(false),
            Some(m) => m,
        };
        let dkey = data_key(key, meta.version, member);
        Ok(self.base.db.get_cf(self.member_cf(), &dkey)?.is_some())
    }

    pub fn scard(&self, key: &[u8]) -> Result<i64> {
        Ok(self.live_meta(key)?.map(|m| m.count as i64).unwrap_or(0))
    }

    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.members_of(key)
    }

    /// `count > 0`: up to `count` distinct members. `count < 0`: `|count|`
    /// samples drawn with replacement (duplicates allowed).
    pub fn srandmember(&self, key: &[u8], count: i64) -> Result<Vec<Vec<u8>>> {
        let members = self.members_of(key)?;
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut rng = rand::thread_rng();
        if count >= 0 {
            let n = (count as usize).min(members.len());
            let mut idx: Vec<usize> = (0..members.len()).collect();
            for i in 0..n {
                let j = rng.gen_range(i..idx.len());
                idx.swap(i, j);
            }
            Ok(idx[..n].iter().map(|&i| members[i].clone()).collect())
        } else {
            let n = (-count) as usize;
            Ok((0..n)
                .map(|_| members[rng.gen_range(0..members.len())].clone())
                .collect())
        }
    }

    /// Pins one snapshot across every source key so `SDiff`/`SInter`/`SUnion`
    /// see a consistent view even while other keys are being concurrently
    /// written.
    fn multi_key_members(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<Vec<u8>>>> {
        let snap = self.base.db.snapshot();
        keys.iter().map(|k| self.members_of_at(&snap, k)).collect()
    }

    pub fn sdiff(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        if keys.is_empty() {
            return Err(Error::invalid_argument("SDIFF requires at least one key"));
        }
        let sets = self.multi_key_members(keys)?;
        let first = &sets[0];
        let others: Vec<HashSet<&Vec<u8>>> = sets[1..].iter().map(|s| s.iter().collect()).collect();
        Ok(first
            .iter()
            .filter(|m| !others.iter().any(|o| o.contains(m)))
            .cloned()
            .collect())
    }

    pub fn sinter(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        if keys.is_empty() {
            return Err(Error::invalid_argument("SINTER requires at least one key"));
        }
        let sets = self.multi_key_members(keys)?;
        if sets.iter().any(Vec::is_empty) {
            return Ok(Vec::new());
        }
        let first = &sets[0];
        let others: Vec<HashSet<&Vec<u8>>> = sets[1..].iter().map(|s| s.iter().collect()).collect();
        Ok(first
            .iter()
            .filter(|m| others.iter().all(|o| o.contains(m)))
            .cloned()
            .collect())
    }

    pub fn sunion(&self, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        if keys.is_empty() {
            return Err(Error::invalid_argument("SUNION requires at least one key"));
        }
        let sets = self.multi_key_members(keys)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for s in sets {
            for m in s {
                if seen.insert(m.clone()) {
                    out.push(m);
                }
            }
        }
        Ok(out)
    }

    /// Writes `result` as `dest`'s new member set. Caller must already hold
    /// locks covering `dest` (and every source key the result was derived
    /// from) for the whole read-then-write sequence.
    fn store_result(&self, dest: &[u8], result: &[Vec<u8>]) -> Result<i64> {
        let now = now_secs();
        let raw = self.base.db.get(meta_key(dest))?;
        let old_version = match classify_meta(raw, false, now)? {
            MetaState::Live(m) | MetaState::Stale(m) => m.version,
            MetaState::Absent => 0,
        };
        let version = next_version(old_version);
        let mut batch = WriteBatch::default();
        for m in result {
            batch.put_cf(self.member_cf(), data_key(dest, version, m), []);
        }
        let meta = MetaValue::new(result.len() as i32, version, 0);
        batch.put(meta_key(dest), meta.encode());
        self.base.db.write(batch)?;
        Ok(result.len() as i64)
    }

    pub fn sdiffstore(&self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64> {
        let mut lock_keys = keys.to_vec();
        lock_keys.push(dest.to_vec());
        lock_keys.sort();
        lock_keys.dedup();
        let _g = self.base.locks.acquire_all(&lock_keys)?;
        let result = self.sdiff(keys)?;
        self.store_result(dest, &result)
    }

    pub fn sinterstore(&self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64> {
        let mut lock_keys = keys.to_vec();
        lock_keys.push(dest.to_vec());
        lock_keys.sort();
        lock_keys.dedup();
        let _g = self.base.locks.acquire_all(&lock_keys)?;
        let result = self.sinter(keys)?;
        self.store_result(dest, &result)
    }

    pub fn sunionstore(&self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64> {
        let mut lock_keys = keys.to_vec();
        lock_keys.push(dest.to_vec());
        lock_keys.sort();
        lock_keys.dedup();
        let _g = self.base.locks.acquire_all(&lock_keys)?;
        let result = self.sunion(keys)?;
        self.store_result(dest, &result)
    }

    pub fn smove(&self, source: &[u8], dest: &[u8], member: &[u8]) -> Result<bool> {
        let mut keys = vec![source.to_vec(), dest.to_vec()];
        keys.sort();
        keys.dedup();
        let _g = self.base.locks.acquire_all(&keys)?;

        let mut src_meta = match self.live_meta(source)? {
            None => return Ok(false),
            Some(m) => m,
        };
        let src_key = data_key(source, src_meta.version, member);
        if self.base.db.get_cf(self.member_cf(), &src_key)?.is_none() {
            return Ok(false);
        }

        let now = now_secs();
        let raw = self.base.db.get(meta_key(dest))?;
        let mut dest_meta = match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        };
        let dest_key = data_key(dest, dest_meta.version, member);
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.member_cf(), &src_key);
        src_meta.count -= 1;
        batch.put(meta_key(source), src_meta.encode());
        if self.base.db.get_cf(self.member_cf(), &dest_key)?.is_none() {
            dest_meta.count += 1;
        }
        batch.put_cf(self.member_cf(), &dest_key, []);
        batch.put(meta_key(dest), dest_meta.encode());
        self.base.db.write(batch)?;
        Ok(true)
    }

    pub fn spop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let prefix = data_key_prefix(key, meta.version);
        let mut iter = self
            .base
            .db
            .iterator_cf(self.member_cf(), IteratorMode::From(&prefix, Direction::Forward));
        let popped = match iter.next() {
            Some(item) => {
                let (k, _) = item?;
                if !k.starts_with(&prefix[..]) {
                    return Ok(None);
                }
                let parsed = parse_data_key(&k).ok_or_else(|| Error::corruption("malformed set member key"))?;
                let member = parsed.member.to_vec();
                (k.to_vec(), member)
            }
            None => return Ok(None),
        };
        drop(iter);
        meta.count -= 1;
        let mut batch = WriteBatch::default();
        batch.delete_cf(self.member_cf(), &popped.0);
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        self.base.note_access(DataType::Set, key);
        Ok(Some(popped.1))
    }
}

impl KeyOps for SetEngine {
    fn data_type(&self) -> DataType {
        DataType::Set
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
            .compact_range_cf::<&[u8], &[u8]>(self.member_cf(), None, None);
        Ok(())
    }

    fn compact_key(&self, key: &[u8]) -> Result<()> {
        let prefix = key_prefix(key);
        self.base.db.compact_range(Some(&prefix[..]), None::<&[u8]>);
        self.base
            .db
            .compact_range_cf(self.member_cf(), Some(&prefix[..]), None::<&[u8]>);
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

    fn open() -> (TempDir, SetEngine) {
        let dir = TempDir::new().unwrap();
        let engine = SetEngine::open(dir.path(), true, Duration::from_millis(500), 5000).unwrap();
        (dir, engine)
    }

    fn v(items: &[&str]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn sdiff_across_three_sets() {
        let (_d, e) = open();
        e.sadd(b"A", &v(&["a", "b", "c", "d"])).unwrap();
        e.sadd(b"B", &v(&["c"])).unwrap();
        e.sadd(b"C", &v(&["a", "c", "e"])).unwrap();
        let mut result = e.sdiff(&[b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]).unwrap();
        result.sort();
        assert_eq!(result, v(&["b", "d"]));
    }

    #[test]
    fn sdiff_after_expiry_drops_the_excluding_set() {
        let (_d, e) = open();
        e.sadd(b"A", &v(&["a", "b", "c", "d"])).unwrap();
        e.sadd(b"B", &v(&["c"])).unwrap();
        e.sadd(b"C", &v(&["a", "c", "e"])).unwrap();
        e.expire(b"C", -1).unwrap();
        let mut result = e.sdiff(&[b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]).unwrap();
        result.sort();
        assert_eq!(result, v(&["a", "b", "d"]));
    }

    #[test]
    fn smove_moves_and_is_noop_when_absent() {
        let (_d, e) = open();
        e.sadd(b"src", &v(&["m"])).unwrap();
        assert!(e.smove(b"src", b"dst", b"m").unwrap());
        assert!(!e.sismember(b"src", b"m").unwrap());
        assert!(e.sismember(b"dst", b"m").unwrap());
        assert!(!e.smove(b"src", b"dst", b"m").unwrap());
    }

    #[test]
    fn sadd_dedupes_within_one_call() {
        let (_d, e) = open();
        assert_eq!(e.sadd(b"k", &v(&["a", "a", "b"])).unwrap(), 2);
        assert_eq!(e.scard(b"k").unwrap(), 2);
    }

    #[test]
    fn spop_removes_one_member() {
        let (_d, e) = open();
        e.sadd(b"k", &v(&["a", "b"])).unwrap();
        let popped = e.spop(b"k").unwrap().unwrap();
        assert!(popped == b"a" || popped == b"b");
        assert_eq!(e.scard(b"k").unwrap(), 1);
    }
}
