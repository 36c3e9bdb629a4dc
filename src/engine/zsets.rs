// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Sorted-set engine. Three column families: `default`
//! (meta), `data_cf` (member -> score), `score_cf` (the score-index,
//! ordered by the zset score comparator). Every write maintains the
//! duality invariant: a live `(key, version, member) -> score` data
//! record always has exactly one matching score-index record, and
//! vice versa.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch};

use super::{classify_meta, now_secs, open_type_db, EngineBase, KeyOps, MetaState, CF_DATA, CF_SCORE};
use crate::comparator::{compare_zset_score_keys, ZSET_SCORE_COMPARATOR_NAME};
use crate::codec::key::{
    data_key, data_key_prefix, key_prefix, meta_key, parse_data_key, zset_score_key,
};
use crate::codec::value::{parse_zset_data_value, MetaValue};
use crate::engine::DataType;
use crate::error::{Error, Result};
use crate::filter::{new_db_cell, DataFilterFactory, MetaFilterFactory, RecordKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

pub struct ZsetEngine {
    base: EngineBase,
}

fn next_version(old: i32) -> i32 {
    (old.saturating_add(1)).max(now_secs())
}

impl ZsetEngine {
    pub fn open(
        data_dir: &Path,
        create_if_missing: bool,
        lock_timeout: Duration,
        small_compaction_threshold: u64,
    ) -> Result<ZsetEngine> {
        let db_cell = new_db_cell();
        let mut meta_opts = Options::default();
        meta_opts.set_compaction_filter_factory(MetaFilterFactory {
            data_type: DataType::ZSet,
            is_list: false,
        });
        let mut data_opts = Options::default();
        data_opts.set_compaction_filter_factory(DataFilterFactory {
            db_cell: db_cell.clone(),
            data_type: DataType::ZSet,
            kind: RecordKind::MemberOrField,
            is_list: false,
        });
        let data_cf = ColumnFamilyDescriptor::new(CF_DATA, data_opts);
        let mut score_opts = Options::default();
        score_opts.set_comparator(ZSET_SCORE_COMPARATOR_NAME, compare_zset_score_keys);
        score_opts.set_compaction_filter_factory(DataFilterFactory {
            db_cell: db_cell.clone(),
            data_type: DataType::ZSet,
            kind: RecordKind::ZsetScore,
            is_list: false,
        });
        let score_cf = ColumnFamilyDescriptor::new(CF_SCORE, score_opts);
        let db = open_type_db(
            data_dir,
            "zsets",
            create_if_missing,
            meta_opts,
            vec![data_cf, score_cf],
        )?;
        let base = EngineBase::new(db, lock_timeout, small_compaction_threshold);
        *db_cell.lock() = Some(base.db.clone());
        Ok(ZsetEngine { base })
    }

    fn data_cf(&self) -> &rocksdb::ColumnFamily {
        self.base.db.cf_handle(CF_DATA).expect("data_cf registered at open")
    }

    fn score_cf(&self) -> &rocksdb::ColumnFamily {
        self.base.db.cf_handle(CF_SCORE).expect("score_cf registered at open")
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

    fn live_or_fresh_meta(&self, key: &[u8]) -> Result<MetaValue> {
        let now = now_secs();
        let raw = self.base.db.get(meta_key(key))?;
        Ok(match classify_meta(raw, false, now)? {
            MetaState::Live(m) => m,
            MetaState::Absent => MetaValue::new(0, next_version(0), 0),
            MetaState::Stale(m) => MetaValue::new(0, next_version(m.version), 0),
        })
    }

    fn member_score(&self, key: &[u8], version: i32, member: &[u8]) -> Result<Option<f64>> {
        let snap = self.base.db.snapshot();
        self.member_score_at(&snap, key, version, member)
    }

    fn member_score_at(&self, snap: &rocksdb::Snapshot<'_>, key: &[u8], version: i32, member: &[u8]) -> Result<Option<f64>> {
        let dkey = data_key(key, version, member);
        match snap.get_cf(self.data_cf(), &dkey)? {
            None => Ok(None),
            Some(v) => Ok(Some(
                parse_zset_data_value(&v).ok_or_else(|| Error::corruption("malformed zset data value"))?,
            )),
        }
    }

    /// Ascending (member, score) pairs for one (key, version), sourced from
    /// `data_cf` so the scan is ordered by member bytes -- used by `ZRangebylex`.
    fn members_ascending(&self, key: &[u8], meta: &MetaValue) -> Result<Vec<(Vec<u8>, f64)>> {
        let snap = self.base.db.snapshot();
        self.members_ascending_at(&snap, key, meta)
    }

    fn members_ascending_at(&self, snap: &rocksdb::Snapshot<'_>, key: &[u8], meta: &MetaValue) -> Result<Vec<(Vec<u8>, f64)>> {
        let prefix = data_key_prefix(key, meta.version);
        let mut out = Vec::new();
        for item in snap.iterator_cf(self.data_cf(), IteratorMode::From(&prefix, Direction::Forward)) {
            let (k, v) = item?;
            if !k.starts_with(&prefix[..]) {
                break;
            }
            let parsed = parse_data_key(&k).ok_or_else(|| Error::corruption("malformed zset data key"))?;
            let score = parse_zset_data_value(&v).ok_or_else(|| Error::corruption("malformed zset data value"))?;
            out.push((parsed.member.to_vec(), score));
        }
        Ok(out)
    }

    /// Ascending (member, score) pairs ordered by score then member, sourced
    /// from `score_cf` -- used by `ZRange`/`ZRank`/range-by-score.
    fn scored_ascending(&self, key: &[u8], meta: &MetaValue) -> Result<Vec<(Vec<u8>, f64)>> {
        let snap = self.base.db.snapshot();
        self.scored_ascending_at(&snap, key, meta)
    }

    fn scored_ascending_at(&self, snap: &rocksdb::Snapshot<'_>, key: &[u8], meta: &MetaValue) -> Result<Vec<(Vec<u8>, f64)>> {
        let prefix = data_key_prefix(key, meta.version);
        let mut out = Vec::new();
        for item in snap.iterator_cf(self.score_cf(), IteratorMode::From(&prefix, Direction::Forward)) {
            let (k, _) = item?;
            if !k.starts_with(&prefix[..]) {
                break;
            }
            let parsed = crate::codec::key::parse_zset_score_key(&k)
                .ok_or_else(|| Error::corruption("malformed zset score key"))?;
            out.push((parsed.member.to_vec(), parsed.score));
        }
        Ok(out)
    }

    /// Inserts or updates one member's score within an open batch, keeping
    /// data_cf/score_cf in lockstep. Returns `true` if the member was new.
    fn upsert(&self, batch: &mut WriteBatch, key: &[u8], version: i32, member: &[u8], old: Option<f64>, score: f64) -> bool {
        if let Some(old_score) = old {
            batch.delete_cf(self.score_cf(), zset_score_key(key, version, old_score, member));
        }
        batch.put_cf(self.data_cf(), data_key(key, version, member), parse_score_bytes(score));
        batch.put_cf(self.score_cf(), zset_score_key(key, version, score, member), []);
        old.is_none()
    }

    pub fn zadd(&self, key: &[u8], members: &[(f64, Vec<u8>)]) -> Result<i64> {
        for (score, _) in members {
            if score.is_nan() {
                return Err(Error::invalid_argument("zset scores must not be NaN"));
            }
        }
        let _g = self.base.locks.acquire(key)?;
        let mut meta = self.live_or_fresh_meta(key)?;
        let mut batch = WriteBatch::default();
        let mut added = 0i64;
        let mut dedup: HashMap<&[u8], f64> = HashMap::new();
        for (score, member) in members {
            dedup.insert(member.as_slice(), *score);
        }
        for (member, score) in dedup {
            let old = self.member_score(key, meta.version, member)?;
            if self.upsert(&mut batch, key, meta.version, member, old, score) {
                added += 1;
            }
        }
        meta.count += added as i32;
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(added)
    }

    pub fn zcard(&self, key: &[u8]) -> Result<i64> {
        Ok(self.live_meta(key)?.map(|m| m.count as i64).unwrap_or(0))
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        self.member_score_at(&snap, key, meta.version, member)
    }

    fn translate_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
        let norm = |v: i64| if v < 0 { (len + v).max(0) } else { v };
        let s = norm(start).max(0);
        let e = norm(stop).min(len - 1);
        (s, e)
    }

    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<(Vec<u8>, f64)>> {
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
        let all = self.scored_ascending_at(&snap, key, &meta)?;
        Ok(all[s as usize..=(e as usize).min(all.len().saturating_sub(1))].to_vec())
    }

    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<(Vec<u8>, f64)>> {
        let mut out = self.zrange(key, start, stop)?;
        out.reverse();
        Ok(out)
    }

    pub fn zrangebyscore(
        &self,
        key: &[u8],
        min: f64,
        max: f64,
        left_closed: bool,
        right_closed: bool,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(Vec::new()),
            Some(m) => m,
        };
        let all = self.scored_ascending_at(&snap, key, &meta)?;
        Ok(all
            .into_iter()
            .filter(|(_, s)| {
                let above_min = if left_closed { *s >= min } else { *s > min };
                let below_max = if right_closed { *s <= max } else { *s < max };
                above_min && below_max
            })
            .collect())
    }

    /// Requires every scored member to share one score; the
    /// ordering is by member bytes within `[min, max]`.
    pub fn zrangebylex(&self, key: &[u8], min: &[u8], max: &[u8]) -> Result<Vec<Vec<u8>>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(Vec::new()),
            Some(m) => m,
        };
        let all = self.members_ascending_at(&snap, key, &meta)?;
        Ok(all
            .into_iter()
            .filter(|(m, _)| m.as_slice() >= min && m.as_slice() <= max)
            .map(|(m, _)| m)
            .collect())
    }

    pub fn zincrby(&self, key: &[u8], member: &[u8], by: f64) -> Result<f64> {
        if by.is_nan() {
            return Err(Error::invalid_argument("zset increment must not be NaN"));
        }
        let _g = self.base.locks.acquire(key)?;
        let mut meta = self.live_or_fresh_meta(key)?;
        let old = self.member_score(key, meta.version, member)?;
        let new_score = old.unwrap_or(0.0) + by;
        if new_score.is_nan() {
            return Err(Error::invalid_argument("zset increment would produce NaN"));
        }
        let mut batch = WriteBatch::default();
        if self.upsert(&mut batch, key, meta.version, member, old, new_score) {
            meta.count += 1;
        }
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(new_score)
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Result<Option<i64>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let all = self.scored_ascending_at(&snap, key, &meta)?;
        Ok(all.iter().position(|(m, _)| m == member).map(|p| p as i64))
    }

    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Result<Option<i64>> {
        let snap = self.base.db.snapshot();
        let meta = match self.live_meta_at(&snap, key)? {
            None => return Ok(None),
            Some(m) => m,
        };
        let all = self.scored_ascending_at(&snap, key, &meta)?;
        let len = all.len();
        Ok(all
            .iter()
            .position(|(m, _)| m == member)
            .map(|p| (len - 1 - p) as i64))
    }

    pub fn zrem(&self, key: &[u8], members: &[Vec<u8>]) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(0),
            Some(m) => m,
        };
        let mut batch = WriteBatch::default();
        let mut removed = 0i64;
        for member in members {
            if let Some(score) = self.member_score(key, meta.version, member)? {
                batch.delete_cf(self.data_cf(), data_key(key, meta.version, member));
                batch.delete_cf(self.score_cf(), zset_score_key(key, meta.version, score, member));
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

    pub fn zremrangebyrank(&self, key: &[u8], start: i64, stop: i64) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(0),
            Some(m) => m,
        };
        let len = meta.count as i64;
        if len == 0 {
            return Ok(0);
        }
        let (s, e) = Self::translate_range(start, stop, len);
        if s > e {
            return Ok(0);
        }
        let all = self.scored_ascending(key, &meta)?;
        let doomed = &all[s as usize..=(e as usize).min(all.len().saturating_sub(1))];
        let mut batch = WriteBatch::default();
        for (member, score) in doomed {
            batch.delete_cf(self.data_cf(), data_key(key, meta.version, member));
            batch.delete_cf(self.score_cf(), zset_score_key(key, meta.version, *score, member));
        }
        let removed = doomed.len() as i32;
        meta.count -= removed;
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(removed as i64)
    }

    pub fn zremrangebyscore(
        &self,
        key: &[u8],
        min: f64,
        max: f64,
        left_closed: bool,
        right_closed: bool,
    ) -> Result<i64> {
        let _g = self.base.locks.acquire(key)?;
        let mut meta = match self.live_meta(key)? {
            None => return Ok(0),
            Some(m) => m,
        };
        let all = self.scored_ascending(key, &meta)?;
        let doomed: Vec<(Vec<u8>, f64)> = all
            .into_iter()
            .filter(|(_, s)| {
                let above_min = if left_closed { *s >= min } else { *s > min };
                let below_max = if right_closed { *s <= max } else { *s < max };
                above_min && below_max
            })
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::default();
        for (member, score) in &doomed {
            batch.delete_cf(self.data_cf(), data_key(key, meta.version, member));
            batch.delete_cf(self.score_cf(), zset_score_key(key, meta.version, *score, member));
        }
        meta.count -= doomed.len() as i32;
        batch.put(meta_key(key), meta.encode());
        self.base.db.write(batch)?;
        Ok(doomed.len() as i64)
    }

    /// Reads every source key through one pinned snapshot, per the
    /// multi-key read envelope `ZUnionstore`/`ZInterstore` rely on: the
    /// caller must already hold locks covering `sources` and the eventual
    /// destination for the whole call.
    fn combine_sources(
        &self,
        sources: &[(Vec<u8>, f64)],
        aggregate: Aggregate,
        require_all: bool,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        let snap = self.base.db.snapshot();
        let mut acc: HashMap<Vec<u8>, (f64, usize)> = HashMap::new();
        for (src_key, weight) in sources {
            let meta = self.live_meta_at(&snap, src_key)?;
            let members = match meta {
                None => Vec::new(),
                Some(m) => self.members_ascending_at(&snap, src_key, &m)?,
            };
            for (member, score) in members {
                let weighted = score * weight;
                acc.entry(member)
                    .and_modify(|(acc_score, hits)| {
                        *acc_score = match aggregate {
                            Aggregate::Sum => *acc_score + weighted,
                            Aggregate::Min => acc_score.min(weighted),
                            Aggregate::Max => acc_score.max(weighted),
                        };
                        *hits += 1;
                    })
                    .or_insert((weighted, 1));
            }
        }
        let n = sources.len();
        Ok(acc
            .into_iter()
            .filter(|(_, (_, hits))| !require_all || *hits == n)
            .map(|(m, (s, _))| (m, s))
            .collect())
    }

    pub fn zunionstore(&self, dest: &[u8], sources: &[(Vec<u8>, f64)], aggregate: Aggregate) -> Result<i64> {
        let mut lock_keys: Vec<Vec<u8>> = sources.iter().map(|(k, _)| k.clone()).collect();
        lock_keys.push(dest.to_vec());
        lock_keys.sort();
        lock_keys.dedup();
        let _g = self.base.locks.acquire_all(&lock_keys)?;
        let merged = self.combine_sources(sources, aggregate, false)?;
        self.store_merged(dest, &merged)
    }

    pub fn zinterstore(&self, dest: &[u8], sources: &[(Vec<u8>, f64)], aggregate: Aggregate) -> Result<i64> {
        let mut lock_keys: Vec<Vec<u8>> = sources.iter().map(|(k, _)| k.clone()).collect();
        lock_keys.push(dest.to_vec());
        lock_keys.sort();
        lock_keys.dedup();
        let _g = self.base.locks.acquire_all(&lock_keys)?;
        let merged = self.combine_sources(sources, aggregate, true)?;
        self.store_merged(dest, &merged)
    }

    /// Writes `merged` as `dest`'s new member set. Caller must already hold
    /// locks covering `dest` and every source key for the whole sequence.
    fn store_merged(&self, dest: &[u8], merged: &[(Vec<u8>, f64)]) -> Result<i64> {
        let now = now_secs();
        let raw = self.base.db.get(meta_key(dest))?;
        let old_version = match classify_meta(raw, false, now)? {
            MetaState::Live(m) | MetaState::Stale(m) => m.version,
            MetaState::Absent => 0,
        };
        let version = next_version(old_version);
        let mut batch = WriteBatch::default();
        for (member, score) in merged {
            batch.put_cf(self.data_cf(), data_key(dest, version, member), parse_score_bytes(*score));
            batch.put_cf(self.score_cf(), zset_score_key(dest, version, *score, member), []);
        }
        let meta = MetaValue::new(merged.len() as i32, version, 0);
        batch.put(meta_key(dest), meta.encode());
        self.base.db.write(batch)?;
        Ok(merged.len() as i64)
    }
}

fn parse_score_bytes(score: f64) -> [u8; 8] {
    crate::codec::value::encode_zset_data_value(score)
}

impl KeyOps for ZsetEngine {
    fn data_type(&self) -> DataType {
        DataType::ZSet
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
        self.base
            .db
            .compact_range_cf::<&[u8], &[u8]>(self.score_cf(), None, None);
        Ok(())
    }

    fn compact_key(&self, key: &[u8]) -> Result<()> {
        let prefix = key_prefix(key);
        self.base.db.compact_range(Some(&prefix[..]), None::<&[u8]>);
        self.base
            .db
            .compact_range_cf(self.data_cf(), Some(&prefix[..]), None::<&[u8]>);
        self.base
            .db
            .compact_range_cf(self.score_cf(), Some(&prefix[..]), None::<&[u8]>);
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

    fn open() -> (TempDir, ZsetEngine) {
        let dir = TempDir::new().unwrap();
        let engine = ZsetEngine::open(dir.path(), true, Duration::from_millis(500), 5000).unwrap();
        (dir, engine)
    }

    #[test]
    fn zrange_orders_by_score_then_member() {
        let (_d, e) = open();
        e.zadd(
            b"Z",
            &[
                (-100.000000002, b"m4".to_vec()),
                (-100.000000001, b"m3".to_vec()),
                (100.987654321, b"m2".to_vec()),
                (54354.497895352, b"m1".to_vec()),
            ],
        )
        .unwrap();
        let range = e.zrange(b"Z", 0, -1).unwrap();
        let members: Vec<&[u8]> = range.iter().map(|(m, _)| m.as_slice()).collect();
        assert_eq!(members, vec![b"m4" as &[u8], b"m3", b"m2", b"m1"]);
        assert_eq!(e.zscore(b"Z", b"m4").unwrap(), Some(-100.000000002));
    }

    #[test]
    fn zincrby_maintains_duality() {
        let (_d, e) = open();
        e.zadd(b"Z", &[(1.0, b"m".to_vec())]).unwrap();
        let new_score = e.zincrby(b"Z", b"m", 4.0).unwrap();
        assert_eq!(new_score, 5.0);
        assert_eq!(e.zrange(b"Z", 0, -1).unwrap(), vec![(b"m".to_vec(), 5.0)]);
    }

    #[test]
    fn zadd_rejects_nan() {
        let (_d, e) = open();
        assert!(e.zadd(b"Z", &[(f64::NAN, b"m".to_vec())]).is_err());
    }

    #[test]
    fn zrank_and_zrevrank() {
        let (_d, e) = open();
        e.zadd(b"Z", &[(1.0, b"a".to_vec()), (2.0, b"b".to_vec()), (3.0, b"c".to_vec())])
            .unwrap();
        assert_eq!(e.zrank(b"Z", b"b").unwrap(), Some(1));
        assert_eq!(e.zrevrank(b"Z", b"b").unwrap(), Some(1));
        assert_eq!(e.zrevrank(b"Z", b"c").unwrap(), Some(0));
    }

    #[test]
    fn zunionstore_sums_weighted_scores() {
        let (_d, e) = open();
        e.zadd(b"A", &[(1.0, b"m".to_vec())]).unwrap();
        e.zadd(b"B", &[(2.0, b"m".to_vec())]).unwrap();
        e.zunionstore(
            b"dest",
            &[(b"A".to_vec(), 1.0), (b"B".to_vec(), 2.0)],
            Aggregate::Sum,
        )
        .unwrap();
        assert_eq!(e.zscore(b"dest", b"m").unwrap(), Some(5.0));
    }

    #[test]
    fn zremrangebyscore_removes_in_band() {
        let (_d, e) = open();
        e.zadd(b"Z", &[(1.0, b"a".to_vec()), (2.0, b"b".to_vec()), (3.0, b"c".to_vec())])
            .unwrap();
        let removed = e.zremrangebyscore(b"Z", 1.0, 2.0, true, true).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(e.zcard(b"Z").unwrap(), 1);
    }
}
