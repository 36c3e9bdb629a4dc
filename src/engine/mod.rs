// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! The five type engines and the shared envelope they all follow.

pub mod hashes;
pub mod lists;
pub mod sets;
pub mod strings;
pub mod zsets;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use crate::codec::value::MetaValue;
use crate::error::{Error, Result};
use crate::lock::LockManager;

/// One-byte tag used by the façade's cross-type scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DataType {
    String,
    Hash,
    Set,
    List,
    ZSet,
}

impl DataType {
    pub fn tag(self) -> u8 {
        match self {
            DataType::String => b'k',
            DataType::Hash => b'h',
            DataType::Set => b's',
            DataType::List => b'l',
            DataType::ZSet => b'z',
        }
    }

    pub fn from_tag(tag: u8) -> Option<DataType> {
        match tag {
            b'k' => Some(DataType::String),
            b'h' => Some(DataType::Hash),
            b's' => Some(DataType::Set),
            b'l' => Some(DataType::List),
            b'z' => Some(DataType::ZSet),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Hash => "hash",
            DataType::Set => "set",
            DataType::List => "list",
            DataType::ZSet => "zset",
        }
    }

    /// Fixed dispatch order for cross-type operations.
    pub const ORDER: [DataType; 5] = [
        DataType::String,
        DataType::Hash,
        DataType::Set,
        DataType::List,
        DataType::ZSet,
    ];
}

pub const CF_DATA: &str = "data_cf";
pub const CF_MEMBER: &str = "member_cf";
pub const CF_SCORE: &str = "score_cf";

/// A unit of background work enqueued for the worker thread.
#[derive(Clone, Debug)]
pub enum CompactionTask {
    CleanAll(DataType),
    CompactKey(DataType, Vec<u8>),
}

#[inline]
pub fn now_secs() -> i32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i32
}

/// Opens (creating if configured to) a per-type `rocksdb::DB` under
/// `data_dir/<subdir>`, registering `extra_cfs` alongside the implicit
/// `default` (meta) column family, whose `Options` (typically carrying the
/// `MetaFilterFactory`) the caller supplies as `meta_opts`.
pub(crate) fn open_type_db(
    data_dir: &Path,
    subdir: &str,
    create_if_missing: bool,
    meta_opts: Options,
    extra_cfs: Vec<ColumnFamilyDescriptor>,
) -> Result<DB> {
    let path = data_dir.join(subdir);
    let mut db_opts = Options::default();
    db_opts.create_if_missing(create_if_missing);
    db_opts.create_missing_column_families(create_if_missing);

    let mut descriptors = vec![ColumnFamilyDescriptor::new(
        rocksdb::DEFAULT_COLUMN_FAMILY_NAME,
        meta_opts,
    )];
    descriptors.extend(extra_cfs);

    let db = DB::open_cf_descriptors(&db_opts, path, descriptors)?;
    Ok(db)
}

/// Outcome of reading a meta record under the read-modify-write envelope's
/// "classify meta state as absent, stale, or live."
pub(crate) enum MetaState {
    Absent,
    Stale(MetaValue),
    Live(MetaValue),
}

pub(crate) fn classify_meta(raw: Option<Vec<u8>>, is_list: bool, now: i32) -> Result<MetaState> {
    match raw {
        None => Ok(MetaState::Absent),
        Some(bytes) => {
            let meta = MetaValue::decode(&bytes, is_list)
                .ok_or_else(|| Error::corruption("malformed meta record"))?;
            if meta.is_stale(now) {
                Ok(MetaState::Stale(meta))
            } else {
                Ok(MetaState::Live(meta))
            }
        }
    }
}

/// Shared bookkeeping every engine needs: the underlying db, its lock
/// manager, and the small-compaction-trigger access counter
/// (`small_compaction_threshold`). Engines embed this rather than
/// duplicating it.
pub(crate) struct EngineBase {
    pub db: Arc<DB>,
    pub locks: LockManager,
    pub small_compaction_threshold: u64,
    pub pop_counter: std::sync::atomic::AtomicU64,
    pub compaction_tx: parking_lot::Mutex<Option<crossbeam::channel::Sender<CompactionTask>>>,
}

impl EngineBase {
    pub fn new(db: DB, lock_timeout: Duration, small_compaction_threshold: u64) -> EngineBase {
        EngineBase {
            db: Arc::new(db),
            locks: LockManager::new(lock_timeout),
            small_compaction_threshold,
            pop_counter: std::sync::atomic::AtomicU64::new(0),
            compaction_tx: parking_lot::Mutex::new(None),
        }
    }

    pub fn set_compaction_sender(&self, tx: crossbeam::channel::Sender<CompactionTask>) {
        *self.compaction_tx.lock() = Some(tx);
    }

    /// Bumps the per-key access counter used by `SPop`; once it
    /// crosses `small_compaction_threshold` a `CompactKey` task is enqueued
    /// and the counter resets.
    pub fn note_access(&self, data_type: DataType, key: &[u8]) {
        if self.small_compaction_threshold == 0 {
            return;
        }
        let prev = self
            .pop_counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if prev + 1 >= self.small_compaction_threshold {
            self.pop_counter.store(0, std::sync::atomic::Ordering::Relaxed);
            if let Some(tx) = self.compaction_tx.lock().as_ref() {
                let _ = tx.try_send(CompactionTask::CompactKey(data_type, key.to_vec()));
            }
        }
    }
}

/// The uniform keys-commands interface every engine exposes.
pub trait KeyOps {
    fn data_type(&self) -> DataType;
    fn expire(&self, key: &[u8], ttl: i32) -> Result<bool>;
    fn expire_at(&self, key: &[u8], at: i32) -> Result<bool>;
    fn persist(&self, key: &[u8]) -> Result<bool>;
    fn ttl(&self, key: &[u8]) -> Result<i64>;
    fn delete(&self, key: &[u8]) -> Result<bool>;
    /// Best-effort iteration over the meta CF, skipping stale metas.
    /// Returns `(keys, next_start, done)`.
    fn scan(&self, start: &[u8], pattern: &str, count: usize) -> Result<(Vec<Vec<u8>>, Vec<u8>, bool)>;
    fn compact_range(&self) -> Result<()>;
    /// Range-compacts every CF of this type over the `(key_len|key|*)`
    /// prefix shared by all versions of one user-key (`compact-key`).
    fn compact_key(&self, key: &[u8]) -> Result<()>;
    fn scan_key_num(&self) -> Result<u64>;
}

/// Simple glob matcher supporting `*` and `?`, sufficient for the `pattern`
/// argument of `scan`/`Keys`. No full regex: Redis-style
/// glob is what the front-end's `SCAN`/`KEYS` contract expects.
pub(crate) fn glob_match(pattern: &str, text: &[u8]) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some(b'*') => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            Some(b'?') => !t.is_empty() && inner(&p[1..], &t[1..]),
            Some(&c) => !t.is_empty() && t[0] == c && inner(&p[1..], &t[1..]),
        }
    }
    inner(pattern.as_bytes(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_basic() {
        assert!(glob_match("P_*", b"P_abc"));
        assert!(glob_match("*", b"anything"));
        assert!(glob_match("a?c", b"abc"));
        assert!(!glob_match("a?c", b"abbc"));
        assert!(!glob_match("P_*", b"Q_abc"));
    }

    #[test]
    fn data_type_tag_roundtrip() {
        for t in DataType::ORDER {
            assert_eq!(DataType::from_tag(t.tag()), Some(t));
        }
    }
}
