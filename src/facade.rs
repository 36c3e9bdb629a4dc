// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Façade: owns one instance of each type engine and exposes the
//! cross-type operations (`Del`, `Exists`, `Expire`, `Persist`, `TTL`, `Type`,
//! `Keys`, `Scan`) that fan out over them in the fixed order `String, Hash,
//! Set, List, ZSet` -- never a C-style fallthrough switch. It also owns the
//! cross-type cursor store and the background compaction worker every
//! per-type engine shares.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use slog::{info, o, Logger};

use crate::config::Config;
use crate::cursor::{CursorState, CursorStore};
use crate::engine::hashes::HashEngine;
use crate::engine::lists::ListEngine;
use crate::engine::sets::SetEngine;
use crate::engine::strings::StringEngine;
use crate::engine::zsets::ZsetEngine;
use crate::engine::{DataType, KeyOps};
use crate::error::{Error, ErrorInner, Result};
use crate::worker::Worker;

pub struct Facade {
    strings: Arc<StringEngine>,
    hashes: Arc<HashEngine>,
    sets: Arc<SetEngine>,
    lists: Arc<ListEngine>,
    zsets: Arc<ZsetEngine>,
    cursor_store: CursorStore,
    worker: Worker,
    logger: Logger,
}

impl Facade {
    /// Opens (or creates, per `config.create_if_missing`) the five per-type
    /// databases under `config.data_dir`, wires the background compaction
    /// worker, and starts the cross-type cursor store.
    pub fn open(mut config: Config, logger: Option<Logger>) -> Result<Facade> {
        config.validate()?;
        let logger = logger.unwrap_or_else(|| Logger::root(slog::Discard, o!()));
        let lock_timeout = Duration::from_millis(config.lock_timeout_ms);

        let strings = Arc::new(StringEngine::open(
            &config.data_dir,
            config.create_if_missing,
            lock_timeout,
        )?);
        let hashes = Arc::new(HashEngine::open(
            &config.data_dir,
            config.create_if_missing,
            lock_timeout,
            config.small_compaction_threshold,
        )?);
        let sets = Arc::new(SetEngine::open(
            &config.data_dir,
            config.create_if_missing,
            lock_timeout,
            config.small_compaction_threshold,
        )?);
        let lists = Arc::new(ListEngine::open(
            &config.data_dir,
            config.create_if_missing,
            lock_timeout,
            config.small_compaction_threshold,
        )?);
        let zsets = Arc::new(ZsetEngine::open(
            &config.data_dir,
            config.create_if_missing,
            lock_timeout,
            config.small_compaction_threshold,
        )?);

        let mut worker_engines: HashMap<DataType, Arc<dyn KeyOps + Send + Sync>> = HashMap::new();
        worker_engines.insert(DataType::String, strings.clone() as Arc<dyn KeyOps + Send + Sync>);
        worker_engines.insert(DataType::Hash, hashes.clone() as Arc<dyn KeyOps + Send + Sync>);
        worker_engines.insert(DataType::Set, sets.clone() as Arc<dyn KeyOps + Send + Sync>);
        worker_engines.insert(DataType::List, lists.clone() as Arc<dyn KeyOps + Send + Sync>);
        worker_engines.insert(DataType::ZSet, zsets.clone() as Arc<dyn KeyOps + Send + Sync>);

        let worker = Worker::spawn(worker_engines, logger.new(o!("component" => "compaction-worker")));
        sets.set_compaction_sender(worker.sender());

        info!(logger, "nitrokv opened"; "data_dir" => %config.data_dir.display());

        Ok(Facade {
            strings,
            hashes,
            sets,
            lists,
            zsets,
            cursor_store: CursorStore::new(config.cursor_max_size),
            worker,
            logger,
        })
    }

    pub fn strings(&self) -> &StringEngine {
        &self.strings
    }

    pub fn hashes(&self) -> &HashEngine {
        &self.hashes
    }

    pub fn sets(&self) -> &SetEngine {
        &self.sets
    }

    pub fn lists(&self) -> &ListEngine {
        &self.lists
    }

    pub fn zsets(&self) -> &ZsetEngine {
        &self.zsets
    }

    /// Signals the background worker to drain its queue and exit, then joins it.
    pub fn close(self) {
        info!(self.logger, "nitrokv closing");
        self.worker.shutdown();
    }

    fn by_type(&self, dt: DataType) -> &dyn KeyOps {
        match dt {
            DataType::String => self.strings.as_ref(),
            DataType::Hash => self.hashes.as_ref(),
            DataType::Set => self.sets.as_ref(),
            DataType::List => self.lists.as_ref(),
            DataType::ZSet => self.zsets.as_ref(),
        }
    }

    /// Tags an engine-level error with the type whose engine actually
    /// failed, derived from the dispatch loop itself rather than a
    /// hardcoded per-operation label. Preserves the original error's kind
    /// -- an `InvalidArgument` from one engine must still read as
    /// `InvalidArgument` at the façade, not collapse into `Corruption`.
    fn tag(dt: DataType, e: Error) -> Error {
        match *e.0 {
            ErrorInner::NotFound => Error::not_found(),
            ErrorInner::InvalidArgument(msg) => Error::invalid_argument(format!("{}: {}", dt.name(), msg)),
            ErrorInner::LockTimeout(key) => Error::lock_timeout(key),
            ErrorInner::Corruption(msg) => Error::corruption(format!("{}: {}", dt.name(), msg)),
            ErrorInner::Engine(err) => Error::corruption(format!("{}: underlying engine error: {}", dt.name(), err)),
            ErrorInner::Io(err) => Error::corruption(format!("{}: io error: {}", dt.name(), err)),
        }
    }

    /// Deletes `key` from whichever type engine(s) currently hold it. Unlike
    /// a per-type `delete`, this is the only operation that removes a key
    /// irrespective of its type.
    pub fn del(&self, key: &[u8]) -> Result<i64> {
        let mut n = 0i64;
        for dt in DataType::ORDER {
            match self.by_type(dt).delete(key) {
                Ok(true) => n += 1,
                Ok(false) => {}
                Err(e) => return Err(Self::tag(dt, e)),
            }
        }
        Ok(n)
    }

    pub fn exists(&self, key: &[u8]) -> Result<i64> {
        let mut n = 0i64;
        for dt in DataType::ORDER {
            match self.by_type(dt).ttl(key) {
                Ok(t) if t != -2 => n += 1,
                Ok(_) => {}
                Err(e) => return Err(Self::tag(dt, e)),
            }
        }
        Ok(n)
    }

    pub fn expire(&self, key: &[u8], ttl: i32) -> Result<bool> {
        let mut any = false;
        for dt in DataType::ORDER {
            match self.by_type(dt).expire(key, ttl) {
                Ok(true) => any = true,
                Ok(false) => {}
                Err(e) => return Err(Self::tag(dt, e)),
            }
        }
        Ok(any)
    }

    pub fn expire_at(&self, key: &[u8], at: i32) -> Result<bool> {
        let mut any = false;
        for dt in DataType::ORDER {
            match self.by_type(dt).expire_at(key, at) {
                Ok(true) => any = true,
                Ok(false) => {}
                Err(e) => return Err(Self::tag(dt, e)),
            }
        }
        Ok(any)
    }

    pub fn persist(&self, key: &[u8]) -> Result<bool> {
        let mut any = false;
        for dt in DataType::ORDER {
            match self.by_type(dt).persist(key) {
                Ok(true) => any = true,
                Ok(false) => {}
                Err(e) => return Err(Self::tag(dt, e)),
            }
        }
        Ok(any)
    }

    /// Remaining seconds for `key` under whichever type engine holds it live;
    /// `-1` if no expiration is set, `-2` if not found under any type.
    pub fn ttl(&self, key: &[u8]) -> Result<i64> {
        for dt in DataType::ORDER {
            let t = self.by_type(dt).ttl(key).map_err(|e| Self::tag(dt, e))?;
            if t != -2 {
                return Ok(t);
            }
        }
        Ok(-2)
    }

    /// The type holding `key` live, or `None` if it exists under no type.
    pub fn type_of(&self, key: &[u8]) -> Result<Option<DataType>> {
        for dt in DataType::ORDER {
            let t = self.by_type(dt).ttl(key).map_err(|e| Self::tag(dt, e))?;
            if t != -2 {
                return Ok(Some(dt));
            }
        }
        Ok(None)
    }

    /// Collects every live key matching `pattern` across all five types, in
    /// the fixed type order, draining each engine's `scan` to completion
    /// before moving to the next.
    pub fn keys(&self, pattern: &str) -> Result<Vec<(DataType, Vec<u8>)>> {
        const PAGE: usize = 256;
        let mut out = Vec::new();
        for dt in DataType::ORDER {
            let engine = self.by_type(dt);
            let mut start: Vec<u8> = Vec::new();
            loop {
                let (batch, next_start, done) = engine
                    .scan(&start, pattern, PAGE)
                    .map_err(|e| Self::tag(dt, e))?;
                out.extend(batch.into_iter().map(|k| (dt, k)));
                if done {
                    break;
                }
                start = next_start;
            }
        }
        Ok(out)
    }

    /// Cross-type `SCAN`: resumes from the opaque `cursor` (0 starts a
    /// fresh scan at the first type), returns up to `count` matching keys and
    /// a new cursor, or `0` once every type has been exhausted. The resume
    /// state is an explicit `(type, intra-engine resume-key)` pair advanced
    /// one type at a time through `DataType::ORDER` -- never a fallthrough
    /// switch.
    pub fn scan(&self, cursor: i64, pattern: &str, count: usize) -> Result<(Vec<(DataType, Vec<u8>)>, i64)> {
        let mut state = self.cursor_store.resolve(cursor);
        let mut out = Vec::new();
        loop {
            if out.len() >= count {
                break;
            }
            let remaining = count - out.len();
            let engine = self.by_type(state.data_type);
            let (batch, next_start, done) = engine
                .scan(&state.resume_key, pattern, remaining)
                .map_err(|e| Self::tag(state.data_type, e))?;
            out.extend(batch.into_iter().map(|k| (state.data_type, k)));

            if !done {
                state.resume_key = next_start;
                break;
            }

            match next_type(state.data_type) {
                Some(next) => {
                    state = CursorState {
                        data_type: next,
                        resume_key: Vec::new(),
                    };
                }
                None => {
                    if cursor != 0 {
                        self.cursor_store.retire(cursor);
                    }
                    return Ok((out, 0));
                }
            }
        }

        let new_cursor = if cursor != 0 {
            self.cursor_store.update(cursor, state);
            cursor
        } else {
            self.cursor_store.issue(state)
        };
        Ok((out, new_cursor))
    }
}

fn next_type(dt: DataType) -> Option<DataType> {
    let idx = DataType::ORDER.iter().position(|&d| d == dt)?;
    DataType::ORDER.get(idx + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, Facade) {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.data_dir = dir.path().to_path_buf();
        let facade = Facade::open(cfg, None).unwrap();
        (dir, facade)
    }

    #[test]
    fn del_and_exists_across_types() {
        let (_d, f) = open();
        f.strings().set(b"k1", b"v").unwrap();
        f.hashes().hset(b"k2", b"field", b"v").unwrap();
        assert_eq!(f.exists(b"k1").unwrap(), 1);
        assert_eq!(f.exists(b"k2").unwrap(), 1);
        assert_eq!(f.exists(b"missing").unwrap(), 0);
        assert_eq!(f.del(b"k1").unwrap(), 1);
        assert_eq!(f.exists(b"k1").unwrap(), 0);
    }

    #[test]
    fn type_of_reports_the_owning_engine() {
        let (_d, f) = open();
        f.sets().sadd(b"s", &[b"m".to_vec()]).unwrap();
        assert_eq!(f.type_of(b"s").unwrap(), Some(DataType::Set));
        assert_eq!(f.type_of(b"nope").unwrap(), None);
    }

    #[test]
    fn expire_and_ttl_and_persist_roundtrip() {
        let (_d, f) = open();
        f.lists().rpush(b"l", &[b"a".to_vec()]).unwrap();
        assert!(f.expire(b"l", 100).unwrap());
        let ttl = f.ttl(b"l").unwrap();
        assert!(ttl > 0 && ttl <= 100);
        assert!(f.persist(b"l").unwrap());
        assert_eq!(f.ttl(b"l").unwrap(), -1);
    }

    #[test]
    fn scan_visits_all_five_types_in_fixed_order_then_returns_zero() {
        let (_d, f) = open();
        f.strings().set(b"P_a", b"v").unwrap();
        f.hashes().hset(b"P_b", b"field", b"v").unwrap();
        f.sets().sadd(b"P_c", &[b"m".to_vec()]).unwrap();
        f.lists().rpush(b"P_d", &[b"x".to_vec()]).unwrap();
        f.zsets().zadd(b"P_e", &[(1.0, b"m".to_vec())]).unwrap();

        let mut cursor = 0i64;
        let mut seen = Vec::new();
        loop {
            let (batch, next) = f.scan(cursor, "P_*", 2).unwrap();
            seen.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 5);
        let order: Vec<DataType> = seen.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            order,
            vec![
                DataType::String,
                DataType::Hash,
                DataType::Set,
                DataType::List,
                DataType::ZSet,
            ]
        );
    }

    #[test]
    fn keys_collects_matches_from_every_type() {
        let (_d, f) = open();
        f.strings().set(b"P_x", b"v").unwrap();
        f.sets().sadd(b"P_y", &[b"m".to_vec()]).unwrap();
        f.strings().set(b"Q_z", b"v").unwrap();
        let matches = f.keys("P_*").unwrap();
        assert_eq!(matches.len(), 2);
    }
}
