// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Per-user-key mutual exclusion with timeout.
//!
//! Every write's read-modify-write envelope holds one of these
//! guards for its whole duration. Multi-key writers (`MSet`, `SInterstore`,
//! `SMove`, ...) must acquire the full, sorted, deduplicated key set through
//! `acquire_all` to avoid lock-order deadlocks across concurrent callers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use crate::error::{Error, Result};
use crate::metrics::LOCK_WAIT_DURATION_SECONDS;

type KeyMutex = Mutex<()>;

/// RAII guard: the lock releases when this (or the `Vec` from
/// `acquire_all`) drops, on every exit path including a failed batch commit.
pub struct LockGuard {
    _inner: ArcMutexGuard<RawMutex, ()>,
}

pub struct LockManager {
    timeout: Duration,
    table: Mutex<HashMap<Vec<u8>, std::sync::Arc<KeyMutex>>>,
}

impl LockManager {
    pub fn new(timeout: Duration) -> LockManager {
        LockManager {
            timeout,
            table: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &[u8]) -> std::sync::Arc<KeyMutex> {
        let mut table = self.table.lock();
        table
            .entry(key.to_vec())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(())))
            .clone()
    }

    /// Blocks up to the configured timeout. Returns a retryable
    /// `LockTimeout` error on expiry.
    pub fn acquire(&self, key: &[u8]) -> Result<LockGuard> {
        let entry = self.entry(key);
        let started = Instant::now();
        let guard = entry.try_lock_arc_for(self.timeout);
        LOCK_WAIT_DURATION_SECONDS
            .with_label_values(&["single"])
            .observe(started.elapsed().as_secs_f64());
        match guard {
            Some(inner) => Ok(LockGuard { _inner: inner }),
            None => Err(Error::lock_timeout(key.to_vec())),
        }
    }

    /// Acquires every key in `keys`, sorted and deduplicated first, in that
    /// order -- the caller must not rely on input order. On timeout, the
    /// locks already taken are released (the returned `Vec` is dropped)
    /// before the error propagates.
    pub fn acquire_all(&self, keys: &[Vec<u8>]) -> Result<Vec<LockGuard>> {
        let mut sorted: Vec<Vec<u8>> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let started = Instant::now();
        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            match self.acquire(key) {
                Ok(g) => guards.push(g),
                Err(e) => return Err(e),
            }
        }
        LOCK_WAIT_DURATION_SECONDS
            .with_label_values(&["multi"])
            .observe(started.elapsed().as_secs_f64());
        Ok(guards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_excludes_concurrent_holders() {
        let mgr = Arc::new(LockManager::new(Duration::from_millis(50)));
        let g = mgr.acquire(b"k").unwrap();
        let mgr2 = mgr.clone();
        let handle = thread::spawn(move || mgr2.acquire(b"k").is_err());
        assert!(handle.join().unwrap());
        drop(g);
        assert!(mgr.acquire(b"k").is_ok());
    }

    #[test]
    fn acquire_all_dedups_and_sorts() {
        let mgr = LockManager::new(Duration::from_millis(50));
        let keys = vec![b"b".to_vec(), b"a".to_vec(), b"a".to_vec()];
        let guards = mgr.acquire_all(&keys).unwrap();
        assert_eq!(guards.len(), 2);
    }

    #[test]
    fn different_keys_do_not_contend() {
        let mgr = LockManager::new(Duration::from_millis(50));
        let _g1 = mgr.acquire(b"a").unwrap();
        assert!(mgr.acquire(b"b").is_ok());
    }
}
