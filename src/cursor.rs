// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Cross-type cursor store: an opaque 63-bit integer mapped
//! through an LRU to `(type-tag, resume-key)`. The LRU promotes on read and
//! evicts the oldest entry on overflow; a non-present cursor is a fresh scan.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::engine::DataType;
use crate::metrics::CURSOR_STORE_EVENTS;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorState {
    pub data_type: DataType,
    pub resume_key: Vec<u8>,
}

struct Entry {
    state: CursorState,
    recency: u64,
}

pub struct CursorStore {
    capacity: usize,
    next_id: AtomicI64,
    recency_clock: AtomicU64,
    table: Mutex<HashMap<i64, Entry>>,
}

impl CursorStore {
    pub fn new(capacity: usize) -> CursorStore {
        CursorStore {
            capacity: capacity.max(1),
            next_id: AtomicI64::new(1),
            recency_clock: AtomicU64::new(0),
            table: Mutex::new(HashMap::new()),
        }
    }

    fn tick(&self) -> u64 {
        self.recency_clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Issues a fresh cursor for `state`, evicting the least-recently-used
    /// entry if the store is at capacity.
    pub fn issue(&self, state: CursorState) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let recency = self.tick();
        let mut table = self.table.lock();
        if table.len() >= self.capacity {
            if let Some((&oldest, _)) = table.iter().min_by_key(|(_, e)| e.recency) {
                table.remove(&oldest);
                CURSOR_STORE_EVENTS.with_label_values(&["evict"]).inc();
            }
        }
        table.insert(id, Entry { state, recency });
        CURSOR_STORE_EVENTS.with_label_values(&["insert"]).inc();
        id
    }

    /// Looks up `cursor`, promoting it to most-recently-used. A cursor of
    /// `0` or one absent from the table is treated as a fresh scan from the
    /// first type with an empty resume-key.
    pub fn resolve(&self, cursor: i64) -> CursorState {
        if cursor == 0 {
            CURSOR_STORE_EVENTS.with_label_values(&["fresh"]).inc();
            return CursorState {
                data_type: DataType::ORDER[0],
                resume_key: Vec::new(),
            };
        }
        let mut table = self.table.lock();
        match table.get_mut(&cursor) {
            Some(entry) => {
                entry.recency = self.recency_clock.fetch_add(1, Ordering::Relaxed);
                CURSOR_STORE_EVENTS.with_label_values(&["hit"]).inc();
                entry.state.clone()
            }
            None => {
                CURSOR_STORE_EVENTS.with_label_values(&["miss"]).inc();
                CursorState {
                    data_type: DataType::ORDER[0],
                    resume_key: Vec::new(),
                }
            }
        }
    }

    /// Replaces the state bound to an existing cursor id (used to advance a
    /// scan in place instead of minting a new id on every page).
    pub fn update(&self, cursor: i64, state: CursorState) {
        let recency = self.tick();
        let mut table = self.table.lock();
        table.insert(cursor, Entry { state, recency });
    }

    pub fn retire(&self, cursor: i64) {
        self.table.lock().remove(&cursor);
    }
}
