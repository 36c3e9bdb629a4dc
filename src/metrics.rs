// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Internal instrumentation: counters and histograms for compaction,
//! locking, and the cross-type cursor store.

use lazy_static::lazy_static;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static! {
    pub static ref COMPACTION_FILTER_DROPPED: IntCounterVec = register_int_counter_vec!(
        "nitrokv_compaction_filter_dropped_total",
        "Records dropped by a compaction filter, by type and column family",
        &["type", "cf"]
    )
    .unwrap();
    pub static ref LOCK_WAIT_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "nitrokv_lock_wait_duration_seconds",
        "Time spent waiting to acquire a per-key lock",
        &["type"]
    )
    .unwrap();
    pub static ref CURSOR_STORE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "nitrokv_cursor_store_events_total",
        "Cross-type cursor LRU hits, misses and evictions",
        &["event"]
    )
    .unwrap();
}
