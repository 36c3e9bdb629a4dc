// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Compaction filters: a meta filter and a data filter per type,
//! registered on the relevant column families at open time. Both are pure
//! predicates over `(level, key, value)` consulted by the underlying store
//! during background merges.
//!
//! The data filter needs to read the *current* meta for the user-key a
//! record belongs to, but the column family `Options` that carry its
//! factory are built before the owning `DB` exists (they are an input to
//! `DB::open_cf_descriptors`). `DbCell` breaks that chicken-and-egg: engines
//! build an empty cell, hand it to the factory, open the db, then fill the
//! cell with an `Arc` to the handle they just got back. By the time any
//! background compaction actually runs the cell is populated.

use std::sync::Arc;

use rocksdb::compaction_filter::Decision;
use rocksdb::compaction_filter_factory::{CompactionFilterContext, CompactionFilterFactory};
use rocksdb::{CompactionFilter, DB};

use crate::codec::key::{parse_data_key, parse_list_data_key, parse_zset_score_key};
use crate::codec::value::MetaValue;
use crate::engine::{now_secs, DataType};
use crate::metrics::COMPACTION_FILTER_DROPPED;

pub type DbCell = Arc<parking_lot::Mutex<Option<Arc<DB>>>>;

pub fn new_db_cell() -> DbCell {
    Arc::new(parking_lot::Mutex::new(None))
}

/// Drops a meta record once `(expire_ts != 0 && expire_ts < now && version <
/// now) || (count == 0 && version < now)`. The double `version < now` guard
/// ensures data records sharing the version have also aged out of any
/// in-flight snapshot.
pub struct MetaFilter {
    data_type: DataType,
    is_list: bool,
}

impl CompactionFilter for MetaFilter {
    fn filter(&mut self, _level: u32, _key: &[u8], value: &[u8]) -> Decision {
        let now = now_secs();
        let meta = match MetaValue::decode(value, self.is_list) {
            Some(m) => m,
            None => return Decision::Keep,
        };
        let expired = meta.expire_ts != 0 && meta.expire_ts < now && meta.version < now;
        let emptied = meta.count == 0 && meta.version < now;
        if expired || emptied {
            COMPACTION_FILTER_DROPPED
                .with_label_values(&[self.data_type.name(), "meta"])
                .inc();
            Decision::Remove
        } else {
            Decision::Keep
        }
    }

    fn name(&self) -> &std::ffi::CStr {
        c_name()
    }
}

pub struct MetaFilterFactory {
    pub data_type: DataType,
    pub is_list: bool,
}

impl CompactionFilterFactory for MetaFilterFactory {
    type Filter = MetaFilter;

    fn create(&self, _context: CompactionFilterContext) -> Self::Filter {
        MetaFilter {
            data_type: self.data_type,
            is_list: self.is_list,
        }
    }

    fn name(&self) -> &std::ffi::CStr {
        c_name()
    }
}

/// Which of the three versioned-record key layouts a `DataFilter` is reading:
/// hash/set/zset `data_cf` share one layout, lists and the zset score index
/// each have their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    MemberOrField,
    ListIndex,
    ZsetScore,
}

fn record_user_key_and_version(kind: RecordKind, key: &[u8]) -> Option<(&[u8], i32)> {
    match kind {
        RecordKind::MemberOrField => parse_data_key(key).map(|p| (p.user_key, p.version)),
        RecordKind::ListIndex => parse_list_data_key(key).map(|p| (p.user_key, p.version)),
        RecordKind::ZsetScore => parse_zset_score_key(key).map(|p| (p.user_key, p.version)),
    }
}

/// Stateful over one compaction pass: caches the last observed user-key and
/// its current meta `{version, expire_ts}`, refetched from the meta CF only
/// when the user-key changes. Each compaction job gets its own instance via
/// the factory -- never shared across concurrent jobs.
pub struct DataFilter {
    db_cell: DbCell,
    data_type: DataType,
    kind: RecordKind,
    is_list: bool,
    last_key: Option<Vec<u8>>,
    last_meta: Option<MetaValue>,
}

impl DataFilter {
    fn refresh(&mut self, user_key: &[u8]) {
        if self.last_key.as_deref() == Some(user_key) {
            return;
        }
        self.last_key = Some(user_key.to_vec());
        self.last_meta = self
            .db_cell
            .lock()
            .as_ref()
            .and_then(|db| db.get(user_key).ok().flatten())
            .and_then(|raw| MetaValue::decode(&raw, self.is_list));
    }
}

impl CompactionFilter for DataFilter {
    fn filter(&mut self, _level: u32, key: &[u8], _value: &[u8]) -> Decision {
        let now = now_secs();
        let (user_key, version) = match record_user_key_and_version(self.kind, key) {
            Some(p) => p,
            None => return Decision::Keep,
        };
        self.refresh(user_key);
        let drop = match &self.last_meta {
            None => true,
            Some(meta) => (meta.expire_ts != 0 && meta.expire_ts < now) || meta.version > version,
        };
        if drop {
            COMPACTION_FILTER_DROPPED
                .with_label_values(&[self.data_type.name(), "data"])
                .inc();
            Decision::Remove
        } else {
            Decision::Keep
        }
    }

    fn name(&self) -> &std::ffi::CStr {
        c_name()
    }
}

pub struct DataFilterFactory {
    pub db_cell: DbCell,
    pub data_type: DataType,
    pub kind: RecordKind,
    pub is_list: bool,
}

impl CompactionFilterFactory for DataFilterFactory {
    type Filter = DataFilter;

    fn create(&self, _context: CompactionFilterContext) -> Self::Filter {
        DataFilter {
            db_cell: self.db_cell.clone(),
            data_type: self.data_type,
            kind: self.kind,
            is_list: self.is_list,
            last_key: None,
            last_meta: None,
        }
    }

    fn name(&self) -> &std::ffi::CStr {
        c_name()
    }
}

fn c_name() -> &'static std::ffi::CStr {
    static NAME: &[u8] = b"nitrokv.CompactionFilter\0";
    std::ffi::CStr::from_bytes_with_nul(NAME).expect("embedded nul-terminated constant")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_filter_drops_expired_and_aged_version() {
        let mut f = MetaFilter {
            data_type: DataType::Hash,
            is_list: false,
        };
        // expired long ago, and version (100) is well behind `now`.
        let meta = MetaValue::new(3, 100, 50);
        assert!(matches!(f.filter(0, b"k", &meta.encode()), Decision::Remove));
    }

    #[test]
    fn meta_filter_keeps_emptied_but_recent_version() {
        let mut f = MetaFilter {
            data_type: DataType::Hash,
            is_list: false,
        };
        let meta = MetaValue::new(0, now_secs() + 1000, 0);
        assert!(matches!(f.filter(0, b"k", &meta.encode()), Decision::Keep));
    }

    #[test]
    fn meta_filter_keeps_live_meta() {
        let mut f = MetaFilter {
            data_type: DataType::Hash,
            is_list: false,
        };
        let meta = MetaValue::new(3, now_secs() + 1000, 0);
        assert!(matches!(f.filter(0, b"k", &meta.encode()), Decision::Keep));
    }

    #[test]
    fn data_filter_drops_records_orphaned_by_a_missing_meta() {
        let mut f = DataFilter {
            db_cell: new_db_cell(),
            data_type: DataType::Hash,
            kind: RecordKind::MemberOrField,
            is_list: false,
            last_key: None,
            last_meta: None,
        };
        let key = crate::codec::key::data_key(b"h", 1, b"field");
        assert!(matches!(f.filter(0, &key, b""), Decision::Remove));
    }

    #[test]
    fn data_filter_keeps_records_matching_the_live_version() {
        let cell = new_db_cell();
        let dir = tempfile::TempDir::new().unwrap();
        let db = rocksdb::DB::open_default(dir.path()).unwrap();
        let meta = MetaValue::new(1, 0, 5);
        db.put(b"h", meta.encode()).unwrap();
        *cell.lock() = Some(Arc::new(db));

        let mut f = DataFilter {
            db_cell: cell,
            data_type: DataType::Hash,
            kind: RecordKind::MemberOrField,
            is_list: false,
            last_key: None,
            last_meta: None,
        };
        let key = crate::codec::key::data_key(b"h", 5, b"field");
        assert!(matches!(f.filter(0, &key, b""), Decision::Keep));
        let stale_key = crate::codec::key::data_key(b"h", 4, b"field");
        assert!(matches!(f.filter(0, &stale_key, b""), Decision::Remove));
    }
}
