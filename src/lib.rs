// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! nitrokv: an embedded multi-model storage engine implementing Redis-style
//! aggregate types (string, hash, set, list, sorted set) over `rocksdb`.
//!
//! [`Facade`] is the crate's single entry point: it owns one `rocksdb::DB`
//! per aggregate type, the per-key lock manager each type engine uses, the
//! cross-type cursor store, and the background compaction worker.

#[macro_use]
extern crate serde_derive;

pub mod codec;
pub mod comparator;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod facade;
pub mod filter;
pub mod lock;
pub mod metrics;
pub mod worker;

pub use config::Config;
pub use engine::DataType;
pub use error::{Error, Result};
pub use facade::Facade;
