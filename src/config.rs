// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Engine configuration.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const DEFAULT_CURSOR_MAX_SIZE: usize = 5000;
const DEFAULT_STATISTICS_MAX_SIZE: usize = 0;
const DEFAULT_SMALL_COMPACTION_THRESHOLD: u64 = 5000;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Root directory under which the five per-type sub-databases
    /// (`strings/`, `hashes/`, `sets/`, `lists/`, `zsets/`) are created.
    pub data_dir: PathBuf,
    pub create_if_missing: bool,
    /// Capacity of the cross-type cursor LRU.
    pub cursor_max_size: usize,
    /// Capacity of the per-engine small-compaction-trigger LRU; 0 disables it.
    pub statistics_max_size: usize,
    /// Per-key access counter threshold at which an async compact-key task
    /// is enqueued (`SPop`).
    pub small_compaction_threshold: u64,
    /// Maximum time a caller waits in the lock manager before a retryable
    /// `LockTimeout` is returned.
    pub lock_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            data_dir: PathBuf::from("./nitrokv-data"),
            create_if_missing: true,
            cursor_max_size: DEFAULT_CURSOR_MAX_SIZE,
            statistics_max_size: DEFAULT_STATISTICS_MAX_SIZE,
            small_compaction_threshold: DEFAULT_SMALL_COMPACTION_THRESHOLD,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl Config {
    pub fn validate(&mut self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::invalid_argument(
                "lock_timeout_ms must be greater than zero",
            ));
        }
        if !self.data_dir.is_absolute() {
            self.data_dir = std::env::current_dir()?.join(&self.data_dir);
        }
        Ok(())
    }

    pub(crate) fn subdir(&self, name: &str) -> PathBuf {
        Path::new(&self.data_dir).join(name)
    }
}
