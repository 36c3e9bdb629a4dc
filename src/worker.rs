// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Background compaction worker: a single thread draining a
//! bounded queue of `{type, operation, key}` tasks. `clean-all` runs range
//! compaction across all CFs of a type; `compact-key` scopes that to one
//! user-key's `(key_len|key|*)` prefix. A shutdown flag causes the worker
//! to drain and exit on join.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};
use slog::{debug, o, warn, Logger};

use crate::engine::{CompactionTask, DataType, KeyOps};
use crate::error::Result;

const TASK_QUEUE_CAPACITY: usize = 1024;

pub struct Worker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    sender: Sender<CompactionTask>,
}

impl Worker {
    pub fn spawn(engines: HashMap<DataType, Arc<dyn KeyOps + Send + Sync>>, logger: Logger) -> Worker {
        let (tx, rx) = crossbeam::channel::bounded(TASK_QUEUE_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_shutdown = shutdown.clone();
        let worker_logger = logger.new(o!("component" => "compaction-worker"));
        let handle = std::thread::Builder::new()
            .name("nitrokv-compactor".into())
            .spawn(move || run(rx, engines, worker_shutdown, worker_logger))
            .expect("spawning the compaction worker thread");
        Worker {
            handle: Some(handle),
            shutdown,
            sender: tx,
        }
    }

    pub fn sender(&self) -> Sender<CompactionTask> {
        self.sender.clone()
    }

    /// Signals the worker to drain its queue and exit, then joins it.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn run(
    rx: Receiver<CompactionTask>,
    engines: HashMap<DataType, Arc<dyn KeyOps + Send + Sync>>,
    shutdown: Arc<AtomicBool>,
    logger: Logger,
) {
    loop {
        match rx.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(task) => {
                if let Err(e) = dispatch(&engines, &task) {
                    warn!(logger, "compaction task failed"; "error" => %e);
                }
            }
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::SeqCst) && rx.is_empty() {
                    debug!(logger, "compaction worker draining queue before exit");
                    break;
                }
            }
            Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn dispatch(engines: &HashMap<DataType, Arc<dyn KeyOps + Send + Sync>>, task: &CompactionTask) -> Result<()> {
    match task {
        CompactionTask::CleanAll(ty) => {
            if let Some(engine) = engines.get(ty) {
                engine.compact_range()?;
            }
        }
        CompactionTask::CompactKey(ty, key) => {
            if let Some(engine) = engines.get(ty) {
                engine.compact_key(key)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::strings::StringEngine;
    use std::time::Duration;

    #[test]
    fn worker_drains_and_shuts_down_cleanly() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.data_dir = dir.path().to_path_buf();
        let strings = Arc::new(StringEngine::open(&cfg.data_dir, true, Duration::from_millis(500)).unwrap());
        let mut engines: HashMap<DataType, Arc<dyn KeyOps + Send + Sync>> = HashMap::new();
        engines.insert(DataType::String, strings);

        let worker = Worker::spawn(engines, Logger::root(slog::Discard, o!()));
        worker.sender().send(CompactionTask::CleanAll(DataType::String)).unwrap();
        worker.shutdown();
    }
}
