//! Bounded worker pool for chunk compression and decompression.
//!
//! A thin wrapper over a rayon thread pool: jobs are spawned FIFO and hand
//! their result back through a per-job channel. Callers keep the receivers
//! in a queue and drain from the front, which both preserves chunk order and
//! bounds the number of in-flight results.

use std::sync::mpsc::{channel, Receiver};

use anyhow::{Context, Result};

pub(crate) struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("zipnum-worker-{i}"))
            .build()
            .context("failed to start worker pool")?;
        Ok(Self { pool, workers })
    }

    /// How many submitted-but-undrained jobs a caller should allow before
    /// blocking on the oldest one.
    pub fn max_in_flight(&self) -> usize {
        self.workers * 2
    }

    /// Runs `job` on the pool, returning the receiver for its result.
    pub fn submit<T, F>(&self, job: F) -> Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = channel();
        self.pool.spawn_fifo(move || {
            // The receiver may be gone if the caller bailed out early.
            let _ = tx.send(job());
        });
        rx
    }
}

/// Receives a finished job result, mapping a disconnected channel (worker
/// panic) to an error.
pub(crate) fn recv<T>(rx: Receiver<T>) -> Result<T> {
    rx.recv().context("worker terminated unexpectedly")
}
