//! Thread pool
//!
//! Owns a fixed set of `ThreadWorker`s and routes submissions to them,
//! round-robin or to an explicit worker. Workers hold only a `Weak`
//! reference back to the pool's shared state.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use taskpool_core::error::{PoolError, PoolResult};
use taskpool_core::{kdebug, kinfo, kwarn, ResultScalar};

use crate::async_result::{handoff, ResultHandle};
use crate::config::PoolConfig;
use crate::worker::{dispatch_loop, Lifespan, Task, ThreadWorker, WorkerStats};

/// State workers can reach through their container reference
pub struct PoolShared {
    num_workers: usize,
    completed: AtomicU64,
}

impl PoolShared {
    #[inline]
    pub(crate) fn note_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks finished across all workers
    #[inline]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
}

/// Snapshot of pool counters
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub completed: u64,
    pub workers: Vec<WorkerStats>,
}

/// Fixed-size pool of worker threads
pub struct ThreadPool {
    workers: Vec<ThreadWorker>,
    shared: Arc<PoolShared>,
    cursor: AtomicUsize,
    config: PoolConfig,
}

impl ThreadPool {
    /// Start a pool running the default dispatch loop on every worker
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        Self::with_lifespan(config, dispatch_loop)
    }

    /// Start a pool configured from the environment
    pub fn from_env() -> PoolResult<Self> {
        Self::new(PoolConfig::from_env())
    }

    /// Start a pool whose workers run `lifespan` as their thread body
    pub fn with_lifespan(config: PoolConfig, lifespan: Lifespan) -> PoolResult<Self> {
        config.validate()?;
        if config.debug_logging {
            config.print();
        }

        let shared = Arc::new(PoolShared {
            num_workers: config.num_workers,
            completed: AtomicU64::new(0),
        });

        // Workers spawned before a failure are shut down by their Drop
        let workers = (0..config.num_workers)
            .map(|id| ThreadWorker::spawn(id, &config, lifespan, Arc::downgrade(&shared)))
            .collect::<PoolResult<Vec<_>>>()?;

        kinfo!("taskpool started with {} workers", workers.len());

        Ok(Self {
            workers,
            shared,
            cursor: AtomicUsize::new(0),
            config,
        })
    }

    /// Run `f` on the next worker in round-robin order
    pub fn submit<F, V>(&self, f: F) -> PoolResult<ResultHandle>
    where
        F: FnOnce() -> V + Send + 'static,
        V: ResultScalar,
    {
        self.submit_to(self.next_worker(), f)
    }

    /// Run `f` on worker `index`
    pub fn submit_to<F, V>(&self, index: usize, f: F) -> PoolResult<ResultHandle>
    where
        F: FnOnce() -> V + Send + 'static,
        V: ResultScalar,
    {
        let worker = self.worker(index)?;
        let (completer, handle) = handoff(worker.shared().recollector())?;
        worker.submit(Task::with_result(f, completer))?;
        Ok(handle)
    }

    /// Run `f` without a result
    pub fn execute<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.worker(self.next_worker())?.submit(Task::detached(f))
    }

    fn next_worker(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    fn worker(&self, index: usize) -> PoolResult<&ThreadWorker> {
        self.workers.get(index).ok_or(PoolError::InvalidWorker(index))
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn worker_stats(&self, index: usize) -> PoolResult<WorkerStats> {
        Ok(self.worker(index)?.stats())
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            completed: self.shared.completed(),
            workers: self.workers.iter().map(ThreadWorker::stats).collect(),
        }
    }

    /// Stop accepting work, let every worker drain its queue, join them.
    ///
    /// Returns the first join failure, after joining the rest.
    pub fn shutdown(mut self) -> PoolResult<()> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> PoolResult<()> {
        if self.workers.is_empty() {
            return Ok(());
        }
        kdebug!("taskpool shutting down {} workers", self.workers.len());

        for worker in &self.workers {
            worker.request_shutdown();
        }

        let mut first_err = None;
        for worker in &mut self.workers {
            if let Err(e) = worker.join() {
                kwarn!("worker {} did not stop cleanly: {}", worker.id(), e);
                first_err.get_or_insert(e);
            }
        }

        kinfo!("taskpool stopped, {} tasks completed", self.shared.completed());
        self.workers.clear();
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let _ = self.shutdown_inner();
    }
}
