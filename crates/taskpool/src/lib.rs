//! # taskpool - Worker thread pool with recyclable async results
//!
//! A fixed set of OS worker threads, each with its own task queue, wake
//! semaphore and free list of completion objects. Submitting a closure
//! returns a `ResultHandle` that the caller polls or waits on; the worker
//! writes the closure's scalar return value into it and signals.
//!
//! ## Features
//!
//! - **No per-task allocation in steady state**: completion objects are
//!   recycled through the producing worker's `Recollector`
//! - **Single use by construction**: `wait` and `signal` consume their half
//! - **Scalar payloads**: `i32`, `u32`, `u64`, `f64` and opaque pointers
//! - **Graceful shutdown**: queued tasks are drained before workers stop
//!
//! ## Quick Start
//!
//! ```ignore
//! use taskpool::{Runtime, PoolConfig};
//!
//! fn main() {
//!     let mut runtime = Runtime::new(PoolConfig::from_env()).unwrap();
//!
//!     let sum = runtime.block_on(|pool| {
//!         let handles: Vec<_> = (0..4u64)
//!             .map(|i| pool.submit(move || i * i).unwrap())
//!             .collect();
//!         handles
//!             .into_iter()
//!             .map(|h| h.wait_as::<u64>().unwrap())
//!             .sum::<u64>()
//!     });
//!     assert_eq!(sum, Ok(14));
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │          submit() -> ResultHandle, poll(), wait()           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ThreadPool                             │
//! │          round-robin / explicit worker routing              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker 0 │      │  Worker 1 │      │  Worker N │
//!    │ queue+sem │      │ queue+sem │      │ queue+sem │
//!    │ recollect │      │ recollect │      │ recollect │
//!    └───────────┘      └───────────┘      └───────────┘
//! ```

// Re-export core types
pub use taskpool_core::{
    OwnerId,
    ResultStatus,
    WorkerState,
    OpaquePtr,
    ResultScalar,
    ResultValue,
    Recollector,
    RecollectorStats,
    PoolError,
    PoolResult,
    WorkerError,
};

// Re-export kprint macros for debug logging
pub use taskpool_core::{kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use taskpool_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use taskpool_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use taskpool_runtime::{
    PoolConfig,
    ConfigError,
    ThreadPool,
    PoolStats,
    WorkerStats,
    ResultHandle,
    Completer,
    AsyncResult,
    Lifespan,
    ContainerRef,
    WorkerShared,
    dispatch_loop,
    current_worker_id,
    handoff_detached,
};

/// Runtime handle owning a thread pool
///
/// Thin lifecycle wrapper: the pool starts in `new` and is drained and
/// joined by `shutdown`, `block_on`, or drop.
pub struct Runtime {
    pool: Option<ThreadPool>,
}

impl Runtime {
    /// Create a runtime and start its workers
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        init_logging();
        Ok(Self {
            pool: Some(ThreadPool::new(config)?),
        })
    }

    /// Create a runtime from compile-time defaults and `TP_*` overrides
    pub fn from_env() -> PoolResult<Self> {
        Self::new(PoolConfig::from_env())
    }

    /// Run `f` against the pool, then shut down.
    ///
    /// This is the typical entry point for applications. Fails with
    /// `ShuttingDown` if the runtime was already shut down.
    pub fn block_on<F, T>(&mut self, f: F) -> PoolResult<T>
    where
        F: FnOnce(&ThreadPool) -> T,
    {
        let pool = self.pool.as_ref().ok_or(PoolError::ShuttingDown)?;
        let result = f(pool);
        self.shutdown();
        Ok(result)
    }

    /// The running pool, `None` after shutdown
    pub fn pool(&self) -> Option<&ThreadPool> {
        self.pool.as_ref()
    }

    /// Submit a value-returning task
    pub fn submit<F, V>(&self, f: F) -> PoolResult<ResultHandle>
    where
        F: FnOnce() -> V + Send + 'static,
        V: ResultScalar,
    {
        self.pool.as_ref().ok_or(PoolError::ShuttingDown)?.submit(f)
    }

    /// Submit a fire-and-forget task
    pub fn execute<F>(&self, f: F) -> PoolResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.as_ref().ok_or(PoolError::ShuttingDown)?.execute(f)
    }

    /// Drain and join all workers. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            if let Err(e) = pool.shutdown() {
                kerror!("pool shutdown: {}", e);
            }
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig::new().num_workers(2)
    }

    #[test]
    fn test_block_on_returns_value() {
        let mut runtime = Runtime::new(config()).unwrap();
        let sum = runtime.block_on(|pool| {
            let handles: Vec<_> = (0..4u64)
                .map(|i| pool.submit(move || i * i).unwrap())
                .collect();
            handles
                .into_iter()
                .map(|h| h.wait_as::<u64>().unwrap())
                .sum::<u64>()
        });
        assert_eq!(sum, Ok(14));
        assert!(runtime.pool().is_none());
        assert_eq!(runtime.block_on(|_| ()), Err(PoolError::ShuttingDown));
    }

    #[test]
    fn test_submit_after_shutdown() {
        let mut runtime = Runtime::new(config()).unwrap();
        assert_eq!(runtime.submit(|| 1i32).unwrap().wait_as::<i32>().unwrap(), 1);
        runtime.shutdown();
        assert_eq!(runtime.submit(|| 1i32).err(), Some(PoolError::ShuttingDown));
        assert_eq!(runtime.execute(|| {}).err(), Some(PoolError::ShuttingDown));
        // Second shutdown is a no-op
        runtime.shutdown();
    }

    #[test]
    fn test_pointer_payload_through_pool() {
        static TABLE: [u32; 3] = [10, 20, 30];
        let mut runtime = Runtime::new(config()).unwrap();
        let p = runtime.block_on(|pool| {
            pool.submit(|| OpaquePtr::from_ref(&TABLE[1]))
                .unwrap()
                .wait_as::<OpaquePtr>()
                .unwrap()
        })
        .unwrap();
        assert_eq!(unsafe { *(p.as_ptr() as *const u32) }, 20);
    }
}
