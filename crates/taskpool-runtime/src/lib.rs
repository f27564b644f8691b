//! # taskpool-runtime
//!
//! Platform-specific runtime for the taskpool engine.
//!
//! This crate provides:
//! - Counting semaphores (POSIX `sem_t` on Linux, Condvar fallback elsewhere)
//! - Single-use async results split into producer and consumer halves
//! - Per-worker lock-free task queues
//! - Worker threads and the pool that owns them
//! - Build-time defaults with environment overrides

pub mod config;
pub mod sync;
pub mod async_result;
pub mod task_queue;
pub mod worker;
pub mod pool;

// Re-exports
pub use config::{ConfigError, PoolConfig};
pub use sync::{new_semaphore, PlatformSemaphore, Semaphore};
pub use async_result::{
    handoff, handoff_detached, AsyncResult, Completer, ResultHandle, ResultRecollector,
};
pub use task_queue::SegTaskQueue;
pub use worker::{
    current_worker_id, dispatch_loop, ContainerRef, Lifespan, Task, ThreadWorker, WorkerShared,
    WorkerStats,
};
pub use pool::{PoolShared, PoolStats, ThreadPool};
