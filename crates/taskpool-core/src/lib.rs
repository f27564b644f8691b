//! # taskpool-core
//!
//! Core types and traits for the taskpool engine.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Semaphores, async results and worker threads live in `taskpool-runtime`.
//!
//! ## Modules
//!
//! - `id` - Owner identifier of a worker's recollector
//! - `state` - Completion status and worker lifecycle enums
//! - `value` - Tagged scalar payload carried by an async result
//! - `recollector` - Per-owner free list of recyclable objects
//! - `traits` - Collaborator traits (task queue, recollectable)
//! - `error` - Error types
//! - `spinlock` - Internal spinlock primitive
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod value;
pub mod recollector;
pub mod error;
pub mod spinlock;
pub mod traits;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::OwnerId;
pub use state::{ResultStatus, WorkerState};
pub use value::{OpaquePtr, ResultScalar, ResultValue};
pub use recollector::{Recollector, RecollectorStats};
pub use error::{PoolError, PoolResult, ReleaseError, WorkerError};
pub use spinlock::SpinLock;
pub use traits::{Recollectable, TaskQueue};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Limits shared by the core and the runtime
pub mod constants {
    /// Maximum workers per pool (one owner id each, `u8::MAX` is the heap sentinel)
    pub const MAX_WORKERS: usize = 64;

    /// Upper bound for a single recollector's capacity
    pub const MAX_RECOLLECTOR_CAPACITY: usize = 1 << 16;

    cfg_if::cfg_if! {
        if #[cfg(feature = "debug-assertions")] {
            /// Refuse to free-list an object that is still in flight
            #[inline]
            pub(crate) fn check_quiescent<T: crate::traits::Recollectable>(item: &T) {
                assert!(
                    item.is_quiescent(),
                    "object released to recollector {} while still in flight",
                    item.owner()
                );
            }
        } else {
            #[inline(always)]
            pub(crate) fn check_quiescent<T: crate::traits::Recollectable>(_item: &T) {}
        }
    }
}
