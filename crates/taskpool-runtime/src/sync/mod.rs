//! Counting semaphores
//!
//! Backs both blocking points of the pool: a consumer waiting on an async
//! result, and a worker waiting for work on its wake semaphore.
//! Platform-specific implementations use the most direct primitive available.

use std::time::Duration;

/// Counting semaphore with an explicit init/destroy lifecycle.
///
/// Storage is created once by `uninit()` and can go through any number of
/// `init` / `destroy` cycles, which is what lets a recycled async result
/// reuse its semaphore memory. Operations other than `init` and `destroy`
/// require a live (initialized) semaphore.
pub trait Semaphore: Send + Sync {
    /// Allocate storage for a semaphore that is not yet usable
    fn uninit() -> Self
    where
        Self: Sized;

    /// Make the semaphore usable with `initial` units.
    ///
    /// Re-initializing a live semaphore destroys it first.
    /// Returns the OS errno when the resource cannot be created.
    fn init(&mut self, initial: u32) -> Result<(), i32>;

    /// Release the OS resource. No-op if not live.
    fn destroy(&mut self);

    /// Whether `init` succeeded and `destroy` has not run since
    fn is_live(&self) -> bool;

    /// Release one unit, waking at most one waiter
    fn post(&self);

    /// Take one unit, blocking until one is available
    fn wait(&self);

    /// Take one unit if available, never blocks
    fn try_wait(&self) -> bool;

    /// Take one unit, giving up after `timeout`.
    ///
    /// Returns `true` if a unit was taken.
    fn wait_timeout(&self, timeout: Duration) -> bool;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod posix_linux;
        pub use posix_linux::PosixSemaphore as PlatformSemaphore;
    } else {
        pub use fallback::CondvarSemaphore as PlatformSemaphore;
    }
}

pub mod fallback;

/// Create and initialize a platform semaphore
pub fn new_semaphore(initial: u32) -> Result<PlatformSemaphore, i32> {
    let mut sem = PlatformSemaphore::uninit();
    sem.init(initial)?;
    Ok(sem)
}
