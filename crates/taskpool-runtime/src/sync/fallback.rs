//! Fallback semaphore using std::sync::Condvar
//!
//! Used on platforms without POSIX unnamed semaphores (macOS deprecates
//! `sem_init`). Less direct but portable. Always compiled so it is
//! exercised by the test suite on every platform.

use super::Semaphore;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Mutex + Condvar counting semaphore
pub struct CondvarSemaphore {
    /// Available units
    count: Mutex<u32>,
    condvar: Condvar,
    live: bool,
}

impl CondvarSemaphore {
    /// A panic while holding the count cannot leave it inconsistent,
    /// so poisoning is ignored
    #[inline]
    fn lock(&self) -> MutexGuard<'_, u32> {
        self.count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Semaphore for CondvarSemaphore {
    fn uninit() -> Self {
        Self {
            count: Mutex::new(0),
            condvar: Condvar::new(),
            live: false,
        }
    }

    fn init(&mut self, initial: u32) -> Result<(), i32> {
        let count = self.count.get_mut().unwrap_or_else(|e| e.into_inner());
        *count = initial;
        self.live = true;
        Ok(())
    }

    fn destroy(&mut self) {
        self.live = false;
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.live
    }

    fn post(&self) {
        debug_assert!(self.live, "post on a destroyed semaphore");
        {
            let mut count = self.lock();
            *count = count.saturating_add(1);
        }
        self.condvar.notify_one();
    }

    fn wait(&self) {
        debug_assert!(self.live, "wait on a destroyed semaphore");
        let mut count = self.lock();
        while *count == 0 {
            count = self.condvar.wait(count).unwrap_or_else(|e| e.into_inner());
        }
        *count -= 1;
    }

    fn try_wait(&self) -> bool {
        debug_assert!(self.live, "try_wait on a destroyed semaphore");
        let mut count = self.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        debug_assert!(self.live, "wait_timeout on a destroyed semaphore");
        // Unrepresentable deadline: no finite wait can expire first
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut count = self.lock();
        while *count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .condvar
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            count = guard;
        }
        *count -= 1;
        true
    }
}
