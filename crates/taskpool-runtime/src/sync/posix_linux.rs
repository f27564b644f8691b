//! POSIX unnamed semaphore (`sem_t`)
//!
//! The `sem_t` lives in its own heap cell so its address stays fixed for
//! the whole init/destroy lifetime, whatever happens to the owning struct.
//!
//! Blocking calls restart on EINTR. `sem_timedwait` takes an absolute
//! CLOCK_REALTIME deadline, computed at call time.

use super::Semaphore;
use nix::errno::Errno;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::time::Duration;
use taskpool_core::kerror;

const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Linux `sem_t`-backed semaphore
pub struct PosixSemaphore {
    raw: Box<UnsafeCell<MaybeUninit<libc::sem_t>>>,
    live: bool,
}

impl PosixSemaphore {
    #[inline]
    fn as_ptr(&self) -> *mut libc::sem_t {
        self.raw.get() as *mut libc::sem_t
    }

    /// Absolute CLOCK_REALTIME deadline `timeout` from now, `None` when it
    /// does not fit in a `time_t`
    fn deadline(timeout: Duration) -> Option<libc::timespec> {
        let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        // Safety: valid out-pointer; CLOCK_REALTIME always exists
        unsafe {
            libc::clock_gettime(libc::CLOCK_REALTIME, &mut now);
        }
        let secs = libc::time_t::try_from(timeout.as_secs()).ok()?;
        let mut sec = now.tv_sec.checked_add(secs)?;
        let mut nsec = now.tv_nsec as i64 + timeout.subsec_nanos() as i64;
        if nsec >= NSEC_PER_SEC {
            sec = sec.checked_add(1)?;
            nsec -= NSEC_PER_SEC;
        }
        Some(libc::timespec {
            tv_sec: sec,
            tv_nsec: nsec as _,
        })
    }
}

impl Semaphore for PosixSemaphore {
    fn uninit() -> Self {
        Self {
            raw: Box::new(UnsafeCell::new(MaybeUninit::uninit())),
            live: false,
        }
    }

    fn init(&mut self, initial: u32) -> Result<(), i32> {
        self.destroy();
        // Safety: storage is ours and not live; pshared = 0 (process-private)
        let ret = unsafe { libc::sem_init(self.as_ptr(), 0, initial as libc::c_uint) };
        if ret < 0 {
            return Err(Errno::last() as i32);
        }
        self.live = true;
        Ok(())
    }

    fn destroy(&mut self) {
        if !self.live {
            return;
        }
        // Safety: live semaphore, and &mut self means nobody is blocked on it
        unsafe {
            libc::sem_destroy(self.as_ptr());
        }
        self.live = false;
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.live
    }

    fn post(&self) {
        debug_assert!(self.live, "post on a destroyed semaphore");
        // Safety: live semaphore
        if unsafe { libc::sem_post(self.as_ptr()) } < 0 {
            // EOVERFLOW: the count is already at SEM_VALUE_MAX, waiters
            // will find a unit regardless
            kerror!("sem_post failed: {}", Errno::last());
        }
    }

    fn wait(&self) {
        debug_assert!(self.live, "wait on a destroyed semaphore");
        loop {
            // Safety: live semaphore
            if unsafe { libc::sem_wait(self.as_ptr()) } == 0 {
                return;
            }
            match Errno::last() {
                Errno::EINTR => continue,
                e => {
                    kerror!("sem_wait failed: {}", e);
                    return;
                }
            }
        }
    }

    fn try_wait(&self) -> bool {
        debug_assert!(self.live, "try_wait on a destroyed semaphore");
        loop {
            // Safety: live semaphore
            if unsafe { libc::sem_trywait(self.as_ptr()) } == 0 {
                return true;
            }
            if Errno::last() != Errno::EINTR {
                return false;
            }
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        debug_assert!(self.live, "wait_timeout on a destroyed semaphore");
        // Unrepresentable deadline: no finite wait can expire first
        let Some(deadline) = Self::deadline(timeout) else {
            self.wait();
            return true;
        };
        loop {
            // Safety: live semaphore, valid timespec
            if unsafe { libc::sem_timedwait(self.as_ptr(), &deadline) } == 0 {
                return true;
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::ETIMEDOUT => return false,
                e => {
                    kerror!("sem_timedwait failed: {}", e);
                    return false;
                }
            }
        }
    }
}

impl Drop for PosixSemaphore {
    fn drop(&mut self) {
        self.destroy();
    }
}

// Safety: sem_t is designed for concurrent use across threads; the
// lifecycle calls (init/destroy) take &mut self
unsafe impl Send for PosixSemaphore {}
unsafe impl Sync for PosixSemaphore {}
