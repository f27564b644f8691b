//! Single-use completion object
//!
//! An `AsyncResult` carries one scalar from a producer thread to a consumer
//! thread. The status word is the only synchronization edge for the
//! payload: the producer writes the value, then release-stores `Done`; the
//! consumer acquire-loads `Done`, then reads the value. The semaphore only
//! exists so a consumer that arrives early can sleep instead of spin.
//!
//! # Halves
//!
//! `handoff()` splits one result into a `Completer` (producer) and a
//! `ResultHandle` (consumer). Both halves consume themselves on their
//! terminal operation, so a second signal or a second wait does not
//! compile. Whichever half is dropped last tears the result down (`ruin`)
//! and returns it to the recollector it came from, or frees it when that
//! recollector is full.
//!
//! ```text
//!   recollector ──acquire──▶ init(from) ──▶ Completer ──write/signal──┐
//!        ▲                        │                                   │
//!        │                        └──────▶ ResultHandle ──wait/poll───┤
//!        └──────────── release ◀── ruin ◀── last half dropped ◀───────┘
//! ```

use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskpool_core::error::{PoolError, PoolResult, ReleaseError};
use taskpool_core::{kdebug, ktrace};
use taskpool_core::{
    OpaquePtr, OwnerId, Recollectable, Recollector, ResultScalar, ResultStatus, ResultValue,
};

use crate::sync::{PlatformSemaphore, Semaphore};

/// Recollector specialised for async results
pub type ResultRecollector<S = PlatformSemaphore> = Recollector<Box<AsyncResult<S>>>;

/// Number of halves that hold a result while it is in flight
const HALVES: u8 = 2;

/// The completion object itself.
///
/// Lives in a `Box` for its whole life so the semaphore and status word
/// never move while a half points at them. The semaphore type is a
/// parameter only so tests can substitute one; everything else uses the
/// platform default.
#[derive(Debug)]
pub struct AsyncResult<S: Semaphore = PlatformSemaphore> {
    value: UnsafeCell<Option<ResultValue>>,
    status: AtomicU8,
    from: OwnerId,
    semaphore: S,
    /// Live halves; the one that takes this to zero tears down
    holders: AtomicU8,
}

// Safety: `value` is written only by the single Completer before the
// Release store of Done, and read only by the single ResultHandle after an
// Acquire load observes Done. Everything else is atomic or the semaphore.
unsafe impl<S: Semaphore> Sync for AsyncResult<S> {}

impl<S: Semaphore> AsyncResult<S> {
    /// Raw heap allocation, owned by nobody (`OwnerId::HEAP`)
    pub fn alloc() -> Box<Self> {
        Self::alloc_owned(OwnerId::HEAP)
    }

    /// Raw heap allocation pre-tagged for `owner`, so it can be put on that
    /// owner's free list before its first use
    pub fn alloc_owned(owner: OwnerId) -> Box<Self> {
        Box::new(Self {
            value: UnsafeCell::new(None),
            status: AtomicU8::new(ResultStatus::Pending as u8),
            from: owner,
            semaphore: S::uninit(),
            holders: AtomicU8::new(0),
        })
    }

    /// Release a heap allocation
    pub fn free(self: Box<Self>) {
        drop(self);
    }

    /// Prepare a Pending result tagged with `from`.
    ///
    /// Fails with `ResourceExhausted` if the semaphore cannot be created;
    /// the result must then not be handed out.
    pub fn init(&mut self, from: OwnerId) -> PoolResult<()> {
        self.status.store(ResultStatus::Pending as u8, Ordering::Release);
        *self.value.get_mut() = None;
        self.semaphore.init(0).map_err(PoolError::ResourceExhausted)?;
        self.from = from;
        Ok(())
    }

    /// Release the semaphore and reset to Pending.
    ///
    /// `&mut self` guarantees no thread can be blocked on it.
    pub fn ruin(&mut self) {
        self.semaphore.destroy();
        self.status.store(ResultStatus::Pending as u8, Ordering::Release);
        *self.value.get_mut() = None;
    }

    /// Owner id this result was initialized with
    #[inline]
    pub fn owner(&self) -> OwnerId {
        self.from
    }

    /// Atomically publish `status` (Release)
    #[inline]
    pub fn commit(&self, status: ResultStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Non-blocking status read (Acquire)
    #[inline]
    pub fn poll(&self) -> ResultStatus {
        ResultStatus::from(self.status.load(Ordering::Acquire))
    }

    /// Publish Done and wake the waiter, if any
    #[inline]
    pub fn signal(&self) {
        self.commit(ResultStatus::Done);
        self.semaphore.post();
    }

    /// Block until Done. Returns at once if Done was already published.
    #[inline]
    pub fn wait(&self) {
        if self.poll().is_done() {
            return;
        }
        self.semaphore.wait();
    }

    /// Bounded `wait`; `true` once Done
    fn wait_for(&self, timeout: Duration) -> bool {
        if self.poll().is_done() {
            return true;
        }
        self.semaphore.wait_timeout(timeout)
    }

    /// Producer-side payload store.
    ///
    /// # Safety
    ///
    /// Caller is the only producer and has not signalled yet.
    #[inline]
    unsafe fn store(&self, value: ResultValue) {
        *self.value.get() = Some(value);
    }

    /// Consumer-side payload read.
    ///
    /// # Safety
    ///
    /// Caller is the only consumer and has observed Done with Acquire.
    #[inline]
    unsafe fn load(&self) -> Option<ResultValue> {
        *self.value.get()
    }
}

impl<S: Semaphore> Recollectable for AsyncResult<S> {
    #[inline]
    fn owner(&self) -> OwnerId {
        self.from
    }

    fn is_quiescent(&self) -> bool {
        self.holders.load(Ordering::Acquire) == 0 && !self.semaphore.is_live()
    }
}

/// One half's claim on an in-flight result
struct Link<S: Semaphore> {
    ptr: NonNull<AsyncResult<S>>,
    home: Option<Arc<ResultRecollector<S>>>,
}

impl<S: Semaphore> Link<S> {
    #[inline]
    fn result(&self) -> &AsyncResult<S> {
        // Safety: the allocation lives until the last Link is dropped
        unsafe { self.ptr.as_ref() }
    }
}

impl<S: Semaphore> Drop for Link<S> {
    fn drop(&mut self) {
        if self.result().holders.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        // Safety: we were the last holder; the pointer came from
        // Box::leak in `handoff` and nobody else can reach it now
        let mut boxed = unsafe { Box::from_raw(self.ptr.as_ptr()) };
        boxed.ruin();

        let Some(home) = self.home.take() else {
            boxed.free();
            return;
        };
        match home.release(boxed) {
            Ok(()) => ktrace!("result recycled to {}", home.owner()),
            Err(ReleaseError::Full(result)) => {
                kdebug!("recollector {} full, freeing result", home.owner());
                result.free();
            }
            Err(ReleaseError::Foreign(result)) => {
                kdebug!(
                    "result owned by {} refused by recollector {}",
                    result.owner(),
                    home.owner()
                );
                result.free();
            }
        }
    }
}

/// Obtain a fresh result from `home` (or the heap on a miss) and split it
/// into its producer and consumer halves.
pub fn handoff<S: Semaphore>(
    home: &Arc<ResultRecollector<S>>,
) -> PoolResult<(Completer<S>, ResultHandle<S>)> {
    let boxed = home
        .acquire()
        .unwrap_or_else(|| AsyncResult::alloc_owned(home.owner()));
    split(boxed, home.owner(), Some(Arc::clone(home)))
}

/// Like `handoff`, for results not tied to any worker.
///
/// The result is freed to the heap when both halves are gone.
pub fn handoff_detached() -> PoolResult<(Completer, ResultHandle)> {
    split(AsyncResult::alloc(), OwnerId::HEAP, None)
}

fn split<S: Semaphore>(
    mut boxed: Box<AsyncResult<S>>,
    from: OwnerId,
    home: Option<Arc<ResultRecollector<S>>>,
) -> PoolResult<(Completer<S>, ResultHandle<S>)> {
    // On failure the box is dropped here, never put back on the free list
    boxed.init(from)?;
    boxed.holders.store(HALVES, Ordering::Relaxed);
    let ptr = NonNull::from(Box::leak(boxed));

    let completer = Completer {
        link: Link { ptr, home: home.clone() },
        signalled: false,
    };
    let handle = ResultHandle {
        link: Link { ptr, home },
    };
    Ok((completer, handle))
}

/// Producer half: writes the value and signals completion.
///
/// Dropping a completer without signalling still signals, with no value,
/// so a waiting consumer never sleeps forever; it sees `PoolError::NoValue`.
pub struct Completer<S: Semaphore = PlatformSemaphore> {
    link: Link<S>,
    signalled: bool,
}

// Safety: the completer is the unique producer of its result
unsafe impl<S: Semaphore> Send for Completer<S> {}

impl<S: Semaphore> Completer<S> {
    /// Store a value of static type `V`
    #[inline]
    pub fn write<V: ResultScalar>(&mut self, value: V) {
        // Safety: unique producer, not yet signalled (signal consumes self)
        unsafe { self.link.result().store(value.into_value()) }
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write(value)
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write(value)
    }

    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.write(value)
    }

    #[inline]
    pub fn write_ptr(&mut self, value: OpaquePtr) {
        self.write(value)
    }

    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.write(value)
    }

    /// Store an already-tagged value
    #[inline]
    pub fn write_value(&mut self, value: ResultValue) {
        // Safety: as in `write`
        unsafe { self.link.result().store(value) }
    }

    /// Publish Done and wake the consumer
    pub fn signal(mut self) {
        self.signalled = true;
        self.link.result().signal();
    }

    /// `write` followed by `signal`
    pub fn complete<V: ResultScalar>(mut self, value: V) {
        self.write(value);
        self.signal();
    }

    /// Owner the result returns to
    #[inline]
    pub fn owner(&self) -> OwnerId {
        self.link.result().owner()
    }
}

impl<S: Semaphore> Drop for Completer<S> {
    fn drop(&mut self) {
        if !self.signalled {
            kdebug!("completer for {} dropped unsignalled", self.owner());
            self.link.result().signal();
        }
    }
}

/// Consumer half: polls or waits, then reads the value exactly once.
pub struct ResultHandle<S: Semaphore = PlatformSemaphore> {
    link: Link<S>,
}

// Safety: the handle is the unique consumer of its result
unsafe impl<S: Semaphore> Send for ResultHandle<S> {}

impl<S: Semaphore> ResultHandle<S> {
    /// Non-blocking status check; never mutates
    #[inline]
    pub fn poll(&self) -> ResultStatus {
        self.link.result().poll()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.poll().is_done()
    }

    /// Owner the result returns to
    #[inline]
    pub fn owner(&self) -> OwnerId {
        self.link.result().owner()
    }

    /// Block until the producer signals, then take the value
    pub fn wait(self) -> PoolResult<ResultValue> {
        self.link.result().wait();
        self.take()
    }

    /// `wait`, then read as the static type `T`
    pub fn wait_as<T: ResultScalar>(self) -> PoolResult<T> {
        let value = self.wait()?;
        T::from_value(&value).ok_or(PoolError::TypeMismatch {
            expected: T::KIND,
            found: value.kind(),
        })
    }

    /// Take the value if already Done, otherwise hand the handle back
    pub fn try_take(self) -> Result<PoolResult<ResultValue>, Self> {
        if self.is_done() {
            Ok(self.take())
        } else {
            Err(self)
        }
    }

    /// Bounded `wait`. On timeout the handle is handed back and can be
    /// waited on again.
    pub fn wait_timeout(self, timeout: Duration) -> Result<PoolResult<ResultValue>, Self> {
        if self.link.result().wait_for(timeout) {
            Ok(self.take())
        } else {
            Err(self)
        }
    }

    fn take(self) -> PoolResult<ResultValue> {
        let result = self.link.result();
        // The Acquire here pairs with the producer's Release in `signal`,
        // also on the path where we were woken by the semaphore
        if !result.poll().is_done() {
            return Err(PoolError::NoValue);
        }
        // Safety: unique consumer, Done observed with Acquire
        unsafe { result.load() }.ok_or(PoolError::NoValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn home(owner: u8, capacity: usize) -> Arc<ResultRecollector> {
        Arc::new(Recollector::new(OwnerId::new(owner), capacity))
    }

    fn addr(handle: &ResultHandle) -> usize {
        handle.link.ptr.as_ptr() as usize
    }

    fn handoff_across_threads<T>(value: T) -> T
    where
        T: ResultScalar + PartialEq + std::fmt::Debug,
    {
        let (mut completer, handle) = handoff_detached().unwrap();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            completer.write(value);
            completer.signal();
        });
        let got = handle.wait_as::<T>().unwrap();
        producer.join().unwrap();
        got
    }

    #[test]
    fn test_handoff_every_scalar() {
        assert_eq!(handoff_across_threads(-17i32), -17);
        assert_eq!(handoff_across_threads(0xdead_beefu32), 0xdead_beef);
        assert_eq!(handoff_across_threads(u64::MAX - 1), u64::MAX - 1);
        assert_eq!(handoff_across_threads(2.5f64), 2.5);

        static TARGET: u64 = 7;
        let p = OpaquePtr::from_ref(&TARGET);
        assert_eq!(handoff_across_threads(p), p);
    }

    #[test]
    fn test_typed_writers() {
        let (mut c, h) = handoff_detached().unwrap();
        c.write_u32(5);
        c.signal();
        assert_eq!(h.wait().unwrap(), ResultValue::UInt32(5));

        let (mut c, h) = handoff_detached().unwrap();
        c.write_f64(0.25);
        c.signal();
        assert_eq!(h.wait().unwrap().as_f64(), Some(0.25));
    }

    #[test]
    fn test_no_wait_after_done() {
        let (completer, handle) = handoff_detached().unwrap();
        completer.complete(9u64);

        let start = Instant::now();
        assert_eq!(handle.wait().unwrap(), ResultValue::UInt64(9));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_poll_monotonic() {
        let (mut completer, handle) = handoff_detached().unwrap();
        assert_eq!(handle.poll(), ResultStatus::Pending);
        completer.write_i32(1);
        // Written but not signalled: still Pending
        assert_eq!(handle.poll(), ResultStatus::Pending);
        completer.signal();
        for _ in 0..10 {
            assert_eq!(handle.poll(), ResultStatus::Done);
        }
    }

    #[test]
    fn test_wait_as_mismatch() {
        let (c, h) = handoff_detached().unwrap();
        c.complete(3i32);
        assert_eq!(
            h.wait_as::<u64>(),
            Err(PoolError::TypeMismatch { expected: "u64", found: "i32" })
        );
    }

    #[test]
    fn test_try_take() {
        let (c, h) = handoff_detached().unwrap();
        let h = match h.try_take() {
            Err(h) => h,
            Ok(_) => panic!("taken before signal"),
        };
        c.complete(4u32);
        assert_eq!(h.try_take().ok().unwrap().unwrap(), ResultValue::UInt32(4));
    }

    #[test]
    fn test_wait_timeout_then_wait() {
        let (c, h) = handoff_detached().unwrap();
        let h = match h.wait_timeout(Duration::from_millis(20)) {
            Err(h) => h,
            Ok(_) => panic!("completed without a producer"),
        };
        let producer = thread::spawn(move || c.complete(11u64));
        assert_eq!(h.wait().unwrap().as_u64(), Some(11));
        producer.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_unbounded() {
        for timeout in [Duration::MAX, Duration::from_secs(i64::MAX as u64)] {
            let (c, h) = handoff_detached().unwrap();
            let producer = thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                c.complete(8u32);
            });
            match h.wait_timeout(timeout) {
                Ok(value) => assert_eq!(value.unwrap().as_u32(), Some(8)),
                Err(h) => panic!("timed out early, status {:?}", h.poll()),
            }
            producer.join().unwrap();
        }
    }

    /// Semaphore whose creation always fails
    #[derive(Debug)]
    struct ExhaustedSemaphore;

    impl Semaphore for ExhaustedSemaphore {
        fn uninit() -> Self {
            ExhaustedSemaphore
        }
        fn init(&mut self, _initial: u32) -> Result<(), i32> {
            Err(libc::ENOSPC)
        }
        fn destroy(&mut self) {}
        fn is_live(&self) -> bool {
            false
        }
        fn post(&self) {}
        fn wait(&self) {}
        fn try_wait(&self) -> bool {
            false
        }
        fn wait_timeout(&self, _timeout: Duration) -> bool {
            false
        }
    }

    #[test]
    fn test_init_failure_discards_result() {
        let owner = OwnerId::new(5);
        let home: Arc<ResultRecollector<ExhaustedSemaphore>> =
            Arc::new(Recollector::new(owner, 4));
        home.release(AsyncResult::alloc_owned(owner)).unwrap();
        assert_eq!(home.len(), 1);

        let err = handoff(&home).err().unwrap();
        assert_eq!(err, PoolError::ResourceExhausted(libc::ENOSPC));
        // Neither handed out nor returned to the free list
        assert!(home.is_empty());
        let stats = home.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.recycled, 1);

        // Miss path fails the same way
        assert_eq!(
            handoff(&home).err(),
            Some(PoolError::ResourceExhausted(libc::ENOSPC))
        );
        assert!(home.is_empty());
    }

    #[test]
    fn test_raw_init_failure() {
        let mut raw: Box<AsyncResult<ExhaustedSemaphore>> = AsyncResult::alloc();
        assert_eq!(
            raw.init(OwnerId::new(1)),
            Err(PoolError::ResourceExhausted(libc::ENOSPC))
        );
        // Owner tag is only taken on success
        assert_eq!(raw.owner(), OwnerId::HEAP);
        raw.free();
    }

    #[test]
    fn test_dropped_completer_reports_no_value() {
        let (c, h) = handoff_detached().unwrap();
        let producer = thread::spawn(move || drop(c));
        assert_eq!(h.wait(), Err(PoolError::NoValue));
        producer.join().unwrap();
    }

    #[test]
    fn test_signal_without_write() {
        let (c, h) = handoff_detached().unwrap();
        c.signal();
        assert_eq!(h.wait(), Err(PoolError::NoValue));
    }

    #[test]
    fn test_recycled_after_both_halves() {
        let home = home(3, 4);
        let (c, h) = handoff(&home).unwrap();
        assert_eq!(h.owner(), OwnerId::new(3));
        assert_eq!(c.owner(), OwnerId::new(3));

        c.complete(1u64);
        // Completer gone, handle alive: not yet on the free list
        assert!(home.is_empty());
        h.wait().unwrap();
        assert_eq!(home.len(), 1);
    }

    #[test]
    fn test_consumer_drops_first() {
        let home = home(0, 4);
        let (c, h) = handoff(&home).unwrap();
        drop(h);
        assert!(home.is_empty());
        c.complete(2i32);
        assert_eq!(home.len(), 1);
    }

    #[test]
    fn test_two_misses_then_reuse() {
        let home = home(1, 4);

        let (c1, h1) = handoff(&home).unwrap();
        let (c2, h2) = handoff(&home).unwrap();
        assert_eq!(home.stats().misses, 2);
        let first = [addr(&h1), addr(&h2)];

        c1.complete(1u64);
        c2.complete(2u64);
        assert_eq!(h1.wait().unwrap().as_u64(), Some(1));
        assert_eq!(h2.wait().unwrap().as_u64(), Some(2));
        assert_eq!(home.len(), 2);

        let (c3, h3) = handoff(&home).unwrap();
        assert!(first.contains(&addr(&h3)));
        assert_eq!(home.stats().hits, 1);
        // Reused result starts over as Pending with its owner tag intact
        assert_eq!(h3.poll(), ResultStatus::Pending);
        assert_eq!(h3.owner(), OwnerId::new(1));
        c3.complete(3u64);
        assert_eq!(h3.wait().unwrap().as_u64(), Some(3));
    }

    #[test]
    fn test_full_recollector_frees() {
        let home = home(0, 1);
        let pairs: Vec<_> = (0..3).map(|_| handoff(&home).unwrap()).collect();
        for (c, h) in pairs {
            c.complete(0u32);
            h.wait().unwrap();
        }
        assert_eq!(home.len(), 1);
        assert_eq!(home.stats().overflowed, 2);
    }

    #[test]
    fn test_free_listed_results_are_quiescent() {
        let home = home(2, 4);
        let (c, h) = handoff(&home).unwrap();
        c.complete(5u64);
        h.wait().unwrap();
        let parked = home.acquire().unwrap();
        assert!(parked.is_quiescent());
        assert_eq!(parked.poll(), ResultStatus::Pending);
        assert_eq!(Recollectable::owner(&*parked), OwnerId::new(2));
    }

    #[test]
    fn test_raw_lifecycle() {
        let mut raw: Box<AsyncResult> = AsyncResult::alloc();
        assert_eq!(raw.owner(), OwnerId::HEAP);
        raw.init(OwnerId::new(4)).unwrap();
        assert_eq!(raw.owner(), OwnerId::new(4));
        assert_eq!(raw.poll(), ResultStatus::Pending);
        raw.signal();
        raw.wait();
        assert_eq!(raw.poll(), ResultStatus::Done);
        raw.ruin();
        assert_eq!(raw.poll(), ResultStatus::Pending);
        assert_eq!(raw.owner(), OwnerId::new(4));
        raw.free();
    }

    #[test]
    fn test_many_concurrent_handoffs() {
        let home = home(0, 16);
        let mut handles = Vec::new();
        let mut producers = Vec::new();
        for i in 0..200u64 {
            let (c, h) = handoff(&home).unwrap();
            handles.push((i, h));
            producers.push(thread::spawn(move || c.complete(i * 3)));
        }
        for (i, h) in handles {
            assert_eq!(h.wait().unwrap().as_u64(), Some(i * 3));
        }
        for p in producers {
            p.join().unwrap();
        }
        assert!(home.len() <= 16);
    }
}
