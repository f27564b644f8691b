//! Per-owner free list of recyclable objects
//!
//! Each worker owns one `Recollector` for the async results it produces.
//! Objects move in on `release` and out on `acquire`, so an object is
//! either on the free list or held by its user, never both.
//!
//! The list is a capped LIFO stack: the most recently torn-down object is
//! handed out first, while it is still warm in cache. Releases beyond the
//! capacity are refused and the caller frees the object to the heap.
//! Release may happen on any thread (the consumer side usually drops
//! last), so the stack sits behind a `SpinLock`.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::error::ReleaseError;
use crate::id::OwnerId;
use crate::spinlock::SpinLock;
use crate::traits::Recollectable;

/// Snapshot of recollector counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecollectorStats {
    /// `acquire` calls served from the free list
    pub hits: u64,
    /// `acquire` calls that found the list empty
    pub misses: u64,
    /// Objects accepted by `release`
    pub recycled: u64,
    /// Objects refused because the list was full
    pub overflowed: u64,
    /// Objects refused because they belong to another owner
    pub foreign: u64,
}

impl RecollectorStats {
    /// Fraction of acquires served without allocating
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Free list of recyclable objects belonging to one owner
pub struct Recollector<T: Recollectable> {
    owner: OwnerId,

    /// LIFO stack of torn-down objects
    free: SpinLock<Vec<T>>,

    capacity: usize,

    hits: AtomicU64,
    misses: AtomicU64,
    recycled: AtomicU64,
    overflowed: AtomicU64,
    foreign: AtomicU64,
}

impl<T: Recollectable> Recollector<T> {
    /// Create an empty recollector holding at most `capacity` objects
    pub fn new(owner: OwnerId, capacity: usize) -> Self {
        Self {
            owner,
            free: SpinLock::new(Vec::with_capacity(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            recycled: AtomicU64::new(0),
            overflowed: AtomicU64::new(0),
            foreign: AtomicU64::new(0),
        }
    }

    /// Take one object off the free list.
    ///
    /// `None` means the list is empty; the caller falls back to a fresh
    /// heap allocation.
    pub fn acquire(&self) -> Option<T> {
        let item = self.free.lock().pop();
        match item {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        item
    }

    /// Put a torn-down object back on the free list.
    ///
    /// Refuses objects tagged with another owner and objects that do not
    /// fit under the capacity; both are handed back in the error.
    pub fn release(&self, item: T) -> Result<(), ReleaseError<T>> {
        if item.owner() != self.owner {
            self.foreign.fetch_add(1, Ordering::Relaxed);
            return Err(ReleaseError::Foreign(item));
        }

        crate::constants::check_quiescent(&item);

        let mut free = self.free.lock();
        if free.len() >= self.capacity {
            drop(free);
            self.overflowed.fetch_add(1, Ordering::Relaxed);
            return Err(ReleaseError::Full(item));
        }
        free.push(item);
        drop(free);
        self.recycled.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Empty the free list, returning everything on it
    pub fn drain(&self) -> Vec<T> {
        core::mem::take(&mut *self.free.lock())
    }

    /// Owner this recollector accepts objects from
    #[inline]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of objects currently on the free list
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RecollectorStats {
        RecollectorStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
            foreign: self.foreign.load(Ordering::Relaxed),
        }
    }
}
