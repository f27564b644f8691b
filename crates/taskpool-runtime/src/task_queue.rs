//! Per-worker task queue
//!
//! Unbounded lock-free FIFO backed by crossbeam's `SegQueue`. Any thread
//! may push; only the owning worker pops. Waking the worker is not the
//! queue's job, the caller posts the worker's semaphore after `push`.

use crossbeam_queue::SegQueue;
use taskpool_core::TaskQueue;

/// `TaskQueue` on a segmented lock-free queue
pub struct SegTaskQueue<T> {
    inner: SegQueue<T>,
}

impl<T> SegTaskQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }
}

impl<T> Default for SegTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> TaskQueue<T> for SegTaskQueue<T> {
    #[inline]
    fn push(&self, task: T) {
        self.inner.push(task);
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    #[inline]
    fn len(&self) -> usize {
        self.inner.len()
    }
}
