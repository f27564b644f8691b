//! Collaborator traits
//!
//! These traits define the interface between the platform-agnostic core
//! and the runtime's concrete queue and result implementations.

use crate::id::OwnerId;

/// An object that can sit on a `Recollector` free list.
pub trait Recollectable: Send {
    /// Owner whose free list the object returns to
    fn owner(&self) -> OwnerId;

    /// True when no producer or consumer can still touch the object.
    ///
    /// Only consulted when the `debug-assertions` feature is enabled.
    fn is_quiescent(&self) -> bool {
        true
    }
}

impl<T: Recollectable + ?Sized> Recollectable for Box<T> {
    #[inline]
    fn owner(&self) -> OwnerId {
        (**self).owner()
    }

    #[inline]
    fn is_quiescent(&self) -> bool {
        (**self).is_quiescent()
    }
}

/// Per-worker holding area for pending task descriptors.
///
/// **Contract:**
/// - `push()` may be called from any thread (multi-producer).
/// - `pop()` is only called by the owning worker thread (single consumer).
/// - Neither operation blocks; waking the consumer is the caller's job.
pub trait TaskQueue<T: Send>: Send + Sync {
    /// Append a task descriptor
    fn push(&self, task: T);

    /// Remove the oldest task descriptor, if any
    fn pop(&self) -> Option<T>;

    /// Approximate number of queued descriptors (for diagnostics)
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
