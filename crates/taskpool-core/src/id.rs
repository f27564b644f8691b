//! Owner identifier type

use core::fmt;

/// Identifies which worker's recollector an async result belongs to.
///
/// This is an 8-bit worker index. The maximum value (u8::MAX) is reserved
/// as the `HEAP` sentinel for results that are not tied to any worker and
/// go straight back to the allocator when torn down.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct OwnerId(u8);

impl OwnerId {
    /// Sentinel owner for results not backed by a recollector
    pub const HEAP: OwnerId = OwnerId(u8::MAX);

    /// Create a new OwnerId from a raw value
    #[inline]
    pub const fn new(id: u8) -> Self {
        OwnerId(id)
    }

    /// Owner id for worker index `index`, `None` if it cannot be represented
    #[inline]
    pub fn for_worker(index: usize) -> Option<Self> {
        if index < u8::MAX as usize {
            Some(OwnerId(index as u8))
        } else {
            None
        }
    }

    /// Get the raw u8 value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Get as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the HEAP sentinel
    #[inline]
    pub const fn is_heap(self) -> bool {
        self.0 == u8::MAX
    }
}

impl From<u8> for OwnerId {
    #[inline]
    fn from(id: u8) -> Self {
        OwnerId(id)
    }
}

impl From<OwnerId> for u8 {
    #[inline]
    fn from(id: OwnerId) -> Self {
        id.0
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_heap() {
            write!(f, "OwnerId(HEAP)")
        } else {
            write!(f, "OwnerId({})", self.0)
        }
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_heap() {
            write!(f, "heap")
        } else {
            write!(f, "w{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_sentinel() {
        assert!(OwnerId::HEAP.is_heap());
        assert!(!OwnerId::new(0).is_heap());
        assert_eq!(OwnerId::HEAP.as_u8(), u8::MAX);
    }

    #[test]
    fn test_for_worker() {
        assert_eq!(OwnerId::for_worker(3), Some(OwnerId::new(3)));
        assert_eq!(OwnerId::for_worker(254), Some(OwnerId::new(254)));
        assert_eq!(OwnerId::for_worker(255), None);
        assert_eq!(OwnerId::for_worker(1000), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", OwnerId::new(7)), "w7");
        assert_eq!(format!("{}", OwnerId::HEAP), "heap");
        assert_eq!(format!("{:?}", OwnerId::new(2)), "OwnerId(2)");
    }

    #[test]
    fn test_conversion() {
        let id: OwnerId = 5u8.into();
        let raw: u8 = id.into();
        assert_eq!(raw, 5);
        assert_eq!(id.as_usize(), 5);
    }
}
