//! Scalar payload carried by an async result
//!
//! A result carries exactly one scalar. The variant is chosen statically by
//! the writer through `ResultScalar`; readers get `None` back when they ask
//! for a variant other than the one written.

use core::ffi::c_void;
use core::fmt;

/// Opaque pointer payload.
///
/// The pool never dereferences it. Whoever writes it is responsible for the
/// pointee outliving the read on the consumer side.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OpaquePtr(*mut c_void);

// Safety: the pointer is carried, never dereferenced, by the pool
unsafe impl Send for OpaquePtr {}
unsafe impl Sync for OpaquePtr {}

impl OpaquePtr {
    pub const NULL: OpaquePtr = OpaquePtr(core::ptr::null_mut());

    #[inline]
    pub const fn new(ptr: *mut c_void) -> Self {
        OpaquePtr(ptr)
    }

    #[inline]
    pub fn from_ref<T>(r: &T) -> Self {
        OpaquePtr(r as *const T as *mut c_void)
    }

    #[inline]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Debug for OpaquePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaquePtr({:p})", self.0)
    }
}

/// Tagged scalar payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultValue {
    Int32(i32),
    UInt32(u32),
    UInt64(u64),
    Pointer(OpaquePtr),
    Float64(f64),
}

impl ResultValue {
    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            ResultValue::Int32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            ResultValue::UInt32(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            ResultValue::UInt64(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> Option<OpaquePtr> {
        match *self {
            ResultValue::Pointer(v) => Some(v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ResultValue::Float64(v) => Some(v),
            _ => None,
        }
    }

    /// Read as the static type `T`
    #[inline]
    pub fn get<T: ResultScalar>(&self) -> Option<T> {
        T::from_value(self)
    }

    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            ResultValue::Int32(_) => "i32",
            ResultValue::UInt32(_) => "u32",
            ResultValue::UInt64(_) => "u64",
            ResultValue::Pointer(_) => "ptr",
            ResultValue::Float64(_) => "f64",
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Int32(v) => write!(f, "{}i32", v),
            ResultValue::UInt32(v) => write!(f, "{}u32", v),
            ResultValue::UInt64(v) => write!(f, "{}u64", v),
            ResultValue::Pointer(p) => write!(f, "{:p}", p.as_ptr()),
            ResultValue::Float64(v) => write!(f, "{}f64", v),
        }
    }
}

/// Scalar types an async result can carry.
///
/// Implemented for exactly the five payload types; the choice of variant is
/// made by the writer's static type.
pub trait ResultScalar: Copy + Send + 'static {
    /// Variant name, as reported by `ResultValue::kind`
    const KIND: &'static str;

    fn into_value(self) -> ResultValue;
    fn from_value(value: &ResultValue) -> Option<Self>;
}

macro_rules! impl_result_scalar {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl ResultScalar for $ty {
            const KIND: &'static str = $kind;

            #[inline]
            fn into_value(self) -> ResultValue {
                ResultValue::$variant(self)
            }

            #[inline]
            fn from_value(value: &ResultValue) -> Option<Self> {
                match *value {
                    ResultValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for ResultValue {
            #[inline]
            fn from(v: $ty) -> Self {
                ResultValue::$variant(v)
            }
        }
    };
}

impl_result_scalar!(i32, Int32, "i32");
impl_result_scalar!(u32, UInt32, "u32");
impl_result_scalar!(u64, UInt64, "u64");
impl_result_scalar!(OpaquePtr, Pointer, "ptr");
impl_result_scalar!(f64, Float64, "f64");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_dispatch_picks_variant() {
        assert_eq!(7i32.into_value(), ResultValue::Int32(7));
        assert_eq!(7u32.into_value(), ResultValue::UInt32(7));
        assert_eq!(7u64.into_value(), ResultValue::UInt64(7));
        assert_eq!(1.5f64.into_value(), ResultValue::Float64(1.5));
    }

    #[test]
    fn test_wrong_accessor_is_none() {
        let v = ResultValue::UInt64(42);
        assert_eq!(v.as_u64(), Some(42));
        assert_eq!(v.as_u32(), None);
        assert_eq!(v.as_i32(), None);
        assert_eq!(v.as_f64(), None);
        assert!(v.as_ptr().is_none());
        assert_eq!(v.get::<u64>(), Some(42));
        assert_eq!(v.get::<i32>(), None);
    }

    #[test]
    fn test_pointer_payload() {
        let target = 99u32;
        let p = OpaquePtr::from_ref(&target);
        let v: ResultValue = p.into();
        let back = v.as_ptr().unwrap();
        assert!(!back.is_null());
        assert_eq!(unsafe { *(back.as_ptr() as *const u32) }, 99);
        assert!(OpaquePtr::NULL.is_null());
    }

    #[test]
    fn test_kind_and_display() {
        assert_eq!(ResultValue::Int32(-3).kind(), "i32");
        assert_eq!(ResultValue::Float64(0.5).kind(), "f64");
        assert_eq!(format!("{}", ResultValue::Int32(-3)), "-3i32");
        assert_eq!(format!("{}", ResultValue::UInt64(42)), "42u64");
        assert_eq!(<u64 as ResultScalar>::KIND, ResultValue::UInt64(0).kind());
        assert_eq!(<OpaquePtr as ResultScalar>::KIND, "ptr");
    }
}
