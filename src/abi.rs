//! Raw C surface of the native operation provider.
//!
//! Everything that crosses the boundary is declared here: the result struct
//! layout, the exported entry-point names, their signatures, and the
//! [`Provider`] seam the rest of the crate calls through. Nothing in this
//! module frees or decodes anything; that discipline lives in the guard and
//! bridge layers.

use std::ptr;

use libc::{c_char, c_void};

/// Result wrapper returned by the provider's `operate` entry point.
///
/// Exactly one of the two fields is meaningfully populated for any given call
/// outcome. The wrapper and both payloads are allocated by the provider and
/// owned by the caller until released through the matching `free_*` entry
/// point. Freeing the wrapper never frees the fields.
#[repr(C)]
pub struct RawResult {
    /// NUL-terminated UTF-8 message describing a failed operation, or null.
    pub error_message: *const c_char,
    /// Payload of a successful operation (an `i32` box here), or null.
    pub success: *const c_void,
}

impl Default for RawResult {
    fn default() -> Self {
        RawResult {
            error_message: ptr::null(),
            success: ptr::null(),
        }
    }
}

/// Exported symbol: perform an operation, returning an owned [`RawResult`].
pub const SYM_OPERATE: &[u8] = b"operate\0";
/// Exported symbol: release an `error_message` buffer.
pub const SYM_FREE_NATIVE_STRING: &[u8] = b"free_native_string\0";
/// Exported symbol: release a [`RawResult`] wrapper (fields excluded).
pub const SYM_FREE_TAGGED_RESULT: &[u8] = b"free_tagged_result\0";
/// Exported symbol: release a boxed `i32` success payload.
pub const SYM_FREE_BOXED_INT32: &[u8] = b"free_boxed_int32\0";

/// `operate(op_code, x, y) -> *mut RawResult` (never null by contract).
pub type OperateFn = unsafe extern "C" fn(c_char, i32, i32) -> *mut RawResult;
/// `free_native_string(ptr)`.
pub type FreeStringFn = unsafe extern "C" fn(*mut c_char);
/// `free_tagged_result(ptr)`.
pub type FreeResultFn = unsafe extern "C" fn(*mut RawResult);
/// `free_boxed_int32(ptr)`.
pub type FreeIntFn = unsafe extern "C" fn(*mut i32);

/// The four entry points of a native operation provider.
///
/// Implementations forward to the real library ([`crate::NativeProvider`]) or
/// simulate it in-process ([`crate::MockProvider`]). The deallocators accept
/// null and do nothing; passing a pointer that did not come from the same
/// provider, or releasing the same pointer twice, is undefined behavior in a
/// real library. In this crate the guard types carry that obligation and
/// release each pointer exactly once.
pub trait Provider {
    /// Perform the operation `x <op> y` and transfer ownership of the returned
    /// wrapper (and, transitively, its non-null fields) to the caller.
    ///
    /// # Safety
    /// The returned pointer must be passed to [`free_tagged_result`]
    /// exactly once, after any non-null fields have been consumed.
    ///
    /// [`free_tagged_result`]: Provider::free_tagged_result
    unsafe fn operate(&self, op: u8, x: i32, y: i32) -> *mut RawResult;

    /// Release an `error_message` buffer obtained from this provider.
    ///
    /// # Safety
    /// `ptr` must be null or a live `error_message` pointer from this
    /// provider that has not been released before.
    unsafe fn free_native_string(&self, ptr: *mut c_char);

    /// Release a result wrapper obtained from this provider. The field
    /// payloads are not released.
    ///
    /// # Safety
    /// `ptr` must be null or a live wrapper pointer from this provider that
    /// has not been released before.
    unsafe fn free_tagged_result(&self, ptr: *mut RawResult);

    /// Release a boxed `i32` success payload obtained from this provider.
    ///
    /// # Safety
    /// `ptr` must be null or a live payload pointer from this provider that
    /// has not been released before.
    unsafe fn free_boxed_int32(&self, ptr: *mut i32);
}

// Borrowed providers work everywhere an owned one does, so a test can hand a
// `&MockProvider` to a bridge and still inspect the counters afterwards.
impl<P: Provider + ?Sized> Provider for &P {
    unsafe fn operate(&self, op: u8, x: i32, y: i32) -> *mut RawResult {
        (**self).operate(op, x, y)
    }

    unsafe fn free_native_string(&self, ptr: *mut c_char) {
        (**self).free_native_string(ptr)
    }

    unsafe fn free_tagged_result(&self, ptr: *mut RawResult) {
        (**self).free_tagged_result(ptr)
    }

    unsafe fn free_boxed_int32(&self, ptr: *mut i32) {
        (**self).free_boxed_int32(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_result_default_is_vacant() {
        let raw = RawResult::default();
        assert!(raw.error_message.is_null());
        assert!(raw.success.is_null());
    }

    #[test]
    fn test_symbol_names_are_nul_terminated() {
        for sym in [
            SYM_OPERATE,
            SYM_FREE_NATIVE_STRING,
            SYM_FREE_TAGGED_RESULT,
            SYM_FREE_BOXED_INT32,
        ] {
            assert_eq!(sym.last(), Some(&0u8));
            assert!(!sym[..sym.len() - 1].contains(&0u8));
        }
    }

    #[test]
    fn test_raw_result_layout_is_two_pointers() {
        assert_eq!(
            std::mem::size_of::<RawResult>(),
            2 * std::mem::size_of::<*const c_void>()
        );
    }
}
