//! Scoped release guards for native-owned pointers.
//!
//! One guard type per pointer kind the provider hands out. Each guard pairs
//! the pointer with the provider that allocated it and performs the matching
//! release in `Drop`, so the owning scope releases the pointer exactly once
//! no matter how it exits, `?` propagation included.

use std::ffi::CStr;
use std::ptr::NonNull;
use std::str::Utf8Error;

use libc::{c_char, c_void};

use crate::abi::{Provider, RawResult};

/// Owns an `error_message` buffer until dropped.
pub(crate) struct NativeString<'p, P: Provider> {
    provider: &'p P,
    ptr: NonNull<c_char>,
}

impl<'p, P: Provider> NativeString<'p, P> {
    /// Take ownership of a native string.
    ///
    /// # Safety
    /// `ptr` must be a live `error_message` pointer obtained from `provider`
    /// and not owned by anything else.
    pub(crate) unsafe fn new(provider: &'p P, ptr: NonNull<c_char>) -> Self {
        NativeString { provider, ptr }
    }

    /// Borrow the buffer as UTF-8. The buffer is released when the guard
    /// drops whether or not decoding succeeded.
    pub(crate) fn to_str(&self) -> Result<&str, Utf8Error> {
        // Safety: construction guarantees a live NUL-terminated buffer.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }.to_str()
    }
}

impl<P: Provider> Drop for NativeString<'_, P> {
    fn drop(&mut self) {
        // Safety: sole owner; the pointer is released only here.
        unsafe { self.provider.free_native_string(self.ptr.as_ptr()) };
    }
}

/// Owns a [`RawResult`] wrapper until dropped.
///
/// Dropping releases the wrapper only; the field payloads have their own
/// owners (the error string is consumed through [`NativeString`], the success
/// payload is captured before the drop and transferred out).
pub(crate) struct ResultHandle<'p, P: Provider> {
    provider: &'p P,
    ptr: NonNull<RawResult>,
}

impl<'p, P: Provider> ResultHandle<'p, P> {
    /// Take ownership of a result wrapper.
    ///
    /// # Safety
    /// `ptr` must be a live wrapper obtained from `provider` and not owned by
    /// anything else.
    pub(crate) unsafe fn new(provider: &'p P, ptr: NonNull<RawResult>) -> Self {
        ResultHandle { provider, ptr }
    }

    /// The error field, if populated.
    pub(crate) fn error_message(&self) -> Option<NonNull<c_char>> {
        // Safety: construction guarantees a live wrapper.
        let raw = unsafe { self.ptr.as_ref() };
        NonNull::new(raw.error_message as *mut c_char)
    }

    /// The success field, if populated.
    pub(crate) fn success(&self) -> Option<NonNull<c_void>> {
        // Safety: construction guarantees a live wrapper.
        let raw = unsafe { self.ptr.as_ref() };
        NonNull::new(raw.success as *mut c_void)
    }
}

impl<P: Provider> Drop for ResultHandle<'_, P> {
    fn drop(&mut self) {
        // Safety: sole owner; the wrapper is released only here.
        unsafe { self.provider.free_tagged_result(self.ptr.as_ptr()) };
    }
}

/// Owns a boxed `i32` success payload until dropped.
pub(crate) struct BoxedInt<'p, P: Provider> {
    provider: &'p P,
    ptr: NonNull<i32>,
}

impl<'p, P: Provider> BoxedInt<'p, P> {
    /// Take ownership of a boxed integer.
    ///
    /// # Safety
    /// `ptr` must be a live success payload obtained from `provider` and not
    /// owned by anything else.
    pub(crate) unsafe fn new(provider: &'p P, ptr: NonNull<i32>) -> Self {
        BoxedInt { provider, ptr }
    }

    /// Copy the value out of the box.
    pub(crate) fn get(&self) -> i32 {
        // Safety: construction guarantees a live, aligned i32.
        unsafe { self.ptr.as_ptr().read() }
    }
}

impl<P: Provider> Drop for BoxedInt<'_, P> {
    fn drop(&mut self) {
        // Safety: sole owner; the box is released only here.
        unsafe { self.provider.free_boxed_int32(self.ptr.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn leak_cstring(s: &str) -> NonNull<c_char> {
        let raw = std::ffi::CString::new(s).unwrap().into_raw();
        NonNull::new(raw).unwrap()
    }

    #[test]
    fn test_native_string_releases_on_drop() {
        let mock = MockProvider::new();
        let ptr = mock.lend_string("twelve");
        {
            let guard = unsafe { NativeString::new(&mock, ptr) };
            assert_eq!(guard.to_str().unwrap(), "twelve");
        }
        assert_eq!(mock.stats().strings_freed, 1);
        assert!(mock.stats().balanced());
    }

    #[test]
    fn test_native_string_releases_even_when_not_utf8() {
        let mock = MockProvider::new();
        let ptr = mock.lend_raw_string(&[0xff, 0xfe, 0x80]);
        {
            let guard = unsafe { NativeString::new(&mock, ptr) };
            assert!(guard.to_str().is_err());
        }
        assert_eq!(mock.stats().strings_freed, 1);
    }

    #[test]
    fn test_result_handle_reads_fields_without_freeing_them() {
        let mock = MockProvider::new();
        let msg = leak_cstring("broken");
        let raw = mock.lend_result(RawResult {
            error_message: msg.as_ptr(),
            success: std::ptr::null(),
        });
        {
            let guard = unsafe { ResultHandle::new(&mock, raw) };
            assert_eq!(guard.error_message(), Some(msg));
            assert_eq!(guard.success(), None);
        }
        // Wrapper released, the message deliberately not: the wrapper free is
        // non-recursive by contract.
        assert_eq!(mock.stats().results_freed, 1);
        assert_eq!(mock.stats().strings_freed, 0);
        // Reclaim the test string we leaked above.
        drop(unsafe { std::ffi::CString::from_raw(msg.as_ptr()) });
    }

    #[test]
    fn test_boxed_int_reads_then_releases() {
        let mock = MockProvider::new();
        let ptr = mock.lend_int(-7);
        {
            let guard = unsafe { BoxedInt::new(&mock, ptr) };
            assert_eq!(guard.get(), -7);
        }
        assert_eq!(mock.stats().ints_freed, 1);
        assert!(mock.stats().balanced());
    }
}
