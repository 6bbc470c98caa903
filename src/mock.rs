//! An instrumented in-process provider for tests, docs, and benches.
//!
//! [`MockProvider`] implements the full provider contract with real heap
//! allocations: error messages are `CString`s, success payloads are boxed
//! `i32`s, and the tagged wrapper is a boxed [`RawResult`]. Every pointer it
//! hands out is recorded in a live table, so releasing a pointer twice, or
//! through the wrong deallocator, panics the test instead of corrupting the
//! heap. [`MockStats`] exposes the allocation and release counters callers
//! use to assert that a call sequence leaked nothing.

use std::collections::HashMap;
use std::ffi::CString;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use libc::{c_char, c_void};

use crate::abi::{Provider, RawResult};
use crate::op::Operator;

/// What kind of allocation a live pointer is, for deallocator matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Result,
    Int,
}

/// Misbehavior the mock can be configured to exhibit.
///
/// The faithful mock honors the provider contract; each fault breaks it in
/// one specific way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Honor the contract.
    None,
    /// Return a null result handle from `operate`.
    NullHandle,
    /// Return a result with both fields null.
    EmptyResult,
    /// Return an error message that is not valid UTF-8.
    GarbageMessage,
}

/// Snapshot of the mock's call and allocation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockStats {
    /// Calls made to `operate`.
    pub operate_calls: usize,
    /// Error strings allocated.
    pub strings_allocated: usize,
    /// Error strings released.
    pub strings_freed: usize,
    /// Tagged result wrappers allocated.
    pub results_allocated: usize,
    /// Tagged result wrappers released.
    pub results_freed: usize,
    /// Boxed integers allocated.
    pub ints_allocated: usize,
    /// Boxed integers released.
    pub ints_freed: usize,
}

impl MockStats {
    /// True when every allocation of every kind has been released.
    pub fn balanced(&self) -> bool {
        self.strings_allocated == self.strings_freed
            && self.results_allocated == self.results_freed
            && self.ints_allocated == self.ints_freed
    }

    /// Allocations not yet released, across all kinds.
    pub fn outstanding(&self) -> usize {
        (self.strings_allocated - self.strings_freed)
            + (self.results_allocated - self.results_freed)
            + (self.ints_allocated - self.ints_freed)
    }
}

/// An in-process operation provider with allocation tracking.
pub struct MockProvider {
    fault: Fault,
    live: Mutex<HashMap<usize, Kind>>,
    operate_calls: AtomicUsize,
    strings_allocated: AtomicUsize,
    strings_freed: AtomicUsize,
    results_allocated: AtomicUsize,
    results_freed: AtomicUsize,
    ints_allocated: AtomicUsize,
    ints_freed: AtomicUsize,
}

impl MockProvider {
    /// A mock that honors the provider contract.
    pub fn new() -> Self {
        Self::with_fault(Fault::None)
    }

    /// A mock that misbehaves in one configured way.
    pub fn with_fault(fault: Fault) -> Self {
        MockProvider {
            fault,
            live: Mutex::new(HashMap::new()),
            operate_calls: AtomicUsize::new(0),
            strings_allocated: AtomicUsize::new(0),
            strings_freed: AtomicUsize::new(0),
            results_allocated: AtomicUsize::new(0),
            results_freed: AtomicUsize::new(0),
            ints_allocated: AtomicUsize::new(0),
            ints_freed: AtomicUsize::new(0),
        }
    }

    /// Snapshot the call and allocation counters.
    pub fn stats(&self) -> MockStats {
        MockStats {
            operate_calls: self.operate_calls.load(Ordering::Relaxed),
            strings_allocated: self.strings_allocated.load(Ordering::Relaxed),
            strings_freed: self.strings_freed.load(Ordering::Relaxed),
            results_allocated: self.results_allocated.load(Ordering::Relaxed),
            results_freed: self.results_freed.load(Ordering::Relaxed),
            ints_allocated: self.ints_allocated.load(Ordering::Relaxed),
            ints_freed: self.ints_freed.load(Ordering::Relaxed),
        }
    }

    fn alloc_string(&self, bytes: Vec<u8>) -> *const c_char {
        let raw = CString::new(bytes)
            .expect("mock messages contain no interior NUL")
            .into_raw();
        self.track(raw as usize, Kind::Str);
        self.strings_allocated.fetch_add(1, Ordering::Relaxed);
        raw
    }

    fn alloc_result(&self, raw: RawResult) -> *mut RawResult {
        let ptr = Box::into_raw(Box::new(raw));
        self.track(ptr as usize, Kind::Result);
        self.results_allocated.fetch_add(1, Ordering::Relaxed);
        ptr
    }

    fn alloc_int(&self, value: i32) -> *mut i32 {
        let ptr = Box::into_raw(Box::new(value));
        self.track(ptr as usize, Kind::Int);
        self.ints_allocated.fetch_add(1, Ordering::Relaxed);
        ptr
    }

    fn track(&self, addr: usize, kind: Kind) {
        let mut live = self.live.lock().unwrap();
        let previous = live.insert(addr, kind);
        debug_assert!(previous.is_none(), "allocator handed out a live address");
    }

    /// Remove a pointer from the live table, panicking on misuse.
    fn untrack(&self, addr: usize, kind: Kind) {
        let mut live = self.live.lock().unwrap();
        match live.remove(&addr) {
            Some(recorded) if recorded == kind => {}
            Some(recorded) => panic!(
                "pointer {:#x} is a {:?} allocation but was released as {:?}",
                addr, recorded, kind
            ),
            None => panic!(
                "pointer {:#x} released twice, or not owned by this provider",
                addr
            ),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for MockProvider {
    unsafe fn operate(&self, op: u8, x: i32, y: i32) -> *mut RawResult {
        self.operate_calls.fetch_add(1, Ordering::Relaxed);

        match self.fault {
            Fault::NullHandle => ptr::null_mut(),
            Fault::EmptyResult => self.alloc_result(RawResult::default()),
            Fault::GarbageMessage => {
                let message = self.alloc_string(vec![0xff, 0xfe, 0xfd]);
                self.alloc_result(RawResult {
                    error_message: message,
                    success: ptr::null(),
                })
            }
            Fault::None => match compute(op, x, y) {
                Ok(value) => self.alloc_result(RawResult {
                    error_message: ptr::null(),
                    success: self.alloc_int(value) as *const c_void,
                }),
                Err(message) => self.alloc_result(RawResult {
                    error_message: self.alloc_string(message.into_bytes()),
                    success: ptr::null(),
                }),
            },
        }
    }

    unsafe fn free_native_string(&self, ptr: *mut c_char) {
        if ptr.is_null() {
            return;
        }
        self.untrack(ptr as usize, Kind::Str);
        drop(CString::from_raw(ptr));
        self.strings_freed.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn free_tagged_result(&self, ptr: *mut RawResult) {
        if ptr.is_null() {
            return;
        }
        self.untrack(ptr as usize, Kind::Result);
        // Wrapper only: the fields stay live until their own free calls.
        drop(Box::from_raw(ptr));
        self.results_freed.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn free_boxed_int32(&self, ptr: *mut i32) {
        if ptr.is_null() {
            return;
        }
        self.untrack(ptr as usize, Kind::Int);
        drop(Box::from_raw(ptr));
        self.ints_freed.fetch_add(1, Ordering::Relaxed);
    }
}

// Tracked allocations handed straight to guard tests, bypassing `operate`.
#[cfg(test)]
impl MockProvider {
    pub(crate) fn lend_string(&self, message: &str) -> std::ptr::NonNull<c_char> {
        self.lend_raw_string(message.as_bytes())
    }

    pub(crate) fn lend_raw_string(&self, bytes: &[u8]) -> std::ptr::NonNull<c_char> {
        std::ptr::NonNull::new(self.alloc_string(bytes.to_vec()) as *mut c_char)
            .expect("CString allocation is never null")
    }

    pub(crate) fn lend_result(&self, raw: RawResult) -> std::ptr::NonNull<RawResult> {
        std::ptr::NonNull::new(self.alloc_result(raw)).expect("Box allocation is never null")
    }

    pub(crate) fn lend_int(&self, value: i32) -> std::ptr::NonNull<i32> {
        std::ptr::NonNull::new(self.alloc_int(value)).expect("Box allocation is never null")
    }
}

/// The arithmetic the real provider implements, with its error messages.
fn compute(op: u8, x: i32, y: i32) -> Result<i32, String> {
    let op = match Operator::from_code(op) {
        Some(op) => op,
        None => return Err(format!("Bad Operator: '{}'", op as char)),
    };

    let result = match op {
        Operator::Add => x.checked_add(y),
        Operator::Sub => x.checked_sub(y),
        Operator::Mul => x.checked_mul(y),
        Operator::Div => {
            if y == 0 {
                return Err("division by zero".to_string());
            }
            x.checked_div(y)
        }
        Operator::Rem => {
            if y == 0 {
                return Err("division by zero".to_string());
            }
            x.checked_rem(y)
        }
        Operator::Xor => Some(x ^ y),
    };

    result.ok_or_else(|| format!("integer overflow computing {} {} {}", x, op, y))
}
