//! The boundary adapter between host calls and the native tagged result.
//!
//! Everything the provider returns is nullable and native-owned, so every
//! pointer is wrapped in a scoped guard the moment it crosses the boundary.
//! The adapter then collapses the raw two-pointer result into an ordinary
//! `Result`: validation failures before the call, decoded native errors
//! after it, and a plain `i32` on success.

use std::ptr::NonNull;
use std::str::Utf8Error;

use libc::{c_char, c_void};
use thiserror::Error;

use crate::abi::{Provider, RawResult};
use crate::guard::{BoxedInt, NativeString, ResultHandle};
use crate::op::Operator;

/// Errors surfaced by calls through the bridge.
#[derive(Debug, Error)]
pub enum CallError {
    /// The operator string was not exactly one character. Raised before the
    /// native call, so no native memory exists when it surfaces.
    #[error("{0:?} should be a character")]
    NotACharacter(String),

    /// The operator character is outside the supported set. Also raised
    /// before the native call.
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(char),

    /// The provider returned a null result handle, which its contract never
    /// permits.
    #[error("native operation returned a null result handle")]
    NullResult,

    /// The provider returned a result carrying neither a value nor an error.
    #[error("native operation returned neither a value nor an error")]
    EmptyResult,

    /// A native error message was not valid UTF-8. The buffer has already
    /// been released by the time this error is observed.
    #[error("native error message is not valid UTF-8: {0}")]
    InvalidMessage(#[from] Utf8Error),

    /// The native operation failed; the payload is its decoded message.
    #[error("{0}")]
    Operation(String),
}

/// Result alias for bridge calls.
pub type CallResult<T> = Result<T, CallError>;

/// Safe entry to a native operation provider.
///
/// Holds the provider and nothing else. No per-call state survives a call,
/// so a bridge shared behind `&` is usable from many threads whenever the
/// provider itself is.
pub struct Bridge<P: Provider> {
    provider: P,
}

impl<P: Provider> Bridge<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Bridge { provider }
    }

    /// Borrow the wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Unwrap the bridge back into its provider.
    pub fn into_provider(self) -> P {
        self.provider
    }

    /// Perform `x <op> y` natively, where `op` must be a single supported
    /// operator character.
    ///
    /// Validation happens first: a malformed operator string is rejected
    /// without any native call, so invalid input never allocates.
    pub fn operate(&self, op: &str, x: i32, y: i32) -> CallResult<i32> {
        self.apply(parse_operator(op)?, x, y)
    }

    /// Perform `x <op> y` natively with an already-validated operator.
    pub fn apply(&self, op: Operator, x: i32, y: i32) -> CallResult<i32> {
        // Safety: the contract hands us sole ownership of the returned
        // handle; `unwrap_result` consumes and releases it on every path.
        let raw = unsafe { self.provider.operate(op.code(), x, y) };
        let payload = unwrap_result(&self.provider, raw)?.ok_or(CallError::EmptyResult)?;

        // Safety: the success payload of an integer operation is a boxed
        // i32 whose ownership was transferred to us by `unwrap_result`.
        let value = unsafe { BoxedInt::new(&self.provider, payload.cast()) };
        Ok(value.get())
    }
}

/// Validate an operator string against the closed operator set.
fn parse_operator(op: &str) -> CallResult<Operator> {
    let mut chars = op.chars();
    match (chars.next(), chars.next()) {
        (Some(symbol), None) => {
            Operator::from_char(symbol).ok_or(CallError::UnsupportedOperator(symbol))
        }
        _ => Err(CallError::NotACharacter(op.to_string())),
    }
}

/// Reduce a raw tagged result to its success payload.
///
/// Consumes the handle: the wrapper is released on every path, and the error
/// string (when present) is decoded and released before this returns. A
/// populated error takes precedence; the success field is not read in that
/// case. `Ok(None)` is the vacant result both fields null encode.
fn unwrap_result<P: Provider>(
    provider: &P,
    raw: *mut RawResult,
) -> CallResult<Option<NonNull<c_void>>> {
    let ptr = NonNull::new(raw).ok_or(CallError::NullResult)?;

    // Safety: a non-null handle from `operate` is ours alone; the guard
    // releases the wrapper when this scope ends, on success and failure
    // alike.
    let handle = unsafe { ResultHandle::new(provider, ptr) };

    if let Some(message) = handle.error_message() {
        return Err(CallError::Operation(decode_message(provider, message)?));
    }

    Ok(handle.success())
}

/// Decode a native error buffer into an owned `String`.
///
/// The buffer is released exactly once whether decoding succeeds or fails.
fn decode_message<P: Provider>(provider: &P, ptr: NonNull<c_char>) -> CallResult<String> {
    // Safety: `ptr` came out of a result we own and is not referenced
    // anywhere else; the guard becomes its sole owner.
    let message = unsafe { NativeString::new(provider, ptr) };
    Ok(message.to_str()?.to_string())
}
