//! Safe host-side bindings to a native two-operand integer operation
//! provider.
//!
//! The provider is a C-ABI shared library. Its `operate` entry point returns
//! a heap-allocated tagged result holding either an error message or a boxed
//! value, and every allocation stays owned by the native side until released
//! through the matching `free_*` entry point. This crate is the boundary
//! layer that makes calling it safe:
//!
//! - native strings are decoded exactly once, into host-owned memory
//! - the two-nullable-pointer result collapses into an ordinary [`Result`]
//!   at the boundary
//! - every native allocation is released exactly once on every control-flow
//!   path, via scoped guards
//! - invalid input is rejected before it ever reaches the native side
//!
//! # Example
//!
//! ```
//! use opcall::{operate, Bridge, MockProvider, Operator};
//!
//! // The instrumented mock stands in for the real library in tests.
//! let calc = MockProvider::new();
//! assert_eq!(operate(&calc, "+", 2, 3).unwrap(), 5);
//!
//! let bridge = Bridge::new(&calc);
//! assert_eq!(bridge.apply(Operator::Mul, 6, 7).unwrap(), 42);
//! assert!(bridge.operate("/", 1, 0).is_err()); // decoded native error
//! assert!(calc.stats().balanced()); // every allocation released
//! ```
//!
//! Against the real artifact:
//!
//! ```no_run
//! use opcall::{Bridge, NativeProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = Bridge::new(NativeProvider::discover("opcore")?);
//! println!("{}", bridge.operate("^", 0b1100, 0b1010)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Ownership across the boundary
//!
//! `operate` transfers ownership of its whole result tree to the caller.
//! The bridge wraps the wrapper and each populated field in a guard whose
//! `Drop` performs the paired release, so an early `?` cannot leak:
//!
//! ```text
//! Provider::operate ──▶ RawResult*           guard          release
//!                         wrapper            ResultHandle   free_tagged_result
//!                         ├─ error_message*  NativeString   free_native_string
//!                         └─ success*        BoxedInt       free_boxed_int32
//! ```
//!
//! The wrapper release is non-recursive: dropping a `ResultHandle` never
//! touches the field payloads, which are consumed by their own guards.

#![warn(clippy::all)]

pub mod abi;
pub mod bridge;
mod guard;
pub mod loader;
pub mod mock;
pub mod op;

// Re-export the whole calling surface
pub use abi::{Provider, RawResult};
pub use bridge::{Bridge, CallError, CallResult};
pub use loader::{LoadError, NativeProvider};
pub use mock::{Fault, MockProvider, MockStats};
pub use op::Operator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-shot convenience around [`Bridge::operate`].
pub fn operate<P: Provider>(provider: P, op: &str, x: i32, y: i32) -> CallResult<i32> {
    Bridge::new(provider).operate(op, x, y)
}
