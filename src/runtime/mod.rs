//! Execution core: closures, the continuation stack, apply dispatch,
//! thunk update, and the trampoline that drives them.
//!
//! # Sharing Invariant
//! A closure is shared by handle (`Arc`). The only in-place change any
//! closure ever undergoes is a thunk settling into an indirection, and that
//! transition happens under the thunk's own lock, so every holder of a
//! handle observes exactly one evaluation.
//!
//! Closures form immutable DAGs. Blocked logical threads parked on a thunk
//! are owned by that thunk until it settles; nothing else keeps
//! back-references into the graph.

pub mod closure;
pub mod compiled_function;
pub mod context;
pub mod error;
pub mod frame;
pub mod pool;
pub mod registers;
pub mod scheduler;
pub mod stack;
pub mod thread;
pub mod thunk;
pub mod value;
pub mod vm;

pub use closure::{Closure, ClosureKind, Constructor, Variant};
pub use compiled_function::{Code, CompiledFunction, Step};
pub use context::{ContextStats, ExecutionContext};
pub use error::{ErrorCategory, RuntimeError};
pub use frame::Frame;
pub use scheduler::{Scheduler, Worker};
pub use value::{ArgKind, Value};

#[cfg(test)]
mod stack_test;
