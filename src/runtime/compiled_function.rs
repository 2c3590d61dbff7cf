use std::{fmt, sync::Arc};

use crate::runtime::{closure::Closure, context::ExecutionContext, error::RuntimeError, value::Value};

/// Code body shared by functions, thunks, and case continuations.
///
/// The body receives the worker's context (argument registers already loaded
/// by the caller) and the closure's captured payload. It must not enter other
/// closures itself; it returns a [`Step`] telling the trampoline what to do next.
pub type Code = Arc<dyn Fn(&mut ExecutionContext, &[Value]) -> Result<Step, RuntimeError> + Send + Sync>;

/// What the trampoline should do after a code body returns.
#[derive(Debug)]
pub enum Step {
    /// A value has been placed in `R(1)`; resume the topmost frame.
    Return,
    /// Evaluate this closure next (tail call).
    Enter(Closure),
    /// Apply a callee of unknown shape to arguments of known kinds (tail call).
    Apply(Closure, Vec<Value>),
    /// Raise an exception, unwinding to the nearest catch frame.
    Throw(Closure),
    /// The thunk is under evaluation by another logical thread.
    Block(Closure),
}

/// Static description of a function: its name, arity, and code.
#[derive(Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub arity: usize,
    pub code: Code,
}

impl CompiledFunction {
    pub fn new<F>(name: impl Into<String>, arity: usize, code: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &[Value]) -> Result<Step, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            code: Arc::new(code),
        }
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledFunction({}/{})", self.name, self.arity)
    }
}

impl PartialEq for CompiledFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.arity == other.arity && Arc::ptr_eq(&self.code, &other.code)
    }
}
