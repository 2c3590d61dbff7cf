use std::{fmt, sync::Arc};

use crate::runtime::{
    closure::Closure,
    compiled_function::{Code, Step},
    context::ExecutionContext,
    error::RuntimeError,
    value::Value,
};

/// A suspended unit of pending work on the continuation stack.
///
/// Every variant carries exactly what it needs to resume once a value shows
/// up in `R(1)`.
pub enum Frame {
    /// Apply the function about to appear in `R(1)` to this argument.
    ///
    /// The argument's tag selects the kind-specialized frame; primitives stay
    /// unboxed while they wait.
    Apply(Value),
    /// Overwrite this thunk with the value in `R(1)`.
    Update(Closure),
    /// Select an alternative for the value in `R(1)`.
    Case(CaseContinuation),
    /// Exception handler: a function of one boxed argument.
    ///
    /// Passes values through untouched on normal return.
    Catch(Closure),
}

/// Alternatives awaiting a scrutinee, with the free values they need.
#[derive(Clone)]
pub struct CaseContinuation {
    pub code: Code,
    pub free: Vec<Value>,
}

impl Frame {
    pub fn case<F>(free: Vec<Value>, code: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &[Value]) -> Result<Step, RuntimeError> + Send + Sync + 'static,
    {
        Frame::Case(CaseContinuation {
            code: Arc::new(code),
            free,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frame::Apply(_) => "apply",
            Frame::Update(_) => "update",
            Frame::Case(_) => "case",
            Frame::Catch(_) => "catch",
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Apply(arg) => write!(f, "Apply[{}]({})", arg.kind(), arg),
            Frame::Update(thunk) => write!(f, "Update({:?})", thunk.variant()),
            Frame::Case(k) => write!(f, "Case(free={})", k.free.len()),
            Frame::Catch(handler) => write!(f, "Catch({})", handler),
        }
    }
}
