//! Runtime errors

use thiserror::Error;

use crate::runtime::value::ArgKind;

/// How an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Stack or register exhaustion. Catchable by a catch frame.
    ResourceExhaustion,
    /// A user-level exception. Catchable by a catch frame.
    Exception,
    /// A code-generation or runtime bug. Always halts the worker.
    InternalDefect,
    /// The worker was stopped from outside or nothing caught an exception.
    Fatal,
}

/// Runtime errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("stack overflow: continuation stack exceeded {limit} frames")]
    StackOverflow { limit: usize },

    #[error("register file exhausted: {kind} argument {index} exceeds {available} registers")]
    RegisterExhausted {
        kind: ArgKind,
        index: usize,
        available: usize,
    },

    #[error("<<loop>>: thunk re-entered by the thread evaluating it")]
    NonTermination,

    #[error("exception: {0}")]
    UserException(String),

    #[error("internal error: cannot apply a {variant} to {args} argument(s)")]
    ApplyNonFunction { variant: &'static str, args: usize },

    #[error("internal error: a partial application was entered directly")]
    EnterPartial,

    #[error("internal error: read of empty {kind} register {index}")]
    EmptyRegister { kind: ArgKind, index: usize },

    #[error("internal error: register {index} holds no {expected} value")]
    RegisterKind { expected: ArgKind, index: usize },

    #[error("internal error: update frame holds a {variant}, not a thunk")]
    UpdateNonThunk { variant: &'static str },

    #[error("internal error: continuation stack empty while {0}")]
    UnexpectedEmptyStack(&'static str),

    #[error("internal error: partial application of {name} has {args} argument(s) for arity {arity}")]
    MalformedPartial {
        name: String,
        args: usize,
        arity: usize,
    },

    #[error("uncaught exception: {0}")]
    Uncaught(String),

    #[error("worker interrupted")]
    Interrupted,
}

impl RuntimeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RuntimeError::StackOverflow { .. } | RuntimeError::RegisterExhausted { .. } => {
                ErrorCategory::ResourceExhaustion
            }
            RuntimeError::NonTermination | RuntimeError::UserException(_) => ErrorCategory::Exception,
            RuntimeError::ApplyNonFunction { .. }
            | RuntimeError::EnterPartial
            | RuntimeError::EmptyRegister { .. }
            | RuntimeError::RegisterKind { .. }
            | RuntimeError::UpdateNonThunk { .. }
            | RuntimeError::UnexpectedEmptyStack(_)
            | RuntimeError::MalformedPartial { .. } => ErrorCategory::InternalDefect,
            RuntimeError::Uncaught(_) | RuntimeError::Interrupted => ErrorCategory::Fatal,
        }
    }

    /// Whether an enclosing catch frame may intercept this error.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ResourceExhaustion | ErrorCategory::Exception
        )
    }

    /// Constructor name of the exception value raised for a catchable error.
    pub fn exception_name(&self) -> &'static str {
        match self {
            RuntimeError::StackOverflow { .. } => "StackOverflow",
            RuntimeError::RegisterExhausted { .. } => "RegisterExhausted",
            RuntimeError::NonTermination => "NonTermination",
            RuntimeError::UserException(_) => "ErrorCall",
            _ => "InternalError",
        }
    }
}
