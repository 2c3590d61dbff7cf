use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::runtime::{closure::Closure, frame::Frame, stack::ContinuationStack, thunk, value::Value};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical (lightweight) thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(u64);

impl ThreadId {
    pub fn fresh() -> Self {
        ThreadId(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Placeholder identity of a context with no thread attached.
    pub const NONE: ThreadId = ThreadId(0);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a suspended thread picks up again.
#[derive(Debug, Clone)]
pub enum Pending {
    /// Enter this closure.
    Enter(Closure),
    /// Return this value to the topmost frame.
    Return(Closure),
    /// Apply this callee to these arguments.
    Apply(Closure, Vec<Value>),
}

/// A logical thread detached from any worker.
///
/// Holds everything needed to resume on any worker: its own continuation
/// stack and its resume point. Registers are not saved; at the boundaries
/// where a thread can be suspended only `R(1)` is live, and it is captured in
/// the resume point.
pub struct LogicalThread {
    pub id: ThreadId,
    pub stack: ContinuationStack,
    pub pending: Pending,
}

impl LogicalThread {
    pub fn new(computation: Closure, stack_limit: usize) -> Self {
        Self {
            id: ThreadId::fresh(),
            stack: ContinuationStack::new(stack_limit),
            pending: Pending::Enter(computation),
        }
    }

    /// Unwinds a thread that will never be resumed, resetting the thunks it
    /// was evaluating. Returns the threads that were parked on them.
    pub fn abandon(mut self) -> Vec<LogicalThread> {
        thunk::clear_waiting(self.id);
        let mut released = Vec::new();
        while let Some(frame) = self.stack.pop() {
            if let Frame::Update(thunk) = frame {
                if let Some(cell) = thunk.as_thunk() {
                    released.extend(cell.reset());
                }
            }
        }
        released
    }
}

impl fmt::Debug for LogicalThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalThread")
            .field("id", &self.id)
            .field("depth", &self.stack.len())
            .field("pending", &self.pending)
            .finish()
    }
}
