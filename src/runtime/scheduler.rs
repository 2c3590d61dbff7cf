use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    options::RuntimeOptions,
    runtime::{
        closure::Closure,
        context::{ContextStats, ExecutionContext},
        error::RuntimeError,
        thread::LogicalThread,
        vm::{self, Outcome},
    },
};

/// The narrow interface the execution core sees of whatever multiplexes
/// logical threads onto workers.
pub trait Scheduler: Send + Sync {
    /// Called by the update mechanism with the threads that were blocked on
    /// `thunk` once it settles.
    fn wake(&self, thunk: &Closure, released: Vec<LogicalThread>);

    /// Offers a thunk for speculative evaluation.
    fn spark(&self, _thunk: Closure) -> bool {
        false
    }

    /// Polled by the trampoline; `true` asks the running thread to yield.
    fn should_yield(&self) -> bool {
        false
    }
}

/// Scheduler for a worker running one thread at a time on its own.
///
/// Blocked threads wait on the thunk's condvar instead of parking, so nothing
/// is ever released to it.
#[derive(Debug, Default)]
pub struct Standalone;

impl Scheduler for Standalone {
    fn wake(&self, _thunk: &Closure, released: Vec<LogicalThread>) {
        if !released.is_empty() {
            warn!(target: "graft::scheduler", count = released.len(), "standalone scheduler dropped parked threads");
        }
    }
}

/// One OS-level worker: an execution context kept for the worker's lifetime.
pub struct Worker {
    id: usize,
    context: ExecutionContext,
    stack_limit: usize,
}

impl Worker {
    pub fn new(id: usize, options: &RuntimeOptions, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            id,
            context: ExecutionContext::new(id, options.stack_limit, scheduler),
            stack_limit: options.stack_limit,
        }
    }

    pub fn standalone(options: &RuntimeOptions) -> Self {
        Self::new(0, options, Arc::new(Standalone))
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// A fresh logical thread that will enter `computation`.
    pub fn spawn(&self, computation: Closure) -> LogicalThread {
        LogicalThread::new(computation, self.stack_limit)
    }

    /// Evaluates `initial` to weak head normal form on this worker.
    ///
    /// Yields resume immediately; a block waits for the thunk to settle and
    /// then retries the entry. Returns when the computation finishes or halts.
    pub fn run_worker(&mut self, initial: Closure) -> Result<Closure, RuntimeError> {
        let mut thread = self.spawn(initial);
        loop {
            match self.run_slice(thread)? {
                Outcome::Finished(value) => return Ok(value),
                Outcome::Yielded(next) => thread = next,
                Outcome::Blocked { thread: next, on } => {
                    debug!(target: "graft::scheduler", worker = self.id, thread = %next.id, "waiting for thunk");
                    if let Some(cell) = on.as_thunk() {
                        cell.wait_settled();
                    }
                    thread = next;
                }
            }
        }
    }

    /// Runs `thread` until it finishes, yields, blocks, or halts.
    pub fn run_slice(&mut self, thread: LogicalThread) -> Result<Outcome, RuntimeError> {
        vm::run_thread(&mut self.context, thread)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn stats(&self) -> ContextStats {
        self.context.stats
    }
}
