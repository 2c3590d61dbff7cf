use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::runtime::{
    closure::Closure,
    compiled_function::Step,
    error::RuntimeError,
    frame::Frame,
    registers::Registers,
    scheduler::Scheduler,
    stack::ContinuationStack,
    thread::{LogicalThread, Pending, ThreadId},
    thunk,
    value::{ArgKind, Value},
};

/// Worker-local counters. Never shared, so plain integers suffice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    pub thunk_entries: u64,
    pub updates: u64,
    pub blocks: u64,
    pub partial_applications: u64,
    pub fast_path_calls: u64,
    pub generic_calls: u64,
    pub over_applications: u64,
    pub frames_pushed: u64,
    pub yields: u64,
    pub exceptions_caught: u64,
}

impl ContextStats {
    pub fn merge(&mut self, other: &ContextStats) {
        self.thunk_entries += other.thunk_entries;
        self.updates += other.updates;
        self.blocks += other.blocks;
        self.partial_applications += other.partial_applications;
        self.fast_path_calls += other.fast_path_calls;
        self.generic_calls += other.generic_calls;
        self.over_applications += other.over_applications;
        self.frames_pushed += other.frames_pushed;
        self.yields += other.yields;
        self.exceptions_caught += other.exceptions_caught;
    }
}

/// Status used for preemption and exception delivery.
pub struct WorkerStatus {
    pub worker_id: usize,
    pub thread: ThreadId,
    /// Exception currently propagating, if any.
    pub current_exception: Option<Closure>,
    interrupt: Arc<AtomicBool>,
}

/// Per-worker register file plus the continuation stack of the logical
/// thread currently running on the worker.
///
/// Created once per worker and reused for the worker's lifetime.
pub struct ExecutionContext {
    pub registers: Registers,
    stack: ContinuationStack,
    status: WorkerStatus,
    scheduler: Arc<dyn Scheduler>,
    pub stats: ContextStats,
}

impl ExecutionContext {
    pub fn new(worker_id: usize, stack_limit: usize, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            registers: Registers::new(),
            stack: ContinuationStack::new(stack_limit),
            status: WorkerStatus {
                worker_id,
                thread: ThreadId::NONE,
                current_exception: None,
                interrupt: Arc::new(AtomicBool::new(false)),
            },
            scheduler,
            stats: ContextStats::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Registers
    // -----------------------------------------------------------------------

    pub fn register(&self, kind: ArgKind, index: usize) -> Result<Value, RuntimeError> {
        self.registers.get(kind, index)
    }

    pub fn set_register(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        self.registers.set(index, value)
    }

    /// Boxed register `R(index)`.
    pub fn r(&self, index: usize) -> Result<Closure, RuntimeError> {
        self.registers.boxed(index)
    }

    pub fn i(&self, index: usize) -> Result<i32, RuntimeError> {
        self.registers.int(index)
    }

    pub fn l(&self, index: usize) -> Result<i64, RuntimeError> {
        self.registers.long(index)
    }

    pub fn f(&self, index: usize) -> Result<f32, RuntimeError> {
        self.registers.float(index)
    }

    pub fn d(&self, index: usize) -> Result<f64, RuntimeError> {
        self.registers.double(index)
    }

    pub fn c(&self, index: usize) -> Result<char, RuntimeError> {
        self.registers.char(index)
    }

    pub fn z(&self, index: usize) -> Result<bool, RuntimeError> {
        self.registers.bool(index)
    }

    /// Places `value` in the result register and returns to the topmost frame.
    pub fn ret(&mut self, value: Closure) -> Step {
        self.registers.set_result(value);
        Step::Return
    }

    // -----------------------------------------------------------------------
    // Continuation stack
    // -----------------------------------------------------------------------

    pub fn push(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        self.stack.push(frame)?;
        self.stats.frames_pushed += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    pub(crate) fn pop_apply(&mut self) -> Option<Value> {
        self.stack.pop_apply()
    }

    pub fn stack(&self) -> &ContinuationStack {
        &self.stack
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    // -----------------------------------------------------------------------
    // Logical threads
    // -----------------------------------------------------------------------

    /// Installs `thread` on this worker and returns its resume point.
    pub fn attach(&mut self, thread: LogicalThread) -> Pending {
        debug_assert!(self.stack.is_empty(), "worker already runs a thread");
        thunk::clear_waiting(thread.id);
        self.stack = thread.stack;
        self.status.thread = thread.id;
        self.status.current_exception = None;
        thread.pending
    }

    /// Removes the running thread, packaging its stack with `pending`.
    pub fn detach(&mut self, pending: Pending) -> LogicalThread {
        let limit = self.stack.limit();
        let stack = std::mem::replace(&mut self.stack, ContinuationStack::new(limit));
        let id = std::mem::replace(&mut self.status.thread, ThreadId::NONE);
        self.status.current_exception = None;
        self.registers.release_boxed();
        LogicalThread { id, stack, pending }
    }

    /// Drops the running thread after it finished or halted.
    pub(crate) fn discard_thread(&mut self) {
        let limit = self.stack.limit();
        self.stack = ContinuationStack::new(limit);
        self.status.thread = ThreadId::NONE;
        self.status.current_exception = None;
        self.registers.release_boxed();
    }

    pub fn thread_id(&self) -> ThreadId {
        self.status.thread
    }

    pub fn worker_id(&self) -> usize {
        self.status.worker_id
    }

    pub fn status(&self) -> &WorkerStatus {
        &self.status
    }

    pub(crate) fn set_current_exception(&mut self, exception: Option<Closure>) {
        self.status.current_exception = exception;
    }

    /// Flag another thread can raise to halt this worker's trampoline.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.status.interrupt.clone()
    }

    pub fn is_interrupted(&self) -> bool {
        self.status.interrupt.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Scheduler seam
    // -----------------------------------------------------------------------

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// Hands threads released by an update or reset of `thunk` to the scheduler.
    pub fn wake(&mut self, thunk: &Closure, released: Vec<LogicalThread>) {
        self.scheduler.wake(thunk, released);
    }

    /// Offers `thunk` for speculative evaluation. Returns whether it was accepted.
    pub fn spark(&mut self, thunk: Closure) -> bool {
        self.scheduler.spark(thunk)
    }
}
