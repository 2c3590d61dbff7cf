//! The trampoline: drives closure entry and frame resumption to a fixpoint
//! in a flat loop, so host stack depth stays constant no matter how deep the
//! program's tail-call chain or continuation stack gets.
//!
//! ```text
//!            ┌──────────── Step::Enter ────────────┐
//!            ▼                                     │
//!   ┌──▶ Entering ──Step::Return──▶ Resuming ──────┤──▶ stack empty: Finished
//!   │        │                          │          │
//!   │        └──Step::Block──▶ Blocked  └─Step::Apply──▶ Applying
//!   │                                                      │
//!   └──────────────────────────────────────────────────────┘
//!   any fatal error ──▶ Halted
//! ```

use tracing::debug;

use crate::runtime::{
    closure::Closure,
    compiled_function::Step,
    context::ExecutionContext,
    error::RuntimeError,
    frame::Frame,
    thread::{LogicalThread, Pending},
    value::Value,
};

pub mod apply_table;
mod function_call;
mod trace;
mod update;

pub use function_call::apply;

/// Iterations between two `should_yield` polls of the scheduler.
const YIELD_CHECK_INTERVAL: u64 = 1024;

/// How a slice of a logical thread's execution ended.
#[derive(Debug)]
pub enum Outcome {
    /// The continuation stack emptied with this value in `R(1)`.
    Finished(Closure),
    /// The scheduler asked for the worker back; resume the thread later.
    Yielded(LogicalThread),
    /// Entering `on` found it under evaluation by another thread.
    Blocked { thread: LogicalThread, on: Closure },
}

pub(crate) enum LoopState {
    Entering(Closure),
    Applying(Closure, Vec<Value>),
    Resuming,
    Blocked(Closure),
    Halted(RuntimeError),
}

/// Runs `thread` on the worker owning `ctx` until it finishes, yields,
/// blocks, or halts.
///
/// An `Err` is the `Halted` state: a condition that is not catchable or
/// found no catch frame. A runtime-raised condition nobody caught halts as
/// itself (e.g. `StackOverflow`); a thrown value nobody caught halts as
/// `Uncaught`. The context is left with no thread attached in every case.
pub fn run_thread(ctx: &mut ExecutionContext, thread: LogicalThread) -> Result<Outcome, RuntimeError> {
    let mut state = match ctx.attach(thread) {
        Pending::Enter(closure) => LoopState::Entering(closure),
        Pending::Return(value) => {
            ctx.registers.set_result(value);
            LoopState::Resuming
        }
        Pending::Apply(callee, args) => LoopState::Applying(callee, args),
    };
    let mut iterations: u64 = 0;

    loop {
        if ctx.is_interrupted() {
            state = LoopState::Halted(RuntimeError::Interrupted);
        } else if iterations > 0
            && iterations % YIELD_CHECK_INTERVAL == 0
            && ctx.scheduler().should_yield()
        {
            match suspend_point(ctx, state) {
                Ok(pending) => {
                    ctx.stats.yields += 1;
                    let thread = ctx.detach(pending);
                    debug!(target: "graft::trampoline", thread = %thread.id, "yielding");
                    return Ok(Outcome::Yielded(thread));
                }
                Err(next) => state = next,
            }
        }
        iterations += 1;

        if tracing::enabled!(target: "graft::trampoline", tracing::Level::TRACE) {
            trace::trace_state(ctx, &state);
        }

        state = match state {
            LoopState::Entering(closure) => {
                let result = closure.enter(ctx);
                after_step(ctx, result)
            }
            LoopState::Applying(callee, args) => {
                let result = function_call::apply(ctx, callee, args);
                after_step(ctx, result)
            }
            LoopState::Resuming => match ctx.pop() {
                Some(frame) => {
                    let result = resume_frame(ctx, frame);
                    after_step(ctx, result)
                }
                None => match ctx.r(1) {
                    Ok(value) => {
                        ctx.discard_thread();
                        return Ok(Outcome::Finished(value));
                    }
                    Err(_) => LoopState::Halted(RuntimeError::UnexpectedEmptyStack("returning a value")),
                },
            },
            LoopState::Blocked(thunk) => {
                let thread = ctx.detach(Pending::Enter(thunk.clone()));
                debug!(target: "graft::trampoline", thread = %thread.id, "blocked on thunk");
                return Ok(Outcome::Blocked { thread, on: thunk });
            }
            LoopState::Halted(err) => {
                debug!(target: "graft::trampoline", error = %err, "halting");
                update::abandon(ctx);
                ctx.discard_thread();
                return Err(err);
            }
        };
    }
}

/// Converts a loop state into a resume point, if the state is a boundary at
/// which the thread may be suspended.
fn suspend_point(ctx: &ExecutionContext, state: LoopState) -> Result<Pending, LoopState> {
    match state {
        LoopState::Entering(closure) => Ok(Pending::Enter(closure)),
        LoopState::Applying(callee, args) => Ok(Pending::Apply(callee, args)),
        LoopState::Resuming => match ctx.r(1) {
            Ok(value) => Ok(Pending::Return(value)),
            Err(err) => Err(LoopState::Halted(err)),
        },
        other => Err(other),
    }
}

/// Maps the result of one step onto the next loop state.
fn after_step(ctx: &mut ExecutionContext, result: Result<Step, RuntimeError>) -> LoopState {
    match result {
        Ok(step) => next_state(ctx, step),
        Err(err) if err.is_catchable() => {
            debug!(target: "graft::trampoline", error = %err, "raising runtime exception");
            let exception = Closure::exception(&err);
            match update::unwind(ctx, exception) {
                // Nothing caught it: halt with the condition itself.
                Err(RuntimeError::Uncaught(_)) => LoopState::Halted(err),
                Ok(step) => continue_after_unwind(ctx, step),
                Err(other) => LoopState::Halted(other),
            }
        }
        Err(err) => LoopState::Halted(err),
    }
}

fn next_state(ctx: &mut ExecutionContext, step: Step) -> LoopState {
    match step {
        Step::Return => LoopState::Resuming,
        Step::Enter(closure) => LoopState::Entering(closure),
        Step::Apply(callee, args) => LoopState::Applying(callee, args),
        Step::Block(thunk) => LoopState::Blocked(thunk),
        Step::Throw(exception) => raise(ctx, exception),
    }
}

fn raise(ctx: &mut ExecutionContext, exception: Closure) -> LoopState {
    match update::unwind(ctx, exception) {
        Ok(step) => continue_after_unwind(ctx, step),
        Err(err) => LoopState::Halted(err),
    }
}

fn continue_after_unwind(ctx: &mut ExecutionContext, step: Step) -> LoopState {
    match step {
        Step::Throw(_) => LoopState::Halted(RuntimeError::UnexpectedEmptyStack("unwinding")),
        step => next_state(ctx, step),
    }
}

/// Resumes one popped frame against the value in `R(1)`.
fn resume_frame(ctx: &mut ExecutionContext, frame: Frame) -> Result<Step, RuntimeError> {
    match frame {
        Frame::Apply(arg) => function_call::apply_frame(ctx, arg),
        Frame::Update(thunk) => update::update_thunk(ctx, &thunk),
        Frame::Case(k) => (k.code)(ctx, &k.free),
        Frame::Catch(_) => Ok(Step::Return),
    }
}

#[cfg(test)]
mod function_call_test;
