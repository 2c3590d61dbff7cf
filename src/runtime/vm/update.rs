use tracing::{debug, trace};

use crate::runtime::{
    closure::Closure,
    compiled_function::Step,
    context::ExecutionContext,
    error::RuntimeError,
    frame::Frame,
    value::Value,
};

/// Resumes an update frame: memoizes the value in `R(1)` into `thunk`.
///
/// If another thread already published a result, that result wins and
/// replaces `R(1)` so every observer sees one value. A body that returned an
/// unevaluated thunk has that thunk evaluated first, under the same update
/// frame, so an indirection only ever points at a value.
pub(super) fn update_thunk(ctx: &mut ExecutionContext, thunk: &Closure) -> Result<Step, RuntimeError> {
    let value = ctx.r(1)?.resolve();
    let cell = thunk.as_thunk().ok_or(RuntimeError::UpdateNonThunk {
        variant: thunk.variant().name(),
    })?;
    if !value.is_value() {
        trace!(target: "graft::update", thread = %ctx.thread_id(), "result is unevaluated; entering it first");
        ctx.push(Frame::Update(thunk.clone()))?;
        return Ok(Step::Enter(value));
    }
    match cell.update(value) {
        Ok(released) => {
            ctx.stats.updates += 1;
            trace!(target: "graft::update", thread = %ctx.thread_id(), released = released.len(), "thunk updated");
            ctx.wake(thunk, released);
            Ok(Step::Return)
        }
        Err(winner) => {
            trace!(target: "graft::update", thread = %ctx.thread_id(), "update lost; adopting first result");
            Ok(ctx.ret(winner))
        }
    }
}

/// Unwinds the continuation stack to the nearest catch frame.
///
/// Update frames met on the way have their thunks reset so later entries
/// retry the evaluation. Reaching the bottom of the stack is fatal.
pub(super) fn unwind(ctx: &mut ExecutionContext, exception: Closure) -> Result<Step, RuntimeError> {
    ctx.set_current_exception(Some(exception.clone()));
    let mut discarded = 0usize;
    while let Some(frame) = ctx.pop() {
        match frame {
            Frame::Catch(handler) => {
                ctx.stats.exceptions_caught += 1;
                ctx.set_current_exception(None);
                debug!(
                    target: "graft::trampoline",
                    %exception,
                    discarded,
                    "exception caught"
                );
                return Ok(Step::Apply(handler, vec![Value::Boxed(exception)]));
            }
            Frame::Update(thunk) => {
                if let Some(cell) = thunk.as_thunk() {
                    let released = cell.reset();
                    trace!(target: "graft::update", released = released.len(), "thunk reset by exception");
                    ctx.wake(&thunk, released);
                }
            }
            Frame::Apply(_) | Frame::Case(_) => {}
        }
        discarded += 1;
    }
    Err(RuntimeError::Uncaught(exception.to_string()))
}

/// Drops every frame of a halting thread, resetting the thunks it was
/// evaluating so threads blocked on them can retry.
pub(super) fn abandon(ctx: &mut ExecutionContext) {
    while let Some(frame) = ctx.pop() {
        if let Frame::Update(thunk) = frame {
            if let Some(cell) = thunk.as_thunk() {
                let released = cell.reset();
                ctx.wake(&thunk, released);
            }
        }
    }
}
