use tracing::trace;

use crate::runtime::{context::ExecutionContext, value::Value};

use super::LoopState;

pub(super) fn trace_state(ctx: &ExecutionContext, state: &LoopState) {
    let depth = ctx.stack_depth();
    let thread = ctx.thread_id();
    match state {
        LoopState::Entering(closure) => {
            trace!(target: "graft::trampoline", %thread, depth, "ENTER {:?}", closure);
        }
        LoopState::Applying(callee, args) => {
            trace!(target: "graft::trampoline", %thread, depth, "APPLY {} [{}]", callee, render_args(args));
        }
        LoopState::Resuming => {
            let top = ctx.stack().peek().map(|frame| frame.label()).unwrap_or("<empty>");
            let result = ctx.r(1).map(|r| r.to_string()).unwrap_or_else(|_| "<unset>".to_string());
            trace!(target: "graft::trampoline", %thread, depth, "RESUME {} R1={}", top, result);
        }
        LoopState::Blocked(thunk) => {
            trace!(target: "graft::trampoline", %thread, depth, "BLOCK {:?}", thunk);
        }
        LoopState::Halted(err) => {
            trace!(target: "graft::trampoline", %thread, depth, "HALT {}", err);
        }
    }
    trace_stack(ctx);
}

fn trace_stack(ctx: &ExecutionContext) {
    let labels = ctx.stack().labels();
    if !labels.is_empty() {
        trace!(target: "graft::trampoline", "  stack: [{}]", labels.join(", "));
    }
}

fn render_args(args: &[Value]) -> String {
    args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>().join(", ")
}
