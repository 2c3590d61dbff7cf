use std::cmp::Ordering;

use tracing::trace;

use crate::runtime::{
    closure::{Closure, ClosureKind},
    compiled_function::Step,
    context::ExecutionContext,
    error::RuntimeError,
    frame::Frame,
    registers::{RegisterSlot, layout_for},
    value::Value,
};

use super::apply_table;

/// Applies a callee of statically unknown shape to `args`.
///
/// Partial applications are flattened onto their function; functions are
/// matched against their arity exact-first, then under, then over. Applying
/// anything else is a code-generation defect. With no arguments, functions
/// and partial applications are already values and are returned as such.
pub fn apply(ctx: &mut ExecutionContext, callee: Closure, args: Vec<Value>) -> Result<Step, RuntimeError> {
    let callee = callee.resolve();
    if args.is_empty() {
        return match callee.kind() {
            ClosureKind::Function(_) | ClosureKind::Partial(_) => Ok(ctx.ret(callee)),
            ClosureKind::Thunk(_) | ClosureKind::Data(_) => Ok(Step::Enter(callee)),
        };
    }
    match callee.kind() {
        ClosureKind::Function(_) => apply_function(ctx, callee.clone(), args),
        ClosureKind::Partial(pap) => {
            let mut all = Vec::with_capacity(pap.args.len() + args.len());
            all.extend(pap.args.iter().cloned());
            all.extend(args);
            apply_function(ctx, pap.function.clone(), all)
        }
        ClosureKind::Thunk(_) | ClosureKind::Data(_) => Err(RuntimeError::ApplyNonFunction {
            variant: callee.variant().name(),
            args: args.len(),
        }),
    }
}

fn function_arity(function: &Closure, args: usize) -> Result<usize, RuntimeError> {
    function
        .as_function()
        .map(|f| f.arity())
        .ok_or(RuntimeError::ApplyNonFunction {
            variant: function.variant().name(),
            args,
        })
}

fn apply_function(ctx: &mut ExecutionContext, function: Closure, mut args: Vec<Value>) -> Result<Step, RuntimeError> {
    let arity = function_arity(&function, args.len())?;
    match args.len().cmp(&arity) {
        Ordering::Equal => call_exact(ctx, &function, args),
        Ordering::Less => {
            ctx.stats.partial_applications += 1;
            let pap = Closure::partial(function, args)?;
            trace!(target: "graft::apply", %pap, "under-application");
            Ok(ctx.ret(pap))
        }
        Ordering::Greater => {
            ctx.stats.over_applications += 1;
            let rest = args.split_off(arity);
            trace!(target: "graft::apply", %function, extra = rest.len(), "over-application");
            for arg in rest.into_iter().rev() {
                ctx.push(Frame::Apply(arg))?;
            }
            call_exact(ctx, &function, args)
        }
    }
}

/// Saturated call: the table's precomputed register layout when it has one,
/// otherwise the generic route through apply frames.
fn call_exact(ctx: &mut ExecutionContext, function: &Closure, args: Vec<Value>) -> Result<Step, RuntimeError> {
    if args.is_empty() {
        return invoke_with_layout(ctx, function, args, &[]);
    }
    match apply_table::global().lookup(&args) {
        Some(schema) => {
            ctx.stats.fast_path_calls += 1;
            invoke_with_layout(ctx, function, args, &schema.slots)
        }
        None => {
            ctx.stats.generic_calls += 1;
            trace!(target: "graft::apply", %function, args = args.len(), "generic apply");
            for arg in args.into_iter().rev() {
                ctx.push(Frame::Apply(arg))?;
            }
            Ok(ctx.ret(function.clone()))
        }
    }
}

/// Resumes an apply frame holding `arg` against the function in `R(1)`.
///
/// Adjacent apply frames are gathered up to the callee's remaining arity, so
/// a chain of single-argument frames collapses into one call.
pub(super) fn apply_frame(ctx: &mut ExecutionContext, arg: Value) -> Result<Step, RuntimeError> {
    let callee = ctx.r(1)?.resolve();
    let (function, mut args) = match callee.kind() {
        ClosureKind::Function(_) => (callee.clone(), Vec::new()),
        ClosureKind::Partial(pap) => (pap.function.clone(), pap.args.clone()),
        ClosureKind::Thunk(_) | ClosureKind::Data(_) => {
            return Err(RuntimeError::ApplyNonFunction {
                variant: callee.variant().name(),
                args: 1,
            });
        }
    };
    let arity = function_arity(&function, args.len() + 1)?;
    if arity == 0 {
        ctx.push(Frame::Apply(arg))?;
        return invoke_with_layout(ctx, &function, args, &[]);
    }
    args.push(arg);
    while args.len() < arity {
        match ctx.pop_apply() {
            Some(next) => args.push(next),
            None => break,
        }
    }

    if args.len() == arity {
        invoke(ctx, &function, args)
    } else {
        ctx.stats.partial_applications += 1;
        let pap = Closure::partial(function, args)?;
        Ok(ctx.ret(pap))
    }
}

/// Calls a function with exactly its arity of arguments, computing the
/// register layout on the spot.
fn invoke(ctx: &mut ExecutionContext, function: &Closure, args: Vec<Value>) -> Result<Step, RuntimeError> {
    let slots = layout_for(args.iter().map(Value::kind))?;
    invoke_with_layout(ctx, function, args, &slots)
}

fn invoke_with_layout(
    ctx: &mut ExecutionContext,
    function: &Closure,
    args: Vec<Value>,
    slots: &[RegisterSlot],
) -> Result<Step, RuntimeError> {
    let f = function.as_function().ok_or(RuntimeError::ApplyNonFunction {
        variant: function.variant().name(),
        args: args.len(),
    })?;
    debug_assert_eq!(args.len(), f.arity());
    for (arg, slot) in args.into_iter().zip(slots) {
        ctx.registers.store(*slot, arg)?;
    }
    (f.info.code)(ctx, &f.free)
}
