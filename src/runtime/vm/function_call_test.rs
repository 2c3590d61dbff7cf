use std::sync::Arc;

use crate::runtime::{
    closure::{Closure, Constructor, Variant},
    compiled_function::{CompiledFunction, Step},
    context::ExecutionContext,
    error::{ErrorCategory, RuntimeError},
    scheduler::Standalone,
    thread::LogicalThread,
    value::{ArgKind, Value},
    vm::{Outcome, run_thread},
};

use super::function_call::apply;

fn new_ctx() -> ExecutionContext {
    ExecutionContext::new(0, 4096, Arc::new(Standalone))
}

fn atom(name: &str) -> Closure {
    Closure::nullary(name, 0)
}

fn pair() -> Closure {
    Closure::function("pair", 2, |ctx, _| {
        let a = ctx.r(1)?;
        let b = ctx.r(2)?;
        Ok(ctx.ret(Closure::data(Constructor::new("Pair", 0), vec![a.into(), b.into()])))
    })
}

/// Arity 2; returns a function of one argument building `Triple(a, b, c)`.
fn triple_after_two() -> Closure {
    Closure::function("triple2", 2, |ctx, _| {
        let a = ctx.r(1)?;
        let b = ctx.r(2)?;
        let last = Closure::with_free(
            Arc::new(CompiledFunction::new("triple1", 1, |ctx, free| {
                let c = ctx.r(1)?;
                let mut fields = free.to_vec();
                fields.push(c.into());
                Ok(ctx.ret(Closure::data(Constructor::new("Triple", 0), fields)))
            })),
            vec![a.into(), b.into()],
        );
        Ok(ctx.ret(last))
    })
}

fn eval(ctx: &mut ExecutionContext, callee: Closure, args: Vec<Value>) -> Result<Closure, RuntimeError> {
    let computation = Closure::thunk(Vec::new(), move |_, _| Ok(Step::Apply(callee.clone(), args.clone())));
    match run_thread(ctx, LogicalThread::new(computation, 4096))? {
        Outcome::Finished(value) => Ok(value.resolve()),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn exact_application_uses_the_schema_table() {
    let mut ctx = new_ctx();
    let (x, y) = (atom("X"), atom("Y"));
    let step = apply(&mut ctx, pair(), vec![x.clone().into(), y.clone().into()]).unwrap();

    assert!(matches!(step, Step::Return));
    let result = ctx.r(1).unwrap();
    assert_eq!(result.to_string(), "Pair(X, Y)");
    let fields = &result.as_data().unwrap().fields;
    assert_eq!(fields[0], Value::Boxed(x));
    assert_eq!(fields[1], Value::Boxed(y));
    assert_eq!(ctx.stats.fast_path_calls, 1);
    assert_eq!(ctx.stack_depth(), 0);
}

#[test]
fn under_application_builds_a_partial() {
    let mut ctx = new_ctx();
    let f = pair();
    let x = atom("X");
    apply(&mut ctx, f.clone(), vec![x.clone().into()]).unwrap();

    let pap = ctx.r(1).unwrap();
    assert_eq!(pap.variant(), Variant::Partial);
    let partial = pap.as_partial().unwrap();
    assert!(partial.function.ptr_eq(&f));
    assert_eq!(partial.args, vec![Value::Boxed(x)]);
    assert_eq!(partial.remaining(), 1);
    assert_eq!(ctx.stats.partial_applications, 1);
}

#[test]
fn saturating_a_partial_calls_with_arguments_in_order() {
    let mut ctx = new_ctx();
    apply(&mut ctx, pair(), vec![atom("X").into()]).unwrap();
    let pap = ctx.r(1).unwrap();

    apply(&mut ctx, pap, vec![atom("Y").into()]).unwrap();
    assert_eq!(ctx.r(1).unwrap().to_string(), "Pair(X, Y)");
}

#[test]
fn over_application_pushes_the_leftover_arguments() {
    let mut ctx = new_ctx();
    let step = apply(
        &mut ctx,
        triple_after_two(),
        vec![atom("X").into(), atom("Y").into(), atom("Z").into()],
    )
    .unwrap();

    assert!(matches!(step, Step::Return));
    assert_eq!(ctx.stack().labels(), vec!["apply"]);
    assert_eq!(ctx.stats.over_applications, 1);
    assert_eq!(ctx.r(1).unwrap().to_string(), "<function triple1/1>");
}

#[test]
fn over_application_runs_to_the_final_value() {
    let mut ctx = new_ctx();
    let result = eval(
        &mut ctx,
        triple_after_two(),
        vec![atom("X").into(), atom("Y").into(), atom("Z").into()],
    )
    .unwrap();
    assert_eq!(result.to_string(), "Triple(X, Y, Z)");
}

#[test]
fn unspecialized_schema_goes_through_apply_frames() {
    let mut ctx = new_ctx();
    let add3 = Closure::function("add3", 3, |ctx, _| {
        let base = ctx.r(1)?.unboxed().and_then(|v| v.as_int()).unwrap_or(0);
        let sum = base + ctx.i(1)? + ctx.i(2)?;
        Ok(ctx.ret(Closure::boxed(Value::Int(sum))))
    });
    let base = Closure::boxed(Value::Int(100));
    let result = eval(&mut ctx, add3, vec![base.into(), Value::Int(20), Value::Int(3)]).unwrap();

    assert_eq!(result.unboxed(), Some(Value::Int(123)));
    assert_eq!(ctx.stats.generic_calls, 1);
    assert_eq!(ctx.stats.fast_path_calls, 0);
}

#[test]
fn primitive_arguments_land_in_their_own_bank() {
    let mut ctx = new_ctx();
    let scale = Closure::function("scale", 2, |ctx, _| {
        let x = ctx.d(1)?;
        let flip = ctx.z(1)?;
        let v = if flip { -x } else { x };
        Ok(ctx.ret(Closure::boxed(Value::Double(v * 2.0))))
    });
    let result = eval(&mut ctx, scale, vec![Value::Double(1.5), Value::Bool(true)]).unwrap();
    assert_eq!(result.unboxed(), Some(Value::Double(-3.0)));
}

#[test]
fn applying_data_is_an_internal_defect() {
    let mut ctx = new_ctx();
    let err = apply(&mut ctx, atom("Nil"), vec![Value::Int(1)]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::ApplyNonFunction {
            variant: "data value",
            args: 1
        }
    );
    assert_eq!(err.category(), ErrorCategory::InternalDefect);
}

#[test]
fn too_many_boxed_arguments_exhaust_the_register_file() {
    let mut ctx = new_ctx();
    let wide = Closure::function("wide", 17, |ctx, _| Ok(ctx.ret(Closure::nullary("Unit", 0))));
    let args: Vec<Value> = (0..17).map(|_| atom("A").into()).collect();
    let err = eval(&mut ctx, wide, args).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::RegisterExhausted {
            kind: ArgKind::Boxed,
            index: 17,
            available: 16
        }
    );
}

#[test]
fn applying_a_function_to_no_arguments_returns_it() {
    let mut ctx = new_ctx();
    let f = pair();
    let step = apply(&mut ctx, f.clone(), Vec::new()).unwrap();
    assert!(matches!(step, Step::Return));
    assert!(ctx.r(1).unwrap().ptr_eq(&f));
}

#[test]
fn applying_a_partial_to_no_arguments_returns_it() {
    let mut ctx = new_ctx();
    let pap = Closure::partial(pair(), vec![atom("X").into()]).unwrap();
    let step = apply(&mut ctx, pap.clone(), Vec::new()).unwrap();
    assert!(matches!(step, Step::Return));
    assert!(ctx.r(1).unwrap().ptr_eq(&pap));

    let result = eval(&mut ctx, pap.clone(), Vec::new()).unwrap();
    assert!(result.ptr_eq(&pap));
    assert_eq!(result.to_string(), "<partial pair 1/2>");
}

#[test]
fn applying_a_thunk_to_no_arguments_enters_it() {
    let mut ctx = new_ctx();
    let lazy = Closure::thunk(Vec::new(), |ctx, _| Ok(ctx.ret(atom("Forced"))));
    match apply(&mut ctx, lazy.clone(), Vec::new()).unwrap() {
        Step::Enter(target) => assert!(target.ptr_eq(&lazy)),
        other => panic!("expected enter, got {:?}", other),
    }
}
