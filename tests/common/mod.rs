#![allow(dead_code)]

use std::sync::Arc;

use graft::{
    options::{DebugFlags, RuntimeOptions},
    runtime::{
        closure::{Closure, Constructor},
        compiled_function::{CompiledFunction, Step},
        error::RuntimeError,
        frame::Frame,
        scheduler::Worker,
        value::Value,
    },
};

pub fn options(workers: usize, stack_limit: usize) -> RuntimeOptions {
    RuntimeOptions {
        worker_count: workers,
        idle_timeout_ms: 0,
        spark_budget: 64,
        stack_limit,
        debug: DebugFlags::default(),
    }
}

pub fn atom(name: &str) -> Closure {
    Closure::nullary(name, 0)
}

pub fn int(n: i32) -> Closure {
    Closure::boxed(Value::Int(n))
}

/// Evaluates `computation` on a fresh standalone worker.
pub fn evaluate(computation: Closure) -> Result<Closure, RuntimeError> {
    evaluate_with_limit(computation, 1 << 20)
}

pub fn evaluate_with_limit(computation: Closure, stack_limit: usize) -> Result<Closure, RuntimeError> {
    let mut worker = Worker::standalone(&options(1, stack_limit));
    worker.run_worker(computation).map(|value| value.resolve())
}

/// A thunk whose body applies `callee` to `args`.
pub fn applying(callee: Closure, args: Vec<Value>) -> Closure {
    Closure::thunk(Vec::new(), move |_, _| Ok(Step::Apply(callee.clone(), args.clone())))
}

/// `pair(a, b) = Pair(a, b)`.
pub fn pair() -> Closure {
    Closure::function("pair", 2, |ctx, _| {
        let a = ctx.r(1)?;
        let b = ctx.r(2)?;
        Ok(ctx.ret(Closure::data(Constructor::new("Pair", 0), vec![a.into(), b.into()])))
    })
}

/// `collect_n(a1, ..., an) = Args(a1, ..., an)` over boxed arguments.
pub fn collect_n(arity: usize) -> Closure {
    Closure::function(format!("collect{}", arity), arity, move |ctx, _| {
        let mut fields = Vec::with_capacity(arity);
        for i in 1..=arity {
            fields.push(Value::Boxed(ctx.r(i)?));
        }
        Ok(ctx.ret(Closure::data(Constructor::new("Args", 0), fields)))
    })
}

/// Arity 2; returns a one-argument function producing `Triple(a, b, c)`.
pub fn triple_after_two() -> Closure {
    let rest = Arc::new(CompiledFunction::new("triple1", 1, |ctx, free| {
        let c = ctx.r(1)?;
        let mut fields = free.to_vec();
        fields.push(c.into());
        Ok(ctx.ret(Closure::data(Constructor::new("Triple", 0), fields)))
    }));
    Closure::function("triple2", 2, move |ctx, _| {
        let a = ctx.r(1)?;
        let b = ctx.r(2)?;
        Ok(ctx.ret(Closure::with_free(rest.clone(), vec![a.into(), b.into()])))
    })
}

/// `countdown(self, n)`: a tail call per step until `n` is zero.
pub fn countdown() -> Closure {
    Closure::function("countdown", 2, |ctx, _| {
        let this = ctx.r(1)?;
        let n = ctx.i(1)?;
        if n == 0 {
            return Ok(ctx.ret(atom("Done")));
        }
        Ok(Step::Apply(this.clone(), vec![Value::Boxed(this), Value::Int(n - 1)]))
    })
}

pub fn start_countdown(n: i32) -> Closure {
    let f = countdown();
    applying(f.clone(), vec![Value::Boxed(f), Value::Int(n)])
}

/// Thunk that installs a handler returning the exception itself, then
/// enters `target`.
pub fn catching(target: Closure) -> Closure {
    let handler = Closure::function("handler", 1, |ctx, _| {
        let exception = ctx.r(1)?;
        Ok(ctx.ret(Closure::data(Constructor::new("Caught", 0), vec![exception.into()])))
    });
    Closure::thunk(Vec::new(), move |ctx, _| {
        ctx.push(Frame::Catch(handler.clone()))?;
        Ok(Step::Enter(target.clone()))
    })
}

/// Non-tail recursion: `depth(n) = 1 + depth(n - 1)`, one case frame per level.
pub fn deep(n: i32) -> Closure {
    Closure::thunk(vec![Value::Int(n)], |ctx, free| {
        let n = free.first().and_then(|v| v.as_int()).unwrap_or(0);
        if n == 0 {
            return Ok(ctx.ret(int(0)));
        }
        ctx.push(Frame::case(Vec::new(), |ctx, _| {
            let below = ctx.r(1)?.unboxed().and_then(|v| v.as_int()).unwrap_or(0);
            Ok(ctx.ret(int(below + 1)))
        }))?;
        Ok(Step::Enter(deep(n - 1)))
    })
}
