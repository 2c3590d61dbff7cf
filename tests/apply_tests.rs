mod common;

use common::{applying, atom, collect_n, evaluate, pair, triple_after_two};
use graft::runtime::{
    closure::{Closure, Constructor, Variant},
    error::RuntimeError,
    value::{ArgKind, Value},
};

#[test]
fn arity_two_function_under_then_exactly_applied() {
    let f = pair();
    let (x, y) = (atom("X"), atom("Y"));

    let pap = evaluate(applying(f.clone(), vec![x.clone().into()])).unwrap();
    assert_eq!(pap.variant(), Variant::Partial);
    let partial = pap.as_partial().unwrap();
    assert!(partial.function.ptr_eq(&f));
    assert_eq!(partial.args, vec![Value::Boxed(x.clone())]);

    let result = evaluate(applying(pap, vec![y.clone().into()])).unwrap();
    let data = result.as_data().unwrap();
    assert_eq!(&*data.constructor.name, "Pair");
    assert_eq!(data.fields, vec![Value::Boxed(x), Value::Boxed(y)]);
}

#[test]
fn arity_two_function_over_applied_to_three() {
    let result = evaluate(applying(
        triple_after_two(),
        vec![atom("X").into(), atom("Y").into(), atom("Z").into()],
    ))
    .unwrap();
    assert_eq!(result.to_string(), "Triple(X, Y, Z)");
}

#[test]
fn partial_grows_until_saturated() {
    let f = collect_n(4);
    let p1 = evaluate(applying(f, vec![atom("A").into()])).unwrap();
    let p2 = evaluate(applying(p1.clone(), vec![atom("B").into(), atom("C").into()])).unwrap();
    assert_eq!(p2.to_string(), "<partial collect4 3/4>");
    // The first partial is unchanged by extending it.
    assert_eq!(p1.to_string(), "<partial collect4 1/4>");

    let done = evaluate(applying(p2, vec![atom("D").into()])).unwrap();
    assert_eq!(done.to_string(), "Args(A, B, C, D)");
}

#[test]
fn over_applying_a_partial_to_a_data_result_is_a_defect() {
    let pap = Closure::partial(collect_n(2), vec![atom("A").into()]).unwrap();
    let err = evaluate(applying(pap, vec![atom("B").into(), atom("C").into()])).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::ApplyNonFunction {
            variant: "data value",
            args: 1
        }
    );
}

#[test]
fn mixed_kinds_keep_their_order_and_banks() {
    let mixed = Closure::function("mixed", 4, |ctx, _| {
        let fields = vec![
            Value::Boxed(ctx.r(1)?),
            Value::Int(ctx.i(1)?),
            Value::Long(ctx.l(1)?),
            Value::Char(ctx.c(1)?),
        ];
        Ok(ctx.ret(Closure::data(Constructor::new("Mixed", 0), fields)))
    });
    let result = evaluate(applying(
        mixed,
        vec![atom("O").into(), Value::Int(-4), Value::Long(1 << 40), Value::Char('λ')],
    ))
    .unwrap();
    assert_eq!(result.to_string(), "Mixed(O, -4#, 1099511627776L#, 'λ'#)");
}

#[test]
fn every_single_kind_round_trips_through_its_register() {
    let samples = [
        Value::Int(7),
        Value::Long(-9),
        Value::Float(0.5),
        Value::Double(2.25),
        Value::Char('q'),
        Value::Bool(true),
    ];
    for sample in samples {
        let kind = sample.kind();
        let echo = Closure::function("echo", 1, move |ctx, _| {
            let value = ctx.register(kind, 1)?;
            Ok(ctx.ret(Closure::boxed(value)))
        });
        let result = evaluate(applying(echo, vec![sample.clone()])).unwrap();
        assert_eq!(result.unboxed(), Some(sample.clone()), "kind {}", kind);
        assert_eq!(result.constructor_name().as_deref(), Some(kind.box_name()));
    }
    assert_eq!(ArgKind::ALL.len(), 7);
}
