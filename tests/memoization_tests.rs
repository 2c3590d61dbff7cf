mod common;

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use common::{applying, atom, evaluate, pair};
use graft::runtime::{
    closure::{Closure, Constructor, Variant},
    error::RuntimeError,
    value::Value,
};

fn counted(runs: Arc<AtomicUsize>, delay: Duration) -> Closure {
    Closure::thunk(Vec::new(), move |ctx, _| {
        runs.fetch_add(1, Ordering::SeqCst);
        thread::sleep(delay);
        Ok(ctx.ret(Closure::data(Constructor::new("Result", 0), vec![Value::Int(42)])))
    })
}

#[test]
fn sequential_evaluations_compute_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let thunk = counted(runs.clone(), Duration::ZERO);

    let first = evaluate(thunk.clone()).unwrap();
    let second = evaluate(thunk.clone()).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(first.ptr_eq(&second));
    assert_eq!(thunk.variant(), Variant::Indirection);
}

#[test]
fn racing_workers_compute_once_and_share_the_result() {
    const RACERS: usize = 8;
    let runs = Arc::new(AtomicUsize::new(0));
    let thunk = counted(runs.clone(), Duration::from_millis(30));
    let barrier = Arc::new(Barrier::new(RACERS));

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let thunk = thunk.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                evaluate(thunk)
            })
        })
        .collect();
    let results: Vec<Closure> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    for result in &results {
        assert!(result.ptr_eq(&results[0]));
    }
    assert_eq!(results[0].to_string(), "Result(42#)");
}

#[test]
fn holders_of_the_thunk_see_the_update() {
    let runs = Arc::new(AtomicUsize::new(0));
    let thunk = counted(runs.clone(), Duration::ZERO);
    let left = Closure::data(Constructor::new("Box", 0), vec![thunk.clone().into()]);
    let right = Closure::data(Constructor::new("Box", 0), vec![thunk.clone().into()]);

    evaluate(thunk.clone()).unwrap();

    for holder in [&left, &right] {
        let field = holder.as_data().unwrap().fields[0].as_closure().unwrap().clone();
        assert_eq!(field.variant(), Variant::Indirection);
        assert_eq!(field.to_string(), "Result(42#)");
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn thunk_may_evaluate_to_a_function() {
    let x = atom("X");
    let lazy_pap = applying(pair(), vec![x.into()]);
    evaluate(lazy_pap.clone()).unwrap();
    assert_eq!(lazy_pap.variant(), Variant::Indirection);

    // An evaluated thunk is applied through its indirection.
    let result = evaluate(applying(lazy_pap, vec![atom("Y").into()])).unwrap();
    assert_eq!(result.to_string(), "Pair(X, Y)");
}

#[test]
fn applying_an_unevaluated_thunk_is_a_defect() {
    let lazy_pap = applying(pair(), vec![atom("X").into()]);
    let err = evaluate(applying(lazy_pap, vec![atom("Y").into()])).unwrap_err();
    assert_eq!(err, RuntimeError::ApplyNonFunction { variant: "thunk", args: 1 });
}
