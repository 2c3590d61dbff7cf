mod common;

use std::thread;

use common::{catching, deep, evaluate, evaluate_with_limit, start_countdown};
use graft::runtime::error::RuntimeError;

/// Runs `f` on a thread with a deliberately small host stack.
fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn a_million_tail_calls_run_in_constant_host_stack() {
    let result = on_small_stack(|| evaluate(start_countdown(1_000_000)).map(|v| v.to_string()));
    assert_eq!(result.unwrap(), "Done");
}

#[test]
fn deep_non_tail_recursion_lives_on_the_continuation_stack() {
    let result = on_small_stack(|| {
        evaluate(deep(100_000)).map(|v| v.unboxed().and_then(|v| v.as_int()))
    });
    assert_eq!(result.unwrap(), Some(100_000));
}

#[test]
fn exceeding_the_stack_limit_halts_without_a_handler() {
    let err = evaluate_with_limit(deep(10_000), 1_000).unwrap_err();
    assert_eq!(err, RuntimeError::StackOverflow { limit: 1_000 });
}

#[test]
fn stack_limit_is_exact() {
    // The root thunk plus one update and one case frame per level.
    let frames_for = |levels: i32| 1 + 2 * levels as usize;
    assert!(evaluate_with_limit(deep(49), frames_for(49)).is_ok());
    assert!(evaluate_with_limit(deep(50), frames_for(49)).is_err());
}

#[test]
fn overflow_is_catchable_below_the_limit() {
    let result = evaluate_with_limit(catching(deep(10_000)), 1_000).unwrap();
    assert_eq!(result.to_string(), "Caught(StackOverflow)");
}
