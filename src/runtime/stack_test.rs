use crate::runtime::{
    closure::Closure,
    error::RuntimeError,
    frame::Frame,
    stack::ContinuationStack,
    value::Value,
};

#[test]
fn frames_pop_in_reverse_push_order() {
    let mut stack = ContinuationStack::new(16);
    stack.push(Frame::Apply(Value::Int(1))).unwrap();
    stack.push(Frame::Update(Closure::nullary("T", 0))).unwrap();
    stack.push(Frame::Apply(Value::Int(3))).unwrap();

    assert_eq!(stack.labels(), vec!["apply", "update", "apply"]);
    assert!(matches!(stack.pop(), Some(Frame::Apply(Value::Int(3)))));
    assert!(matches!(stack.pop(), Some(Frame::Update(_))));
    assert!(matches!(stack.pop(), Some(Frame::Apply(Value::Int(1)))));
    assert!(stack.pop().is_none());
    assert_eq!(stack.high_water(), 3);
}

#[test]
fn push_past_the_limit_overflows() {
    let mut stack = ContinuationStack::new(300);
    for i in 0..300 {
        stack.push(Frame::Apply(Value::Int(i))).unwrap();
    }
    let err = stack.push(Frame::Apply(Value::Int(300))).unwrap_err();
    assert_eq!(err, RuntimeError::StackOverflow { limit: 300 });
    assert_eq!(stack.len(), 300);
}

#[test]
fn pop_apply_leaves_other_frames_alone() {
    let mut stack = ContinuationStack::new(8);
    stack.push(Frame::Catch(Closure::nullary("H", 0))).unwrap();
    assert!(stack.pop_apply().is_none());
    assert_eq!(stack.len(), 1);

    stack.push(Frame::Apply(Value::Bool(true))).unwrap();
    assert_eq!(stack.pop_apply(), Some(Value::Bool(true)));
    assert_eq!(stack.labels(), vec!["catch"]);
}
