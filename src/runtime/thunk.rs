//! Updatable thunk cells.
//!
//! A thunk moves through three states:
//!
//! ```text
//! Unevaluated ──enter──▶ UnderEvaluation ──update──▶ Evaluated (indirection)
//!      ▲                       │
//!      └────────reset──────────┘   (exception unwound through its update frame)
//! ```
//!
//! The transition out of `Unevaluated` happens under the cell's lock, so at
//! most one logical thread ever runs a thunk's code at a time. Every other
//! thread that enters while the thunk is under evaluation blocks, either by
//! parking its [`LogicalThread`] on the cell or by waiting on the condvar.
//!
//! Re-entry by the owning thread raises `NonTermination`, and so does
//! blocking that would close a cycle of threads waiting on each other's
//! thunks.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::runtime::{
    closure::Closure,
    compiled_function::{Code, Step},
    context::ExecutionContext,
    error::RuntimeError,
    frame::Frame,
    thread::{LogicalThread, ThreadId},
    value::Value,
};

/// Blocked logical thread → the thunk it is waiting on.
///
/// An entry lives from the moment a thread blocks until it is attached to a
/// worker again (or abandoned), so following thunk owners through this map
/// walks a chain of threads that are all currently waiting.
static WAITING: LazyLock<Mutex<HashMap<ThreadId, Closure>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Forgets that `thread` was waiting on a thunk.
pub(crate) fn clear_waiting(thread: ThreadId) {
    if thread != ThreadId::NONE {
        WAITING.lock().remove(&thread);
    }
}

/// Records that `me` is about to wait on `thunk`, unless waiting would close
/// a cycle: `thunk` is owned by a thread waiting (directly or through other
/// waiting threads) on a thunk `me` owns. Returns `false` for a cycle.
fn register_wait(me: ThreadId, thunk: &Closure) -> bool {
    if me == ThreadId::NONE {
        return true;
    }
    let mut waiting = WAITING.lock();
    let mut current = thunk.as_thunk().and_then(Thunk::owner);
    // Every hop visits a distinct waiting thread, so the chain is bounded.
    for _ in 0..=waiting.len() {
        match current {
            Some(owner) if owner == me => return false,
            Some(owner) => {
                current = waiting
                    .get(&owner)
                    .and_then(|next| next.as_thunk())
                    .and_then(Thunk::owner);
            }
            None => break,
        }
    }
    waiting.insert(me, thunk.clone());
    true
}

/// Suspended computation: code plus the payload it closes over.
pub struct ThunkBody {
    pub code: Code,
    pub free: Vec<Value>,
}

pub enum ThunkState {
    Unevaluated(Arc<ThunkBody>),
    /// Blackholed by `owner`. Threads parked here resume when it settles.
    UnderEvaluation {
        owner: ThreadId,
        body: Arc<ThunkBody>,
        blocked: Vec<LogicalThread>,
    },
    /// Updated in place; the thunk is now an indirection to this value.
    Evaluated(Closure),
}

pub struct Thunk {
    state: Mutex<ThunkState>,
    settled: Condvar,
}

enum Entry {
    Value(Closure),
    Start(Arc<ThunkBody>),
    Busy,
    Loop,
}

impl Thunk {
    pub fn new(body: ThunkBody) -> Self {
        Self {
            state: Mutex::new(ThunkState::Unevaluated(Arc::new(body))),
            settled: Condvar::new(),
        }
    }

    /// Evaluated target, if the thunk has been updated.
    pub fn value(&self) -> Option<Closure> {
        match &*self.state.lock() {
            ThunkState::Evaluated(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(&*self.state.lock(), ThunkState::Evaluated(_))
    }

    pub fn is_under_evaluation(&self) -> bool {
        matches!(&*self.state.lock(), ThunkState::UnderEvaluation { .. })
    }

    /// Logical thread currently evaluating this thunk.
    pub fn owner(&self) -> Option<ThreadId> {
        match &*self.state.lock() {
            ThunkState::UnderEvaluation { owner, .. } => Some(*owner),
            _ => None,
        }
    }

    /// Enters the thunk on behalf of the thread attached to `ctx`.
    ///
    /// `this` is the closure handle wrapping `self`; it is what the update
    /// frame and a blocked thread refer to.
    pub(crate) fn enter(&self, this: &Closure, ctx: &mut ExecutionContext) -> Result<Step, RuntimeError> {
        let me = ctx.thread_id();
        let entry = {
            let mut state = self.state.lock();
            match &mut *state {
                ThunkState::Evaluated(value) => Entry::Value(value.clone()),
                ThunkState::UnderEvaluation { owner, .. } if *owner == me => Entry::Loop,
                ThunkState::UnderEvaluation { .. } => Entry::Busy,
                ThunkState::Unevaluated(body) => {
                    let body = body.clone();
                    *state = ThunkState::UnderEvaluation {
                        owner: me,
                        body: body.clone(),
                        blocked: Vec::new(),
                    };
                    Entry::Start(body)
                }
            }
        };

        match entry {
            Entry::Value(value) => Ok(ctx.ret(value)),
            Entry::Loop => Err(RuntimeError::NonTermination),
            Entry::Busy => {
                if !register_wait(me, this) {
                    debug!(target: "graft::update", thread = %me, "blocking would deadlock; raising <<loop>>");
                    return Err(RuntimeError::NonTermination);
                }
                ctx.stats.blocks += 1;
                trace!(target: "graft::update", thread = %me, "thunk busy; blocking");
                Ok(Step::Block(this.clone()))
            }
            Entry::Start(body) => {
                if let Err(err) = ctx.push(Frame::Update(this.clone())) {
                    let released = self.reset();
                    ctx.wake(this, released);
                    return Err(err);
                }
                ctx.stats.thunk_entries += 1;
                (body.code)(ctx, &body.free)
            }
        }
    }

    /// Publishes `value` as this thunk's result.
    ///
    /// Returns the threads that were blocked on it. If the thunk was already
    /// evaluated the first result stands and is returned as the error.
    pub fn update(&self, value: Closure) -> Result<Vec<LogicalThread>, Closure> {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut *state, ThunkState::Evaluated(value));
        let blocked = match previous {
            ThunkState::UnderEvaluation { blocked, .. } => blocked,
            ThunkState::Unevaluated(_) => Vec::new(),
            ThunkState::Evaluated(first) => {
                *state = ThunkState::Evaluated(first.clone());
                return Err(first);
            }
        };
        drop(state);
        self.settled.notify_all();
        Ok(blocked)
    }

    /// Returns a blackholed thunk to the unevaluated state.
    ///
    /// Used when an exception unwinds through the thunk's update frame. The
    /// released threads will retry the evaluation themselves.
    pub fn reset(&self) -> Vec<LogicalThread> {
        let mut state = self.state.lock();
        let blocked = match &mut *state {
            ThunkState::UnderEvaluation { body, blocked, .. } => {
                let blocked = std::mem::take(blocked);
                let body = body.clone();
                *state = ThunkState::Unevaluated(body);
                blocked
            }
            _ => Vec::new(),
        };
        drop(state);
        self.settled.notify_all();
        blocked
    }

    /// Parks `thread` until this thunk settles.
    ///
    /// Fails, handing the thread back, when the thunk is no longer under
    /// evaluation; the caller should simply resume it.
    pub fn park(&self, thread: LogicalThread) -> Result<(), LogicalThread> {
        let mut state = self.state.lock();
        match &mut *state {
            ThunkState::UnderEvaluation { blocked, .. } => {
                blocked.push(thread);
                Ok(())
            }
            _ => Err(thread),
        }
    }

    /// Blocks the calling OS thread until the thunk is not under evaluation.
    pub fn wait_settled(&self) {
        let mut state = self.state.lock();
        while matches!(&*state, ThunkState::UnderEvaluation { .. }) {
            self.settled.wait(&mut state);
        }
    }
}
