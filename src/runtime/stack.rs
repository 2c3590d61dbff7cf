use crate::runtime::{error::RuntimeError, frame::Frame, value::Value};

pub const DEFAULT_STACK_LIMIT: usize = 1 << 20; // 1,048,576 frames
const INITIAL_STACK_FRAMES: usize = 64;
const STACK_GROW_MIN_CHUNK: usize = 256;

/// Owned, growable LIFO of continuation frames with a hard depth limit.
///
/// Belongs to one logical thread; it moves into a worker's context while the
/// thread runs and back out when the thread yields or blocks.
pub struct ContinuationStack {
    frames: Vec<Frame>,
    limit: usize,
    high_water: usize,
}

impl Default for ContinuationStack {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_LIMIT)
    }
}

impl ContinuationStack {
    pub fn new(limit: usize) -> Self {
        Self {
            frames: Vec::with_capacity(INITIAL_STACK_FRAMES.min(limit)),
            limit,
            high_water: 0,
        }
    }

    #[inline(always)]
    pub fn push(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        let len = self.frames.len();
        if len < self.frames.capacity() && len < self.limit {
            self.frames.push(frame);
            self.high_water = self.high_water.max(self.frames.len());
            return Ok(());
        }
        self.push_slow(frame)
    }

    #[cold]
    #[inline(never)]
    fn push_slow(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        let len = self.frames.len();
        if len >= self.limit {
            return Err(RuntimeError::StackOverflow { limit: self.limit });
        }
        let grow = (len / 2).max(STACK_GROW_MIN_CHUNK).min(self.limit - len);
        self.frames.reserve_exact(grow);
        self.frames.push(frame);
        self.high_water = self.high_water.max(self.frames.len());
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Pops the top frame only if it is an apply frame, returning its argument.
    pub fn pop_apply(&mut self) -> Option<Value> {
        match self.frames.last() {
            Some(Frame::Apply(_)) => match self.frames.pop() {
                Some(Frame::Apply(arg)) => Some(arg),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn peek(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Deepest the stack has been since creation.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Frame labels from top to bottom.
    pub fn labels(&self) -> Vec<&'static str> {
        self.frames.iter().rev().map(Frame::label).collect()
    }
}
