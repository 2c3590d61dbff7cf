use crate::runtime::{
    closure::Closure,
    error::RuntimeError,
    value::{ArgKind, Value},
};

/// Registers available in each kind bank. Indices are 1-based.
pub const REGISTERS_PER_KIND: usize = 16;

/// A concrete register: one bank and a 1-based index in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterSlot {
    pub kind: ArgKind,
    pub index: usize,
}

impl RegisterSlot {
    pub fn new(kind: ArgKind, index: usize) -> Result<Self, RuntimeError> {
        if index == 0 || index > REGISTERS_PER_KIND {
            return Err(RuntimeError::RegisterExhausted {
                kind,
                index,
                available: REGISTERS_PER_KIND,
            });
        }
        Ok(Self { kind, index })
    }
}

/// Assigns calling-convention registers to a sequence of argument kinds.
///
/// The k-th argument of a given kind lands in register k of that kind's bank.
pub fn layout_for(kinds: impl IntoIterator<Item = ArgKind>) -> Result<Vec<RegisterSlot>, RuntimeError> {
    let mut next = [0usize; ArgKind::ALL.len()];
    kinds
        .into_iter()
        .map(|kind| {
            next[kind.bank()] += 1;
            RegisterSlot::new(kind, next[kind.bank()])
        })
        .collect()
}

/// Kind-typed register file.
///
/// Registers are never cleared: a reader must only touch slots its caller
/// populated by protocol.
pub struct Registers {
    boxed: [Option<Closure>; REGISTERS_PER_KIND],
    int: [i32; REGISTERS_PER_KIND],
    long: [i64; REGISTERS_PER_KIND],
    float: [f32; REGISTERS_PER_KIND],
    double: [f64; REGISTERS_PER_KIND],
    char: [char; REGISTERS_PER_KIND],
    bool: [bool; REGISTERS_PER_KIND],
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    pub fn new() -> Self {
        Self {
            boxed: std::array::from_fn(|_| None),
            int: [0; REGISTERS_PER_KIND],
            long: [0; REGISTERS_PER_KIND],
            float: [0.0; REGISTERS_PER_KIND],
            double: [0.0; REGISTERS_PER_KIND],
            char: ['\0'; REGISTERS_PER_KIND],
            bool: [false; REGISTERS_PER_KIND],
        }
    }

    fn checked(kind: ArgKind, index: usize) -> Result<usize, RuntimeError> {
        RegisterSlot::new(kind, index).map(|slot| slot.index - 1)
    }

    /// Reads a register as a kind-tagged value.
    pub fn get(&self, kind: ArgKind, index: usize) -> Result<Value, RuntimeError> {
        let i = Self::checked(kind, index)?;
        Ok(match kind {
            ArgKind::Boxed => Value::Boxed(
                self.boxed[i]
                    .clone()
                    .ok_or(RuntimeError::EmptyRegister { kind, index })?,
            ),
            ArgKind::Int => Value::Int(self.int[i]),
            ArgKind::Long => Value::Long(self.long[i]),
            ArgKind::Float => Value::Float(self.float[i]),
            ArgKind::Double => Value::Double(self.double[i]),
            ArgKind::Char => Value::Char(self.char[i]),
            ArgKind::Bool => Value::Bool(self.bool[i]),
        })
    }

    /// Writes a value into register `index` of the value's own bank.
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        let i = Self::checked(value.kind(), index)?;
        self.store_unchecked(i, value);
        Ok(())
    }

    /// Writes a value into a precomputed slot.
    ///
    /// The slot's kind must match the value's kind.
    pub fn store(&mut self, slot: RegisterSlot, value: Value) -> Result<(), RuntimeError> {
        if slot.kind != value.kind() {
            return Err(RuntimeError::RegisterKind {
                expected: slot.kind,
                index: slot.index,
            });
        }
        self.store_unchecked(slot.index - 1, value);
        Ok(())
    }

    #[inline(always)]
    fn store_unchecked(&mut self, i: usize, value: Value) {
        match value {
            Value::Boxed(c) => self.boxed[i] = Some(c),
            Value::Int(v) => self.int[i] = v,
            Value::Long(v) => self.long[i] = v,
            Value::Float(v) => self.float[i] = v,
            Value::Double(v) => self.double[i] = v,
            Value::Char(v) => self.char[i] = v,
            Value::Bool(v) => self.bool[i] = v,
        }
    }

    pub fn boxed(&self, index: usize) -> Result<Closure, RuntimeError> {
        let i = Self::checked(ArgKind::Boxed, index)?;
        self.boxed[i].clone().ok_or(RuntimeError::EmptyRegister {
            kind: ArgKind::Boxed,
            index,
        })
    }

    pub fn int(&self, index: usize) -> Result<i32, RuntimeError> {
        Ok(self.int[Self::checked(ArgKind::Int, index)?])
    }

    pub fn long(&self, index: usize) -> Result<i64, RuntimeError> {
        Ok(self.long[Self::checked(ArgKind::Long, index)?])
    }

    pub fn float(&self, index: usize) -> Result<f32, RuntimeError> {
        Ok(self.float[Self::checked(ArgKind::Float, index)?])
    }

    pub fn double(&self, index: usize) -> Result<f64, RuntimeError> {
        Ok(self.double[Self::checked(ArgKind::Double, index)?])
    }

    pub fn char(&self, index: usize) -> Result<char, RuntimeError> {
        Ok(self.char[Self::checked(ArgKind::Char, index)?])
    }

    pub fn bool(&self, index: usize) -> Result<bool, RuntimeError> {
        Ok(self.bool[Self::checked(ArgKind::Bool, index)?])
    }

    /// Writes `R(1)`, the result register.
    #[inline(always)]
    pub fn set_result(&mut self, value: Closure) {
        self.boxed[0] = Some(value);
    }

    /// Drops every boxed reference so the register file pins no closures.
    pub fn release_boxed(&mut self) {
        for slot in self.boxed.iter_mut() {
            *slot = None;
        }
    }
}
