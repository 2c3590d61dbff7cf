use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::closure::Closure;

/// Representation class of an argument, register, or stack slot.
///
/// Boxed values are heap closures; every other kind is an unboxed primitive
/// carried by value. Registers, apply frames, and apply schemas are all keyed
/// by this kind so primitives never need to be boxed on the call path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArgKind {
    Boxed,
    Int,
    Long,
    Float,
    Double,
    Char,
    Bool,
}

impl ArgKind {
    /// All kinds, in register-bank order.
    pub const ALL: [ArgKind; 7] = [
        ArgKind::Boxed,
        ArgKind::Int,
        ArgKind::Long,
        ArgKind::Float,
        ArgKind::Double,
        ArgKind::Char,
        ArgKind::Bool,
    ];

    /// Position of this kind's bank inside the register file.
    pub fn bank(self) -> usize {
        self as usize
    }

    /// One-letter code used when printing apply schemas.
    pub fn code(self) -> char {
        match self {
            ArgKind::Boxed => 'O',
            ArgKind::Int => 'I',
            ArgKind::Long => 'L',
            ArgKind::Float => 'F',
            ArgKind::Double => 'D',
            ArgKind::Char => 'C',
            ArgKind::Bool => 'Z',
        }
    }

    /// Constructor name used when a primitive of this kind is boxed into a data value.
    pub fn box_name(self) -> &'static str {
        match self {
            ArgKind::Boxed => "Box",
            ArgKind::Int => "Int",
            ArgKind::Long => "Long",
            ArgKind::Float => "Float",
            ArgKind::Double => "Double",
            ArgKind::Char => "Char",
            ArgKind::Bool => "Bool",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A kind-tagged value: a closure reference or one unboxed primitive.
///
/// This is what payloads, partial applications, and apply frames hold. The
/// tag doubles as the apply-frame specialization: an apply frame carrying
/// `Value::Int` is the integer apply frame.
#[derive(Debug, Clone)]
pub enum Value {
    Boxed(Closure),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> ArgKind {
        match self {
            Value::Boxed(_) => ArgKind::Boxed,
            Value::Int(_) => ArgKind::Int,
            Value::Long(_) => ArgKind::Long,
            Value::Float(_) => ArgKind::Float,
            Value::Double(_) => ArgKind::Double,
            Value::Char(_) => ArgKind::Char,
            Value::Bool(_) => ArgKind::Bool,
        }
    }

    pub fn as_closure(&self) -> Option<&Closure> {
        match self {
            Value::Boxed(closure) => Some(closure),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Primitives compare by value; boxed values compare by closure identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boxed(a), Value::Boxed(b)) => a.ptr_eq(b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Closure> for Value {
    fn from(closure: Closure) -> Self {
        Value::Boxed(closure)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boxed(closure) => write!(f, "{}", closure),
            Value::Int(v) => write!(f, "{}#", v),
            Value::Long(v) => write!(f, "{}L#", v),
            Value::Float(v) => write!(f, "{}f#", v),
            Value::Double(v) => write!(f, "{}##", v),
            Value::Char(v) => write!(f, "{:?}#", v),
            Value::Bool(v) => write!(f, "{}#", v),
        }
    }
}

/// Renders a sequence of kinds as its schema code, e.g. `OOI`.
pub fn schema_code(kinds: &[ArgKind]) -> String {
    kinds.iter().map(|kind| kind.code()).collect()
}
