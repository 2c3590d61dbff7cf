use std::{fmt, sync::Arc};

use crate::runtime::{
    compiled_function::{CompiledFunction, Step},
    context::ExecutionContext,
    error::RuntimeError,
    thunk::{Thunk, ThunkBody},
    value::{ArgKind, Value},
};

/// Handle to a heap closure.
///
/// Cloning the handle shares the closure; identity is the `Arc` pointer. The
/// only in-place mutation any closure undergoes is a thunk turning into an
/// indirection, and that happens inside the thunk cell, so every holder of
/// the handle observes it.
#[derive(Clone)]
pub struct Closure(Arc<ClosureKind>);

/// The fixed set of closure variants.
pub enum ClosureKind {
    Function(Function),
    Thunk(Thunk),
    Data(DataValue),
    Partial(PartialApplication),
}

/// Classification of a closure as observed right now.
///
/// An evaluated thunk classifies as `Indirection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Function,
    Thunk,
    Data,
    Partial,
    Indirection,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Function => "function",
            Variant::Thunk => "thunk",
            Variant::Data => "data value",
            Variant::Partial => "partial application",
            Variant::Indirection => "indirection",
        }
    }
}

/// A function of fixed arity with its captured free values.
pub struct Function {
    pub info: Arc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.info.arity
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constructor {
    pub name: Arc<str>,
    pub tag: u32,
}

impl Constructor {
    pub fn new(name: &str, tag: u32) -> Self {
        Self {
            name: Arc::from(name),
            tag,
        }
    }
}

/// A fully evaluated constructor application.
pub struct DataValue {
    pub constructor: Constructor,
    pub fields: Vec<Value>,
}

/// A function bound to fewer arguments than its arity.
///
/// `function` is always a [`ClosureKind::Function`]; building a partial
/// application over another one flattens the two.
pub struct PartialApplication {
    pub function: Closure,
    pub args: Vec<Value>,
}

impl PartialApplication {
    /// Arity of the underlying function.
    pub fn arity(&self) -> usize {
        self.function.as_function().map(Function::arity).unwrap_or(0)
    }

    /// Arguments still required before the function can run.
    pub fn remaining(&self) -> usize {
        self.arity().saturating_sub(self.args.len())
    }
}

impl Closure {
    fn from_kind(kind: ClosureKind) -> Self {
        Closure(Arc::new(kind))
    }

    /// Builds a function closure with no captured values.
    pub fn function<F>(name: impl Into<String>, arity: usize, code: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &[Value]) -> Result<Step, RuntimeError> + Send + Sync + 'static,
    {
        Self::with_free(Arc::new(CompiledFunction::new(name, arity, code)), Vec::new())
    }

    /// Builds a function closure over shared code and a captured payload.
    pub fn with_free(info: Arc<CompiledFunction>, free: Vec<Value>) -> Self {
        Self::from_kind(ClosureKind::Function(Function { info, free }))
    }

    /// Builds an unevaluated thunk whose code runs against `free`.
    pub fn thunk<F>(free: Vec<Value>, code: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &[Value]) -> Result<Step, RuntimeError> + Send + Sync + 'static,
    {
        Self::from_kind(ClosureKind::Thunk(Thunk::new(ThunkBody {
            code: Arc::new(code),
            free,
        })))
    }

    pub fn data(constructor: Constructor, fields: Vec<Value>) -> Self {
        Self::from_kind(ClosureKind::Data(DataValue {
            constructor,
            fields,
        }))
    }

    /// Nullary constructor shorthand.
    pub fn nullary(name: &str, tag: u32) -> Self {
        Self::data(Constructor::new(name, tag), Vec::new())
    }

    /// Boxes a primitive into a one-field data value named after its kind.
    pub fn boxed(value: Value) -> Self {
        match value {
            Value::Boxed(closure) => closure,
            primitive => {
                let constructor = Constructor::new(primitive.kind().box_name(), 0);
                Self::data(constructor, vec![primitive])
            }
        }
    }

    /// Builds a partial application of `function` to `args`.
    ///
    /// `function` may itself be a partial application, in which case its
    /// arguments come first. The result must still be unsaturated.
    pub fn partial(function: Closure, args: Vec<Value>) -> Result<Self, RuntimeError> {
        let function = function.resolve();
        let (function, args) = match function.kind() {
            ClosureKind::Function(_) => (function.clone(), args),
            ClosureKind::Partial(pap) => {
                let mut all = pap.args.clone();
                all.extend(args);
                (pap.function.clone(), all)
            }
            _ => {
                return Err(RuntimeError::ApplyNonFunction {
                    variant: function.variant().name(),
                    args: args.len(),
                });
            }
        };
        let info = function
            .as_function()
            .map(|f| f.info.clone())
            .ok_or(RuntimeError::ApplyNonFunction {
                variant: function.variant().name(),
                args: args.len(),
            })?;
        if args.is_empty() || args.len() >= info.arity {
            return Err(RuntimeError::MalformedPartial {
                name: info.name.clone(),
                args: args.len(),
                arity: info.arity,
            });
        }
        Ok(Self::from_kind(ClosureKind::Partial(PartialApplication {
            function,
            args,
        })))
    }

    /// Builds the exception value raised for a catchable runtime error.
    pub fn exception(error: &RuntimeError) -> Self {
        Self::nullary(error.exception_name(), 0)
    }

    pub fn kind(&self) -> &ClosureKind {
        &self.0
    }

    pub fn variant(&self) -> Variant {
        match self.kind() {
            ClosureKind::Function(_) => Variant::Function,
            ClosureKind::Data(_) => Variant::Data,
            ClosureKind::Partial(_) => Variant::Partial,
            ClosureKind::Thunk(thunk) => {
                if thunk.is_evaluated() {
                    Variant::Indirection
                } else {
                    Variant::Thunk
                }
            }
        }
    }

    pub fn ptr_eq(&self, other: &Closure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Follows indirections to the closure they point at.
    ///
    /// Unevaluated thunks and non-thunks resolve to themselves.
    pub fn resolve(&self) -> Closure {
        let mut current = self.clone();
        loop {
            let target = match current.as_thunk() {
                Some(thunk) => thunk.value(),
                None => None,
            };
            match target {
                Some(target) => current = target,
                None => return current,
            }
        }
    }

    /// Whether this closure is in weak head normal form.
    pub fn is_value(&self) -> bool {
        !matches!(self.resolve().variant(), Variant::Thunk)
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self.kind() {
            ClosureKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_thunk(&self) -> Option<&Thunk> {
        match self.kind() {
            ClosureKind::Thunk(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataValue> {
        match self.kind() {
            ClosureKind::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_partial(&self) -> Option<&PartialApplication> {
        match self.kind() {
            ClosureKind::Partial(p) => Some(p),
            _ => None,
        }
    }

    /// Extracts the primitive from a value built by [`Closure::boxed`].
    pub fn unboxed(&self) -> Option<Value> {
        let resolved = self.resolve();
        let data = resolved.as_data()?;
        match data.fields.as_slice() {
            [field]
                if field.kind() != ArgKind::Boxed
                    && &*data.constructor.name == field.kind().box_name() =>
            {
                Some(field.clone())
            }
            _ => None,
        }
    }

    /// Constructor name of the data value this closure evaluates to, if known.
    pub fn constructor_name(&self) -> Option<String> {
        self.resolve().as_data().map(|d| d.constructor.name.to_string())
    }

    /// Evaluates this closure one step against `ctx`.
    ///
    /// Values (data, functions) and evaluated thunks hand themselves back in
    /// `R(1)` without side effects. An unevaluated thunk is blackholed and its
    /// code started. Partial applications are only ever consumed by the apply
    /// dispatcher, so entering one is a defect.
    pub fn enter(&self, ctx: &mut ExecutionContext) -> Result<Step, RuntimeError> {
        match self.kind() {
            ClosureKind::Function(_) | ClosureKind::Data(_) => Ok(ctx.ret(self.clone())),
            ClosureKind::Partial(_) => Err(RuntimeError::EnterPartial),
            ClosureKind::Thunk(thunk) => thunk.enter(self, ctx),
        }
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ClosureKind::Function(func) => write!(f, "<function {}/{}>", func.name(), func.arity()),
            ClosureKind::Partial(pap) => {
                let name = pap.function.as_function().map(Function::name).unwrap_or("?");
                write!(f, "<partial {} {}/{}>", name, pap.args.len(), pap.arity())
            }
            ClosureKind::Data(data) => {
                write!(f, "{}", data.constructor.name)?;
                if !data.fields.is_empty() {
                    let items: Vec<String> = data.fields.iter().map(|v| v.to_string()).collect();
                    write!(f, "({})", items.join(", "))?;
                }
                Ok(())
            }
            ClosureKind::Thunk(thunk) => match thunk.value() {
                Some(target) => write!(f, "{}", target),
                None => write!(f, "<thunk>"),
            },
        }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({:?}: {})", self.variant(), self)
    }
}
