//! Compiled artifacts and their invocation frames.
//!
//! A compiled expression is a tree of [`Thunk`] closures. Invocation builds a
//! fresh [`Activation`] frame, so one artifact can run concurrently from any
//! number of threads and keeps no tie to the `Context` that produced it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::Value;

/// Errors raised while an artifact runs.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Cannot convert {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("Null reference accessing {0}")]
    NullReference(String),

    #[error("Expected {expected} arguments, found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Values {left} and {right} cannot be ordered")]
    Incomparable { left: String, right: String },

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

impl RuntimeError {
    pub fn type_mismatch(expected: &str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }

    pub fn invalid_cast(from: &Value, to: &str) -> Self {
        Self::InvalidCast {
            from: from.type_name().to_string(),
            to: to.to_string(),
        }
    }
}

/// One unit of compiled code.
pub type Thunk = Arc<dyn Fn(&mut Activation) -> RuntimeResult<Value> + Send + Sync>;

/// Per-invocation frame: the caller's arguments plus the local slots the
/// backend allocated for declared variables. Locals start out Null and are
/// written by block initializers and assignments.
pub struct Activation {
    params: Vec<Value>,
    locals: Vec<Value>,
}

impl Activation {
    pub(crate) fn new(params: Vec<Value>, local_count: usize) -> Self {
        Self {
            params,
            locals: vec![Value::Null; local_count],
        }
    }

    pub fn parameter(&self, index: usize) -> RuntimeResult<&Value> {
        self.params.get(index).ok_or(RuntimeError::ArgumentCount {
            expected: index + 1,
            found: self.params.len(),
        })
    }

    pub fn local(&self, slot: usize) -> &Value {
        &self.locals[slot]
    }

    pub fn set_local(&mut self, slot: usize, value: Value) {
        self.locals[slot] = value;
    }
}

/// A finished artifact: invocable, `Send + Sync`, free of its `Context`.
#[derive(Clone)]
pub struct CompiledExpr {
    thunk: Thunk,
    parameter_count: usize,
    local_count: usize,
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("parameter_count", &self.parameter_count)
            .field("local_count", &self.local_count)
            .finish_non_exhaustive()
    }
}

impl CompiledExpr {
    pub(crate) fn new(thunk: Thunk, parameter_count: usize, local_count: usize) -> Self {
        Self {
            thunk,
            parameter_count,
            local_count,
        }
    }

    /// Runs the artifact against one argument list. Arguments are positional
    /// and must match the parameter declarations of the compiling `Context`
    /// in number; each call gets a fresh frame.
    pub fn invoke(&self, params: &[Value]) -> RuntimeResult<Value> {
        if params.len() != self.parameter_count {
            return Err(RuntimeError::ArgumentCount {
                expected: self.parameter_count,
                found: params.len(),
            });
        }
        let mut frame = Activation::new(params.to_vec(), self.local_count);
        (self.thunk)(&mut frame)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }
}
