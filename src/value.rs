use core::fmt;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

/// Runtime value model.
///
/// Every numeric width the promotion lattice ranks gets its own variant, so
/// compiled kernels can stay in the operand's native representation instead of
/// collapsing everything to `i64`/`f64`. `Record` carries schema-declared
/// instances keyed by property name; `Opaque` carries registered host values
/// behind `Any` so accessors can downcast them back.
#[derive(Clone, Default)]
pub enum Value {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    String(String),
    Boolean(bool),
    List(Vec<Value>),
    Record {
        type_name: String,
        fields: HashMap<String, Value>,
    },
    Opaque(Arc<dyn Any + Send + Sync>),
    #[default]
    Null,
}

impl Value {
    /// Name of the built-in type describing this value, used to look the
    /// descriptor up by name. Records answer with their declared type name.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Int8(_) => "Int8",
            Value::UInt8(_) => "UInt8",
            Value::Int16(_) => "Int16",
            Value::UInt16(_) => "UInt16",
            Value::Int32(_) => "Int32",
            Value::UInt32(_) => "UInt32",
            Value::Int64(_) => "Int64",
            Value::UInt64(_) => "UInt64",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::List(_) => "List",
            Value::Record { type_name, .. } => type_name,
            Value::Opaque(_) => "Opaque",
            Value::Null => "Null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Wraps a host value for use with a registered native type.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    /// Borrows the wrapped host value back out, if the types line up.
    pub fn as_opaque<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Concrete `TypeId` of a wrapped host value. `None` for everything else;
    /// non-opaque values resolve by name instead of by handle.
    pub fn runtime_handle(&self) -> Option<TypeId> {
        match self {
            Value::Opaque(any) => Some((**any).type_id()),
            _ => None,
        }
    }

    /// Convenience constructor for record instances.
    pub fn record(type_name: &str, fields: &[(&str, Value)]) -> Self {
        Value::Record {
            type_name: type_name.to_string(),
            fields: fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    /// Field of a record instance, `None` when absent or not a record.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record { fields, .. } => fields.get(name),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int8(v) => write!(f, "Int8({})", v),
            Value::UInt8(v) => write!(f, "UInt8({})", v),
            Value::Int16(v) => write!(f, "Int16({})", v),
            Value::UInt16(v) => write!(f, "UInt16({})", v),
            Value::Int32(v) => write!(f, "Int32({})", v),
            Value::UInt32(v) => write!(f, "UInt32({})", v),
            Value::Int64(v) => write!(f, "Int64({})", v),
            Value::UInt64(v) => write!(f, "UInt64({})", v),
            Value::Float32(v) => write!(f, "Float32({})", v),
            Value::Float64(v) => write!(f, "Float64({})", v),
            Value::Decimal(v) => write!(f, "Decimal({})", v),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Record { type_name, fields } => f
                .debug_struct("Record")
                .field("type_name", type_name)
                .field("fields", fields)
                .finish(),
            Value::Opaque(_) => write!(f, "Opaque(..)"),
            Value::Null => write!(f, "Null"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int8(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Null => write!(f, "null"),
            _ => write!(f, "{:?}", self),
        }
    }
}

// Opaque values compare by pointer. Everything else compares structurally
// within its own variant; mixed numeric widths are never equal here, the
// promoted comparison in the compiled kernels handles those.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int8(l), Value::Int8(r)) => l == r,
            (Value::UInt8(l), Value::UInt8(r)) => l == r,
            (Value::Int16(l), Value::Int16(r)) => l == r,
            (Value::UInt16(l), Value::UInt16(r)) => l == r,
            (Value::Int32(l), Value::Int32(r)) => l == r,
            (Value::UInt32(l), Value::UInt32(r)) => l == r,
            (Value::Int64(l), Value::Int64(r)) => l == r,
            (Value::UInt64(l), Value::UInt64(r)) => l == r,
            (Value::Float32(l), Value::Float32(r)) => l == r,
            (Value::Float64(l), Value::Float64(r)) => l == r,
            (Value::Decimal(l), Value::Decimal(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::List(l), Value::List(r)) => l == r,
            (
                Value::Record {
                    type_name: ln,
                    fields: lf,
                },
                Value::Record {
                    type_name: rn,
                    fields: rf,
                },
            ) => ln == rn && lf == rf,
            (Value::Opaque(l), Value::Opaque(r)) => Arc::ptr_eq(l, r),
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int8(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int16(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}
