//! Value kernels behind the compiled thunks.
//!
//! Arithmetic runs on operands of one shared numeric kind; [`widen`] brings
//! a value up to the promoted kind first and fails loudly when the value
//! does not fit (a negative signed operand meeting an unsigned promotion,
//! for instance). Integer arithmetic wraps, floats follow IEEE, Decimal
//! uses checked operations. Division and modulo by integer zero are errors.

use std::cmp::Ordering;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::artifact::{RuntimeError, RuntimeResult};
use crate::ast::BinaryOperator;
use crate::semantic::promote::{promote, NumericKind};
use crate::value::Value;

pub(crate) fn numeric_kind_of(value: &Value) -> Option<NumericKind> {
    match value {
        Value::Int8(_) => Some(NumericKind::Int8),
        Value::UInt8(_) => Some(NumericKind::UInt8),
        Value::Int16(_) => Some(NumericKind::Int16),
        Value::UInt16(_) => Some(NumericKind::UInt16),
        Value::Int32(_) => Some(NumericKind::Int32),
        Value::UInt32(_) => Some(NumericKind::UInt32),
        Value::Int64(_) => Some(NumericKind::Int64),
        Value::UInt64(_) => Some(NumericKind::UInt64),
        Value::Float32(_) => Some(NumericKind::Float32),
        Value::Float64(_) => Some(NumericKind::Float64),
        Value::Decimal(_) => Some(NumericKind::Decimal),
        _ => None,
    }
}

enum Scalar {
    I(i128),
    F(f64),
    D(Decimal),
}

fn scalar_of(value: &Value) -> Option<Scalar> {
    match value {
        Value::Int8(n) => Some(Scalar::I(*n as i128)),
        Value::UInt8(n) => Some(Scalar::I(*n as i128)),
        Value::Int16(n) => Some(Scalar::I(*n as i128)),
        Value::UInt16(n) => Some(Scalar::I(*n as i128)),
        Value::Int32(n) => Some(Scalar::I(*n as i128)),
        Value::UInt32(n) => Some(Scalar::I(*n as i128)),
        Value::Int64(n) => Some(Scalar::I(*n as i128)),
        Value::UInt64(n) => Some(Scalar::I(*n as i128)),
        Value::Float32(x) => Some(Scalar::F(*x as f64)),
        Value::Float64(x) => Some(Scalar::F(*x)),
        Value::Decimal(d) => Some(Scalar::D(*d)),
        _ => None,
    }
}

/// Converts a numeric value to the target kind. Checked conversion errors
/// when the value does not fit; unchecked truncates toward zero and wraps
/// narrowing integers (floats saturate at the target's bounds).
pub(crate) fn cast_numeric(
    value: &Value,
    target: NumericKind,
    checked: bool,
) -> RuntimeResult<Value> {
    let Some(scalar) = scalar_of(value) else {
        return Err(RuntimeError::invalid_cast(value, target.type_name()));
    };
    match scalar {
        Scalar::I(i) => int_to(i, value, target, checked),
        Scalar::F(x) => float_to(x, value, target, checked),
        Scalar::D(d) => decimal_to(d, value, target, checked),
    }
}

/// Checked conversion to the promoted kind.
pub(crate) fn widen(value: &Value, target: NumericKind) -> RuntimeResult<Value> {
    cast_numeric(value, target, true)
}

fn int_to(i: i128, source: &Value, target: NumericKind, checked: bool) -> RuntimeResult<Value> {
    macro_rules! narrow {
        ($ty:ty, $variant:ident) => {
            if checked {
                <$ty>::try_from(i)
                    .map(Value::$variant)
                    .map_err(|_| RuntimeError::invalid_cast(source, target.type_name()))
            } else {
                Ok(Value::$variant(i as $ty))
            }
        };
    }
    match target {
        NumericKind::Int8 => narrow!(i8, Int8),
        NumericKind::UInt8 => narrow!(u8, UInt8),
        NumericKind::Int16 => narrow!(i16, Int16),
        NumericKind::UInt16 => narrow!(u16, UInt16),
        NumericKind::Int32 => narrow!(i32, Int32),
        NumericKind::UInt32 => narrow!(u32, UInt32),
        NumericKind::Int64 => narrow!(i64, Int64),
        NumericKind::UInt64 => narrow!(u64, UInt64),
        NumericKind::Float32 => Ok(Value::Float32(i as f32)),
        NumericKind::Float64 => Ok(Value::Float64(i as f64)),
        NumericKind::Decimal => Decimal::try_from_i128_with_scale(i, 0)
            .map(Value::Decimal)
            .map_err(|_| RuntimeError::invalid_cast(source, target.type_name())),
    }
}

fn float_to(x: f64, source: &Value, target: NumericKind, checked: bool) -> RuntimeResult<Value> {
    macro_rules! to_int {
        ($ty:ty, $variant:ident) => {{
            if checked {
                let truncated = x.trunc();
                if x.is_nan()
                    || truncated < <$ty>::MIN as f64
                    || truncated > <$ty>::MAX as f64
                {
                    Err(RuntimeError::invalid_cast(source, target.type_name()))
                } else {
                    Ok(Value::$variant(truncated as $ty))
                }
            } else {
                Ok(Value::$variant(x as $ty))
            }
        }};
    }
    match target {
        NumericKind::Int8 => to_int!(i8, Int8),
        NumericKind::UInt8 => to_int!(u8, UInt8),
        NumericKind::Int16 => to_int!(i16, Int16),
        NumericKind::UInt16 => to_int!(u16, UInt16),
        NumericKind::Int32 => to_int!(i32, Int32),
        NumericKind::UInt32 => to_int!(u32, UInt32),
        NumericKind::Int64 => to_int!(i64, Int64),
        NumericKind::UInt64 => to_int!(u64, UInt64),
        NumericKind::Float32 => Ok(Value::Float32(x as f32)),
        NumericKind::Float64 => Ok(Value::Float64(x)),
        NumericKind::Decimal => Decimal::from_f64(x)
            .map(Value::Decimal)
            .ok_or_else(|| RuntimeError::invalid_cast(source, target.type_name())),
    }
}

fn decimal_to(d: Decimal, source: &Value, target: NumericKind, checked: bool) -> RuntimeResult<Value> {
    match target {
        NumericKind::Decimal => Ok(Value::Decimal(d)),
        NumericKind::Float32 => d
            .to_f64()
            .map(|x| Value::Float32(x as f32))
            .ok_or_else(|| RuntimeError::invalid_cast(source, target.type_name())),
        NumericKind::Float64 => d
            .to_f64()
            .map(Value::Float64)
            .ok_or_else(|| RuntimeError::invalid_cast(source, target.type_name())),
        _ => {
            let truncated = d.trunc().to_i128().ok_or_else(|| {
                RuntimeError::invalid_cast(source, target.type_name())
            })?;
            int_to(truncated, source, target, checked)
        }
    }
}

/// Arithmetic over two operands of the same numeric kind.
pub(crate) fn apply_arithmetic(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> RuntimeResult<Value> {
    macro_rules! int_arm {
        ($variant:ident, $a:expr, $b:expr) => {{
            let (a, b) = (*$a, *$b);
            match op {
                BinaryOperator::Add => Ok(Value::$variant(a.wrapping_add(b))),
                BinaryOperator::Subtract => Ok(Value::$variant(a.wrapping_sub(b))),
                BinaryOperator::Multiply => Ok(Value::$variant(a.wrapping_mul(b))),
                BinaryOperator::Divide => {
                    if b == 0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(Value::$variant(a.wrapping_div(b)))
                    }
                }
                BinaryOperator::Modulo => {
                    if b == 0 {
                        Err(RuntimeError::DivisionByZero)
                    } else {
                        Ok(Value::$variant(a.wrapping_rem(b)))
                    }
                }
                other => Err(RuntimeError::Arithmetic(format!(
                    "operator {other} is not arithmetic"
                ))),
            }
        }};
    }
    macro_rules! float_arm {
        ($variant:ident, $ty:ty, $a:expr, $b:expr) => {{
            let (a, b): ($ty, $ty) = (*$a, *$b);
            match op {
                BinaryOperator::Add => Ok(Value::$variant(a + b)),
                BinaryOperator::Subtract => Ok(Value::$variant(a - b)),
                BinaryOperator::Multiply => Ok(Value::$variant(a * b)),
                BinaryOperator::Divide => Ok(Value::$variant(a / b)),
                BinaryOperator::Modulo => Ok(Value::$variant(a % b)),
                other => Err(RuntimeError::Arithmetic(format!(
                    "operator {other} is not arithmetic"
                ))),
            }
        }};
    }

    match (left, right) {
        (Value::Int8(a), Value::Int8(b)) => int_arm!(Int8, a, b),
        (Value::UInt8(a), Value::UInt8(b)) => int_arm!(UInt8, a, b),
        (Value::Int16(a), Value::Int16(b)) => int_arm!(Int16, a, b),
        (Value::UInt16(a), Value::UInt16(b)) => int_arm!(UInt16, a, b),
        (Value::Int32(a), Value::Int32(b)) => int_arm!(Int32, a, b),
        (Value::UInt32(a), Value::UInt32(b)) => int_arm!(UInt32, a, b),
        (Value::Int64(a), Value::Int64(b)) => int_arm!(Int64, a, b),
        (Value::UInt64(a), Value::UInt64(b)) => int_arm!(UInt64, a, b),
        (Value::Float32(a), Value::Float32(b)) => float_arm!(Float32, f32, a, b),
        (Value::Float64(a), Value::Float64(b)) => float_arm!(Float64, f64, a, b),
        (Value::Decimal(a), Value::Decimal(b)) => decimal_arithmetic(op, *a, *b),
        (a, b) => Err(RuntimeError::type_mismatch(a.type_name(), b)),
    }
}

fn decimal_arithmetic(op: BinaryOperator, a: Decimal, b: Decimal) -> RuntimeResult<Value> {
    let overflow = || RuntimeError::Arithmetic("decimal overflow".to_string());
    let result = match op {
        BinaryOperator::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOperator::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOperator::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOperator::Divide => {
            if b.is_zero() {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_div(b).ok_or_else(overflow)?
        }
        BinaryOperator::Modulo => {
            if b.is_zero() {
                return Err(RuntimeError::DivisionByZero);
            }
            a.checked_rem(b).ok_or_else(overflow)?
        }
        other => {
            return Err(RuntimeError::Arithmetic(format!(
                "operator {other} is not arithmetic"
            )))
        }
    };
    Ok(Value::Decimal(result))
}

/// Arithmetic with promotion decided from the runtime operands. The
/// compiled fallback for nodes analysis could not type.
pub(crate) fn promoted_arithmetic(
    op: BinaryOperator,
    left: &Value,
    right: &Value,
) -> RuntimeResult<Value> {
    if op == BinaryOperator::Add
        && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
    {
        return Ok(Value::String(format!("{left}{right}")));
    }
    let left_kind = numeric_kind_of(left)
        .ok_or_else(|| RuntimeError::type_mismatch("numeric operand", left))?;
    let right_kind = numeric_kind_of(right)
        .ok_or_else(|| RuntimeError::type_mismatch("numeric operand", right))?;
    let target = promote(left_kind, right_kind);
    let left = widen(left, target)?;
    let right = widen(right, target)?;
    apply_arithmetic(op, &left, &right)
}

/// Orders two values after promotion. Strings order lexicographically;
/// a NaN operand refuses to order at all.
pub(crate) fn promoted_compare(left: &Value, right: &Value) -> RuntimeResult<Ordering> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    let incomparable = || RuntimeError::Incomparable {
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    };
    let (left_kind, right_kind) = match (numeric_kind_of(left), numeric_kind_of(right)) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(incomparable()),
    };
    let target = promote(left_kind, right_kind);
    match (widen(left, target)?, widen(right, target)?) {
        (Value::Int8(a), Value::Int8(b)) => Ok(a.cmp(&b)),
        (Value::UInt8(a), Value::UInt8(b)) => Ok(a.cmp(&b)),
        (Value::Int16(a), Value::Int16(b)) => Ok(a.cmp(&b)),
        (Value::UInt16(a), Value::UInt16(b)) => Ok(a.cmp(&b)),
        (Value::Int32(a), Value::Int32(b)) => Ok(a.cmp(&b)),
        (Value::UInt32(a), Value::UInt32(b)) => Ok(a.cmp(&b)),
        (Value::Int64(a), Value::Int64(b)) => Ok(a.cmp(&b)),
        (Value::UInt64(a), Value::UInt64(b)) => Ok(a.cmp(&b)),
        (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(&b).ok_or_else(incomparable),
        (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(&b).ok_or_else(incomparable),
        (Value::Decimal(a), Value::Decimal(b)) => Ok(a.cmp(&b)),
        _ => Err(incomparable()),
    }
}

/// Runs `check` on the ordering of two values.
pub(crate) fn compare_values<F>(check: F, left: &Value, right: &Value) -> RuntimeResult<Value>
where
    F: Fn(Ordering) -> bool,
{
    Ok(Value::Boolean(check(promoted_compare(left, right)?)))
}

/// Equality across kinds: numerics compare after promotion, everything
/// else structurally. A value outside its promoted kind's range equals
/// nothing.
pub(crate) fn equal_values(left: &Value, right: &Value) -> bool {
    if let (Some(left_kind), Some(right_kind)) = (numeric_kind_of(left), numeric_kind_of(right)) {
        let target = promote(left_kind, right_kind);
        return match (widen(left, target), widen(right, target)) {
            (Ok(l), Ok(r)) => l == r,
            _ => false,
        };
    }
    left == right
}

pub(crate) fn negate_value(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Int8(n) => Ok(Value::Int32(-(*n as i32))),
        Value::UInt8(n) => Ok(Value::Int32(-(*n as i32))),
        Value::Int16(n) => Ok(Value::Int32(-(*n as i32))),
        Value::UInt16(n) => Ok(Value::Int32(-(*n as i32))),
        Value::Int32(n) => Ok(Value::Int32(n.wrapping_neg())),
        Value::Int64(n) => Ok(Value::Int64(n.wrapping_neg())),
        Value::Float32(x) => Ok(Value::Float32(-*x)),
        Value::Float64(x) => Ok(Value::Float64(-*x)),
        Value::Decimal(d) => Ok(Value::Decimal(-*d)),
        other => Err(RuntimeError::type_mismatch("signed numeric", other)),
    }
}

pub(crate) fn not_value(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Boolean(b) => Ok(Value::Boolean(!b)),
        other => Err(RuntimeError::type_mismatch("Boolean", other)),
    }
}

pub(crate) fn boolean_of(value: &Value) -> RuntimeResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        other => Err(RuntimeError::type_mismatch("Boolean", other)),
    }
}
