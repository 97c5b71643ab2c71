//! Numeric promotion lattice.
//!
//! A fixed total rank decides the operand type of mixed-width arithmetic and
//! comparisons: Decimal > Float64 > Float32 > UInt64 > Int64 > UInt32, with
//! Int32 and everything narrower forming one group that always promotes to
//! Int32. Operands outside the lattice are left unconverted; that fallback
//! is defined behavior, not an error. String operands to `+` never reach
//! this table, they concatenate instead.

use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum NumericKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Decimal,
}

impl NumericKind {
    /// Descriptor name of the kind, identical to its variant name.
    pub fn type_name(&self) -> &'static str {
        match self {
            NumericKind::Int8 => "Int8",
            NumericKind::UInt8 => "UInt8",
            NumericKind::Int16 => "Int16",
            NumericKind::UInt16 => "UInt16",
            NumericKind::Int32 => "Int32",
            NumericKind::UInt32 => "UInt32",
            NumericKind::Int64 => "Int64",
            NumericKind::UInt64 => "UInt64",
            NumericKind::Float32 => "Float32",
            NumericKind::Float64 => "Float64",
            NumericKind::Decimal => "Decimal",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            NumericKind::Decimal => 6,
            NumericKind::Float64 => 5,
            NumericKind::Float32 => 4,
            NumericKind::UInt64 => 3,
            NumericKind::Int64 => 2,
            NumericKind::UInt32 => 1,
            // Int32 and narrower share the bottom rank.
            _ => 0,
        }
    }
}

/// Operand type for a binary arithmetic or comparison over two numeric kinds.
pub fn promote(left: NumericKind, right: NumericKind) -> NumericKind {
    let winner = if left.rank() >= right.rank() { left } else { right };
    if winner.rank() == 0 {
        NumericKind::Int32
    } else {
        winner
    }
}

/// Operand type for unary negation: the narrow group widens to Int32, every
/// other kind is kept.
pub fn promote_unary(kind: NumericKind) -> NumericKind {
    if kind.rank() == 0 {
        NumericKind::Int32
    } else {
        kind
    }
}
