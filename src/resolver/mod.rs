//! Static typing rules: implicit/explicit conversions, numeric
//! promotion, and overload selection.
//!
//! The parser calls in here while it builds the tree; execution never
//! does. All decisions depend only on static types, so a parsed
//! command stays valid however often it runs.

use ecow::EcoString;
use thiserror::Error;

use crate::ast::{BinOp, UnaryOp};
use crate::host::value::Ty;
use crate::host::{is_subtype_of, HostModel};

pub mod overload;
pub mod promote;

#[cfg(test)]
mod resolver_test;

/// A semantic error found while parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("unknown identifier `{name}`")]
    UnknownIdentifier { name: EcoString },
    #[error("type `{type_name}` has no accessible member `{name}`")]
    UnknownMember { type_name: String, name: EcoString },
    #[error("no overload of `{name}` matches the argument types")]
    NoOverload { name: EcoString },
    #[error("the call to `{name}` is ambiguous between multiple overloads")]
    AmbiguousOverload { name: EcoString },
    #[error("cannot convert `{from}` to `{to}`")]
    InvalidConversion { from: Ty, to: Ty },
    #[error("operator `{op}` cannot be applied to `{lhs}` and `{rhs}`")]
    InvalidOperands { op: &'static str, lhs: Ty, rhs: Ty },
    #[error("operator `{op}` mixes signed and unsigned 64-bit operands")]
    MixedSign { op: &'static str },
    #[error("operator `{op}` cannot be applied to `{ty}`")]
    InvalidUnary { op: &'static str, ty: Ty },
    #[error("a void expression cannot be used as a value")]
    VoidValue,
    #[error("the target of an assignment must be a variable, field, property, or indexer")]
    NotAssignable,
    #[error("member is read-only")]
    ReadOnlyMember,
    #[error("a variable named `{name}` is already declared in this scope")]
    Redeclared { name: EcoString },
    #[error("`{type_name}` is not enumerable")]
    NotEnumerable { type_name: String },
    #[error("type `{ty}` cannot be indexed")]
    NotIndexable { ty: Ty },
    #[error("array initializer supplies {got} elements but the length is {expected}")]
    ArrayInitCount { expected: usize, got: usize },
    #[error("expression of type `{ty}` is not callable")]
    NotInvokable { ty: Ty },
    #[error("unknown type `{name}`")]
    UnknownType { name: EcoString },
    #[error("type `{name}` expects {expected} type argument(s), found {got}")]
    GenericArity { name: EcoString, expected: usize, got: usize },
    #[error("`{what}` cannot be used as a value here")]
    NotAValue { what: String },
    #[error("`break` is only valid inside a loop")]
    BreakOutsideLoop,
    #[error("`continue` is only valid inside a loop")]
    ContinueOutsideLoop,
}

/// Whether `from` converts to `to` without an explicit cast.
pub fn implicit_convertible(host: &dyn HostModel, from: &Ty, to: &Ty) -> bool {
    if from == to {
        return !matches!(from, Ty::Void);
    }
    match (from, to) {
        (Ty::Void, _) | (_, Ty::Void) => false,
        (Ty::Null, t) => t.is_reference(),
        (_, Ty::Any) => true,
        (Ty::Object(a), Ty::Object(b)) => is_subtype_of(host, *a, *b),
        _ => numeric_widens(from, to),
    }
}

/// Implicit numeric widenings, including `char` as a source.
pub fn numeric_widens(from: &Ty, to: &Ty) -> bool {
    use Ty::*;
    matches!(
        (from, to),
        (I8, I16 | I32 | I64 | F32 | F64)
            | (U8, I16 | U16 | I32 | U32 | I64 | U64 | F32 | F64)
            | (I16, I32 | I64 | F32 | F64)
            | (U16, I32 | U32 | I64 | U64 | F32 | F64)
            | (I32, I64 | F32 | F64)
            | (U32, I64 | U64 | F32 | F64)
            | (I64, F32 | F64)
            | (U64, F32 | F64)
            | (Char, U16 | I32 | U32 | I64 | U64 | F32 | F64)
            | (F32, F64)
    )
}

/// What kind of node an explicit cast `(T)x` turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Same type; the cast disappears.
    Identity,
    /// Checked numeric representation change.
    Numeric,
    /// Static retyping towards a base type; always succeeds.
    Up,
    /// Runtime-checked narrowing.
    Down,
}

/// Classify an explicit cast, or `None` when no conversion exists at all.
pub fn classify_cast(host: &dyn HostModel, from: &Ty, to: &Ty) -> Option<CastKind> {
    if from == to {
        return (!matches!(from, Ty::Void)).then_some(CastKind::Identity);
    }
    let from_num = from.is_numeric() || matches!(from, Ty::Char);
    let to_num = to.is_numeric() || matches!(to, Ty::Char);
    match (from, to) {
        _ if from_num && to_num => Some(CastKind::Numeric),
        (Ty::Null, t) if t.is_reference() => Some(CastKind::Up),
        (_, Ty::Any) if !matches!(from, Ty::Void) => Some(CastKind::Up),
        (Ty::Any, t) if !matches!(t, Ty::Void) => Some(CastKind::Down),
        (Ty::Object(a), Ty::Object(b)) => {
            if is_subtype_of(host, *a, *b) {
                Some(CastKind::Up)
            } else if is_subtype_of(host, *b, *a) {
                Some(CastKind::Down)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Static method name a user-defined binary operator resolves through.
pub fn binary_op_method(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "op_Addition",
        BinOp::Sub => "op_Subtraction",
        BinOp::Mul => "op_Multiply",
        BinOp::Div => "op_Division",
        BinOp::Rem => "op_Modulus",
        BinOp::BitAnd => "op_BitwiseAnd",
        BinOp::BitOr => "op_BitwiseOr",
        BinOp::BitXor => "op_ExclusiveOr",
        BinOp::Shl => "op_LeftShift",
        BinOp::Shr => "op_RightShift",
        BinOp::Eq => "op_Equality",
        BinOp::Ne => "op_Inequality",
        BinOp::Lt => "op_LessThan",
        BinOp::Le => "op_LessThanOrEqual",
        BinOp::Gt => "op_GreaterThan",
        BinOp::Ge => "op_GreaterThanOrEqual",
    }
}

pub fn unary_op_method(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Plus => "op_UnaryPlus",
        UnaryOp::Neg => "op_UnaryNegation",
        UnaryOp::Not => "op_LogicalNot",
        UnaryOp::BitNot => "op_OnesComplement",
    }
}
