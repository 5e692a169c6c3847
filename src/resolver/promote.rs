//! Numeric promotion for built-in operators.
//!
//! Both operands of an arithmetic, bitwise, or comparison operator are
//! brought to a single promoted type before the operation runs. The
//! table is closed and deterministic: the same pair of operand types
//! always promotes the same way.

use crate::ast::UnaryOp;
use crate::host::value::Ty;

use super::ResolveError;

/// Promote the operand pair of a binary numeric operator.
///
/// `char` operands join the integer ladder as `int`. Mixing `long`
/// with `ulong` has no common type and is rejected rather than
/// silently reinterpreted.
pub fn promote_binary(op: &'static str, lhs: &Ty, rhs: &Ty) -> Result<Ty, ResolveError> {
    let a = integerize(lhs);
    let b = integerize(rhs);
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ResolveError::InvalidOperands {
                op,
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            })
        }
    };

    use Ty::*;
    if a == F64 || b == F64 {
        return Ok(F64);
    }
    if a == F32 || b == F32 {
        return Ok(F32);
    }
    if a == U64 || b == U64 {
        let other = if a == U64 { &b } else { &a };
        return if *other == U64 {
            Ok(U64)
        } else if other.is_signed() {
            Err(ResolveError::MixedSign { op })
        } else {
            Ok(U64)
        };
    }
    if a == I64 || b == I64 {
        return Ok(I64);
    }
    if a == U32 || b == U32 {
        let other = if a == U32 { &b } else { &a };
        // uint with a signed operand widens both sides to long.
        return if other.is_signed() { Ok(I64) } else { Ok(U32) };
    }
    Ok(I32)
}

/// Promote the operand of `+ - ~`.
pub fn promote_unary(op: UnaryOp, ty: &Ty) -> Result<Ty, ResolveError> {
    let sym = op.symbol();
    let t = integerize(ty).ok_or_else(|| ResolveError::InvalidUnary { op: sym, ty: ty.clone() })?;
    use Ty::*;
    match op {
        UnaryOp::Plus => Ok(widen_small(t)),
        UnaryOp::Neg => match t {
            F32 | F64 => Ok(t),
            U64 => Err(ResolveError::InvalidUnary { op: sym, ty: ty.clone() }),
            // Negating uint has no uint result; it widens to long.
            U32 => Ok(I64),
            _ => Ok(widen_small(t)),
        },
        UnaryOp::BitNot => match t {
            F32 | F64 => Err(ResolveError::InvalidUnary { op: sym, ty: ty.clone() }),
            _ => Ok(widen_small(t)),
        },
        UnaryOp::Not => Err(ResolveError::InvalidUnary { op: sym, ty: ty.clone() }),
    }
}

/// Shift operands promote the left side alone; the count must be an `int`.
pub fn promote_shift(op: &'static str, lhs: &Ty) -> Result<Ty, ResolveError> {
    match integerize(lhs) {
        Some(t) if t.is_integral() => Ok(widen_small(t)),
        _ => Err(ResolveError::InvalidUnary { op, ty: lhs.clone() }),
    }
}

/// Map `char` into the integer ladder; yield `None` for non-numerics.
fn integerize(ty: &Ty) -> Option<Ty> {
    match ty {
        Ty::Char => Some(Ty::I32),
        t if t.is_numeric() => Some(t.clone()),
        _ => None,
    }
}

/// Operands below `int` compute at `int` width.
fn widen_small(ty: Ty) -> Ty {
    use Ty::*;
    match ty {
        I8 | U8 | I16 | U16 => I32,
        other => other,
    }
}
