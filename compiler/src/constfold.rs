//! Constant folding over literal integer/decimal subtrees.
//!
//! Uses `num-bigint`'s arbitrary-precision `BigInt` to fold without risking
//! host-width overflow while folding values up to the language's 256-bit
//! integer ceiling; the final range check against the target type's width
//! happens after folding, not during it, so e.g. folding `(2**300) - (2**300
//! - 5)` never panics partway through even though neither intermediate value
//! fits in 256 bits.
//!
//! Folding rules: in a checked context, an operation whose mathematically
//! exact result falls outside the destination type's range is a compile
//! error. In an `unchecked { ... }` region the value silently wraps modulo
//! `2^width` (two's-complement for signed types) instead. Division and
//! modulo by a literal zero are always errors, in both contexts, since
//! wrapping gives no sensible result for division.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};

use crate::ast::{BinOp, Expr, UnOp};
use crate::diagnostics::{Diagnostic, Span};
use crate::types::{TypeArena, TypeData, TypeId};

/// The result of folding a literal subtree: its exact mathematical value and
/// the type it was folded against (for range re-checking at each step).
#[derive(Debug, Clone)]
pub struct FoldedConst {
    pub value: BigInt,
    pub ty: TypeId,
}

/// Attempt to fold `expr` to a constant. Returns `Ok(None)` for any subtree
/// that is not a compile-time constant (a non-literal identifier, a call, an
/// external call, a field/index access) rather than an error — non-constant
/// subtrees are simply not folded, per spec.md §4.2's "folds only literal
/// and literal-derived subtrees."
pub fn try_fold(
    expr: &Expr,
    arena: &TypeArena,
    target: TypeId,
    unchecked: bool,
) -> Result<Option<FoldedConst>, Diagnostic> {
    match expr {
        Expr::IntLiteral { digits, span } => {
            let value: BigInt = digits.parse().map_err(|_| {
                Diagnostic::error("E0300", *span, format!("malformed integer literal `{digits}`"))
            })?;
            let folded = FoldedConst { value, ty: target };
            range_check(&folded, arena, unchecked, *span)?;
            Ok(Some(folded))
        }
        Expr::BoolLiteral { value, .. } => {
            Ok(Some(FoldedConst { value: BigInt::from(*value as u8), ty: target }))
        }
        Expr::Unary { op, operand, span } => {
            let Some(inner) = try_fold(operand, arena, target, unchecked)? else {
                return Ok(None);
            };
            let value = match op {
                UnOp::Neg => -inner.value,
                UnOp::Not => {
                    if inner.value.is_zero() {
                        BigInt::from(1)
                    } else {
                        BigInt::from(0)
                    }
                }
                UnOp::BitNot => bitnot(&inner.value, width_of(arena, target)),
            };
            let folded = FoldedConst { value, ty: target };
            range_check(&folded, arena, unchecked, *span)?;
            Ok(Some(folded))
        }
        Expr::Binary { op, lhs, rhs, span } => {
            let (Some(l), Some(r)) = (
                try_fold(lhs, arena, target, unchecked)?,
                try_fold(rhs, arena, target, unchecked)?,
            ) else {
                return Ok(None);
            };
            let value = match op {
                BinOp::Add => l.value + r.value,
                BinOp::Sub => l.value - r.value,
                BinOp::Mul => l.value * r.value,
                BinOp::Div => {
                    if r.value.is_zero() {
                        return Err(Diagnostic::error(
                            "E0301",
                            *span,
                            "division by a constant zero",
                        ));
                    }
                    // Fixed-point truncation toward zero: integer division in
                    // `BigInt` already truncates toward zero, matching the
                    // language's rounding rule for both integer and decimal
                    // constant division.
                    l.value / r.value
                }
                BinOp::Mod => {
                    if r.value.is_zero() {
                        return Err(Diagnostic::error(
                            "E0302",
                            *span,
                            "modulo by a constant zero",
                        ));
                    }
                    l.value % r.value
                }
                BinOp::BitAnd => l.value & r.value,
                BinOp::BitOr => l.value | r.value,
                BinOp::BitXor => l.value ^ r.value,
                BinOp::Shl => l.value << shift_amount(&r.value, *span)?,
                BinOp::Shr => l.value >> shift_amount(&r.value, *span)?,
                BinOp::Eq => bool_const((l.value == r.value) as u8),
                BinOp::Ne => bool_const((l.value != r.value) as u8),
                BinOp::Lt => bool_const((l.value < r.value) as u8),
                BinOp::Le => bool_const((l.value <= r.value) as u8),
                BinOp::Gt => bool_const((l.value > r.value) as u8),
                BinOp::Ge => bool_const((l.value >= r.value) as u8),
                BinOp::And => bool_const((!l.value.is_zero() && !r.value.is_zero()) as u8),
                BinOp::Or => bool_const((!l.value.is_zero() || !r.value.is_zero()) as u8),
            };
            let folded = FoldedConst { value, ty: target };
            range_check(&folded, arena, unchecked, *span)?;
            Ok(Some(folded))
        }
        _ => Ok(None),
    }
}

fn bool_const(v: u8) -> BigInt {
    BigInt::from(v)
}

fn shift_amount(v: &BigInt, span: Span) -> Result<u32, Diagnostic> {
    v.try_into()
        .map_err(|_| Diagnostic::error("E0303", span, "shift amount out of range"))
}

fn bitnot(v: &BigInt, width: u32) -> BigInt {
    let modulus = BigInt::from(1) << width;
    (&modulus - BigInt::from(1)) - v
}

fn width_of(arena: &TypeArena, ty: TypeId) -> u32 {
    match arena.get(ty) {
        TypeData::Int { width, .. } => *width as u32,
        _ => 256,
    }
}

/// Default width for an unconstrained integer literal, per spec.md §4.1:
/// "the smallest unsigned type that fits, or to 256-bit unsigned for
/// literals ≥ 2^128." Widths are multiples of 8 in `8..=256`
/// (`resolver::validate_width`'s range), so this walks that ladder rather
/// than computing a bit length directly.
pub fn default_unsigned_width(value: &BigInt) -> u16 {
    if *value >= (BigInt::from(1) << 128) {
        return 256;
    }
    let mut width: u32 = 8;
    while width < 256 {
        let hi = (BigInt::from(1) << width) - 1;
        if *value <= hi {
            return width as u16;
        }
        width += 8;
    }
    256
}

/// Check `folded.value` against `folded.ty`'s declared range. In a checked
/// context an out-of-range result is a compile error (spec.md §4.2); in an
/// unchecked region it is silently reduced modulo `2^width`, two's-complement
/// for signed destinations, and never errors except for the division/modulo
/// by zero cases already handled by the caller.
fn range_check(
    folded: &FoldedConst,
    arena: &TypeArena,
    unchecked: bool,
    span: Span,
) -> Result<(), Diagnostic> {
    let TypeData::Int { signed, width } = arena.get(folded.ty) else {
        return Ok(());
    };
    let width = *width as u32;
    let (lo, hi) = if *signed {
        let half = BigInt::from(1) << (width - 1);
        (-half.clone(), half - 1)
    } else {
        (BigInt::from(0), (BigInt::from(1) << width) - 1)
    };
    if folded.value >= lo && folded.value <= hi {
        return Ok(());
    }
    if unchecked {
        return Ok(());
    }
    Err(Diagnostic::error(
        "E0304",
        span,
        format!(
            "constant expression overflows {}{}",
            if *signed { "int" } else { "uint" },
            width
        ),
    ))
}

/// Wrap a folded value into its type's range modulo `2^width`
/// (two's-complement for signed types), used to materialize the literal the
/// assembler emits once an unchecked fold has been accepted.
pub fn wrap_to_range(folded: &FoldedConst, arena: &TypeArena) -> BigInt {
    let TypeData::Int { signed, width } = arena.get(folded.ty) else {
        return folded.value.clone();
    };
    let width = *width as u32;
    let modulus = BigInt::from(1) << width;
    let mut reduced = &folded.value % &modulus;
    if reduced.is_negative() {
        reduced += &modulus;
    }
    if *signed {
        let half = BigInt::from(1) << (width - 1);
        if reduced >= half {
            reduced -= modulus;
        }
    }
    reduced
}

/// Decode an `ir::IrKind::ConstInt`'s minimal signed big-endian encoding
/// (`BigInt::to_signed_bytes_be`) back to a `BigInt`. Shared by the optimizer's
/// constant-propagation pass and the assembler's `Push` operand encoding so
/// both agree on exactly one representation for an IR-level integer constant.
pub fn const_int_to_bigint(bytes: &[u8]) -> BigInt {
    BigInt::from_signed_bytes_be(bytes)
}

/// The inverse of `const_int_to_bigint`.
pub fn bigint_to_const_int(value: &BigInt) -> Vec<u8> {
    value.to_signed_bytes_be()
}

/// Render `value` as the 32-byte big-endian word the VM pushes onto the
/// operand stack: reduced modulo 2^256 and represented as an *unsigned* word
/// (two's-complement for a negative source value), since the stack machine
/// itself has no signed representation — signedness only matters for the
/// comparison/shift opcodes chosen ahead of it.
pub fn to_word_bytes(value: &BigInt) -> [u8; 32] {
    let modulus = BigInt::from(1) << 256u32;
    let mut reduced = value % &modulus;
    if reduced.is_negative() {
        reduced += &modulus;
    }
    let (sign, be) = reduced.to_bytes_be();
    debug_assert!(sign != Sign::Minus);
    let mut word = [0u8; 32];
    let start = 32 - be.len();
    word[start..].copy_from_slice(&be);
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s() -> Span {
        Span::new(0, 0, 1)
    }

    #[test]
    fn checked_addition_overflow_is_an_error() {
        let mut arena = TypeArena::new();
        let u8_ty = arena.uint(8);
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::IntLiteral { digits: "200".into(), span: s() }),
            rhs: Box::new(Expr::IntLiteral { digits: "100".into(), span: s() }),
            span: s(),
        };
        let result = try_fold(&expr, &arena, u8_ty, false);
        assert!(result.is_err());
    }

    #[test]
    fn unchecked_addition_overflow_wraps() {
        let mut arena = TypeArena::new();
        let u8_ty = arena.uint(8);
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::IntLiteral { digits: "200".into(), span: s() }),
            rhs: Box::new(Expr::IntLiteral { digits: "100".into(), span: s() }),
            span: s(),
        };
        let folded = try_fold(&expr, &arena, u8_ty, true).unwrap().unwrap();
        assert_eq!(wrap_to_range(&folded, &arena), BigInt::from(300 - 256));
    }

    #[test]
    fn division_by_constant_zero_always_errors() {
        let mut arena = TypeArena::new();
        let u256 = arena.uint(256);
        let expr = Expr::Binary {
            op: BinOp::Div,
            lhs: Box::new(Expr::IntLiteral { digits: "10".into(), span: s() }),
            rhs: Box::new(Expr::IntLiteral { digits: "0".into(), span: s() }),
            span: s(),
        };
        assert!(try_fold(&expr, &arena, u256, true).is_err());
        assert!(try_fold(&expr, &arena, u256, false).is_err());
    }

    #[test]
    fn division_truncates_toward_zero() {
        let mut arena = TypeArena::new();
        let i256 = arena.int(256);
        let expr = Expr::Binary {
            op: BinOp::Div,
            lhs: Box::new(Expr::Unary {
                op: UnOp::Neg,
                operand: Box::new(Expr::IntLiteral { digits: "7".into(), span: s() }),
                span: s(),
            }),
            rhs: Box::new(Expr::IntLiteral { digits: "2".into(), span: s() }),
            span: s(),
        };
        let folded = try_fold(&expr, &arena, i256, false).unwrap().unwrap();
        assert_eq!(folded.value, BigInt::from(-3));
    }

    #[test]
    fn non_constant_subtree_is_not_folded() {
        let mut arena = TypeArena::new();
        let u256 = arena.uint(256);
        let expr = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Ident { name: "x".into(), span: s() }),
            rhs: Box::new(Expr::IntLiteral { digits: "1".into(), span: s() }),
            span: s(),
        };
        assert!(try_fold(&expr, &arena, u256, false).unwrap().is_none());
    }

    #[test]
    fn word_bytes_represent_negative_values_as_twos_complement() {
        let minus_one = to_word_bytes(&BigInt::from(-1));
        assert_eq!(minus_one, [0xffu8; 32]);
    }

    #[test]
    fn const_int_round_trips_through_ir_encoding() {
        let value = BigInt::from(-12345);
        let bytes = bigint_to_const_int(&value);
        assert_eq!(const_int_to_bigint(&bytes), value);
    }
}
