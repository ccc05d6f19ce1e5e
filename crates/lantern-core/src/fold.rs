//! Total operator combinators over [`Value`].
//!
//! Constant folding and the VM both evaluate operators through these
//! functions, so a folded constant is always the value the same expression
//! produces at runtime. Every combinator is total: unsupported operand
//! combinations return [`FoldError::Unsupported`].

use std::cmp::Ordering;
use std::rc::Rc;

use thiserror::Error;

use crate::{BinaryOp, CompareOp, LogicalOp, PrimitiveKind, UnaryOp, Value};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FoldError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("operator '{op}' is not defined for {left} and {right}")]
    Unsupported {
        op: &'static str,
        left: String,
        right: String,
    },
}

fn unsupported(op: &'static str, left: &Value, right: &Value) -> FoldError {
    FoldError::Unsupported {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

/// Convert both operands to their promoted numeric kind.
fn promote_pair(op: &'static str, left: &Value, right: &Value) -> Result<(Value, Value), FoldError> {
    let kind = match (left.kind(), right.kind()) {
        (Some(l), Some(r)) => l.promote(r).map_err(|_| unsupported(op, left, right))?,
        _ => return Err(unsupported(op, left, right)),
    };
    match (left.convert(kind), right.convert(kind)) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(unsupported(op, left, right)),
    }
}

macro_rules! integer_op {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {{
        let (a, b) = ($a, $b);
        Ok(Value::$variant(match $op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div if b == 0 => return Err(FoldError::DivisionByZero),
            BinaryOp::Div => a.wrapping_div(b),
            BinaryOp::Rem if b == 0 => return Err(FoldError::DivisionByZero),
            BinaryOp::Rem => a.wrapping_rem(b),
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            BinaryOp::BitXor => a ^ b,
            BinaryOp::Pow | BinaryOp::Shl | BinaryOp::Shr => return Err(FoldError::Unsupported {
                op: $op.symbol(),
                left: stringify!($variant).into(),
                right: stringify!($variant).into(),
            }),
        }))
    }};
}

macro_rules! float_op {
    ($op:expr, $a:expr, $b:expr, $variant:ident) => {{
        let (a, b) = ($a, $b);
        Ok(Value::$variant(match $op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Rem => a % b,
            _ => return Err(FoldError::Unsupported {
                op: $op.symbol(),
                left: stringify!($variant).into(),
                right: stringify!($variant).into(),
            }),
        }))
    }};
}

/// Evaluate an arithmetic, bitwise or shift operator.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, FoldError> {
    match op {
        BinaryOp::Add => {
            if let (Value::Str(a), Value::Str(b)) = (left, right) {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                return Ok(Value::Str(Rc::from(joined)));
            }
        }
        BinaryOp::Pow => {
            return match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => Ok(Value::Double(a.powf(b))),
                _ => Err(unsupported(op.symbol(), left, right)),
            };
        }
        BinaryOp::Shl | BinaryOp::Shr => return shift(op, left, right),
        _ => {}
    }

    let (l, r) = promote_pair(op.symbol(), left, right)?;
    match (l, r) {
        (Value::Int8(a), Value::Int8(b)) => integer_op!(op, a, b, Int8),
        (Value::Int16(a), Value::Int16(b)) => integer_op!(op, a, b, Int16),
        (Value::Int32(a), Value::Int32(b)) => integer_op!(op, a, b, Int32),
        (Value::Int64(a), Value::Int64(b)) => integer_op!(op, a, b, Int64),
        (Value::Uint8(a), Value::Uint8(b)) => integer_op!(op, a, b, Uint8),
        (Value::Uint16(a), Value::Uint16(b)) => integer_op!(op, a, b, Uint16),
        (Value::Uint32(a), Value::Uint32(b)) => integer_op!(op, a, b, Uint32),
        (Value::Uint64(a), Value::Uint64(b)) => integer_op!(op, a, b, Uint64),
        (Value::Float(a), Value::Float(b)) => float_op!(op, a, b, Float),
        (Value::Double(a), Value::Double(b)) => float_op!(op, a, b, Double),
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

/// Shifts keep the left operand's kind; the amount wraps at its width.
fn shift(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, FoldError> {
    let amount = right
        .as_integer()
        .ok_or_else(|| unsupported(op.symbol(), left, right))? as u32;
    let shl = op == BinaryOp::Shl;
    macro_rules! shifted {
        ($v:expr, $variant:ident) => {
            Value::$variant(if shl { $v.wrapping_shl(amount) } else { $v.wrapping_shr(amount) })
        };
    }
    Ok(match left {
        Value::Int8(v) => shifted!(v, Int8),
        Value::Int16(v) => shifted!(v, Int16),
        Value::Int32(v) => shifted!(v, Int32),
        Value::Int64(v) => shifted!(v, Int64),
        Value::Uint8(v) => shifted!(v, Uint8),
        Value::Uint16(v) => shifted!(v, Uint16),
        Value::Uint32(v) => shifted!(v, Uint32),
        Value::Uint64(v) => shifted!(v, Uint64),
        _ => return Err(unsupported(op.symbol(), left, right)),
    })
}

/// Three-way ordinal comparison of two strings, as `-1`, `0` or `1`.
pub fn compare_text(left: &str, right: &str) -> i32 {
    match left.cmp(right) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Value equality as the `==` operator sees it.
///
/// Numbers compare after promotion, strings by content, heap values by
/// reference, `null` only equals `null`.
pub fn equals(left: &Value, right: &Value) -> Result<bool, FoldError> {
    match (left, right) {
        (Value::Null, other) | (other, Value::Null) => Ok(other.is_null()),
        (Value::Unit, Value::Unit) => Ok(true),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (a, b) if a.kind().is_some_and(PrimitiveKind::is_numeric) => {
            let (l, r) = promote_pair("==", a, b)?;
            Ok(ordering(&l, &r) == Some(Ordering::Equal))
        }
        (a, b) => Ok(a.same_reference(b)),
    }
}

/// Ordering of two values of the same promoted kind, `None` for NaN.
fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int8(a), Value::Int8(b)) => a.partial_cmp(b),
        (Value::Int16(a), Value::Int16(b)) => a.partial_cmp(b),
        (Value::Int32(a), Value::Int32(b)) => a.partial_cmp(b),
        (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
        (Value::Uint8(a), Value::Uint8(b)) => a.partial_cmp(b),
        (Value::Uint16(a), Value::Uint16(b)) => a.partial_cmp(b),
        (Value::Uint32(a), Value::Uint32(b)) => a.partial_cmp(b),
        (Value::Uint64(a), Value::Uint64(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => None,
    }
}

/// Strict `<` or `>`: true only when the operands order that way.
pub fn strictly(ord: Ordering, left: &Value, right: &Value) -> Result<bool, FoldError> {
    let symbol = if ord == Ordering::Less { "<" } else { ">" };
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(compare_text(a, b) == ord as i32);
    }
    let (l, r) = promote_pair(symbol, left, right)?;
    Ok(ordering(&l, &r) == Some(ord))
}

/// Evaluate a comparison operator.
///
/// `<=` is `!(l > r)` and `>=` is `!(l < r)`, exactly the instruction
/// sequence the compiler emits for them.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value, FoldError> {
    let result = match op {
        CompareOp::Equal => equals(left, right)?,
        CompareOp::NotEqual => !equals(left, right)?,
        CompareOp::Less => strictly(Ordering::Less, left, right)?,
        CompareOp::Greater => strictly(Ordering::Greater, left, right)?,
        CompareOp::LessEqual => !strictly(Ordering::Greater, left, right)?,
        CompareOp::GreaterEqual => !strictly(Ordering::Less, left, right)?,
    };
    Ok(Value::Bool(result))
}

/// Evaluate a boolean connective on two booleans.
pub fn logical(op: LogicalOp, left: &Value, right: &Value) -> Result<Value, FoldError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            LogicalOp::And => *a && *b,
            LogicalOp::Or => *a || *b,
            LogicalOp::Xor => a ^ b,
        })),
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

/// Evaluate a unary operator.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, FoldError> {
    let result = match (op, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
        (UnaryOp::Negate, Value::Int8(v)) => Value::Int8(v.wrapping_neg()),
        (UnaryOp::Negate, Value::Int16(v)) => Value::Int16(v.wrapping_neg()),
        (UnaryOp::Negate, Value::Int32(v)) => Value::Int32(v.wrapping_neg()),
        (UnaryOp::Negate, Value::Int64(v)) => Value::Int64(v.wrapping_neg()),
        (UnaryOp::Negate, Value::Float(v)) => Value::Float(-v),
        (UnaryOp::Negate, Value::Double(v)) => Value::Double(-v),
        _ => {
            return Err(FoldError::Unsupported {
                op: op.symbol(),
                left: operand.type_name(),
                right: "nothing".into(),
            });
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_promotes_before_evaluating() {
        assert_eq!(binary(BinaryOp::Add, &Value::Int32(1), &Value::Int64(2)), Ok(Value::Int64(3)));
        assert_eq!(binary(BinaryOp::Mul, &Value::Int32(3), &Value::Double(0.5)), Ok(Value::Double(1.5)));
        assert_eq!(binary(BinaryOp::Sub, &Value::Uint8(1), &Value::Uint8(2)), Ok(Value::Uint8(255)));
        assert!(binary(BinaryOp::Add, &Value::Uint32(1), &Value::Int32(1)).is_err());
    }

    #[test]
    fn integer_overflow_wraps() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int32(i32::MAX), &Value::Int32(1)),
            Ok(Value::Int32(i32::MIN))
        );
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        assert_eq!(binary(BinaryOp::Div, &Value::Int32(1), &Value::Int32(0)), Err(FoldError::DivisionByZero));
        assert_eq!(binary(BinaryOp::Rem, &Value::Int64(1), &Value::Int32(0)), Err(FoldError::DivisionByZero));
        let inf = binary(BinaryOp::Div, &Value::Double(1.0), &Value::Double(0.0)).unwrap();
        assert_eq!(inf, Value::Double(f64::INFINITY));
    }

    #[test]
    fn strings_concatenate() {
        assert_eq!(binary(BinaryOp::Add, &Value::str("ab"), &Value::str("cd")), Ok(Value::str("abcd")));
        assert!(binary(BinaryOp::Sub, &Value::str("ab"), &Value::str("cd")).is_err());
    }

    #[test]
    fn shifts_keep_left_kind() {
        assert_eq!(binary(BinaryOp::Shl, &Value::Int32(1), &Value::Int64(4)), Ok(Value::Int32(16)));
        assert_eq!(binary(BinaryOp::Shr, &Value::Int8(-8), &Value::Int32(1)), Ok(Value::Int8(-4)));
        assert!(binary(BinaryOp::Shl, &Value::Double(1.0), &Value::Int32(1)).is_err());
    }

    #[test]
    fn pow_yields_double() {
        assert_eq!(binary(BinaryOp::Pow, &Value::Int32(2), &Value::Int32(10)), Ok(Value::Double(1024.0)));
    }

    #[test]
    fn text_comparisons() {
        let (a, b) = (Value::str("a"), Value::str("b"));
        assert_eq!(compare(CompareOp::Less, &a, &b), Ok(Value::Bool(true)));
        assert_eq!(compare(CompareOp::Less, &b, &a), Ok(Value::Bool(false)));
        assert_eq!(compare(CompareOp::LessEqual, &a, &a), Ok(Value::Bool(true)));
        assert_eq!(compare(CompareOp::GreaterEqual, &a, &b), Ok(Value::Bool(false)));
        assert_eq!(compare(CompareOp::Equal, &a, &Value::str("a")), Ok(Value::Bool(true)));
        assert_eq!(compare_text("b", "a"), 1);
    }

    #[test]
    fn numeric_comparisons_promote() {
        assert_eq!(compare(CompareOp::Equal, &Value::Int32(1), &Value::Int64(1)), Ok(Value::Bool(true)));
        assert_eq!(compare(CompareOp::Greater, &Value::Double(1.5), &Value::Int32(1)), Ok(Value::Bool(true)));
        assert_eq!(compare(CompareOp::GreaterEqual, &Value::Int32(1), &Value::Int32(1)), Ok(Value::Bool(true)));
        assert!(compare(CompareOp::Less, &Value::Uint32(1), &Value::Int32(1)).is_err());
    }

    #[test]
    fn null_equality() {
        assert_eq!(equals(&Value::Null, &Value::Null), Ok(true));
        assert_eq!(equals(&Value::Int32(1), &Value::Null), Ok(false));
        assert_eq!(equals(&Value::Null, &Value::str("x")), Ok(false));
    }

    #[test]
    fn logical_and_unary() {
        assert_eq!(logical(LogicalOp::Xor, &Value::Bool(true), &Value::Bool(true)), Ok(Value::Bool(false)));
        assert_eq!(unary(UnaryOp::Negate, &Value::Int64(5)), Ok(Value::Int64(-5)));
        assert_eq!(unary(UnaryOp::Not, &Value::Bool(false)), Ok(Value::Bool(true)));
        assert!(unary(UnaryOp::Negate, &Value::Uint32(1)).is_err());
    }
}
