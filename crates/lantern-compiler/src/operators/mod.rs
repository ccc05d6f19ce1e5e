//! Operator resolution.
//!
//! Given the operand types of an operator node, decide which rule applies
//! and what the result type is. Type resolution, constant folding and
//! emission all dispatch on the same [`OperatorResolution`], so they can
//! never disagree about how an operator behaves.
//!
//! Resolution order for binary operators (first match wins):
//! 1. Operator-specific structural rules (concatenation, `**`, shifts, the
//!    comparison rules in [`compare`])
//! 2. Numeric promotion of two numeric operands
//! 3. A static `op_*` method of the left operand's type
//! 4. `OperatorTypeMismatch`

mod binary;
mod compare;
mod unary;

pub use binary::{resolve_binary, resolve_logical};
pub use compare::resolve_compare;
pub use unary::resolve_unary;

use lantern_core::{CompilationError, PrimitiveKind, Span, TypeDesc};

use crate::entities::MethodId;

/// The rule chosen for an operator and its result type.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorResolution<R> {
    pub result: TypeDesc,
    pub rule: R,
}

impl<R> OperatorResolution<R> {
    fn new(result: TypeDesc, rule: R) -> Self {
        Self { result, rule }
    }
}

/// How an arithmetic, bitwise or shift operator is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryRule {
    /// Both operands converted to `kind`, then the instruction.
    Numeric { kind: PrimitiveKind },
    /// Left operand keeps its kind; the amount is any integer.
    Shift { left: PrimitiveKind },
    /// Both operands converted to `double`.
    Pow,
    /// String concatenation.
    Concat,
    /// Call of a static `op_*` method.
    Overload(MethodId),
}

/// How a comparison is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareRule {
    /// `==`/`<>` on strings through the string equality helper.
    TextEquality,
    /// `<`, `<=`, `>`, `>=` on strings through the three-way compare helper.
    TextOrdering,
    Numeric { kind: PrimitiveKind },
    BoolEquality,
    /// `T? == T?`
    NullableBoth { base: PrimitiveKind },
    /// `T? == T` or `T == T?`
    NullableValue { base: PrimitiveKind, nullable_left: bool },
    /// `T? == null` or `null == T?`
    NullableNull { nullable_left: bool },
    /// Reference compared with `null`.
    ReferenceNull,
    /// Structural equality of two instances of the same user type.
    RecordEquals(MethodId),
    Overload(MethodId),
}

/// How a boolean connective is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalRule {
    Bool,
}

/// How a unary operator is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryRule {
    Not,
    Negate { kind: PrimitiveKind },
}

fn mismatch(op: &str, left: &TypeDesc, right: &TypeDesc, span: Span) -> CompilationError {
    CompilationError::OperatorTypeMismatch {
        op: op.to_string(),
        left: left.to_string(),
        right: right.to_string(),
        span,
    }
}

/// Promote two numeric kinds, mapping a signedness conflict to its error.
fn promote(
    op: &str,
    left: &TypeDesc,
    right: &TypeDesc,
    span: Span,
) -> Option<Result<PrimitiveKind, CompilationError>> {
    let (l, r) = (left.as_primitive()?, right.as_primitive()?);
    if !l.is_numeric() || !r.is_numeric() {
        return None;
    }
    Some(l.promote(r).map_err(|_| CompilationError::SignednessMismatch {
        op: op.to_string(),
        left: left.to_string(),
        right: right.to_string(),
        span,
    }))
}
