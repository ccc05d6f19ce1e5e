//! Arithmetic, bitwise, shift and logical operators.

use lantern_core::{BinaryOp, CompilationError, LogicalOp, PrimitiveKind, Span, TypeDesc};

use super::{BinaryRule, LogicalRule, OperatorResolution, mismatch, promote};
use crate::entities::Registry;
use crate::overload::try_overload;

/// Resolve an arithmetic, bitwise or shift operator.
pub fn resolve_binary(
    op: BinaryOp,
    left: &TypeDesc,
    right: &TypeDesc,
    registry: &Registry,
    span: Span,
) -> Result<OperatorResolution<BinaryRule>, CompilationError> {
    if op == BinaryOp::Add && *left == TypeDesc::String && *right == TypeDesc::String {
        return Ok(OperatorResolution::new(TypeDesc::String, BinaryRule::Concat));
    }
    if op == BinaryOp::Pow && left.is_numeric() && right.is_numeric() {
        return Ok(OperatorResolution::new(TypeDesc::DOUBLE, BinaryRule::Pow));
    }
    if op.is_shift()
        && let (Some(l), true) = (left.as_primitive(), right.is_integer())
        && l.is_integer()
    {
        return Ok(OperatorResolution::new(left.clone(), BinaryRule::Shift { left: l }));
    }
    if !op.is_shift() && op != BinaryOp::Pow
        && let Some(kind) = promote(op.symbol(), left, right, span)
    {
        let kind = kind?;
        if !op.is_bitwise() || kind.is_integer() {
            return Ok(OperatorResolution::new(
                TypeDesc::Primitive(kind),
                BinaryRule::Numeric { kind },
            ));
        }
    }

    if let (Some(name), Some(owner)) = (op.overload_name(), registry.entity_of(left))
        && let Some(found) = try_overload(registry, owner, name, &[left.clone(), right.clone()])
    {
        let result = registry.method(found.method).require_return_type(span)?.clone();
        return Ok(OperatorResolution::new(result, BinaryRule::Overload(found.method)));
    }

    Err(mismatch(op.symbol(), left, right, span))
}

/// Resolve `&&`, `||` or `^^`; both operands must be `bool`.
pub fn resolve_logical(
    op: LogicalOp,
    left: &TypeDesc,
    right: &TypeDesc,
    span: Span,
) -> Result<OperatorResolution<LogicalRule>, CompilationError> {
    let bool_ty = TypeDesc::Primitive(PrimitiveKind::Bool);
    if *left == bool_ty && *right == bool_ty {
        return Ok(OperatorResolution::new(bool_ty, LogicalRule::Bool));
    }
    Err(mismatch(op.symbol(), left, right, span))
}
