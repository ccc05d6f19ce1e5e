//! Unary operators.

use lantern_core::{CompilationError, Span, TypeDesc, UnaryOp};

use super::{OperatorResolution, UnaryRule};

/// Resolve `!` (on `bool`) or `-` (on signed integers and floats).
pub fn resolve_unary(
    op: UnaryOp,
    operand: &TypeDesc,
    span: Span,
) -> Result<OperatorResolution<UnaryRule>, CompilationError> {
    let rule = match (op, operand.as_primitive()) {
        (UnaryOp::Not, Some(kind)) if !kind.is_numeric() => Some(UnaryRule::Not),
        (UnaryOp::Negate, Some(kind)) if kind.is_signed_integer() || kind.is_float() => {
            Some(UnaryRule::Negate { kind })
        }
        _ => None,
    };
    match rule {
        Some(rule) => Ok(OperatorResolution::new(operand.clone(), rule)),
        None => Err(CompilationError::TypeMismatch {
            message: format!("operator '{}' cannot be applied to operand of type '{operand}'", op.symbol()),
            span,
        }),
    }
}
