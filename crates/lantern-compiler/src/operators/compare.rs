//! Equality and relational operators.
//!
//! Strings, numbers, booleans, optional values and references each have
//! their own rule. Optional values support equality only:
//!
//! | left   | right  | rule                 |
//! |--------|--------|----------------------|
//! | `T?`   | `T?`   | `NullableBoth`       |
//! | `T?`   | `T`    | `NullableValue`      |
//! | `T?`   | `null` | `NullableNull`       |
//!
//! and the mirrored forms.

use lantern_core::{CompareOp, CompilationError, Span, TypeDesc};

use super::{CompareRule, OperatorResolution, mismatch, promote};
use crate::entities::Registry;
use crate::overload::try_overload;

/// Resolve a comparison operator. The result is `bool` except for overloads.
pub fn resolve_compare(
    op: CompareOp,
    left: &TypeDesc,
    right: &TypeDesc,
    registry: &Registry,
    span: Span,
) -> Result<OperatorResolution<CompareRule>, CompilationError> {
    if let Some(rule) = structural_rule(op, left, right, span)? {
        return Ok(OperatorResolution::new(TypeDesc::BOOL, rule));
    }

    if let Some(owner) = registry.entity_of(left) {
        if let Some(found) = try_overload(registry, owner, op.overload_name(), &[left.clone(), right.clone()]) {
            let result = registry.method(found.method).require_return_type(span)?.clone();
            return Ok(OperatorResolution::new(result, CompareRule::Overload(found.method)));
        }
        if op.is_equality()
            && registry.entity_of(right) == Some(owner)
            && let Some(equals) = registry.find_method(owner, "Equals", &[left.clone(), right.clone()])
        {
            return Ok(OperatorResolution::new(TypeDesc::BOOL, CompareRule::RecordEquals(equals)));
        }
    }

    Err(mismatch(op.symbol(), left, right, span))
}

fn structural_rule(
    op: CompareOp,
    left: &TypeDesc,
    right: &TypeDesc,
    span: Span,
) -> Result<Option<CompareRule>, CompilationError> {
    let equality = op.is_equality();
    let rule = match (left, right) {
        (TypeDesc::String, TypeDesc::String) if equality => CompareRule::TextEquality,
        (TypeDesc::String, TypeDesc::String) => CompareRule::TextOrdering,
        (l, r) if l.is_numeric() && r.is_numeric() => match promote(op.symbol(), l, r, span) {
            Some(kind) => CompareRule::Numeric { kind: kind? },
            None => return Ok(None),
        },
        (l, r) if *l == TypeDesc::BOOL && *r == TypeDesc::BOOL && equality => CompareRule::BoolEquality,
        (TypeDesc::Nullable(a), TypeDesc::Nullable(b)) if equality && a == b => match a.as_primitive() {
            Some(base) => CompareRule::NullableBoth { base },
            None => return Ok(None),
        },
        (TypeDesc::Nullable(a), b) | (b, TypeDesc::Nullable(a)) if equality && a.as_ref() == b => {
            match a.as_primitive() {
                Some(base) => CompareRule::NullableValue {
                    base,
                    nullable_left: left.nullable_base().is_some(),
                },
                None => return Ok(None),
            }
        }
        (TypeDesc::Nullable(_), TypeDesc::Null) if equality => CompareRule::NullableNull { nullable_left: true },
        (TypeDesc::Null, TypeDesc::Nullable(_)) if equality => CompareRule::NullableNull { nullable_left: false },
        (l, TypeDesc::Null) | (TypeDesc::Null, l) if equality && l.is_nullable_reference() => {
            CompareRule::ReferenceNull
        }
        _ => return Ok(None),
    };
    Ok(Some(rule))
}
